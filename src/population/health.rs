//! Disease progression of a single person.
use serde::Serialize;
use strum::Display;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HealthStatus {
    Susceptible,
    Exposed,
    Infectious,
    Symptomatic,
    Recovered,
    Immune,
}

impl HealthStatus {
    pub const ALL: [HealthStatus; 6] = [
        HealthStatus::Susceptible,
        HealthStatus::Exposed,
        HealthStatus::Infectious,
        HealthStatus::Symptomatic,
        HealthStatus::Recovered,
        HealthStatus::Immune,
    ];

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Days spent in each stage of an infection. Every stage lasts at least one day.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StageDurations {
    pub latent: u16,
    pub pre_symptomatic: u16,
    pub symptomatic: u16,
}

impl StageDurations {
    #[must_use]
    pub fn new(latent: u16, pre_symptomatic: u16, symptomatic: u16) -> Self {
        StageDurations {
            latent: latent.max(1),
            pre_symptomatic: pre_symptomatic.max(1),
            symptomatic: symptomatic.max(1),
        }
    }
}

/// Health state of a person. Infections move strictly forward through
/// exposed, infectious, symptomatic and recovered, one stage per transition.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Health {
    status: HealthStatus,
    days_in_stage: u16,
    durations: StageDurations,
    infected_day: Option<u32>,
    hospitalisation_delay: Option<u16>,
    hospitalised: bool,
    ever_hospitalised: bool,
}

impl Default for Health {
    fn default() -> Self {
        Health::new()
    }
}

impl Health {
    #[must_use]
    pub fn new() -> Self {
        Health {
            status: HealthStatus::Susceptible,
            days_in_stage: 0,
            durations: StageDurations::new(1, 1, 1),
            infected_day: None,
            hospitalisation_delay: None,
            hospitalised: false,
            ever_hospitalised: false,
        }
    }

    #[must_use]
    pub fn status(&self) -> HealthStatus {
        self.status
    }

    #[must_use]
    pub fn days_in_stage(&self) -> u16 {
        self.days_in_stage
    }

    #[must_use]
    pub fn durations(&self) -> StageDurations {
        self.durations
    }

    /// The simulation day this person was infected on, if ever.
    #[must_use]
    pub fn infected_day(&self) -> Option<u32> {
        self.infected_day
    }

    #[must_use]
    pub fn is_susceptible(&self) -> bool {
        self.status == HealthStatus::Susceptible
    }

    #[must_use]
    pub fn is_exposed(&self) -> bool {
        self.status == HealthStatus::Exposed
    }

    /// Infectious persons transmit whether or not they show symptoms.
    #[must_use]
    pub fn is_infectious(&self) -> bool {
        matches!(
            self.status,
            HealthStatus::Infectious | HealthStatus::Symptomatic
        )
    }

    #[must_use]
    pub fn is_symptomatic(&self) -> bool {
        self.status == HealthStatus::Symptomatic
    }

    #[must_use]
    pub fn is_recovered(&self) -> bool {
        self.status == HealthStatus::Recovered
    }

    #[must_use]
    pub fn is_immune(&self) -> bool {
        self.status == HealthStatus::Immune
    }

    /// Currently carrying the infection.
    #[must_use]
    pub fn is_infected(&self) -> bool {
        matches!(
            self.status,
            HealthStatus::Exposed | HealthStatus::Infectious | HealthStatus::Symptomatic
        )
    }

    /// Infected at some point of the run, including those who recovered.
    #[must_use]
    pub fn has_been_infected(&self) -> bool {
        self.is_infected() || self.is_recovered()
    }

    #[must_use]
    pub fn is_hospitalised(&self) -> bool {
        self.hospitalised
    }

    #[must_use]
    pub fn was_hospitalised(&self) -> bool {
        self.ever_hospitalised
    }

    /// Moves a susceptible person to exposed. Returns false, and changes nothing, for anyone
    /// who is not susceptible.
    pub fn start_infection(&mut self, day: u32, durations: StageDurations) -> bool {
        if !self.is_susceptible() {
            return false;
        }
        self.status = HealthStatus::Exposed;
        self.days_in_stage = 0;
        self.durations = durations;
        self.infected_day = Some(day);
        true
    }

    /// Moves a susceptible person to immune.
    pub fn set_immune(&mut self) -> bool {
        if !self.is_susceptible() {
            return false;
        }
        self.status = HealthStatus::Immune;
        true
    }

    /// Counts one more day in the current stage and moves to the next stage once its duration
    /// is reached. Returns the new status when a transition happened.
    pub fn update(&mut self) -> Option<HealthStatus> {
        let (limit, next) = match self.status {
            HealthStatus::Exposed => (self.durations.latent, HealthStatus::Infectious),
            HealthStatus::Infectious => {
                (self.durations.pre_symptomatic, HealthStatus::Symptomatic)
            }
            HealthStatus::Symptomatic => (self.durations.symptomatic, HealthStatus::Recovered),
            _ => return None,
        };
        self.days_in_stage = self.days_in_stage.saturating_add(1);
        if self.days_in_stage < limit {
            return None;
        }
        self.status = next;
        self.days_in_stage = 0;
        if next == HealthStatus::Recovered {
            self.hospitalised = false;
            self.hospitalisation_delay = None;
        }
        Some(next)
    }

    /// Marks a symptomatic person to be hospitalised `delay` days after symptom onset.
    pub fn schedule_hospitalisation(&mut self, delay: u16) {
        if self.is_symptomatic() {
            self.hospitalisation_delay = Some(delay);
        }
    }

    /// Admits the person once the scheduled delay has passed. Returns true on admission.
    pub fn update_hospitalisation(&mut self) -> bool {
        match self.hospitalisation_delay {
            Some(delay)
                if self.is_symptomatic() && !self.hospitalised && self.days_in_stage >= delay =>
            {
                self.hospitalised = true;
                self.ever_hospitalised = true;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_last_at_least_one_day() {
        let durations = StageDurations::new(0, 0, 3);
        assert_eq!(durations.latent, 1);
        assert_eq!(durations.pre_symptomatic, 1);
        assert_eq!(durations.symptomatic, 3);
    }

    #[test]
    fn walks_through_every_stage_in_order() {
        let mut health = Health::new();
        assert!(health.start_infection(4, StageDurations::new(2, 1, 2)));
        assert_eq!(health.infected_day(), Some(4));

        let mut seen = vec![health.status()];
        for _ in 0..10 {
            if let Some(next) = health.update() {
                seen.push(next);
            }
        }
        assert_eq!(
            seen,
            vec![
                HealthStatus::Exposed,
                HealthStatus::Infectious,
                HealthStatus::Symptomatic,
                HealthStatus::Recovered
            ]
        );
        assert!(health.has_been_infected());
        assert!(!health.is_infected());
    }

    #[test]
    fn one_transition_per_update() {
        let mut health = Health::new();
        health.start_infection(0, StageDurations::new(1, 1, 1));
        assert_eq!(health.update(), Some(HealthStatus::Infectious));
        assert_eq!(health.update(), Some(HealthStatus::Symptomatic));
        assert_eq!(health.update(), Some(HealthStatus::Recovered));
        assert_eq!(health.update(), None);
    }

    #[test]
    fn only_susceptibles_get_infected() {
        let mut health = Health::new();
        assert!(health.set_immune());
        assert!(!health.start_infection(0, StageDurations::new(1, 1, 1)));
        assert!(health.is_immune());
        assert_eq!(health.update(), None);
    }

    #[test]
    fn hospitalisation_after_delay_while_symptomatic() {
        let mut health = Health::new();
        health.start_infection(0, StageDurations::new(1, 1, 5));
        health.update();
        health.schedule_hospitalisation(2);
        assert!(health.hospitalisation_delay.is_none());
        health.update();
        health.schedule_hospitalisation(2);
        assert!(!health.update_hospitalisation());
        health.update();
        assert!(!health.update_hospitalisation());
        health.update();
        assert!(health.update_hospitalisation());
        assert!(health.is_hospitalised());

        for _ in 0..3 {
            health.update();
        }
        assert!(health.is_recovered());
        assert!(!health.is_hospitalised());
        assert!(health.was_hospitalised());
    }
}
