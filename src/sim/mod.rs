//! The daily simulation step and the runner that drives it.
//!
//! [`Simulator`] owns the domain state: the population, the calendar and the disease and
//! contact profiles. It reaches the [`Context`] only for its services (named generators,
//! reports and events), so the two can be borrowed independently.
pub mod events;
pub mod runner;
pub mod viewers;

use log::{debug, trace};
use rand::Rng;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::calendar::{Calendar, DayPolicy};
use crate::config::SimulationConfig;
use crate::contact::{infect_pools, AgeContactProfiles, InfectorInputs, Transmission};
use crate::context::Context;
use crate::define_rng;
use crate::disease::{DiseaseProfile, HospitalisationProfile, TransmissionProfile};
use crate::population::{ContactType, HealthStatus, Population};
use crate::random::{sample_multiple_l_reservoir, ContextRandomExt, RngStreams};
use crate::report::ContextReportExt;
use crate::StrideError;

pub use events::{ContactTraceEvent, DaySnapshot, SimulationEvent};
pub use runner::{Runner, RunnerState};
use viewers::TransmissionReport;

define_rng!(ImportedCasesRng);

const PROGRESSION_STREAM: &str = "progression";
const HOSPITALISATION_STREAM: &str = "hospitalisation";
/// Stream key of the imported cases, after the keys of the contact types.
const IMPORTED_CASES_KEY: u64 = ContactType::ALL.len() as u64;

/// The disease and contact parameters the daily step reads.
#[derive(Clone, Debug)]
pub struct SimulatorParams {
    pub transmission: TransmissionProfile,
    pub disease: DiseaseProfile,
    pub hospitalisation: HospitalisationProfile,
    pub contact_profiles: AgeContactProfiles,
    pub household_cluster_intensity: f64,
}

impl SimulatorParams {
    pub fn from_config(config: &SimulationConfig) -> Result<Self, StrideError> {
        let hospitalisation = match &config.disease.hospitalisation {
            Some(hospitalisation) => HospitalisationProfile::from_config(hospitalisation)?,
            None => HospitalisationProfile::default(),
        };
        Ok(SimulatorParams {
            transmission: TransmissionProfile::from_config(&config.disease.transmission)?,
            disease: DiseaseProfile::from_config(&config.disease)?,
            hospitalisation,
            contact_profiles: AgeContactProfiles::from_config(&config.contacts)?,
            household_cluster_intensity: config.contacts.household_cluster_intensity,
        })
    }
}

pub struct Simulator {
    population: Population,
    calendar: Calendar,
    params: SimulatorParams,
    thread_pool: Option<ThreadPool>,
    last_snapshot: DaySnapshot,
}

impl Simulator {
    /// Runs the infector on `num_threads` worker threads when that is more than one.
    pub fn new(
        population: Population,
        calendar: Calendar,
        params: SimulatorParams,
        num_threads: usize,
    ) -> Result<Self, StrideError> {
        let thread_pool = if num_threads > 1 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build()
                .map_err(|e| {
                    StrideError::ConfigInvalid(format!("cannot start {num_threads} threads: {e}"))
                })?;
            Some(pool)
        } else {
            None
        };
        let last_snapshot = DaySnapshot {
            day: calendar.simulation_day(),
            counts: population.health_counts(),
            new_infections: 0,
        };
        Ok(Simulator {
            population,
            calendar,
            params,
            thread_pool,
            last_snapshot,
        })
    }

    #[must_use]
    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn population_mut(&mut self) -> &mut Population {
        &mut self.population
    }

    #[must_use]
    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn calendar_mut(&mut self) -> &mut Calendar {
        &mut self.calendar
    }

    #[must_use]
    pub fn params(&self) -> &SimulatorParams {
        &self.params
    }

    /// Counters as of the end of the last step, or of setup before the first one.
    #[must_use]
    pub fn snapshot(&self) -> DaySnapshot {
        self.last_snapshot
    }

    /// Simulates the current calendar day and moves the calendar to the next one.
    ///
    /// # Errors
    ///
    /// `OutOfHorizon` once every day of the horizon has been simulated.
    pub fn time_step(&mut self, context: &mut Context) -> Result<DaySnapshot, StrideError> {
        if self.calendar.is_finished() {
            return Err(StrideError::OutOfHorizon {
                day: self.calendar.day_index() + 1,
                horizon: self.calendar.horizon(),
            });
        }
        let policy = self.calendar.day_policy();
        let streams = context.rng_streams();

        let mut new_infections = self.seed_imported_cases(context, &policy, streams);
        for contact_type in ContactType::ALL {
            new_infections += self.run_contact_type(context, &policy, streams, contact_type);
        }
        self.progress(&policy, streams);

        self.calendar.advance_day()?;
        let snapshot = DaySnapshot {
            day: self.calendar.simulation_day(),
            counts: self.population.health_counts(),
            new_infections,
        };
        debug!(
            "day {} done: {} new infections, {} infected in total",
            policy.day,
            new_infections,
            snapshot.counts.total_infected()
        );
        self.last_snapshot = snapshot;
        Ok(snapshot)
    }

    fn seed_imported_cases(
        &mut self,
        context: &Context,
        policy: &DayPolicy,
        streams: RngStreams,
    ) -> usize {
        if policy.imported_cases == 0 {
            return 0;
        }
        let population = &self.population;
        let chosen = context.sample(ImportedCasesRng, |rng| {
            sample_multiple_l_reservoir(
                rng,
                population.susceptible_ids(),
                policy.imported_cases as usize,
            )
        });
        if chosen.len() < policy.imported_cases as usize {
            debug!(
                "day {}: only {} of {} imported cases could be seeded",
                policy.day,
                chosen.len(),
                policy.imported_cases
            );
        }

        let mut rng = streams.rng(PROGRESSION_STREAM, &[policy.day as u64, IMPORTED_CASES_KEY]);
        let mut seeded = 0;
        for id in chosen {
            // Vaccine protection applies to imported infections as well.
            let protection = self
                .population
                .get(id)
                .map_or(0.0, |person| self.population.ve_susceptible(person));
            if protection > 0.0 && !rng.random_bool((1.0 - protection).clamp(0.0, 1.0)) {
                continue;
            }
            let Some(person) = self.population.get_mut(id) else {
                continue;
            };
            let durations = self.params.disease.sample_durations(person.age(), &mut rng);
            if person.health.start_infection(policy.day as u32, durations) {
                seeded += 1;
                context.send_report(TransmissionReport {
                    day: policy.day,
                    infector: None,
                    infector_age: None,
                    infected: id,
                    infected_age: person.age(),
                    contact_type: None,
                    pool_id: None,
                });
            }
        }
        seeded
    }

    /// Distancing factor and contact intensity of a contact type today, `None` if its pools do
    /// not meet.
    fn mixing(&self, policy: &DayPolicy, contact_type: ContactType) -> Option<(f64, f64)> {
        match contact_type {
            ContactType::Household | ContactType::School => Some((0.0, 1.0)),
            ContactType::Workplace => {
                policy.is_regular_weekday.then_some((policy.workplace_distancing, 1.0))
            }
            ContactType::PrimaryCommunity | ContactType::SecondaryCommunity => {
                Some((policy.community_distancing, 1.0))
            }
            ContactType::HouseholdCluster => policy.household_clustering_allowed.then_some((
                policy.collectivity_distancing,
                self.params.household_cluster_intensity,
            )),
        }
    }

    fn run_contact_type(
        &mut self,
        context: &mut Context,
        policy: &DayPolicy,
        streams: RngStreams,
        contact_type: ContactType,
    ) -> usize {
        let Some((distancing, intensity)) = self.mixing(policy, contact_type) else {
            trace!("day {}: {contact_type} pools do not meet", policy.day);
            return 0;
        };
        if distancing >= 1.0 {
            trace!("day {}: {contact_type} pools fully distanced", policy.day);
            return 0;
        }

        let inputs = InfectorInputs {
            population: &self.population,
            profile: self.params.contact_profiles.get(contact_type),
            transmission: &self.params.transmission,
            intensity,
            distancing,
            school: (contact_type == ContactType::School).then_some(policy),
        };
        let transmissions = infect_pools(
            self.population.pools().member_pools(contact_type),
            &inputs,
            streams,
            policy.day,
            contact_type,
            self.thread_pool.as_ref(),
        );
        self.apply_transmissions(context, policy, streams, contact_type, &transmissions)
    }

    fn apply_transmissions(
        &mut self,
        context: &mut Context,
        policy: &DayPolicy,
        streams: RngStreams,
        contact_type: ContactType,
        transmissions: &[Transmission],
    ) -> usize {
        let mut rng = streams.rng(
            PROGRESSION_STREAM,
            &[policy.day as u64, contact_type.index() as u64],
        );
        let mut applied = 0;
        for transmission in transmissions {
            let infector_age = self.population.get(transmission.infector).map(|p| p.age());
            let Some(person) = self.population.get_mut(transmission.infected) else {
                continue;
            };
            let durations = self.params.disease.sample_durations(person.age(), &mut rng);
            if !person.health.start_infection(policy.day as u32, durations) {
                continue;
            }
            applied += 1;
            context.send_report(TransmissionReport {
                day: policy.day,
                infector: Some(transmission.infector),
                infector_age,
                infected: transmission.infected,
                infected_age: person.age(),
                contact_type: Some(contact_type),
                pool_id: Some(transmission.pool_id),
            });
            if policy.contact_tracing {
                context.emit_event(ContactTraceEvent {
                    day: policy.day,
                    infector: transmission.infector,
                    infected: transmission.infected,
                    contact_type,
                    pool_id: transmission.pool_id,
                });
            }
        }
        if applied > 0 {
            trace!("day {}: {applied} infections in {contact_type} pools", policy.day);
        }
        applied
    }

    /// Advances every person one day along their disease course. Persons reaching symptom
    /// onset are scheduled for hospital admission with the age-specific probability, reduced
    /// by their protection against severe disease.
    fn progress(&mut self, policy: &DayPolicy, streams: RngStreams) {
        let mut rng = streams.rng(HOSPITALISATION_STREAM, &[policy.day as u64]);
        let hospitalisation = &self.params.hospitalisation;
        let population = &mut self.population;
        for id in 0..population.len() as u32 {
            let Some(person) = population.get(id) else {
                continue;
            };
            let ve_severe = population.ve_severe(person);
            let Some(person) = population.get_mut(id) else {
                continue;
            };
            if person.health.update() == Some(HealthStatus::Symptomatic) {
                let p = hospitalisation.probability(person.age()) * (1.0 - ve_severe);
                if p > 0.0 && rng.random_bool(p.clamp(0.0, 1.0)) {
                    person
                        .health
                        .schedule_hospitalisation(hospitalisation.delay(person.age()));
                }
            }
            person.health.update_hospitalisation();
            if let Some(vaccine) = person.vaccine.as_mut() {
                vaccine.days_since += 1;
            }
        }
    }
}
