//! The decision-process façade: a simulation an external controller can step one day at a
//! time, vaccinating age groups between days and reading the epidemic counters in between.
//!
//! ```no_run
//! use std::path::Path;
//! use stride_mdp::mdp::{AgeGroup, CreateOptions, Mdp};
//! use stride_mdp::population::VaccineType;
//!
//! let mut mdp = Mdp::new();
//! mdp.create_from_file(Path::new("config.json"), CreateOptions::default())?;
//! for _ in 0..10 {
//!     mdp.vaccinate(100, AgeGroup::Elderly, VaccineType::MRna)?;
//!     let infected = mdp.simulate_day()?;
//!     println!("{infected} infected so far");
//! }
//! mdp.end()?;
//! # Ok::<(), stride_mdp::StrideError>(())
//! ```
pub mod age_group;

use std::path::{Path, PathBuf};

use log::{debug, info, warn};

pub use age_group::{AgeBucket, AgeGroup, AgeGroupIndex, ChildlessAgeGroup};

use crate::calendar::Calendar;
use crate::config::{EventLogMode, OutputLocation, SimulationConfig};
use crate::context::Context;
use crate::log::{set_log_file, set_log_level};
use crate::population::builder::build_population;
use crate::population::{HealthCounts, Population, VaccineType};
use crate::random::ContextRandomExt;
use crate::report::ContextReportExt;
use crate::sim::viewers::{register_viewers, VaccinationReport};
use crate::sim::{Runner, RunnerState, Simulator, SimulatorParams};
use crate::StrideError;
use age_group::select_households;

/// Everything `create` takes besides the configuration.
#[derive(Clone, Debug)]
pub struct CreateOptions {
    /// Overrides `run.rng_seed` when set.
    pub seed: Option<u64>,
    pub output_dir: PathBuf,
    /// Empty falls back to `run.output_prefix`, then to a timestamp tag.
    pub output_prefix: String,
    /// Build the partition without children instead of the five age groups.
    pub childless: bool,
    /// Fraction of the population, drawn by household, that is eligible for vaccination.
    pub uptake: f64,
    /// Point the global logger at the run's log file and configured level.
    pub configure_logging: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        CreateOptions {
            seed: None,
            output_dir: PathBuf::from("."),
            output_prefix: String::new(),
            childless: false,
            uptake: 1.0,
            configure_logging: true,
        }
    }
}

struct MdpState {
    context: Context,
    runner: Runner,
    age_groups: Option<AgeGroupIndex<AgeGroup>>,
    childless_groups: Option<AgeGroupIndex<ChildlessAgeGroup>>,
    output: OutputLocation,
    event_log_mode: EventLogMode,
    owns_log_file: bool,
}

impl MdpState {
    fn simulator(&self) -> &Simulator {
        self.runner.simulator()
    }

    fn population(&self) -> &Population {
        self.simulator().population()
    }
}

/// A decision process over one simulation. Created empty; [`Mdp::create`] builds the
/// simulation and [`Mdp::clear_simulation`] drops it again.
#[derive(Default)]
pub struct Mdp {
    state: Option<MdpState>,
}

impl Mdp {
    #[must_use]
    pub fn new() -> Self {
        Mdp::default()
    }

    /// Reads the configuration file at `path` and creates a simulation from it.
    pub fn create_from_file(
        &mut self,
        path: &Path,
        options: CreateOptions,
    ) -> Result<(), StrideError> {
        let config = SimulationConfig::from_file(path)?;
        self.create(&config, options)
    }

    /// Builds the population, calendar, simulator, runner and age-group index. A simulation
    /// created earlier is cleared first.
    ///
    /// # Errors
    ///
    /// `ConfigInvalid` for an invalid configuration or uptake, `OutputPathUnwritable` if the
    /// output directory cannot be created. The log file is only attached once everything has
    /// been built, so a failed create leaves the logger as it was.
    pub fn create(
        &mut self,
        config: &SimulationConfig,
        options: CreateOptions,
    ) -> Result<(), StrideError> {
        self.clear_simulation();
        config.validate()?;
        if !(0.0..=1.0).contains(&options.uptake) {
            return Err(StrideError::ConfigInvalid(format!(
                "uptake {} is outside [0, 1]",
                options.uptake
            )));
        }

        let output = OutputLocation::resolve(
            &options.output_dir,
            &options.output_prefix,
            &config.run.output_prefix,
        );
        output.create()?;
        let log_level = config.log_level()?;

        let mut context = Context::new();
        let seed = match options.seed {
            Some(seed) => seed,
            None => config.rng_seed()?.base_seed(),
        };
        context.init_random(seed);
        context
            .report_options()
            .directory(&output.directory)
            .file_prefix(&output.file_prefix)
            .overwrite(true);
        register_viewers(&mut context, config.run.event_log_level)?;

        let population = build_population(config, &context)?;
        let calendar = Calendar::from_config(config)?;
        let params = SimulatorParams::from_config(config)?;
        let simulator = Simulator::new(population, calendar, params, config.num_threads())?;
        let mut runner = Runner::new(simulator);
        runner.setup(&mut context)?;

        let population = runner.simulator().population();
        let households = if options.uptake < 1.0 {
            Some(select_households(population, options.uptake, &context)?)
        } else {
            None
        };
        let (age_groups, childless_groups) = match (&households, options.childless) {
            (None, false) => (Some(AgeGroupIndex::from_population(population, &context)), None),
            (None, true) => (None, Some(AgeGroupIndex::from_population(population, &context))),
            (Some(households), false) => (
                Some(AgeGroupIndex::from_households(population, households, &context)),
                None,
            ),
            (Some(households), true) => (
                None,
                Some(AgeGroupIndex::from_households(population, households, &context)),
            ),
        };

        if options.configure_logging {
            set_log_level(log_level);
            set_log_file(Some(&output.log_file()));
        }
        info!(
            "created simulation of {} persons over {} days (seed {seed}) in {}",
            population.len(),
            runner.simulator().calendar().horizon(),
            output.directory.display()
        );
        self.state = Some(MdpState {
            context,
            runner,
            age_groups,
            childless_groups,
            output,
            event_log_mode: config.run.event_log_level,
            owns_log_file: options.configure_logging,
        });
        Ok(())
    }

    #[must_use]
    pub fn is_created(&self) -> bool {
        self.state.is_some()
    }

    fn state_mut(&mut self) -> Result<&mut MdpState, StrideError> {
        self.state.as_mut().ok_or(StrideError::NotCreated)
    }

    /// Replaces the workplace, community and collectivity distancing schedules. The new factors
    /// apply from the next simulated day on.
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` unless every vector has one entry per day of the horizon.
    pub fn update_cnt_reduction(
        &mut self,
        workplace: Vec<f64>,
        community: Vec<f64>,
        collectivity: Vec<f64>,
    ) -> Result<(), StrideError> {
        let state = self.state_mut()?;
        state
            .runner
            .simulator_mut()
            .calendar_mut()
            .update_cnt_reduction(workplace, community, collectivity)
    }

    /// Simulates `num_days` days and returns the number of persons infected so far.
    ///
    /// # Errors
    ///
    /// `Ended` after [`Mdp::end`], `OutOfHorizon` if the horizon runs out first.
    pub fn simulate(&mut self, num_days: usize) -> Result<usize, StrideError> {
        let state = self.state_mut()?;
        let snapshot = state.runner.run(&mut state.context, num_days)?;
        Ok(snapshot.counts.total_infected())
    }

    pub fn simulate_day(&mut self) -> Result<usize, StrideError> {
        self.simulate(1)
    }

    /// Vaccinates up to `available` persons of `group` who have not been drawn before and
    /// returns how many were vaccinated. Fewer than `available` means the group is exhausted.
    /// `NoVaccine` and vaccine types without an effectiveness record vaccinate nobody.
    pub fn vaccinate(
        &mut self,
        available: usize,
        group: AgeGroup,
        vaccine_type: VaccineType,
    ) -> Result<usize, StrideError> {
        let state = self.state_mut()?;
        let MdpState {
            context,
            runner,
            age_groups,
            ..
        } = state;
        let Some(index) = age_groups.as_mut() else {
            warn!("cannot vaccinate {group}: the simulation uses childless age groups");
            return Ok(0);
        };
        Ok(vaccinate_group(context, runner.simulator_mut(), index, available, group, vaccine_type))
    }

    /// As [`Mdp::vaccinate`], over the partition without children.
    pub fn vaccinate_childless(
        &mut self,
        available: usize,
        group: ChildlessAgeGroup,
        vaccine_type: VaccineType,
    ) -> Result<usize, StrideError> {
        let state = self.state_mut()?;
        let MdpState {
            context,
            runner,
            childless_groups,
            ..
        } = state;
        let Some(index) = childless_groups.as_mut() else {
            warn!("cannot vaccinate {group}: the simulation uses the five age groups");
            return Ok(0);
        };
        Ok(vaccinate_group(context, runner.simulator_mut(), index, available, group, vaccine_type))
    }

    /// For each of `num_days` days: vaccinate up to `available` persons of `group`, then
    /// simulate the day. Returns the number of persons infected so far.
    pub fn simulate_vaccinate(
        &mut self,
        num_days: usize,
        available: usize,
        group: AgeGroup,
        vaccine_type: VaccineType,
    ) -> Result<usize, StrideError> {
        let mut infected = self.get_total_infected();
        for _ in 0..num_days {
            self.ensure_running()?;
            self.vaccinate(available, group, vaccine_type)?;
            infected = self.simulate_day()?;
        }
        Ok(infected)
    }

    /// As [`Mdp::simulate_vaccinate`], over the partition without children.
    pub fn simulate_vaccinate_childless(
        &mut self,
        num_days: usize,
        available: usize,
        group: ChildlessAgeGroup,
        vaccine_type: VaccineType,
    ) -> Result<usize, StrideError> {
        let mut infected = self.get_total_infected();
        for _ in 0..num_days {
            self.ensure_running()?;
            self.vaccinate_childless(available, group, vaccine_type)?;
            infected = self.simulate_day()?;
        }
        Ok(infected)
    }

    /// Vaccinating on an ended run would leave the vaccine unused, so refuse before drawing.
    fn ensure_running(&mut self) -> Result<(), StrideError> {
        match self.state_mut()?.runner.state() {
            RunnerState::Ended => Err(StrideError::Ended),
            _ => Ok(()),
        }
    }

    /// Ends the run: viewers write their final output and every log file is flushed. Further
    /// steps fail with `Ended`; the counters stay readable.
    pub fn end(&mut self) -> Result<(), StrideError> {
        let state = self.state_mut()?;
        state.runner.end(&mut state.context);
        state.context.close_reports();
        Ok(())
    }

    /// Drops the population, pools, runner, simulator, age groups and vaccine records. Safe to
    /// call at any time, including twice.
    pub fn clear_simulation(&mut self) {
        let Some(mut state) = self.state.take() else {
            return;
        };
        state.context.close_reports();
        let population = state.runner.simulator_mut().population_mut();
        population.clear_contact_pools();
        population.clear();
        if state.owns_log_file {
            set_log_file(None);
        }
        debug!("simulation cleared");
    }

    fn counts(&self) -> HealthCounts {
        self.state
            .as_ref()
            .map(|state| state.population().health_counts())
            .unwrap_or_default()
    }

    /// Horizon of the calendar in days.
    #[must_use]
    pub fn get_number_of_days(&self) -> usize {
        self.state
            .as_ref()
            .map_or(0, |state| state.simulator().calendar().horizon())
    }

    /// Days simulated so far.
    #[must_use]
    pub fn current_day(&self) -> usize {
        self.state
            .as_ref()
            .map_or(0, |state| state.simulator().calendar().simulation_day())
    }

    #[must_use]
    pub fn get_population_size(&self) -> usize {
        self.state.as_ref().map_or(0, |state| state.population().len())
    }

    /// Everyone infected so far, recovered included.
    #[must_use]
    pub fn get_total_infected(&self) -> usize {
        self.state
            .as_ref()
            .map_or(0, |state| state.population().total_infected())
    }

    /// Exposed, infectious and symptomatic persons.
    #[must_use]
    pub fn count_infected_cases(&self) -> usize {
        self.counts().infected()
    }

    #[must_use]
    pub fn count_exposed_cases(&self) -> usize {
        self.counts().exposed
    }

    #[must_use]
    pub fn count_infectious_cases(&self) -> usize {
        self.state
            .as_ref()
            .map_or(0, |state| state.population().count_infectious_cases())
    }

    #[must_use]
    pub fn count_symptomatic_cases(&self) -> usize {
        self.counts().symptomatic
    }

    #[must_use]
    pub fn count_hospitalised_cases(&self) -> usize {
        self.counts().hospitalised
    }

    #[must_use]
    pub fn get_total_hospitalised(&self) -> usize {
        self.counts().total_hospitalised
    }

    /// Susceptible persons without a sterilising vaccine.
    #[must_use]
    pub fn get_at_risk(&self) -> usize {
        self.counts().at_risk
    }

    #[must_use]
    pub fn population(&self) -> Option<&Population> {
        self.state.as_ref().map(MdpState::population)
    }

    #[must_use]
    pub fn calendar(&self) -> Option<&Calendar> {
        self.state.as_ref().map(|state| state.simulator().calendar())
    }

    #[must_use]
    pub fn age_groups(&self) -> Option<&AgeGroupIndex<AgeGroup>> {
        self.state.as_ref().and_then(|state| state.age_groups.as_ref())
    }

    #[must_use]
    pub fn childless_age_groups(&self) -> Option<&AgeGroupIndex<ChildlessAgeGroup>> {
        self.state
            .as_ref()
            .and_then(|state| state.childless_groups.as_ref())
    }

    #[must_use]
    pub fn output_location(&self) -> Option<&OutputLocation> {
        self.state.as_ref().map(|state| &state.output)
    }

    #[must_use]
    pub fn event_log_mode(&self) -> Option<EventLogMode> {
        self.state.as_ref().map(|state| state.event_log_mode)
    }

    /// The services of the running simulation, e.g. to subscribe to its events.
    pub fn context_mut(&mut self) -> Option<&mut Context> {
        self.state.as_mut().map(|state| &mut state.context)
    }
}

fn vaccinate_group<G: AgeBucket>(
    context: &Context,
    simulator: &mut Simulator,
    index: &mut AgeGroupIndex<G>,
    available: usize,
    group: G,
    vaccine_type: VaccineType,
) -> usize {
    if vaccine_type == VaccineType::NoVaccine {
        return 0;
    }
    if simulator.population().vaccines().get(vaccine_type).is_none() {
        warn!("no effectiveness record for {vaccine_type}, nobody vaccinated");
        return 0;
    }
    let day = simulator.calendar().simulation_day();
    let population = simulator.population_mut();
    let administered = index
        .sample(group, available)
        .into_iter()
        .filter(|id| population.vaccinate(*id, vaccine_type))
        .count();
    debug!("day {day}: vaccinated {administered} of {available} requested in {group} with {vaccine_type}");
    context.send_report(VaccinationReport {
        day,
        age_group: group.to_string(),
        vaccine_type,
        requested: available,
        administered,
    });
    administered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::MINIMAL;
    use crate::population::HealthStatus;

    const WITH_VACCINES: &str = r#"{
        "mRNA": { "kind": "constant", "id": "mRNA", "ve_susceptible": 1.0,
                  "ve_infectiousness": 1.0, "ve_severe": 1.0 }
    }"#;

    fn config(event_log_level: &str) -> SimulationConfig {
        let mut json: serde_json::Value = serde_json::from_str(MINIMAL).unwrap();
        json["run"]["event_log_level"] = serde_json::Value::from(event_log_level);
        json["vaccines"] = serde_json::from_str(WITH_VACCINES).unwrap();
        json["calendar"]["entries"] = serde_json::json!([
            { "category": "imported_cases", "date": "2020-03-02", "value": 5 }
        ]);
        SimulationConfig::from_json_str(&json.to_string(), PathBuf::from(".")).unwrap()
    }

    fn options(dir: &Path) -> CreateOptions {
        CreateOptions {
            seed: Some(11),
            output_dir: dir.to_path_buf(),
            output_prefix: "run/".to_string(),
            configure_logging: false,
            ..CreateOptions::default()
        }
    }

    fn created(dir: &Path) -> Mdp {
        let mut mdp = Mdp::new();
        mdp.create(&config("All"), options(dir)).unwrap();
        mdp
    }

    #[test]
    fn failed_create_leaves_no_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut json: serde_json::Value = serde_json::from_str(MINIMAL).unwrap();
        json["population"]["source"] = serde_json::json!({ "file": "no_such_population.csv" });
        let config = SimulationConfig::from_json_str(&json.to_string(), dir.path().to_path_buf())
            .unwrap();
        let mut mdp = Mdp::new();
        let result = mdp.create(
            &config,
            CreateOptions {
                configure_logging: true,
                ..options(dir.path())
            },
        );
        assert!(matches!(result, Err(StrideError::ConfigInvalid(_))));
        assert!(!mdp.is_created());
        assert!(dir.path().join("run").is_dir());
        assert!(!dir.path().join("run").join("stride_log.txt").exists());
    }

    #[test]
    fn operations_before_create() {
        let mut mdp = Mdp::new();
        assert!(!mdp.is_created());
        assert_eq!(mdp.get_total_infected(), 0);
        assert_eq!(mdp.get_population_size(), 0);
        assert!(matches!(mdp.simulate_day(), Err(StrideError::NotCreated)));
        assert!(matches!(
            mdp.vaccinate(1, AgeGroup::Adults, VaccineType::MRna),
            Err(StrideError::NotCreated)
        ));
        mdp.clear_simulation();
    }

    #[test]
    fn create_builds_everything() {
        let dir = tempfile::tempdir().unwrap();
        let mdp = created(dir.path());
        assert_eq!(mdp.get_population_size(), 100);
        assert_eq!(mdp.get_number_of_days(), 10);
        assert_eq!(mdp.current_day(), 0);
        assert_eq!(mdp.age_groups().unwrap().total_remaining(), 100);
        assert!(mdp.childless_age_groups().is_none());
        assert_eq!(mdp.output_location().unwrap().directory, dir.path().join("run"));
        assert_eq!(mdp.event_log_mode(), Some(EventLogMode::All));
        assert!(dir.path().join("run").join("incidence.csv").exists());
        assert!(dir.path().join("run").join("vaccinations.csv").exists());
    }

    #[test]
    fn vaccinate_draws_without_replacement() {
        let dir = tempfile::tempdir().unwrap();
        let mut mdp = created(dir.path());
        let adults = mdp.age_groups().unwrap().initial_size(AgeGroup::Adults);
        let first = mdp.vaccinate(10, AgeGroup::Adults, VaccineType::MRna).unwrap();
        assert_eq!(first, 10.min(adults));
        let rest = mdp
            .vaccinate(adults, AgeGroup::Adults, VaccineType::MRna)
            .unwrap();
        assert_eq!(first + rest, adults);
        assert_eq!(mdp.age_groups().unwrap().remaining(AgeGroup::Adults), 0);
        let vaccinated = mdp
            .population()
            .unwrap()
            .iter()
            .filter(|person| person.is_vaccinated())
            .count();
        assert_eq!(vaccinated, adults);
    }

    #[test]
    fn unbound_vaccines_vaccinate_nobody() {
        let dir = tempfile::tempdir().unwrap();
        let mut mdp = created(dir.path());
        assert_eq!(mdp.vaccinate(5, AgeGroup::Elderly, VaccineType::NoVaccine).unwrap(), 0);
        assert_eq!(mdp.vaccinate(5, AgeGroup::Elderly, VaccineType::Adeno).unwrap(), 0);
        let elderly = mdp.age_groups().unwrap();
        assert_eq!(elderly.sampled(AgeGroup::Elderly), 0);
        assert_eq!(
            mdp.vaccinate_childless(5, ChildlessAgeGroup::ElderlyC, VaccineType::MRna)
                .unwrap(),
            0
        );
    }

    #[test]
    fn simulate_then_end() {
        let dir = tempfile::tempdir().unwrap();
        let mut mdp = created(dir.path());
        let infected = mdp.simulate(3).unwrap();
        assert!(infected >= 5);
        assert_eq!(mdp.current_day(), 3);
        assert_eq!(
            mdp.count_infected_cases() + mdp.population().unwrap().count_by_status(HealthStatus::Recovered),
            infected
        );
        mdp.end().unwrap();
        mdp.end().unwrap();
        assert!(matches!(mdp.simulate_day(), Err(StrideError::Ended)));
        assert!(matches!(
            mdp.simulate_vaccinate(1, 1, AgeGroup::Adults, VaccineType::MRna),
            Err(StrideError::Ended)
        ));
        assert_eq!(mdp.get_total_infected(), infected);
        let summary = std::fs::read_to_string(dir.path().join("run").join("summary.csv")).unwrap();
        assert_eq!(summary.lines().count(), 2);
    }

    #[test]
    fn childless_with_partial_uptake() {
        let dir = tempfile::tempdir().unwrap();
        let mut mdp = Mdp::new();
        let options = CreateOptions {
            childless: true,
            uptake: 0.5,
            ..options(dir.path())
        };
        mdp.create(&config("None"), options).unwrap();
        assert!(mdp.age_groups().is_none());
        let index = mdp.childless_age_groups().unwrap();
        assert_eq!(index.initial_size(ChildlessAgeGroup::ChildrenC), 0);
        assert!(index.total_remaining() <= 56);
        assert_eq!(mdp.vaccinate(5, AgeGroup::Adults, VaccineType::MRna).unwrap(), 0);
    }

    #[test]
    fn rejects_bad_uptake_and_clears_twice() {
        let dir = tempfile::tempdir().unwrap();
        let mut mdp = created(dir.path());
        let options = CreateOptions {
            uptake: 1.5,
            ..options(dir.path())
        };
        assert!(matches!(
            mdp.create(&config("None"), options),
            Err(StrideError::ConfigInvalid(_))
        ));
        assert!(!mdp.is_created());
        mdp.clear_simulation();
        mdp.clear_simulation();
        assert_eq!(mdp.get_population_size(), 0);
    }
}
