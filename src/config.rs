//! The simulation configuration document and the output location derived from it.
//!
//! Configuration is a JSON document with one section per concern:
//!
//! ```json
//! {
//!   "run": { "num_days": 30, "num_threads": 4, "rng_seed": "1,2,3,4", "output_prefix": "" },
//!   "calendar": { "start_date": "2020-03-01", "schedule": "schedule.csv" },
//!   "population": { "source": { "synthetic": { "size": 1000 } }, "immunity_rate": 0.0 },
//!   "disease": { "transmission": { "probability": 0.05 }, "age_bands": [ ... ] },
//!   "contacts": { "household": { "rate": 1.0 } },
//!   "vaccines": { "mRNA": { "kind": "constant", ... } }
//! }
//! ```
//!
//! Relative paths inside the document resolve against the directory of the file it was read
//! from.
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::calendar::schedule::ScheduleEntry;
use crate::log::{parse_log_level, LOG_FILE_NAME};
use crate::population::VaccineTable;
use crate::random::RngSeed;
use crate::StrideError;

const DEFAULT_SCHOOL_AGE_LIMIT: usize = 26;
const TIMESTAMP_TAG_FORMAT: &str = "%Y-%m-%d_%H-%M-%S/";

fn default_num_threads() -> usize {
    1
}

fn default_rng_seed() -> String {
    RngSeed::default().to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_school_age_limit() -> usize {
    DEFAULT_SCHOOL_AGE_LIMIT
}

fn default_one() -> f64 {
    1.0
}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(date: &str) -> Result<NaiveDate, StrideError> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|e| StrideError::ConfigInvalid(format!("unparseable date `{date}`: {e}")))
}

/// Which CSV event logs a run writes. Each level includes the ones before it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventLogMode {
    None,
    #[default]
    Incidence,
    Transmissions,
    All,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub num_days: usize,
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
    #[serde(default = "default_rng_seed")]
    pub rng_seed: String,
    #[serde(default)]
    pub output_prefix: String,
    #[serde(default)]
    pub event_log_level: EventLogMode,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CalendarConfig {
    pub start_date: String,
    /// A JSON or CSV file of schedule entries.
    #[serde(default)]
    pub schedule: Option<PathBuf>,
    /// Entries given inline, applied after those of `schedule`.
    #[serde(default)]
    pub entries: Vec<ScheduleEntry>,
    /// Number of age rows in the school distancing matrix.
    #[serde(default = "default_school_age_limit")]
    pub school_age_limit: usize,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopulationSource {
    /// A CSV file with one row per person.
    File(PathBuf),
    Synthetic(SyntheticPopulationConfig),
}

fn default_household_size_weights() -> Vec<f64> {
    vec![0.25, 0.30, 0.15, 0.15, 0.10, 0.05]
}

fn default_child_fraction() -> f64 {
    0.35
}

fn default_elderly_fraction() -> f64 {
    0.2
}

fn default_school_size() -> usize {
    20
}

fn default_employment_rate() -> f64 {
    0.7
}

fn default_workplace_size() -> usize {
    10
}

fn default_community_size() -> usize {
    500
}

fn default_households_per_cluster() -> usize {
    4
}

/// Parameters of the built-in population generator.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyntheticPopulationConfig {
    pub size: usize,
    /// Relative frequency of households with 1, 2, 3, ... members.
    #[serde(default = "default_household_size_weights")]
    pub household_size_weights: Vec<f64>,
    /// Chance that a household member other than the first is under 19.
    #[serde(default = "default_child_fraction")]
    pub child_fraction: f64,
    /// Chance that an adult is 65 or older.
    #[serde(default = "default_elderly_fraction")]
    pub elderly_fraction: f64,
    #[serde(default = "default_school_size")]
    pub school_size: usize,
    #[serde(default = "default_employment_rate")]
    pub employment_rate: f64,
    #[serde(default = "default_workplace_size")]
    pub workplace_size: usize,
    #[serde(default = "default_community_size")]
    pub community_size: usize,
    #[serde(default = "default_households_per_cluster")]
    pub households_per_cluster: usize,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PopulationConfig {
    pub source: PopulationSource,
    /// Fraction of persons who are immune when the simulation starts.
    #[serde(default)]
    pub immunity_rate: f64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum TransmissionConfig {
    Probability {
        probability: f64,
        #[serde(default)]
        age_factors: Vec<f64>,
    },
    /// Probability `b0 + b1 * r0 + b2 * r0^2`.
    FromR0 {
        r0: f64,
        b0: f64,
        b1: f64,
        b2: f64,
        #[serde(default)]
        age_factors: Vec<f64>,
    },
}

/// A stage duration: a fixed number of days, or weights for 1, 2, 3, ... days.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum DurationConfig {
    Fixed(u16),
    Weights(Vec<f64>),
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgeBandConfig {
    pub min_age: u32,
    pub max_age: u32,
    pub latent: DurationConfig,
    pub pre_symptomatic: DurationConfig,
    pub symptomatic: DurationConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HospitalisationConfig {
    /// Lower age bound of each category, ascending.
    pub age_categories: Vec<u32>,
    pub probabilities: Vec<f64>,
    /// Days from symptom onset to admission.
    pub delays: Vec<u16>,
    #[serde(default = "default_one")]
    pub probability_factor: f64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiseaseConfig {
    pub transmission: TransmissionConfig,
    pub age_bands: Vec<AgeBandConfig>,
    #[serde(default)]
    pub hospitalisation: Option<HospitalisationConfig>,
}

/// Contact rates of one contact type: a single rate for every age pair or a full
/// `[infector age][contact age]` matrix.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContactProfileConfig {
    #[serde(default)]
    pub rate: Option<f64>,
    #[serde(default)]
    pub matrix: Option<Vec<Vec<f64>>>,
    /// Divide the rate by the number of other pool members.
    #[serde(default)]
    pub per_capita: bool,
}

/// Contact profiles per contact type. A missing profile means no contacts of that type.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContactsConfig {
    #[serde(default)]
    pub household: Option<ContactProfileConfig>,
    #[serde(default)]
    pub school: Option<ContactProfileConfig>,
    #[serde(default)]
    pub workplace: Option<ContactProfileConfig>,
    #[serde(default)]
    pub primary_community: Option<ContactProfileConfig>,
    #[serde(default)]
    pub secondary_community: Option<ContactProfileConfig>,
    #[serde(default)]
    pub household_cluster: Option<ContactProfileConfig>,
    #[serde(default = "default_one")]
    pub household_cluster_intensity: f64,
}

impl Default for ContactsConfig {
    fn default() -> Self {
        ContactsConfig {
            household: None,
            school: None,
            workplace: None,
            primary_community: None,
            secondary_community: None,
            household_cluster: None,
            household_cluster_intensity: 1.0,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    pub run: RunConfig,
    pub calendar: CalendarConfig,
    pub population: PopulationConfig,
    pub disease: DiseaseConfig,
    #[serde(default)]
    pub contacts: ContactsConfig,
    #[serde(default)]
    pub vaccines: VaccineTable,
    /// Directory relative paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl SimulationConfig {
    /// Reads and validates the configuration file at `path`.
    pub fn from_file(path: &Path) -> Result<Self, StrideError> {
        let json = fs::read_to_string(path).map_err(|e| {
            StrideError::ConfigInvalid(format!("cannot read {}: {e}", path.display()))
        })?;
        let base_dir = path.parent().unwrap_or(Path::new("")).to_path_buf();
        Self::from_json_str(&json, base_dir)
    }

    /// Parses and validates a configuration document.
    pub fn from_json_str(json: &str, base_dir: PathBuf) -> Result<Self, StrideError> {
        let mut config: SimulationConfig = serde_json::from_str(json)
            .map_err(|e| StrideError::ConfigInvalid(format!("malformed configuration: {e}")))?;
        config.base_dir = base_dir;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values serde cannot. Schedules, profiles and the population are checked
    /// when they are built.
    pub fn validate(&self) -> Result<(), StrideError> {
        if self.run.num_days == 0 {
            return Err(StrideError::ConfigInvalid(
                "run.num_days must be positive".to_string(),
            ));
        }
        self.start_date()?;
        self.rng_seed()?;
        self.log_level()?;
        if !(0.0..=1.0).contains(&self.population.immunity_rate) {
            return Err(StrideError::ConfigInvalid(format!(
                "population.immunity_rate = {} is outside [0, 1]",
                self.population.immunity_rate
            )));
        }
        if self.contacts.household_cluster_intensity < 0.0 {
            return Err(StrideError::ConfigInvalid(
                "contacts.household_cluster_intensity must not be negative".to_string(),
            ));
        }
        if self.disease.age_bands.is_empty() {
            return Err(StrideError::ConfigInvalid(
                "disease.age_bands must not be empty".to_string(),
            ));
        }
        self.vaccines.validate()
    }

    #[must_use]
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn start_date(&self) -> Result<NaiveDate, StrideError> {
        parse_date(&self.calendar.start_date)
    }

    pub fn rng_seed(&self) -> Result<RngSeed, StrideError> {
        self.run.rng_seed.parse()
    }

    pub fn log_level(&self) -> Result<LevelFilter, StrideError> {
        parse_log_level(&self.run.log_level)
    }

    /// Worker threads for the infector, at least one.
    #[must_use]
    pub fn num_threads(&self) -> usize {
        self.run.num_threads.max(1)
    }
}

/// Where a run writes its files: `<directory>/<file_prefix><name>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputLocation {
    pub directory: PathBuf,
    pub file_prefix: String,
}

impl OutputLocation {
    /// Works out the output location from the output directory and prefix. An empty prefix
    /// falls back to `config_prefix` and then to a timestamp tag. A prefix ending in `/` names
    /// a directory; otherwise its last component becomes a file prefix.
    #[must_use]
    pub fn resolve(output_dir: &Path, prefix: &str, config_prefix: &str) -> Self {
        let prefix = if !prefix.is_empty() {
            prefix.to_string()
        } else if !config_prefix.is_empty() {
            config_prefix.to_string()
        } else {
            chrono::Local::now().format(TIMESTAMP_TAG_FORMAT).to_string()
        };

        if prefix.ends_with('/') || prefix.ends_with(std::path::MAIN_SEPARATOR) {
            return OutputLocation {
                directory: output_dir.join(prefix.trim_end_matches(['/', std::path::MAIN_SEPARATOR])),
                file_prefix: String::new(),
            };
        }
        let full = output_dir.join(&prefix);
        let directory = full
            .parent()
            .map_or_else(|| output_dir.to_path_buf(), Path::to_path_buf);
        let name = full
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        OutputLocation {
            directory,
            file_prefix: format!("{name}_"),
        }
    }

    /// Creates the output directory.
    pub fn create(&self) -> Result<(), StrideError> {
        fs::create_dir_all(&self.directory).map_err(|source| {
            StrideError::OutputPathUnwritable {
                path: self.directory.clone(),
                source,
            }
        })
    }

    #[must_use]
    pub fn file(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{}{name}", self.file_prefix))
    }

    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.file(LOG_FILE_NAME)
    }
}
