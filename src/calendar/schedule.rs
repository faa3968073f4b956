//! Schedule entries that populate the calendar, read from JSON or CSV.
//!
//! Both formats carry the same fields. In JSON the file is an array of entries:
//!
//! ```json
//! [
//!   { "category": "public_holiday", "date": "2020-04-13" },
//!   { "category": "workplace_distancing", "date": "2020-03-16", "end_date": "2020-05-03", "value": 0.8 },
//!   { "category": "school_closure", "date": "2020-03-16", "end_date": "2020-06-30", "age": 12 }
//! ]
//! ```
//!
//! and in CSV the columns are `category,date,end_date,value,age` with empty cells for absent
//! values.
use std::ffi::OsStr;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use strum::{Display, EnumString};

use crate::config::parse_date;
use crate::StrideError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScheduleCategory {
    PublicHoliday,
    /// Per-age school distancing; `value` 1 closes school for the age.
    SchoolClosure,
    WorkplaceDistancing,
    CommunityDistancing,
    CollectivityDistancing,
    ContactTracing,
    UniversalTesting,
    HouseholdClustering,
    /// `value` is the number of cases imported on each day of the entry.
    ImportedCases,
}

fn default_value() -> f64 {
    1.0
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleEntry {
    pub category: ScheduleCategory,
    pub date: String,
    /// Last day the entry applies to, inclusive. Defaults to `date`.
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default = "default_value")]
    pub value: f64,
    /// For school closures, the single age the entry applies to. All ages if absent.
    #[serde(default)]
    pub age: Option<usize>,
}

impl ScheduleEntry {
    /// The inclusive date range the entry covers.
    pub fn date_range(&self) -> Result<(NaiveDate, NaiveDate), StrideError> {
        let first = parse_date(&self.date)?;
        let last = match &self.end_date {
            Some(end_date) if !end_date.trim().is_empty() => parse_date(end_date)?,
            _ => first,
        };
        if last < first {
            return Err(StrideError::ConfigInvalid(format!(
                "{} entry ends on {last} before it starts on {first}",
                self.category
            )));
        }
        Ok((first, last))
    }
}

fn unreadable(path: &Path, error: impl std::fmt::Display) -> StrideError {
    StrideError::ConfigInvalid(format!("cannot read schedule {}: {error}", path.display()))
}

/// Loads schedule entries from a `.json` or `.csv` file.
pub fn load_schedule(path: &Path) -> Result<Vec<ScheduleEntry>, StrideError> {
    match path.extension().and_then(OsStr::to_str) {
        Some("json") => {
            let file = File::open(path).map_err(|e| unreadable(path, e))?;
            serde_json::from_reader(BufReader::new(file)).map_err(|e| unreadable(path, e))
        }
        Some("csv") => {
            let mut reader = csv::Reader::from_path(path).map_err(|e| unreadable(path, e))?;
            reader
                .deserialize()
                .collect::<Result<Vec<ScheduleEntry>, _>>()
                .map_err(|e| unreadable(path, e))
        }
        _ => Err(StrideError::ConfigInvalid(format!(
            "schedule {} must be a .json or .csv file",
            path.display()
        ))),
    }
}
