//! The calendar is the authoritative source of per-day policy state: holidays, distancing
//! factors, contact tracing, universal testing, household clustering permission and imported
//! cases. Every schedule is a vector over the simulation horizon, so each query is a lookup at
//! today's day index.
pub mod schedule;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use log::debug;

use crate::config::SimulationConfig;
use crate::StrideError;
pub use schedule::{load_schedule, ScheduleCategory, ScheduleEntry};

/// The policy state of one day, copied out of the calendar so that the day's work does not
/// hold a borrow of it.
#[derive(Clone, Debug, PartialEq)]
pub struct DayPolicy {
    pub day: usize,
    pub is_regular_weekday: bool,
    pub workplace_distancing: f64,
    pub community_distancing: f64,
    pub collectivity_distancing: f64,
    pub contact_tracing: bool,
    pub universal_testing: bool,
    pub household_clustering_allowed: bool,
    pub imported_cases: u32,
    /// School distancing factor per age for today, `1.0` on weekends and holidays.
    pub school_distancing: Vec<f64>,
}

impl DayPolicy {
    /// School distancing for `age`; ages outside the school matrix get `1.0`.
    #[must_use]
    pub fn school_distancing_factor(&self, age: u32) -> f64 {
        self.school_distancing
            .get(age as usize)
            .copied()
            .unwrap_or(1.0)
    }
}

#[derive(Clone, Debug)]
pub struct Calendar {
    date_start: NaiveDate,
    /// First date after the horizon.
    date_end: NaiveDate,
    current_date: NaiveDate,
    horizon: usize,
    public_holidays: Vec<bool>,
    workplace_distancing: Vec<f64>,
    community_distancing: Vec<f64>,
    collectivity_distancing: Vec<f64>,
    contact_tracing: Vec<bool>,
    universal_testing: Vec<bool>,
    household_clustering: Vec<bool>,
    imported_cases: Vec<u32>,
    /// `[age][day]`
    school_distancing: Vec<Vec<f64>>,
}

impl Calendar {
    /// A calendar of `horizon` days from `date_start` with no measures in place.
    pub fn new(
        date_start: NaiveDate,
        horizon: usize,
        school_age_limit: usize,
    ) -> Result<Self, StrideError> {
        if horizon == 0 {
            return Err(StrideError::ConfigInvalid(
                "the calendar horizon must be positive".to_string(),
            ));
        }
        let date_end = date_start
            .checked_add_days(Days::new(horizon as u64))
            .ok_or_else(|| {
                StrideError::ConfigInvalid(format!("horizon of {horizon} days is out of range"))
            })?;
        Ok(Calendar {
            date_start,
            date_end,
            current_date: date_start,
            horizon,
            public_holidays: vec![false; horizon],
            workplace_distancing: vec![0.0; horizon],
            community_distancing: vec![0.0; horizon],
            collectivity_distancing: vec![0.0; horizon],
            contact_tracing: vec![false; horizon],
            universal_testing: vec![false; horizon],
            household_clustering: vec![false; horizon],
            imported_cases: vec![0; horizon],
            school_distancing: vec![vec![0.0; horizon]; school_age_limit],
        })
    }

    /// Builds the calendar described by the configuration: the horizon is `run.num_days`, the
    /// entries of the schedule file are applied first and the inline entries after them.
    pub fn from_config(config: &SimulationConfig) -> Result<Self, StrideError> {
        let mut calendar = Calendar::new(
            config.start_date()?,
            config.run.num_days,
            config.calendar.school_age_limit,
        )?;
        if let Some(path) = &config.calendar.schedule {
            let entries = load_schedule(&config.resolve_path(path))?;
            calendar.apply_entries(&entries)?;
        }
        calendar.apply_entries(&config.calendar.entries)?;
        Ok(calendar)
    }

    /// Writes schedule entries into the calendar vectors. Days outside the horizon are ignored.
    pub fn apply_entries(&mut self, entries: &[ScheduleEntry]) -> Result<(), StrideError> {
        for entry in entries {
            let (first, last) = entry.date_range()?;
            let is_factor = matches!(
                entry.category,
                ScheduleCategory::SchoolClosure
                    | ScheduleCategory::WorkplaceDistancing
                    | ScheduleCategory::CommunityDistancing
                    | ScheduleCategory::CollectivityDistancing
            );
            if is_factor && !(0.0..=1.0).contains(&entry.value) {
                return Err(StrideError::ConfigInvalid(format!(
                    "{} value {} is outside [0, 1]",
                    entry.category, entry.value
                )));
            }
            if entry.category == ScheduleCategory::ImportedCases && entry.value < 0.0 {
                return Err(StrideError::ConfigInvalid(format!(
                    "imported_cases value {} is negative",
                    entry.value
                )));
            }

            let mut date = first;
            while date <= last {
                match self.day_index_of(date) {
                    Some(day) => self.apply_entry(entry, day)?,
                    None => debug!("{} entry on {date} is outside the horizon", entry.category),
                }
                date = match date.succ_opt() {
                    Some(next) => next,
                    None => break,
                };
            }
        }
        Ok(())
    }

    fn apply_entry(&mut self, entry: &ScheduleEntry, day: usize) -> Result<(), StrideError> {
        let flag = entry.value != 0.0;
        match entry.category {
            ScheduleCategory::PublicHoliday => self.public_holidays[day] = flag,
            ScheduleCategory::WorkplaceDistancing => self.workplace_distancing[day] = entry.value,
            ScheduleCategory::CommunityDistancing => self.community_distancing[day] = entry.value,
            ScheduleCategory::CollectivityDistancing => {
                self.collectivity_distancing[day] = entry.value;
            }
            ScheduleCategory::ContactTracing => self.contact_tracing[day] = flag,
            ScheduleCategory::UniversalTesting => self.universal_testing[day] = flag,
            ScheduleCategory::HouseholdClustering => self.household_clustering[day] = flag,
            ScheduleCategory::ImportedCases => self.imported_cases[day] = entry.value.round() as u32,
            ScheduleCategory::SchoolClosure => match entry.age {
                Some(age) => {
                    let ages = self.school_distancing.len();
                    let row = self.school_distancing.get_mut(age).ok_or_else(|| {
                        StrideError::ConfigInvalid(format!(
                            "school_closure age {age} is outside the school matrix of {ages} ages"
                        ))
                    })?;
                    row[day] = entry.value;
                }
                None => {
                    for row in &mut self.school_distancing {
                        row[day] = entry.value;
                    }
                }
            },
        }
        Ok(())
    }

    fn day_index_of(&self, date: NaiveDate) -> Option<usize> {
        if self.date_start <= date && date < self.date_end {
            usize::try_from((date - self.date_start).num_days()).ok()
        } else {
            None
        }
    }

    /// Today's position in the horizon. Equals the horizon once every day has been simulated.
    #[must_use]
    pub fn day_index(&self) -> usize {
        usize::try_from((self.current_date - self.date_start).num_days()).unwrap_or(0)
    }

    /// Days simulated since the start.
    #[must_use]
    pub fn simulation_day(&self) -> usize {
        self.day_index()
    }

    #[must_use]
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    #[must_use]
    pub fn date_start(&self) -> NaiveDate {
        self.date_start
    }

    #[must_use]
    pub fn date_end(&self) -> NaiveDate {
        self.date_end
    }

    #[must_use]
    pub fn current_date(&self) -> NaiveDate {
        self.current_date
    }

    /// True once the calendar has moved past its last day.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.current_date >= self.date_end
    }

    /// Moves to the next day.
    ///
    /// # Errors
    ///
    /// `OutOfHorizon` if the calendar is already past its last day.
    pub fn advance_day(&mut self) -> Result<(), StrideError> {
        if self.is_finished() {
            return Err(StrideError::OutOfHorizon {
                day: self.day_index() + 1,
                horizon: self.horizon,
            });
        }
        self.current_date = self.current_date.succ_opt().unwrap_or(self.date_end);
        Ok(())
    }

    #[must_use]
    pub fn day(&self) -> u32 {
        self.current_date.day()
    }

    #[must_use]
    pub fn month(&self) -> u32 {
        self.current_date.month()
    }

    #[must_use]
    pub fn year(&self) -> i32 {
        self.current_date.year()
    }

    /// 0 is Sunday, 6 is Saturday.
    #[must_use]
    pub fn day_of_week(&self) -> u32 {
        self.current_date.weekday().num_days_from_sunday()
    }

    #[must_use]
    pub fn is_weekend(&self) -> bool {
        matches!(self.current_date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    #[must_use]
    pub fn is_public_holiday(&self) -> bool {
        self.today(&self.public_holidays, false)
    }

    #[must_use]
    pub fn is_regular_weekday(&self) -> bool {
        !(self.is_weekend() || self.is_public_holiday())
    }

    fn today<T: Copy>(&self, schedule: &[T], default: T) -> T {
        schedule.get(self.day_index()).copied().unwrap_or(default)
    }

    #[must_use]
    pub fn workplace_distancing_factor(&self) -> f64 {
        self.today(&self.workplace_distancing, 0.0)
    }

    #[must_use]
    pub fn community_distancing_factor(&self) -> f64 {
        self.today(&self.community_distancing, 0.0)
    }

    #[must_use]
    pub fn collectivity_distancing_factor(&self) -> f64 {
        self.today(&self.collectivity_distancing, 0.0)
    }

    #[must_use]
    pub fn is_workplace_distancing_enforced(&self) -> bool {
        self.workplace_distancing_factor() > 0.0
    }

    #[must_use]
    pub fn is_community_distancing_enforced(&self) -> bool {
        self.community_distancing_factor() > 0.0
    }

    #[must_use]
    pub fn is_contact_tracing_active(&self) -> bool {
        self.today(&self.contact_tracing, false)
    }

    #[must_use]
    pub fn is_universal_testing_active(&self) -> bool {
        self.today(&self.universal_testing, false)
    }

    #[must_use]
    pub fn is_household_clustering_allowed(&self) -> bool {
        self.today(&self.household_clustering, false)
    }

    #[must_use]
    pub fn imported_cases(&self) -> u32 {
        self.today(&self.imported_cases, 0)
    }

    /// School distancing for `age` today. Schools are closed on weekends and public holidays,
    /// and ages outside the school matrix are never at school; both give `1.0`.
    #[must_use]
    pub fn school_distancing_factor(&self, age: u32) -> f64 {
        match self.school_distancing.get(age as usize) {
            Some(row) if self.is_regular_weekday() => self.today(row, 0.0),
            _ => 1.0,
        }
    }

    /// True if school is fully closed for `age` today. Ages outside the school matrix are not
    /// school ages, so they are never reported as closed.
    #[must_use]
    pub fn is_school_closed(&self, age: u32) -> bool {
        (age as usize) < self.school_distancing.len() && self.school_distancing_factor(age) == 1.0
    }

    #[must_use]
    pub fn day_policy(&self) -> DayPolicy {
        DayPolicy {
            day: self.day_index(),
            is_regular_weekday: self.is_regular_weekday(),
            workplace_distancing: self.workplace_distancing_factor(),
            community_distancing: self.community_distancing_factor(),
            collectivity_distancing: self.collectivity_distancing_factor(),
            contact_tracing: self.is_contact_tracing_active(),
            universal_testing: self.is_universal_testing_active(),
            household_clustering_allowed: self.is_household_clustering_allowed(),
            imported_cases: self.imported_cases(),
            school_distancing: (0..self.school_distancing.len())
                .map(|age| self.school_distancing_factor(age as u32))
                .collect(),
        }
    }

    /// Replaces the workplace, community and collectivity distancing schedules.
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if a vector does not have one entry per day of the horizon,
    /// `ConfigInvalid` if a factor is not a number in `[0, 1]`. The calendar is left unchanged
    /// in both cases.
    pub fn update_cnt_reduction(
        &mut self,
        workplace: Vec<f64>,
        community: Vec<f64>,
        collectivity: Vec<f64>,
    ) -> Result<(), StrideError> {
        for (schedule, values) in [
            ("workplace distancing", &workplace),
            ("community distancing", &community),
            ("collectivity distancing", &collectivity),
        ] {
            if values.len() != self.horizon {
                return Err(StrideError::ShapeMismatch {
                    schedule,
                    expected: self.horizon,
                    found: values.len(),
                });
            }
            if let Some(value) = values.iter().find(|value| !(0.0..=1.0).contains(*value)) {
                return Err(StrideError::ConfigInvalid(format!(
                    "{schedule} factor {value} is outside [0, 1]"
                )));
            }
        }
        self.workplace_distancing = workplace;
        self.community_distancing = community;
        self.collectivity_distancing = collectivity;
        Ok(())
    }
}
