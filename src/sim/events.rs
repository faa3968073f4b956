use std::time::Duration;

use crate::context::Event;
use crate::population::{ContactType, HealthCounts};

/// The aggregate state after a day, handed to viewers so they need no access to the
/// population.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DaySnapshot {
    /// Number of days simulated so far.
    pub day: usize,
    pub counts: HealthCounts,
    /// Persons who became exposed during the last day, imported cases included.
    pub new_infections: usize,
}

/// Lifecycle notifications emitted by the runner.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SimulationEvent {
    SetupBegin,
    SetupEnd,
    /// Emitted once, right before the first day is stepped.
    AtStart(DaySnapshot),
    Stepped(DaySnapshot),
    /// The last snapshot and the wall-clock time since the runner started.
    Finished(DaySnapshot, Duration),
}
impl Event for SimulationEvent {}

/// A transmission on a day with contact tracing active.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ContactTraceEvent {
    pub day: usize,
    pub infector: u32,
    pub infected: u32,
    pub contact_type: ContactType,
    pub pool_id: u32,
}
impl Event for ContactTraceEvent {}
