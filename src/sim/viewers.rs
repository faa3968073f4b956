//! Viewers turn lifecycle events into log lines and CSV rows. Which CSV logs are written is
//! selected by the event log level of the run.
use std::time::Duration;

use log::info;
use serde::Serialize;

use crate::config::EventLogMode;
use crate::context::Context;
use crate::define_report;
use crate::population::{ContactType, VaccineType};
use crate::report::ContextReportExt;
use crate::sim::events::{DaySnapshot, SimulationEvent};
use crate::StrideError;

/// One row per simulated day.
#[derive(Serialize, Clone, Debug)]
pub struct IncidenceReport {
    pub day: usize,
    pub susceptible: usize,
    pub exposed: usize,
    pub infectious: usize,
    pub symptomatic: usize,
    pub recovered: usize,
    pub immune: usize,
    pub hospitalised: usize,
    pub total_infected: usize,
    pub new_infections: usize,
}
define_report!(IncidenceReport);

impl From<DaySnapshot> for IncidenceReport {
    fn from(snapshot: DaySnapshot) -> Self {
        let counts = snapshot.counts;
        IncidenceReport {
            day: snapshot.day,
            susceptible: counts.susceptible,
            exposed: counts.exposed,
            infectious: counts.infectious,
            symptomatic: counts.symptomatic,
            recovered: counts.recovered,
            immune: counts.immune,
            hospitalised: counts.hospitalised,
            total_infected: counts.total_infected(),
            new_infections: snapshot.new_infections,
        }
    }
}

/// One row per infection. Imported cases have no infector, contact type or pool.
#[derive(Serialize, Clone, Debug)]
pub struct TransmissionReport {
    pub day: usize,
    pub infector: Option<u32>,
    pub infector_age: Option<u32>,
    pub infected: u32,
    pub infected_age: u32,
    pub contact_type: Option<ContactType>,
    pub pool_id: Option<u32>,
}
define_report!(TransmissionReport);

/// One row per vaccination request.
#[derive(Serialize, Clone, Debug)]
pub struct VaccinationReport {
    pub day: usize,
    pub age_group: String,
    pub vaccine_type: VaccineType,
    pub requested: usize,
    pub administered: usize,
}
define_report!(VaccinationReport);

/// Written once when the run ends.
#[derive(Serialize, Clone, Debug)]
pub struct SummaryReport {
    pub population_size: usize,
    pub days: usize,
    pub total_infected: usize,
    pub total_hospitalised: usize,
    pub immune: usize,
    pub at_risk: usize,
    pub run_time: String,
}
define_report!(SummaryReport);

fn format_run_time(elapsed: Duration) -> String {
    humantime::format_duration(Duration::from_millis(elapsed.as_millis() as u64)).to_string()
}

fn log_event(event: SimulationEvent) {
    match event {
        SimulationEvent::SetupBegin => info!("setting up simulation"),
        SimulationEvent::SetupEnd => info!("simulation set up"),
        SimulationEvent::AtStart(snapshot) => info!(
            "starting with {} persons, {} infected",
            snapshot.counts.total(),
            snapshot.counts.total_infected()
        ),
        SimulationEvent::Stepped(snapshot) => info!(
            "day {}: {} new, {} infected, {} hospitalised",
            snapshot.day,
            snapshot.new_infections,
            snapshot.counts.total_infected(),
            snapshot.counts.hospitalised
        ),
        SimulationEvent::Finished(snapshot, elapsed) => info!(
            "finished after {} days: {} infected in total, run time {}",
            snapshot.day,
            snapshot.counts.total_infected(),
            format_run_time(elapsed)
        ),
    }
}

fn write_summary(context: &mut Context, snapshot: DaySnapshot, elapsed: Duration) {
    let counts = snapshot.counts;
    context.send_report(SummaryReport {
        population_size: counts.total(),
        days: snapshot.day,
        total_infected: counts.total_infected(),
        total_hospitalised: counts.total_hospitalised,
        immune: counts.immune,
        at_risk: counts.at_risk,
        run_time: format_run_time(elapsed),
    });
}

/// Subscribes the log viewer and opens the CSV logs for `mode` under the current report
/// options. The summary is written in every mode.
///
/// # Errors
///
/// Returns a `StrideError` if a report file cannot be created.
pub fn register_viewers(context: &mut Context, mode: EventLogMode) -> Result<(), StrideError> {
    context.subscribe_to_event(|_, event: SimulationEvent| log_event(event));

    if mode >= EventLogMode::Incidence {
        context.add_report::<IncidenceReport>("incidence")?;
        context.subscribe_to_event(|context, event: SimulationEvent| {
            if let SimulationEvent::Stepped(snapshot) = event {
                context.send_report(IncidenceReport::from(snapshot));
            }
        });
    }
    if mode >= EventLogMode::Transmissions {
        context.add_report::<TransmissionReport>("transmissions")?;
    }
    if mode >= EventLogMode::All {
        context.add_report::<VaccinationReport>("vaccinations")?;
    }

    context.add_report::<SummaryReport>("summary")?;
    context.subscribe_to_event(|context, event: SimulationEvent| {
        if let SimulationEvent::Finished(snapshot, elapsed) = event {
            write_summary(context, snapshot, elapsed);
        }
    });
    Ok(())
}
