use std::time::{Duration, Instant};

use log::{info, trace};

use crate::context::Context;
use crate::sim::events::{DaySnapshot, SimulationEvent};
use crate::sim::Simulator;
use crate::StrideError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunnerState {
    Created,
    Started,
    Stepping,
    Ended,
}

/// Drives a [`Simulator`] one day at a time and tells the subscribed viewers about it.
///
/// Lifecycle events are emitted through the [`Context`] and delivered before the call that
/// emitted them returns.
pub struct Runner {
    simulator: Simulator,
    state: RunnerState,
    started: Option<Instant>,
    elapsed: Duration,
}

impl Runner {
    #[must_use]
    pub fn new(simulator: Simulator) -> Self {
        Runner {
            simulator,
            state: RunnerState::Created,
            started: None,
            elapsed: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn state(&self) -> RunnerState {
        self.state
    }

    #[must_use]
    pub fn simulator(&self) -> &Simulator {
        &self.simulator
    }

    pub fn simulator_mut(&mut self) -> &mut Simulator {
        &mut self.simulator
    }

    /// Wall-clock time since setup, frozen by [`Runner::end`].
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        match (self.state, self.started) {
            (RunnerState::Ended, _) | (_, None) => self.elapsed,
            (_, Some(started)) => started.elapsed(),
        }
    }

    /// Emits `SetupBegin` and `SetupEnd` and starts the clock. Does nothing after the first
    /// call.
    ///
    /// # Errors
    ///
    /// `Ended` if the runner has been ended.
    pub fn setup(&mut self, context: &mut Context) -> Result<(), StrideError> {
        match self.state {
            RunnerState::Ended => return Err(StrideError::Ended),
            RunnerState::Started | RunnerState::Stepping => return Ok(()),
            RunnerState::Created => {}
        }
        context.emit_event(SimulationEvent::SetupBegin);
        context.execute_callbacks();
        self.started = Some(Instant::now());
        self.state = RunnerState::Started;
        context.emit_event(SimulationEvent::SetupEnd);
        context.execute_callbacks();
        trace!("runner set up");
        Ok(())
    }

    /// Simulates one day. The first step emits `AtStart` before stepping; every step emits
    /// `Stepped` after it.
    ///
    /// # Errors
    ///
    /// `Ended` after [`Runner::end`], `OutOfHorizon` when the calendar has no days left. The
    /// runner is unchanged by either.
    pub fn step(&mut self, context: &mut Context) -> Result<DaySnapshot, StrideError> {
        match self.state {
            RunnerState::Ended => return Err(StrideError::Ended),
            RunnerState::Created => self.setup(context)?,
            RunnerState::Started | RunnerState::Stepping => {}
        }
        if self.state == RunnerState::Started {
            context.emit_event(SimulationEvent::AtStart(self.simulator.snapshot()));
            context.execute_callbacks();
            self.state = RunnerState::Stepping;
        }

        let snapshot = self.simulator.time_step(context)?;
        context.emit_event(SimulationEvent::Stepped(snapshot));
        context.execute_callbacks();
        Ok(snapshot)
    }

    /// Steps `days` days and returns the last snapshot.
    pub fn run(&mut self, context: &mut Context, days: usize) -> Result<DaySnapshot, StrideError> {
        let mut snapshot = self.simulator.snapshot();
        for _ in 0..days {
            snapshot = self.step(context)?;
        }
        Ok(snapshot)
    }

    /// Emits `Finished` and stops the clock. Later calls do nothing.
    pub fn end(&mut self, context: &mut Context) {
        if self.state == RunnerState::Ended {
            return;
        }
        self.elapsed = self.elapsed();
        self.state = RunnerState::Ended;
        let snapshot = self.simulator.snapshot();
        info!(
            "simulation ended after {} days in {}",
            snapshot.day,
            humantime::format_duration(Duration::from_millis(self.elapsed.as_millis() as u64))
        );
        context.emit_event(SimulationEvent::Finished(snapshot, self.elapsed));
        context.execute_callbacks();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use chrono::NaiveDate;

    use super::*;
    use crate::calendar::Calendar;
    use crate::contact::AgeContactProfiles;
    use crate::disease::{DiseaseProfile, HospitalisationProfile, TransmissionProfile};
    use crate::population::tests::small_population;
    use crate::random::ContextRandomExt;
    use crate::sim::SimulatorParams;

    fn runner(horizon: usize) -> Runner {
        let calendar =
            Calendar::new(NaiveDate::from_ymd_opt(2020, 3, 2).unwrap(), horizon, 26).unwrap();
        let params = SimulatorParams {
            transmission: TransmissionProfile::new(0.1),
            disease: DiseaseProfile::fixed(1, 1, 1),
            hospitalisation: HospitalisationProfile::default(),
            contact_profiles: AgeContactProfiles::default(),
            household_cluster_intensity: 1.0,
        };
        Runner::new(Simulator::new(small_population(), calendar, params, 1).unwrap())
    }

    fn recording_context() -> (Context, Rc<RefCell<Vec<SimulationEvent>>>) {
        let mut context = Context::new();
        context.init_random(1);
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        context.subscribe_to_event(move |_, event: SimulationEvent| {
            sink.borrow_mut().push(event);
        });
        (context, events)
    }

    fn names(events: &[SimulationEvent]) -> Vec<&'static str> {
        events
            .iter()
            .map(|event| match event {
                SimulationEvent::SetupBegin => "setup_begin",
                SimulationEvent::SetupEnd => "setup_end",
                SimulationEvent::AtStart(_) => "at_start",
                SimulationEvent::Stepped(_) => "stepped",
                SimulationEvent::Finished(..) => "finished",
            })
            .collect()
    }

    #[test]
    fn lifecycle_events_arrive_in_order() {
        let (mut context, events) = recording_context();
        let mut runner = runner(3);
        assert_eq!(runner.state(), RunnerState::Created);
        runner.setup(&mut context).unwrap();
        assert_eq!(runner.state(), RunnerState::Started);
        runner.step(&mut context).unwrap();
        assert_eq!(runner.state(), RunnerState::Stepping);
        runner.step(&mut context).unwrap();
        runner.end(&mut context);
        assert_eq!(
            names(&events.borrow()),
            vec!["setup_begin", "setup_end", "at_start", "stepped", "stepped", "finished"]
        );
        match events.borrow().last() {
            Some(SimulationEvent::Finished(snapshot, _)) => assert_eq!(snapshot.day, 2),
            other => panic!("unexpected last event {other:?}"),
        };
    }

    #[test]
    fn first_step_sets_up_implicitly() {
        let (mut context, events) = recording_context();
        let mut runner = runner(3);
        let snapshot = runner.step(&mut context).unwrap();
        assert_eq!(snapshot.day, 1);
        assert_eq!(
            names(&events.borrow()),
            vec!["setup_begin", "setup_end", "at_start", "stepped"]
        );
    }

    #[test]
    fn step_after_end_fails() {
        let (mut context, events) = recording_context();
        let mut runner = runner(3);
        runner.step(&mut context).unwrap();
        runner.end(&mut context);
        runner.end(&mut context);
        assert!(matches!(runner.step(&mut context), Err(StrideError::Ended)));
        assert!(matches!(runner.setup(&mut context), Err(StrideError::Ended)));
        let finished = names(&events.borrow())
            .into_iter()
            .filter(|name| *name == "finished")
            .count();
        assert_eq!(finished, 1);
    }

    #[test]
    fn out_of_horizon_leaves_the_runner_usable() {
        let (mut context, _) = recording_context();
        let mut runner = runner(1);
        runner.run(&mut context, 1).unwrap();
        assert!(matches!(
            runner.step(&mut context),
            Err(StrideError::OutOfHorizon { .. })
        ));
        assert_eq!(runner.state(), RunnerState::Stepping);
        assert_eq!(runner.simulator().snapshot().day, 1);
        runner.end(&mut context);
        assert_eq!(runner.state(), RunnerState::Ended);
    }
}
