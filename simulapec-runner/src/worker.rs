//! Background worker thread: the controller runs here.
//!
//! Observer callbacks are forwarded as [`RunEvent`]s over an `mpsc`
//! channel. The interactive side reads events, answers the time estimate
//! through the [`ControlHandle`], and joins the worker for the outcome.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::controller::{ControlHandle, RunController, RunError, RunObserver, RunOutcome, RunState};
use crate::result::{RowResult, TimeEstimate};

/// Events sent from the worker to the interactive side.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    State(RunState),
    Estimate(TimeEstimate),
    InnerProgress { completed: usize, total: usize },
    OuterProgress { completed: usize, total: usize },
    RowDone(Box<RowResult>),
}

/// Forwards observer callbacks into a channel. A closed receiver is ignored.
pub struct ChannelObserver {
    tx: Sender<RunEvent>,
}

impl ChannelObserver {
    pub fn new(tx: Sender<RunEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: RunEvent) {
        let _ = self.tx.send(event);
    }
}

impl RunObserver for ChannelObserver {
    fn on_state(&self, state: RunState) {
        self.send(RunEvent::State(state));
    }

    fn on_estimate(&self, estimate: &TimeEstimate) {
        self.send(RunEvent::Estimate(*estimate));
    }

    fn on_inner_progress(&self, completed: usize, total: usize) {
        self.send(RunEvent::InnerProgress { completed, total });
    }

    fn on_outer_progress(&self, completed: usize, total: usize) {
        self.send(RunEvent::OuterProgress { completed, total });
    }

    fn on_row(&self, row: &RowResult) {
        self.send(RunEvent::RowDone(Box::new(row.clone())));
    }
}

/// A controller running on its own thread.
pub struct SimulationWorker {
    events: Receiver<RunEvent>,
    control: ControlHandle,
    handle: JoinHandle<RunOutcome>,
}

impl SimulationWorker {
    pub fn events(&self) -> &Receiver<RunEvent> {
        &self.events
    }

    pub fn control(&self) -> &ControlHandle {
        &self.control
    }

    /// Wait for the run to finish. A panicked worker becomes a failed outcome.
    pub fn join(self) -> RunOutcome {
        match self.handle.join() {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "worker panicked".to_string());
                RunOutcome::Failed(RunError::Worker(message))
            }
        }
    }
}

/// Move `controller` onto a named worker thread and start the run.
pub fn spawn_simulation(controller: RunController) -> Result<SimulationWorker, RunError> {
    let (tx, events) = mpsc::channel();
    let control = controller.handle();

    let handle = thread::Builder::new()
        .name("simulapec-worker".into())
        .spawn(move || {
            debug!("worker started");
            let observer = ChannelObserver::new(tx);
            controller.run(&observer)
        })
        .map_err(|e| RunError::Worker(e.to_string()))?;

    Ok(SimulationWorker {
        events,
        control,
        handle,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawFields;

    fn controller() -> RunController {
        let mut controller = RunController::new();
        controller
            .configure(&RawFields {
                population_size: "40".into(),
                admissible_error: "2,5".into(),
                base_tail_percent: "10".into(),
                max_tail_percent: "20".into(),
                tail_interval: "10".into(),
                n_iterations: "10".into(),
            })
            .unwrap();
        controller
    }

    #[test]
    fn worker_reports_estimate_then_completes() {
        let worker = spawn_simulation(controller()).unwrap();
        let mut events = Vec::new();
        for event in worker.events().iter() {
            if matches!(event, RunEvent::Estimate(_)) {
                worker.control().confirm();
            }
            let done = matches!(event, RunEvent::State(s) if s.is_terminal());
            events.push(event);
            if done {
                break;
            }
        }
        let outcome = worker.join();
        assert_eq!(outcome.state(), RunState::Completed);

        let outer: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                RunEvent::OuterProgress { completed, total } => Some((*completed, *total)),
                _ => None,
            })
            .collect();
        assert_eq!(outer, vec![(1, 2), (2, 2)]);
        // 40 × 0.6 = 24 → sizes 5..=20, four per row
        let inner = events
            .iter()
            .filter(|e| matches!(e, RunEvent::InnerProgress { .. }))
            .count();
        assert_eq!(inner, 8);
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, RunEvent::RowDone(_)))
                .count(),
            2
        );
    }

    #[test]
    fn worker_abort_yields_cancelled() {
        let worker = spawn_simulation(controller()).unwrap();
        worker.control().abort();
        assert_eq!(worker.join(), RunOutcome::Cancelled { rows: vec![] });
    }

    #[test]
    fn dropped_receiver_does_not_stop_worker() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let observer = ChannelObserver::new(tx);
        observer.on_state(RunState::Running);
        observer.on_outer_progress(1, 1);
    }
}
