//! Run controller: the state machine behind one simulation.
//!
//! ```text
//! Idle → Configuring → Probing → AwaitingConfirmation → Running → Completed
//!                                        │                  │
//!                                        └→ Cancelled ←─────┤
//!                                                           └→ Failed
//! ```
//!
//! The controller is consumed by [`RunController::run`], which blocks the
//! calling thread (normally the worker from [`crate::worker`]). The
//! interactive side talks to it through a cloneable [`ControlHandle`]:
//! a one-shot decision cell for the time estimate and an atomic flag
//! polled before each grid row.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rayon::ThreadPool;
use thiserror::Error;
use tracing::{debug, info, warn};

use simulapec_core::{
    estimate, time_probe, CurvePair, EstimateError, RngHierarchy, SimulationGrid, StandardDraw,
    SynthesisError,
};

use crate::config::{ConfigError, RawFields, SimulationConfig};
use crate::decision::{Decision, DecisionCell};
use crate::real_data::RealPopulation;
use crate::result::{PopulationSource, RowResult, SimulationResult, TimeEstimate, SCHEMA_VERSION};

// ─── States ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Configuring,
    Probing,
    AwaitingConfirmation,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Cancelled | RunState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Configuring => "configuring",
            RunState::Probing => "probing",
            RunState::AwaitingConfirmation => "awaiting confirmation",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Cancelled => "cancelled",
            RunState::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where in a run an estimator error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Probe,
    Row { tail_percent: u32 },
    Overlay,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStage::Probe => f.write_str("time probe"),
            RunStage::Row { tail_percent } => write!(f, "row {tail_percent}%"),
            RunStage::Overlay => f.write_str("real-data overlay"),
        }
    }
}

// ─── Errors & outcomes ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunError {
    #[error("controller has no configuration")]
    NotConfigured,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("synthesis failed for tail {tail_percent}%: {source}")]
    Synthesis {
        tail_percent: u32,
        source: SynthesisError,
    },

    #[error("{stage} failed: {source}")]
    Estimate {
        stage: RunStage,
        source: EstimateError,
    },

    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),

    #[error("worker thread failed: {0}")]
    Worker(String),
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(Box<SimulationResult>),
    /// Rows finished before the cancellation was seen. Never reported as final.
    Cancelled { rows: Vec<RowResult> },
    Failed(RunError),
}

impl RunOutcome {
    pub fn state(&self) -> RunState {
        match self {
            RunOutcome::Completed(_) => RunState::Completed,
            RunOutcome::Cancelled { .. } => RunState::Cancelled,
            RunOutcome::Failed(_) => RunState::Failed,
        }
    }
}

// ─── Observers ───────────────────────────────────────────────────────

/// Receives run events on the controller's thread. All methods default to no-ops.
pub trait RunObserver: Sync {
    fn on_state(&self, _state: RunState) {}
    fn on_estimate(&self, _estimate: &TimeEstimate) {}
    /// `(completed sample sizes, total sample sizes)` within the current row.
    fn on_inner_progress(&self, _completed: usize, _total: usize) {}
    /// `(completed rows, total rows)`.
    fn on_outer_progress(&self, _completed: usize, _total: usize) {}
    fn on_row(&self, _row: &RowResult) {}
}

pub struct NullObserver;

impl RunObserver for NullObserver {}

// ─── Control handle ──────────────────────────────────────────────────

/// Shared controls for a running simulation.
#[derive(Debug, Clone, Default)]
pub struct ControlHandle {
    cancel: Arc<AtomicBool>,
    decision: Arc<DecisionCell>,
}

impl ControlHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept the time estimate. Returns false if a decision was already made.
    pub fn confirm(&self) -> bool {
        self.decision.resolve(Decision::Continue)
    }

    /// Reject the time estimate. Returns false if a decision was already made.
    pub fn abort(&self) -> bool {
        self.decision.resolve(Decision::Abort)
    }

    /// Stop before the next row. Also aborts a pending confirmation.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
        self.decision.resolve(Decision::Abort);
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn wait_for_decision(&self) -> Decision {
        self.decision.wait()
    }
}

// ─── Shared run setup ────────────────────────────────────────────────

/// Everything built once per run: pool, grid, reference draw, sampling seeds.
struct Session {
    pool: ThreadPool,
    grid: SimulationGrid,
    draw: StandardDraw,
    sampling: RngHierarchy,
}

impl Session {
    fn prepare(config: &SimulationConfig) -> Result<Self, RunError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("simulapec-pool-{i}"))
            .build()
            .map_err(|e| RunError::ThreadPool(e.to_string()))?;
        let draw = StandardDraw::generate(config.population_size, config.reference_seed).map_err(
            |source| RunError::Synthesis {
                tail_percent: config.base_tail_percent,
                source,
            },
        )?;
        Ok(Self {
            pool,
            grid: config.grid(),
            draw,
            sampling: RngHierarchy::new(config.sampling_seed),
        })
    }

    fn probe(&self, config: &SimulationConfig) -> Result<TimeEstimate, RunError> {
        let tail = config.base_tail_percent;
        let population = self
            .draw
            .calibrate(config.admissible_error, f64::from(tail))
            .map_err(|source| RunError::Synthesis {
                tail_percent: tail,
                source,
            })?;
        let params = config.estimator_params(tail);
        let stream = self.sampling.stream("probe");
        let elapsed = self
            .pool
            .install(|| {
                time_probe(
                    population.values(),
                    &self.grid.sample_sizes,
                    &params,
                    &stream,
                )
            })
            .map_err(|source| RunError::Estimate {
                stage: RunStage::Probe,
                source,
            })?;
        Ok(TimeEstimate::from_probe(
            elapsed.as_secs_f64(),
            self.grid.rows(),
        ))
    }

    fn curves(
        &self,
        population: &[f64],
        limit_percent: u32,
        stream_label: String,
        stage: RunStage,
        config: &SimulationConfig,
        observer: &dyn RunObserver,
    ) -> Result<CurvePair, RunError> {
        let params = config.estimator_params(limit_percent);
        let stream = self.sampling.stream(stream_label);
        let sizes = &self.grid.sample_sizes;
        self.pool
            .install(|| {
                let inner = |done: usize, total: usize| observer.on_inner_progress(done, total);
                estimate(population, sizes, &params, &stream, Some(&inner))
            })
            .map_err(|source| RunError::Estimate { stage, source })
    }
}

/// Probe-only run: build the base population, time the first sample size,
/// and scale by the number of rows. Advisory; larger sizes cost more.
pub fn estimate_run_time(config: &SimulationConfig) -> Result<TimeEstimate, RunError> {
    config.validate()?;
    Session::prepare(config)?.probe(config)
}

// ─── Controller ──────────────────────────────────────────────────────

#[derive(Debug)]
pub struct RunController {
    state: RunState,
    base: SimulationConfig,
    config: Option<SimulationConfig>,
    real_data: Option<RealPopulation>,
    handle: ControlHandle,
}

impl Default for RunController {
    fn default() -> Self {
        Self::new()
    }
}

impl RunController {
    pub fn new() -> Self {
        Self::with_base(SimulationConfig::default())
    }

    /// Seeds, threads and factors in `base` apply to every `configure` call.
    pub fn with_base(base: SimulationConfig) -> Self {
        Self {
            state: RunState::Idle,
            base,
            config: None,
            real_data: None,
            handle: ControlHandle::new(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn config(&self) -> Option<&SimulationConfig> {
        self.config.as_ref()
    }

    pub fn real_data(&self) -> Option<&RealPopulation> {
        self.real_data.as_ref()
    }

    pub fn handle(&self) -> ControlHandle {
        self.handle.clone()
    }

    /// Parse the user fields. On error the controller returns to `Idle`.
    pub fn configure(&mut self, raw: &RawFields) -> Result<&SimulationConfig, ConfigError> {
        let parsed = SimulationConfig::from_fields_with(&self.base, raw);
        self.accept(parsed)
    }

    /// Use an already-built configuration (e.g. from a TOML file).
    pub fn configure_with(
        &mut self,
        config: SimulationConfig,
    ) -> Result<&SimulationConfig, ConfigError> {
        let validated = config.validate().map(|()| config);
        self.accept(validated)
    }

    fn accept(
        &mut self,
        parsed: Result<SimulationConfig, ConfigError>,
    ) -> Result<&SimulationConfig, ConfigError> {
        match parsed {
            Ok(config) => {
                self.state = RunState::Configuring;
                Ok(self.config.insert(config))
            }
            Err(e) => {
                debug!(error = %e, "configuration rejected");
                self.state = RunState::Idle;
                self.config = None;
                Err(e)
            }
        }
    }

    /// Attach a real error list; the run ends with an overlay computed from it.
    pub fn load_real_data(&mut self, population: RealPopulation) {
        self.real_data = Some(population);
    }

    pub fn clear_real_data(&mut self) {
        self.real_data = None;
    }

    fn transition(&mut self, next: RunState, observer: &dyn RunObserver) {
        debug!(from = %self.state, to = %next, "state transition");
        self.state = next;
        observer.on_state(next);
    }

    /// Run probe, confirmation and grid to a terminal state.
    pub fn run(mut self, observer: &dyn RunObserver) -> RunOutcome {
        let Some(config) = self.config.take() else {
            self.transition(RunState::Failed, observer);
            return RunOutcome::Failed(RunError::NotConfigured);
        };
        match self.execute(config, observer) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "run failed");
                self.transition(RunState::Failed, observer);
                RunOutcome::Failed(e)
            }
        }
    }

    fn cancelled(&mut self, rows: Vec<RowResult>, observer: &dyn RunObserver) -> RunOutcome {
        self.transition(RunState::Cancelled, observer);
        RunOutcome::Cancelled { rows }
    }

    fn execute(
        &mut self,
        config: SimulationConfig,
        observer: &dyn RunObserver,
    ) -> Result<RunOutcome, RunError> {
        self.transition(RunState::Probing, observer);
        let session = Session::prepare(&config)?;
        let estimate = session.probe(&config)?;
        info!(
            probe_secs = estimate.probe_secs,
            rows = estimate.rows,
            total_secs = estimate.total_secs,
            "time estimate ready"
        );
        observer.on_estimate(&estimate);

        self.transition(RunState::AwaitingConfirmation, observer);
        if self.handle.wait_for_decision() == Decision::Abort {
            warn!("run aborted at confirmation");
            return Ok(self.cancelled(Vec::new(), observer));
        }

        self.transition(RunState::Running, observer);
        let start = Instant::now();
        let total_rows = session.grid.rows();
        let mut rows = Vec::with_capacity(total_rows);

        for (i, &tail) in session.grid.tail_percents.iter().enumerate() {
            if self.handle.is_cancel_requested() {
                warn!(completed = rows.len(), total_rows, "run cancelled");
                return Ok(self.cancelled(rows, observer));
            }

            let population = session
                .draw
                .calibrate(config.admissible_error, f64::from(tail))
                .map_err(|source| RunError::Synthesis {
                    tail_percent: tail,
                    source,
                })?;
            let curves = session.curves(
                population.values(),
                tail,
                format!("tail-{tail}"),
                RunStage::Row { tail_percent: tail },
                &config,
                observer,
            )?;

            let row = RowResult {
                source: PopulationSource::Synthetic,
                tail_percent: tail,
                curves,
            };
            debug!(tail_percent = tail, row = i + 1, total_rows, "row done");
            observer.on_row(&row);
            rows.push(row);
            observer.on_outer_progress(i + 1, total_rows);
        }

        let overlay = match self.real_data.take() {
            Some(real) => {
                if self.handle.is_cancel_requested() {
                    warn!(completed = rows.len(), total_rows, "run cancelled before overlay");
                    return Ok(self.cancelled(rows, observer));
                }
                let tail = config.base_tail_percent;
                let curves = session.curves(
                    real.values(),
                    tail,
                    "real".to_string(),
                    RunStage::Overlay,
                    &config,
                    observer,
                )?;
                let row = RowResult {
                    source: PopulationSource::Real,
                    tail_percent: tail,
                    curves,
                };
                observer.on_row(&row);
                observer.on_outer_progress(total_rows + 1, total_rows + 1);
                Some(row)
            }
            None => None,
        };

        let elapsed_secs = start.elapsed().as_secs_f64();
        info!(rows = rows.len(), elapsed_secs, "run completed");
        let result = SimulationResult {
            schema_version: SCHEMA_VERSION,
            config,
            grid: session.grid,
            estimate,
            rows,
            overlay,
            elapsed_secs,
            finished_at: Utc::now(),
        };
        self.transition(RunState::Completed, observer);
        Ok(RunOutcome::Completed(Box::new(result)))
    }
}
