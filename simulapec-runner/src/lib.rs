//! SimulaPEC Runner — configuration, run control, worker, export.
//!
//! This crate builds on `simulapec-core` to provide:
//! - Aggregated validation of the six user fields and TOML config files
//! - Real error lists loaded from text (comma or point decimals)
//! - The run controller state machine with probe, confirmation and cancellation
//! - A background worker forwarding progress over a channel
//! - JSON and long-format CSV export of results

pub mod config;
pub mod controller;
pub mod decision;
pub mod export;
pub mod real_data;
pub mod result;
pub mod worker;

pub use config::{ConfigError, FieldIssue, RawFields, SimulationConfig};
pub use controller::{
    estimate_run_time, ControlHandle, NullObserver, RunController, RunError, RunObserver,
    RunOutcome, RunStage, RunState,
};
pub use decision::{Decision, DecisionCell};
pub use export::{
    export_json, export_rows_csv, export_table_csv, import_json, load_json, save_csv, save_json,
};
pub use real_data::{load_real_data, parse_real_data, RealDataError, RealPopulation};
pub use result::{
    PopulationSource, RowResult, SimulationResult, TableLine, TimeEstimate, SCHEMA_VERSION,
};
pub use worker::{spawn_simulation, ChannelObserver, RunEvent, SimulationWorker};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<SimulationConfig>();
        assert_sync::<SimulationConfig>();
        assert_send::<RawFields>();
        assert_sync::<RawFields>();
        assert_send::<ConfigError>();
        assert_sync::<ConfigError>();
    }

    #[test]
    fn result_types_are_send_sync() {
        assert_send::<SimulationResult>();
        assert_sync::<SimulationResult>();
        assert_send::<RowResult>();
        assert_sync::<RowResult>();
        assert_send::<RunOutcome>();
        assert_send::<RunEvent>();
    }

    #[test]
    fn controller_moves_to_worker() {
        assert_send::<RunController>();
        assert_send::<ControlHandle>();
        assert_sync::<ControlHandle>();
        assert_sync::<ChannelObserver>();
        assert_send::<RealPopulation>();
    }
}
