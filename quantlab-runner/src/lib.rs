//! QuantLab Runner — backtest orchestration around `quantlab-core`.
//!
//! This crate builds on `quantlab-core` to provide:
//! - TOML run configuration
//! - CSV loading of price and signal series
//! - Single-run driver with run fingerprints
//! - Parallel, cancelable parameter sweeps
//! - JSON/CSV/Markdown export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod runner;
pub mod sweep;

pub use config::{BacktestConfig, ConfigError, DataSection, EngineSection};
pub use data_loader::{load_dataset, LoadError, LoadedData};
pub use export::{
    equity_curve_csv, read_results_json, trade_ledger_csv, write_artifacts, write_results_json,
    ArtifactPaths,
};
pub use runner::{run_from_config, run_with_data, RunError, RunReport};
pub use sweep::{ParamGrid, ParamSweep, SweepParams, SweepPoint, SweepResults, SweepSummary};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn loaded_data_is_send_sync() {
        assert_send::<LoadedData>();
        assert_sync::<LoadedData>();
    }

    #[test]
    fn sweep_point_is_send_sync() {
        assert_send::<SweepPoint>();
        assert_sync::<SweepPoint>();
    }

    #[test]
    fn run_report_is_send() {
        assert_send::<RunReport>();
    }

    #[test]
    fn run_error_is_send_sync() {
        assert_send::<RunError>();
        assert_sync::<RunError>();
    }
}
