//! Backtest runner: wires config, data loading, engine and fingerprints.
//!
//! Two entry points:
//! - `run_from_config()`: loads the CSV files named in the config, then runs. Used by CLI.
//! - `run_with_data()`: takes pre-loaded data and an engine config. Used by sweeps.

use quantlab_core::engine::{BacktestEngine, BacktestError, BacktestResults, DateRange, EngineConfig};
use quantlab_core::fingerprint::{
    config_hash, results_digest, run_id, ConfigHash, DatasetHash, ResultsDigest, RunId,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::{BacktestConfig, ConfigError};
use crate::data_loader::{load_dataset, LoadError, LoadedData};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("backtest error: {0}")]
    Backtest(#[from] BacktestError),
    #[error("failed to fingerprint config: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

/// A completed run and the hashes that identify it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub config_hash: ConfigHash,
    pub dataset_hash: DatasetHash,
    pub results_digest: ResultsDigest,
    pub config: EngineConfig,
    pub range: DateRange,
    pub results: BacktestResults,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Run a single backtest from a parsed config file (loads data from disk).
pub fn run_from_config(config: &BacktestConfig) -> Result<RunReport, RunError> {
    let data = load_dataset(&config.data)?;
    run_with_data(config.to_engine_config(), &data, config.date_range())
}

/// Run a backtest over pre-loaded data — no I/O.
pub fn run_with_data(
    config: EngineConfig,
    data: &LoadedData,
    range: DateRange,
) -> Result<RunReport, RunError> {
    let config_hash = config_hash(&config)?;
    let run_id = run_id(&config_hash, &data.dataset_hash);

    let mut engine = BacktestEngine::new(config.clone());
    let results = engine.run(&data.prices, &data.signals, Some(range))?;
    let results_digest = results_digest(&results);

    info!(
        run = run_id.short(),
        final_equity = results.final_equity(),
        trades = results.trades.len(),
        sharpe = results.metrics.sharpe,
        "run finished"
    );

    Ok(RunReport {
        schema_version: SCHEMA_VERSION,
        run_id,
        config_hash,
        dataset_hash: data.dataset_hash.clone(),
        results_digest,
        config,
        range,
        results,
    })
}
