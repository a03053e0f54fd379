//! TOML backtest configuration.
//!
//! ```toml
//! [data]
//! prices = "prices.csv"
//! signals = "signals.csv"
//! start = "2024-01-02"      # optional
//!
//! [engine]
//! initial_capital = 100000000.0
//! max_positions = 10
//! allocation = "equal_weight"
//!
//! [costs]
//! commission_rate = 0.00015
//!
//! [instruments.005930]
//! market_cap = 4.0e14
//! ```
//!
//! Every section except `[data]` is optional and falls back to the engine
//! defaults. Relative data paths are resolved against the config file's
//! directory when loaded with [`BacktestConfig::load`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use quantlab_core::engine::{
    Allocation, CostModelConfig, DateRange, EngineConfig, ExecutionConfig, InstrumentMeta,
    InterpreterConfig,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid date range: start {start} is after end {end}")]
    DateRange { start: NaiveDate, end: NaiveDate },
}

/// Full config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub data: DataSection,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub costs: CostModelConfig,
    #[serde(default)]
    pub instruments: BTreeMap<String, InstrumentMeta>,
}

/// `[data]`: input files and the optional simulation window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSection {
    pub prices: PathBuf,
    pub signals: PathBuf,
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

/// `[engine]`: capital, interpreter and liquidity settings, flattened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub initial_capital: f64,
    pub max_positions: usize,
    pub min_order_notional: f64,
    pub max_participation_rate: f64,
    pub cost_buffer: f64,
    pub adv_window: usize,
    pub allocation: Allocation,
    pub risk_free_rate: f64,
}

impl Default for EngineSection {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            initial_capital: engine.initial_capital,
            max_positions: engine.interpreter.max_positions,
            min_order_notional: engine.interpreter.min_order_notional,
            max_participation_rate: engine.execution.max_participation_rate,
            cost_buffer: engine.interpreter.cost_buffer,
            adv_window: engine.adv_window,
            allocation: engine.allocation,
            risk_free_rate: engine.risk_free_rate,
        }
    }
}

impl BacktestConfig {
    /// Parse a config from TOML text. Paths are kept as written.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.check_dates()?;
        Ok(config)
    }

    /// Read and parse a config file, resolving relative data paths against
    /// the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        for p in [&mut self.data.prices, &mut self.data.signals] {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        }
    }

    fn check_dates(&self) -> Result<(), ConfigError> {
        match (self.data.start, self.data.end) {
            (Some(start), Some(end)) if start > end => Err(ConfigError::DateRange { start, end }),
            _ => Ok(()),
        }
    }

    pub fn date_range(&self) -> DateRange {
        DateRange::new(self.data.start, self.data.end)
    }

    /// Assemble the engine config. Range checks on the values themselves
    /// happen in the engine's input validation.
    pub fn to_engine_config(&self) -> EngineConfig {
        let e = &self.engine;
        EngineConfig {
            initial_capital: e.initial_capital,
            interpreter: InterpreterConfig {
                max_positions: e.max_positions,
                min_order_notional: e.min_order_notional,
                cost_buffer: e.cost_buffer,
            },
            allocation: e.allocation,
            execution: ExecutionConfig {
                costs: self.costs.clone(),
                max_participation_rate: e.max_participation_rate,
            },
            adv_window: e.adv_window,
            risk_free_rate: e.risk_free_rate,
            instruments: self.instruments.clone(),
        }
    }
}
