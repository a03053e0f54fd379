//! Engine configuration, lifecycle status, and run result types.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{EquityPoint, Fill, Position, SignalModel, Trade};
use crate::engine::diagnostics::RunDiagnostics;
use crate::engine::execution::ExecutionConfig;
use crate::engine::metrics::PerformanceMetrics;
use crate::engine::signal_interpreter::{Allocation, InterpreterConfig};
use crate::engine::trade_logger::TradeStats;

/// Static per-instrument market data fed to the cost model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentMeta {
    pub market_cap: Option<f64>,
    /// Quoted spread in price units.
    pub spread: Option<f64>,
}

/// Configuration for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub initial_capital: f64,
    pub interpreter: InterpreterConfig,
    pub allocation: Allocation,
    /// Cost model and liquidity cap.
    pub execution: ExecutionConfig,
    /// Bars in the rolling average-daily-volume window (current bar included).
    pub adv_window: usize,
    /// Annual risk-free rate used by Sharpe and Sortino.
    pub risk_free_rate: f64,
    pub instruments: BTreeMap<String, InstrumentMeta>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_capital: 100_000_000.0,
            interpreter: InterpreterConfig::default(),
            allocation: Allocation::EqualWeight,
            execution: ExecutionConfig::default(),
            adv_window: 20,
            risk_free_rate: 0.0,
            instruments: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            ..Self::default()
        }
    }

    /// Config with an explicit execution preset.
    pub fn with_execution(initial_capital: f64, execution: ExecutionConfig) -> Self {
        Self {
            initial_capital,
            execution,
            ..Self::default()
        }
    }

    pub fn instrument(&self, symbol: &str) -> InstrumentMeta {
        self.instruments.get(symbol).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineStatus {
    Initialized,
    Running,
    Completed,
    Failed,
}

/// Inclusive date window for a run. Either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self::new(Some(start), Some(end))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }

    pub fn is_ordered(&self) -> bool {
        match (self.start, self.end) {
            (Some(s), Some(e)) => s <= e,
            _ => true,
        }
    }
}

/// End-of-run accounting check.
///
/// `residual` is `initial + realized + unrealized − buy_fees − final_equity`
/// and should be zero up to float error. `realized_pnl` is net of sell-side
/// fees; `buy_fees` holds the commission and tax paid on buys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountingSummary {
    pub initial_capital: f64,
    pub final_equity: f64,
    pub final_cash: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub buy_fees: f64,
    pub total_commission: f64,
    pub total_tax: f64,
    pub total_slippage: f64,
    pub residual: f64,
}

/// Everything a completed run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResults {
    pub signal_model: SignalModel,
    pub metrics: PerformanceMetrics,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    pub trade_stats: TradeStats,
    pub fills: Vec<Fill>,
    /// Positions still open at the last date, marked at their last price.
    pub open_positions: BTreeMap<String, Position>,
    pub diagnostics: RunDiagnostics,
    pub accounting: AccountingSummary,
}

impl BacktestResults {
    pub fn final_equity(&self) -> f64 {
        self.accounting.final_equity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_config_defaults() {
        let config = EngineConfig::new(1_000_000.0);
        assert_eq!(config.initial_capital, 1_000_000.0);
        assert_eq!(config.adv_window, 20);
        assert_eq!(config.execution.max_participation_rate, 0.1);
        assert_eq!(config.allocation, Allocation::EqualWeight);
    }

    #[test]
    fn unknown_instrument_has_empty_meta() {
        let config = EngineConfig::default();
        assert_eq!(config.instrument("XYZ"), InstrumentMeta::default());
    }

    #[test]
    fn date_range_is_inclusive() {
        let a = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let range = DateRange::between(a, b);
        assert!(range.contains(a));
        assert!(range.contains(b));
        assert!(!range.contains(b.succ_opt().unwrap()));
        assert!(DateRange::default().contains(a));
        assert!(!DateRange::between(b, a).is_ordered());
    }

    #[test]
    fn config_deserializes_partial_json() {
        let json = r#"{"initial_capital": 5000.0, "interpreter": {"max_positions": 3}}"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.initial_capital, 5_000.0);
        assert_eq!(config.interpreter.max_positions, 3);
        assert_eq!(config.interpreter.cost_buffer, 0.01);
    }
}
