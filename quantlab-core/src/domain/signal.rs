//! Hold signals produced by the strategy layer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Per-instrument, per-date "should hold" flag.
///
/// `weight` is optional and only consulted by weight-aware allocation
/// policies; equal weighting ignores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub date: NaiveDate,
    pub hold: bool,
    #[serde(default)]
    pub weight: Option<f64>,
}

impl Signal {
    pub fn hold(symbol: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            date,
            hold: true,
            weight: None,
        }
    }

    pub fn flat(symbol: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            date,
            hold: false,
            weight: None,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }
}

/// Which signal semantics an engine implements.
///
/// The bar-by-bar engine rebalances to the target set every bar. Research
/// tools that enter on a signal and hold until an exit signal produce
/// different trade counts from the same data, so results carry this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalModel {
    RebalanceEveryBar,
    EntryHoldUntilExit,
}
