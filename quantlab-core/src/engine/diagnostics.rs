//! Recoverable simulation events and per-run counters.
//!
//! Nothing here aborts a run. Each event is logged where it happens and kept
//! in [`RunDiagnostics`] so a degraded run stays auditable.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SimulationWarning {
    /// No bar for `symbol` on `date`; its orders for that bar were skipped.
    DataGap {
        symbol: String,
        date: NaiveDate,
        orders_skipped: usize,
    },
    /// Fill rejected outright: cash could not cover a buy's notional + fees,
    /// or a sell's fees exceeded its proceeds + cash.
    InsufficientCash {
        symbol: String,
        date: NaiveDate,
        required: f64,
        available: f64,
    },
    /// Sell rejected: it asked for more than the position holds.
    OverReduction {
        symbol: String,
        date: NaiveDate,
        requested: f64,
        held: f64,
    },
    /// Order truncated to the participation-rate cap; remainder dropped.
    LiquidityCap {
        symbol: String,
        date: NaiveDate,
        requested: f64,
        filled: f64,
    },
}

/// Counters reported with every results bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunDiagnostics {
    /// (symbol, date) pairs inside the run with no bar.
    pub data_gaps: usize,
    /// Orders dropped because their bar was missing.
    pub skipped_orders: usize,
    /// Fills refused by the position tracker (cash or over-reduction).
    pub rejected_orders: usize,
    /// Orders cut down by the participation cap.
    pub liquidity_truncations: usize,
    /// Orders the interpreter dropped below minimum notional.
    pub min_notional_drops: usize,
    pub dates_processed: usize,
    pub warnings: Vec<SimulationWarning>,
}

impl RunDiagnostics {
    pub fn record(&mut self, warning: SimulationWarning) {
        match &warning {
            SimulationWarning::DataGap { orders_skipped, .. } => {
                self.data_gaps += 1;
                self.skipped_orders += orders_skipped;
            }
            SimulationWarning::InsufficientCash { .. } | SimulationWarning::OverReduction { .. } => {
                self.rejected_orders += 1;
            }
            SimulationWarning::LiquidityCap { .. } => self.liquidity_truncations += 1,
        }
        self.warnings.push(warning);
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.min_notional_drops == 0
    }
}
