//! Trade — a completed round trip, emitted once per full position close.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A closed round trip: first buy → position back to zero.
///
/// Field names of the ledger columns (`ticker`, `entry_date`, `exit_date`,
/// `quantity`, `pnl`, `pnl_pct`, `commission`, `tax`, `holding_days`) are the
/// interchange contract with attribution and reporting tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    #[serde(rename = "ticker")]
    pub symbol: String,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    /// Weighted-average cost at close.
    pub entry_price: f64,
    /// Volume-weighted average sell price.
    pub exit_price: f64,
    /// Total units bought over the lifecycle.
    pub quantity: f64,
    /// Price-based P&L before fees.
    pub gross_pnl: f64,
    /// Net P&L: gross − commission − tax.
    pub pnl: f64,
    pub pnl_pct: f64,
    pub commission: f64,
    pub tax: f64,
    pub holding_days: i64,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn total_costs(&self) -> f64 {
        self.commission + self.tax
    }
}
