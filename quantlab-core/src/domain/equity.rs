use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the equity curve, recorded after all fills of a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub cash: f64,
    pub holdings_value: f64,
    pub total_equity: f64,
}

/// Total-equity column of an equity curve.
pub fn equity_values(curve: &[EquityPoint]) -> Vec<f64> {
    curve.iter().map(|p| p.total_equity).collect()
}
