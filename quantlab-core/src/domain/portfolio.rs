//! PortfolioState — aggregate state of cash + all open positions.

use super::position::Position;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate portfolio state for one run.
///
/// Owned by the position tracker. Positions are kept in a `BTreeMap` so every
/// iteration (marking, equity, rebalancing) visits symbols in the same order.
///
/// The accounting identity must hold at every bar:
/// `initial_capital + realized_pnl + unrealized − buy_fees == equity`.
/// Sell-side fees are already netted into `realized_pnl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioState {
    pub cash: f64,
    pub initial_capital: f64,
    pub positions: BTreeMap<String, Position>,
    /// Realized P&L across all reductions, net of sell-side fees.
    pub realized_pnl: f64,
    /// Commission + tax paid on buys, still carried against open or closed lots.
    pub buy_fees: f64,
    pub total_commission: f64,
    pub total_tax: f64,
    /// Impact + spread dollars embedded in fill prices (informational).
    pub total_slippage: f64,
}

impl PortfolioState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            cash: initial_capital,
            initial_capital,
            positions: BTreeMap::new(),
            realized_pnl: 0.0,
            buy_fees: 0.0,
            total_commission: 0.0,
            total_tax: 0.0,
            total_slippage: 0.0,
        }
    }

    pub fn holdings_value(&self) -> f64 {
        self.positions.values().map(Position::market_value).sum()
    }

    /// Total equity = cash + sum of all position market values.
    pub fn equity(&self) -> f64 {
        self.cash + self.holdings_value()
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.positions.values().map(Position::unrealized_pnl).sum()
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.get(symbol).is_some_and(|p| !p.is_flat())
    }

    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol).filter(|p| !p.is_flat())
    }
}
