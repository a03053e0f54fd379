//! Position — per-instrument long-only holding with average-cost basis.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Remainders this close to zero, relative to the quantity sold, count as flat.
pub const QUANTITY_TOLERANCE: f64 = 1e-9;

/// Open long position for one symbol.
///
/// Created by the fill that opens it, averaged up on every later buy, and
/// removed from the portfolio when `quantity` returns to zero. A sell that
/// leaves only float dust (within [`QUANTITY_TOLERANCE`]) closes the position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    /// Units held. Never negative.
    pub quantity: f64,
    /// Weighted-average cost per unit (fees excluded). Unchanged by sells.
    pub avg_cost: f64,
    /// Σ qty×(price−avg_cost) − sell fees over every reduction since opening.
    pub realized_pnl: f64,
    /// Σ qty×(price−avg_cost) over every reduction, before any fees.
    pub gross_realized_pnl: f64,
    /// Commission paid by every fill of this lifecycle.
    pub commission: f64,
    /// Tax paid by every fill of this lifecycle.
    pub tax: f64,
    pub entry_date: NaiveDate,
    /// Price of the fill that opened the position.
    pub first_fill_price: f64,
    /// Total units bought over the lifecycle.
    pub bought_quantity: f64,
    /// Total units sold over the lifecycle.
    pub sold_quantity: f64,
    /// Σ qty×price of all sells (for the volume-weighted exit price).
    pub sold_notional: f64,
    /// Last mark-to-market price.
    pub last_price: f64,
}

impl Position {
    pub fn open(symbol: impl Into<String>, date: NaiveDate, quantity: f64, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            avg_cost: price,
            realized_pnl: 0.0,
            gross_realized_pnl: 0.0,
            commission: 0.0,
            tax: 0.0,
            entry_date: date,
            first_fill_price: price,
            bought_quantity: quantity,
            sold_quantity: 0.0,
            sold_notional: 0.0,
            last_price: price,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0.0
    }

    pub fn market_value(&self) -> f64 {
        self.quantity * self.last_price
    }

    pub fn cost_basis(&self) -> f64 {
        self.quantity * self.avg_cost
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.quantity * (self.last_price - self.avg_cost)
    }

    /// Blend an additional buy into the weighted-average cost.
    pub fn average_up(&mut self, quantity: f64, price: f64) {
        let total_qty = self.quantity + quantity;
        self.avg_cost = (self.cost_basis() + quantity * price) / total_qty;
        self.quantity = total_qty;
        self.bought_quantity += quantity;
    }

    /// True when selling `quantity` would not take the holding below zero,
    /// allowing for float dust.
    pub fn covers(&self, quantity: f64) -> bool {
        quantity <= self.quantity + QUANTITY_TOLERANCE * quantity.max(1.0)
    }

    /// Remove `quantity` units at `price` paying `fees`, returning the
    /// realized P&L `qty×(price−avg_cost) − fees` of the reduction.
    pub fn reduce(&mut self, quantity: f64, price: f64, fees: f64) -> f64 {
        let gross = quantity * (price - self.avg_cost);
        let net = gross - fees;
        self.gross_realized_pnl += gross;
        self.realized_pnl += net;
        self.quantity -= quantity;
        if self.quantity <= QUANTITY_TOLERANCE * quantity.max(1.0) {
            self.quantity = 0.0;
        }
        self.sold_quantity += quantity;
        self.sold_notional += quantity * price;
        net
    }

    /// Volume-weighted average of all sell prices, or 0.0 before any sell.
    pub fn avg_exit_price(&self) -> f64 {
        if self.sold_quantity > 0.0 {
            self.sold_notional / self.sold_quantity
        } else {
            0.0
        }
    }
}
