//! Order requests produced by the signal interpreter.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }
}

/// Why an order was created. Used only for logging and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderReason {
    /// Instrument entered the target set.
    Entry,
    /// Instrument stays in the target set; size is adjusted toward target weight.
    Rebalance,
    /// Instrument left the target set; the whole position is sold.
    Exit,
}

/// Ephemeral request to trade `quantity` units of `symbol` on `date`.
///
/// Orders live for one bar only: whatever the execution engine cannot fill is
/// dropped, never queued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub symbol: String,
    pub date: NaiveDate,
    pub side: OrderSide,
    /// Always positive; direction lives in `side`.
    pub quantity: f64,
    pub reason: OrderReason,
}

impl Order {
    pub fn buy(symbol: impl Into<String>, date: NaiveDate, quantity: f64) -> Self {
        Self {
            symbol: symbol.into(),
            date,
            side: OrderSide::Buy,
            quantity,
            reason: OrderReason::Entry,
        }
    }

    pub fn sell(symbol: impl Into<String>, date: NaiveDate, quantity: f64) -> Self {
        Self {
            symbol: symbol.into(),
            date,
            side: OrderSide::Sell,
            quantity,
            reason: OrderReason::Exit,
        }
    }

    pub fn with_reason(mut self, reason: OrderReason) -> Self {
        self.reason = reason;
        self
    }

    /// Quantity with sign: positive for buys, negative for sells.
    pub fn signed_quantity(&self) -> f64 {
        self.side.sign() * self.quantity
    }

    pub fn is_buy(&self) -> bool {
        self.side == OrderSide::Buy
    }
}
