use crate::domain::order::OrderSide;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Fill record — the realized outcome of (partially) executing an order
/// against one bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub symbol: String,
    pub date: NaiveDate,
    pub side: OrderSide,
    /// Quantity actually filled (positive).
    pub quantity: f64,
    /// Quantity the order asked for before the liquidity cap.
    pub requested_quantity: f64,
    /// Cost-adjusted execution price.
    pub price: f64,
    /// Bar close the fill price was derived from.
    pub reference_price: f64,
    pub commission: f64,
    pub tax: f64,
    /// Dollar cost of market impact + spread, already embedded in `price`.
    pub slippage: f64,
}

impl Fill {
    /// Filled quantity with sign: positive for buys, negative for sells.
    pub fn signed_quantity(&self) -> f64 {
        self.side.sign() * self.quantity
    }

    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }

    /// Explicit fees charged on top of notional (commission + tax).
    pub fn fees(&self) -> f64 {
        self.commission + self.tax
    }

    /// Cash required (buy) or released (sell) by this fill.
    pub fn net_cash_flow(&self) -> f64 {
        match self.side {
            OrderSide::Buy => -(self.notional() + self.fees()),
            OrderSide::Sell => self.notional() - self.fees(),
        }
    }

    pub fn was_truncated(&self) -> bool {
        self.quantity < self.requested_quantity
    }
}
