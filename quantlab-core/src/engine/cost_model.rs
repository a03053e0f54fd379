//! Transaction cost model — commission, tax, market impact and spread.
//!
//! Market impact follows the Almgren-Chriss square-root/linear split:
//! permanent impact grows with √(order/ADV), temporary impact linearly.
//! Impact and spread are expressed as an adverse per-unit price adjustment;
//! commission and tax are charged on top of notional.

use crate::domain::OrderSide;
use serde::{Deserialize, Serialize};

/// Broker/market cost schedule. Every threshold is a field so the engine can be
/// reused across brokers and markets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModelConfig {
    /// Commission as a fraction of notional, both sides.
    pub commission_rate: f64,
    /// Transaction tax as a fraction of notional, sells only.
    pub sell_tax_rate: f64,
    /// Permanent impact coefficient (× √volume_fraction × price).
    pub impact_k1: f64,
    /// Temporary impact coefficient (× volume_fraction × price).
    pub impact_k2: f64,
    /// Fixed slippage in basis points of notional, added to impact.
    pub slippage_bps: f64,
    /// Spread assumed when neither an observed spread nor a market cap is known.
    pub default_spread_bps: f64,
}

impl Default for CostModelConfig {
    fn default() -> Self {
        Self {
            commission_rate: 0.000_15,
            sell_tax_rate: 0.002,
            impact_k1: 0.02,
            impact_k2: 0.01,
            slippage_bps: 0.0,
            default_spread_bps: 10.0,
        }
    }
}

impl CostModelConfig {
    pub fn frictionless() -> Self {
        Self {
            commission_rate: 0.0,
            sell_tax_rate: 0.0,
            impact_k1: 0.0,
            impact_k2: 0.0,
            slippage_bps: 0.0,
            default_spread_bps: 0.0,
        }
    }
}

/// Market observations the cost model needs for one instrument on one bar.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MarketContext {
    pub avg_daily_volume: f64,
    /// Observed quoted spread in price units.
    pub spread: Option<f64>,
    /// Market capitalization in currency units.
    pub market_cap: Option<f64>,
}

/// Cost components for one order, all in currency units except `cost_bps`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub commission: f64,
    pub tax: f64,
    pub slippage: f64,
    pub spread_cost: f64,
    pub total_cost: f64,
    pub cost_bps: f64,
}

impl CostBreakdown {
    /// Costs that move the execution price (impact + spread).
    pub fn price_impact(&self) -> f64 {
        self.slippage + self.spread_cost
    }
}

/// Pure cost function over a [`CostModelConfig`].
#[derive(Debug, Clone, Default)]
pub struct TransactionCostModel {
    config: CostModelConfig,
}

impl TransactionCostModel {
    pub fn new(config: CostModelConfig) -> Self {
        Self { config }
    }

    pub fn frictionless() -> Self {
        Self::new(CostModelConfig::frictionless())
    }

    pub fn config(&self) -> &CostModelConfig {
        &self.config
    }

    /// Estimate all cost components of trading `order_size` units at `price`.
    ///
    /// Zero or negative size (or a non-positive price) costs nothing.
    pub fn estimate(
        &self,
        side: OrderSide,
        order_size: f64,
        price: f64,
        market: &MarketContext,
    ) -> CostBreakdown {
        if order_size <= 0.0 || price <= 0.0 {
            return CostBreakdown::default();
        }
        let notional = order_size * price;

        let commission = notional * self.config.commission_rate;
        let tax = match side {
            OrderSide::Buy => 0.0,
            OrderSide::Sell => notional * self.config.sell_tax_rate,
        };

        let volume_fraction = if market.avg_daily_volume > 0.0 {
            (order_size / market.avg_daily_volume).min(1.0)
        } else {
            1.0
        };
        let permanent = self.config.impact_k1 * volume_fraction.sqrt() * price;
        let temporary = self.config.impact_k2 * volume_fraction * price;
        let slippage =
            (permanent + temporary) * order_size + notional * self.config.slippage_bps / 10_000.0;

        let spread = self.spread_for(price, market);
        let spread_cost = order_size * spread / 2.0;

        let total_cost = commission + tax + slippage + spread_cost;
        CostBreakdown {
            commission,
            tax,
            slippage,
            spread_cost,
            total_cost,
            cost_bps: total_cost / notional * 10_000.0,
        }
    }

    /// Spread in price units: observed if available, else estimated from
    /// market cap as `0.1% / √(cap in billions)` of price, else the default.
    pub fn spread_for(&self, price: f64, market: &MarketContext) -> f64 {
        if let Some(spread) = market.spread.filter(|s| s.is_finite() && *s >= 0.0) {
            return spread;
        }
        match market.market_cap.filter(|c| *c > 0.0) {
            Some(cap) => {
                let cap_billions = cap / 1e9;
                price * 0.001 / cap_billions.sqrt()
            }
            None => price * self.config.default_spread_bps / 10_000.0,
        }
    }

    /// Adverse price adjustment per unit for an order of `order_size`.
    pub fn per_unit_impact(&self, order_size: f64, price: f64, market: &MarketContext) -> f64 {
        if order_size <= 0.0 {
            return 0.0;
        }
        // Side does not change impact or spread; only tax is side-dependent.
        self.estimate(OrderSide::Buy, order_size, price, market)
            .price_impact()
            / order_size
    }
}
