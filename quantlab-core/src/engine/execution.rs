//! Execution engine — turns one bar's orders into fills.
//!
//! Stateless: carries only the cost model and the liquidity cap. Orders are
//! filled at the bar's close, moved adversely by the cost model's per-unit
//! impact, and truncated to the participation cap. Nothing is queued.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{Bar, Fill, Order, OrderSide};
use crate::engine::cost_model::{CostModelConfig, MarketContext, TransactionCostModel};
use crate::engine::diagnostics::SimulationWarning;
use crate::engine::liquidity::LiquidityPolicy;

/// Execution configuration: cost schedule plus participation cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub costs: CostModelConfig,
    /// Maximum fraction of bar volume one order may take.
    pub max_participation_rate: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            costs: CostModelConfig::default(),
            max_participation_rate: 0.1,
        }
    }
}

impl ExecutionConfig {
    /// No costs, no meaningful liquidity cap.
    pub fn frictionless() -> Self {
        Self {
            costs: CostModelConfig::frictionless(),
            max_participation_rate: 1.0,
        }
    }

    pub fn liquidity(&self) -> LiquidityPolicy {
        LiquidityPolicy::new(self.max_participation_rate)
    }
}

/// Output of processing one bar for one instrument.
#[derive(Debug, Clone, Default)]
pub struct BarExecution {
    pub fills: Vec<Fill>,
    pub warnings: Vec<SimulationWarning>,
}

pub struct OrderExecutionEngine {
    cost_model: TransactionCostModel,
    liquidity: LiquidityPolicy,
}

impl OrderExecutionEngine {
    pub fn new(cost_model: TransactionCostModel, liquidity: LiquidityPolicy) -> Self {
        Self {
            cost_model,
            liquidity,
        }
    }

    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(
            TransactionCostModel::new(config.costs.clone()),
            config.liquidity(),
        )
    }

    pub fn cost_model(&self) -> &TransactionCostModel {
        &self.cost_model
    }

    pub fn liquidity(&self) -> &LiquidityPolicy {
        &self.liquidity
    }

    /// Fill `orders` against `bar`.
    ///
    /// Each order is capped independently at `max_participation × volume`;
    /// the remainder is dropped with a `LiquidityCap` warning. Orders for a
    /// different symbol than the bar's are treated as a data gap, one
    /// warning per foreign symbol.
    pub fn process_bar(
        &self,
        orders: &[Order],
        bar: &Bar,
        market: &MarketContext,
    ) -> BarExecution {
        let mut out = BarExecution::default();
        let mut mismatched: BTreeMap<&str, usize> = BTreeMap::new();

        for order in orders {
            if order.symbol != bar.symbol {
                *mismatched.entry(order.symbol.as_str()).or_insert(0) += 1;
                continue;
            }
            if order.quantity <= 0.0 {
                continue;
            }

            let (fill_qty, dropped) = self.liquidity.constrain(order.quantity, bar.volume);
            if dropped > 0.0 {
                info!(
                    symbol = %order.symbol,
                    date = %bar.date,
                    requested = order.quantity,
                    filled = fill_qty,
                    "order truncated to participation cap"
                );
                out.warnings.push(SimulationWarning::LiquidityCap {
                    symbol: order.symbol.clone(),
                    date: bar.date,
                    requested: order.quantity,
                    filled: fill_qty,
                });
            }
            if fill_qty <= 0.0 {
                continue;
            }

            let fill = self.fill_at_close(order, fill_qty, bar, market);
            debug!(
                symbol = %fill.symbol,
                date = %fill.date,
                side = ?fill.side,
                qty = fill.quantity,
                price = fill.price,
                "fill"
            );
            out.fills.push(fill);
        }

        for (symbol, skipped) in mismatched {
            out.warnings.push(self.data_gap(symbol, bar.date, skipped));
        }
        out
    }

    /// Skip orders whose bar is missing, one `DataGap` per symbol.
    /// Empty when there is nothing to skip.
    pub fn skip_missing(&self, orders: &[Order], date: NaiveDate) -> Vec<SimulationWarning> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for order in orders {
            *counts.entry(order.symbol.as_str()).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .map(|(symbol, skipped)| self.data_gap(symbol, date, skipped))
            .collect()
    }

    fn data_gap(&self, symbol: &str, date: NaiveDate, orders_skipped: usize) -> SimulationWarning {
        warn!(%symbol, %date, orders_skipped, "no bar for orders; skipped");
        SimulationWarning::DataGap {
            symbol: symbol.to_string(),
            date,
            orders_skipped,
        }
    }

    fn fill_at_close(&self, order: &Order, qty: f64, bar: &Bar, market: &MarketContext) -> Fill {
        let reference = bar.close;
        let impact = self.cost_model.per_unit_impact(qty, reference, market);
        let price = match order.side {
            OrderSide::Buy => reference + impact,
            OrderSide::Sell => (reference - impact).max(0.0),
        };
        let costs = self.cost_model.estimate(order.side, qty, reference, market);

        Fill {
            symbol: order.symbol.clone(),
            date: bar.date,
            side: order.side,
            quantity: qty,
            requested_quantity: order.quantity,
            price,
            reference_price: reference,
            commission: costs.commission,
            tax: costs.tax,
            slippage: (price - reference).abs() * qty,
        }
    }
}
