//! Signal interpreter — turns today's hold flags into orders.
//!
//! Rebalance-every-bar: each bar the target set is recomputed from scratch and
//! every held position is diffed against its target value. Anything held but
//! no longer targeted is exited in full.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Order, OrderReason, Position, Signal};

/// Target-weight assignment over the day's target set.
///
/// # Responsibilities
/// - Map the ranked target signals to weights summing to at most 1.0
///
/// # Non-Responsibilities
/// - Does NOT choose which instruments are targeted (ranking does)
/// - Does NOT size orders in units
pub trait AllocationPolicy: Send + Sync {
    fn target_weights(&self, targets: &[&Signal]) -> BTreeMap<String, f64>;

    /// Policy name for logging and run reports.
    fn name(&self) -> &str;
}

/// `1 / n` for each of the `n` targets.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualWeight;

impl AllocationPolicy for EqualWeight {
    fn target_weights(&self, targets: &[&Signal]) -> BTreeMap<String, f64> {
        if targets.is_empty() {
            return BTreeMap::new();
        }
        let w = 1.0 / targets.len() as f64;
        targets.iter().map(|s| (s.symbol.clone(), w)).collect()
    }

    fn name(&self) -> &str {
        "equal_weight"
    }
}

/// Signal weights normalized to sum to 1.0.
///
/// A target without a weight counts as zero. Falls back to [`EqualWeight`]
/// when no target carries a positive weight.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalWeighted;

impl AllocationPolicy for SignalWeighted {
    fn target_weights(&self, targets: &[&Signal]) -> BTreeMap<String, f64> {
        let total: f64 = targets.iter().filter_map(|s| s.weight).sum();
        if total <= 0.0 {
            return EqualWeight.target_weights(targets);
        }
        targets
            .iter()
            .map(|s| (s.symbol.clone(), s.weight.unwrap_or(0.0) / total))
            .collect()
    }

    fn name(&self) -> &str {
        "signal_weighted"
    }
}

/// Serializable choice of [`AllocationPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Allocation {
    #[default]
    EqualWeight,
    SignalWeighted,
}

impl Allocation {
    pub fn policy(self) -> Box<dyn AllocationPolicy> {
        match self {
            Allocation::EqualWeight => Box::new(EqualWeight),
            Allocation::SignalWeighted => Box::new(SignalWeighted),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Upper bound on simultaneously targeted instruments.
    pub max_positions: usize,
    /// Orders with notional below this are dropped. Full exits are exempt.
    pub min_order_notional: f64,
    /// Fraction of buy notional reserved for fees and impact.
    pub cost_buffer: f64,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_positions: 10,
            min_order_notional: 1_000_000.0,
            cost_buffer: 0.01,
        }
    }
}

/// Orders for one date plus the count of adjustments dropped as churn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Interpretation {
    pub orders: Vec<Order>,
    pub dropped_min_notional: usize,
}

impl Interpretation {
    pub fn sells(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(|o| !o.is_buy())
    }

    pub fn buys(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(|o| o.is_buy())
    }
}

pub struct SignalInterpreter {
    config: InterpreterConfig,
    policy: Box<dyn AllocationPolicy>,
}

impl SignalInterpreter {
    pub fn new(config: InterpreterConfig, policy: Box<dyn AllocationPolicy>) -> Self {
        Self { config, policy }
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    /// Hold signals ranked by (weight desc, symbol asc), cut to `max_positions`.
    pub fn target_set<'a>(&self, signals: &'a BTreeMap<String, Signal>) -> Vec<&'a Signal> {
        let mut targets: Vec<&Signal> = signals.values().filter(|s| s.hold).collect();
        // BTreeMap order already gives symbol asc; the stable sort keeps it on ties.
        targets.sort_by(|a, b| {
            let wa = a.weight.unwrap_or(0.0);
            let wb = b.weight.unwrap_or(0.0);
            wb.total_cmp(&wa)
        });
        targets.truncate(self.config.max_positions);
        targets
    }

    /// Diff current holdings against today's targets.
    ///
    /// `signals` holds today's signal per symbol; a symbol without one is
    /// treated as `hold = false`. `prices` are today's closes. Instruments
    /// with no price get no sizing order; exits are still emitted so the
    /// executor can record the gap.
    pub fn interpret_signals(
        &self,
        date: NaiveDate,
        signals: &BTreeMap<String, Signal>,
        positions: &BTreeMap<String, Position>,
        prices: &BTreeMap<String, f64>,
        portfolio_value: f64,
    ) -> Interpretation {
        let targets = self.target_set(signals);
        let weights = self.policy.target_weights(&targets);
        let mut out = Interpretation::default();

        for (symbol, pos) in positions {
            if pos.quantity > 0.0 && !weights.contains_key(symbol) {
                out.orders.push(Order::sell(symbol.clone(), date, pos.quantity));
            }
        }

        for (symbol, &weight) in &weights {
            let Some(&price) = prices.get(symbol).filter(|p| **p > 0.0) else {
                continue;
            };
            let held = positions.get(symbol).map_or(0.0, |p| p.quantity);
            let delta_value = weight * portfolio_value - held * price;

            let order = if delta_value > 0.0 {
                let qty = (delta_value / (price * (1.0 + self.config.cost_buffer))).floor();
                let reason = if held > 0.0 {
                    OrderReason::Rebalance
                } else {
                    OrderReason::Entry
                };
                Order::buy(symbol.clone(), date, qty).with_reason(reason)
            } else {
                let qty = (-delta_value / price).floor().min(held);
                Order::sell(symbol.clone(), date, qty).with_reason(OrderReason::Rebalance)
            };

            if order.quantity <= 0.0 {
                continue;
            }
            if order.quantity * price < self.config.min_order_notional {
                debug!(%symbol, %date, qty = order.quantity, "adjustment below min notional; dropped");
                out.dropped_min_notional += 1;
                continue;
            }
            out.orders.push(order);
        }

        out
    }
}
