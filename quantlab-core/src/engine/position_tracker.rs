//! Position tracker — applies fills to cash and positions, marks to market,
//! and records the equity curve.
//!
//! Long-only with average-cost basis. Under-funded buys, over-sized sells and
//! sells whose fees exceed proceeds plus cash are rejected whole, never
//! clamped, so cash stays non-negative and no position goes short.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::warn;

use crate::domain::{EquityPoint, Fill, OrderSide, PortfolioState, Position};
use crate::engine::diagnostics::SimulationWarning;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrackerError {
    #[error("equity snapshot for {date} does not follow last snapshot {last}")]
    NonIncreasingDate { date: NaiveDate, last: NaiveDate },
}

/// Fees charged on one fill.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Fees {
    pub commission: f64,
    pub tax: f64,
}

impl Fees {
    pub fn total(&self) -> f64 {
        self.commission + self.tax
    }
}

/// A position whose quantity just returned to zero.
///
/// Carries the full lifecycle so the trade logger can build the round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedPosition {
    pub position: Position,
    pub exit_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FillOutcome {
    Applied { closed: Option<ClosedPosition> },
    Rejected(SimulationWarning),
}

impl FillOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, FillOutcome::Rejected(_))
    }
}

/// Owns the run's [`PortfolioState`] and equity curve.
#[derive(Debug, Clone)]
pub struct PositionTracker {
    portfolio: PortfolioState,
    equity_curve: Vec<EquityPoint>,
}

impl PositionTracker {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            portfolio: PortfolioState::new(initial_capital),
            equity_curve: Vec::new(),
        }
    }

    /// Mark every open position whose symbol has a price. No equity row.
    pub fn mark_prices(&mut self, prices: &BTreeMap<String, f64>) {
        for (symbol, pos) in self.portfolio.positions.iter_mut() {
            if let Some(&price) = prices.get(symbol) {
                pos.last_price = price;
            }
        }
    }

    /// Mark to market and append one equity row for `date`.
    ///
    /// Positions without a price today keep their previous mark.
    pub fn update_prices(
        &mut self,
        date: NaiveDate,
        prices: &BTreeMap<String, f64>,
    ) -> Result<(), TrackerError> {
        if let Some(last) = self.equity_curve.last() {
            if date <= last.date {
                return Err(TrackerError::NonIncreasingDate {
                    date,
                    last: last.date,
                });
            }
        }
        self.mark_prices(prices);
        let holdings_value = self.portfolio.holdings_value();
        self.equity_curve.push(EquityPoint {
            date,
            cash: self.portfolio.cash,
            holdings_value,
            total_equity: self.portfolio.cash + holdings_value,
        });
        Ok(())
    }

    /// Open or average up a long position.
    ///
    /// Rejected when cash cannot cover notional plus fees.
    pub fn add_position(
        &mut self,
        symbol: &str,
        date: NaiveDate,
        quantity: f64,
        price: f64,
        fees: Fees,
    ) -> FillOutcome {
        let required = quantity * price + fees.total();
        let available = self.portfolio.cash;
        if required > available {
            warn!(%symbol, %date, required, available, "buy rejected: insufficient cash");
            return FillOutcome::Rejected(SimulationWarning::InsufficientCash {
                symbol: symbol.to_string(),
                date,
                required,
                available,
            });
        }

        self.portfolio.cash -= required;
        self.portfolio.buy_fees += fees.total();
        self.portfolio.total_commission += fees.commission;
        self.portfolio.total_tax += fees.tax;

        let pos = self
            .portfolio
            .positions
            .entry(symbol.to_string())
            .and_modify(|p| p.average_up(quantity, price))
            .or_insert_with(|| Position::open(symbol, date, quantity, price));
        pos.commission += fees.commission;
        pos.tax += fees.tax;

        FillOutcome::Applied { closed: None }
    }

    /// Sell `quantity` units of a held position.
    ///
    /// Rejected when the symbol is not held, `quantity` exceeds the holding,
    /// or the fees would take cash below zero. A reduction that leaves the
    /// holding flat removes the position and returns it.
    pub fn reduce_position(
        &mut self,
        symbol: &str,
        date: NaiveDate,
        quantity: f64,
        price: f64,
        fees: Fees,
    ) -> FillOutcome {
        let cash = self.portfolio.cash;
        let pos = match self.portfolio.positions.get_mut(symbol) {
            Some(pos) if !pos.is_flat() && pos.covers(quantity) => pos,
            other => {
                let held = other.map_or(0.0, |p| p.quantity);
                warn!(%symbol, %date, requested = quantity, held, "sell rejected: exceeds holding");
                return FillOutcome::Rejected(SimulationWarning::OverReduction {
                    symbol: symbol.to_string(),
                    date,
                    requested: quantity,
                    held,
                });
            }
        };

        let available = cash + quantity * price;
        let required = fees.total();
        if required > available {
            warn!(%symbol, %date, required, available, "sell rejected: fees exceed proceeds and cash");
            return FillOutcome::Rejected(SimulationWarning::InsufficientCash {
                symbol: symbol.to_string(),
                date,
                required,
                available,
            });
        }

        let net = pos.reduce(quantity, price, fees.total());
        pos.commission += fees.commission;
        pos.tax += fees.tax;

        self.portfolio.cash = available - required;
        self.portfolio.realized_pnl += net;
        self.portfolio.total_commission += fees.commission;
        self.portfolio.total_tax += fees.tax;

        if !pos.is_flat() {
            return FillOutcome::Applied { closed: None };
        }
        let closed = self
            .portfolio
            .positions
            .remove(symbol)
            .map(|position| ClosedPosition {
                position,
                exit_date: date,
            });
        FillOutcome::Applied { closed }
    }

    pub fn apply_fill(&mut self, fill: &Fill) -> FillOutcome {
        let fees = Fees {
            commission: fill.commission,
            tax: fill.tax,
        };
        let outcome = match fill.side {
            OrderSide::Buy => {
                self.add_position(&fill.symbol, fill.date, fill.quantity, fill.price, fees)
            }
            OrderSide::Sell => {
                self.reduce_position(&fill.symbol, fill.date, fill.quantity, fill.price, fees)
            }
        };
        if !outcome.is_rejected() {
            self.portfolio.total_slippage += fill.slippage;
        }
        outcome
    }

    pub fn portfolio_value(&self) -> f64 {
        self.portfolio.equity()
    }

    pub fn holdings_value(&self) -> f64 {
        self.portfolio.holdings_value()
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.portfolio.unrealized_pnl()
    }

    pub fn cash(&self) -> f64 {
        self.portfolio.cash
    }

    pub fn positions(&self) -> &BTreeMap<String, Position> {
        &self.portfolio.positions
    }

    pub fn quantity_of(&self, symbol: &str) -> f64 {
        self.portfolio.get_position(symbol).map_or(0.0, |p| p.quantity)
    }

    pub fn portfolio(&self) -> &PortfolioState {
        &self.portfolio
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    /// `initial + realized + unrealized − buy_fees − portfolio_value`. ≈ 0.
    pub fn accounting_residual(&self) -> f64 {
        let p = &self.portfolio;
        p.initial_capital + p.realized_pnl + p.unrealized_pnl() - p.buy_fees
            - self.portfolio_value()
    }

    pub fn into_parts(self) -> (PortfolioState, Vec<EquityPoint>) {
        (self.portfolio, self.equity_curve)
    }
}
