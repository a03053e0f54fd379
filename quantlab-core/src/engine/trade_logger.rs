//! Trade logger — round-trip ledger built from position closes.
//!
//! One trade per full close. Purely derived: nothing here feeds back into the
//! simulation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::Trade;
use crate::engine::position_tracker::ClosedPosition;

/// Aggregate statistics over the trade ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    pub num_trades: usize,
    pub win_rate: f64,
    /// Mean net P&L of winning trades.
    pub avg_win: f64,
    /// Mean net P&L of losing trades (non-positive).
    pub avg_loss: f64,
    pub avg_holding_days: f64,
    pub total_commission: f64,
    pub total_tax: f64,
    /// Gross winnings / gross losses, capped at 100.
    pub profit_factor: f64,
    pub total_net_pnl: f64,
}

#[derive(Debug, Clone, Default)]
pub struct TradeLogger {
    trades: Vec<Trade>,
}

impl TradeLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the round trip for a position that just closed.
    pub fn record_trade(&mut self, closed: &ClosedPosition, exit_date: NaiveDate) -> &Trade {
        let trade = build_trade(closed, exit_date);
        self.trades.push(trade);
        &self.trades[self.trades.len() - 1]
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn into_trades(self) -> Vec<Trade> {
        self.trades
    }

    pub fn trade_stats(&self) -> TradeStats {
        trade_stats(&self.trades)
    }
}

fn build_trade(closed: &ClosedPosition, exit_date: NaiveDate) -> Trade {
    let pos = &closed.position;
    let gross_pnl = pos.gross_realized_pnl;
    let pnl = gross_pnl - pos.commission - pos.tax;
    let entry_value = pos.avg_cost * pos.bought_quantity;
    Trade {
        symbol: pos.symbol.clone(),
        entry_date: pos.entry_date,
        exit_date,
        entry_price: pos.avg_cost,
        exit_price: pos.avg_exit_price(),
        quantity: pos.bought_quantity,
        gross_pnl,
        pnl,
        pnl_pct: if entry_value > 0.0 { pnl / entry_value } else { 0.0 },
        commission: pos.commission,
        tax: pos.tax,
        holding_days: (exit_date - pos.entry_date).num_days(),
    }
}

pub fn trade_stats(trades: &[Trade]) -> TradeStats {
    if trades.is_empty() {
        return TradeStats::default();
    }
    let n = trades.len() as f64;
    let wins: Vec<f64> = trades.iter().filter(|t| t.is_winner()).map(|t| t.pnl).collect();
    let losses: Vec<f64> = trades.iter().filter(|t| !t.is_winner()).map(|t| t.pnl).collect();

    TradeStats {
        num_trades: trades.len(),
        win_rate: wins.len() as f64 / n,
        avg_win: mean(&wins),
        avg_loss: mean(&losses),
        avg_holding_days: trades.iter().map(|t| t.holding_days as f64).sum::<f64>() / n,
        total_commission: trades.iter().map(|t| t.commission).sum(),
        total_tax: trades.iter().map(|t| t.tax).sum(),
        profit_factor: profit_factor(trades),
        total_net_pnl: trades.iter().map(|t| t.pnl).sum(),
    }
}

/// Gross profits / gross losses.
///
/// Capped at 100.0 for edge cases (all winners, zero losses).
pub fn profit_factor(trades: &[Trade]) -> f64 {
    let gross_profit: f64 = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.pnl < 0.0)
        .map(|t| t.pnl.abs())
        .sum();
    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
