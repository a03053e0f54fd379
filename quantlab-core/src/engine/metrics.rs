//! Performance metrics — pure functions that compute run statistics.
//!
//! Every metric takes an equity series and returns a scalar. The series passed
//! in by [`PerformanceMetrics::compute`] starts at `initial_capital`, so costs
//! paid on the first bar show up in the first return.

use serde::{Deserialize, Serialize};

use crate::domain::{equity_values, EquityPoint};

/// Trading bars per year.
pub const BARS_PER_YEAR: f64 = 252.0;

/// Summary statistics for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    /// Negative fraction, e.g. -0.15 for a 15% drawdown.
    pub max_drawdown: f64,
    pub num_bars: usize,
}

impl PerformanceMetrics {
    pub fn compute(initial_capital: f64, curve: &[EquityPoint], risk_free_rate: f64) -> Self {
        let equity = anchored(initial_capital, curve);
        Self {
            total_return: total_return(&equity),
            annualized_return: annualized_return(&equity),
            sharpe: sharpe_ratio(&equity, risk_free_rate),
            sortino: sortino_ratio(&equity, risk_free_rate),
            calmar: calmar_ratio(&equity),
            max_drawdown: max_drawdown(&equity),
            num_bars: curve.len(),
        }
    }
}

/// `initial_capital` followed by every snapshot's total equity.
pub fn anchored(initial_capital: f64, curve: &[EquityPoint]) -> Vec<f64> {
    let mut equity = Vec::with_capacity(curve.len() + 1);
    equity.push(initial_capital);
    equity.extend(equity_values(curve));
    equity
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity: &[f64]) -> f64 {
    match (equity.first(), equity.last()) {
        (Some(&initial), Some(&last)) if equity.len() >= 2 && initial > 0.0 => {
            (last - initial) / initial
        }
        _ => 0.0,
    }
}

/// Compound annual return over `equity.len() - 1` bars.
///
/// Returns 0.0 when there are no returns or the final equity is not positive.
pub fn annualized_return(equity: &[f64]) -> f64 {
    let bars = equity.len().saturating_sub(1);
    let (Some(&initial), Some(&last)) = (equity.first(), equity.last()) else {
        return 0.0;
    };
    if bars == 0 || initial <= 0.0 || last <= 0.0 {
        return 0.0;
    }
    let years = bars as f64 / BARS_PER_YEAR;
    (last / initial).powf(1.0 / years) - 1.0
}

/// Annualized Sharpe ratio from per-bar returns.
///
/// Sharpe = mean(returns - rf) / std(returns) * sqrt(252).
/// Returns 0.0 if variance is zero or there are fewer than 2 returns.
pub fn sharpe_ratio(equity: &[f64], risk_free_rate: f64) -> f64 {
    let excess = excess_returns(equity, risk_free_rate);
    if excess.len() < 2 {
        return 0.0;
    }
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(&excess) / std * BARS_PER_YEAR.sqrt()
}

/// Annualized Sortino ratio (downside deviation only).
///
/// Returns 0.0 if there is no downside or fewer than 2 returns.
pub fn sortino_ratio(equity: &[f64], risk_free_rate: f64) -> f64 {
    let excess = excess_returns(equity, risk_free_rate);
    if excess.len() < 2 {
        return 0.0;
    }
    let downside_sq: f64 = excess.iter().filter(|&&r| r < 0.0).map(|r| r * r).sum();
    if downside_sq == 0.0 {
        return 0.0;
    }
    let downside_std = (downside_sq / excess.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    mean_f64(&excess) / downside_std * BARS_PER_YEAR.sqrt()
}

/// Annualized return / |max drawdown|.
///
/// Returns 0.0 if there was no drawdown or the return is not positive.
pub fn calmar_ratio(equity: &[f64]) -> f64 {
    let ann = annualized_return(equity);
    let dd = max_drawdown(equity);
    if dd >= 0.0 || ann <= 0.0 {
        return 0.0;
    }
    ann / dd.abs()
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0_f64;
    for &eq in equity {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Simple per-bar returns. A non-positive base yields a zero return.
pub fn daily_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

fn excess_returns(equity: &[f64], risk_free_rate: f64) -> Vec<f64> {
    let per_bar_rf = risk_free_rate / BARS_PER_YEAR;
    daily_returns(equity).into_iter().map(|r| r - per_bar_rf).collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
