//! Reporting and export — JSON, CSV, and Markdown artifact generation.
//!
//! - **JSON**: the full [`RunReport`], with schema versioning
//! - **CSV**: trade ledger and equity curve for external analysis tools
//! - **Markdown**: a short human-readable summary of one run
//!
//! Unknown schema versions are rejected on load.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use quantlab_core::domain::{EquityPoint, Trade};

use crate::runner::{RunReport, SCHEMA_VERSION};
use crate::sweep::SweepResults;

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize RunReport to JSON")
}

/// Deserialize a `RunReport`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<RunReport> {
    let report: RunReport =
        serde_json::from_str(json).context("failed to deserialize RunReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

pub fn write_results_json(report: &RunReport, path: &Path) -> Result<()> {
    let json = export_json(report)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

pub fn read_results_json(path: &Path) -> Result<RunReport> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Trade ledger in its interchange shape.
///
/// Columns: ticker, entry_date, exit_date, quantity, pnl, pnl_pct,
/// commission, tax, holding_days
pub fn trade_ledger_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "ticker",
        "entry_date",
        "exit_date",
        "quantity",
        "pnl",
        "pnl_pct",
        "commission",
        "tax",
        "holding_days",
    ])?;

    for t in trades {
        wtr.write_record([
            &t.symbol,
            &t.entry_date.to_string(),
            &t.exit_date.to_string(),
            &format!("{}", t.quantity),
            &format!("{:.2}", t.pnl),
            &format!("{:.6}", t.pnl_pct),
            &format!("{:.2}", t.commission),
            &format!("{:.2}", t.tax),
            &t.holding_days.to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Equity curve as CSV: date, cash, holdings_value, total_equity.
pub fn equity_curve_csv(curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "cash", "holdings_value", "total_equity"])?;
    for p in curve {
        wtr.write_record([
            &p.date.to_string(),
            &format!("{:.2}", p.cash),
            &format!("{:.2}", p.holdings_value),
            &format!("{:.2}", p.total_equity),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Sweep summaries in rank order.
pub fn sweep_csv(results: &SweepResults) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "rank",
        "max_positions",
        "max_participation_rate",
        "min_order_notional",
        "commission_rate",
        "sharpe",
        "total_return",
        "max_drawdown",
        "num_trades",
        "final_equity",
        "run_id",
    ])?;
    for (i, s) in results.summaries.iter().enumerate() {
        wtr.write_record([
            &(i + 1).to_string(),
            &s.params.max_positions.to_string(),
            &s.params.max_participation_rate.to_string(),
            &s.params.min_order_notional.to_string(),
            &s.params.commission_rate.to_string(),
            &format!("{:.4}", s.sharpe),
            &format!("{:.6}", s.total_return),
            &format!("{:.6}", s.max_drawdown),
            &s.num_trades.to_string(),
            &format!("{:.2}", s.final_equity),
            &s.run_id.0,
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Files written for one run.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
    pub results_json: PathBuf,
    pub trades_csv: PathBuf,
    pub equity_csv: PathBuf,
}

/// Save the full artifact set for a single run.
///
/// Creates `{output_dir}/{run_id_short}/` containing:
/// - `results.json` — the full `RunReport`
/// - `trades.csv` — trade ledger
/// - `equity.csv` — per-date equity curve
///
/// The directory name is derived from the run id, so rerunning identical
/// inputs overwrites the same files.
pub fn write_artifacts(report: &RunReport, output_dir: &Path) -> Result<ArtifactPaths> {
    let dir = output_dir.join(report.run_id.short());
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create artifact dir: {}", dir.display()))?;

    let paths = ArtifactPaths {
        results_json: dir.join("results.json"),
        trades_csv: dir.join("trades.csv"),
        equity_csv: dir.join("equity.csv"),
        dir,
    };

    write_results_json(report, &paths.results_json)?;
    std::fs::write(&paths.trades_csv, trade_ledger_csv(&report.results.trades)?)
        .with_context(|| format!("failed to write {}", paths.trades_csv.display()))?;
    std::fs::write(&paths.equity_csv, equity_curve_csv(&report.results.equity_curve)?)
        .with_context(|| format!("failed to write {}", paths.equity_csv.display()))?;

    Ok(paths)
}

// ─── Markdown summary ───────────────────────────────────────────────

pub fn render_summary(report: &RunReport) -> String {
    let r = &report.results;
    let m = &r.metrics;
    let s = &r.trade_stats;
    let d = &r.diagnostics;
    let mut md = String::with_capacity(1024);

    let _ = writeln!(md, "# Backtest {}\n", report.run_id.short());
    md.push_str("| Field | Value |\n| --- | --- |\n");
    let _ = writeln!(md, "| Dataset | {} |", report.dataset_hash.short());
    let _ = writeln!(md, "| Initial capital | {:.0} |", r.accounting.initial_capital);
    let _ = writeln!(md, "| Final equity | {:.0} |", r.final_equity());
    let _ = writeln!(md, "| Total return | {:.2}% |", m.total_return * 100.0);
    let _ = writeln!(md, "| Annualized return | {:.2}% |", m.annualized_return * 100.0);
    let _ = writeln!(md, "| Sharpe | {:.3} |", m.sharpe);
    let _ = writeln!(md, "| Sortino | {:.3} |", m.sortino);
    let _ = writeln!(md, "| Max drawdown | {:.2}% |", m.max_drawdown * 100.0);
    let _ = writeln!(md, "| Trades | {} |", s.num_trades);
    let _ = writeln!(md, "| Win rate | {:.1}% |", s.win_rate * 100.0);
    let _ = writeln!(md, "| Profit factor | {:.2} |", s.profit_factor);
    let _ = writeln!(
        md,
        "| Costs (commission / tax / slippage) | {:.0} / {:.0} / {:.0} |",
        r.accounting.total_commission, r.accounting.total_tax, r.accounting.total_slippage
    );
    let _ = writeln!(
        md,
        "| Data gaps / rejected / truncated | {} / {} / {} |",
        d.data_gaps, d.rejected_orders, d.liquidity_truncations
    );
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn trade() -> Trade {
        Trade {
            symbol: "AAA".into(),
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            exit_date: NaiveDate::from_ymd_opt(2024, 1, 9).unwrap(),
            entry_price: 10.0,
            exit_price: 11.0,
            quantity: 100.0,
            gross_pnl: 100.0,
            pnl: 97.5,
            pnl_pct: 0.0975,
            commission: 0.5,
            tax: 2.0,
            holding_days: 7,
        }
    }

    #[test]
    fn ledger_csv_has_interchange_columns() {
        let csv = trade_ledger_csv(&[trade()]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "ticker,entry_date,exit_date,quantity,pnl,pnl_pct,commission,tax,holding_days"
        );
        assert_eq!(
            lines.next().unwrap(),
            "AAA,2024-01-02,2024-01-09,100,97.50,0.097500,0.50,2.00,7"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn equity_csv_one_row_per_point() {
        let curve = vec![EquityPoint {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            cash: 500.0,
            holdings_value: 1500.0,
            total_equity: 2000.0,
        }];
        let csv = equity_curve_csv(&curve).unwrap();
        assert_eq!(
            csv,
            "date,cash,holdings_value,total_equity\n2024-01-02,500.00,1500.00,2000.00\n"
        );
    }

    #[test]
    fn empty_sweep_csv_is_header_only() {
        let csv = sweep_csv(&SweepResults::default()).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }
}
