//! Backtest orchestrator — the bar-by-bar event loop.
//!
//! Per date, in order:
//! 1. Mark open positions at today's closes
//! 2. Interpret today's signals into orders
//! 3. Execute sells, then buys, and apply each fill
//! 4. Log trades closed by those fills
//! 5. Snapshot equity
//!
//! Single-threaded and free of I/O: identical inputs give bit-identical
//! results.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{Bar, Fill, Order, PriceData, Signal, SignalData, SignalModel};
use crate::engine::cost_model::MarketContext;
use crate::engine::diagnostics::{RunDiagnostics, SimulationWarning};
use crate::engine::execution::OrderExecutionEngine;
use crate::engine::metrics::PerformanceMetrics;
use crate::engine::position_tracker::{FillOutcome, PositionTracker, TrackerError};
use crate::engine::signal_interpreter::SignalInterpreter;
use crate::engine::state::{
    AccountingSummary, BacktestResults, DateRange, EngineConfig, EngineStatus,
};
use crate::engine::trade_logger::TradeLogger;
use crate::engine::validation::{validate_inputs, ValidationError};

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("engine is {0:?}; run requires a freshly initialized engine")]
    InvalidState(EngineStatus),

    #[error("position tracker: {0}")]
    Tracker(#[from] TrackerError),
}

/// One engine per run. `run` may be called exactly once.
pub struct BacktestEngine {
    config: EngineConfig,
    status: EngineStatus,
}

impl BacktestEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            status: EngineStatus::Initialized,
        }
    }

    pub fn status(&self) -> EngineStatus {
        self.status
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate inputs, then simulate every date in `date_range` (all dates
    /// when `None`).
    pub fn run(
        &mut self,
        prices: &PriceData,
        signals: &SignalData,
        date_range: Option<DateRange>,
    ) -> Result<BacktestResults, BacktestError> {
        if self.status != EngineStatus::Initialized {
            return Err(BacktestError::InvalidState(self.status));
        }
        let range = date_range.unwrap_or_default();

        if let Err(err) = validate_inputs(&self.config, prices, signals, &range) {
            warn!(error = %err, "input validation failed");
            self.status = EngineStatus::Failed;
            return Err(err.into());
        }

        self.status = EngineStatus::Running;
        match Simulation::new(&self.config, prices, signals).run(&range) {
            Ok(results) => {
                self.status = EngineStatus::Completed;
                Ok(results)
            }
            Err(err) => {
                self.status = EngineStatus::Failed;
                Err(err.into())
            }
        }
    }
}

/// Per-run mutable state. Never outlives one `run` call.
struct Simulation<'a> {
    config: &'a EngineConfig,
    bars: BTreeMap<&'a str, BTreeMap<NaiveDate, &'a Bar>>,
    signals: BTreeMap<&'a str, BTreeMap<NaiveDate, &'a Signal>>,
    /// First and last bar date per symbol.
    spans: BTreeMap<&'a str, (NaiveDate, NaiveDate)>,
    volumes: BTreeMap<&'a str, VecDeque<u64>>,
    tracker: PositionTracker,
    interpreter: SignalInterpreter,
    executor: OrderExecutionEngine,
    logger: TradeLogger,
    fills: Vec<Fill>,
    diagnostics: RunDiagnostics,
}

impl<'a> Simulation<'a> {
    fn new(config: &'a EngineConfig, prices: &'a PriceData, signals: &'a SignalData) -> Self {
        let bars = prices
            .iter()
            .map(|(sym, series)| {
                let by_date: BTreeMap<NaiveDate, &Bar> = series.iter().map(|b| (b.date, b)).collect();
                (sym.as_str(), by_date)
            })
            .collect();
        let spans = prices
            .iter()
            .filter_map(|(sym, series)| {
                Some((sym.as_str(), (series.first()?.date, series.last()?.date)))
            })
            .collect();
        let signals = signals
            .iter()
            .map(|(sym, series)| {
                let by_date: BTreeMap<NaiveDate, &Signal> =
                    series.iter().map(|s| (s.date, s)).collect();
                (sym.as_str(), by_date)
            })
            .collect();

        Self {
            config,
            bars,
            signals,
            spans,
            volumes: BTreeMap::new(),
            tracker: PositionTracker::new(config.initial_capital),
            interpreter: SignalInterpreter::new(
                config.interpreter.clone(),
                config.allocation.policy(),
            ),
            executor: OrderExecutionEngine::from_config(&config.execution),
            logger: TradeLogger::new(),
            fills: Vec::new(),
            diagnostics: RunDiagnostics::default(),
        }
    }

    fn run(mut self, range: &DateRange) -> Result<BacktestResults, TrackerError> {
        let dates: BTreeSet<NaiveDate> = self
            .bars
            .values()
            .flat_map(|series| series.keys().copied())
            .filter(|d| range.contains(*d))
            .collect();

        info!(
            dates = dates.len(),
            instruments = self.bars.len(),
            allocation = self.interpreter.policy_name(),
            "backtest started"
        );

        for date in dates {
            self.step(date)?;
        }
        Ok(self.finish())
    }

    fn step(&mut self, date: NaiveDate) -> Result<(), TrackerError> {
        let today = self.bars_on(date);
        let closes: BTreeMap<String, f64> = today
            .iter()
            .map(|(sym, bar)| (sym.to_string(), bar.close))
            .collect();
        for (&sym, bar) in &today {
            self.push_volume(sym, bar.volume);
        }

        self.tracker.mark_prices(&closes);

        let signals: BTreeMap<String, Signal> = self
            .signals
            .iter()
            .filter_map(|(sym, series)| series.get(&date).map(|s| (sym.to_string(), (*s).clone())))
            .collect();
        let interpretation = self.interpreter.interpret_signals(
            date,
            &signals,
            self.tracker.positions(),
            &closes,
            self.tracker.portfolio_value(),
        );
        self.diagnostics.min_notional_drops += interpretation.dropped_min_notional;

        let mut sells: BTreeMap<&str, Vec<Order>> = BTreeMap::new();
        let mut buys: BTreeMap<&str, Vec<Order>> = BTreeMap::new();
        for order in &interpretation.orders {
            let book = if order.is_buy() { &mut buys } else { &mut sells };
            book.entry(order.symbol.as_str()).or_default().push(order.clone());
        }

        self.record_gaps(date, &today, &sells, &buys);

        for (sym, orders) in sells.iter().chain(buys.iter()) {
            if let Some(bar) = today.get(sym) {
                self.execute(orders, bar);
            }
        }

        self.tracker.update_prices(date, &closes)?;
        self.diagnostics.dates_processed += 1;
        Ok(())
    }

    fn bars_on(&self, date: NaiveDate) -> BTreeMap<&'a str, &'a Bar> {
        self.bars
            .iter()
            .filter_map(|(sym, series)| series.get(&date).map(|bar| (*sym, *bar)))
            .collect()
    }

    fn push_volume(&mut self, symbol: &'a str, volume: u64) {
        let window = self.volumes.entry(symbol).or_default();
        window.push_back(volume);
        while window.len() > self.config.adv_window {
            window.pop_front();
        }
    }

    fn market_context(&self, bar: &Bar) -> MarketContext {
        let avg_daily_volume = match self.volumes.get(bar.symbol.as_str()) {
            Some(window) if !window.is_empty() => {
                window.iter().map(|v| *v as f64).sum::<f64>() / window.len() as f64
            }
            _ => bar.volume as f64,
        };
        let meta = self.config.instrument(&bar.symbol);
        MarketContext {
            avg_daily_volume,
            spread: meta.spread,
            market_cap: meta.market_cap,
        }
    }

    /// Record a gap for every instrument without a bar today that is either
    /// inside its own listing span or has orders waiting.
    fn record_gaps(
        &mut self,
        date: NaiveDate,
        today: &BTreeMap<&str, &Bar>,
        sells: &BTreeMap<&str, Vec<Order>>,
        buys: &BTreeMap<&str, Vec<Order>>,
    ) {
        let mut gaps = Vec::new();
        for (sym, (first, last)) in &self.spans {
            if today.contains_key(sym) {
                continue;
            }
            let orders: Vec<Order> = sells
                .get(sym)
                .into_iter()
                .chain(buys.get(sym))
                .flatten()
                .cloned()
                .collect();
            let skipped = self.executor.skip_missing(&orders, date);
            if !skipped.is_empty() {
                gaps.extend(skipped);
            } else if (*first..=*last).contains(&date) {
                debug!(symbol = %sym, %date, "no bar inside listing span");
                gaps.push(SimulationWarning::DataGap {
                    symbol: sym.to_string(),
                    date,
                    orders_skipped: 0,
                });
            }
        }
        for warning in gaps {
            self.diagnostics.record(warning);
        }
    }

    fn execute(&mut self, orders: &[Order], bar: &Bar) {
        let market = self.market_context(bar);
        let execution = self.executor.process_bar(orders, bar, &market);
        for warning in execution.warnings {
            self.diagnostics.record(warning);
        }

        for fill in execution.fills {
            match self.tracker.apply_fill(&fill) {
                FillOutcome::Applied { closed } => {
                    if let Some(closed) = closed {
                        let trade = self.logger.record_trade(&closed, fill.date);
                        debug!(
                            symbol = %trade.symbol,
                            pnl = trade.pnl,
                            holding_days = trade.holding_days,
                            "trade closed"
                        );
                    }
                    self.fills.push(fill);
                }
                FillOutcome::Rejected(warning) => self.diagnostics.record(warning),
            }
        }
    }

    fn finish(self) -> BacktestResults {
        let portfolio = self.tracker.portfolio();
        let accounting = AccountingSummary {
            initial_capital: portfolio.initial_capital,
            final_equity: self.tracker.portfolio_value(),
            final_cash: portfolio.cash,
            realized_pnl: portfolio.realized_pnl,
            unrealized_pnl: portfolio.unrealized_pnl(),
            buy_fees: portfolio.buy_fees,
            total_commission: portfolio.total_commission,
            total_tax: portfolio.total_tax,
            total_slippage: portfolio.total_slippage,
            residual: self.tracker.accounting_residual(),
        };
        let metrics = PerformanceMetrics::compute(
            self.config.initial_capital,
            self.tracker.equity_curve(),
            self.config.risk_free_rate,
        );
        let trade_stats = self.logger.trade_stats();

        info!(
            final_equity = accounting.final_equity,
            total_return = metrics.total_return,
            trades = trade_stats.num_trades,
            rejected = self.diagnostics.rejected_orders,
            data_gaps = self.diagnostics.data_gaps,
            "backtest completed"
        );

        let open_positions = self.tracker.positions().clone();
        let (_, equity_curve) = self.tracker.into_parts();
        BacktestResults {
            signal_model: SignalModel::RebalanceEveryBar,
            metrics,
            equity_curve,
            trades: self.logger.into_trades(),
            trade_stats,
            fills: self.fills,
            open_positions,
            diagnostics: self.diagnostics,
            accounting,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::execution::ExecutionConfig;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn bar(symbol: &str, day: u32, close: f64) -> Bar {
        Bar {
            symbol: symbol.into(),
            date: d(day),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000_000,
        }
    }

    fn frictionless() -> EngineConfig {
        let mut config = EngineConfig::with_execution(10_000.0, ExecutionConfig::frictionless());
        config.interpreter.min_order_notional = 0.0;
        config.interpreter.cost_buffer = 0.0;
        config
    }

    #[test]
    fn second_run_is_invalid_state() {
        let prices: PriceData = [("A".to_string(), vec![bar("A", 2, 10.0)])].into_iter().collect();
        let mut engine = BacktestEngine::new(frictionless());
        assert_eq!(engine.status(), EngineStatus::Initialized);
        engine.run(&prices, &SignalData::new(), None).unwrap();
        assert_eq!(engine.status(), EngineStatus::Completed);
        assert!(matches!(
            engine.run(&prices, &SignalData::new(), None),
            Err(BacktestError::InvalidState(EngineStatus::Completed))
        ));
    }

    #[test]
    fn validation_failure_marks_failed() {
        let mut engine = BacktestEngine::new(frictionless());
        let err = engine.run(&PriceData::new(), &SignalData::new(), None).unwrap_err();
        assert!(matches!(err, BacktestError::Validation(ValidationError::EmptyPriceData)));
        assert_eq!(engine.status(), EngineStatus::Failed);
    }

    #[test]
    fn one_equity_row_per_date() {
        let prices: PriceData = [
            ("A".to_string(), vec![bar("A", 2, 10.0), bar("A", 3, 11.0)]),
            ("B".to_string(), vec![bar("B", 3, 5.0), bar("B", 4, 5.0)]),
        ]
        .into_iter()
        .collect();
        let results = BacktestEngine::new(frictionless())
            .run(&prices, &SignalData::new(), None)
            .unwrap();
        let dates: Vec<_> = results.equity_curve.iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![d(2), d(3), d(4)]);
        assert_eq!(results.signal_model, SignalModel::RebalanceEveryBar);
        assert_eq!(results.diagnostics.dates_processed, 3);
    }

    #[test]
    fn date_range_limits_the_loop() {
        let prices: PriceData = [(
            "A".to_string(),
            (2..=6).map(|day| bar("A", day, 10.0)).collect(),
        )]
        .into_iter()
        .collect();
        let results = BacktestEngine::new(frictionless())
            .run(&prices, &SignalData::new(), Some(DateRange::between(d(3), d(5))))
            .unwrap();
        assert_eq!(results.equity_curve.len(), 3);
        assert_eq!(results.equity_curve[0].date, d(3));
    }

    #[test]
    fn buy_then_exit_produces_one_trade() {
        let prices: PriceData = [(
            "A".to_string(),
            vec![bar("A", 2, 10.0), bar("A", 3, 12.0), bar("A", 4, 12.0)],
        )]
        .into_iter()
        .collect();
        let signals: SignalData = [(
            "A".to_string(),
            vec![Signal::hold("A", d(2)), Signal::hold("A", d(3)), Signal::flat("A", d(4))],
        )]
        .into_iter()
        .collect();
        let results = BacktestEngine::new(frictionless())
            .run(&prices, &signals, None)
            .unwrap();

        assert_eq!(results.trades.len(), 1);
        let trade = &results.trades[0];
        assert_eq!(trade.quantity, 1_000.0);
        assert_eq!(trade.pnl, 2_000.0);
        assert_eq!(results.final_equity(), 12_000.0);
        assert!(results.open_positions.is_empty());
        assert!(results.accounting.residual.abs() < 1e-6);
    }
}
