//! Integration tests for the backtest event loop.
//!
//! Tests:
//! 1. Flat price held through the run: only entry costs move equity
//! 2. Signal flip: exactly one round trip at the fill prices
//! 3. Participation cap: fill truncated, remainder never carried
//! 4. Equal-weight split across two instruments
//! 5. Under-funded buy rejected, cash untouched
//! 6. Data gaps, idempotence, monotonic dates, accounting identity

use chrono::NaiveDate;
use quantlab_core::domain::{Bar, OrderSide, PriceData, Signal, SignalData};
use quantlab_core::engine::{
    BacktestEngine, BacktestResults, CostModelConfig, EngineConfig, ExecutionConfig,
    SimulationWarning,
};
use quantlab_core::fingerprint::results_digest;

fn day(i: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i as i64)
}

/// Helper: flat bars at `closes[i]` on day `i + 1`.
fn bars(symbol: &str, closes: &[f64], volume: u64) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            symbol: symbol.into(),
            date: day(i + 1),
            open: close,
            high: close,
            low: close,
            close,
            volume,
        })
        .collect()
}

/// Helper: one signal per day from a hold-flag vector.
fn signals(symbol: &str, holds: &[bool]) -> Vec<Signal> {
    holds
        .iter()
        .enumerate()
        .map(|(i, &hold)| Signal {
            symbol: symbol.into(),
            date: day(i + 1),
            hold,
            weight: None,
        })
        .collect()
}

fn prices_of(series: Vec<Vec<Bar>>) -> PriceData {
    series
        .into_iter()
        .map(|bars| (bars[0].symbol.clone(), bars))
        .collect()
}

fn signals_of(series: Vec<Vec<Signal>>) -> SignalData {
    series
        .into_iter()
        .map(|s| (s[0].symbol.clone(), s))
        .collect()
}

fn config(capital: f64, costs: CostModelConfig) -> EngineConfig {
    let mut config = EngineConfig::with_execution(
        capital,
        ExecutionConfig {
            costs,
            max_participation_rate: 0.1,
        },
    );
    config.interpreter.min_order_notional = 0.0;
    config.interpreter.cost_buffer = 0.0;
    config
}

fn run(config: EngineConfig, prices: &PriceData, signals: &SignalData) -> BacktestResults {
    BacktestEngine::new(config)
        .run(prices, signals, None)
        .expect("run should succeed")
}

// ── Scenario A: flat price, held throughout ──

#[test]
fn flat_price_loses_only_entry_costs() {
    let prices = prices_of(vec![bars("A", &[10.0; 10], 10_000_000)]);
    let signals = signals_of(vec![signals("A", &[true; 10])]);
    let mut config = config(1_000_000.0, CostModelConfig::default());
    config.interpreter.cost_buffer = 0.01;
    config.interpreter.min_order_notional = 50_000.0;

    let results = run(config, &prices, &signals);

    assert_eq!(results.fills.len(), 1, "top-ups stay below min notional");
    let fill = &results.fills[0];
    assert_eq!(fill.side, OrderSide::Buy);
    let entry_cost = fill.commission + fill.tax + (fill.price - 10.0) * fill.quantity;
    assert!(entry_cost > 0.0);
    let expected = -entry_cost / 1_000_000.0;
    assert!(
        (results.metrics.total_return - expected).abs() < 1e-12,
        "total_return {} vs {}",
        results.metrics.total_return,
        expected
    );
    assert!(results.trades.is_empty());
    assert_eq!(results.open_positions["A"].quantity, fill.quantity);
}

// ── Scenario B: hold flips to flat ──

#[test]
fn signal_flip_closes_exactly_one_trade() {
    let prices = prices_of(vec![bars("A", &[10.0, 10.0, 10.0, 10.0, 12.0, 12.0], 1_000_000)]);
    let signals = signals_of(vec![signals(
        "A",
        &[true, true, true, true, false, false],
    )]);
    let mut config = config(100_000.0, CostModelConfig::default());
    config.interpreter.cost_buffer = 0.01;
    config.interpreter.min_order_notional = 5_000.0;

    let results = run(config, &prices, &signals);

    assert_eq!(results.trades.len(), 1);
    let trade = &results.trades[0];
    let entry = &results.fills[0];
    let exit = results.fills.last().unwrap();
    assert_eq!(exit.side, OrderSide::Sell);
    assert_eq!(exit.date, day(5));
    assert!((trade.entry_price - entry.price).abs() < 1e-9);
    assert!((trade.exit_price - exit.price).abs() < 1e-9);
    assert_eq!(trade.quantity, entry.quantity);
    assert_eq!(trade.entry_date, day(1));
    assert_eq!(trade.exit_date, day(5));
    assert_eq!(trade.holding_days, 4);
    assert!(trade.pnl > 0.0);
    assert!(trade.pnl < trade.gross_pnl);
}

// ── Scenario C: participation cap ──

#[test]
fn participation_cap_truncates_and_drops_remainder() {
    // capital buys 5000 units = 50% of the 10_000 bar volume
    let prices = prices_of(vec![bars("A", &[10.0, 10.0], 10_000)]);
    let signals = signals_of(vec![signals("A", &[true, false])]);
    let results = run(
        config(50_000.0, CostModelConfig::frictionless()),
        &prices,
        &signals,
    );

    let first = &results.fills[0];
    assert_eq!(first.requested_quantity, 5_000.0);
    assert_eq!(first.quantity, 1_000.0);
    assert!(first.was_truncated());
    assert_eq!(results.diagnostics.liquidity_truncations, 1);

    // day 2 only exits what was filled; nothing from day 1 is carried over
    let day2: Vec<_> = results.fills.iter().filter(|f| f.date == day(2)).collect();
    assert_eq!(day2.len(), 1);
    assert_eq!(day2[0].side, OrderSide::Sell);
    assert_eq!(day2[0].quantity, 1_000.0);
}

// ── Scenario D: equal weight across two instruments ──

#[test]
fn two_targets_split_equally() {
    let prices = prices_of(vec![
        bars("A", &[10.0, 10.0], 10_000_000),
        bars("B", &[20.0, 20.0], 10_000_000),
    ]);
    let signals = signals_of(vec![signals("A", &[true, true]), signals("B", &[true, true])]);
    let mut config = config(100_000.0, CostModelConfig::frictionless());
    config.interpreter.max_positions = 2;

    let results = run(config, &prices, &signals);

    let point = &results.equity_curve[0];
    for symbol in ["A", "B"] {
        let pos = &results.open_positions[symbol];
        let share = pos.market_value() / point.total_equity;
        assert!(
            (share - 0.5).abs() <= pos.last_price / point.total_equity,
            "{symbol} share {share}"
        );
    }
}

#[test]
fn max_positions_keeps_symbol_order_on_ties() {
    let prices = prices_of(vec![
        bars("A", &[10.0], 10_000_000),
        bars("B", &[10.0], 10_000_000),
        bars("C", &[10.0], 10_000_000),
    ]);
    let signals = signals_of(vec![
        signals("A", &[true]),
        signals("B", &[true]),
        signals("C", &[true]),
    ]);
    let mut config = config(90_000.0, CostModelConfig::frictionless());
    config.interpreter.max_positions = 2;

    let results = run(config, &prices, &signals);
    let held: Vec<_> = results.open_positions.keys().cloned().collect();
    assert_eq!(held, vec!["A".to_string(), "B".to_string()]);
}

// ── Scenario E: insufficient cash ──

#[test]
fn underfunded_buy_rejected_with_cash_unchanged() {
    let prices = prices_of(vec![bars("A", &[10.0], 10_000_000)]);
    let signals = signals_of(vec![signals("A", &[true])]);
    // no cost buffer: notional alone uses all cash, commission tips it over
    let costs = CostModelConfig {
        commission_rate: 0.01,
        ..CostModelConfig::frictionless()
    };
    let results = run(config(10_000.0, costs), &prices, &signals);

    assert!(results.fills.is_empty());
    assert_eq!(results.equity_curve[0].cash, 10_000.0);
    assert_eq!(results.diagnostics.rejected_orders, 1);
    assert!(matches!(
        results.diagnostics.warnings[0],
        SimulationWarning::InsufficientCash { .. }
    ));
}

// ── Data gaps ──

#[test]
fn missing_bar_degrades_one_instrument_for_one_date() {
    let mut b = bars("B", &[20.0, 20.0, 22.0, 22.0], 10_000_000);
    b.remove(1); // no B bar on day 2
    let prices = prices_of(vec![bars("A", &[10.0, 10.0, 10.0, 10.0], 10_000_000), b]);
    let signals = signals_of(vec![
        signals("A", &[true, true, true, true]),
        vec![
            Signal::hold("B", day(1)),
            Signal::hold("B", day(3)),
            Signal::hold("B", day(4)),
        ],
    ]);
    let mut config = config(100_000.0, CostModelConfig::frictionless());
    config.interpreter.max_positions = 2;

    let results = run(config, &prices, &signals);

    assert_eq!(results.equity_curve.len(), 4);
    assert_eq!(results.diagnostics.data_gaps, 1);
    // B had no signal on day 2 → exit requested, skipped for lack of a bar
    assert!(matches!(
        &results.diagnostics.warnings[0],
        SimulationWarning::DataGap { symbol, orders_skipped: 1, .. } if symbol == "B"
    ));
    // B stays marked at its day-1 close on day 2
    let b_qty = results.fills[1].quantity;
    let day2 = &results.equity_curve[1];
    let a_qty = results.fills[0].quantity;
    assert!((day2.holdings_value - (a_qty * 10.0 + b_qty * 20.0)).abs() < 1e-9);
    assert!(results.fills.iter().all(|f| f.date != day(2) || f.symbol == "A"));
}

// ── Determinism and invariants ──

fn mixed_universe() -> (PriceData, SignalData) {
    let prices = prices_of(vec![
        bars("A", &[10.0, 10.5, 10.2, 11.0, 10.8, 11.5, 11.1, 12.0], 200_000),
        bars("B", &[50.0, 49.0, 51.0, 52.5, 50.0, 48.0, 49.5, 50.5], 40_000),
        bars("C", &[5.0, 5.1, 5.2, 5.0, 4.8, 4.9, 5.3, 5.4], 1_000_000),
    ]);
    let signals = signals_of(vec![
        signals("A", &[true, true, false, true, true, true, false, false]),
        signals("B", &[true, true, true, true, false, false, true, true]),
        signals("C", &[false, true, true, true, true, false, false, true]),
    ]);
    (prices, signals)
}

fn realistic_config() -> EngineConfig {
    let mut config = EngineConfig::new(1_000_000.0);
    config.interpreter.max_positions = 2;
    config.interpreter.min_order_notional = 10_000.0;
    config
}

#[test]
fn identical_inputs_give_identical_results() {
    let (prices, signals) = mixed_universe();
    let a = run(realistic_config(), &prices, &signals);
    let b = run(realistic_config(), &prices, &signals);
    assert_eq!(a, b);
    assert_eq!(results_digest(&a), results_digest(&b));
}

#[test]
fn equity_dates_strictly_increase() {
    let (prices, signals) = mixed_universe();
    let results = run(realistic_config(), &prices, &signals);
    assert!(results.equity_curve.windows(2).all(|w| w[0].date < w[1].date));
}

#[test]
fn accounting_identity_holds_at_end() {
    let (prices, signals) = mixed_universe();
    let results = run(realistic_config(), &prices, &signals);
    let acc = &results.accounting;
    assert!(acc.residual.abs() < 1e-6, "residual {}", acc.residual);
    assert!(!results.fills.is_empty());
    assert!(results.equity_curve.iter().all(|p| p.cash >= 0.0));
    for point in &results.equity_curve {
        assert!((point.cash + point.holdings_value - point.total_equity).abs() < 1e-9);
    }
    let trade_costs: f64 = results.trades.iter().map(|t| t.total_costs()).sum();
    assert!(trade_costs <= acc.total_commission + acc.total_tax + 1e-9);

    let identity = acc.initial_capital + acc.realized_pnl + acc.unrealized_pnl - acc.buy_fees;
    assert!((identity - acc.final_equity).abs() < 1e-6);
    assert!(acc.buy_fees <= acc.total_commission + acc.total_tax + 1e-9);
}
