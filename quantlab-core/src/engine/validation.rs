//! Pre-run input validation.
//!
//! Runs before any simulation state exists; the first violation aborts the
//! run. Anything that can be recovered bar-by-bar (missing bars, short cash)
//! is not checked here.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{PriceData, SignalData};
use crate::engine::state::{DateRange, EngineConfig};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("price data is empty")]
    EmptyPriceData,

    #[error("price series {key} contains bar for {found}")]
    SymbolMismatch { key: String, found: String },

    #[error("{symbol}: dates not strictly increasing at {date}")]
    NonMonotonicDates { symbol: String, date: NaiveDate },

    #[error("{symbol} {date}: invalid {field} = {value}")]
    InvalidPrice {
        symbol: String,
        date: NaiveDate,
        field: &'static str,
        value: f64,
    },

    #[error("{symbol} {date}: high/low do not bracket open and close")]
    InconsistentBar { symbol: String, date: NaiveDate },

    #[error("signals for {0} have no price series")]
    UnknownSignalSymbol(String),

    #[error("{symbol}: signal on {date} has no matching price date")]
    SignalDateNotInIndex { symbol: String, date: NaiveDate },

    #[error("{symbol} {date}: invalid signal weight {weight}")]
    InvalidWeight {
        symbol: String,
        date: NaiveDate,
        weight: f64,
    },

    #[error("date range start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
}

/// Check config, price data, signals and date range, in that order.
pub fn validate_inputs(
    config: &EngineConfig,
    prices: &PriceData,
    signals: &SignalData,
    range: &DateRange,
) -> Result<(), ValidationError> {
    validate_config(config)?;
    validate_prices(prices)?;
    validate_signals(prices, signals)?;
    if let (Some(start), Some(end)) = (range.start, range.end) {
        if !range.is_ordered() {
            return Err(ValidationError::InvalidDateRange { start, end });
        }
    }
    Ok(())
}

pub fn validate_config(config: &EngineConfig) -> Result<(), ValidationError> {
    let invalid = |msg: String| Err(ValidationError::InvalidConfig(msg));

    if !(config.initial_capital.is_finite() && config.initial_capital > 0.0) {
        return invalid(format!(
            "initial_capital must be positive, got {}",
            config.initial_capital
        ));
    }
    if !config.execution.liquidity().is_valid() {
        return invalid(format!(
            "max_participation_rate must be in (0, 1], got {}",
            config.execution.max_participation_rate
        ));
    }
    if config.interpreter.max_positions == 0 {
        return invalid("max_positions must be at least 1".into());
    }
    if config.adv_window == 0 {
        return invalid("adv_window must be at least 1".into());
    }

    let costs = &config.execution.costs;
    let non_negative = [
        ("commission_rate", costs.commission_rate),
        ("sell_tax_rate", costs.sell_tax_rate),
        ("impact_k1", costs.impact_k1),
        ("impact_k2", costs.impact_k2),
        ("slippage_bps", costs.slippage_bps),
        ("default_spread_bps", costs.default_spread_bps),
        ("min_order_notional", config.interpreter.min_order_notional),
        ("cost_buffer", config.interpreter.cost_buffer),
    ];
    for (name, value) in non_negative {
        if !(value.is_finite() && value >= 0.0) {
            return invalid(format!("{name} must be non-negative, got {value}"));
        }
    }
    for (name, value) in [
        ("commission_rate", costs.commission_rate),
        ("sell_tax_rate", costs.sell_tax_rate),
    ] {
        if value >= 1.0 {
            return invalid(format!("{name} must be below 1, got {value}"));
        }
    }
    if !config.risk_free_rate.is_finite() {
        return invalid("risk_free_rate must be finite".into());
    }
    Ok(())
}

pub fn validate_prices(prices: &PriceData) -> Result<(), ValidationError> {
    if prices.is_empty() || prices.values().all(Vec::is_empty) {
        return Err(ValidationError::EmptyPriceData);
    }
    for (symbol, bars) in prices {
        let mut last: Option<NaiveDate> = None;
        for bar in bars {
            if &bar.symbol != symbol {
                return Err(ValidationError::SymbolMismatch {
                    key: symbol.clone(),
                    found: bar.symbol.clone(),
                });
            }
            if last.is_some_and(|prev| bar.date <= prev) {
                return Err(ValidationError::NonMonotonicDates {
                    symbol: symbol.clone(),
                    date: bar.date,
                });
            }
            if let Some((field, value)) = bar.first_invalid_price() {
                return Err(ValidationError::InvalidPrice {
                    symbol: symbol.clone(),
                    date: bar.date,
                    field,
                    value,
                });
            }
            if !bar.is_sane() {
                return Err(ValidationError::InconsistentBar {
                    symbol: symbol.clone(),
                    date: bar.date,
                });
            }
            last = Some(bar.date);
        }
    }
    Ok(())
}

pub fn validate_signals(prices: &PriceData, signals: &SignalData) -> Result<(), ValidationError> {
    let index: BTreeSet<NaiveDate> = prices.values().flatten().map(|b| b.date).collect();

    for (symbol, series) in signals {
        if !prices.contains_key(symbol) {
            return Err(ValidationError::UnknownSignalSymbol(symbol.clone()));
        }
        let mut last: Option<NaiveDate> = None;
        for signal in series {
            if &signal.symbol != symbol {
                return Err(ValidationError::SymbolMismatch {
                    key: symbol.clone(),
                    found: signal.symbol.clone(),
                });
            }
            if last.is_some_and(|prev| signal.date <= prev) {
                return Err(ValidationError::NonMonotonicDates {
                    symbol: symbol.clone(),
                    date: signal.date,
                });
            }
            if !index.contains(&signal.date) {
                return Err(ValidationError::SignalDateNotInIndex {
                    symbol: symbol.clone(),
                    date: signal.date,
                });
            }
            if let Some(weight) = signal.weight.filter(|w| !(w.is_finite() && *w >= 0.0)) {
                return Err(ValidationError::InvalidWeight {
                    symbol: symbol.clone(),
                    date: signal.date,
                    weight,
                });
            }
            last = Some(signal.date);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bar, Signal};

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
            volume: 1_000,
        }
    }

    fn prices() -> PriceData {
        [("A".to_string(), vec![bar("A", 2, 10.0), bar("A", 3, 11.0)])]
            .into_iter()
            .collect()
    }

    fn ok_config() -> EngineConfig {
        EngineConfig::new(1_000_000.0)
    }

    #[test]
    fn accepts_clean_inputs() {
        let signals: SignalData = [("A".to_string(), vec![Signal::hold("A", d(2))])]
            .into_iter()
            .collect();
        assert_eq!(
            validate_inputs(&ok_config(), &prices(), &signals, &DateRange::default()),
            Ok(())
        );
    }

    #[test]
    fn rejects_non_positive_capital() {
        let config = EngineConfig::new(0.0);
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_participation_out_of_range() {
        let mut config = ok_config();
        config.execution.max_participation_rate = 1.5;
        assert!(validate_config(&config).is_err());
        config.execution.max_participation_rate = 0.0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_negative_rates() {
        let mut config = ok_config();
        config.execution.costs.commission_rate = -0.001;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("commission_rate"));
    }

    #[test]
    fn rejects_fee_rates_at_or_above_one() {
        let mut config = ok_config();
        config.execution.costs.sell_tax_rate = 2.0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("sell_tax_rate"));

        let mut config = ok_config();
        config.execution.costs.commission_rate = 1.0;
        assert!(validate_config(&config).is_err());

        config.execution.costs.commission_rate = 0.999;
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn rejects_empty_prices() {
        assert_eq!(validate_prices(&PriceData::new()), Err(ValidationError::EmptyPriceData));
    }

    #[test]
    fn rejects_duplicate_dates() {
        let data: PriceData = [("A".to_string(), vec![bar("A", 2, 10.0), bar("A", 2, 11.0)])]
            .into_iter()
            .collect();
        assert_eq!(
            validate_prices(&data),
            Err(ValidationError::NonMonotonicDates {
                symbol: "A".into(),
                date: d(2)
            })
        );
    }

    #[test]
    fn rejects_negative_price() {
        let data: PriceData = [("A".to_string(), vec![bar("A", 2, -1.0)])].into_iter().collect();
        assert!(matches!(
            validate_prices(&data),
            Err(ValidationError::InvalidPrice { .. })
        ));
    }

    #[test]
    fn rejects_high_below_close() {
        let mut broken = bar("A", 3, 11.0);
        broken.high = 10.5;
        let data: PriceData = [("A".to_string(), vec![bar("A", 2, 10.0), broken])]
            .into_iter()
            .collect();
        assert_eq!(
            validate_prices(&data),
            Err(ValidationError::InconsistentBar {
                symbol: "A".into(),
                date: d(3)
            })
        );
    }

    #[test]
    fn rejects_misfiled_bar() {
        let data: PriceData = [("A".to_string(), vec![bar("B", 2, 1.0)])].into_iter().collect();
        assert!(matches!(
            validate_prices(&data),
            Err(ValidationError::SymbolMismatch { .. })
        ));
    }

    #[test]
    fn rejects_signal_for_unpriced_symbol() {
        let signals: SignalData = [("Z".to_string(), vec![Signal::hold("Z", d(2))])]
            .into_iter()
            .collect();
        assert_eq!(
            validate_signals(&prices(), &signals),
            Err(ValidationError::UnknownSignalSymbol("Z".into()))
        );
    }

    #[test]
    fn rejects_signal_off_index() {
        let signals: SignalData = [("A".to_string(), vec![Signal::hold("A", d(9))])]
            .into_iter()
            .collect();
        assert!(matches!(
            validate_signals(&prices(), &signals),
            Err(ValidationError::SignalDateNotInIndex { .. })
        ));
    }

    #[test]
    fn rejects_negative_weight() {
        let signals: SignalData = [(
            "A".to_string(),
            vec![Signal::hold("A", d(2)).with_weight(-0.5)],
        )]
        .into_iter()
        .collect();
        assert!(matches!(
            validate_signals(&prices(), &signals),
            Err(ValidationError::InvalidWeight { .. })
        ));
    }

    #[test]
    fn rejects_inverted_range() {
        let err = validate_inputs(
            &ok_config(),
            &prices(),
            &SignalData::new(),
            &DateRange::between(d(5), d(2)),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidDateRange {
                start: d(5),
                end: d(2)
            }
        );
    }
}
