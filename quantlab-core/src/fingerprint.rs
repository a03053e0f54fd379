//! Run fingerprinting — deterministic identification of configs, datasets and
//! results.
//!
//! - `ConfigHash`: BLAKE3 over the canonical JSON of an [`EngineConfig`].
//! - `DatasetHash`: BLAKE3 over every bar and signal, in map order.
//! - `ResultsDigest`: BLAKE3 over the raw bits of the equity curve and ledger.
//! - `RunId`: config + dataset, the identity of one reproducible run.
//!
//! Floats are hashed by their bit pattern, so two digests match only when the
//! runs are bit-identical.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{PriceData, SignalData};
use crate::engine::{BacktestResults, EngineConfig};

macro_rules! hex_hash {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            fn from_hasher(hasher: &blake3::Hasher) -> Self {
                Self(hasher.finalize().to_hex().to_string())
            }

            /// First 12 hex chars, for logs and file names.
            pub fn short(&self) -> &str {
                &self.0[..self.0.len().min(12)]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

hex_hash!(ConfigHash);
hex_hash!(DatasetHash);
hex_hash!(ResultsDigest);
hex_hash!(RunId);

/// Hash the canonical JSON of `config`.
///
/// Instrument metadata lives in a `BTreeMap`, so key order is stable.
pub fn config_hash(config: &EngineConfig) -> Result<ConfigHash, serde_json::Error> {
    let json = serde_json::to_vec(config)?;
    let mut hasher = blake3::Hasher::new();
    hasher.update(&json);
    Ok(ConfigHash::from_hasher(&hasher))
}

pub fn dataset_hash(prices: &PriceData, signals: &SignalData) -> DatasetHash {
    let mut hasher = blake3::Hasher::new();
    for (symbol, bars) in prices {
        hasher.update(b"P");
        hasher.update(symbol.as_bytes());
        for bar in bars {
            hasher.update(bar.date.to_string().as_bytes());
            for v in [bar.open, bar.high, bar.low, bar.close] {
                hasher.update(&v.to_bits().to_le_bytes());
            }
            hasher.update(&bar.volume.to_le_bytes());
        }
    }
    for (symbol, series) in signals {
        hasher.update(b"S");
        hasher.update(symbol.as_bytes());
        for signal in series {
            hasher.update(signal.date.to_string().as_bytes());
            hasher.update(&[signal.hold as u8]);
            let weight = signal.weight.map_or(u64::MAX, f64::to_bits);
            hasher.update(&weight.to_le_bytes());
        }
    }
    DatasetHash::from_hasher(&hasher)
}

pub fn results_digest(results: &BacktestResults) -> ResultsDigest {
    let mut hasher = blake3::Hasher::new();
    for point in &results.equity_curve {
        hasher.update(point.date.to_string().as_bytes());
        for v in [point.cash, point.holdings_value, point.total_equity] {
            hasher.update(&v.to_bits().to_le_bytes());
        }
    }
    for trade in &results.trades {
        hasher.update(trade.symbol.as_bytes());
        hasher.update(trade.entry_date.to_string().as_bytes());
        hasher.update(trade.exit_date.to_string().as_bytes());
        for v in [
            trade.entry_price,
            trade.exit_price,
            trade.quantity,
            trade.pnl,
            trade.commission,
            trade.tax,
        ] {
            hasher.update(&v.to_bits().to_le_bytes());
        }
    }
    ResultsDigest::from_hasher(&hasher)
}

pub fn run_id(config: &ConfigHash, dataset: &DatasetHash) -> RunId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(config.0.as_bytes());
    hasher.update(b":");
    hasher.update(dataset.0.as_bytes());
    RunId::from_hasher(&hasher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bar, Signal};
    use chrono::NaiveDate;

    fn prices(close: f64) -> PriceData {
        let bar = Bar {
            symbol: "A".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 100,
        };
        [("A".to_string(), vec![bar])].into_iter().collect()
    }

    #[test]
    fn config_hash_is_deterministic() {
        let a = config_hash(&EngineConfig::default()).unwrap();
        let b = config_hash(&EngineConfig::default()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.0.len(), 64);
    }

    #[test]
    fn config_hash_sees_parameter_changes() {
        let mut other = EngineConfig::default();
        other.interpreter.max_positions += 1;
        assert_ne!(
            config_hash(&EngineConfig::default()).unwrap(),
            config_hash(&other).unwrap()
        );
    }

    #[test]
    fn dataset_hash_tracks_prices_and_signals() {
        let empty = SignalData::new();
        assert_eq!(dataset_hash(&prices(10.0), &empty), dataset_hash(&prices(10.0), &empty));
        assert_ne!(dataset_hash(&prices(10.0), &empty), dataset_hash(&prices(10.5), &empty));

        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let signals: SignalData = [("A".to_string(), vec![Signal::hold("A", date)])]
            .into_iter()
            .collect();
        assert_ne!(dataset_hash(&prices(10.0), &empty), dataset_hash(&prices(10.0), &signals));
    }

    #[test]
    fn run_id_combines_both_hashes() {
        let c = config_hash(&EngineConfig::default()).unwrap();
        let d1 = dataset_hash(&prices(1.0), &SignalData::new());
        let d2 = dataset_hash(&prices(2.0), &SignalData::new());
        assert_ne!(run_id(&c, &d1), run_id(&c, &d2));
        assert_eq!(run_id(&c, &d1).short().len(), 12);
    }
}
