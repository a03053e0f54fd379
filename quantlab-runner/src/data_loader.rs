//! CSV loading of price and signal series.
//!
//! Prices: `symbol,date,open,high,low,close,volume`
//! Signals: `symbol,date,hold[,weight]`
//!
//! Rows may arrive in any order; each symbol's series is sorted by date.
//! Duplicate dates are left in place so the engine's input validation
//! reports them.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use quantlab_core::domain::{Bar, PriceData, Signal, SignalData};
use quantlab_core::fingerprint::{dataset_hash, DatasetHash};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::DataSection;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{source_name}: {source}")]
    Csv {
        source_name: String,
        #[source]
        source: csv::Error,
    },
    #[error("{source_name} line {line}: invalid hold flag '{value}'")]
    InvalidHold {
        source_name: String,
        line: u64,
        value: String,
    },
    #[error("{source_name}: no rows")]
    Empty { source_name: String },
}

/// Price and signal data for one run, with the hash that identifies it.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub prices: PriceData,
    pub signals: SignalData,
    pub dataset_hash: DatasetHash,
}

impl LoadedData {
    pub fn new(prices: PriceData, signals: SignalData) -> Self {
        let dataset_hash = dataset_hash(&prices, &signals);
        Self {
            prices,
            signals,
            dataset_hash,
        }
    }

    pub fn bar_count(&self) -> usize {
        self.prices.values().map(Vec::len).sum()
    }
}

#[derive(Debug, Deserialize)]
struct PriceRow {
    symbol: String,
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
}

#[derive(Debug, Deserialize)]
struct SignalRow {
    symbol: String,
    date: NaiveDate,
    hold: String,
    #[serde(default)]
    weight: Option<f64>,
}

/// Load both files named in a `[data]` section.
pub fn load_dataset(data: &DataSection) -> Result<LoadedData, LoadError> {
    let prices = load_prices(&data.prices)?;
    let signals = load_signals(&data.signals)?;
    let loaded = LoadedData::new(prices, signals);
    debug!(
        instruments = loaded.prices.len(),
        bars = loaded.bar_count(),
        dataset = loaded.dataset_hash.short(),
        "dataset loaded"
    );
    Ok(loaded)
}

pub fn load_prices(path: &Path) -> Result<PriceData, LoadError> {
    read_prices(open(path)?, &path.display().to_string())
}

pub fn load_signals(path: &Path) -> Result<SignalData, LoadError> {
    read_signals(open(path)?, &path.display().to_string())
}

fn open(path: &Path) -> Result<std::fs::File, LoadError> {
    std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse price rows from any reader. `source_name` only labels errors.
pub fn read_prices<R: Read>(reader: R, source_name: &str) -> Result<PriceData, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut prices = PriceData::new();
    for row in rdr.deserialize::<PriceRow>() {
        let row = row.map_err(|source| LoadError::Csv {
            source_name: source_name.to_string(),
            source,
        })?;
        prices.entry(row.symbol.clone()).or_default().push(Bar {
            symbol: row.symbol,
            date: row.date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    if prices.is_empty() {
        return Err(LoadError::Empty {
            source_name: source_name.to_string(),
        });
    }
    for series in prices.values_mut() {
        series.sort_by_key(|b| b.date);
    }
    Ok(prices)
}

/// Parse signal rows from any reader. The weight column is optional.
pub fn read_signals<R: Read>(reader: R, source_name: &str) -> Result<SignalData, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut signals = SignalData::new();
    for (i, row) in rdr.deserialize::<SignalRow>().enumerate() {
        let row = row.map_err(|source| LoadError::Csv {
            source_name: source_name.to_string(),
            source,
        })?;
        let hold = parse_hold(&row.hold).ok_or_else(|| LoadError::InvalidHold {
            source_name: source_name.to_string(),
            // header is line 1
            line: i as u64 + 2,
            value: row.hold.clone(),
        })?;
        signals.entry(row.symbol.clone()).or_default().push(Signal {
            symbol: row.symbol,
            date: row.date,
            hold,
            weight: row.weight,
        });
    }
    if signals.is_empty() {
        return Err(LoadError::Empty {
            source_name: source_name.to_string(),
        });
    }
    for series in signals.values_mut() {
        series.sort_by_key(|s| s.date);
    }
    Ok(signals)
}

fn parse_hold(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" => Some(true),
        "0" | "false" | "f" | "no" | "n" => Some(false),
        _ => None,
    }
}
