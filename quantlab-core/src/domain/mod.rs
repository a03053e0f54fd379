//! Domain types for QuantLab

pub mod bar;
pub mod equity;
pub mod fill;
pub mod order;
pub mod portfolio;
pub mod position;
pub mod signal;
pub mod trade;

pub use bar::Bar;
pub use equity::{equity_values, EquityPoint};
pub use fill::Fill;
pub use order::{Order, OrderReason, OrderSide};
pub use portfolio::PortfolioState;
pub use position::Position;
pub use signal::{Signal, SignalModel};
pub use trade::Trade;

use std::collections::BTreeMap;

/// Symbol type alias
pub type Symbol = String;

/// Price series per instrument: symbol → bars in strictly increasing date order.
pub type PriceData = BTreeMap<Symbol, Vec<Bar>>;

/// Signal series per instrument: symbol → signals in strictly increasing date order.
pub type SignalData = BTreeMap<Symbol, Vec<Signal>>;
