//! QuantLab Core — domain types and the event-driven backtesting engine.
//!
//! This crate contains the heart of the simulator:
//! - Domain types (bars, signals, orders, fills, positions, trades)
//! - Transaction cost model and liquidity-capped execution
//! - Long-only position tracking with average-cost accounting
//! - Rebalance-every-bar signal interpretation
//! - Bar-by-bar orchestrator, metrics, and run fingerprints

pub mod domain;
pub mod engine;
pub mod fingerprint;
