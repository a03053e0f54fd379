//! Backtesting engine — bar-by-bar event loop and supporting components.
//!
//! Leaf to root:
//!
//! - [`cost_model`]: commission, tax, market impact and spread
//! - [`execution`]: orders → fills against one bar, under a participation cap
//! - [`position_tracker`]: cash, positions, mark-to-market, equity curve
//! - [`signal_interpreter`]: hold flags → rebalance orders
//! - [`trade_logger`]: closed round trips and their statistics
//! - [`backtest`]: the orchestrating event loop

pub mod backtest;
pub mod cost_model;
pub mod diagnostics;
pub mod execution;
pub mod liquidity;
pub mod metrics;
pub mod position_tracker;
pub mod signal_interpreter;
pub mod state;
pub mod trade_logger;
pub mod validation;

pub use backtest::{BacktestEngine, BacktestError};
pub use cost_model::{CostBreakdown, CostModelConfig, MarketContext, TransactionCostModel};
pub use diagnostics::{RunDiagnostics, SimulationWarning};
pub use execution::{BarExecution, ExecutionConfig, OrderExecutionEngine};
pub use liquidity::LiquidityPolicy;
pub use metrics::PerformanceMetrics;
pub use position_tracker::{ClosedPosition, Fees, FillOutcome, PositionTracker, TrackerError};
pub use signal_interpreter::{
    Allocation, AllocationPolicy, EqualWeight, InterpreterConfig, Interpretation,
    SignalInterpreter, SignalWeighted,
};
pub use state::{
    AccountingSummary, BacktestResults, DateRange, EngineConfig, EngineStatus, InstrumentMeta,
};
pub use trade_logger::{TradeLogger, TradeStats};
pub use validation::{validate_inputs, ValidationError};
