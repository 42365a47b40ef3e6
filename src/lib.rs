//! Turns a sheet of per-symbol signals into dollar-notional market buys.

pub mod allocation;
pub mod broker;
pub mod config;
pub mod error;
pub mod order;
pub mod runner;
pub mod setup;
pub mod sheet;

pub use allocation::{evaluate, AllocationResult, RowRecord, SkipReason};
pub use error::{SetupError, SubmitError};
pub use order::{OrderIntent, OrderSink};
pub use runner::{run, RunSummary};
