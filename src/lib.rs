//! Cost-guarded BigQuery query execution.
//!
//! Every query is first dry-run to estimate the bytes it would process,
//! checked against a byte ceiling, and only then executed with that ceiling
//! passed to BigQuery as the maximum bytes billed.

pub mod cli;
pub mod commands;
pub mod cost;
pub mod doctor;
pub mod error;
pub mod estimator;
pub mod gate;
pub mod report;
pub mod settings;
pub mod view;
pub mod warehouse;
pub mod workflow;

pub use cli::{Cli, Commands};
pub use cost::CostEstimate;
pub use error::{AppError, Result};
pub use gate::{GateDecision, GateMode, NonInteractivePolicy, Prompter, ThresholdGate};
pub use settings::Settings;
pub use warehouse::{BqCli, Outcome, WarehouseClient};
pub use workflow::{CostGuard, GuardedRun};
