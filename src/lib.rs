//! NFT transaction lifecycle orchestrator
//!
//! Drives marketplace actions (launch, mint, transfer, approve, sell, buy)
//! through build, sign, prove, submit and confirm, tracking progress as an
//! ordered timeline per action key.
//!
//! - **timeline**: groups of line items and pure state transitions
//! - **queue**: per-batch coalescing queue feeding the timeline
//! - **poll**: bounded polling primitive shared by every waiting loop
//! - **job**, **submission**, **inclusion**, **verification**: the polling stages
//! - **statistics**: batch outcome counts
//! - **orchestrator**: per-action state machine running concurrent pipelines

pub mod api;
pub mod config;
pub mod endpoints;
pub mod errors;
pub mod inclusion;
pub mod job;
pub mod metrics;
pub mod observability;
pub mod orchestrator;
pub mod params;
pub mod poll;
pub mod queue;
pub mod simulation;
pub mod stage;
pub mod state;
pub mod statistics;
pub mod structured_logging;
pub mod submission;
pub mod timeline;
pub mod verification;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use config::Config;
pub use errors::{OrchestratorError, OrchestratorResult};
pub use orchestrator::{ActionOrchestrator, BatchOutcome, BatchReport, OrchestratorEvent};
pub use params::{ActionKind, TxParams};
pub use state::{ActionKey, ActionStateStore, CancellationFlag};
pub use statistics::Statistics;
