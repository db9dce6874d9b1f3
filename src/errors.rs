//! Error types for the transaction orchestrator
//!
//! Every failure a pipeline can hit maps to exactly one variant. Each variant
//! knows which timeline line it surfaces on and how to render itself for the
//! user: the raw message from the remote service when one was returned,
//! otherwise a numbered fallback code.

use crate::stage::PipelineStage;
use crate::timeline::lines;
use thiserror::Error;

pub const BUILD_FALLBACK: &str = "E101";
pub const PROVE_FALLBACK: &str = "E102";
pub const JOB_FALLBACK: &str = "E103";
pub const SUBMISSION_FALLBACK: &str = "E104";
pub const INCLUSION_FALLBACK: &str = "E105";
pub const VERIFICATION_FALLBACK: &str = "E106";
pub const INTERNAL_FALLBACK: &str = "E199";

/// Comprehensive error type for orchestrator operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    /// A required action field is missing or out of range
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// No wallet, wrong network, or wrong account
    #[error("Wallet unavailable: {0}")]
    WalletUnavailable(String),

    /// The wallet returned no signed data
    #[error("User declined to sign the transaction")]
    UserDeclined,

    /// A batch is already in flight for this action key
    #[error("Action already processing: {0}")]
    AlreadyProcessing(String),

    /// The build endpoint rejected the request
    #[error("Build failed: {}", .0.as_deref().unwrap_or(BUILD_FALLBACK))]
    Build(Option<String>),

    /// The prove endpoint rejected the request
    #[error("Prove request failed: {}", .0.as_deref().unwrap_or(PROVE_FALLBACK))]
    Prove(Option<String>),

    #[error("Proof job {job_id} failed")]
    JobFailed { job_id: String },

    #[error("Malformed result for job {job_id}: {reason}")]
    MalformedJobResult { job_id: String, reason: String },

    #[error("Proof job {job_id} did not finish within {elapsed_secs}s")]
    JobTimeout { job_id: String, elapsed_secs: u64 },

    #[error("Transaction not accepted after {attempts} attempts in {elapsed_secs}s: {reason}")]
    SubmissionTimeout {
        attempts: u32,
        elapsed_secs: u64,
        reason: String,
    },

    #[error("Transaction {hash} not applied within {elapsed_secs}s")]
    InclusionTimeout { hash: String, elapsed_secs: u64 },

    #[error("Contract state not confirmed after {attempts} attempts")]
    VerificationExhausted { attempts: u32 },

    /// The batch error flag was raised before this stage could start
    #[error("Cancelled before {stage}")]
    Cancelled { stage: PipelineStage },

    /// Network stack failure or undecodable response
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    /// Transient errors are retried by the polling loops
    pub fn is_transient(&self) -> bool {
        matches!(self, OrchestratorError::Transport(_))
    }

    /// Cancellation is a consequence of another failure, not a failure itself
    pub fn is_cancellation(&self) -> bool {
        matches!(self, OrchestratorError::Cancelled { .. })
    }

    /// Timeline line this error is reported on
    pub fn line_id(&self) -> &'static str {
        match self {
            OrchestratorError::InvalidParams(_) => lines::REQUIRED_FIELDS,
            OrchestratorError::WalletUnavailable(_) => lines::NO_AURO_WALLET,
            OrchestratorError::UserDeclined => lines::NO_USER_SIGNATURE,
            OrchestratorError::Build(_) => lines::TX_PREPARED,
            OrchestratorError::Prove(_)
            | OrchestratorError::JobFailed { .. }
            | OrchestratorError::MalformedJobResult { .. }
            | OrchestratorError::JobTimeout { .. } => lines::TX_PROVED,
            OrchestratorError::SubmissionTimeout { .. } => lines::TX_SENT,
            OrchestratorError::InclusionTimeout { .. } => lines::TX_INCLUDED,
            OrchestratorError::VerificationExhausted { .. } => lines::CONTRACT_VERIFIED,
            OrchestratorError::Cancelled { .. } => lines::CANCELLED,
            OrchestratorError::AlreadyProcessing(_)
            | OrchestratorError::Transport(_)
            | OrchestratorError::Configuration(_)
            | OrchestratorError::Internal(_) => lines::ERROR,
        }
    }

    /// Human-readable message for the timeline
    pub fn user_message(&self) -> String {
        match self {
            OrchestratorError::Build(Some(message)) | OrchestratorError::Prove(Some(message)) => {
                message.clone()
            }
            OrchestratorError::Build(None) => {
                format!("Error {}: the transaction could not be prepared", BUILD_FALLBACK)
            }
            OrchestratorError::Prove(None) => {
                format!("Error {}: the transaction could not be sent for proving", PROVE_FALLBACK)
            }
            OrchestratorError::JobFailed { .. }
            | OrchestratorError::MalformedJobResult { .. }
            | OrchestratorError::JobTimeout { .. } => format!("Error {}: {}", JOB_FALLBACK, self),
            OrchestratorError::SubmissionTimeout { .. } => {
                format!("Error {}: {}", SUBMISSION_FALLBACK, self)
            }
            OrchestratorError::InclusionTimeout { .. } => {
                format!("Error {}: {}", INCLUSION_FALLBACK, self)
            }
            OrchestratorError::VerificationExhausted { .. } => {
                format!("Error {}: {}", VERIFICATION_FALLBACK, self)
            }
            OrchestratorError::Transport(_)
            | OrchestratorError::Configuration(_)
            | OrchestratorError::Internal(_) => format!("Error {}: {}", INTERNAL_FALLBACK, self),
            _ => self.to_string(),
        }
    }
}

impl From<reqwest::Error> for OrchestratorError {
    fn from(err: reqwest::Error) -> Self {
        OrchestratorError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(err: serde_json::Error) -> Self {
        OrchestratorError::Transport(format!("invalid response payload: {}", err))
    }
}

/// Result type alias for orchestrator operations
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
