//! Structured logging for pipeline events
//!
//! Every line carries the batch correlation id and the span id of the batch
//! or pipeline that wrote it.

use crate::observability::CorrelationId;
use crate::stage::PipelineStage;

/// Structured logger bound to one batch or pipeline trace
#[derive(Debug, Clone)]
pub struct PipelineLogger {
    correlation_id: CorrelationId,
    span_id: String,
}

impl PipelineLogger {
    pub fn new(correlation_id: CorrelationId, span_id: impl Into<String>) -> Self {
        Self {
            correlation_id,
            span_id: span_id.into(),
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    pub fn log_stage(&self, group_id: &str, stage: PipelineStage) {
        tracing::debug!(
            correlation_id = %self.correlation_id,
            span_id = %self.span_id,
            group_id = %group_id,
            stage = %stage,
            "Pipeline stage entered"
        );
    }

    pub fn log_job_transition(&self, group_id: &str, job_id: &str, status: &str, attempt: u32) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            span_id = %self.span_id,
            group_id = %group_id,
            job_id = %job_id,
            status = %status,
            attempt = attempt,
            "Proof job status changed"
        );
    }

    /// Every `log_every`-th failure escalates to error level
    pub fn log_submission_failure(&self, group_id: &str, attempt: u32, reason: &str, log_every: u32) {
        if log_every > 0 && attempt % log_every == 0 {
            tracing::error!(
                correlation_id = %self.correlation_id,
            span_id = %self.span_id,
                group_id = %group_id,
                attempt = attempt,
                reason = %reason,
                "Transaction submission keeps failing"
            );
        } else {
            tracing::warn!(
                correlation_id = %self.correlation_id,
            span_id = %self.span_id,
                group_id = %group_id,
                attempt = attempt,
                reason = %reason,
                "Transaction submission failed, retrying"
            );
        }
    }

    pub fn log_inclusion_error(&self, group_id: &str, hash: &str, error: &str, next_interval_ms: u64) {
        tracing::warn!(
            correlation_id = %self.correlation_id,
            span_id = %self.span_id,
            group_id = %group_id,
            hash = %hash,
            error = %error,
            next_interval_ms = next_interval_ms,
            "Transaction status reported an error, slowing down"
        );
    }

    pub fn log_included(&self, group_id: &str, hash: &str, polls: u32) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            span_id = %self.span_id,
            group_id = %group_id,
            hash = %hash,
            polls = polls,
            "Transaction included"
        );
    }

    pub fn log_batch_settled(&self, success: usize, error: usize, waiting: usize, elapsed_ms: u64) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            span_id = %self.span_id,
            success = success,
            error = error,
            waiting = waiting,
            elapsed_ms = elapsed_ms,
            "Batch settled"
        );
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(
            correlation_id = %self.correlation_id,
            span_id = %self.span_id,
            message = %message,
            "Warning"
        );
    }

    pub fn error(&self, message: &str) {
        tracing::error!(
            correlation_id = %self.correlation_id,
            span_id = %self.span_id,
            message = %message,
            "Error"
        );
    }
}
