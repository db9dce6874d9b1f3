//! Transaction submission retry loop
//!
//! Submits signed transaction bytes until the chain returns a hash. The delay
//! grows linearly with the attempt number and the whole loop is bounded by a
//! wall-clock timeout measured from the first attempt.

use crate::errors::{OrchestratorError, OrchestratorResult};
use crate::metrics::metrics;
use crate::poll::{BoundedPoll, IntervalPolicy, PollBudget, Probe};
use crate::stage::{PipelineStage, StageContext};
use crate::timeline::EntryLines;
use tracing::info;

/// Submit `tx` and return the transaction hash
pub async fn submit_with_retry(ctx: &StageContext, tx: &str, lines: &EntryLines) -> OrchestratorResult<String> {
    ctx.enter(PipelineStage::Submitting);
    ctx.waiting(lines.sent.clone(), "Sending transaction");

    let poll = BoundedPoll::new(
        "submission",
        IntervalPolicy::Linear {
            step: ctx.polling.submission_backoff_step(),
        },
        PollBudget::WallClock(ctx.polling.submission_timeout()),
    );
    let log_every = ctx.polling.submission_error_log_every;

    let outcome = poll
        .run(|attempt| async move {
            metrics().submission_attempts.inc();
            let reason = match ctx.chain.submit_transaction(tx).await {
                Ok(reply) => match reply.hash {
                    Some(hash) => return Probe::Ready(hash),
                    None => reply.failure_reason(),
                },
                Err(err) => err.to_string(),
            };

            metrics().submission_retries.inc();
            ctx.logger
                .log_submission_failure(&ctx.group_id, attempt, &reason, log_every);
            ctx.waiting(
                lines.sent.clone(),
                format!("Sending transaction failed: {}. Retrying, attempt {}", reason, attempt),
            );
            Probe::Failed(reason)
        })
        .await;

    match outcome {
        Ok(hash) => {
            info!(group_id = %ctx.group_id, hash = %hash, "📤 Transaction accepted by the chain");
            Ok(hash)
        }
        Err(exhausted) => {
            let err = OrchestratorError::SubmissionTimeout {
                attempts: exhausted.attempts,
                elapsed_secs: exhausted.elapsed.as_secs(),
                reason: exhausted
                    .last_failure
                    .unwrap_or_else(|| "no attempt completed".to_string()),
            };
            ctx.error(lines.sent.clone(), err.user_message());
            Err(err)
        }
    }
}
