//! Inclusion poller
//!
//! Polls the chain for a transaction hash until its status is `applied`.
//! A reply that is not applied yet and carries an application-level error
//! slows the poller down by a fixed step; transport failures are treated as
//! "not yet".

use crate::api::Confirmation;
use crate::errors::{OrchestratorError, OrchestratorResult};
use crate::metrics::metrics;
use crate::poll::{BoundedPoll, IntervalPolicy, PollBudget, Probe};
use crate::stage::{PipelineStage, StageContext};
use crate::timeline::EntryLines;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

/// Wait until `hash` is applied on chain
pub async fn wait_for_inclusion(ctx: &StageContext, hash: &str, lines: &EntryLines) -> OrchestratorResult<Confirmation> {
    ctx.enter(PipelineStage::Confirming);
    ctx.success(lines.sent.clone(), format!("Transaction sent: {}", hash));
    ctx.waiting(
        lines.included.clone(),
        format!("Waiting for transaction {} to be included", hash),
    );

    let initial = ctx.polling.inclusion_initial_interval();
    let step = ctx.polling.inclusion_slowdown_step();
    let poll = BoundedPoll::new(
        "inclusion",
        IntervalPolicy::Adaptive { initial, step },
        PollBudget::WallClock(ctx.polling.inclusion_budget()),
    )
    .sleep_first(true);

    let slowdowns = AtomicU32::new(0);
    let outcome = poll
        .run(|attempt| {
            let slowdowns = &slowdowns;
            async move {
                metrics().inclusion_polls.inc();
                match ctx.chain.get_transaction_status(hash).await {
                    // An applied status wins over any error still attached to it
                    Ok(reply) if reply.is_applied() => Probe::Ready(attempt),
                    Ok(reply) => match reply.error {
                        Some(error) => {
                            let count = slowdowns.fetch_add(1, Ordering::Relaxed) + 1;
                            let next = initial.saturating_add(step.saturating_mul(count));
                            metrics().inclusion_slowdowns.inc();
                            ctx.logger.log_inclusion_error(
                                &ctx.group_id,
                                hash,
                                &error,
                                next.as_millis() as u64,
                            );
                            Probe::Failed(error)
                        }
                        None => Probe::Pending,
                    },
                    Err(err) => {
                        debug!(group_id = %ctx.group_id, hash, attempt, error = %err, "Status request failed");
                        Probe::Pending
                    }
                }
            }
        })
        .await;

    match outcome {
        Ok(polls) => {
            ctx.logger.log_included(&ctx.group_id, hash, polls);
            ctx.success(lines.sent.clone(), format!("Transaction sent: {}", hash));
            ctx.success(lines.included.clone(), format!("Transaction {} included", hash));
            ctx.success(lines.minted.clone(), format!("Transaction {} processed", hash));
            Ok(Confirmation {
                hash: hash.to_string(),
            })
        }
        Err(exhausted) => {
            let err = OrchestratorError::InclusionTimeout {
                hash: hash.to_string(),
                elapsed_secs: exhausted.elapsed.as_secs(),
            };
            ctx.error(lines.included.clone(), err.user_message());
            Err(err)
        }
    }
}
