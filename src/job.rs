//! Proof job poller
//!
//! After the prove request is accepted the remote service runs the proof as a
//! job. This module polls the job until it reaches a terminal status, then
//! fans out over the produced result entries: raw transaction bytes go
//! through the submission loop, hashes go straight to the inclusion poller.
//! Entries are confirmed concurrently and the job succeeds only when every
//! entry does.

use crate::api::{Confirmation, JobResult, JobResultEntry, JobStatus};
use crate::errors::{OrchestratorError, OrchestratorResult};
use crate::inclusion::wait_for_inclusion;
use crate::metrics::{metrics, Timer};
use crate::poll::{BoundedPoll, IntervalPolicy, PollBudget, Probe};
use crate::stage::{PipelineStage, StageContext};
use crate::submission::submit_with_retry;
use crate::timeline::{lines, EntryLines, GroupPatch};
use futures::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

/// Poll the proof job, then confirm every result entry
pub async fn wait_for_prove_job(ctx: &StageContext, job_id: &str) -> OrchestratorResult<Vec<Confirmation>> {
    ctx.enter(PipelineStage::Proving);
    let timer = Timer::new();

    let result = match poll_job(ctx, job_id).await {
        Ok(result) => result,
        Err(err) => {
            ctx.error(lines::TX_PROVED, err.user_message());
            return Err(err);
        }
    };
    timer.observe_duration(&metrics().job_wait);

    let entries = match validate_entries(job_id, result) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(group_id = %ctx.group_id, job_id, error = %err, "Proof job returned unusable results");
            ctx.error(lines::TX_PROVED, err.user_message());
            return Err(err);
        }
    };

    let total = entries.len();
    let entry_lines: Vec<EntryLines> = (0..total).map(|index| EntryLines::for_entry(index, total)).collect();

    // Every entry must be minted before the group counts as done
    let mut required = ctx
        .updates
        .timeline()
        .read()
        .group(&ctx.group_id)
        .map(|group| group.required_for_success.clone())
        .unwrap_or_default();
    required.extend(entry_lines.iter().map(|entry| entry.minted.clone()));
    ctx.patch_group(GroupPatch {
        required_for_success: Some(required),
        ..Default::default()
    });

    info!(group_id = %ctx.group_id, job_id, entries = total, "✅ Proof job finished");
    ctx.success(lines::TX_PROVED, "Transaction proved");

    let confirmations = join_all(
        entries
            .into_iter()
            .zip(entry_lines.iter())
            .map(|(entry, lines)| confirm_entry(ctx, entry, lines)),
    )
    .await;

    confirmations.into_iter().collect()
}

async fn poll_job(ctx: &StageContext, job_id: &str) -> OrchestratorResult<JobResult> {
    let poll = BoundedPoll::new(
        "proof-job",
        IntervalPolicy::Fixed(ctx.polling.job_interval()),
        PollBudget::WallClock(ctx.polling.job_budget()),
    )
    .sleep_first(true);

    // Last observed status; one timeline update per transition
    let last_status: Mutex<Option<JobStatus>> = Mutex::new(None);

    let outcome = poll
        .run(|attempt| {
            let last_status = &last_status;
            async move {
                metrics().job_polls.inc();
                let reply = match ctx.api.get_job_result(job_id).await {
                    Ok(reply) => reply,
                    Err(err) => {
                        debug!(group_id = %ctx.group_id, job_id, attempt, error = %err, "Job status request failed");
                        return Probe::Failed(err.to_string());
                    }
                };

                if !reply.success {
                    return Probe::Ready(Err(OrchestratorError::MalformedJobResult {
                        job_id: job_id.to_string(),
                        reason: "job result request was not successful".to_string(),
                    }));
                }
                let Some(result) = reply.results else {
                    return Probe::Ready(Err(OrchestratorError::MalformedJobResult {
                        job_id: job_id.to_string(),
                        reason: "job result is missing".to_string(),
                    }));
                };

                let status = result.job_status;
                let changed = last_status.lock().replace(status) != Some(status);
                if changed {
                    ctx.logger
                        .log_job_transition(&ctx.group_id, job_id, status.as_str(), attempt);
                    if !status.is_terminal() {
                        ctx.waiting(lines::TX_PROVED, format!("Proof job {} status: {}", job_id, status));
                    }
                }

                if status.is_terminal() {
                    Probe::Ready(Ok(result))
                } else {
                    Probe::Pending
                }
            }
        })
        .await;

    match outcome {
        Ok(Ok(result)) if result.job_status == JobStatus::Failed => Err(OrchestratorError::JobFailed {
            job_id: job_id.to_string(),
        }),
        Ok(result) => result,
        Err(exhausted) => Err(OrchestratorError::JobTimeout {
            job_id: job_id.to_string(),
            elapsed_secs: exhausted.elapsed.as_secs(),
        }),
    }
}

/// A finished job must carry at least one entry, each with tx bytes or a hash
fn validate_entries(job_id: &str, result: JobResult) -> OrchestratorResult<Vec<JobResultEntry>> {
    let entries = match result.results {
        Some(entries) if !entries.is_empty() => entries,
        _ => {
            return Err(OrchestratorError::MalformedJobResult {
                job_id: job_id.to_string(),
                reason: "no transactions in job result".to_string(),
            })
        }
    };

    if let Some(index) = entries
        .iter()
        .position(|entry| entry.tx.is_none() && entry.hash.is_none())
    {
        return Err(OrchestratorError::MalformedJobResult {
            job_id: job_id.to_string(),
            reason: format!("entry {} carries neither a transaction nor a hash", index),
        });
    }

    Ok(entries)
}

async fn confirm_entry(ctx: &StageContext, entry: JobResultEntry, lines: &EntryLines) -> OrchestratorResult<Confirmation> {
    let hash = match (entry.hash, entry.tx) {
        (Some(hash), _) => hash,
        (None, Some(tx)) => submit_with_retry(ctx, &tx, lines).await?,
        (None, None) => {
            return Err(OrchestratorError::Internal(
                "result entry without transaction or hash".to_string(),
            ))
        }
    };
    wait_for_inclusion(ctx, &hash, lines).await
}
