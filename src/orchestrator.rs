//! Action orchestrator
//!
//! Drives a batch of transactions submitted under one action key. Every
//! transaction runs as its own pipeline:
//!
//! ```text
//! verifying -> building -> awaiting-signature -> proving -> submitting -> confirming -> settled
//! ```
//!
//! Pipelines of a batch run concurrently and report progress through the
//! batch's [`UpdateQueue`] into the key's timeline. A failing pipeline raises
//! the batch error flag; its siblings check the flag before entering each
//! new stage and stop there, but calls already in flight are never
//! interrupted. While the pipelines run, the orchestrator recounts the batch
//! statistics at a fixed cadence. Once everything has settled it drains the
//! queue, writes the summary line and reports the outcome.
//!
//! A batch whose future is dropped before it settles takes its pipelines and
//! its queue down with it. The key is released only after that, so a later
//! batch on the same key never sees updates from an abandoned one.

use crate::api::{BuiltTransaction, ChainRpc, Confirmation, ContractRef, MarketplaceApi, ProveRequest, Wallet};
use crate::config::Config;
use crate::errors::{OrchestratorError, OrchestratorResult};
use crate::job::wait_for_prove_job;
use crate::metrics::{metrics, Timer};
use crate::observability::{BatchTrace, CorrelationId};
use crate::params::TxParams;
use crate::queue::UpdateQueue;
use crate::stage::{PipelineStage, StageContext};
use crate::state::{ActionKey, ActionStateStore, CancellationFlag};
use crate::statistics::Statistics;
use crate::timeline::{lines, GroupPatch, LineStatus, Timeline, TimelineGroup, TimelineItem};
use crate::verification::verify_contract_state;
use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use scopeguard::ScopeGuard;
use tokio::sync::{mpsc, Mutex};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Final outcome of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchOutcome {
    Success,
    Error,
}

impl BatchOutcome {
    pub fn status(&self) -> LineStatus {
        match self {
            BatchOutcome::Success => LineStatus::Success,
            BatchOutcome::Error => LineStatus::Error,
        }
    }
}

/// Progress notifications for observers of the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorEvent {
    BatchStarted {
        key: ActionKey,
        correlation_id: CorrelationId,
        transactions: usize,
    },
    StageEntered {
        key: ActionKey,
        group_id: String,
        stage: PipelineStage,
    },
    PipelineFailed {
        key: ActionKey,
        correlation_id: CorrelationId,
        group_id: String,
        error: OrchestratorError,
    },
    BatchSettled {
        key: ActionKey,
        correlation_id: CorrelationId,
        outcome: BatchOutcome,
        statistics: Statistics,
    },
    /// Celebratory side effect of a fully successful batch
    Celebrate { key: ActionKey },
}

/// Result of one pipeline, by group
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub group_id: String,
    pub result: OrchestratorResult<Vec<Confirmation>>,
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub key: ActionKey,
    pub correlation_id: CorrelationId,
    pub outcome: BatchOutcome,
    pub statistics: Statistics,
    pub pipelines: Vec<PipelineReport>,
    pub elapsed: Duration,
    /// Timeline as it stood when the batch settled
    pub timeline: Timeline,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.outcome == BatchOutcome::Success
    }

    pub fn confirmations(&self) -> impl Iterator<Item = &Confirmation> {
        self.pipelines
            .iter()
            .filter_map(|pipeline| pipeline.result.as_ref().ok())
            .flatten()
    }

    pub fn errors(&self) -> impl Iterator<Item = (&str, &OrchestratorError)> {
        self.pipelines.iter().filter_map(|pipeline| {
            pipeline
                .result
                .as_ref()
                .err()
                .map(|err| (pipeline.group_id.as_str(), err))
        })
    }
}

#[derive(Clone)]
struct EventSink(Option<mpsc::UnboundedSender<OrchestratorEvent>>);

impl EventSink {
    fn emit(&self, event: OrchestratorEvent) {
        if let Some(sender) = &self.0 {
            // Observers may go away at any time
            let _ = sender.send(event);
        }
    }
}

pub struct ActionOrchestrator {
    api: Arc<dyn MarketplaceApi>,
    chain: Arc<dyn ChainRpc>,
    wallet: Arc<dyn Wallet>,
    config: Arc<Config>,
    states: Arc<ActionStateStore>,
    events: EventSink,
    /// One wallet prompt at a time
    signing: Arc<Mutex<()>>,
}

impl ActionOrchestrator {
    pub fn new(
        api: Arc<dyn MarketplaceApi>,
        chain: Arc<dyn ChainRpc>,
        wallet: Arc<dyn Wallet>,
        config: Config,
    ) -> Self {
        Self {
            api,
            chain,
            wallet,
            config: Arc::new(config),
            states: Arc::new(ActionStateStore::new()),
            events: EventSink(None),
            signing: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_events(mut self, sender: mpsc::UnboundedSender<OrchestratorEvent>) -> Self {
        self.events = EventSink(Some(sender));
        self
    }

    pub fn with_state_store(mut self, states: Arc<ActionStateStore>) -> Self {
        self.states = states;
        self
    }

    pub fn states(&self) -> &Arc<ActionStateStore> {
        &self.states
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Submit a single transaction under `key`
    pub async fn submit(&self, key: ActionKey, params: TxParams) -> OrchestratorResult<BatchReport> {
        self.submit_batch(key, NonEmpty::new(params)).await
    }

    /// Run a batch of transactions under `key` until every pipeline settled
    ///
    /// Only failures that prevent the batch from starting are returned as
    /// `Err`; pipeline failures are part of the [`BatchReport`].
    pub async fn submit_batch(&self, key: ActionKey, batch: NonEmpty<TxParams>) -> OrchestratorResult<BatchReport> {
        let state = self.states.get_or_create(&key);
        if !state.try_begin() {
            warn!(key = %key, "Batch rejected, action already processing");
            return Err(OrchestratorError::AlreadyProcessing(key.to_string()));
        }
        let state = scopeguard::guard(state, |state| state.finish());

        let started = Instant::now();
        let flag = state.reset();
        let trace = BatchTrace::new(&key);
        let correlation_id = trace.correlation_id().clone();
        let logger = trace.logger();
        let expected = batch.len();

        metrics().active_batches.inc();
        let _active = scopeguard::guard((), |_| metrics().active_batches.dec());

        info!(
            key = %key,
            correlation_id = %correlation_id,
            span_id = %trace.span_id(),
            transactions = expected,
            "🚀 Starting transaction batch"
        );
        self.events.emit(OrchestratorEvent::BatchStarted {
            key: key.clone(),
            correlation_id: correlation_id.clone(),
            transactions: expected,
        });

        let timeline = state.timeline();
        let queue = UpdateQueue::new(Arc::clone(&timeline), &self.config.timeline);
        // Declared after `state`, so it runs first when the batch is dropped
        let mut tasks = scopeguard::guard(
            (key.clone(), queue.clone(), Vec::<AbortHandle>::with_capacity(expected)),
            |(key, queue, tasks)| {
                warn!(
                    key = %key,
                    pipelines = tasks.len(),
                    "Batch abandoned before settling, aborting its tasks"
                );
                for task in &tasks {
                    task.abort();
                }
                queue.abort();
            },
        );

        {
            let mut timeline = timeline.write();
            timeline.add_group(
                TimelineGroup::new(lines::BATCH_GROUP, format!("Processing {} transactions", expected))
                    .with_titles("All transactions succeeded", "Some transactions failed")
                    .with_required([lines::SUMMARY])
                    .pinned(),
            );
            timeline.update_item(
                lines::BATCH_GROUP,
                TimelineItem::waiting(lines::SUMMARY, format!("0 of {} transactions done", expected)),
            );
        }
        queue.start();

        let remaining = Arc::new(AtomicUsize::new(expected));
        let mut handles = Vec::with_capacity(expected);

        for (index, params) in batch.into_iter().enumerate() {
            let group_id = format!("{}-{}", params.kind(), index + 1);
            let mut required = vec![lines::TX_PREPARED, lines::TX_SIGNED, lines::TX_PROVED];
            if self.config.batch.verify_contract_state {
                required.push(lines::CONTRACT_VERIFIED);
            }
            let description = params.describe();
            let pipeline_trace = trace.pipeline(&group_id);
            timeline.write().add_group(
                TimelineGroup::new(group_id.clone(), description.clone())
                    .with_titles(format!("{} succeeded", description), format!("{} failed", description))
                    .with_required(required),
            );

            let pipeline = Pipeline {
                key: key.clone(),
                params,
                ctx: StageContext {
                    api: Arc::clone(&self.api),
                    chain: Arc::clone(&self.chain),
                    updates: queue.clone(),
                    polling: self.config.polling.clone(),
                    group_id: group_id.clone(),
                    logger: pipeline_trace.logger(),
                },
                wallet: Arc::clone(&self.wallet),
                signing: Arc::clone(&self.signing),
                flag: flag.clone(),
                events: self.events.clone(),
                chain_id: self.config.api.chain_id.clone(),
                verify_contract_state: self.config.batch.verify_contract_state,
            };

            let span = info_span!(
                "pipeline",
                group_id = %group_id,
                correlation_id = %correlation_id,
                span_id = %pipeline_trace.span_id,
            );
            let remaining = Arc::clone(&remaining);
            let handle = tokio::spawn(
                async move {
                    let result = pipeline.run().await;
                    remaining.fetch_sub(1, Ordering::SeqCst);
                    result
                }
                .instrument(span),
            );
            tasks.2.push(handle.abort_handle());
            handles.push((group_id, handle));
        }

        // Recount until every transaction succeeded, one failed, or nothing runs
        let settle_interval = self.config.polling.settle_poll_interval();
        loop {
            let stats = state.refresh_statistics(expected);
            if stats.all_done(expected) || flag.is_raised() || remaining.load(Ordering::SeqCst) == 0 {
                debug!(key = %key, %stats, "Settle loop finished");
                break;
            }
            tokio::time::sleep(settle_interval).await;
        }

        let mut pipelines = Vec::with_capacity(handles.len());
        for (group_id, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(err) => {
                    error!(group_id = %group_id, error = %err, "Pipeline task aborted");
                    Err(OrchestratorError::Internal(format!("pipeline task aborted: {}", err)))
                }
            };
            pipelines.push(PipelineReport { group_id, result });
        }

        // Everything queued must reach the timeline before the batch is settled
        queue.stop().await;
        // Every task has ended; nothing left to abort
        let _ = ScopeGuard::into_inner(tasks);

        {
            let mut timeline = timeline.write();
            for pipeline in &pipelines {
                let status = match pipeline.result {
                    Ok(_) => LineStatus::Success,
                    Err(_) => LineStatus::Error,
                };
                timeline.update_group(&pipeline.group_id, GroupPatch::status(status));
            }
        }
        let statistics = state.refresh_statistics(expected);

        let outcome = if statistics.all_done(expected) {
            BatchOutcome::Success
        } else {
            BatchOutcome::Error
        };
        let summary_status = outcome.status();
        {
            let mut timeline = timeline.write();
            timeline.update_item(
                lines::BATCH_GROUP,
                TimelineItem::new(lines::SUMMARY, statistics.to_string(), summary_status),
            );
            timeline.update_group(lines::BATCH_GROUP, GroupPatch::status(summary_status));
        }

        let elapsed = started.elapsed();
        logger.log_batch_settled(
            statistics.success,
            statistics.error,
            statistics.waiting,
            elapsed.as_millis() as u64,
        );
        self.events.emit(OrchestratorEvent::BatchSettled {
            key: key.clone(),
            correlation_id: correlation_id.clone(),
            outcome,
            statistics,
        });

        if outcome == BatchOutcome::Success && self.config.batch.celebrate {
            info!(key = %key, transactions = expected, "🎉 All transactions confirmed");
            self.events.emit(OrchestratorEvent::Celebrate { key: key.clone() });
        }

        Ok(BatchReport {
            key,
            correlation_id,
            outcome,
            statistics,
            pipelines,
            elapsed,
            timeline: state.snapshot(),
        })
    }
}

/// One transaction's path through the stages
struct Pipeline {
    key: ActionKey,
    params: TxParams,
    ctx: StageContext,
    wallet: Arc<dyn Wallet>,
    signing: Arc<Mutex<()>>,
    flag: CancellationFlag,
    events: EventSink,
    chain_id: String,
    verify_contract_state: bool,
}

impl Pipeline {
    async fn run(self) -> OrchestratorResult<Vec<Confirmation>> {
        let timer = Timer::new();
        metrics().pipelines_started.inc();

        let result = self.drive().await;
        timer.observe_duration(&metrics().pipeline_latency);

        match &result {
            Ok(confirmations) => {
                metrics().pipelines_succeeded.inc();
                info!(
                    group_id = %self.ctx.group_id,
                    confirmations = confirmations.len(),
                    "✅ Transaction pipeline succeeded"
                );
                self.emit_stage(PipelineStage::Settled);
            }
            Err(err) if err.is_cancellation() => {
                metrics().pipelines_cancelled.inc();
                info!(group_id = %self.ctx.group_id, error = %err, "Transaction pipeline cancelled");
                self.ctx.error(
                    lines::CANCELLED,
                    format!("{}: another transaction in this batch failed", err),
                );
            }
            Err(err) => {
                metrics().pipelines_failed.inc();
                self.flag.raise();
                error!(group_id = %self.ctx.group_id, error = %err, "❌ Transaction pipeline failed");
                self.events.emit(OrchestratorEvent::PipelineFailed {
                    key: self.key.clone(),
                    correlation_id: self.ctx.logger.correlation_id().clone(),
                    group_id: self.ctx.group_id.clone(),
                    error: err.clone(),
                });
            }
        }
        result
    }

    fn emit_stage(&self, stage: PipelineStage) {
        self.events.emit(OrchestratorEvent::StageEntered {
            key: self.key.clone(),
            group_id: self.ctx.group_id.clone(),
            stage,
        });
    }

    /// Stage boundary: never start a new stage once the batch has an error
    fn checkpoint(&self, stage: PipelineStage) -> OrchestratorResult<()> {
        if self.flag.is_raised() {
            return Err(OrchestratorError::Cancelled { stage });
        }
        self.ctx.enter(stage);
        self.emit_stage(stage);
        Ok(())
    }

    /// Report `err` on `line` and hand it back
    fn fail(&self, line: &str, err: OrchestratorError) -> OrchestratorError {
        self.ctx.error(line.to_string(), err.user_message());
        err
    }

    async fn drive(&self) -> OrchestratorResult<Vec<Confirmation>> {
        self.checkpoint(PipelineStage::Verifying)?;
        self.verify().await?;

        self.checkpoint(PipelineStage::Building)?;
        self.ctx.waiting(lines::TX_PREPARED, "Preparing transaction");
        let reply = self
            .ctx
            .api
            .build_transaction(&self.params)
            .await
            .map_err(|err| self.fail(lines::TX_PREPARED, err))?;
        let built = match reply.tx {
            Some(tx) if reply.success => tx,
            _ => return Err(self.fail(lines::TX_PREPARED, OrchestratorError::Build(reply.error))),
        };
        self.ctx
            .success(lines::TX_PREPARED, format!("Transaction prepared: {}", built.name));

        self.checkpoint(PipelineStage::AwaitingSignature)?;
        self.ctx
            .waiting(lines::TX_SIGNED, "Please sign the transaction in your wallet");
        let signed = {
            let _prompt = self.signing.lock().await;
            self.wallet.sign_payload(&built.payload).await
        };
        let Some(signed_data) = signed else {
            self.ctx.error(lines::TX_SIGNED, "Transaction was not signed");
            return Err(self.fail(lines::NO_USER_SIGNATURE, OrchestratorError::UserDeclined));
        };
        self.ctx.success(lines::TX_SIGNED, "Transaction signed");

        self.checkpoint(PipelineStage::Proving)?;
        self.ctx.waiting(lines::TX_PROVED, "Sending transaction for proving");
        let contract = self.contract_for(&built);
        let reply = self
            .ctx
            .api
            .prove_transaction(ProveRequest {
                tx: built,
                signed_data,
            })
            .await
            .map_err(|err| self.fail(lines::TX_PROVED, err))?;
        let job_id = match reply.job_id {
            Some(job_id) if reply.success => job_id,
            _ => return Err(self.fail(lines::TX_PROVED, OrchestratorError::Prove(reply.error))),
        };
        info!(group_id = %self.ctx.group_id, job_id = %job_id, "Proof job started");
        self.ctx
            .waiting(lines::TX_PROVED, format!("Proof job {} started", job_id));

        let confirmations = wait_for_prove_job(&self.ctx, &job_id).await?;

        if self.verify_contract_state {
            match contract {
                Some(contract) if !self.flag.is_raised() => {
                    verify_contract_state(&self.ctx, &contract).await?;
                }
                Some(_) => debug!(group_id = %self.ctx.group_id, "Skipping contract verification after batch error"),
                None => warn!(group_id = %self.ctx.group_id, "No contract address to verify"),
            }
        }

        Ok(confirmations)
    }

    /// Required fields, wallet presence, network and account
    async fn verify(&self) -> OrchestratorResult<()> {
        self.params
            .validate()
            .map_err(|err| self.fail(lines::REQUIRED_FIELDS, err))?;

        let Some(connection) = self.wallet.connection().await else {
            return Err(self.fail(
                lines::NO_AURO_WALLET,
                OrchestratorError::WalletUnavailable("no wallet connected".to_string()),
            ));
        };
        if connection.chain_id != self.chain_id {
            return Err(self.fail(
                lines::NO_AURO_WALLET,
                OrchestratorError::WalletUnavailable(format!(
                    "wallet is connected to {}, expected {}",
                    connection.chain_id, self.chain_id
                )),
            ));
        }
        if connection.address != self.params.sender() {
            return Err(self.fail(
                lines::NO_AURO_WALLET,
                OrchestratorError::WalletUnavailable(format!(
                    "wallet account {} does not match sender {}",
                    connection.address,
                    self.params.sender()
                )),
            ));
        }
        Ok(())
    }

    /// Addresses known upfront win over the ones assigned by the build step
    fn contract_for(&self, built: &BuiltTransaction) -> Option<ContractRef> {
        let collection = self
            .params
            .collection_address()
            .map(str::to_string)
            .or_else(|| built.collection_address.clone())?;
        let nft = self
            .params
            .nft_address()
            .map(str::to_string)
            .or_else(|| built.nft_address.clone());
        Some(ContractRef { collection, nft })
    }
}
