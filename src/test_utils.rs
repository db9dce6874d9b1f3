//! Test Utilities Module
//!
//! Scripted in-memory implementations of the marketplace API, the chain RPC
//! and the wallet, plus a journal recording every call with its (tokio) time
//! so tests can assert on call counts and spacing under a paused clock.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use crate::api::{
    BuildReply, BuiltTransaction, ChainRpc, ContractRef, ContractStateReply, JobResultEntry,
    JobResultReply, JobStatus, MarketplaceApi, ProveReply, ProveRequest, SignedData, SubmitReply,
    TxStatusReply, UnsignedPayload, Wallet, WalletConnection,
};
use crate::config::PollingConfig;
use crate::errors::OrchestratorResult;
use crate::observability::PipelineTrace;
use crate::params::TxParams;
use crate::queue::UpdateQueue;
use crate::stage::StageContext;
use crate::timeline::{SharedTimeline, Timeline, TimelineGroup};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub const TEST_SENDER: &str = "B62qtestsender";
pub const TEST_CHAIN: &str = "devnet";
pub const TEST_GROUP: &str = "mint-1";

/// Every external call made during a test, in order
#[derive(Debug, Default)]
pub struct CallJournal {
    calls: Mutex<Vec<(Instant, String)>>,
}

impl CallJournal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, call: impl Into<String>) {
        self.calls.lock().push((Instant::now(), call.into()));
    }

    pub fn names(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(_, name)| name.clone()).collect()
    }

    /// Number of calls whose name starts with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|(_, name)| name.starts_with(prefix))
            .count()
    }

    /// Times of the calls whose name starts with `prefix`
    pub fn times(&self, prefix: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .iter()
            .filter(|(_, name)| name.starts_with(prefix))
            .map(|(at, _)| *at)
            .collect()
    }

    /// Gaps between consecutive calls matching `prefix`
    pub fn gaps(&self, prefix: &str) -> Vec<Duration> {
        self.times(prefix)
            .windows(2)
            .map(|pair| pair[1].duration_since(pair[0]))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Replies served in order, then `fallback` forever
#[derive(Debug)]
pub struct Script<T: Clone> {
    queued: Mutex<VecDeque<T>>,
    fallback: Mutex<T>,
}

impl<T: Clone> Script<T> {
    pub fn new(fallback: T) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
        }
    }

    pub fn push(&self, reply: T) {
        self.queued.lock().push_back(reply);
    }

    pub fn push_n(&self, reply: T, n: usize) {
        let mut queued = self.queued.lock();
        for _ in 0..n {
            queued.push_back(reply.clone());
        }
    }

    pub fn set_fallback(&self, reply: T) {
        *self.fallback.lock() = reply;
    }

    pub fn next(&self) -> T {
        self.queued
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.lock().clone())
    }
}

pub fn sample_built(name: &str) -> BuiltTransaction {
    BuiltTransaction {
        payload: UnsignedPayload {
            transaction: format!("unsigned:{}", name),
            fee: Some(100_000_000),
            memo: None,
        },
        name: name.to_string(),
        collection_address: Some("B62qcollection".to_string()),
        nft_address: Some(format!("B62qnft-{}", name)),
    }
}

pub fn mint_params(name: &str) -> TxParams {
    TxParams::Mint {
        sender: TEST_SENDER.to_string(),
        collection_address: "B62qcollection".to_string(),
        nft_name: name.to_string(),
        nft_address: None,
        price: None,
    }
}

/// Scripted marketplace service
#[derive(Debug)]
pub struct ScriptedApi {
    pub journal: Arc<CallJournal>,
    pub build: Script<OrchestratorResult<BuildReply>>,
    pub prove: Script<OrchestratorResult<ProveReply>>,
    pub jobs: Script<OrchestratorResult<JobResultReply>>,
    pub contract_state: Script<OrchestratorResult<ContractStateReply>>,
    /// Jobs that report `failed` regardless of the script
    pub failing_jobs: Mutex<HashSet<String>>,
    /// Latency of every call
    pub latency: Mutex<Duration>,
}

impl ScriptedApi {
    /// Builds, proves and finishes every job with a single hash entry
    pub fn new(journal: Arc<CallJournal>) -> Self {
        Self {
            journal,
            build: Script::new(Ok(BuildReply::ok(sample_built("nft")))),
            prove: Script::new(Ok(ProveReply::ok("job-1"))),
            jobs: Script::new(Ok(JobResultReply::finished(vec![JobResultEntry::with_hash(
                "hash-1",
            )]))),
            contract_state: Script::new(Ok(ContractStateReply { success: true })),
            failing_jobs: Mutex::new(HashSet::new()),
            latency: Mutex::new(Duration::ZERO),
        }
    }

    pub fn fail_job(&self, job_id: &str) {
        self.failing_jobs.lock().insert(job_id.to_string());
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock() = latency;
        self
    }

    async fn delay(&self) {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl MarketplaceApi for ScriptedApi {
    async fn build_transaction(&self, params: &TxParams) -> OrchestratorResult<BuildReply> {
        self.journal.record(format!("build:{}", params.kind()));
        self.delay().await;
        self.build.next()
    }

    async fn prove_transaction(&self, _request: ProveRequest) -> OrchestratorResult<ProveReply> {
        self.journal.record("prove");
        self.delay().await;
        self.prove.next()
    }

    async fn get_job_result(&self, job_id: &str) -> OrchestratorResult<JobResultReply> {
        self.journal.record(format!("job:{}", job_id));
        self.delay().await;
        if self.failing_jobs.lock().contains(job_id) {
            return Ok(JobResultReply::status(JobStatus::Failed));
        }
        self.jobs.next()
    }

    async fn get_contract_state(&self, contract: &ContractRef) -> OrchestratorResult<ContractStateReply> {
        self.journal.record(format!("contract:{}", contract.collection));
        self.delay().await;
        self.contract_state.next()
    }
}

/// Scripted chain RPC
#[derive(Debug)]
pub struct ScriptedChain {
    pub journal: Arc<CallJournal>,
    pub submit: Script<OrchestratorResult<SubmitReply>>,
    pub status: Script<OrchestratorResult<TxStatusReply>>,
}

impl ScriptedChain {
    /// Accepts every submission and reports every hash as applied
    pub fn new(journal: Arc<CallJournal>) -> Self {
        Self {
            journal,
            submit: Script::new(Ok(SubmitReply::accepted("hash-submitted"))),
            status: Script::new(Ok(TxStatusReply::applied())),
        }
    }
}

#[async_trait]
impl ChainRpc for ScriptedChain {
    async fn submit_transaction(&self, _tx: &str) -> OrchestratorResult<SubmitReply> {
        self.journal.record("submit");
        self.submit.next()
    }

    async fn get_transaction_status(&self, hash: &str) -> OrchestratorResult<TxStatusReply> {
        self.journal.record(format!("status:{}", hash));
        self.status.next()
    }
}

/// Scripted wallet
#[derive(Debug)]
pub struct ScriptedWallet {
    pub journal: Arc<CallJournal>,
    pub connection: Mutex<Option<WalletConnection>>,
    /// `None` declines every signature request
    pub signature: Mutex<Option<SignedData>>,
    pub sign_delay: Mutex<Duration>,
}

impl ScriptedWallet {
    /// Connected to the test chain as the test sender, signs everything
    pub fn new(journal: Arc<CallJournal>) -> Self {
        Self {
            journal,
            connection: Mutex::new(Some(WalletConnection {
                address: TEST_SENDER.to_string(),
                chain_id: TEST_CHAIN.to_string(),
            })),
            signature: Mutex::new(Some(SignedData("signed".to_string()))),
            sign_delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn disconnected(self) -> Self {
        *self.connection.lock() = None;
        self
    }

    pub fn declining(self) -> Self {
        *self.signature.lock() = None;
        self
    }
}

#[async_trait]
impl Wallet for ScriptedWallet {
    async fn connection(&self) -> Option<WalletConnection> {
        self.journal.record("connection");
        self.connection.lock().clone()
    }

    async fn sign_payload(&self, _payload: &UnsignedPayload) -> Option<SignedData> {
        self.journal.record("sign");
        let delay = *self.sign_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.signature.lock().clone()
    }
}

/// Timeline holding one empty group with id [`TEST_GROUP`]
pub fn timeline_with_group() -> SharedTimeline {
    let mut timeline = Timeline::new();
    timeline.add_group(TimelineGroup::new(TEST_GROUP, "Mint NFT"));
    Arc::new(RwLock::new(timeline))
}

/// Stage context over a fresh timeline; the queue is not started, so
/// `ctx.updates.stop().await` flushes every reported line
pub fn stage_context(
    api: Arc<dyn MarketplaceApi>,
    chain: Arc<dyn ChainRpc>,
    polling: PollingConfig,
) -> (StageContext, SharedTimeline) {
    let timeline = timeline_with_group();
    let updates = UpdateQueue::with_settings(
        Arc::clone(&timeline),
        Duration::from_millis(1_000),
        crate::timeline::lines::DEFAULT_IMMEDIATE,
    );
    let ctx = StageContext {
        api,
        chain,
        updates,
        polling,
        group_id: TEST_GROUP.to_string(),
        logger: PipelineTrace::detached(TEST_GROUP).logger(),
    };
    (ctx, timeline)
}
