//! In-memory backend for demos and soak runs
//!
//! Plays the remote service, the chain and the wallet at once. Proof jobs
//! finish after a configurable number of polls, transactions are applied
//! after a configurable number of status checks, and submissions fail at
//! random with a configurable rate.

use crate::api::{
    BuildReply, BuiltTransaction, ChainRpc, ContractRef, ContractStateReply, JobResultEntry,
    JobResultReply, JobStatus, MarketplaceApi, ProveReply, ProveRequest, SignedData, SubmitReply,
    TxStatusReply, UnsignedPayload, Wallet, WalletConnection,
};
use crate::errors::OrchestratorResult;
use crate::params::TxParams;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SimulationProfile {
    /// Latency added to every call
    pub latency: Duration,
    /// Status polls a proof job stays `unknown`
    pub job_polls: u32,
    /// Status polls before a transaction is `applied`
    pub inclusion_polls: u32,
    /// Probability that a submission is rejected
    pub submit_failure_rate: f64,
    /// Let the service submit transactions itself and return hashes
    pub service_submits: bool,
    pub address: String,
    pub chain_id: String,
}

impl Default for SimulationProfile {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(50),
            job_polls: 2,
            inclusion_polls: 2,
            submit_failure_rate: 0.2,
            service_submits: false,
            address: "B62qsimulatedsender".to_string(),
            chain_id: "devnet".to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SimulatedBackend {
    profile: SimulationProfile,
    next_id: AtomicU64,
    /// job id -> polls still to answer `unknown`
    jobs: DashMap<String, u32>,
    /// hash -> polls still to answer `pending`
    transactions: DashMap<String, u32>,
}

impl SimulatedBackend {
    pub fn new(profile: SimulationProfile) -> Self {
        Self {
            profile,
            next_id: AtomicU64::new(1),
            jobs: DashMap::new(),
            transactions: DashMap::new(),
        }
    }

    pub fn profile(&self) -> &SimulationProfile {
        &self.profile
    }

    fn next_id(&self, prefix: &str) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("{}{:04}{:08x}", prefix, id, fastrand::u32(..))
    }

    async fn delay(&self) {
        if !self.profile.latency.is_zero() {
            sleep(self.profile.latency).await;
        }
    }

    fn track(&self, hash: &str) {
        self.transactions
            .insert(hash.to_string(), self.profile.inclusion_polls);
    }
}

#[async_trait]
impl MarketplaceApi for SimulatedBackend {
    async fn build_transaction(&self, params: &TxParams) -> OrchestratorResult<BuildReply> {
        self.delay().await;
        let collection_address = params
            .collection_address()
            .map(str::to_string)
            .or_else(|| Some(self.next_id("B62qcollection")));
        let nft_address = params
            .nft_address()
            .map(str::to_string)
            .or_else(|| match params {
                TxParams::Mint { .. } => Some(self.next_id("B62qnft")),
                _ => None,
            });

        Ok(BuildReply::ok(BuiltTransaction {
            payload: UnsignedPayload {
                transaction: serde_json::to_string(params)?,
                fee: Some(100_000_000),
                memo: Some(params.kind().to_string()),
            },
            name: params.describe(),
            collection_address,
            nft_address,
        }))
    }

    async fn prove_transaction(&self, _request: ProveRequest) -> OrchestratorResult<ProveReply> {
        self.delay().await;
        let job_id = self.next_id("job");
        self.jobs.insert(job_id.clone(), self.profile.job_polls);
        debug!(job_id = %job_id, "Simulated proof job created");
        Ok(ProveReply::ok(job_id))
    }

    async fn get_job_result(&self, job_id: &str) -> OrchestratorResult<JobResultReply> {
        self.delay().await;
        let Some(mut remaining) = self.jobs.get_mut(job_id) else {
            return Ok(JobResultReply::status(JobStatus::Failed));
        };
        if *remaining > 0 {
            *remaining -= 1;
            return Ok(JobResultReply::status(JobStatus::Unknown));
        }
        drop(remaining);

        let entry = if self.profile.service_submits {
            let hash = self.next_id("5J");
            self.track(&hash);
            JobResultEntry::with_hash(hash)
        } else {
            JobResultEntry::with_tx(self.next_id("signed-tx-"))
        };
        Ok(JobResultReply::finished(vec![entry]))
    }

    async fn get_contract_state(&self, _contract: &ContractRef) -> OrchestratorResult<ContractStateReply> {
        self.delay().await;
        Ok(ContractStateReply { success: true })
    }
}

#[async_trait]
impl ChainRpc for SimulatedBackend {
    async fn submit_transaction(&self, _tx: &str) -> OrchestratorResult<SubmitReply> {
        self.delay().await;
        if fastrand::f64() < self.profile.submit_failure_rate {
            return Ok(SubmitReply::rejected("simulated mempool congestion"));
        }
        let hash = self.next_id("5J");
        self.track(&hash);
        Ok(SubmitReply::accepted(hash))
    }

    async fn get_transaction_status(&self, hash: &str) -> OrchestratorResult<TxStatusReply> {
        self.delay().await;
        let Some(mut remaining) = self.transactions.get_mut(hash) else {
            return Ok(TxStatusReply::with_error("unknown transaction"));
        };
        if *remaining > 0 {
            *remaining -= 1;
            return Ok(TxStatusReply::pending());
        }
        Ok(TxStatusReply::applied())
    }
}

#[async_trait]
impl Wallet for SimulatedBackend {
    async fn connection(&self) -> Option<WalletConnection> {
        Some(WalletConnection {
            address: self.profile.address.clone(),
            chain_id: self.profile.chain_id.clone(),
        })
    }

    async fn sign_payload(&self, payload: &UnsignedPayload) -> Option<SignedData> {
        self.delay().await;
        Some(SignedData(format!("signed:{}", payload.transaction.len())))
    }
}
