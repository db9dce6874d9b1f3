//! Capabilities consumed by the orchestrator
//!
//! The remote marketplace service, the chain RPC surface and the wallet are
//! external collaborators. The orchestrator only sees these three traits;
//! [`http`] implements the first two over HTTP, the simulated backend and the
//! test mocks implement all three in memory.

pub mod http;
pub mod types;

use crate::errors::OrchestratorResult;
use crate::params::TxParams;
use async_trait::async_trait;

pub use http::HttpMarketplaceClient;
pub use types::*;

/// Remote service that builds transactions and runs proof jobs
#[async_trait]
pub trait MarketplaceApi: Send + Sync {
    async fn build_transaction(&self, params: &TxParams) -> OrchestratorResult<BuildReply>;

    async fn prove_transaction(&self, request: ProveRequest) -> OrchestratorResult<ProveReply>;

    async fn get_job_result(&self, job_id: &str) -> OrchestratorResult<JobResultReply>;

    async fn get_contract_state(&self, contract: &ContractRef) -> OrchestratorResult<ContractStateReply>;
}

/// Chain submission and status surface
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn submit_transaction(&self, tx: &str) -> OrchestratorResult<SubmitReply>;

    async fn get_transaction_status(&self, hash: &str) -> OrchestratorResult<TxStatusReply>;
}

/// Wallet capability; signing is a blocking user interaction
#[async_trait]
pub trait Wallet: Send + Sync {
    /// `None` when no wallet is installed or connected
    async fn connection(&self) -> Option<WalletConnection>;

    /// `None` signals user rejection or a wallet failure
    async fn sign_payload(&self, payload: &UnsignedPayload) -> Option<SignedData>;
}
