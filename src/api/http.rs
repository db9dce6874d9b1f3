//! JSON-over-HTTP client for the marketplace service and its chain proxy

use super::{
    BuildReply, ChainRpc, ContractRef, ContractStateReply, JobResultReply, MarketplaceApi, ProveReply,
    ProveRequest, SubmitReply, TxStatusReply,
};
use crate::config::ApiConfig;
use crate::errors::{OrchestratorError, OrchestratorResult};
use crate::params::TxParams;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

const API_KEY_HEADER: &str = "X-API-KEY";

#[derive(Debug, Clone)]
pub struct HttpMarketplaceClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    chain_id: String,
}

impl HttpMarketplaceClient {
    pub fn new(config: &ApiConfig) -> OrchestratorResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .pool_max_idle_per_host(8)
            .build()
            .map_err(|e| OrchestratorError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            chain_id: config.chain_id.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> OrchestratorResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        let mut req = self.http.post(&url).json(body);
        if let Some(key) = &self.api_key {
            req = req.header(API_KEY_HEADER, key);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(path, status = %status, "Marketplace API returned an error status");
            return Err(OrchestratorError::Transport(format!(
                "{} returned {}: {}",
                path,
                status,
                text.trim()
            )));
        }

        let bytes = resp.bytes().await?;
        debug!(path, bytes = bytes.len(), "Marketplace API reply");
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl MarketplaceApi for HttpMarketplaceClient {
    async fn build_transaction(&self, params: &TxParams) -> OrchestratorResult<BuildReply> {
        self.post("build", &json!({ "chain": self.chain_id, "params": params }))
            .await
    }

    async fn prove_transaction(&self, request: ProveRequest) -> OrchestratorResult<ProveReply> {
        self.post(
            "prove",
            &json!({
                "chain": self.chain_id,
                "tx": request.tx,
                "signedData": request.signed_data,
            }),
        )
        .await
    }

    async fn get_job_result(&self, job_id: &str) -> OrchestratorResult<JobResultReply> {
        self.post("result", &json!({ "chain": self.chain_id, "jobId": job_id }))
            .await
    }

    async fn get_contract_state(&self, contract: &ContractRef) -> OrchestratorResult<ContractStateReply> {
        self.post(
            "contract-state",
            &json!({
                "chain": self.chain_id,
                "contractAddress": contract.collection,
                "nftAddress": contract.nft,
            }),
        )
        .await
    }
}

#[async_trait]
impl ChainRpc for HttpMarketplaceClient {
    async fn submit_transaction(&self, tx: &str) -> OrchestratorResult<SubmitReply> {
        self.post("submit", &json!({ "chain": self.chain_id, "tx": tx }))
            .await
    }

    async fn get_transaction_status(&self, hash: &str) -> OrchestratorResult<TxStatusReply> {
        self.post("tx-status", &json!({ "chain": self.chain_id, "hash": hash }))
            .await
    }
}
