//! Shapes exchanged with the remote API, the chain RPC and the wallet
//!
//! Field names follow the remote service's camelCase wire format.

use serde::{Deserialize, Serialize};

/// Unsigned transaction payload handed to the wallet; opaque to the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedPayload {
    pub transaction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// Transaction built by the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltTransaction {
    pub payload: UnsignedPayload,
    /// Human-readable name of the collection or NFT
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nft_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReply {
    pub success: bool,
    #[serde(default)]
    pub tx: Option<BuiltTransaction>,
    #[serde(default)]
    pub error: Option<String>,
}

impl BuildReply {
    pub fn ok(tx: BuiltTransaction) -> Self {
        Self {
            success: true,
            tx: Some(tx),
            error: None,
        }
    }

    pub fn rejected(error: Option<String>) -> Self {
        Self {
            success: false,
            tx: None,
            error,
        }
    }
}

/// Signed data returned by the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignedData(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProveRequest {
    pub tx: BuiltTransaction,
    pub signed_data: SignedData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProveReply {
    pub success: bool,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ProveReply {
    pub fn ok(job_id: impl Into<String>) -> Self {
        Self {
            success: true,
            job_id: Some(job_id.into()),
            error: None,
        }
    }

    pub fn rejected(error: Option<String>) -> Self {
        Self {
            success: false,
            job_id: None,
            error,
        }
    }
}

/// Remote proof job status; unrecognised values count as `unknown`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Finished,
    Used,
    Failed,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Finished => "finished",
            JobStatus::Used => "used",
            JobStatus::Failed => "failed",
            JobStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transaction produced by a proof job: raw bytes to submit, or a hash
/// when the service already submitted it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResultEntry {
    #[serde(default)]
    pub tx: Option<String>,
    #[serde(default)]
    pub hash: Option<String>,
}

impl JobResultEntry {
    pub fn with_hash(hash: impl Into<String>) -> Self {
        Self {
            tx: None,
            hash: Some(hash.into()),
        }
    }

    pub fn with_tx(tx: impl Into<String>) -> Self {
        Self {
            tx: Some(tx.into()),
            hash: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub job_status: JobStatus,
    #[serde(default)]
    pub results: Option<Vec<JobResultEntry>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResultReply {
    pub success: bool,
    #[serde(default)]
    pub results: Option<JobResult>,
}

impl JobResultReply {
    pub fn status(job_status: JobStatus) -> Self {
        Self {
            success: true,
            results: Some(JobResult {
                job_status,
                results: None,
            }),
        }
    }

    pub fn finished(entries: Vec<JobResultEntry>) -> Self {
        Self {
            success: true,
            results: Some(JobResult {
                job_status: JobStatus::Finished,
                results: Some(entries),
            }),
        }
    }
}

/// Chain reply to a submission; a missing hash means the submission failed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReply {
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl SubmitReply {
    pub fn accepted(hash: impl Into<String>) -> Self {
        Self {
            hash: Some(hash.into()),
            status: Some("pending".to_string()),
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            hash: None,
            status: None,
            error: Some(error.into()),
        }
    }

    /// Reason shown to the user for a reply without hash
    pub fn failure_reason(&self) -> String {
        self.error
            .clone()
            .or_else(|| self.status.clone())
            .unwrap_or_else(|| "no transaction hash returned".to_string())
    }
}

pub const TX_APPLIED: &str = "applied";

/// Transaction status; only `applied` is terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxStatusReply {
    pub status: String,
    /// Application-level error carried by a successful status call
    #[serde(default)]
    pub error: Option<String>,
}

impl TxStatusReply {
    pub fn pending() -> Self {
        Self {
            status: "pending".to_string(),
            error: None,
        }
    }

    pub fn applied() -> Self {
        Self {
            status: TX_APPLIED.to_string(),
            error: None,
        }
    }

    pub fn with_error(error: impl Into<String>) -> Self {
        Self {
            status: "unknown".to_string(),
            error: Some(error.into()),
        }
    }

    pub fn is_applied(&self) -> bool {
        self.status == TX_APPLIED
    }
}

/// Identifies the on-chain contract whose state is verified after confirmation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRef {
    pub collection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nft: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractStateReply {
    pub success: bool,
}

/// Wallet account and the chain it is connected to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletConnection {
    pub address: String,
    pub chain_id: String,
}

/// A confirmed result entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub hash: String,
}
