//! Transaction parameters, one variant per action kind

use crate::api::ContractRef;
use crate::errors::{OrchestratorError, OrchestratorResult};
use serde::{Deserialize, Serialize};

/// Action tab a batch belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Launch,
    Mint,
    Transfer,
    Approve,
    Sell,
    Buy,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Launch => "launch",
            ActionKind::Mint => "mint",
            ActionKind::Transfer => "transfer",
            ActionKind::Approve => "approve",
            ActionKind::Sell => "sell",
            ActionKind::Buy => "buy",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "txType", rename_all = "lowercase")]
pub enum TxParams {
    #[serde(rename_all = "camelCase")]
    Launch {
        sender: String,
        collection_name: String,
        symbol: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        collection_address: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata_url: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Mint {
        sender: String,
        collection_address: String,
        nft_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        nft_address: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        price: Option<u64>,
    },
    #[serde(rename_all = "camelCase")]
    Transfer {
        sender: String,
        collection_address: String,
        nft_address: String,
        to: String,
    },
    #[serde(rename_all = "camelCase")]
    Approve {
        sender: String,
        collection_address: String,
        nft_address: String,
        spender: String,
    },
    #[serde(rename_all = "camelCase")]
    Sell {
        sender: String,
        collection_address: String,
        nft_address: String,
        price: u64,
    },
    #[serde(rename_all = "camelCase")]
    Buy {
        sender: String,
        collection_address: String,
        nft_address: String,
        price: u64,
    },
}

impl TxParams {
    pub fn kind(&self) -> ActionKind {
        match self {
            TxParams::Launch { .. } => ActionKind::Launch,
            TxParams::Mint { .. } => ActionKind::Mint,
            TxParams::Transfer { .. } => ActionKind::Transfer,
            TxParams::Approve { .. } => ActionKind::Approve,
            TxParams::Sell { .. } => ActionKind::Sell,
            TxParams::Buy { .. } => ActionKind::Buy,
        }
    }

    pub fn sender(&self) -> &str {
        match self {
            TxParams::Launch { sender, .. }
            | TxParams::Mint { sender, .. }
            | TxParams::Transfer { sender, .. }
            | TxParams::Approve { sender, .. }
            | TxParams::Sell { sender, .. }
            | TxParams::Buy { sender, .. } => sender,
        }
    }

    pub fn collection_address(&self) -> Option<&str> {
        match self {
            TxParams::Launch {
                collection_address, ..
            } => collection_address.as_deref(),
            TxParams::Mint {
                collection_address, ..
            }
            | TxParams::Transfer {
                collection_address, ..
            }
            | TxParams::Approve {
                collection_address, ..
            }
            | TxParams::Sell {
                collection_address, ..
            }
            | TxParams::Buy {
                collection_address, ..
            } => Some(collection_address),
        }
    }

    pub fn nft_address(&self) -> Option<&str> {
        match self {
            TxParams::Launch { .. } => None,
            TxParams::Mint { nft_address, .. } => nft_address.as_deref(),
            TxParams::Transfer { nft_address, .. }
            | TxParams::Approve { nft_address, .. }
            | TxParams::Sell { nft_address, .. }
            | TxParams::Buy { nft_address, .. } => Some(nft_address),
        }
    }

    /// Contract whose state is checked after confirmation, when known upfront
    pub fn contract(&self) -> Option<ContractRef> {
        self.collection_address().map(|collection| ContractRef {
            collection: collection.to_string(),
            nft: self.nft_address().map(str::to_string),
        })
    }

    /// Short human-readable description used as the group title
    pub fn describe(&self) -> String {
        match self {
            TxParams::Launch {
                collection_name, ..
            } => format!("Launch collection {}", collection_name),
            TxParams::Mint { nft_name, .. } => format!("Mint NFT {}", nft_name),
            TxParams::Transfer { nft_address, to, .. } => {
                format!("Transfer NFT {} to {}", nft_address, to)
            }
            TxParams::Approve {
                nft_address,
                spender,
                ..
            } => format!("Approve {} for NFT {}", spender, nft_address),
            TxParams::Sell {
                nft_address, price, ..
            } => format!("Sell NFT {} for {}", nft_address, price),
            TxParams::Buy {
                nft_address, price, ..
            } => format!("Buy NFT {} for {}", nft_address, price),
        }
    }

    /// Required fields must be present before anything is sent
    pub fn validate(&self) -> OrchestratorResult<()> {
        require("sender", self.sender())?;
        match self {
            TxParams::Launch {
                collection_name,
                symbol,
                ..
            } => {
                require("collectionName", collection_name)?;
                require("symbol", symbol)?;
            }
            TxParams::Mint {
                collection_address,
                nft_name,
                ..
            } => {
                require("collectionAddress", collection_address)?;
                require("nftName", nft_name)?;
            }
            TxParams::Transfer {
                collection_address,
                nft_address,
                to,
                ..
            } => {
                require("collectionAddress", collection_address)?;
                require("nftAddress", nft_address)?;
                require("to", to)?;
                if to == self.sender() {
                    return Err(OrchestratorError::InvalidParams(
                        "cannot transfer an NFT to its current owner".to_string(),
                    ));
                }
            }
            TxParams::Approve {
                collection_address,
                nft_address,
                spender,
                ..
            } => {
                require("collectionAddress", collection_address)?;
                require("nftAddress", nft_address)?;
                require("spender", spender)?;
            }
            TxParams::Sell {
                collection_address,
                nft_address,
                price,
                ..
            }
            | TxParams::Buy {
                collection_address,
                nft_address,
                price,
                ..
            } => {
                require("collectionAddress", collection_address)?;
                require("nftAddress", nft_address)?;
                if *price == 0 {
                    return Err(OrchestratorError::InvalidParams(
                        "price must be greater than zero".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn require(field: &str, value: &str) -> OrchestratorResult<()> {
    if value.trim().is_empty() {
        return Err(OrchestratorError::InvalidParams(format!("{} is required", field)));
    }
    Ok(())
}
