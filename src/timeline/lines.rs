//! Well-known timeline line identifiers
//!
//! A line id names one step of a sub-transaction. The same id is reused for
//! every state transition of that step.

pub const TX_PREPARED: &str = "txPrepared";
pub const TX_SIGNED: &str = "txSigned";
pub const TX_PROVED: &str = "txProved";
pub const TX_SENT: &str = "txSent";
pub const TX_INCLUDED: &str = "txIncluded";

/// Synthetic per-entry line marking a fully processed result entry
pub const MINTED: &str = "minted";

pub const CONTRACT_VERIFIED: &str = "contractVerified";

pub const REQUIRED_FIELDS: &str = "requiredFields";
pub const NO_AURO_WALLET: &str = "noAuroWallet";
pub const NO_USER_SIGNATURE: &str = "noUserSignature";
pub const PRIVATE_KEYS_SAVED: &str = "privateKeysSaved";
pub const O1JS: &str = "o1js";
pub const CANCELLED: &str = "cancelled";

/// Generic line for unexpected failures
pub const ERROR: &str = "error";

/// Batch summary group and its single line
pub const BATCH_GROUP: &str = "batch";
pub const SUMMARY: &str = "summary";

/// Lines delivered synchronously, bypassing the update queue cadence
pub const DEFAULT_IMMEDIATE: [&str; 3] = [PRIVATE_KEYS_SAVED, TX_SIGNED, O1JS];

/// Line ids used for one job result entry
///
/// A job with a single entry uses the plain ids; with several entries every
/// id is suffixed with the entry index so that each entry tracks separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryLines {
    pub sent: String,
    pub included: String,
    pub minted: String,
}

impl EntryLines {
    pub fn for_entry(index: usize, total: usize) -> Self {
        if total <= 1 {
            Self {
                sent: TX_SENT.to_string(),
                included: TX_INCLUDED.to_string(),
                minted: MINTED.to_string(),
            }
        } else {
            Self {
                sent: format!("{}-{}", TX_SENT, index),
                included: format!("{}-{}", TX_INCLUDED, index),
                minted: format!("{}-{}", MINTED, index),
            }
        }
    }
}
