//! Wire-level submission and response shapes for the peer transport.
//!
//! Field names follow the established peer protocol (`numberOfTransactions`,
//! `transactionIds`, `isBroadCasted`) and must not change.

use serde::{Deserialize, Serialize};

use crate::domain::{CandidateBlock, LastBlock, PeerInfo, Transaction};

/// `POST /peer/blocks` body.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockSubmission {
    #[serde(default)]
    pub block: Option<CandidateBlock>,
}

/// `POST /peer/transactions` body.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionSubmission {
    #[serde(default)]
    pub transactions: Option<Vec<Transaction>>,
    /// Set by a relaying peer. Loop prevention depends on it.
    #[serde(rename = "isBroadCasted", default)]
    pub is_broadcasted: bool,
}

/// Uniform response envelope: `{success, message?, ...payload}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub payload: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(payload: T) -> Self {
        Self {
            success: true,
            message: None,
            payload,
        }
    }
}

impl Envelope<()> {
    /// `{success: true}` with no payload.
    pub fn accepted() -> Self {
        Self::ok(())
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            payload: (),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PeersPayload {
    pub peers: Vec<PeerInfo>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CommonBlockPayload {
    pub common: Option<LastBlock>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TransactionsPayload {
    pub transactions: Vec<Transaction>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BlocksPayload {
    pub blocks: Vec<serde_json::Value>,
}
