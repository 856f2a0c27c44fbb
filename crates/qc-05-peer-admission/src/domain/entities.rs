//! # Core Domain Entities
//!
//! Defines the data carried by peer submissions.
//!
//! ## Entities
//!
//! - [`CandidateBlock`]: Block submitted by a peer, not yet verified or queued
//! - [`Transaction`]: Full transaction payload (opaque body, typed id)
//! - [`TransactionId`]: Fixed-length hexadecimal transaction identifier
//! - [`ResolvedBlock`]: Candidate block that passed completion resolution
//! - [`PeerInfo`]: Addressable peer as listed by the peer directory
//!
//! ## Wire Format
//!
//! Field names follow the peer protocol (`numberOfTransactions`,
//! `transactionIds`), so these types deserialize straight from submissions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

use super::MissingTransactionSet;

/// Length of a transaction identifier in hexadecimal characters.
pub const TRANSACTION_ID_HEX_LEN: usize = 32;

/// Opaque fixed-format transaction identifier.
///
/// Always `TRANSACTION_ID_HEX_LEN` lowercase hexadecimal characters.
///
/// # Example
///
/// ```rust
/// use qc_05_peer_admission::TransactionId;
///
/// let id = TransactionId::parse("AA00000000000000000000000000000f").unwrap();
/// assert_eq!(id.as_str(), "aa00000000000000000000000000000f");
/// assert!(TransactionId::parse("not-hex").is_none());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionId(String);

impl TransactionId {
    /// Parses and normalizes an identifier. Returns `None` unless the input is
    /// exactly `TRANSACTION_ID_HEX_LEN` hex characters.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() != TRANSACTION_ID_HEX_LEN {
            return None;
        }
        hex::decode(raw).ok()?;
        Some(Self(raw.to_ascii_lowercase()))
    }

    /// Builds an identifier from raw bytes.
    pub fn from_bytes(bytes: [u8; TRANSACTION_ID_HEX_LEN / 2]) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TransactionId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TransactionId::parse(&value).ok_or_else(|| format!("invalid transaction id: {value}"))
    }
}

impl From<TransactionId> for String {
    fn from(id: TransactionId) -> Self {
        id.0
    }
}

/// Full transaction payload.
///
/// Only the identifier is interpreted here. The remaining fields are carried
/// through untouched for the pool, guard and ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    #[serde(flatten)]
    pub body: serde_json::Map<String, serde_json::Value>,
}

impl Transaction {
    /// Creates a transaction with an empty body.
    pub fn new(id: TransactionId) -> Self {
        Self {
            id,
            body: serde_json::Map::new(),
        }
    }

    /// Builder method: set a body field.
    pub fn with_field(mut self, key: &str, value: serde_json::Value) -> Self {
        self.body.insert(key.to_string(), value);
        self
    }
}

/// Block submitted by a peer.
///
/// Exactly one of `transactions` / `transaction_ids` is expected to match
/// `number_of_transactions`. Any other shape is malformed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateBlock {
    pub height: u64,
    pub id: String,
    pub number_of_transactions: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transactions: Option<Vec<Transaction>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_ids: Option<Vec<TransactionId>>,
}

impl CandidateBlock {
    /// Creates a candidate block with neither payloads nor ids.
    pub fn new(height: u64, id: impl Into<String>, number_of_transactions: u64) -> Self {
        Self {
            height,
            id: id.into(),
            number_of_transactions,
            transactions: None,
            transaction_ids: None,
        }
    }

    /// Builder method: set full transaction payloads.
    pub fn with_transactions(mut self, transactions: Vec<Transaction>) -> Self {
        self.transactions = Some(transactions);
        self
    }

    /// Builder method: set transaction identifiers.
    pub fn with_transaction_ids(mut self, ids: Vec<TransactionId>) -> Self {
        self.transaction_ids = Some(ids);
        self
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.as_ref().map_or(0, Vec::len)
    }

    pub fn transaction_id_count(&self) -> usize {
        self.transaction_ids.as_ref().map_or(0, Vec::len)
    }
}

/// How a resolved block was completed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Completion {
    /// Carried every payload and passed verification.
    SelfContained,
    /// Carried ids only; `missing` lists ids the local pool could not supply.
    IdReferenced { missing: MissingTransactionSet },
}

/// Candidate block ready for the ledger intake queue.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedBlock {
    pub block: CandidateBlock,
    pub completion: Completion,
}

impl ResolvedBlock {
    pub fn id(&self) -> &str {
        &self.block.id
    }

    pub fn height(&self) -> u64 {
        self.block.height
    }

    /// Ids that were missing from the local pool (empty for self-contained blocks).
    pub fn missing(&self) -> Option<&MissingTransactionSet> {
        match &self.completion {
            Completion::SelfContained => None,
            Completion::IdReferenced { missing } => Some(missing),
        }
    }
}

/// Summary of the ledger tip.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastBlock {
    pub height: u64,
    pub id: String,
}

/// Peer as listed by the peer directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub ip: IpAddr,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
}

impl PeerInfo {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self {
            ip,
            port,
            height: None,
        }
    }
}

/// One entry of a peer's "transactions by id" answer.
///
/// Entries the peer could not resolve come back as the bare id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FetchedTransaction {
    Payload(Transaction),
    Unresolved(TransactionId),
}
