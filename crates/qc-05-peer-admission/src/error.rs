//! Error types for the Peer Admission subsystem.

use serde::Serialize;
use thiserror::Error;

/// Failures reported by driven ports (ledger, pool, guard, peers, storage).
///
/// The admission layer never inspects collaborator internals; every variant
/// is treated as "that collaborator did not deliver".
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("Collaborator timed out")]
    Timeout,

    #[error("Collaborator rejected request: {0}")]
    Rejected(String),

    #[error("Collaborator internal error: {0}")]
    Internal(String),
}

/// Admission errors.
///
/// Every variant is caught at the admission boundary and converted into a
/// `{success: false}` envelope. None of them reach the transport as a fault.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(
        "Malformed block {block_id}: declared {declared} transactions, \
         got {transactions} payloads and {ids} ids"
    )]
    MalformedBlock {
        block_id: String,
        declared: u64,
        transactions: usize,
        ids: usize,
    },

    #[error("Invalid block {block_id}: {reason}")]
    InvalidBlock { block_id: String, reason: String },

    #[error("Blockchain is loading")]
    NotReady,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AdmissionError {
    /// Reason tag reported in a rejected outcome.
    pub fn reason(&self) -> RejectReason {
        match self {
            AdmissionError::BadRequest(_) => RejectReason::BadRequest,
            AdmissionError::MalformedBlock { .. } => RejectReason::MalformedBlock,
            AdmissionError::InvalidBlock { .. } => RejectReason::InvalidBlock,
            AdmissionError::NotReady => RejectReason::NotReady,
            AdmissionError::Internal(_) => RejectReason::Internal,
        }
    }
}

impl From<CollaboratorError> for AdmissionError {
    fn from(err: CollaboratorError) -> Self {
        AdmissionError::Internal(err.to_string())
    }
}

/// Why an admission was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectReason {
    BadRequest,
    MalformedBlock,
    InvalidBlock,
    NotReady,
    Internal,
}

impl RejectReason {
    pub const ALL: [RejectReason; 5] = [
        RejectReason::BadRequest,
        RejectReason::MalformedBlock,
        RejectReason::InvalidBlock,
        RejectReason::NotReady,
        RejectReason::Internal,
    ];

    /// Message returned to the submitting peer.
    pub fn message(&self) -> &'static str {
        match self {
            RejectReason::BadRequest => "Invalid request",
            RejectReason::MalformedBlock => "Malformed block",
            RejectReason::InvalidBlock => "Invalid block",
            RejectReason::NotReady => "Blockchain is loading",
            RejectReason::Internal => "Internal error",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    #[error("Invalid environment value for {key}: {value}")]
    InvalidEnv { key: String, value: String },
}
