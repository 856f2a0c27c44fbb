//! Inbound ports (API) for the Peer Admission subsystem.

use async_trait::async_trait;
use serde::Serialize;
use std::net::IpAddr;

use crate::domain::{
    AdmissionOutcome, AdmissionReport, CandidateBlock, LastBlock, MetricsSnapshot, PeerInfo,
    Transaction,
};
use crate::error::AdmissionError;

/// Node status reported to syncing peers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    pub height: u64,
    pub last_block_id: Option<String>,
    pub metrics: MetricsSnapshot,
}

/// Block submissions from peers.
#[async_trait]
pub trait BlockAdmissionApi: Send + Sync {
    /// Decide whether a submitted block proceeds to the ledger queue.
    ///
    /// Never fails: every error, and any panic inside admission, is reported
    /// as `AdmissionOutcome::Rejected`.
    ///
    /// # Arguments
    /// * `block` - Submitted block, `None` when the submission carried none
    /// * `submitter` - Network origin of the submission, if known
    async fn admit_block(
        &self,
        block: Option<CandidateBlock>,
        submitter: Option<IpAddr>,
    ) -> AdmissionOutcome;
}

/// Transaction batch submissions from peers.
#[async_trait]
pub trait TransactionAdmissionApi: Send + Sync {
    /// Run the guard over a batch, apply accepted transactions and relay
    /// broadcastable ones unless the batch is itself a relay.
    ///
    /// # Arguments
    /// * `batch` - Submitted transactions; `None` or empty is a no-op
    /// * `already_broadcast` - Set when the batch arrived through a relay
    async fn admit_transactions(
        &self,
        batch: Option<Vec<Transaction>>,
        already_broadcast: bool,
    ) -> Result<AdmissionReport, AdmissionError>;
}

/// Read-only queries served to syncing peers.
#[async_trait]
pub trait PeerQueryApi: Send + Sync {
    async fn status(&self) -> Result<NodeStatus, AdmissionError>;

    async fn list_peers(&self) -> Result<Vec<PeerInfo>, AdmissionError>;

    /// `ids` is the raw comma-separated query value.
    async fn common_block(&self, ids: &str) -> Result<Option<LastBlock>, AdmissionError>;

    /// `ids` is the raw comma-separated query value.
    async fn transactions_by_ids(&self, ids: &str) -> Result<Vec<Transaction>, AdmissionError>;

    async fn blocks_after(
        &self,
        last_block_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<serde_json::Value>, AdmissionError>;
}
