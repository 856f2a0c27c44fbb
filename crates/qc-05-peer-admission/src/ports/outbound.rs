//! Outbound ports (SPI) for the Peer Admission subsystem.
//!
//! Every collaborator here owns its own concurrency safety. Calls are
//! asynchronous and the admission layer never holds a lock across them.

use async_trait::async_trait;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use crate::domain::{
    CandidateBlock, FetchedTransaction, GuardPartition, LastBlock, PeerInfo, ResolvedBlock,
    Transaction, TransactionId,
};
use crate::error::CollaboratorError;

/// Ledger (block queue and transaction application).
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Whether the ledger subsystem has finished loading.
    fn is_ready(&self) -> bool;

    /// Current chain tip. `detailed` asks for the full block.
    async fn get_last_block(&self, detailed: bool) -> Result<Option<LastBlock>, CollaboratorError>;

    /// Hand a resolved block to the intake queue.
    ///
    /// Returns once the block is enqueued; processing is the ledger's concern.
    async fn queue_block(&self, block: ResolvedBlock) -> Result<(), CollaboratorError>;

    /// Apply the given transactions locally.
    async fn post_transactions(&self, ids: Vec<TransactionId>) -> Result<(), CollaboratorError>;
}

/// Local transaction pool lookups.
#[async_trait]
pub trait TransactionPool: Send + Sync {
    /// Whether the pool can serve lookups right now.
    fn is_available(&self) -> bool;

    async fn get_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<Option<Transaction>, CollaboratorError>;
}

/// Validation guard over a submitted batch.
///
/// Produces the partition as a value; there is no partition state to query
/// afterwards.
#[async_trait]
pub trait TransactionGuard: Send + Sync {
    async fn validate(&self, batch: &[Transaction]) -> Result<GuardPartition, CollaboratorError>;
}

/// Outbound re-broadcast of transactions to peers.
#[async_trait]
pub trait TransactionRelay: Send + Sync {
    async fn broadcast(&self, transactions: Vec<Transaction>) -> Result<(), CollaboratorError>;
}

/// Structural and cryptographic block verification.
#[async_trait]
pub trait BlockVerifier: Send + Sync {
    /// `Ok(false)` means the block is invalid; `Err` means the verifier failed.
    async fn verify_block(&self, block: &CandidateBlock) -> Result<bool, CollaboratorError>;
}

/// A peer able to answer "transactions by id".
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Entries the peer cannot resolve come back as the bare id.
    async fn get_transactions_from_ids(
        &self,
        ids: &[TransactionId],
    ) -> Result<Vec<FetchedTransaction>, CollaboratorError>;
}

/// Addressable peer returned by the directory.
#[derive(Clone)]
pub struct PeerHandle {
    pub info: PeerInfo,
    pub client: Arc<dyn PeerClient>,
}

impl PeerHandle {
    pub fn new(info: PeerInfo, client: Arc<dyn PeerClient>) -> Self {
        Self { info, client }
    }
}

impl fmt::Debug for PeerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerHandle")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Peer directory lookups.
#[async_trait]
pub trait PeerDirectory: Send + Sync {
    /// Peer registered under `ip`, if any.
    async fn get_peer(&self, ip: IpAddr) -> Result<Option<PeerHandle>, CollaboratorError>;

    /// Uniformly random known peer, if any.
    async fn get_random_peer(&self) -> Result<Option<PeerHandle>, CollaboratorError>;

    async fn list_peers(&self) -> Result<Vec<PeerInfo>, CollaboratorError>;
}

/// Raw chain storage queries used by syncing peers.
#[async_trait]
pub trait ChainStore: Send + Sync {
    /// Highest block among `heights` that the local chain also has.
    async fn common_block(&self, heights: &[u64]) -> Result<Option<LastBlock>, CollaboratorError>;

    /// Up to `limit` blocks following `last_block_id`.
    async fn blocks_after(
        &self,
        last_block_id: &str,
        limit: usize,
    ) -> Result<Vec<serde_json::Value>, CollaboratorError>;
}
