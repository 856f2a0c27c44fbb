//! Read-only queries served to syncing peers.
//!
//! Thin delegation to the ledger, pool, directory and chain store. The only
//! logic here is the `ids` validation boundary and the range clamp.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::domain::{
    parse_common_block_ids, parse_transaction_ids, AdmissionConfig, AdmissionMetrics, LastBlock,
    PeerInfo, Transaction,
};
use crate::error::AdmissionError;
use crate::ports::{ChainStore, Ledger, NodeStatus, PeerDirectory, PeerQueryApi, TransactionPool};

/// Peer Query Service.
pub struct PeerQueryService<L, P, D, S>
where
    L: Ledger,
    P: TransactionPool,
    D: PeerDirectory,
    S: ChainStore,
{
    ledger: Arc<L>,
    pool: Arc<P>,
    directory: Arc<D>,
    store: Arc<S>,
    metrics: Arc<AdmissionMetrics>,
    config: AdmissionConfig,
}

impl<L, P, D, S> PeerQueryService<L, P, D, S>
where
    L: Ledger,
    P: TransactionPool,
    D: PeerDirectory,
    S: ChainStore,
{
    pub fn new(
        ledger: Arc<L>,
        pool: Arc<P>,
        directory: Arc<D>,
        store: Arc<S>,
        metrics: Arc<AdmissionMetrics>,
        config: AdmissionConfig,
    ) -> Self {
        Self {
            ledger,
            pool,
            directory,
            store,
            metrics,
            config,
        }
    }
}

#[async_trait]
impl<L, P, D, S> PeerQueryApi for PeerQueryService<L, P, D, S>
where
    L: Ledger,
    P: TransactionPool,
    D: PeerDirectory,
    S: ChainStore,
{
    async fn status(&self) -> Result<NodeStatus, AdmissionError> {
        if !self.ledger.is_ready() {
            return Err(AdmissionError::NotReady);
        }

        let last = self.ledger.get_last_block(false).await?;
        Ok(NodeStatus {
            height: last.as_ref().map_or(0, |b| b.height),
            last_block_id: last.map(|b| b.id),
            metrics: self.metrics.snapshot(),
        })
    }

    async fn list_peers(&self) -> Result<Vec<PeerInfo>, AdmissionError> {
        Ok(self.directory.list_peers().await?)
    }

    async fn common_block(&self, ids: &str) -> Result<Option<LastBlock>, AdmissionError> {
        let heights = parse_common_block_ids(ids, self.config.max_common_block_ids);
        if heights.is_empty() {
            return Err(AdmissionError::BadRequest("invalid block id sequence".into()));
        }

        debug!(candidates = heights.len(), "Common block lookup");
        Ok(self.store.common_block(&heights).await?)
    }

    async fn transactions_by_ids(&self, ids: &str) -> Result<Vec<Transaction>, AdmissionError> {
        let ids = parse_transaction_ids(ids, self.config.max_transaction_query_ids);
        if ids.is_empty() {
            return Err(AdmissionError::BadRequest("invalid transaction id sequence".into()));
        }
        if !self.pool.is_available() {
            return Err(AdmissionError::Internal("transaction pool unavailable".into()));
        }

        let mut found = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(tx) = self.pool.get_transaction(id).await? {
                found.push(tx);
            }
        }

        debug!(requested = ids.len(), found = found.len(), "Transactions by id");
        Ok(found)
    }

    async fn blocks_after(
        &self,
        last_block_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<serde_json::Value>, AdmissionError> {
        let last_block_id = last_block_id.trim();
        if last_block_id.is_empty() {
            return Err(AdmissionError::BadRequest("missing lastBlockId".into()));
        }

        let cap = self.config.max_blocks_per_query;
        let limit = limit.map_or(cap, |l| l.min(cap)).max(1);
        Ok(self.store.blocks_after(last_block_id, limit).await?)
    }
}
