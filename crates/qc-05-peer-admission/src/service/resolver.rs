//! # Block Completion Resolver
//!
//! Decides whether a candidate block carries enough data to be queued.
//!
//! ## Flow
//!
//! ```text
//! CandidateBlock
//!     │
//!     ├─ self-contained ──→ BlockVerifier ──→ ResolvedBlock | InvalidBlock
//!     ├─ id-referenced ───→ pool lookups (sequential) ──→ ResolvedBlock
//!     │                          │
//!     │                          └─ missing ids ──→ one peer fetch (detached)
//!     └─ malformed ───────→ MalformedBlock
//! ```
//!
//! The peer fetch only warms up the missing transactions. Its result is
//! logged, never validated or stored, and never gates admission.

use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument, Span};

use crate::domain::{
    classify_block, within_transaction_limit, AdmissionMetrics, BlockShape, CandidateBlock,
    Completion, FetchedTransaction, MissingTransactionSet, ResolvedBlock, TransactionId,
};
use crate::error::AdmissionError;
use crate::ports::{BlockVerifier, PeerDirectory, TransactionPool};
use crate::service::peer_fallback::select_peer;

/// Block Completion Resolver.
///
/// No ledger side effects happen here; the caller queues the result.
pub struct BlockCompletionResolver<P, V, D>
where
    P: TransactionPool,
    V: BlockVerifier,
    D: PeerDirectory,
{
    pool: Arc<P>,
    verifier: Arc<V>,
    directory: Arc<D>,
    metrics: Arc<AdmissionMetrics>,
    max_block_transactions: u64,
}

impl<P, V, D> BlockCompletionResolver<P, V, D>
where
    P: TransactionPool,
    V: BlockVerifier,
    D: PeerDirectory,
{
    pub fn new(
        pool: Arc<P>,
        verifier: Arc<V>,
        directory: Arc<D>,
        metrics: Arc<AdmissionMetrics>,
        max_block_transactions: u64,
    ) -> Self {
        Self {
            pool,
            verifier,
            directory,
            metrics,
            max_block_transactions,
        }
    }

    /// Resolve a candidate block.
    ///
    /// # Errors
    ///
    /// - `MalformedBlock` if the declared count matches neither payloads nor ids
    /// - `InvalidBlock` if a self-contained block fails verification
    /// - `Internal` if the verifier itself fails
    pub async fn resolve(
        &self,
        candidate: CandidateBlock,
        submitter: Option<IpAddr>,
    ) -> Result<ResolvedBlock, AdmissionError> {
        if !within_transaction_limit(&candidate, self.max_block_transactions) {
            return Err(malformed(&candidate));
        }

        match classify_block(&candidate) {
            BlockShape::SelfContained => self.resolve_self_contained(candidate).await,
            BlockShape::IdReferenced => self.resolve_id_referenced(candidate, submitter).await,
            BlockShape::Malformed => Err(malformed(&candidate)),
        }
    }

    async fn resolve_self_contained(
        &self,
        candidate: CandidateBlock,
    ) -> Result<ResolvedBlock, AdmissionError> {
        debug!(
            block_id = %candidate.id,
            height = candidate.height,
            "Verifying self-contained block"
        );

        if !self.verifier.verify_block(&candidate).await? {
            return Err(AdmissionError::InvalidBlock {
                block_id: candidate.id,
                reason: "verification failed".into(),
            });
        }

        Ok(ResolvedBlock {
            block: candidate,
            completion: Completion::SelfContained,
        })
    }

    async fn resolve_id_referenced(
        &self,
        candidate: CandidateBlock,
        submitter: Option<IpAddr>,
    ) -> Result<ResolvedBlock, AdmissionError> {
        let ids = candidate.transaction_ids.as_deref().unwrap_or_default();
        let missing = self.collect_missing(ids).await;

        debug!(
            block_id = %candidate.id,
            declared = ids.len(),
            missing = missing.len(),
            "Resolved transaction ids against pool"
        );

        if !missing.is_empty() {
            self.request_missing(&missing, submitter).await;
        }

        Ok(ResolvedBlock {
            block: candidate,
            completion: Completion::IdReferenced { missing },
        })
    }

    /// Look ids up in the pool one at a time, in declaration order.
    async fn collect_missing(&self, ids: &[TransactionId]) -> MissingTransactionSet {
        if !self.pool.is_available() {
            warn!(count = ids.len(), "Transaction pool unavailable, treating all ids as missing");
            return ids.iter().cloned().collect();
        }

        let mut missing = MissingTransactionSet::new();
        for id in ids {
            match self.pool.get_transaction(id).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    missing.insert(id.clone());
                }
                Err(e) => {
                    warn!(tx_id = %id, error = %e, "Pool lookup failed, treating id as missing");
                    missing.insert(id.clone());
                }
            }
        }
        missing
    }

    /// Issue one aggregate fetch for the missing ids on a detached task.
    async fn request_missing(&self, missing: &MissingTransactionSet, submitter: Option<IpAddr>) {
        let selection = select_peer(self.directory.as_ref(), submitter).await;
        let matched = selection.is_matched();

        let Some(peer) = selection.into_peer() else {
            warn!(missing = missing.len(), "No known peers, skipping missing transaction request");
            return;
        };

        self.metrics.record_peer_fetch();

        let ids = missing.ids().to_vec();
        let peer_ip = peer.info.ip;
        tokio::spawn(
            async move {
                match peer.client.get_transactions_from_ids(&ids).await {
                    Ok(entries) => {
                        let resolved = entries
                            .iter()
                            .filter(|e| matches!(e, FetchedTransaction::Payload(_)))
                            .count();
                        info!(
                            peer = %peer_ip,
                            matched,
                            requested = ids.len(),
                            resolved,
                            unresolved = entries.len() - resolved,
                            "Peer answered missing transaction request"
                        );
                    }
                    Err(e) => {
                        warn!(peer = %peer_ip, error = %e, "Missing transaction request failed");
                    }
                }
            }
            .instrument(Span::current()),
        );
    }
}

fn malformed(candidate: &CandidateBlock) -> AdmissionError {
    AdmissionError::MalformedBlock {
        block_id: candidate.id.clone(),
        declared: candidate.number_of_transactions,
        transactions: candidate.transaction_count(),
        ids: candidate.transaction_id_count(),
    }
}
