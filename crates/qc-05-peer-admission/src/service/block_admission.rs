//! # Block Admission Service
//!
//! Orchestrates completion resolution and hands completed blocks to the
//! ledger's intake queue.
//!
//! Nothing escapes `admit_block`: errors become `Rejected(reason)` and a
//! panic anywhere in the admission path becomes `Rejected(Internal)`.

use async_trait::async_trait;
use futures::FutureExt;
use std::net::IpAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::domain::{AdmissionMetrics, AdmissionOutcome, CandidateBlock};
use crate::error::{AdmissionError, RejectReason};
use crate::ports::{BlockAdmissionApi, BlockVerifier, Ledger, PeerDirectory, TransactionPool};
use crate::service::resolver::BlockCompletionResolver;

/// Block Admission Service.
///
/// ## Dependencies
///
/// - `L: Ledger` - Readiness and block queue
/// - `P: TransactionPool` - Id resolution
/// - `V: BlockVerifier` - Self-contained block verification
/// - `D: PeerDirectory` - Peer selection for missing transactions
pub struct BlockAdmissionService<L, P, V, D>
where
    L: Ledger,
    P: TransactionPool,
    V: BlockVerifier,
    D: PeerDirectory,
{
    ledger: Arc<L>,
    resolver: BlockCompletionResolver<P, V, D>,
    metrics: Arc<AdmissionMetrics>,
}

impl<L, P, V, D> BlockAdmissionService<L, P, V, D>
where
    L: Ledger,
    P: TransactionPool,
    V: BlockVerifier,
    D: PeerDirectory,
{
    pub fn new(
        ledger: Arc<L>,
        resolver: BlockCompletionResolver<P, V, D>,
        metrics: Arc<AdmissionMetrics>,
    ) -> Self {
        Self {
            ledger,
            resolver,
            metrics,
        }
    }

    async fn try_admit(
        &self,
        block: Option<CandidateBlock>,
        submitter: Option<IpAddr>,
    ) -> Result<(), AdmissionError> {
        if !self.ledger.is_ready() {
            return Err(AdmissionError::NotReady);
        }

        let block =
            block.ok_or_else(|| AdmissionError::BadRequest("missing block payload".into()))?;

        let resolved = self.resolver.resolve(block, submitter).await?;
        let (block_id, height) = (resolved.id().to_string(), resolved.height());

        self.ledger.queue_block(resolved).await?;

        info!(block_id = %block_id, height, "Block queued");
        Ok(())
    }
}

#[async_trait]
impl<L, P, V, D> BlockAdmissionApi for BlockAdmissionService<L, P, V, D>
where
    L: Ledger,
    P: TransactionPool,
    V: BlockVerifier,
    D: PeerDirectory,
{
    async fn admit_block(
        &self,
        block: Option<CandidateBlock>,
        submitter: Option<IpAddr>,
    ) -> AdmissionOutcome {
        let span = info_span!(
            "block_admission",
            admission_id = %Uuid::new_v4(),
            submitter = ?submitter,
        );

        let result = AssertUnwindSafe(self.try_admit(block, submitter).instrument(span.clone()))
            .catch_unwind()
            .await;

        let outcome = span.in_scope(|| match result {
            Ok(Ok(())) => AdmissionOutcome::Accepted,
            Ok(Err(e)) => {
                warn!(error = %e, "Block rejected");
                AdmissionOutcome::Rejected(e.reason())
            }
            Err(_) => {
                error!("Block admission panicked");
                AdmissionOutcome::Rejected(RejectReason::Internal)
            }
        });

        self.metrics.record_block(outcome);
        outcome
    }
}
