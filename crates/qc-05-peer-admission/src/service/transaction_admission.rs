//! # Transaction Admission Service
//!
//! Runs the guard over a submitted batch, applies the accepted partition to
//! the ledger and relays the broadcast partition to peers.
//!
//! ## Loop prevention
//!
//! A batch flagged `already_broadcast` arrived through a relay and is never
//! relayed again, whatever the guard says about it.
//!
//! A panic in any collaborator is caught here and reported as `Internal`.

use async_trait::async_trait;
use futures::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::domain::{AdmissionMetrics, AdmissionReport, GuardPartition, Transaction, TransactionId};
use crate::error::AdmissionError;
use crate::ports::{Ledger, TransactionAdmissionApi, TransactionGuard, TransactionRelay};

/// Transaction Admission Service.
///
/// ## Dependencies
///
/// - `L: Ledger` - Applies accepted transactions
/// - `G: TransactionGuard` - Partitions the batch
/// - `R: TransactionRelay` - Outbound re-broadcast
pub struct TransactionAdmissionService<L, G, R>
where
    L: Ledger,
    G: TransactionGuard,
    R: TransactionRelay,
{
    ledger: Arc<L>,
    guard: Arc<G>,
    relay: Arc<R>,
    metrics: Arc<AdmissionMetrics>,
}

impl<L, G, R> TransactionAdmissionService<L, G, R>
where
    L: Ledger,
    G: TransactionGuard,
    R: TransactionRelay,
{
    pub fn new(
        ledger: Arc<L>,
        guard: Arc<G>,
        relay: Arc<R>,
        metrics: Arc<AdmissionMetrics>,
    ) -> Self {
        Self {
            ledger,
            guard,
            relay,
            metrics,
        }
    }

    async fn admit(
        &self,
        batch: Vec<Transaction>,
        already_broadcast: bool,
    ) -> Result<AdmissionReport, AdmissionError> {
        let GuardPartition {
            accept,
            broadcast,
            invalid,
        } = self.guard.validate(&batch).await?;

        debug!(
            submitted = batch.len(),
            accept = accept.len(),
            broadcast = broadcast.len(),
            invalid = invalid.len(),
            "Batch partitioned"
        );

        if !accept.is_empty() {
            self.ledger.post_transactions(accept.clone()).await?;
            self.metrics.record_transactions_accepted(accept.len());
        }

        if !broadcast.is_empty() {
            if already_broadcast {
                debug!(count = broadcast.len(), "Batch already relayed, not re-broadcasting");
                self.metrics.record_rebroadcast_suppressed();
            } else {
                self.rebroadcast(batch, &broadcast).await;
            }
        }

        info!(accepted = accept.len(), "Transaction batch admitted");
        Ok(AdmissionReport { accepted: accept })
    }

    /// Relay the broadcast partition. Relay failures are logged only.
    async fn rebroadcast(&self, batch: Vec<Transaction>, ids: &[TransactionId]) {
        let wanted: HashSet<&TransactionId> = ids.iter().collect();
        let outbound: Vec<Transaction> = batch
            .into_iter()
            .filter(|tx| wanted.contains(&tx.id))
            .collect();

        if outbound.is_empty() {
            warn!(count = ids.len(), "Broadcast ids not present in batch");
            return;
        }

        let count = outbound.len();
        match self.relay.broadcast(outbound).await {
            Ok(()) => {
                debug!(count, "Batch re-broadcast");
                self.metrics.record_rebroadcast();
            }
            Err(e) => warn!(count, error = %e, "Re-broadcast failed"),
        }
    }
}

#[async_trait]
impl<L, G, R> TransactionAdmissionApi for TransactionAdmissionService<L, G, R>
where
    L: Ledger,
    G: TransactionGuard,
    R: TransactionRelay,
{
    async fn admit_transactions(
        &self,
        batch: Option<Vec<Transaction>>,
        already_broadcast: bool,
    ) -> Result<AdmissionReport, AdmissionError> {
        let batch = match batch {
            Some(batch) if !batch.is_empty() => batch,
            _ => return Ok(AdmissionReport::default()),
        };

        let span = info_span!(
            "transaction_admission",
            admission_id = %Uuid::new_v4(),
            size = batch.len(),
            already_broadcast,
        );

        let admission = self.admit(batch, already_broadcast).instrument(span.clone());
        let result = AssertUnwindSafe(admission).catch_unwind().await;

        span.in_scope(|| match result {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(e)) => {
                warn!(error = %e, "Transaction batch rejected");
                Err(e)
            }
            Err(_) => {
                error!("Transaction admission panicked");
                Err(AdmissionError::Internal("transaction admission panicked".into()))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CollaboratorError, RejectReason};
    use crate::testing::{tx_id, MemoryLedger, RecordingRelay, ScriptedGuard};

    struct Fixture {
        ledger: Arc<MemoryLedger>,
        guard: Arc<ScriptedGuard>,
        relay: Arc<RecordingRelay>,
        metrics: Arc<AdmissionMetrics>,
        service: TransactionAdmissionService<MemoryLedger, ScriptedGuard, RecordingRelay>,
    }

    fn fixture(guard: ScriptedGuard) -> Fixture {
        let ledger = Arc::new(MemoryLedger::new());
        let guard = Arc::new(guard);
        let relay = Arc::new(RecordingRelay::new());
        let metrics = Arc::new(AdmissionMetrics::new());
        Fixture {
            service: TransactionAdmissionService::new(
                ledger.clone(),
                guard.clone(),
                relay.clone(),
                metrics.clone(),
            ),
            ledger,
            guard,
            relay,
            metrics,
        }
    }

    fn batch(bytes: &[u8]) -> Vec<Transaction> {
        bytes.iter().map(|b| Transaction::new(tx_id(*b))).collect()
    }

    fn partition(accept: &[u8], broadcast: &[u8], invalid: &[u8]) -> GuardPartition {
        let ids = |bytes: &[u8]| bytes.iter().map(|b| tx_id(*b)).collect::<Vec<_>>();
        GuardPartition {
            accept: ids(accept),
            broadcast: ids(broadcast),
            invalid: ids(invalid),
        }
    }

    #[tokio::test]
    async fn test_absent_batch_is_noop() {
        let f = fixture(ScriptedGuard::new(partition(&[1], &[], &[])));

        let report = f.service.admit_transactions(None, false).await.unwrap();

        assert!(report.accepted.is_empty());
        assert_eq!(f.guard.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let f = fixture(ScriptedGuard::new(partition(&[1], &[], &[])));

        let report = f.service.admit_transactions(Some(vec![]), false).await.unwrap();

        assert!(report.accepted.is_empty());
        assert_eq!(f.guard.calls(), 0);
        assert!(f.ledger.posted().is_empty());
    }

    #[tokio::test]
    async fn test_guard_sees_full_batch() {
        let f = fixture(ScriptedGuard::new(partition(&[1], &[], &[2, 3])));

        f.service
            .admit_transactions(Some(batch(&[1, 2, 3])), false)
            .await
            .unwrap();

        assert_eq!(f.guard.batches(), vec![vec![tx_id(1), tx_id(2), tx_id(3)]]);
    }

    #[tokio::test]
    async fn test_accepted_applied_and_reported() {
        let f = fixture(ScriptedGuard::new(partition(&[1, 2], &[], &[3])));

        let report = f
            .service
            .admit_transactions(Some(batch(&[1, 2, 3])), false)
            .await
            .unwrap();

        assert_eq!(report.accepted, vec![tx_id(1), tx_id(2)]);
        assert_eq!(f.ledger.posted(), vec![vec![tx_id(1), tx_id(2)]]);
        assert_eq!(f.metrics.snapshot().transactions_accepted, 2);
    }

    #[tokio::test]
    async fn test_empty_accept_partition_not_posted() {
        let f = fixture(ScriptedGuard::new(partition(&[], &[], &[1])));

        let report = f
            .service
            .admit_transactions(Some(batch(&[1])), false)
            .await
            .unwrap();

        assert!(report.accepted.is_empty());
        assert!(f.ledger.posted().is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_partition_relayed() {
        let f = fixture(ScriptedGuard::new(partition(&[1, 2], &[2], &[])));

        f.service
            .admit_transactions(Some(batch(&[1, 2])), false)
            .await
            .unwrap();

        let broadcasts = f.relay.broadcasts();
        assert_eq!(broadcasts.len(), 1);
        assert_eq!(broadcasts[0], batch(&[2]));
        assert_eq!(f.metrics.snapshot().batches_rebroadcast, 1);
    }

    #[tokio::test]
    async fn test_already_broadcast_batch_not_relayed() {
        let f = fixture(ScriptedGuard::new(partition(&[1], &[1], &[])));

        let report = f
            .service
            .admit_transactions(Some(batch(&[1])), true)
            .await
            .unwrap();

        assert_eq!(report.accepted, vec![tx_id(1)]);
        assert!(f.relay.broadcasts().is_empty());
        assert_eq!(f.metrics.snapshot().rebroadcasts_suppressed, 1);
    }

    #[tokio::test]
    async fn test_relay_failure_does_not_fail_admission() {
        let f = fixture(ScriptedGuard::new(partition(&[1], &[1], &[])));
        f.relay.fail();

        let report = f
            .service
            .admit_transactions(Some(batch(&[1])), false)
            .await
            .unwrap();

        assert_eq!(report.accepted, vec![tx_id(1)]);
        assert_eq!(f.relay.broadcasts().len(), 1);
        assert_eq!(f.metrics.snapshot().batches_rebroadcast, 0);
    }

    #[tokio::test]
    async fn test_guard_failure_is_internal() {
        let f = fixture(ScriptedGuard::failing(CollaboratorError::Unavailable(
            "pool".into(),
        )));

        let err = f
            .service
            .admit_transactions(Some(batch(&[1])), false)
            .await
            .unwrap_err();

        assert_eq!(err.reason(), RejectReason::Internal);
        assert!(f.ledger.posted().is_empty());
    }

    struct PanickingGuard;

    #[async_trait]
    impl TransactionGuard for PanickingGuard {
        async fn validate(
            &self,
            _batch: &[Transaction],
        ) -> Result<GuardPartition, CollaboratorError> {
            panic!("guard bug");
        }
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let ledger = Arc::new(MemoryLedger::new());
        let relay = Arc::new(RecordingRelay::new());
        let service = Arc::new(TransactionAdmissionService::new(
            ledger.clone(),
            Arc::new(PanickingGuard),
            relay.clone(),
            Arc::new(AdmissionMetrics::new()),
        ));

        let handle = tokio::spawn(async move {
            service
                .admit_transactions(Some(batch(&[1])), false)
                .await
        });
        let result = handle.await.expect("panic escaped the admission boundary");

        assert_eq!(result.unwrap_err().reason(), RejectReason::Internal);
        assert!(ledger.posted().is_empty());
        assert!(relay.broadcasts().is_empty());
    }
}
