//! # Admission Flows
//!
//! End-to-end flows through the admission services:
//!
//! 1. **Block with missing ids**: accepted, queued, one aggregate fetch to the submitter
//! 2. **Peer fallback**: unregistered submitter, fetch goes to a random known peer
//! 3. **Advisory fetch**: a failing or absent peer never blocks acceptance
//! 4. **Relay loop**: a batch relayed from node A to node B stops at B
//! 5. **HTTP**: the same block flow through the peer transport

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use std::net::{IpAddr, SocketAddr};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    use qc_05_peer_admission::adapters::{router, AppState};
    use qc_05_peer_admission::ports::TransactionRelay;
    use qc_05_peer_admission::testing::{
        tx_id, MemoryChainStore, MemoryDirectory, MemoryLedger, MemoryPool, RecordingPeer,
        RecordingRelay, ScriptedGuard, StaticVerifier,
    };
    use qc_05_peer_admission::{
        AdmissionConfig, AdmissionMetrics, AdmissionOutcome, BlockAdmissionApi,
        BlockAdmissionService, BlockCompletionResolver, CandidateBlock, CollaboratorError,
        Completion, GuardPartition, PeerInfo, PeerQueryService, Transaction,
        TransactionAdmissionApi, TransactionAdmissionService,
    };

    use super::super::init_tracing;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    type Blocks = BlockAdmissionService<MemoryLedger, MemoryPool, StaticVerifier, MemoryDirectory>;

    struct Node {
        ledger: Arc<MemoryLedger>,
        metrics: Arc<AdmissionMetrics>,
        blocks: Blocks,
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([10, 1, 0, last])
    }

    fn node(pool: MemoryPool, directory: MemoryDirectory) -> Node {
        let ledger = Arc::new(MemoryLedger::new());
        let metrics = Arc::new(AdmissionMetrics::new());
        let resolver = BlockCompletionResolver::new(
            Arc::new(pool),
            Arc::new(StaticVerifier::accepting()),
            Arc::new(directory),
            metrics.clone(),
            AdmissionConfig::default().max_block_transactions,
        );
        Node {
            ledger: ledger.clone(),
            metrics: metrics.clone(),
            blocks: BlockAdmissionService::new(ledger, resolver, metrics),
        }
    }

    fn id_referenced_block() -> CandidateBlock {
        CandidateBlock::new(101, "B1", 2).with_transaction_ids(vec![tx_id(0xAA), tx_id(0xBB)])
    }

    fn pool_with_aa() -> MemoryPool {
        MemoryPool::with_transactions([Transaction::new(tx_id(0xAA))])
    }

    // =============================================================================
    // BLOCK ADMISSION
    // =============================================================================

    #[tokio::test]
    async fn test_block_with_missing_ids_fetches_from_submitter() {
        init_tracing();
        let submitter = Arc::new(RecordingPeer::knowing([Transaction::new(tx_id(0xBB))]));
        let bystander = Arc::new(RecordingPeer::new());
        let directory = MemoryDirectory::new()
            .with_peer(PeerInfo::new(ip(1), 7000), submitter.clone())
            .with_peer(PeerInfo::new(ip(2), 7000), bystander.clone());
        let node = node(pool_with_aa(), directory);

        let outcome = node
            .blocks
            .admit_block(Some(id_referenced_block()), Some(ip(1)))
            .await;

        assert_eq!(outcome, AdmissionOutcome::Accepted);
        let queued = node.ledger.queued();
        assert_eq!(queued.len(), 1);
        assert_eq!(
            queued[0].missing().map(|m| m.ids().to_vec()),
            Some(vec![tx_id(0xBB)])
        );

        assert_eq!(submitter.wait_for_requests(1, Duration::from_secs(1)).await, 1);
        assert_eq!(submitter.requests(), vec![vec![tx_id(0xBB)]]);
        assert!(bystander.requests().is_empty());
        assert_eq!(node.metrics.snapshot().peer_fetches_issued, 1);
    }

    #[tokio::test]
    async fn test_unregistered_submitter_falls_back_to_known_peer() {
        init_tracing();
        let only_peer = Arc::new(RecordingPeer::new());
        let directory =
            MemoryDirectory::new().with_peer(PeerInfo::new(ip(9), 7000), only_peer.clone());
        let node = node(pool_with_aa(), directory);

        let outcome = node
            .blocks
            .admit_block(Some(id_referenced_block()), Some(ip(200)))
            .await;

        assert!(outcome.is_accepted());
        assert_eq!(only_peer.wait_for_requests(1, Duration::from_secs(1)).await, 1);
    }

    #[tokio::test]
    async fn test_failing_peer_does_not_block_acceptance() {
        init_tracing();
        let peer = Arc::new(RecordingPeer::failing());
        let directory = MemoryDirectory::new().with_peer(PeerInfo::new(ip(1), 7000), peer.clone());
        let node = node(MemoryPool::new(), directory);

        let outcome = node
            .blocks
            .admit_block(Some(id_referenced_block()), Some(ip(1)))
            .await;

        assert_eq!(outcome, AdmissionOutcome::Accepted);
        assert_eq!(peer.wait_for_requests(1, Duration::from_secs(1)).await, 1);
        assert_eq!(
            peer.requests(),
            vec![vec![tx_id(0xAA), tx_id(0xBB)]],
            "one aggregate request, no retry"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(peer.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_no_known_peers_still_accepts() {
        init_tracing();
        let node = node(MemoryPool::new(), MemoryDirectory::new());

        let outcome = node
            .blocks
            .admit_block(Some(id_referenced_block()), None)
            .await;

        assert_eq!(outcome, AdmissionOutcome::Accepted);
        assert_eq!(node.metrics.snapshot().peer_fetches_issued, 0);
        assert!(matches!(
            node.ledger.queued()[0].completion,
            Completion::IdReferenced { .. }
        ));
    }

    #[tokio::test]
    async fn test_fully_resolved_block_issues_no_fetch() {
        init_tracing();
        let peer = Arc::new(RecordingPeer::new());
        let pool = MemoryPool::with_transactions([
            Transaction::new(tx_id(0xAA)),
            Transaction::new(tx_id(0xBB)),
        ]);
        let node = node(
            pool,
            MemoryDirectory::new().with_peer(PeerInfo::new(ip(1), 7000), peer.clone()),
        );

        let outcome = node
            .blocks
            .admit_block(Some(id_referenced_block()), Some(ip(1)))
            .await;

        assert_eq!(outcome, AdmissionOutcome::Accepted);
        assert_eq!(peer.wait_for_requests(1, Duration::from_millis(50)).await, 0);
    }

    // =============================================================================
    // TRANSACTION RELAY LOOP
    // =============================================================================

    /// Relay that delivers to another node's admission API, flagged as relayed.
    struct ForwardingRelay {
        target: Arc<dyn TransactionAdmissionApi>,
    }

    #[async_trait]
    impl TransactionRelay for ForwardingRelay {
        async fn broadcast(&self, transactions: Vec<Transaction>) -> Result<(), CollaboratorError> {
            self.target
                .admit_transactions(Some(transactions), true)
                .await
                .map(|_| ())
                .map_err(|e| CollaboratorError::Rejected(e.to_string()))
        }
    }

    #[tokio::test]
    async fn test_relayed_batch_is_not_relayed_again() {
        init_tracing();
        let everything = GuardPartition {
            accept: vec![tx_id(1)],
            broadcast: vec![tx_id(1)],
            invalid: vec![],
        };

        let ledger_b = Arc::new(MemoryLedger::new());
        let relay_b = Arc::new(RecordingRelay::new());
        let metrics_b = Arc::new(AdmissionMetrics::new());
        let node_b: Arc<dyn TransactionAdmissionApi> = Arc::new(TransactionAdmissionService::new(
            ledger_b.clone(),
            Arc::new(ScriptedGuard::new(everything.clone())),
            relay_b.clone(),
            metrics_b.clone(),
        ));

        let ledger_a = Arc::new(MemoryLedger::new());
        let node_a = TransactionAdmissionService::new(
            ledger_a.clone(),
            Arc::new(ScriptedGuard::new(everything)),
            Arc::new(ForwardingRelay { target: node_b }),
            Arc::new(AdmissionMetrics::new()),
        );

        let report = timeout(
            Duration::from_secs(1),
            node_a.admit_transactions(Some(vec![Transaction::new(tx_id(1))]), false),
        )
        .await
        .expect("relay loop did not terminate")
        .unwrap();

        assert_eq!(report.accepted, vec![tx_id(1)]);
        assert_eq!(ledger_a.posted(), vec![vec![tx_id(1)]]);
        assert_eq!(ledger_b.posted(), vec![vec![tx_id(1)]]);
        assert!(relay_b.broadcasts().is_empty());
        assert_eq!(metrics_b.snapshot().rebroadcasts_suppressed, 1);
    }

    // =============================================================================
    // HTTP TRANSPORT
    // =============================================================================

    #[tokio::test]
    async fn test_block_flow_over_http() {
        use axum::body::Body;
        use axum::extract::connect_info::MockConnectInfo;
        use axum::http::{header, Method, Request};
        use http_body_util::BodyExt;
        use serde_json::{json, Value};
        use tower::ServiceExt;

        init_tracing();
        let peer = Arc::new(RecordingPeer::new());
        let directory = Arc::new(
            MemoryDirectory::new().with_peer(PeerInfo::new(ip(1), 7000), peer.clone()),
        );
        let pool = Arc::new(pool_with_aa());
        let ledger = Arc::new(MemoryLedger::new());
        let metrics = Arc::new(AdmissionMetrics::new());
        let config = AdmissionConfig::default();

        let state = AppState {
            blocks: Arc::new(BlockAdmissionService::new(
                ledger.clone(),
                BlockCompletionResolver::new(
                    pool.clone(),
                    Arc::new(StaticVerifier::accepting()),
                    directory.clone(),
                    metrics.clone(),
                    config.max_block_transactions,
                ),
                metrics.clone(),
            )),
            transactions: Arc::new(TransactionAdmissionService::new(
                ledger.clone(),
                Arc::new(ScriptedGuard::new(GuardPartition::default())),
                Arc::new(RecordingRelay::new()),
                metrics.clone(),
            )),
            queries: Arc::new(PeerQueryService::new(
                ledger.clone(),
                pool,
                directory,
                Arc::new(MemoryChainStore::new()),
                metrics,
                config,
            )),
        };
        let app = router(state).layer(MockConnectInfo(SocketAddr::new(ip(1), 40_001)));

        let body = json!({
            "block": {
                "height": 101,
                "id": "B1",
                "numberOfTransactions": 2,
                "transactionIds": [tx_id(0xAA), tx_id(0xBB)]
            }
        });
        let request = Request::builder()
            .method(Method::POST)
            .uri("/peer/blocks")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let response: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(response, json!({"success": true}));
        assert_eq!(peer.wait_for_requests(1, Duration::from_secs(1)).await, 1);
        assert_eq!(peer.requests(), vec![vec![tx_id(0xBB)]]);

        let status = app
            .oneshot(Request::builder().uri("/peer/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = status.into_body().collect().await.unwrap().to_bytes();
        let status: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(status["success"], json!(true));
        assert_eq!(status["metrics"]["blocksAccepted"], json!(1));
        assert_eq!(status["metrics"]["peerFetchesIssued"], json!(1));
    }
}
