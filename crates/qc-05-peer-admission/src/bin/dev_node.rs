//! # Peer Admission Dev Node
//!
//! Serves the peer transport over in-memory collaborators, for exercising
//! the wire protocol against a live socket without a ledger or pool.
//!
//! ## Configuration
//!
//! `QC_ADMISSION_*` environment variables over defaults, e.g.
//!
//! ```bash
//! QC_ADMISSION_LISTEN_ADDR=127.0.0.1:7000 cargo run -p qc-05-peer-admission --features dev-node
//! ```

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use qc_05_peer_admission::adapters::{serve, AppState};
use qc_05_peer_admission::testing::{
    MemoryChainStore, MemoryDirectory, MemoryLedger, MemoryPool, PermissiveGuard, RecordingRelay,
    StaticVerifier,
};
use qc_05_peer_admission::{
    AdmissionConfig, AdmissionMetrics, BlockAdmissionService, BlockCompletionResolver,
    PeerQueryService, TransactionAdmissionService,
};

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = AdmissionConfig::from_env().context("invalid QC_ADMISSION_* configuration")?;
    let listen_addr = config.listen_addr;

    let ledger = Arc::new(MemoryLedger::new());
    let pool = Arc::new(MemoryPool::new());
    let directory = Arc::new(MemoryDirectory::new());
    let metrics = Arc::new(AdmissionMetrics::new());

    let resolver = BlockCompletionResolver::new(
        pool.clone(),
        Arc::new(StaticVerifier::accepting()),
        directory.clone(),
        metrics.clone(),
        config.max_block_transactions,
    );

    let state = AppState {
        blocks: Arc::new(BlockAdmissionService::new(
            ledger.clone(),
            resolver,
            metrics.clone(),
        )),
        transactions: Arc::new(TransactionAdmissionService::new(
            ledger.clone(),
            Arc::new(PermissiveGuard),
            Arc::new(RecordingRelay::new()),
            metrics.clone(),
        )),
        queries: Arc::new(PeerQueryService::new(
            ledger,
            pool,
            directory,
            Arc::new(MemoryChainStore::new()),
            metrics,
            config,
        )),
    };

    tokio::select! {
        result = serve(state, listen_addr) => result.context("peer transport failed")?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}
