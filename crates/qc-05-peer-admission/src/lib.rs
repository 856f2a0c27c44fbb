//! # Peer Admission Subsystem (qc-05)
//!
//! Decides whether blocks and transaction batches submitted by peers proceed
//! to the ledger, and serves the read-only queries syncing peers rely on.
//!
//! ## Architecture Role
//!
//! ```text
//! [Peer] ──POST /peer/blocks──→ [Block Admission] ──queue_block──→ [Ledger]
//!                                      │
//!                                      ↓ id-referenced, ids missing locally
//!                               [Peer Fallback] ──one aggregate fetch──→ [Peer]
//!
//! [Peer] ──POST /peer/transactions──→ [Transaction Admission]
//!                                      │ guard: accept / broadcast / invalid
//!                                      ├──post_transactions──→ [Ledger]
//!                                      └──broadcast (unless relayed)──→ [Peers]
//! ```
//!
//! ## Guarantees
//!
//! - Admission never faults: every failure, panics included, is reported as
//!   a rejection and surfaces as `{success: false}`
//! - A missing-transaction fetch is advisory and never gates acceptance
//! - A batch that arrived through a relay is never relayed again

pub mod adapters;
pub mod domain;
pub mod error;
pub mod events;
pub mod ports;
pub mod service;

/// In-memory collaborators for tests and local wiring.
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use domain::*;
pub use error::{AdmissionError, CollaboratorError, ConfigError, RejectReason};
pub use ports::inbound::{BlockAdmissionApi, NodeStatus, PeerQueryApi, TransactionAdmissionApi};
pub use service::{
    BlockAdmissionService, BlockCompletionResolver, PeerQueryService, PeerSelection,
    TransactionAdmissionService,
};
