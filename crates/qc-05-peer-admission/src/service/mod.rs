//! Application services.
//!
//! - [`BlockCompletionResolver`] classifies a candidate block and resolves
//!   id references against the pool
//! - [`BlockAdmissionService`] and [`TransactionAdmissionService`] are the
//!   admission boundaries
//! - [`PeerQueryService`] serves the read-only sync queries

pub mod block_admission;
pub mod peer_fallback;
pub mod queries;
pub mod resolver;
pub mod transaction_admission;

pub use block_admission::BlockAdmissionService;
pub use peer_fallback::{select_peer, PeerSelection};
pub use queries::PeerQueryService;
pub use resolver::BlockCompletionResolver;
pub use transaction_admission::TransactionAdmissionService;
