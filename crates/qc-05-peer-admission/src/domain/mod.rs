//! # Domain Layer for Peer Admission
//!
//! Pure business logic with no I/O dependencies. This is the innermost layer
//! of the hexagonal architecture.
//!
//! ## Contents
//!
//! - **entities**: Submission data (`CandidateBlock`, `Transaction`, `TransactionId`)
//! - **value_objects**: Configuration, results and counters (`AdmissionConfig`,
//!   `MissingTransactionSet`, `GuardPartition`, `AdmissionMetrics`)
//! - **services**: Block shape classification (`classify_block`)
//! - **invariants**: Query id caps for the sync reads

mod entities;
mod invariants;
mod services;
mod value_objects;

pub use entities::*;
pub use invariants::*;
pub use services::*;
pub use value_objects::*;
