//! # Quantum-Chain Peer Admission Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Admission hot paths under adversarial input
//! └── src/integration/  # End-to-end admission flows across collaborators
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p qc-tests
//! cargo test -p qc-tests integration::
//! cargo bench -p qc-tests
//! ```

pub mod integration;
