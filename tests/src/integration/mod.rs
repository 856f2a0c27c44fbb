//! # Integration Tests
//!
//! Admission flows wired from real services and in-memory collaborators.

pub mod flows;

/// Install a test subscriber once. `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
