//! Value objects for admission configuration, results and counters.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;

use super::TransactionId;
use crate::error::{ConfigError, RejectReason};

/// Admission configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Maximum `ids` entries accepted by the common-block lookup
    pub max_common_block_ids: usize,
    /// Maximum `ids` entries accepted by the transaction-by-id lookup
    pub max_transaction_query_ids: usize,
    /// Declared transaction count above which a block is malformed
    pub max_block_transactions: u64,
    /// Maximum blocks returned by a range fetch
    pub max_blocks_per_query: usize,
    /// Bind address of the peer transport
    pub listen_addr: SocketAddr,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_common_block_ids: 9,
            max_transaction_query_ids: 100,
            max_block_transactions: 10_000,
            max_blocks_per_query: 34,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 7000)),
        }
    }
}

impl AdmissionConfig {
    /// Environment variable prefix for overrides.
    pub const ENV_PREFIX: &'static str = "QC_ADMISSION_";

    /// Validate limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_common_block_ids == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_common_block_ids cannot be 0".into(),
            ));
        }
        if self.max_transaction_query_ids == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_transaction_query_ids cannot be 0".into(),
            ));
        }
        if self.max_block_transactions == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_block_transactions cannot be 0".into(),
            ));
        }
        if self.max_blocks_per_query == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_blocks_per_query cannot be 0".into(),
            ));
        }
        Ok(())
    }

    /// Defaults overlaid with `QC_ADMISSION_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`, keyed by full variable name.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let read = |name: &str| {
            let key = format!("{}{}", Self::ENV_PREFIX, name);
            lookup(&key).map(|value| (key, value))
        };

        if let Some((key, value)) = read("MAX_COMMON_BLOCK_IDS") {
            config.max_common_block_ids = parse_env(&key, &value)?;
        }
        if let Some((key, value)) = read("MAX_TRANSACTION_QUERY_IDS") {
            config.max_transaction_query_ids = parse_env(&key, &value)?;
        }
        if let Some((key, value)) = read("MAX_BLOCK_TRANSACTIONS") {
            config.max_block_transactions = parse_env(&key, &value)?;
        }
        if let Some((key, value)) = read("MAX_BLOCKS_PER_QUERY") {
            config.max_blocks_per_query = parse_env(&key, &value)?;
        }
        if let Some((key, value)) = read("LISTEN_ADDR") {
            config.listen_addr = parse_env(&key, &value)?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Transaction ids a block references but the local pool could not supply.
///
/// Keeps declaration order and drops duplicates. Membership checks are
/// constant time, so blocks declaring thousands of ids stay linear.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MissingTransactionSet {
    ids: Vec<TransactionId>,
    seen: HashSet<TransactionId>,
}

impl MissingTransactionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a missing id. Returns `false` if it was already recorded.
    pub fn insert(&mut self, id: TransactionId) -> bool {
        if !self.seen.insert(id.clone()) {
            return false;
        }
        self.ids.push(id);
        true
    }

    pub fn contains(&self, id: &TransactionId) -> bool {
        self.seen.contains(id)
    }

    pub fn ids(&self) -> &[TransactionId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<TransactionId> for MissingTransactionSet {
    fn from_iter<I: IntoIterator<Item = TransactionId>>(iter: I) -> Self {
        let mut set = Self::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

/// Three-way partition of a submitted batch produced by the validation guard.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GuardPartition {
    /// Valid, apply locally
    pub accept: Vec<TransactionId>,
    /// Valid, propagate to peers
    pub broadcast: Vec<TransactionId>,
    /// Rejected
    pub invalid: Vec<TransactionId>,
}

/// Result of a block admission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdmissionOutcome {
    Accepted,
    Rejected(RejectReason),
}

impl AdmissionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, AdmissionOutcome::Accepted)
    }
}

/// Result of a transaction batch admission.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReport {
    /// Ids the guard accepted. Invalid entries are never reported.
    #[serde(rename = "transactionIds")]
    pub accepted: Vec<TransactionId>,
}

/// Admission counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub blocks_accepted: u64,
    pub blocks_rejected: HashMap<RejectReason, u64>,
    pub peer_fetches_issued: u64,
    pub transactions_accepted: u64,
    pub batches_rebroadcast: u64,
    pub rebroadcasts_suppressed: u64,
}

/// Shared admission metrics.
#[derive(Debug, Default)]
pub struct AdmissionMetrics {
    inner: RwLock<MetricsSnapshot>,
}

impl AdmissionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_block(&self, outcome: AdmissionOutcome) {
        let mut metrics = self.inner.write();
        match outcome {
            AdmissionOutcome::Accepted => metrics.blocks_accepted += 1,
            AdmissionOutcome::Rejected(reason) => {
                *metrics.blocks_rejected.entry(reason).or_insert(0) += 1;
            }
        }
    }

    pub fn record_peer_fetch(&self) {
        self.inner.write().peer_fetches_issued += 1;
    }

    pub fn record_transactions_accepted(&self, count: usize) {
        self.inner.write().transactions_accepted += count as u64;
    }

    pub fn record_rebroadcast(&self) {
        self.inner.write().batches_rebroadcast += 1;
    }

    pub fn record_rebroadcast_suppressed(&self) {
        self.inner.write().rebroadcasts_suppressed += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.read().clone()
    }
}
