//! In-memory collaborators.
//!
//! Implementations of every outbound port that keep their state in memory and
//! record each call, for unit tests, the integration suite and local wiring.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::domain::{
    CandidateBlock, FetchedTransaction, GuardPartition, LastBlock, PeerInfo, ResolvedBlock,
    Transaction, TransactionId,
};
use crate::error::CollaboratorError;
use crate::ports::{
    BlockVerifier, ChainStore, Ledger, PeerClient, PeerDirectory, PeerHandle, TransactionGuard,
    TransactionPool, TransactionRelay,
};

/// Transaction id built from a repeated byte.
pub fn tx_id(byte: u8) -> TransactionId {
    TransactionId::from_bytes([byte; 16])
}

/// Ledger that records queued blocks and applied transactions.
#[derive(Default)]
pub struct MemoryLedger {
    ready: AtomicBool,
    fail_queue: AtomicBool,
    last_block: Mutex<Option<LastBlock>>,
    queued: Mutex<Vec<ResolvedBlock>>,
    posted: Mutex<Vec<Vec<TransactionId>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(true),
            ..Default::default()
        }
    }

    /// Ledger still loading.
    pub fn loading() -> Self {
        Self::default()
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn set_last_block(&self, block: LastBlock) {
        *self.last_block.lock() = Some(block);
    }

    /// Make every subsequent `queue_block` fail.
    pub fn fail_queue(&self) {
        self.fail_queue.store(true, Ordering::SeqCst);
    }

    pub fn queued(&self) -> Vec<ResolvedBlock> {
        self.queued.lock().clone()
    }

    pub fn posted(&self) -> Vec<Vec<TransactionId>> {
        self.posted.lock().clone()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn get_last_block(
        &self,
        _detailed: bool,
    ) -> Result<Option<LastBlock>, CollaboratorError> {
        Ok(self.last_block.lock().clone())
    }

    async fn queue_block(&self, block: ResolvedBlock) -> Result<(), CollaboratorError> {
        if self.fail_queue.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Internal("queue closed".into()));
        }
        self.queued.lock().push(block);
        Ok(())
    }

    async fn post_transactions(&self, ids: Vec<TransactionId>) -> Result<(), CollaboratorError> {
        self.posted.lock().push(ids);
        Ok(())
    }
}

/// Transaction pool backed by a map, recording lookup order.
#[derive(Default)]
pub struct MemoryPool {
    unavailable: AtomicBool,
    transactions: Mutex<HashMap<TransactionId, Transaction>>,
    lookups: Mutex<Vec<TransactionId>>,
}

impl MemoryPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transactions(transactions: impl IntoIterator<Item = Transaction>) -> Self {
        let pool = Self::new();
        for tx in transactions {
            pool.insert(tx);
        }
        pool
    }

    pub fn insert(&self, tx: Transaction) {
        self.transactions.lock().insert(tx.id.clone(), tx);
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub fn lookups(&self) -> Vec<TransactionId> {
        self.lookups.lock().clone()
    }
}

#[async_trait]
impl TransactionPool for MemoryPool {
    fn is_available(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }

    async fn get_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<Option<Transaction>, CollaboratorError> {
        self.lookups.lock().push(id.clone());
        Ok(self.transactions.lock().get(id).cloned())
    }
}

/// Guard returning a preset partition and counting invocations.
pub struct ScriptedGuard {
    result: Result<GuardPartition, CollaboratorError>,
    calls: AtomicUsize,
    batches: Mutex<Vec<Vec<TransactionId>>>,
}

impl ScriptedGuard {
    pub fn new(partition: GuardPartition) -> Self {
        Self {
            result: Ok(partition),
            calls: AtomicUsize::new(0),
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: CollaboratorError) -> Self {
        Self {
            result: Err(err),
            calls: AtomicUsize::new(0),
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn batches(&self) -> Vec<Vec<TransactionId>> {
        self.batches.lock().clone()
    }
}

#[async_trait]
impl TransactionGuard for ScriptedGuard {
    async fn validate(&self, batch: &[Transaction]) -> Result<GuardPartition, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batches
            .lock()
            .push(batch.iter().map(|tx| tx.id.clone()).collect());
        self.result.clone()
    }
}

/// Guard accepting and broadcasting every transaction of a batch.
#[derive(Default)]
pub struct PermissiveGuard;

#[async_trait]
impl TransactionGuard for PermissiveGuard {
    async fn validate(&self, batch: &[Transaction]) -> Result<GuardPartition, CollaboratorError> {
        let ids: Vec<TransactionId> = batch.iter().map(|tx| tx.id.clone()).collect();
        Ok(GuardPartition {
            accept: ids.clone(),
            broadcast: ids,
            invalid: Vec::new(),
        })
    }
}

/// Relay recording each outbound broadcast.
#[derive(Default)]
pub struct RecordingRelay {
    fail: AtomicBool,
    broadcasts: Mutex<Vec<Vec<Transaction>>>,
}

impl RecordingRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn broadcasts(&self) -> Vec<Vec<Transaction>> {
        self.broadcasts.lock().clone()
    }
}

#[async_trait]
impl TransactionRelay for RecordingRelay {
    async fn broadcast(&self, transactions: Vec<Transaction>) -> Result<(), CollaboratorError> {
        self.broadcasts.lock().push(transactions);
        if self.fail.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable("no peers".into()));
        }
        Ok(())
    }
}

/// Verifier returning a fixed verdict.
pub struct StaticVerifier {
    verdict: Result<bool, CollaboratorError>,
    calls: AtomicUsize,
}

impl StaticVerifier {
    pub fn accepting() -> Self {
        Self::with_verdict(Ok(true))
    }

    pub fn rejecting() -> Self {
        Self::with_verdict(Ok(false))
    }

    pub fn with_verdict(verdict: Result<bool, CollaboratorError>) -> Self {
        Self {
            verdict,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlockVerifier for StaticVerifier {
    async fn verify_block(&self, _block: &CandidateBlock) -> Result<bool, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.verdict.clone()
    }
}

/// Peer answering from a fixed set of transactions, recording each request.
#[derive(Default)]
pub struct RecordingPeer {
    known: HashMap<TransactionId, Transaction>,
    fail: bool,
    requests: Mutex<Vec<Vec<TransactionId>>>,
    notify: Notify,
}

impl RecordingPeer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn knowing(transactions: impl IntoIterator<Item = Transaction>) -> Self {
        Self {
            known: transactions
                .into_iter()
                .map(|tx| (tx.id.clone(), tx))
                .collect(),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<Vec<TransactionId>> {
        self.requests.lock().clone()
    }

    /// Wait until at least `count` requests were received or `timeout` elapses.
    /// Returns the number of requests seen.
    pub async fn wait_for_requests(&self, count: usize, timeout: Duration) -> usize {
        let _ = tokio::time::timeout(timeout, async {
            loop {
                let notified = self.notify.notified();
                if self.requests.lock().len() >= count {
                    return;
                }
                notified.await;
            }
        })
        .await;
        self.requests.lock().len()
    }
}

#[async_trait]
impl PeerClient for RecordingPeer {
    async fn get_transactions_from_ids(
        &self,
        ids: &[TransactionId],
    ) -> Result<Vec<FetchedTransaction>, CollaboratorError> {
        self.requests.lock().push(ids.to_vec());
        self.notify.notify_waiters();
        if self.fail {
            return Err(CollaboratorError::Timeout);
        }
        Ok(ids
            .iter()
            .map(|id| match self.known.get(id) {
                Some(tx) => FetchedTransaction::Payload(tx.clone()),
                None => FetchedTransaction::Unresolved(id.clone()),
            })
            .collect())
    }
}

/// Peer directory over a fixed peer list.
#[derive(Default)]
pub struct MemoryDirectory {
    peers: Vec<PeerHandle>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_peer(mut self, info: PeerInfo, client: Arc<dyn PeerClient>) -> Self {
        self.peers.push(PeerHandle::new(info, client));
        self
    }
}

#[async_trait]
impl PeerDirectory for MemoryDirectory {
    async fn get_peer(&self, ip: IpAddr) -> Result<Option<PeerHandle>, CollaboratorError> {
        Ok(self.peers.iter().find(|p| p.info.ip == ip).cloned())
    }

    async fn get_random_peer(&self) -> Result<Option<PeerHandle>, CollaboratorError> {
        Ok(self.peers.choose(&mut rand::thread_rng()).cloned())
    }

    async fn list_peers(&self) -> Result<Vec<PeerInfo>, CollaboratorError> {
        Ok(self.peers.iter().map(|p| p.info.clone()).collect())
    }
}

/// Chain store over an ordered list of `(height, id, block)` entries.
#[derive(Default)]
pub struct MemoryChainStore {
    blocks: Vec<(u64, String, serde_json::Value)>,
    range_requests: Mutex<Vec<(String, usize)>>,
}

impl MemoryChainStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block(mut self, height: u64, id: &str, block: serde_json::Value) -> Self {
        self.blocks.push((height, id.to_string(), block));
        self
    }

    pub fn range_requests(&self) -> Vec<(String, usize)> {
        self.range_requests.lock().clone()
    }
}

#[async_trait]
impl ChainStore for MemoryChainStore {
    async fn common_block(&self, heights: &[u64]) -> Result<Option<LastBlock>, CollaboratorError> {
        Ok(self
            .blocks
            .iter()
            .filter(|(height, _, _)| heights.contains(height))
            .max_by_key(|(height, _, _)| *height)
            .map(|(height, id, _)| LastBlock {
                height: *height,
                id: id.clone(),
            }))
    }

    async fn blocks_after(
        &self,
        last_block_id: &str,
        limit: usize,
    ) -> Result<Vec<serde_json::Value>, CollaboratorError> {
        self.range_requests
            .lock()
            .push((last_block_id.to_string(), limit));
        let start = self
            .blocks
            .iter()
            .position(|(_, id, _)| id == last_block_id)
            .map_or(0, |i| i + 1);
        Ok(self
            .blocks
            .iter()
            .skip(start)
            .take(limit)
            .map(|(_, _, block)| block.clone())
            .collect())
    }
}
