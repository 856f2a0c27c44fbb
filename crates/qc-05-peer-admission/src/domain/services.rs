//! Domain services for block admission.

use super::CandidateBlock;

/// Shape of a candidate block, decided from its declared count alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockShape {
    /// No transactions, or full payloads matching the declared count
    SelfContained,
    /// Transaction ids matching the declared count
    IdReferenced,
    /// Declared count matches neither payloads nor ids
    Malformed,
}

/// Classify a candidate block.
///
/// Checked in order:
/// 1. `number_of_transactions == 0`, or payloads present with matching length
/// 2. ids present with matching length
/// 3. anything else
pub fn classify_block(block: &CandidateBlock) -> BlockShape {
    let declared = block.number_of_transactions;

    let payloads_match = block
        .transactions
        .as_ref()
        .is_some_and(|txs| txs.len() as u64 == declared);
    if declared == 0 || payloads_match {
        return BlockShape::SelfContained;
    }

    let ids_match = block
        .transaction_ids
        .as_ref()
        .is_some_and(|ids| ids.len() as u64 == declared);
    if ids_match {
        return BlockShape::IdReferenced;
    }

    BlockShape::Malformed
}

/// Check the declared transaction count against the configured ceiling.
pub fn within_transaction_limit(block: &CandidateBlock, max_block_transactions: u64) -> bool {
    block.number_of_transactions <= max_block_transactions
}
