//! Validation boundaries for the companion sync queries.
//!
//! Both query parsers cap the number of entries *before* filtering, so a
//! caller cannot make the node look at more than the cap no matter how much
//! garbage it pads the list with.

use super::TransactionId;

/// Parse the `ids` query of a common-block lookup.
///
/// Splits on commas, keeps at most `cap` entries and drops anything that is
/// not a numeric block height.
pub fn parse_common_block_ids(raw: &str, cap: usize) -> Vec<u64> {
    split_ids(raw, cap)
        .filter(|entry| entry.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|entry| entry.parse().ok())
        .collect()
}

/// Parse the `ids` query of a transaction-by-id lookup.
///
/// Splits on commas, keeps at most `cap` entries and drops anything that is
/// not a fixed-length hexadecimal transaction id.
pub fn parse_transaction_ids(raw: &str, cap: usize) -> Vec<TransactionId> {
    split_ids(raw, cap).filter_map(TransactionId::parse).collect()
}

fn split_ids(raw: &str, cap: usize) -> impl Iterator<Item = &str> {
    raw.split(',')
        .take(cap)
        .map(|entry| entry.trim().trim_matches('"').trim_matches('\''))
        .filter(|entry| !entry.is_empty())
}
