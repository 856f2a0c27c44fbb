//! # Peer Admission Benchmarks
//!
//! | Path | Claim | Target |
//! |------|-------|--------|
//! | Query id parsing | Work bounded by the cap, not the input length | flat across input sizes |
//! | Block classification | O(1) shape check | < 1µs |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use qc_05_peer_admission::testing::tx_id;
use qc_05_peer_admission::{
    classify_block, parse_common_block_ids, parse_transaction_ids, AdmissionConfig,
    CandidateBlock, TransactionId,
};

fn bench_query_id_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-05-query-ids");
    let config = AdmissionConfig::default();

    // Padding past the cap must not change cost
    for entries in [10usize, 1_000, 100_000] {
        let heights = (0..entries).map(|i| i.to_string()).collect::<Vec<_>>().join(",");
        let ids = (0..entries)
            .map(|i| tx_id((i % 256) as u8).to_string())
            .collect::<Vec<_>>()
            .join(",");

        group.bench_with_input(
            BenchmarkId::new("common_block_ids", entries),
            &heights,
            |b, raw| b.iter(|| black_box(parse_common_block_ids(raw, config.max_common_block_ids))),
        );
        group.bench_with_input(
            BenchmarkId::new("transaction_ids", entries),
            &ids,
            |b, raw| {
                b.iter(|| black_box(parse_transaction_ids(raw, config.max_transaction_query_ids)))
            },
        );
    }

    group.finish();
}

fn bench_block_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-05-classification");

    let ids: Vec<TransactionId> = (0..1_000u32).map(|i| tx_id((i % 256) as u8)).collect();
    let id_referenced = CandidateBlock::new(1, "B1", 1_000).with_transaction_ids(ids.clone());
    let malformed = CandidateBlock::new(1, "B1", 999).with_transaction_ids(ids);

    group.bench_function("id_referenced", |b| {
        b.iter(|| black_box(classify_block(&id_referenced)))
    });
    group.bench_function("malformed", |b| b.iter(|| black_box(classify_block(&malformed))));

    group.finish();
}

criterion_group!(
    benches,
    bench_query_id_parsing,
    bench_block_classification
);
criterion_main!(benches);
