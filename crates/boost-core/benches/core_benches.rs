//! Criterion benchmarks for boost-core hot paths.
//!
//! Covers: quote lookup, per-loan scoring, distribution over a large
//! universe, and payload encoding.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use boost_core::price::{DataPoint, PriceBundle, SignedDataPackage, SIGNATURE_LEN};
use boost_core::types::{EligibilityResult, LoanAddress, LoanRecord};
use boost_core::{distribute, score};

fn bundle() -> PriceBundle {
    let packages = (0..3)
        .map(|i| SignedDataPackage {
            timestamp_milliseconds: 1_700_000_000_000,
            data_points: vec![
                DataPoint { data_feed_id: "GLP".into(), value: 1.0 + i as f64 * 0.01 },
                DataPoint { data_feed_id: "ETH".into(), value: 2_000.0 },
                DataPoint { data_feed_id: "AVAX".into(), value: 30.0 },
            ],
            signature: vec![0xAB; SIGNATURE_LEN],
            signer_address: None,
        })
        .collect();
    PriceBundle::new(packages)
}

fn bench_score(c: &mut Criterion) {
    let bundle = bundle();
    let loan = LoanRecord {
        address: LoanAddress::from_bytes([0x11; 20]),
        raw_collateral: 10_000.0,
        raw_debt: 2_000.0,
        tracked_asset_balance: 12_000.0,
    };

    c.bench_function("score_loan", |b| {
        b.iter(|| score(black_box(&loan), black_box(&bundle), black_box("GLP")))
    });
}

fn bench_distribute(c: &mut Criterion) {
    let results: Vec<EligibilityResult> = (0..10_000)
        .map(|i| EligibilityResult { loan_id: format!("loan-{i}"), eligible_tvl: (i % 97) as f64 * 13.5 })
        .collect();
    let total: f64 = results.iter().map(|r| r.eligible_tvl).sum();

    c.bench_function("distribute_10k_loans", |b| {
        b.iter(|| distribute(black_box(&results), black_box(total), 125.0, 3, 1_700_000_000))
    });
}

fn bench_payload(c: &mut Criterion) {
    let bundle = bundle();

    c.bench_function("bundle_payload", |b| b.iter(|| black_box(&bundle).payload()));
}

criterion_group!(benches, bench_score, bench_distribute, bench_payload);
criterion_main!(benches);
