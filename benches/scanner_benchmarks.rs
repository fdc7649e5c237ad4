// benches/scanner_benchmarks.rs
use criterion::{criterion_group, criterion_main, Criterion};
use std::{hint::black_box, time::Duration};
use tokio::runtime::Runtime;

use storefront_audit::{
    domain::snapshot::PageSnapshot,
    service::{
        classifier::IssueClassifier,
        scanner::{ContentScanner, ConversionScanner, SeoScanner, TrustScanner, UxScanner},
        PlatformDetector,
    },
    test_utils::fixtures::WELL_FORMED_STORE_HTML,
};

fn snapshot() -> PageSnapshot {
    PageSnapshot::from_html(
        "https://demo-store.myshopify.com/products/merino-sneaker",
        WELL_FORMED_STORE_HTML,
    )
}

fn bench_content_scanners(c: &mut Criterion) {
    let snapshot = snapshot();

    c.bench_function("content_scanners_well_formed_store", |b| {
        b.iter(|| {
            let seo = SeoScanner::new().scan(black_box(&snapshot));
            let ux = UxScanner::new().scan(black_box(&snapshot));
            let conversion = ConversionScanner::new().scan(black_box(&snapshot));
            let trust = TrustScanner::new().scan(black_box(&snapshot));
            let drafts = seo
                .issues
                .into_iter()
                .chain(ux.issues)
                .chain(conversion.issues)
                .chain(trust.issues)
                .collect();
            black_box(IssueClassifier::classify(drafts))
        });
    });

    c.bench_function("platform_detect_well_formed_store", |b| {
        b.iter(|| black_box(PlatformDetector::detect(black_box(&snapshot))));
    });
}

fn bench_blocking_pool(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let snapshot = std::sync::Arc::new(snapshot());

    c.bench_function("seo_scan_on_blocking_pool", |b| {
        b.to_async(&rt).iter(|| {
            let snapshot = snapshot.clone();
            async move {
                let output = tokio::task::spawn_blocking(move || SeoScanner::new().scan(&snapshot))
                    .await
                    .expect("Failed");
                black_box(output)
            }
        });
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .sample_size(20)
        .measurement_time(Duration::from_secs(5));
    targets = bench_content_scanners, bench_blocking_pool
}

criterion_main!(benches);
