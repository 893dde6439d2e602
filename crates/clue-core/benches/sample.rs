//! Per-sample cost of the discovery path.
//!
//! Run with: cargo bench -p clue-core

use std::hint::black_box;
use std::time::Instant;

use clue_core::{
    AnalysisConfig, AnalysisSession, Clue, DiscoveryEngine, EvidenceItem, Point, PointerSample,
    SessionDiscoverySet, Tool,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

/// Evidence with `n` clues spread over a grid, tools round-robin.
fn evidence(n: usize) -> EvidenceItem {
    let side = (n as f64).sqrt().ceil().max(1.0);
    (0..n).fold(EvidenceItem::new("bench", ""), |ev, i| {
        let x = (i as f64 % side) / side * 90.0 + 5.0;
        let y = (i as f64 / side).floor() / side * 90.0 + 5.0;
        let tool = Tool::ALL[i % Tool::ALL.len()];
        ev.with_clue(Clue::new(&format!("c{i}"), tool, Point::new(x, y), 3.0))
    })
}

fn bench_evaluate(c: &mut Criterion) {
    let config = AnalysisConfig::default();
    let mut group = c.benchmark_group("evaluate");
    for n in [1, 8, 64] {
        let ev = evidence(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &ev, |b, ev| {
            // misses only, so the session set stays empty
            let sample = PointerSample::new(Point::new(0.5, 99.5), Tool::Magnifier);
            let mut session = SessionDiscoverySet::new();
            b.iter(|| DiscoveryEngine::evaluate(&config, black_box(sample), ev, &mut session));
        });
    }
    group.finish();
}

fn bench_session_submit(c: &mut Criterion) {
    let config = AnalysisConfig::default();
    let mut ev = evidence(8);
    let mut session = AnalysisSession::open(&ev);
    let now = Instant::now();
    let mut t = 0.0f64;
    c.bench_function("session_submit", |b| {
        b.iter(|| {
            t = (t + 0.37) % 100.0;
            session.submit(&config, &mut ev, black_box(Point::new(t, 100.0 - t)), now)
        })
    });
}

criterion_group!(benches, bench_evaluate, bench_session_submit);
criterion_main!(benches);
