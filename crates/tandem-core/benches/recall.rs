use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use serde_json::json;
use tandem_core::{AssociativeMemory, Coordinate, ManualClock};

fn populated(n: u64) -> AssociativeMemory {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let mut memory = AssociativeMemory::new(10_000, clock.clone());
    for i in 0..n {
        clock.advance(17);
        memory.encode(json!({ "i": i }), (i % 97) as f64 / 97.0, 0.0);
    }
    memory
}

fn bench_encode(c: &mut Criterion) {
    c.bench_function("encode_at_capacity", |b| {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let mut memory = AssociativeMemory::new(10_000, clock.clone());
        let mut i = 0u64;
        b.iter(|| {
            clock.advance(3);
            i += 1;
            memory.encode(json!(i), (i % 101) as f64 / 101.0, 0.0)
        })
    });
}

fn bench_recall(c: &mut Criterion) {
    let memory = populated(10_000);
    c.bench_function("recall_by_resonance", |b| {
        b.iter(|| memory.recall_by_resonance(black_box(1.2), black_box(0.1)))
    });
    c.bench_function("recall_by_spatial_proximity", |b| {
        b.iter(|| memory.recall_by_spatial_proximity(black_box(Coordinate::new(0.2, 0.3)), 0.25))
    });
    c.bench_function("traverse_spiral", |b| {
        b.iter(|| memory.traverse_spiral(black_box(1_700_000_000_000), 16))
    });
}

criterion_group!(benches, bench_encode, bench_recall);
criterion_main!(benches);
