//! Criterion benchmarks for the annomesh JSON codec.
//!
//! Pointer and move messages are sent many times per second while drawing,
//! and full syncs are the largest frames a joiner ever receives.
//!
//! Run with:
//! ```bash
//! cargo bench --package annomesh-core --bench codec_bench
//! ```

use annomesh_core::protocol::codec::{decode_message, encode_message};
use annomesh_core::{AnnotationElement, MessageBody, Point, Style, Tool, WireMessage};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

// ── Message fixtures ──────────────────────────────────────────────────────────

fn make_move() -> WireMessage {
    WireMessage::new(
        "K7M2P",
        MessageBody::AnnotationMove {
            id: "K7M2P-1700000000000-42".into(),
            tool: Tool::Pencil,
            x: 0.4821,
            y: 0.2277,
        },
    )
}

fn make_stroke(i: usize, points: usize) -> AnnotationElement {
    let mut e = AnnotationElement::begin(
        format!("K7M2P-1700000000000-{i}"),
        Tool::Pencil,
        Style::stroke("#FF3B30", 4.0),
        Point::new(0.1, 0.1),
    );
    for p in 0..points {
        let t = p as f64 / points as f64;
        e.extend(Point::new(t, 1.0 - t));
    }
    e.is_active = false;
    e
}

fn make_sync(elements: usize) -> WireMessage {
    WireMessage::new(
        "K7M2P",
        MessageBody::AnnotationSync {
            elements: (0..elements).map(|i| make_stroke(i, 64)).collect(),
            history_step: elements,
        },
    )
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_move(c: &mut Criterion) {
    let msg = make_move();
    let frame = encode_message(&msg).expect("encode");
    c.bench_function("encode_annotation_move", |b| {
        b.iter(|| encode_message(black_box(&msg)))
    });
    c.bench_function("decode_annotation_move", |b| {
        b.iter(|| decode_message(black_box(&frame)))
    });
}

fn bench_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("annotation_sync");
    for size in [10usize, 100, 500] {
        let msg = make_sync(size);
        let frame = encode_message(&msg).expect("encode");
        group.bench_with_input(BenchmarkId::new("encode", size), &msg, |b, m| {
            b.iter(|| encode_message(black_box(m)))
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &frame, |b, f| {
            b.iter(|| decode_message(black_box(f)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_move, bench_sync);
criterion_main!(benches);
