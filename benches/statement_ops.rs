//! Benchmarks for statement handling and the in-memory document backend.

use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use lingua_kb::config::KbConfig;
use lingua_kb::session::KnowledgeBase;
use lingua_kb::statement::{classify, negate, split};
use lingua_kb::store::mem::MemDocumentStore;

fn bench_split(c: &mut Criterion) {
    let text = "(not (red has-color (ball1 of (box 3))))";
    c.bench_function("split_nested", |bench| {
        bench.iter(|| black_box(split(black_box(text)).unwrap()))
    });
}

fn bench_classify(c: &mut Criterion) {
    c.bench_function("classify_relation_query", |bench| {
        bench.iter(|| black_box(classify(black_box("(!? has-color ball1)")).unwrap()))
    });
    c.bench_function("classify_double_negation", |bench| {
        bench.iter(|| black_box(classify(black_box("(not (not (ball ball1)))")).unwrap()))
    });
}

fn bench_negate(c: &mut Criterion) {
    c.bench_function("negate_round_trip", |bench| {
        bench.iter(|| {
            let once = negate(black_box("(red has-color ball1)")).unwrap();
            black_box(negate(&once).unwrap())
        })
    });
}

fn bench_document_ask(c: &mut Criterion) {
    let mut kb = KnowledgeBase::document(Arc::new(MemDocumentStore::new()), &KbConfig::default());
    for i in 0..1000 {
        kb.tell(&format!("(red has-color ball{i})")).unwrap();
    }

    c.bench_function("document_subject_query_1k", |bench| {
        bench.iter(|| {
            // A tell between asks keeps the cache cold.
            kb.tell("(ball ball0)").unwrap();
            black_box(kb.ask("(red has-color ?)").unwrap())
        })
    });
}

criterion_group!(
    benches,
    bench_split,
    bench_classify,
    bench_negate,
    bench_document_ask
);
criterion_main!(benches);
