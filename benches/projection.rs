//! Decoration Projection Benchmarks
//!
//! Run with: `cargo bench --bench projection`

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use cataloger_server::annotations::{AnnotationStore, BibliographyType, NewAnnotation, Span};
use cataloger_server::decorations::{project, render_markup, MarkupConfig, Projector, StyleTable};

const DOCUMENT_LEN: usize = 50_000;

fn populated_store(count: usize) -> AnnotationStore {
    let mut store = AnnotationStore::for_document("bench");
    for i in 0..count {
        let start = (i * 37) % DOCUMENT_LEN;
        // Some spans run past the end to exercise clamping
        let end = start + 5 + (i % 40);
        let kind = BibliographyType::ALL[i % BibliographyType::ALL.len()];
        store.add(NewAnnotation::new(Span::new(start, end), kind, ""));
    }
    store
}

fn bench_project(c: &mut Criterion) {
    let styles = StyleTable::default();
    let mut group = c.benchmark_group("project");

    for count in [100usize, 1_000, 10_000] {
        let store = populated_store(count);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("full", count), &store, |b, store| {
            b.iter(|| project(black_box(store.as_slice()), DOCUMENT_LEN, &styles, None))
        });

        group.bench_with_input(BenchmarkId::new("viewport", count), &store, |b, store| {
            b.iter(|| {
                project(
                    black_box(store.as_slice()),
                    DOCUMENT_LEN,
                    &styles,
                    Some(10_000..12_000),
                )
            })
        });
    }

    group.finish();
}

fn bench_projector_cache(c: &mut Criterion) {
    let store = populated_store(1_000);
    let mut projector = Projector::new(Arc::new(StyleTable::default()));

    c.bench_function("projector_cached", |b| {
        b.iter(|| projector.decorations(black_box(&store), DOCUMENT_LEN, None))
    });
}

fn bench_markup(c: &mut Criterion) {
    let text: String = "བཀྲ་ཤིས་".chars().cycle().take(DOCUMENT_LEN).collect();
    let store = populated_store(500);
    let decorations = project(store.as_slice(), DOCUMENT_LEN, &StyleTable::default(), None);
    let config = MarkupConfig::default();

    c.bench_function("render_markup", |b| {
        b.iter(|| render_markup(black_box(&text), &decorations, &config))
    });
}

criterion_group!(benches, bench_project, bench_projector_cache, bench_markup);
criterion_main!(benches);
