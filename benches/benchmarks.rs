use criterion::{black_box, criterion_group, criterion_main, Criterion};

use std::sync::Arc;

use cas::constants::*;
use cas::*;

/// A document of `n` tokens of five characters each, grouped into sentences of ten tokens
fn build_cas(n: i64) -> Cas {
    let ts = TypeSystem::default()
        .with_type(
            "bench.Token",
            Some(TYPE_NAME_ANNOTATION),
            vec![FeatureDescription::new("pos", TYPE_NAME_STRING)],
        )
        .unwrap()
        .with_type("bench.Sentence", Some(TYPE_NAME_ANNOTATION), vec![])
        .unwrap();
    let mut cas = Cas::new(Arc::new(ts));
    cas.set_sofa_string("abcd ".repeat(n as usize)).unwrap();
    for i in 0..n {
        cas.add_annotation(
            FeatureStructureBuilder::new("bench.Token")
                .with_span(i * 5, i * 5 + 4)
                .with_feature("pos", "X"),
        )
        .unwrap();
        if i % 10 == 0 {
            cas.add_annotation(
                FeatureStructureBuilder::new("bench.Sentence").with_span(i * 5, (i + 10) * 5 - 1),
            )
            .unwrap();
        }
    }
    cas
}

pub fn bench_select(c: &mut Criterion) {
    let cas = build_cas(10_000);
    let sentences: Vec<FeatureStructureHandle> =
        cas.select("bench.Sentence").unwrap().handles().collect();

    c.bench_function("select_all_tokens", |b| {
        b.iter(|| {
            let count = black_box(cas.select("bench.Token").unwrap()).count();
            assert_eq!(count, 10_000);
        })
    });

    c.bench_function("select_covered_per_sentence", |b| {
        b.iter(|| {
            let mut count = 0;
            for sentence in sentences.iter() {
                count += black_box(cas.select_covered("bench.Token", *sentence).unwrap()).count();
            }
            assert_eq!(count, 10_000);
        })
    });

    c.bench_function("select_covering_token", |b| {
        let token = cas.select("bench.Token").unwrap().handles().nth(5_000).unwrap();
        b.iter(|| {
            let count = black_box(cas.select_covering("bench.Sentence", token).unwrap()).count();
            assert_eq!(count, 1);
        })
    });
}

pub fn bench_json(c: &mut Criterion) {
    let cas = build_cas(10_000);
    let typesystem = cas.typesystem().clone();
    let json = cas.to_json(None, false).unwrap().unwrap();

    c.bench_function("to_json", |b| {
        b.iter(|| {
            let json = black_box(cas.to_json(None, false).unwrap());
            assert!(json.is_some());
        })
    });

    c.bench_function("from_json", |b| {
        b.iter(|| {
            let cas = load_cas_from_json(black_box(&json), Some(typesystem.clone())).unwrap();
            assert_eq!(cas.featurestructures_len(), 11_001);
        })
    });
}

criterion_group!(benches, bench_select, bench_json);
criterion_main!(benches);
