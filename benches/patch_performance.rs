//! Benchmarks for filter parsing and patch application.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use scim_patch::{PatchEngine, PatchOperation, PatchRequest, SchemaRegistry};
use scim_patch::filter::{evaluate_filter, parse_filter};
use serde_json::json;

fn bench_filter_parsing(c: &mut Criterion) {
    c.bench_function("parse_simple_filter", |b| {
        b.iter(|| parse_filter(black_box("userName eq \"bjensen\"")).unwrap())
    });

    c.bench_function("parse_complex_filter", |b| {
        b.iter(|| {
            parse_filter(black_box(
                "emails[type eq \"work\"].value sw \"b\" and \
                 (active eq true or not (title pr))",
            ))
            .unwrap()
        })
    });
}

fn bench_filter_evaluation(c: &mut Criterion) {
    let filter = parse_filter("type eq \"work\" and primary eq true").unwrap();
    let array: Vec<_> = (0..100)
        .map(|i| {
            json!({
                "type": if i % 3 == 0 { "work" } else { "home" },
                "value": format!("user{}@example.com", i),
                "primary": i % 10 == 0
            })
        })
        .collect();

    c.bench_function("evaluate_filter_100_members", |b| {
        b.iter(|| evaluate_filter(black_box(&filter), black_box(&array)).unwrap())
    });
}

fn bench_patch_application(c: &mut Criterion) {
    let registry = SchemaRegistry::with_embedded_schemas().unwrap();
    let engine = PatchEngine::new(&registry, "User");
    let resource = json!({
        "userName": "bjensen",
        "name": {"familyName": "Jensen", "givenName": "Barbara"},
        "emails": [
            {"type": "work", "value": "bjensen@example.com", "primary": true},
            {"type": "home", "value": "babs@jensen.org"}
        ]
    });

    let simple = PatchRequest::new(vec![PatchOperation::replace("title", json!("Manager"))]);
    c.bench_function("patch_simple_replace", |b| {
        b.iter(|| engine.apply(black_box(&resource), black_box(&simple)).unwrap())
    });

    let filtered = PatchRequest::new(vec![PatchOperation::replace(
        "emails[type eq \"work\"].value",
        json!("new@example.com"),
    )]);
    c.bench_function("patch_filtered_sub_attribute", |b| {
        b.iter(|| engine.apply(black_box(&resource), black_box(&filtered)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_filter_parsing,
    bench_filter_evaluation,
    bench_patch_application
);
criterion_main!(benches);
