use objcache_core::{Entry, EntryCodec, KeyNamespace, PayloadRegistry};
use criterion::{criterion_group, criterion_main, Criterion};
use serde::{Deserialize, Serialize};
use std::hint::black_box;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RenderedPage {
    path: String,
    html: String,
    status: u16,
}

fn bench_codec() -> EntryCodec {
    let registry = PayloadRegistry::new()
        .with_type::<RenderedPage>("rendered-page")
        .expect("register payload type");
    EntryCodec::new(registry)
}

fn bench_entry_roundtrip(c: &mut Criterion) {
    let codec = bench_codec();
    let entry = Entry::new(
        RenderedPage {
            path: "/products/42".to_string(),
            html: include_str!("../src/codec.rs").to_string(),
            status: 200,
        },
        Duration::from_secs(300),
        Duration::from_secs(60),
    );
    let record = codec.encode(&entry).expect("encode entry");

    c.bench_function("codec/encode_page", |b| {
        b.iter(|| {
            let bytes = codec.encode(black_box(&entry)).expect("encode entry");
            black_box(bytes.len());
        });
    });

    c.bench_function("codec/decode_page", |b| {
        b.iter(|| {
            let decoded = codec.decode(black_box(&record)).expect("decode entry");
            black_box(decoded.meta.lifetime);
        });
    });
}

fn bench_namespace_path(c: &mut Criterion) {
    let ns = KeyNamespace::new("frontend/pages");

    c.bench_function("namespace/path_unsafe_key", |b| {
        b.iter(|| {
            let path = ns.path(black_box("products/42?lang=en&page=2"));
            black_box(path);
        });
    });
}

criterion_group!(benches, bench_entry_roundtrip, bench_namespace_path);
criterion_main!(benches);
