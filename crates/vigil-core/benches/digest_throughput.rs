use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vigil_core::{digest_reader, ContentDigest};

fn bench_digest(c: &mut Criterion) {
    let payload = vec![42u8; 4 * 1024 * 1024];

    c.bench_function("content_digest_whole_buffer", |b| {
        b.iter(|| ContentDigest::of(black_box(&payload)))
    });

    c.bench_function("content_digest_streamed_64k_chunks", |b| {
        b.iter(|| digest_reader(black_box(payload.as_slice()), 64 * 1024).expect("digest"))
    });
}

criterion_group!(benches, bench_digest);
criterion_main!(benches);
