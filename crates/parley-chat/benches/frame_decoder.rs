//! Benchmarks for record decoding throughput.
//!
//! Measures `FrameDecoder::push` over a realistic response body split into
//! chunks of various sizes, plus the full decode and interpret path. Small
//! chunks stress delimiter scanning across chunk boundaries; large chunks
//! approximate a fast local backend.

use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use parley_chat::{interpret, FrameDecoder};

/// Build a response body with a few status records and `rows` table rows.
fn generate_body(rows: usize) -> Vec<u8> {
    let mut body = String::new();
    body.push_str("data: {\"phase\":\"parsing\"}\n\n");
    body.push_str("data: {\"phase\":\"querying\"}\n\n");
    body.push_str("data: {\"display_mode\":\"both\"}\n\n");
    body.push_str("data: {\"columns\":[\"id\",\"region\",\"revenue\",\"active\"]}\n\n");
    for i in 0..rows {
        body.push_str(&format!(
            "data: {{\"rows\":[[{},\"region-{}\",{}.{},{}]]}}\n\n",
            i,
            i % 12,
            i * 37,
            i % 100,
            i % 2 == 0
        ));
        if i % 50 == 0 {
            body.push_str(": keep-alive\n\n");
        }
    }
    body.push_str("data: {\"summary\":\"Revenue is concentrated in three regions.\"}\n\n");
    body.into_bytes()
}

fn bench_push_by_chunk_size(c: &mut Criterion) {
    let body = generate_body(1000);

    let mut group = c.benchmark_group("frame_decoder_push");
    group.throughput(Throughput::Bytes(body.len() as u64));
    group.measurement_time(Duration::from_secs(5));

    for chunk_size in [16usize, 256, 4096, 65536] {
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_size),
            &chunk_size,
            |b, &chunk_size| {
                b.iter(|| {
                    let mut decoder = FrameDecoder::default();
                    let mut frames = 0usize;
                    for chunk in body.chunks(chunk_size) {
                        frames += decoder.push(chunk).map(|f| f.len()).unwrap_or(0);
                    }
                    frames += usize::from(decoder.finish().is_some());
                    frames
                });
            },
        );
    }

    group.finish();
}

fn bench_decode_and_interpret(c: &mut Criterion) {
    let body = generate_body(1000);

    let mut group = c.benchmark_group("decode_and_interpret");
    group.throughput(Throughput::Bytes(body.len() as u64));
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("chunk_1024", |b| {
        b.iter(|| {
            let mut decoder = FrameDecoder::default();
            let mut events = 0usize;
            for chunk in body.chunks(1024) {
                for frame in decoder.push(chunk).unwrap_or_default() {
                    events += interpret(&frame).map(|e| e.len()).unwrap_or(0);
                }
            }
            events
        });
    });

    group.finish();
}

criterion_group!(benches, bench_push_by_chunk_size, bench_decode_and_interpret);
criterion_main!(benches);
