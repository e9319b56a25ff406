//! Body classification and header rendering benchmarks
//!
//! Both run for every traced request, so they set the floor for tracing
//! overhead.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use http::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashSet;
use wiretrace_core::classify::{classify, looks_binary, SNIFF_LEN};
use wiretrace_core::sanitize::HeaderSanitizer;

fn text_body(len: usize) -> Vec<u8> {
    b"The quick brown fox jumps over the lazy dog. "
        .iter()
        .copied()
        .cycle()
        .take(len)
        .collect()
}

fn binary_body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 256) as u8).collect()
}

fn bench_looks_binary(c: &mut Criterion) {
    let mut group = c.benchmark_group("looks_binary");

    for len in [64, SNIFF_LEN, 64 * 1024] {
        let text = text_body(len);
        let binary = binary_body(len);
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(BenchmarkId::new("text", len), &text, |b, body| {
            b.iter(|| looks_binary(black_box(body)))
        });
        group.bench_with_input(BenchmarkId::new("binary", len), &binary, |b, body| {
            b.iter(|| looks_binary(black_box(body)))
        });
    }

    group.finish();
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    let body = text_body(2048);

    group.bench_function("json_within_limit", |b| {
        b.iter(|| {
            classify(
                black_box(Some("application/json")),
                black_box(&body),
                body.len() as u64,
                Some(body.len() as u64),
                Some(4096),
            )
        })
    });
    group.bench_function("unknown_over_limit", |b| {
        b.iter(|| {
            classify(
                black_box(None),
                black_box(&body),
                body.len() as u64,
                None,
                Some(1024),
            )
        })
    });

    group.finish();
}

fn headers(count: usize) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("authorization", HeaderValue::from_static("Bearer eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9"));
    headers.insert("cookie", HeaderValue::from_static("session=abc; theme=dark; lang=en"));
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    for i in 0..count {
        let name = HeaderName::from_bytes(format!("x-custom-{i}").as_bytes()).unwrap();
        headers.append(name, HeaderValue::from_static("some-value"));
    }
    headers
}

fn bench_render_headers(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_headers");
    let sanitizer = HeaderSanitizer::new(
        HashSet::from([HeaderName::from_static("x-custom-0")]),
        HashSet::new(),
        true,
    );
    let plain = HeaderSanitizer::new(HashSet::new(), HashSet::new(), false);

    for count in [0, 10, 40] {
        let map = headers(count);
        group.bench_with_input(BenchmarkId::new("sanitized", count), &map, |b, map| {
            b.iter(|| sanitizer.render(">", black_box(map), Some("example.com")))
        });
        group.bench_with_input(BenchmarkId::new("raw", count), &map, |b, map| {
            b.iter(|| plain.render(">", black_box(map), Some("example.com")))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_looks_binary, bench_classify, bench_render_headers);
criterion_main!(benches);
