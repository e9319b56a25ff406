//! Traced request benchmarks
//!
//! Measures one request through `TraceLayer` into an in-memory sink,
//! against the same handler without the layer.

use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use std::convert::Infallible;
use tower::{service_fn, Layer, ServiceExt};
use wiretrace_core::{FlushStrategy, MemorySink, RequestBody, TraceConfig, TraceLayer, TraceWriter};

async fn handler(req: Request<RequestBody>) -> Result<Response<Full<Bytes>>, Infallible> {
    let body = req.into_body().collect().await.map(|c| c.to_bytes()).unwrap_or_default();
    Ok(Response::builder()
        .header("content-type", "application/json")
        .body(Full::new(body))
        .unwrap_or_default())
}

fn request(body: &Bytes) -> Request<Full<Bytes>> {
    Request::post("/api/items")
        .header("host", "example.com")
        .header("content-type", "application/json")
        .header("authorization", "Bearer token")
        .body(Full::new(body.clone()))
        .unwrap()
}

fn bench_traced_request(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let mut group = c.benchmark_group("traced_request");

    for size in [0usize, 512, 8192] {
        let body = Bytes::from(format!("{{\"data\":\"{}\"}}", "x".repeat(size)));

        group.bench_with_input(BenchmarkId::new("untraced", size), &body, |b, body| {
            b.iter(|| {
                rt.block_on(async {
                    let res = service_fn(handler).oneshot(request(body)).await.unwrap();
                    res.into_body().collect().await.unwrap()
                })
            })
        });

        for (name, flush) in [("streaming", FlushStrategy::Streaming), ("on_end", FlushStrategy::OnEnd)] {
            let sink = MemorySink::new();
            let layer = TraceLayer::new(
                TraceConfig::verbose()
                    .flush(flush)
                    .writer(TraceWriter::new(sink.clone())),
            )
            .unwrap();

            group.bench_with_input(BenchmarkId::new(name, size), &body, |b, body| {
                b.iter(|| {
                    rt.block_on(async {
                        let res = layer.layer(service_fn(handler)).oneshot(request(body)).await.unwrap();
                        res.into_body().collect().await.unwrap()
                    });
                    sink.clear();
                })
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_traced_request);
criterion_main!(benches);
