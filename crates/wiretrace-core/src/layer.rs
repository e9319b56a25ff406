//! The tracing middleware.
//!
//! For each request [`TraceService`] decides whether to trace it, renders
//! the request section, hands the request to the wrapped service and wraps
//! the response body in a [`TeeBody`]. The response section is rendered
//! when that body completes.
//!
//! The request body is only read ahead of the wrapped service when it is
//! going to be printed. Otherwise it streams through untouched.

use crate::capture::{CaptureBuffer, Captured, Completion, TeeBody};
use crate::config::TraceConfig;
use crate::connection::{self, ConnectionInfo};
use crate::error::{BoxError, ConfigError};
use crate::filter::{self, RequestDecision, Side};
use crate::render::{self, BodyView};
use crate::sanitize::HeaderSanitizer;
use crate::writer::Trace;
use bytes::Bytes;
use http::request::Parts;
use http::{HeaderMap, Method, Request, Response, StatusCode, Version};
use http_body::Body;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};

/// Request body handed to the wrapped service.
///
/// Holds the buffered bytes when the request body is printed, and the
/// original body, forwarded frame by frame, in every other case.
pub type RequestBody = UnsyncBoxBody<Bytes, BoxError>;

struct Shared {
    config: TraceConfig,
    sanitizer: HeaderSanitizer,
}

/// Layer that traces every request and response passing through it.
///
/// # Example
///
/// ```
/// use wiretrace_core::{MemorySink, TraceConfig, TraceLayer, TraceWriter};
///
/// let sink = MemorySink::new();
/// let layer = TraceLayer::new(
///     TraceConfig::verbose().writer(TraceWriter::new(sink.clone())),
/// )
/// .expect("valid configuration");
/// ```
#[derive(Clone)]
pub struct TraceLayer {
    shared: Arc<Shared>,
}

impl TraceLayer {
    /// Validate `config` and build the layer.
    pub fn new(config: TraceConfig) -> Result<Self, ConfigError> {
        let sanitizer = config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared { config, sanitizer }),
        })
    }

    /// Build a layer from `WIRETRACE_*` environment variables.
    #[cfg(feature = "config")]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(TraceConfig::from_env()?)
    }

    /// The configuration snapshot this layer was built with.
    pub fn config(&self) -> &TraceConfig {
        &self.shared.config
    }
}

impl fmt::Debug for TraceLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceLayer")
            .field("config", &self.shared.config)
            .finish()
    }
}

impl<S> Layer<S> for TraceLayer {
    type Service = TraceService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TraceService {
            inner,
            shared: self.shared.clone(),
        }
    }
}

/// Service produced by [`TraceLayer`].
///
/// The wrapped service receives a `Request<`[`RequestBody`]`>`. The body is
/// read in full before the wrapped service runs only when `request_body` is
/// on and the request is traced.
#[derive(Clone)]
pub struct TraceService<S> {
    inner: S,
    shared: Arc<Shared>,
}

impl<S> fmt::Debug for TraceService<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceService").finish_non_exhaustive()
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for TraceService<S>
where
    S: Service<Request<RequestBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
    ReqBody: Body<Data = Bytes> + Send + 'static,
    ReqBody::Error: Into<BoxError>,
    ResBody: Body<Data = Bytes> + Send + 'static,
    ResBody::Error: fmt::Display,
{
    type Response = Response<TeeBody<ResBody>>;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        // The ready service goes into the future; the clone waits for the
        // next poll_ready.
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let shared = self.shared.clone();

        Box::pin(serve(inner, shared, req))
    }
}

async fn serve<S, F, ReqBody, ResBody>(
    inner: S,
    shared: Arc<Shared>,
    req: Request<ReqBody>,
) -> Result<Response<TeeBody<ResBody>>, BoxError>
where
    S: Service<Request<RequestBody>, Response = Response<ResBody>, Future = F> + Send + 'static,
    F: Future<Output = Result<Response<ResBody>, S::Error>> + Send + 'static,
    S::Error: Into<BoxError>,
    ReqBody: Body<Data = Bytes> + Send + 'static,
    ReqBody::Error: Into<BoxError>,
    ResBody: Body<Data = Bytes> + Send + 'static,
{
    if connection::is_hidden(&req) {
        tracing::debug!(method = %req.method(), path = %req.uri().path(), "request hidden from trace");
        return passthrough(inner, req).await;
    }

    let (parts, body) = req.into_parts();
    match filter::apply_request_filter(shared.config.request_filter.as_ref(), &parts) {
        RequestDecision::Suppress => {
            tracing::debug!(method = %parts.method, path = %parts.uri.path(), "request filtered out of trace");
            passthrough(inner, Request::from_parts(parts, body)).await
        }
        RequestDecision::Trace(note) => traced(inner, shared, parts, body, note).await,
    }
}

async fn passthrough<S, F, ReqBody, ResBody>(
    mut inner: S,
    req: Request<ReqBody>,
) -> Result<Response<TeeBody<ResBody>>, BoxError>
where
    S: Service<Request<RequestBody>, Response = Response<ResBody>, Future = F> + Send + 'static,
    F: Future<Output = Result<Response<ResBody>, S::Error>> + Send + 'static,
    S::Error: Into<BoxError>,
    ReqBody: Body<Data = Bytes> + Send + 'static,
    ReqBody::Error: Into<BoxError>,
    ResBody: Body<Data = Bytes> + Send + 'static,
{
    let response = inner
        .call(req.map(forward))
        .await
        .map_err(Into::<BoxError>::into)?;
    Ok(response.map(TeeBody::passthrough))
}

fn forward<B>(body: B) -> RequestBody
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    body.map_err(Into::<BoxError>::into).boxed_unsync()
}

fn buffered(bytes: Bytes) -> RequestBody {
    Full::new(bytes).map_err(|never| match never {}).boxed_unsync()
}

async fn traced<S, F, ReqBody, ResBody>(
    mut inner: S,
    shared: Arc<Shared>,
    parts: Parts,
    body: ReqBody,
    filter_note: Option<String>,
) -> Result<Response<TeeBody<ResBody>>, BoxError>
where
    S: Service<Request<RequestBody>, Response = Response<ResBody>, Future = F> + Send + 'static,
    F: Future<Output = Result<Response<ResBody>, S::Error>> + Send + 'static,
    S::Error: Into<BoxError>,
    ReqBody: Body<Data = Bytes> + Send + 'static,
    ReqBody::Error: Into<BoxError>,
    ResBody: Body<Data = Bytes> + Send + 'static,
{
    let start = Instant::now();
    let config = &shared.config;
    let mut trace = Trace::new(config.writer.clone(), config.flush);

    render::preamble(
        &mut trace,
        config,
        &parts,
        parts.extensions.get::<ConnectionInfo>(),
        filter_note,
    );
    if config.request_header {
        render::request_head(&mut trace, &shared.sanitizer, &parts);
    }

    let body = if config.request_body {
        let bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) => {
                let err: BoxError = err.into();
                trace.note(format!("cannot read request body: {err}"));
                trace.finish();
                return Err(err);
            }
        };
        render::body(
            &mut trace,
            config,
            BodyView {
                side: Side::Request,
                headers: &parts.headers,
                bytes: &bytes,
                observed: bytes.len() as u64,
                limit: config.max_request_body,
            },
        );
        buffered(bytes)
    } else {
        forward(body)
    };
    trace.section_done();

    let method = parts.method.clone();
    let path = parts.uri.path().to_owned();
    let version = parts.version;

    match inner.call(Request::from_parts(parts, body)).await {
        Ok(response) => {
            let (head, body) = response.into_parts();
            let has_body = render::response_has_body(method == Method::HEAD, head.status);
            let buffer = if config.response_body && has_body {
                CaptureBuffer::new(config.max_response_body)
            } else {
                CaptureBuffer::disabled()
            };

            let pending = PendingResponse {
                trace,
                shared: Arc::clone(&shared),
                start,
                method,
                path,
                version,
                status: head.status,
                headers: head.headers.clone(),
                has_body,
            };
            Ok(Response::from_parts(head, TeeBody::new(body, buffer, pending)))
        }
        Err(err) => {
            let err: BoxError = err.into();
            trace.note(format!("cannot serve request: {err}"));
            if config.time {
                render::took(&mut trace, start.elapsed());
            }
            trace.finish();
            Err(err)
        }
    }
}

/// Everything needed to render the response section once the body is done.
pub(crate) struct PendingResponse {
    trace: Trace,
    shared: Arc<Shared>,
    start: Instant,
    method: Method,
    path: String,
    version: Version,
    status: StatusCode,
    headers: HeaderMap,
    has_body: bool,
}

impl PendingResponse {
    pub(crate) fn finish(mut self, captured: Captured, how: Completion) {
        let config = &self.shared.config;

        if config.response_header {
            render::response_head(
                &mut self.trace,
                &self.shared.sanitizer,
                self.version,
                self.status,
                &self.headers,
            );
        }

        if config.response_body && self.has_body {
            render::body(
                &mut self.trace,
                config,
                BodyView {
                    side: Side::Response,
                    headers: &self.headers,
                    bytes: &captured.bytes,
                    observed: captured.seen,
                    limit: Some(config.max_response_body),
                },
            );
        }

        match how {
            Completion::Ended => {}
            Completion::Failed(err) => self.trace.note(format!(
                "response body failed after {} bytes: {err}",
                captured.seen
            )),
            Completion::Dropped if config.response_body && self.has_body => {
                self.trace.note(format!(
                    "response body incomplete: client went away after {} bytes",
                    captured.seen
                ))
            }
            Completion::Dropped => {}
        }

        if config.time {
            render::took(&mut self.trace, self.start.elapsed());
        }

        tracing::debug!(
            method = %self.method,
            path = %self.path,
            status = self.status.as_u16(),
            bytes = captured.seen,
            "trace complete"
        );
        self.trace.finish();
    }
}
