//! Per-request metadata handed in by the hosting server, and the hide marker.
//!
//! The transport is not ours: whoever accepts connections inserts a
//! [`ConnectionInfo`] into each request's extensions. Without it the trace
//! simply has no `* Request from` line and no TLS summary.

use chrono::{DateTime, Utc};
use http::Request;
use std::net::SocketAddr;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Connection facts for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Address of the peer.
    pub remote_addr: SocketAddr,
    /// Negotiated TLS parameters, `None` for plain connections.
    pub tls: Option<TlsInfo>,
}

impl ConnectionInfo {
    /// A plain (non-TLS) connection from `remote_addr`.
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self {
            remote_addr,
            tls: None,
        }
    }

    /// Attach TLS parameters.
    pub fn with_tls(mut self, tls: TlsInfo) -> Self {
        self.tls = Some(tls);
        self
    }
}

/// Negotiated TLS session parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsInfo {
    /// Protocol version, e.g. `TLS 1.3`.
    pub version: String,
    /// Cipher suite name, e.g. `TLS_AES_128_GCM_SHA256`.
    pub cipher_suite: String,
    /// Negotiated application protocol, e.g. `h2`.
    pub alpn: Option<String>,
    /// Leaf certificate presented by the client, if any.
    pub peer_certificate: Option<PeerCertificate>,
}

impl TlsInfo {
    /// Negotiated TLS version and cipher suite, e.g. `"TLS 1.3"` and
    /// `"TLS_AES_128_GCM_SHA256"`, with no ALPN and no client certificate.
    pub fn new(version: impl Into<String>, cipher_suite: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            cipher_suite: cipher_suite.into(),
            alpn: None,
            peer_certificate: None,
        }
    }

    /// Record the application protocol agreed through ALPN.
    pub fn with_alpn(mut self, protocol: impl Into<String>) -> Self {
        self.alpn = Some(protocol.into());
        self
    }

    /// Attach the certificate the client presented.
    pub fn with_peer_certificate(mut self, certificate: PeerCertificate) -> Self {
        self.peer_certificate = Some(certificate);
        self
    }
}

/// The parts of a client certificate that end up in the trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerCertificate {
    /// Distinguished name of the certificate holder.
    pub subject: String,
    /// Distinguished name of the signing authority.
    pub issuer: String,
    /// Start of the validity window.
    pub not_before: DateTime<Utc>,
    /// End of the validity window.
    pub not_after: DateTime<Utc>,
}

/// Request extension that keeps a request out of the trace entirely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hide;

/// Mark a request so no trace is written for it.
pub fn hide<B>(req: &mut Request<B>) {
    req.extensions_mut().insert(Hide);
}

pub(crate) fn is_hidden<B>(req: &Request<B>) -> bool {
    req.extensions().get::<Hide>().is_some()
}

/// Layer that marks every request passing through it as hidden.
///
/// Install it in front of a [`TraceLayer`](crate::TraceLayer) on routes that
/// should never be traced, such as health checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct HideLayer;

impl HideLayer {
    /// A layer that hides every request passing through it.
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for HideLayer {
    type Service = HideService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        HideService { inner }
    }
}

/// Service produced by [`HideLayer`].
#[derive(Debug, Clone)]
pub struct HideService<S> {
    inner: S,
}

impl<S, B> Service<Request<B>> for HideService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        hide(&mut req);
        self.inner.call(req)
    }
}
