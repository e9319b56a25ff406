use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use std::io;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::{Service, ServiceExt};
use wiretrace_core::{BoxError, ConnectionInfo, TlsInfo};

/// A real HTTP server for exercising traced services end to end.
///
/// Every accepted connection gets a [`ConnectionInfo`] carrying the peer
/// address, inserted into each request's extensions before the service
/// sees it. The server stops when dropped.
pub struct TestServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TestServer {
    /// Serve `service` on a random local port.
    pub async fn start<S, B>(service: S) -> io::Result<Self>
    where
        S: Service<http::Request<Incoming>, Response = http::Response<B>> + Clone + Send + 'static,
        S::Future: Send + 'static,
        S::Error: Into<BoxError>,
        B: http_body::Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<BoxError>,
    {
        Self::spawn(service, None).await
    }

    /// Like [`start`](Self::start), but every connection reports the given
    /// TLS state. The socket itself stays plain text.
    pub async fn start_with_tls<S, B>(service: S, tls: TlsInfo) -> io::Result<Self>
    where
        S: Service<http::Request<Incoming>, Response = http::Response<B>> + Clone + Send + 'static,
        S::Future: Send + 'static,
        S::Error: Into<BoxError>,
        B: http_body::Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<BoxError>,
    {
        Self::spawn(service, Some(tls)).await
    }

    async fn spawn<S, B>(service: S, tls: Option<TlsInfo>) -> io::Result<Self>
    where
        S: Service<http::Request<Incoming>, Response = http::Response<B>> + Clone + Send + 'static,
        S::Future: Send + 'static,
        S::Error: Into<BoxError>,
        B: http_body::Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<BoxError>,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            let mut stop = shutdown_rx;

            loop {
                tokio::select! {
                    res = listener.accept() => {
                        match res {
                            Ok((stream, peer)) => {
                                let mut info = ConnectionInfo::new(peer);
                                if let Some(tls) = &tls {
                                    info = info.with_tls(tls.clone());
                                }
                                let service = service.clone();

                                tokio::spawn(async move {
                                    let svc = service_fn(move |mut req: http::Request<Incoming>| {
                                        req.extensions_mut().insert(info.clone());
                                        service.clone().oneshot(req)
                                    });
                                    if let Err(err) = Builder::new(TokioExecutor::new())
                                        .serve_connection(TokioIo::new(stream), svc)
                                        .await
                                    {
                                        tracing::debug!(%peer, error = %err, "connection closed with error");
                                    }
                                });
                            }
                            Err(err) => tracing::warn!(error = %err, "accept failed"),
                        }
                    }
                    _ = &mut stop => break,
                }
            }
        });

        tracing::debug!(%addr, "test server listening");
        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// The bound address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `http://` URL of the server, without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Absolute URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};
    use std::convert::Infallible;
    use tower::service_fn as tower_service_fn;

    async fn echo_peer(
        req: http::Request<Incoming>,
    ) -> Result<http::Response<Full<Bytes>>, Infallible> {
        let info = req.extensions().get::<ConnectionInfo>().cloned();
        let body = match info {
            Some(info) => format!(
                "{} tls={}",
                info.remote_addr.ip(),
                info.tls.map(|tls| tls.version).unwrap_or_default()
            ),
            None => "none".to_owned(),
        };
        Ok(http::Response::new(Full::new(Bytes::from(body))))
    }

    #[tokio::test]
    async fn injects_connection_info() {
        let server = TestServer::start(tower_service_fn(echo_peer)).await.unwrap();

        let body = reqwest::get(server.url("/")).await.unwrap().text().await.unwrap();
        assert_eq!(body, "127.0.0.1 tls=");
    }

    #[tokio::test]
    async fn reports_configured_tls() {
        let server = TestServer::start_with_tls(
            tower_service_fn(echo_peer),
            TlsInfo::new("TLSv1.3", "TLS_AES_128_GCM_SHA256"),
        )
        .await
        .unwrap();

        let body = reqwest::get(server.url("/")).await.unwrap().text().await.unwrap();
        assert_eq!(body, "127.0.0.1 tls=TLSv1.3");
    }

    #[tokio::test]
    async fn request_body_reaches_service() {
        let svc = tower_service_fn(|req: http::Request<Incoming>| async move {
            let bytes = req.into_body().collect().await?.to_bytes();
            Ok::<_, hyper::Error>(http::Response::new(Full::new(bytes)))
        });
        let server = TestServer::start(svc).await.unwrap();

        let body = reqwest::Client::new()
            .post(server.url("/echo"))
            .body("ping")
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "ping");
    }

    #[test]
    fn urls_are_built_from_the_address() {
        let server = TestServer {
            addr: "127.0.0.1:8080".parse().unwrap(),
            shutdown_tx: None,
        };
        assert_eq!(server.base_url(), "http://127.0.0.1:8080");
        assert_eq!(server.url("/a?b=1"), "http://127.0.0.1:8080/a?b=1");
    }
}
