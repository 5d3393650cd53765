//! Request forwarding.
//!
//! A forward runs a single exchange against the target over a fresh
//! connection and returns the client-facing response. The response body
//! streams directly from the upstream socket; nothing is buffered.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Request, Response};
use http_body::{Frame, SizeHint};
use hyper::body::{Bytes, Incoming};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Sleep};
use url::Url;

use crate::config::RelayConfig;
use crate::forward::connector::{self, Connector, Endpoint};
use crate::forward::request::build_outbound;
use crate::forward::response::{relay_parts, InboundInfo};
use crate::forward::tls::{build_client_config, TlsError};

/// Forward failures. Raised before the response head, or from the relayed
/// body once streaming has started.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("unsupported target scheme: {0}")]
    UnsupportedScheme(String),

    #[error("target URL has no host")]
    MissingHost,

    #[error("invalid host header: {0}")]
    InvalidHost(String),

    #[error("invalid TLS server name: {0}")]
    ServerName(String),

    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS handshake with {endpoint} failed: {source}")]
    Tls {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP handshake failed: {0}")]
    Handshake(#[source] hyper::Error),

    #[error("failed to build outbound request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("upstream exchange failed: {0}")]
    Send(#[source] hyper::Error),

    #[error("upstream was idle for {0:?}")]
    Timeout(Duration),
}

impl ForwardError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::UnsupportedScheme(_) | Self::MissingHost | Self::InvalidHost(_) | Self::ServerName(_) => "target",
            Self::Connect { .. } => "connect",
            Self::Tls { .. } => "tls",
            Self::Handshake(_) | Self::Send(_) => "exchange",
            Self::Request(_) => "request",
            Self::Timeout(_) => "timeout",
        }
    }
}

/// Aborts the connection driver when dropped.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Deadline re-armed every time the upstream makes progress.
struct IdleTimer {
    limit: Duration,
    deadline: Pin<Box<Sleep>>,
}

impl IdleTimer {
    fn new(limit: Duration) -> Self {
        Self {
            limit,
            deadline: Box::pin(tokio::time::sleep(limit)),
        }
    }

    fn rearm(&mut self) {
        self.deadline.as_mut().reset(Instant::now() + self.limit);
    }

    fn poll_expired(&mut self, cx: &mut Context<'_>) -> bool {
        self.deadline.as_mut().poll(cx).is_ready()
    }
}

/// Upstream body that keeps its connection driver alive.
///
/// Dropping it (client gone, or the response finished) tears the outbound
/// connection down. With an idle timer, a body that makes no progress for
/// the limit ends with [`ForwardError::Timeout`].
struct RelayBody {
    inner: Incoming,
    idle: Option<IdleTimer>,
    _driver: AbortOnDrop,
}

impl http_body::Body for RelayBody {
    type Data = Bytes;
    type Error = ForwardError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(frame) => {
                if let Some(idle) = this.idle.as_mut() {
                    idle.rearm();
                }
                Poll::Ready(frame.map(|f| f.map_err(ForwardError::Send)))
            }
            Poll::Pending => match this.idle.as_mut() {
                Some(idle) => {
                    if idle.poll_expired(cx) {
                        tracing::debug!(limit = ?idle.limit, "Upstream body stalled");
                        Poll::Ready(Some(Err(ForwardError::Timeout(idle.limit))))
                    } else {
                        Poll::Pending
                    }
                }
                None => Poll::Pending,
            },
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Relays requests to resolved targets.
#[derive(Clone)]
pub struct Forwarder {
    connector: Connector,
    timeout: Option<Duration>,
}

impl Forwarder {
    pub fn new(tls: Arc<rustls::ClientConfig>, timeout: Option<Duration>) -> Self {
        Self {
            connector: Connector::new(tls),
            timeout,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self, TlsError> {
        let tls = build_client_config(&config.forward.tls)?;
        let timeout = config.timeouts.forward_secs.map(Duration::from_secs);
        Ok(Self::new(tls, timeout))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Forward `request` to `target`.
    ///
    /// `overrides` replace same-named inbound headers on the outbound request.
    /// The timeout, when set, bounds everything up to the upstream response
    /// head and then every gap between body frames.
    pub async fn forward(
        &self,
        request: Request<Body>,
        target: &Url,
        overrides: &HeaderMap,
    ) -> Result<Response<Body>, ForwardError> {
        let endpoint = Endpoint::from_url(target)?;
        let (parts, body) = request.into_parts();
        let inbound = InboundInfo::from_parts(&parts);
        let outbound = build_outbound(&parts, &endpoint, target, overrides, body)?;

        tracing::debug!(
            endpoint = %endpoint,
            method = %outbound.method(),
            "Forwarding request"
        );

        let exchange = self.exchange(&endpoint, outbound);
        let (upstream, driver) = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| ForwardError::Timeout(limit))??,
            None => exchange.await?,
        };

        let (upstream_parts, incoming) = upstream.into_parts();
        tracing::debug!(
            endpoint = %endpoint,
            status = %upstream_parts.status,
            "Upstream responded"
        );

        let parts = relay_parts(&inbound, upstream_parts);
        let body = Body::new(RelayBody {
            inner: incoming,
            idle: self.timeout.map(IdleTimer::new),
            _driver: driver,
        });
        Ok(Response::from_parts(parts, body))
    }

    async fn exchange(
        &self,
        endpoint: &Endpoint,
        outbound: Request<Body>,
    ) -> Result<(Response<Incoming>, AbortOnDrop), ForwardError> {
        let stream = self.connector.connect(endpoint).await?;
        let (mut sender, driver) = connector::handshake(stream).await?;
        let driver = AbortOnDrop(driver);

        sender.ready().await.map_err(ForwardError::Send)?;
        let response = sender.send_request(outbound).await.map_err(ForwardError::Send)?;
        drop(sender);

        Ok((response, driver))
    }
}
