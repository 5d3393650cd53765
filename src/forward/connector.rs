//! Outbound connections.
//!
//! Every forward dials a fresh TCP connection (optionally wrapped in TLS)
//! and runs a single HTTP/1.1 exchange over it. There is no pool.

use std::error::Error as StdError;
use std::sync::Arc;

use axum::body::Body;
use hyper::client::conn::http1::{self, SendRequest};
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use url::{Host, Url};

use crate::forward::ForwardError;

/// Transport selected from the target scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Plain,
    Tls,
}

/// Where a forward goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    scheme: String,
    transport: Transport,
    /// Host as it appears in the URL (IPv6 in brackets).
    host: String,
    /// Host in dialable form (IPv6 without brackets).
    dial_host: String,
    port: u16,
}

/// Default port for a scheme.
pub fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" | "ws" => Some(80),
        "https" | "wss" => Some(443),
        _ => None,
    }
}

impl Endpoint {
    pub fn from_url(url: &Url) -> Result<Self, ForwardError> {
        let transport = match url.scheme() {
            "http" => Transport::Plain,
            "https" => Transport::Tls,
            other => return Err(ForwardError::UnsupportedScheme(other.to_string())),
        };
        let (host, dial_host) = match url.host() {
            Some(Host::Domain(domain)) => (domain.to_string(), domain.to_string()),
            Some(Host::Ipv4(ip)) => (ip.to_string(), ip.to_string()),
            Some(Host::Ipv6(ip)) => (format!("[{ip}]"), ip.to_string()),
            None => return Err(ForwardError::MissingHost),
        };
        let port = url.port_or_known_default().ok_or(ForwardError::MissingHost)?;

        Ok(Self {
            scheme: url.scheme().to_string(),
            transport,
            host,
            dial_host,
            port,
        })
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the port must be spelled out in the `Host` header.
    pub fn is_port_required(&self) -> bool {
        default_port(&self.scheme) != Some(self.port)
    }

    /// Value for the outbound `Host` header.
    pub fn host_header(&self) -> String {
        if self.is_port_required() {
            format!("{}:{}", self.host, self.port)
        } else {
            self.host.clone()
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// An established outbound byte stream.
pub enum Stream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

/// Dials endpoints.
#[derive(Clone)]
pub struct Connector {
    tls: TlsConnector,
}

impl Connector {
    pub fn new(tls: Arc<ClientConfig>) -> Self {
        Self {
            tls: TlsConnector::from(tls),
        }
    }

    pub async fn connect(&self, endpoint: &Endpoint) -> Result<Stream, ForwardError> {
        let tcp = TcpStream::connect((endpoint.dial_host.as_str(), endpoint.port))
            .await
            .map_err(|source| ForwardError::Connect {
                endpoint: endpoint.to_string(),
                source,
            })?;
        if let Err(e) = tcp.set_nodelay(true) {
            tracing::debug!(endpoint = %endpoint, error = %e, "Failed to set TCP_NODELAY");
        }

        match endpoint.transport {
            Transport::Plain => Ok(Stream::Plain(tcp)),
            Transport::Tls => {
                let name = ServerName::try_from(endpoint.dial_host.clone())
                    .map_err(|_| ForwardError::ServerName(endpoint.dial_host.clone()))?;
                let tls = self
                    .tls
                    .connect(name, tcp)
                    .await
                    .map_err(|source| ForwardError::Tls {
                        endpoint: endpoint.to_string(),
                        source,
                    })?;
                Ok(Stream::Tls(Box::new(tls)))
            }
        }
    }
}

/// Start an HTTP/1.1 exchange over `stream`.
///
/// The connection driver runs on its own task; the returned handle lets the
/// caller abort it. Driver errors are logged and swallowed.
pub async fn handshake(stream: Stream) -> Result<(SendRequest<Body>, JoinHandle<()>), ForwardError> {
    match stream {
        Stream::Plain(io) => drive(io).await,
        Stream::Tls(io) => drive(*io).await,
    }
}

async fn drive<S>(io: S) -> Result<(SendRequest<Body>, JoinHandle<()>), ForwardError>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (sender, conn) = http1::handshake(TokioIo::new(io))
        .await
        .map_err(ForwardError::Handshake)?;

    let driver = tokio::spawn(async move {
        if let Err(e) = conn.await {
            if is_connection_reset(&e) {
                tracing::trace!(error = %e, "Upstream connection reset");
            } else {
                tracing::debug!(error = %e, "Upstream connection error");
            }
        }
    });
    Ok((sender, driver))
}

/// True when an I/O reset sits anywhere in the error chain.
pub fn is_connection_reset(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::BrokenPipe
            ) {
                return true;
            }
        }
        current = e.source();
    }
    false
}
