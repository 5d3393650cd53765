//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use campaign_relay::campaign::CampaignRegistry;
use campaign_relay::config::schema::OrderedParams;
use campaign_relay::config::{CampaignConfig, RelayConfig};
use campaign_relay::{HttpServer, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};

pub const MAC_FIREFOX: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:80.0) Gecko/20100101 Firefox/80.0";

pub const EBAY_URL: &str = "https://www.ebay.co.uk?mkevt=1&mkcid=2&mkrid=710-158768-120484-6&keyword=conducive&crlp=123456789GB2020110611&MT_ID=562786&device=Computers&cmpgn=216901";

/// Read one request head (through the blank line) from `socket`.
pub async fn read_head(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 4096];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}

/// A raw TCP upstream that records every request head it receives.
pub struct MockUpstream {
    pub addr: SocketAddr,
    heads: Mutex<mpsc::UnboundedReceiver<String>>,
    hits: Arc<AtomicUsize>,
}

impl MockUpstream {
    /// Answer every request with `response` (a complete HTTP/1.1 message).
    pub async fn start(response: impl Into<String>) -> Self {
        Self::start_with_delay(response, Duration::ZERO).await
    }

    /// Like [`MockUpstream::start`], waiting `delay` before answering.
    pub async fn start_with_delay(response: impl Into<String>, delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = Arc::new(response.into());
        let hits = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded_channel();

        let counter = hits.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let response = response.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let head = read_head(&mut socket).await;
                    let _ = tx.send(head);
                    tokio::time::sleep(delay).await;
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self {
            addr,
            heads: Mutex::new(rx),
            hits,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Connections accepted so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// The next recorded request head.
    pub async fn next_head(&self) -> String {
        let mut heads = self.heads.lock().await;
        tokio::time::timeout(Duration::from_secs(5), heads.recv())
            .await
            .expect("upstream saw no request")
            .expect("upstream stopped")
    }
}

/// Build a fixed HTTP/1.1 response.
pub fn http_response(status_line: &str, headers: &[(&str, &str)], body: &str) -> String {
    let mut out = format!("HTTP/1.1 {status_line}\r\n");
    for (name, value) in headers {
        out.push_str(&format!("{name}: {value}\r\n"));
    }
    out.push_str(&format!("Content-Length: {}\r\nConnection: close\r\n\r\n{body}", body.len()));
    out
}

/// A relay instance on an ephemeral port. Shuts down on drop.
pub struct TestRelay {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl TestRelay {
    /// Start a relay with dev routes enabled. `configure` receives the
    /// relay's own address so campaigns can target its `/test` echo.
    pub async fn start<F>(configure: F) -> Self
    where
        F: FnOnce(&mut RelayConfig, SocketAddr),
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut config = RelayConfig::default();
        config.server.dev_routes = true;
        configure(&mut config, addr);

        let registry = CampaignRegistry::from_config_with_env(&config.campaigns, |_| None);
        let server = HttpServer::with_registry(config, registry).unwrap();
        let shutdown = Shutdown::new();
        let rx = shutdown.subscribe();
        tokio::spawn(async move {
            let _ = server.run(listener, rx).await;
        });

        Self { addr, shutdown }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn campaign(base_url: &str, query: &[(&str, &str)]) -> CampaignConfig {
    CampaignConfig {
        base_url: Some(base_url.to_string()),
        method: None,
        query: OrderedParams::from_pairs(query.iter().map(|(k, v)| (k.to_string(), v.to_string()))),
    }
}

/// The `amzn_2020_1` campaign pointed at `base_url`.
pub fn amazon(base_url: &str) -> CampaignConfig {
    campaign(
        base_url,
        &[
            ("sub1", "amazon"),
            ("key", "xxx"),
            ("cuid", "amzn_2020_1"),
            ("h1", "%header:x-region%"),
            ("h2", "%header:x-source%"),
            ("cu", "%header:x-target-url%"),
        ],
    )
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
