//! Forwarding behaviour against raw TCP upstreams.

use std::time::Duration;

use campaign_relay::target::rules::PathEmbed;
use reqwest::StatusCode;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

mod common;

use common::{campaign, client, http_response, MockUpstream, TestRelay, MAC_FIREFOX};

async fn relay_to(upstream: &MockUpstream, path: &str) -> TestRelay {
    let base_url = upstream.url(path);
    TestRelay::start(move |config, _| {
        config
            .campaigns
            .insert("partner".into(), campaign(&base_url, &[("sub1", "partner"), ("h1", "%header:x-region%")]));
    })
    .await
}

#[tokio::test]
async fn test_request_head_is_rewritten() {
    let upstream = MockUpstream::start(http_response("200 OK", &[], "hello")).await;
    let relay = relay_to(&upstream, "/landing").await;

    let response = client()
        .get(relay.url("/cid/partner?q=shoes"))
        .header("X-Region", "DE")
        .header("User-Agent", MAC_FIREFOX)
        .header("Cookie", "session=abc")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "hello");

    let head = upstream.next_head().await;
    let lower = head.to_ascii_lowercase();
    assert!(head.starts_with("GET /landing?sub1=partner&h1=de&q=shoes HTTP/1.1\r\n"), "{head}");
    assert!(lower.contains(&format!("host: {}\r\n", upstream.addr)), "{head}");
    assert!(lower.contains("connection: close\r\n"), "{head}");
    assert!(lower.contains("cookie: session=abc\r\n"), "{head}");
    assert!(
        lower.contains("user-agent: mozilla/5.0 (macintosh; rv:80.0) gecko/20100101 firefox/80.0\r\n"),
        "{head}"
    );
}

#[tokio::test]
async fn test_client_identity_stays_with_the_relay() {
    let upstream = MockUpstream::start(http_response("200 OK", &[], "")).await;
    let relay = relay_to(&upstream, "/landing").await;

    let response = client()
        .get(relay.url("/cid/partner"))
        .header("X-Forwarded-For", "203.0.113.7")
        .header("Referer", "https://private.example/profile/alice")
        .header("Accept-Language", "de-CH")
        .header("Authorization", "Bearer secret")
        .header("X-Target-URL", "https://www.example.io/")
        .header("X-Request-Id", "client-chosen")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let head = upstream.next_head().await.to_ascii_lowercase();
    for name in [
        "x-forwarded-for",
        "referer",
        "accept-language",
        "authorization",
        "x-target-url",
        "x-request-id",
        "accept:",
    ] {
        assert!(!head.contains(name), "{name} leaked upstream:\n{head}");
    }
    assert!(head.contains("user-agent: "), "{head}");
}

#[tokio::test]
async fn test_redirects_are_flattened() {
    let upstream = MockUpstream::start(http_response(
        "302 Found",
        &[("Location", "https://partner.example/real")],
        "moved",
    ))
    .await;
    let relay = relay_to(&upstream, "/go").await;

    let response = client().get(relay.url("/cid/partner")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["location"], "https://partner.example/real");
    assert_eq!(response.text().await.unwrap(), "moved");
}

#[tokio::test]
async fn test_other_statuses_pass_through() {
    let upstream = MockUpstream::start(http_response("404 Not Found", &[], "nope")).await;
    let relay = relay_to(&upstream, "/missing").await;
    let response = client().get(relay.url("/cid/partner")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let upstream = MockUpstream::start(http_response("300 Multiple Choices", &[], "")).await;
    let relay = relay_to(&upstream, "/choices").await;
    let response = client().get(relay.url("/cid/partner")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::MULTIPLE_CHOICES);
}

#[tokio::test]
async fn test_cookies_never_reach_the_client() {
    let upstream = MockUpstream::start(http_response(
        "200 OK",
        &[
            ("Set-Cookie", "tracking=1; Path=/"),
            ("Content-Type", "application/json"),
        ],
        "{\"cookies\":{}}",
    ))
    .await;
    let relay = relay_to(&upstream, "/cookies").await;

    let response = client()
        .get(relay.url("/cid/partner"))
        .header("Cookie", "session=abc")
        .send()
        .await
        .unwrap();
    assert!(response.headers().get("set-cookie").is_none());
    assert_eq!(response.headers()["content-type"], "application/json");

    let head = upstream.next_head().await.to_ascii_lowercase();
    assert!(head.contains("cookie: session=abc\r\n"));
}

#[tokio::test]
async fn test_failed_resolution_never_connects() {
    let upstream = MockUpstream::start(http_response("200 OK", &[], "")).await;
    let relay = relay_to(&upstream, "/").await;

    let response = client().get(relay.url("/cid/unknown")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = client()
        .get(relay.url("/cid/partner"))
        .header("X-Region", "us")
        .header("X-Target-URL", "https://shop.example.co.uk/")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(upstream.hits(), 0);
}

#[tokio::test]
async fn test_path_embed() {
    let upstream = MockUpstream::start(http_response("200 OK", &[], "{}")).await;
    let base_url = upstream.url("/currentconditions/v1/");
    let relay = TestRelay::start(|config, _| {
        config.rules.path_embeds.push(PathEmbed {
            base_url: base_url.clone(),
            param: "locationKey".into(),
            suffix: ".json".into(),
        });
        config
            .campaigns
            .insert("weather_conditions".into(), campaign(&base_url, &[("apikey", "k")]));
    })
    .await;

    let response = client()
        .get(relay.url("/cid/weather_conditions"))
        .send()
        .await
        .unwrap();
    let status = response.status();
    let body: Value = response.json().await.unwrap();
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["details"]["msg"], "locationKey parameter must be provided.");

    let response = client()
        .get(relay.url("/cid/weather_conditions?locationKey=349727"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let head = upstream.next_head().await;
    assert!(
        head.starts_with("GET /currentconditions/v1/349727.json?apikey=k HTTP/1.1\r\n"),
        "{head}"
    );
}

#[tokio::test]
async fn test_forward_timeout() {
    let upstream = MockUpstream::start_with_delay(http_response("200 OK", &[], "late"), Duration::from_secs(3)).await;
    let base_url = upstream.url("/slow");
    let relay = TestRelay::start(move |config, _| {
        config.timeouts.forward_secs = Some(1);
        config.campaigns.insert("slow".into(), campaign(&base_url, &[]));
    })
    .await;

    let response = client().get(relay.url("/cid/slow")).send().await.unwrap();
    let status = response.status();
    let body: Value = response.json().await.unwrap();
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let relay = TestRelay::start(move |config, _| {
        config
            .campaigns
            .insert("gone".into(), campaign(&format!("http://{addr}/"), &[]));
    })
    .await;

    let response = client().get(relay.url("/cid/gone")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_http10_client_gets_unchunked_close_delimited_response() {
    let upstream = MockUpstream::start(
        "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n5\r\nhello\r\n0\r\n\r\n",
    )
    .await;
    let relay = relay_to(&upstream, "/chunked").await;

    let mut socket = TcpStream::connect(relay.addr).await.unwrap();
    socket
        .write_all(b"GET /cid/partner HTTP/1.0\r\nHost: relay\r\n\r\n")
        .await
        .unwrap();

    let mut raw = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), socket.read_to_end(&mut raw))
        .await
        .unwrap()
        .unwrap();
    let raw = String::from_utf8_lossy(&raw).to_ascii_lowercase();
    let (head, body) = raw.split_once("\r\n\r\n").unwrap();

    assert!(head.contains(" 200 "), "{head}");
    assert!(!head.contains("transfer-encoding"), "{head}");
    assert!(head.contains("connection: close"), "{head}");
    assert_eq!(body, "hello");
}

#[tokio::test]
async fn test_client_abort_closes_upstream_leg() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = oneshot::channel();
    let upstream = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let _ = seen_tx.send(common::read_head(&mut socket).await);
        let mut buf = [0u8; 64];
        tokio::time::timeout(Duration::from_secs(5), socket.read(&mut buf)).await
    });

    let base_url = format!("http://{addr}/pending");
    let relay = TestRelay::start(move |config, _| {
        config.campaigns.insert("pending".into(), campaign(&base_url, &[]));
    })
    .await;

    let mut socket = TcpStream::connect(relay.addr).await.unwrap();
    socket
        .write_all(b"GET /cid/pending HTTP/1.1\r\nHost: relay\r\n\r\n")
        .await
        .unwrap();
    let head = tokio::time::timeout(Duration::from_secs(5), seen_rx)
        .await
        .unwrap()
        .unwrap();
    assert!(head.starts_with("GET /pending HTTP/1.1\r\n"), "{head}");
    drop(socket);

    let read = upstream.await.unwrap().expect("upstream leg outlived the client");
    assert!(matches!(read, Ok(0) | Err(_)));
}
