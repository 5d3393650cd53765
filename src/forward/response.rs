//! Client-facing response head.
//!
//! The upstream response head is rewritten before it reaches the client:
//! cookies are dropped, redirects are flattened to `200` and connection
//! framing is adjusted to the inbound protocol version.

use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::request::Parts as RequestParts;
use axum::http::response::Parts;
use axum::http::{StatusCode, Version};
use hyper::ext::ReasonPhrase;

/// What the response rewrite needs to know about the inbound request.
#[derive(Debug, Clone)]
pub struct InboundInfo {
    pub version: Version,
    pub connection: Option<HeaderValue>,
}

impl InboundInfo {
    pub fn from_parts(parts: &RequestParts) -> Self {
        Self {
            version: parts.version,
            connection: parts.headers.get(header::CONNECTION).cloned(),
        }
    }

    fn connection_or(&self, default: &'static str) -> HeaderValue {
        self.connection
            .clone()
            .unwrap_or_else(|| HeaderValue::from_static(default))
    }
}

/// Redirect statuses (301 through 309) become `200`.
pub fn remap_status(status: StatusCode) -> StatusCode {
    match status.as_u16() {
        301..=309 => StatusCode::OK,
        _ => status,
    }
}

fn is_cookie_header(name: &str) -> bool {
    name.contains("cookie")
}

/// Rewrite an upstream response head for the client.
pub fn relay_parts(inbound: &InboundInfo, upstream: Parts) -> Parts {
    let Parts {
        status,
        headers: upstream_headers,
        mut extensions,
        ..
    } = upstream;

    let mut headers = HeaderMap::with_capacity(upstream_headers.len());
    for (name, value) in upstream_headers.iter() {
        if is_cookie_header(name.as_str()) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    if inbound.version == Version::HTTP_10 {
        headers.remove(header::TRANSFER_ENCODING);
        headers.insert(header::CONNECTION, inbound.connection_or("close"));
    } else if inbound.version != Version::HTTP_2 && !headers.contains_key(header::CONNECTION) {
        headers.insert(header::CONNECTION, inbound.connection_or("keep-alive"));
    }

    let relayed = remap_status(status);
    if relayed != status && extensions.get::<ReasonPhrase>().is_none() {
        if let Some(reason) = status.canonical_reason() {
            extensions.insert(ReasonPhrase::from_static(reason.as_bytes()));
        }
    }

    let (mut parts, ()) = axum::http::Response::new(()).into_parts();
    parts.status = relayed;
    parts.headers = headers;
    parts.extensions = extensions;
    parts
}
