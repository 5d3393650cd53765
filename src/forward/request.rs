//! Outbound request construction.

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::request::Parts;
use axum::http::{Request, Version};
use url::Url;

use crate::forward::connector::Endpoint;
use crate::forward::ForwardError;

/// Inbound headers copied upstream. Everything else stays with the client.
pub const FORWARDED: [&str; 3] = ["cookie", "content-length", "content-type"];

/// True when the inbound `Connection` header lists the `upgrade` token.
pub fn wants_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
}

/// Build the request sent upstream.
///
/// The request line carries the target's path and query; `Host` names the
/// target. Only [`FORWARDED`] headers are copied from the inbound request,
/// then every entry in `overrides` replaces whatever was copied under that
/// name.
pub fn build_outbound(
    parts: &Parts,
    endpoint: &Endpoint,
    target: &Url,
    overrides: &HeaderMap,
    body: Body,
) -> Result<Request<Body>, ForwardError> {
    let path_and_query = match target.query() {
        Some(query) => format!("{}?{}", target.path(), query),
        None => target.path().to_string(),
    };

    let mut request = Request::builder()
        .method(parts.method.clone())
        .uri(path_and_query)
        .version(Version::HTTP_11)
        .body(body)
        .map_err(ForwardError::Request)?;

    let headers = request.headers_mut();
    for name in FORWARDED {
        let name = HeaderName::from_static(name);
        for value in parts.headers.get_all(&name) {
            headers.append(name.clone(), value.clone());
        }
    }

    for name in overrides.keys() {
        headers.remove(name);
        for value in overrides.get_all(name) {
            headers.append(name.clone(), value.clone());
        }
    }

    let host = HeaderValue::from_str(&endpoint.host_header())
        .map_err(|_| ForwardError::InvalidHost(endpoint.host_header()))?;
    headers.insert(header::HOST, host);

    if wants_upgrade(&parts.headers) {
        for name in [header::CONNECTION, header::UPGRADE] {
            for value in parts.headers.get_all(&name) {
                headers.append(name.clone(), value.clone());
            }
        }
    } else {
        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
    }

    Ok(request)
}
