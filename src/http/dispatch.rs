//! Campaign dispatch.
//!
//! `/cid/{cid}` → registry lookup → target resolution → forward.

use std::time::Instant;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::campaign::CampaignError;
use crate::http::error::RelayError;
use crate::http::request::RequestIdExt;
use crate::http::server::AppState;
use crate::http::user_agent::prune_user_agent;
use crate::observability::metrics;

/// `ANY /cid/{cid}`
pub async fn campaign(
    State(state): State<AppState>,
    Path(cid): Path<String>,
    request: Request<Body>,
) -> Response {
    let request_id = request.request_id().to_string();
    let label = cid.trim().to_lowercase();

    match relay(&state, &cid, request).await {
        Ok(response) => response,
        Err(error) => {
            let label = match error {
                RelayError::Campaign(_) => "invalid",
                _ => label.as_str(),
            };
            reject(error, &request_id, label)
        }
    }
}

/// `ANY /cid` and `ANY /cid/`
pub async fn missing_campaign(request: Request<Body>) -> Response {
    reject(CampaignError::MissingId.into(), request.request_id(), "invalid")
}

/// `ANY /test`: local upstream used in development.
pub async fn echo(request: Request<Body>) -> Response {
    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    (StatusCode::MOVED_PERMANENTLY, format!("TEST: {target}\n{user_agent}")).into_response()
}

async fn relay(state: &AppState, cid: &str, request: Request<Body>) -> Result<Response, RelayError> {
    let campaign = state.registry.select(cid, request.method())?;

    let target = state
        .builder
        .resolve(&campaign, request.headers(), request.uri().query())
        .inspect_err(|e| metrics::record_resolve_failure(e.reason()))?;
    let url = target.to_url()?;

    tracing::info!(campaign = campaign.id(), "forwarding {} to {}", campaign.id(), target);

    let overrides = sanitized_headers(request.headers());
    let started = Instant::now();
    let forwarded = state.forwarder.forward(request, &url, &overrides).await;
    metrics::record_forward(campaign.id(), started);

    let response = forwarded?;
    metrics::record_request(campaign.id(), response.status().as_u16());
    Ok(response)
}

/// Headers that replace their inbound counterparts on the outbound request.
fn sanitized_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut overrides = HeaderMap::new();
    let original = inbound.get(header::USER_AGENT);
    let raw = original
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default();

    let pruned = HeaderValue::from_str(&prune_user_agent(&raw))
        .ok()
        .or_else(|| original.cloned())
        .unwrap_or_else(|| HeaderValue::from_static(""));
    overrides.insert(header::USER_AGENT, pruned);
    overrides
}

fn reject(error: RelayError, request_id: &str, campaign: &str) -> Response {
    let status = error.status();
    if status.is_server_error() {
        tracing::error!(request_id = %request_id, error = %error, "Request failed");
    } else {
        tracing::warn!(request_id = %request_id, error = %error, "Request rejected");
    }
    metrics::record_request(campaign, status.as_u16());
    error.with_request_id(request_id).into_response()
}
