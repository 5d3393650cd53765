//! Dockerflow endpoints.
//!
//! - `/__heartbeat__`: application health, currently "the version file exists"
//! - `/__lbheartbeat__`: load balancer liveness, always `OK`
//! - `/__version__`: the version file as JSON

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::http::server::AppState;

pub async fn heartbeat(State(state): State<AppState>) -> Response {
    let exists = tokio::fs::try_exists(&state.server.version_file)
        .await
        .unwrap_or(false);

    let (status, check) = if exists {
        (StatusCode::OK, "ok")
    } else {
        tracing::warn!(path = %state.server.version_file.display(), "Version file missing");
        (StatusCode::INTERNAL_SERVER_ERROR, "error")
    };

    let body = json!({
        "status": check,
        "checks": { "version_file_exists": check },
        "details": {},
    });
    (status, Json(body)).into_response()
}

pub async fn lbheartbeat() -> &'static str {
    "OK"
}

pub async fn version(State(state): State<AppState>) -> Response {
    match tokio::fs::read(&state.server.version_file).await {
        Ok(contents) => ([(header::CONTENT_TYPE, "application/json")], contents).into_response(),
        Err(e) => {
            tracing::debug!(error = %e, path = %state.server.version_file.display(), "Version file unreadable");
            (StatusCode::NOT_FOUND, "version data not found").into_response()
        }
    }
}
