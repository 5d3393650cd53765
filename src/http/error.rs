//! Top-level error rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::campaign::CampaignError;
use crate::forward::ForwardError;
use crate::target::ResolveError;

/// Any failure raised while dispatching a campaign request.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Campaign(#[from] CampaignError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("invalid target URL: {0}")]
    Target(#[from] url::ParseError),

    #[error(transparent)]
    Forward(#[from] ForwardError),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::Resolve(ResolveError::RegionMismatch { .. }) => StatusCode::PRECONDITION_FAILED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Attach the request identifier for rendering.
    pub fn with_request_id(self, request_id: impl Into<String>) -> ErrorResponse {
        ErrorResponse {
            error: self,
            request_id: request_id.into(),
        }
    }
}

/// A [`RelayError`] ready to be sent to the client.
#[derive(Debug)]
pub struct ErrorResponse {
    error: RelayError,
    request_id: String,
}

impl ErrorResponse {
    pub fn error(&self) -> &RelayError {
        &self.error
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = self.error.status();
        let body = json!({
            "status": "error",
            "details": {
                "msg": self.error.to_string(),
                "request_id": self.request_id,
            }
        });
        (status, Json(body)).into_response()
    }
}
