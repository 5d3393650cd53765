//! Request identifiers.
//!
//! Every inbound request carries an `x-request-id`, generated by
//! `SetRequestIdLayer` when the client did not send one, and echoed back on
//! the response.

use axum::http::{HeaderMap, HeaderName};

/// Header carrying the request identifier.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Access to the request identifier.
pub trait RequestIdExt {
    /// The request identifier, or `"unknown"` when none is present.
    fn request_id(&self) -> &str;
}

impl RequestIdExt for HeaderMap {
    fn request_id(&self) -> &str {
        self.get(&X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}

impl<B> RequestIdExt for axum::http::Request<B> {
    fn request_id(&self) -> &str {
        self.headers().request_id()
    }
}
