//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → dispatch.rs (campaign lookup, resolve, forward)
//!         ↳ user_agent.rs (outbound User-Agent)
//!         ↳ error.rs (JSON error body, 412/500)
//!     → dockerflow.rs (health and version endpoints)
//! ```

pub mod dispatch;
pub mod dockerflow;
pub mod error;
pub mod request;
pub mod server;
pub mod user_agent;

pub use error::{ErrorResponse, RelayError};
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
