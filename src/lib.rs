//! Campaign relay library.
//!
//! Resolves `/cid/<campaign>` requests to partner target URLs and forwards
//! them without exposing the upstream to the client.

pub mod campaign;
pub mod config;
pub mod forward;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod target;

pub use config::schema::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
