//! Request forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! Resolved target URL + inbound request
//!     → request.rs (outbound request line and headers)
//!     → connector.rs (fresh TCP/TLS connection, HTTP/1.1 handshake)
//!     → response.rs (cookie stripping, redirect flattening, framing)
//!     → forwarder.rs (streaming response back to the client)
//! ```

pub mod connector;
pub mod forwarder;
pub mod request;
pub mod response;
pub mod tls;

pub use forwarder::{ForwardError, Forwarder};
pub use tls::TlsError;
