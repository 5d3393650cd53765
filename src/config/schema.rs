//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::target::rules::TargetRules;

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Auxiliary HTTP surface (dockerflow, dev routes).
    pub server: ServerConfig,

    /// Outbound forwarding options.
    pub forward: ForwardConfig,

    /// Business rules applied while building target URLs.
    pub rules: TargetRules,

    /// Campaign definitions keyed by identifier.
    pub campaigns: HashMap<String, CampaignConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Inbound request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Outbound forward timeout in seconds. Unset means no timeout.
    pub forward_secs: Option<u64>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            forward_secs: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or an EnvFilter directive.
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Auxiliary HTTP endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Path of the version file served by `/__version__`.
    pub version_file: PathBuf,

    /// Mount the `/test` echo upstream (development only).
    pub dev_routes: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version_file: PathBuf::from("version.json"),
            dev_routes: false,
        }
    }
}

/// Outbound forwarding configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ForwardConfig {
    /// TLS material for `https` upstreams.
    pub tls: TlsConfig,
}

/// Client TLS options passed through to `https` upstreams.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TlsConfig {
    /// Client certificate chain (PEM).
    pub cert_path: Option<PathBuf>,

    /// Client private key (PEM).
    pub key_path: Option<PathBuf>,

    /// CA bundle (PEM). Replaces the built-in web roots when set.
    pub ca_path: Option<PathBuf>,

    /// Colon-separated cipher suite names.
    pub ciphers: Option<String>,

    /// Explicit protocol version ("TLSv1.2", "TLSv1.3").
    pub protocol: Option<String>,

    /// PKCS#12 bundle. Not supported; rejected by validation.
    pub pfx_path: Option<PathBuf>,

    /// Key passphrase. Not supported; rejected by validation.
    pub passphrase: Option<String>,
}

/// A single campaign definition.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CampaignConfig {
    /// Absolute base URL; may reference `${VAR}`.
    pub base_url: Option<String>,

    /// Allowed request method (default: GET).
    pub method: Option<String>,

    /// Query template in declaration order.
    pub query: OrderedParams,
}

/// String pairs that keep their document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedParams(Vec<(String, String)>);

impl OrderedParams {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self(pairs.into_iter().collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for OrderedParams {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = OrderedParams;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a table of string values")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, String>()? {
                    pairs.push((key, value));
                }
                Ok(OrderedParams(pairs))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}
