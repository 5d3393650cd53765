//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, campaign URLs and methods
//! - Verify outbound TLS options are expressible
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Base URLs referencing `${VAR}` are checked after expansion, at registry build

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::Method;
use thiserror::Error;
use url::Url;

use crate::config::schema::{RelayConfig, TlsConfig};
use crate::forward::tls;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address {0:?}")]
    BindAddress(String),

    #[error("campaign identifier must not be blank")]
    BlankCampaignId,

    #[error("duplicate campaign identifier {0:?}")]
    DuplicateCampaign(String),

    #[error("campaign {campaign}: base_url {url:?} is not an absolute http(s) URL")]
    BaseUrl { campaign: String, url: String },

    #[error("campaign {campaign}: invalid method {method:?}")]
    Method { campaign: String, method: String },

    #[error("forward.tls: unknown protocol {0:?}")]
    TlsProtocol(String),

    #[error("forward.tls: unknown cipher suite {0:?}")]
    TlsCipher(String),

    #[error("forward.tls: cert_path and key_path must be given together")]
    TlsClientAuth,

    #[error("forward.tls: PKCS#12 bundles and encrypted keys are not supported; supply PEM cert_path and key_path")]
    TlsUnsupported,
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    let mut seen = HashSet::new();
    for (id, campaign) in &config.campaigns {
        let normalized = id.trim().to_lowercase();
        if normalized.is_empty() {
            errors.push(ValidationError::BlankCampaignId);
            continue;
        }
        if !seen.insert(normalized.clone()) {
            errors.push(ValidationError::DuplicateCampaign(normalized.clone()));
        }

        if let Some(url) = campaign.base_url.as_deref().filter(|u| !u.contains("${")) {
            if !is_http_url(url) {
                errors.push(ValidationError::BaseUrl {
                    campaign: normalized.clone(),
                    url: url.to_string(),
                });
            }
        }

        if let Some(method) = campaign.method.as_deref() {
            if method.trim().to_uppercase().parse::<Method>().is_err() {
                errors.push(ValidationError::Method {
                    campaign: normalized,
                    method: method.to_string(),
                });
            }
        }
    }

    validate_tls(&config.forward.tls, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_tls(config: &TlsConfig, errors: &mut Vec<ValidationError>) {
    if config.pfx_path.is_some() || config.passphrase.is_some() {
        errors.push(ValidationError::TlsUnsupported);
    }
    if config.cert_path.is_some() != config.key_path.is_some() {
        errors.push(ValidationError::TlsClientAuth);
    }
    if let Some(protocol) = config.protocol.as_deref() {
        if tls::parse_protocol(protocol).is_none() {
            errors.push(ValidationError::TlsProtocol(protocol.to_string()));
        }
    }
    if let Some(ciphers) = config.ciphers.as_deref() {
        if let Err(unknown) = tls::select_cipher_suites(ciphers) {
            errors.push(ValidationError::TlsCipher(unknown));
        }
    }
}

fn is_http_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}
