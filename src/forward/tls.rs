//! Client TLS material for `https` upstreams.
//!
//! Certificate validation is always on. Without a configured CA bundle the
//! built-in web PKI roots are trusted.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::crypto::ring;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore, SupportedCipherSuite, SupportedProtocolVersion};
use thiserror::Error;

use crate::config::schema::TlsConfig;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no certificates found in {0}")]
    NoCertificates(PathBuf),

    #[error("no private key found in {0}")]
    NoPrivateKey(PathBuf),

    #[error("unknown TLS protocol {0:?}")]
    UnknownProtocol(String),

    #[error("unknown cipher suite {0:?}")]
    UnknownCipher(String),

    #[error(transparent)]
    Rustls(#[from] rustls::Error),
}

/// Parse a protocol version name. Accepts `TLSv1.2`, `TLSv1_3_method`, `1.3`.
pub fn parse_protocol(raw: &str) -> Option<&'static SupportedProtocolVersion> {
    let normalized = raw.trim().to_lowercase();
    let normalized = normalized.trim_end_matches("_method").replace('_', ".");
    match normalized.as_str() {
        "tlsv1.2" | "tls1.2" | "1.2" => Some(&rustls::version::TLS12),
        "tlsv1.3" | "tls1.3" | "1.3" => Some(&rustls::version::TLS13),
        _ => None,
    }
}

/// Resolve a colon-separated cipher list against the ring provider.
///
/// On failure returns the first unknown name.
pub fn select_cipher_suites(raw: &str) -> Result<Vec<SupportedCipherSuite>, String> {
    let available = ring::default_provider().cipher_suites;
    raw.split(':')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            available
                .iter()
                .find(|suite| format!("{:?}", suite.suite()).eq_ignore_ascii_case(name))
                .copied()
                .ok_or_else(|| name.to_string())
        })
        .collect()
}

/// Build the outbound client configuration.
pub fn build_client_config(config: &TlsConfig) -> Result<Arc<ClientConfig>, TlsError> {
    let mut provider = ring::default_provider();
    if let Some(ciphers) = config.ciphers.as_deref() {
        provider.cipher_suites = select_cipher_suites(ciphers).map_err(TlsError::UnknownCipher)?;
    }

    let versions: Vec<&'static SupportedProtocolVersion> = match config.protocol.as_deref() {
        Some(raw) => vec![parse_protocol(raw).ok_or_else(|| TlsError::UnknownProtocol(raw.to_string()))?],
        None => rustls::DEFAULT_VERSIONS.to_vec(),
    };

    let roots = match config.ca_path.as_deref() {
        Some(path) => {
            let mut store = RootCertStore::empty();
            for cert in load_certs(path)? {
                store.add(cert)?;
            }
            store
        }
        None => RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.into(),
        },
    };

    let builder = ClientConfig::builder_with_provider(Arc::new(provider))
        .with_protocol_versions(&versions)?
        .with_root_certificates(roots);

    let mut client = match (config.cert_path.as_deref(), config.key_path.as_deref()) {
        (Some(cert), Some(key)) => builder.with_client_auth_cert(load_certs(cert)?, load_key(key)?)?,
        _ => builder.with_no_client_auth(),
    };
    client.alpn_protocols = vec![b"http/1.1".to_vec()];

    tracing::debug!(
        client_auth = config.cert_path.is_some(),
        custom_ca = config.ca_path.is_some(),
        "Outbound TLS configured"
    );
    Ok(Arc::new(client))
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path).map(BufReader::new).map_err(|source| TlsError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let certs = rustls_pemfile::certs(&mut open(path)?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    rustls_pemfile::private_key(&mut open(path)?)
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.to_path_buf()))
}
