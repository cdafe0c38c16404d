//! TLS configuration and certificate loading.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use thiserror::Error;

/// ALPN identifier for HTTP/1.1, always offered as a fallback.
pub const HTTP_1_1: &str = "http/1.1";

/// ALPN identifier for HTTP/2 over TLS.
pub const H2: &str = "h2";

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("{what} file not found: {}", .path.display())]
    NotFound { what: &'static str, path: PathBuf },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificates found in {}", .0.display())]
    NoCertificates(PathBuf),

    #[error("no private key found in {}", .0.display())]
    NoPrivateKey(PathBuf),

    #[error("TLS configuration rejected: {0}")]
    Rustls(#[from] rustls::Error),
}

fn open(what: &'static str, path: &Path) -> Result<BufReader<File>, TlsError> {
    // Basic validation
    if !path.exists() {
        return Err(TlsError::NotFound {
            what,
            path: path.to_path_buf(),
        });
    }
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Read every certificate in a PEM file.
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = open("Certificate", path)?;
    let certs = rustls_pemfile::certs(&mut reader)
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

/// Read the first private key in a PEM file.
pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let mut reader = open("Private key", path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.to_path_buf()))
}

fn provider() -> Arc<rustls::crypto::CryptoProvider> {
    Arc::new(rustls::crypto::aws_lc_rs::default_provider())
}

fn alpn_list<S: AsRef<str>>(protocols: &[S]) -> Vec<Vec<u8>> {
    protocols.iter().map(|p| p.as_ref().as_bytes().to_vec()).collect()
}

/// Build a server configuration advertising `alpn` in preference order.
pub fn server_config<S: AsRef<str>>(
    cert_path: &Path,
    key_path: &Path,
    alpn: &[S],
) -> Result<RustlsConfig, TlsError> {
    let certs = load_certs(cert_path)?;
    let key = load_private_key(key_path)?;

    let mut config = ServerConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = alpn_list(alpn);

    Ok(RustlsConfig::from_config(Arc::new(config)))
}

/// Build a client configuration trusting the anchors in `ca_path` and
/// offering `alpn` in preference order.
pub fn client_config<S: AsRef<str>>(ca_path: &Path, alpn: &[S]) -> Result<Arc<ClientConfig>, TlsError> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(ca_path)? {
        roots.add(cert)?;
    }

    let mut config = ClientConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = alpn_list(alpn);

    Ok(Arc::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_pair(dir: &Path) -> (PathBuf, PathBuf) {
        let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let cert = dir.join("server.crt");
        let key = dir.join("server.key");
        std::fs::write(&cert, certified.cert.pem()).unwrap();
        std::fs::write(&key, certified.key_pair.serialize_pem()).unwrap();
        (cert, key)
    }

    #[test]
    fn missing_files_are_reported_by_kind() {
        let err = load_certs(Path::new("/nonexistent/server.crt")).unwrap_err();
        assert!(matches!(err, TlsError::NotFound { what: "Certificate", .. }));
        let err = load_private_key(Path::new("/nonexistent/server.key")).unwrap_err();
        assert!(err.to_string().starts_with("Private key file not found"));
    }

    #[test]
    fn empty_pem_has_no_certificates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pem");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(load_certs(&path), Err(TlsError::NoCertificates(_))));
        assert!(matches!(load_private_key(&path), Err(TlsError::NoPrivateKey(_))));
    }

    #[test]
    fn client_config_carries_alpn_preferences() {
        let dir = tempfile::tempdir().unwrap();
        let (cert, _) = write_pair(dir.path());
        let config = client_config(&cert, &[H2, HTTP_1_1]).unwrap();
        assert_eq!(config.alpn_protocols, vec![b"h2".to_vec(), b"http/1.1".to_vec()]);
    }

    #[test]
    fn server_config_accepts_generated_pair() {
        let dir = tempfile::tempdir().unwrap();
        let (cert, key) = write_pair(dir.path());
        assert!(server_config(&cert, &key, &[H2, HTTP_1_1]).is_ok());
    }
}
