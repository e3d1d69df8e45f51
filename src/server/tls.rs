//! TLS acceptor construction from PEM material on disk.
//!
//! Certificates and keys are loaded once at startup. Anything wrong with
//! the files (unreadable, empty, or rejected by rustls) surfaces as a
//! [`TlsError`] before the listener binds, never mid-connection.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::sync::Arc;

use rustls_pemfile::{certs, private_key};
use thiserror::Error;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls;

/// Failure to assemble a working TLS acceptor.
#[derive(Debug, Error)]
pub enum TlsError {
    /// The PEM file could not be opened or decoded.
    #[error("failed to load {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The certificate file decoded cleanly but held no certificates.
    #[error("no certificates found in {path}")]
    NoCertificates { path: String },

    /// The key file decoded cleanly but held no private key.
    #[error("no private key found in {path}")]
    NoPrivateKey { path: String },

    /// rustls refused the certificate/key pair.
    #[error("certificate setup rejected: {0}")]
    Rejected(#[from] rustls::Error),
}

impl TlsError {
    fn load(path: &Path, source: io::Error) -> Self {
        TlsError::Load {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Builds a [`TlsAcceptor`] from a PEM certificate chain and private key.
///
/// The key file may hold a PKCS#1, PKCS#8, or SEC1 key; the first one
/// found wins. Client certificates are not requested.
pub fn acceptor_from_pem(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, TlsError> {
    let cert_file = File::open(cert_path).map_err(|e| TlsError::load(cert_path, e))?;
    let mut cert_reader = BufReader::new(cert_file);
    let cert_chain = certs(&mut cert_reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TlsError::load(cert_path, e))?;
    if cert_chain.is_empty() {
        return Err(TlsError::NoCertificates {
            path: cert_path.display().to_string(),
        });
    }

    let key_file = File::open(key_path).map_err(|e| TlsError::load(key_path, e))?;
    let mut key_reader = BufReader::new(key_file);
    let key = private_key(&mut key_reader)
        .map_err(|e| TlsError::load(key_path, e))?
        .ok_or_else(|| TlsError::NoPrivateKey {
            path: key_path.display().to_string(),
        })?;

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    #[test]
    fn missing_certificate_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("absent.pem");
        let key = dir.path().join("absent.key");

        let err = acceptor_from_pem(&cert, &key).err().unwrap();
        assert!(matches!(err, TlsError::Load { .. }));
    }

    #[test]
    fn empty_certificate_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("empty.pem");
        let key = dir.path().join("empty.key");
        File::create(&cert).unwrap();
        File::create(&key).unwrap();

        let err = acceptor_from_pem(&cert, &key).err().unwrap();
        assert!(matches!(err, TlsError::NoCertificates { .. }));
    }

    #[test]
    fn key_file_without_a_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");

        // A syntactically valid PEM block that is not a certificate or key.
        let mut f = File::create(&cert).unwrap();
        f.write_all(b"-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n")
            .unwrap();
        File::create(&key).unwrap();

        // The truncated certificate fails to decode before the key is read.
        let err = acceptor_from_pem(&cert, &key).err().unwrap();
        assert!(matches!(
            err,
            TlsError::Load { .. } | TlsError::NoPrivateKey { .. }
        ));
    }
}
