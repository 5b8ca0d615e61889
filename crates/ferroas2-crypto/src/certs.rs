//! Certificate and private-key lookup by AS2 id.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use openssl::pkey::{PKey, Private};
use openssl::x509::X509;

use crate::error::{CryptoError, CryptoResult};

const CERT_EXTENSIONS: [&str; 3] = ["pem", "crt", "cer"];
const KEY_EXTENSION: &str = "key";

/// Read-mostly lookup shared by every pipeline; implementations must be safe to call
/// concurrently.
pub trait CertificateStore: Send + Sync {
    fn certificate(&self, id: &str) -> CryptoResult<X509>;

    fn private_key(&self, id: &str) -> CryptoResult<PKey<Private>>;

    fn has_private_key(&self, id: &str) -> bool;
}

/// In-memory store, filled up front.
#[derive(Clone, Default)]
pub struct MemoryCertificateStore {
    certificates: HashMap<String, X509>,
    keys: HashMap<String, PKey<Private>>,
}

impl MemoryCertificateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_certificate(&mut self, id: impl Into<String>, cert: X509) {
        self.certificates.insert(id.into(), cert);
    }

    pub fn insert_private_key(&mut self, id: impl Into<String>, key: PKey<Private>) {
        self.keys.insert(id.into(), key);
    }

    /// Certificate plus private key, as held for the local company.
    pub fn with_identity(mut self, id: &str, cert: X509, key: PKey<Private>) -> Self {
        self.insert_certificate(id, cert);
        self.insert_private_key(id, key);
        self
    }

    pub fn with_certificate(mut self, id: &str, cert: X509) -> Self {
        self.insert_certificate(id, cert);
        self
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.certificates.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl CertificateStore for MemoryCertificateStore {
    fn certificate(&self, id: &str) -> CryptoResult<X509> {
        self.certificates
            .get(id)
            .cloned()
            .ok_or_else(|| CryptoError::CertificateNotFound(id.to_string()))
    }

    fn private_key(&self, id: &str) -> CryptoResult<PKey<Private>> {
        self.keys
            .get(id)
            .cloned()
            .ok_or_else(|| CryptoError::PrivateKeyNotFound(id.to_string()))
    }

    fn has_private_key(&self, id: &str) -> bool {
        self.keys.contains_key(id)
    }
}

/// Certificates and keys loaded once from a directory:
/// `<id>.pem|.crt|.cer` (PEM or DER) and `<id>.key` (PEM).
pub struct PemDirectoryStore {
    directory: PathBuf,
    inner: MemoryCertificateStore,
}

impl PemDirectoryStore {
    pub fn load(directory: impl Into<PathBuf>) -> CryptoResult<Self> {
        let directory = directory.into();
        let mut inner = MemoryCertificateStore::new();

        if !directory.is_dir() {
            tracing::warn!(dir = %directory.display(), "Certificate directory does not exist");
            return Ok(Self { directory, inner });
        }

        for entry in fs::read_dir(&directory)? {
            let path = entry?.path();
            let (Some(stem), Some(ext)) = (
                path.file_stem().and_then(|s| s.to_str()),
                path.extension().and_then(|s| s.to_str()),
            ) else {
                continue;
            };
            let ext = ext.to_ascii_lowercase();

            if CERT_EXTENSIONS.contains(&ext.as_str()) {
                inner.insert_certificate(stem, read_certificate(&path)?);
            } else if ext == KEY_EXTENSION {
                inner.insert_private_key(stem, read_private_key(&path)?);
            }
        }

        tracing::info!(
            dir = %directory.display(),
            certificates = inner.certificates.len(),
            keys = inner.keys.len(),
            "Loaded certificate store"
        );
        Ok(Self { directory, inner })
    }

    /// Use `file_name` (relative to the store directory) as the certificate for `id`.
    pub fn register_certificate_file(&mut self, id: &str, file_name: &str) -> CryptoResult<()> {
        let path = self.directory.join(file_name);
        let cert = read_certificate(&path)?;
        self.inner.insert_certificate(id, cert);
        Ok(())
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl CertificateStore for PemDirectoryStore {
    fn certificate(&self, id: &str) -> CryptoResult<X509> {
        self.inner.certificate(id)
    }

    fn private_key(&self, id: &str) -> CryptoResult<PKey<Private>> {
        self.inner.private_key(id)
    }

    fn has_private_key(&self, id: &str) -> bool {
        self.inner.has_private_key(id)
    }
}

fn read_certificate(path: &Path) -> CryptoResult<X509> {
    let data = fs::read(path)?;
    X509::from_pem(&data)
        .or_else(|_| X509::from_der(&data))
        .map_err(|e| {
            CryptoError::Security(format!(
                "Unable to read certificate {}: {}",
                path.display(),
                e
            ))
        })
}

fn read_private_key(path: &Path) -> CryptoResult<PKey<Private>> {
    let data = fs::read(path)?;
    PKey::private_key_from_pem(&data).map_err(|e| {
        CryptoError::Security(format!(
            "Unable to read private key {}: {}",
            path.display(),
            e
        ))
    })
}
