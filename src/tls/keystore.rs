//! Identity and trust material loaded from store files or pre-built stores.

use crate::base::context::{IoResultExt, TlsResultExt};
use crate::base::neterror::NetError;
use boring::pkcs12::Pkcs12;
use boring::pkey::{PKey, Private};
use boring::x509::X509;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// On-disk encoding of a key or trust store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum StoreType {
    /// PKCS#12 archive (`.p12`/`.pfx`).
    #[default]
    Pkcs12,
    /// PEM certificates, optionally followed by a private key.
    Pem,
    /// A single DER certificate.
    Der,
}

impl FromStr for StoreType {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pkcs12" | "p12" | "pfx" => Ok(StoreType::Pkcs12),
            "pem" => Ok(StoreType::Pem),
            "der" | "cer" | "crt" => Ok(StoreType::Der),
            other => Err(NetError::tls_configuration(format!("unsupported store type: {}", other))),
        }
    }
}

impl TryFrom<String> for StoreType {
    type Error = NetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Certificates plus an optional private key.
///
/// When a key is present the first certificate is the matching leaf and the
/// rest form its chain.
#[derive(Clone, Default)]
pub struct KeyStore {
    key: Option<PKey<Private>>,
    certificates: Vec<X509>,
}

impl KeyStore {
    pub fn new(certificates: Vec<X509>, key: Option<PKey<Private>>) -> Self {
        Self { key, certificates }
    }

    pub fn from_pkcs12(der: &[u8], password: &str) -> Result<Self, NetError> {
        let archive = Pkcs12::from_der(der).tls_context("malformed PKCS#12 store")?;
        let parsed = archive.parse(password).tls_context("cannot decrypt PKCS#12 store")?;

        let mut certificates = vec![parsed.cert];
        if let Some(chain) = parsed.chain {
            certificates.extend(chain.into_iter());
        }
        Ok(Self { key: Some(parsed.pkey), certificates })
    }

    pub fn from_pem(pem: &[u8], password: Option<&str>) -> Result<Self, NetError> {
        let certificates = X509::stack_from_pem(pem).tls_context("malformed PEM certificates")?;

        let has_key = pem.windows(11).any(|w| w == b"PRIVATE KEY");
        let key = if has_key {
            let key = match password {
                Some(pass) => PKey::private_key_from_pem_passphrase(pem, pass.as_bytes()),
                None => PKey::private_key_from_pem(pem),
            };
            Some(key.tls_context("cannot read PEM private key")?)
        } else {
            None
        };

        if certificates.is_empty() && key.is_none() {
            return Err(NetError::tls_configuration("PEM store contains no certificates"));
        }
        Ok(Self { key, certificates })
    }

    pub fn from_der(der: &[u8]) -> Result<Self, NetError> {
        let cert = X509::from_der(der).tls_context("malformed DER certificate")?;
        Ok(Self { key: None, certificates: vec![cert] })
    }

    /// Read and decode a store file. The password is only consulted by
    /// encrypted formats.
    pub fn load(path: &Path, kind: StoreType, password: Option<&str>) -> Result<Self, NetError> {
        let bytes = std::fs::read(path).store_context(&path.display().to_string())?;
        tracing::debug!(path = %path.display(), ?kind, "loading TLS store");
        match kind {
            StoreType::Pkcs12 => Self::from_pkcs12(&bytes, password.unwrap_or("")),
            StoreType::Pem => Self::from_pem(&bytes, password),
            StoreType::Der => Self::from_der(&bytes),
        }
    }

    pub fn private_key(&self) -> Option<&PKey<Private>> {
        self.key.as_ref()
    }

    pub fn certificates(&self) -> &[X509] {
        &self.certificates
    }

    /// Leaf certificate, chain and key, when the store holds an identity.
    pub fn identity(&self) -> Option<(&X509, &[X509], &PKey<Private>)> {
        let key = self.key.as_ref()?;
        let (leaf, chain) = self.certificates.split_first()?;
        Some((leaf, chain, key))
    }
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore")
            .field("certificates", &self.certificates.len())
            .field("has_key", &self.key.is_some())
            .finish()
    }
}

/// Where a store comes from: already in memory, or a file to load.
#[derive(Debug, Clone)]
pub enum StoreSource {
    Loaded(KeyStore),
    Path(PathBuf),
}

impl StoreSource {
    pub fn resolve(&self, kind: StoreType, password: Option<&str>) -> Result<KeyStore, NetError> {
        match self {
            StoreSource::Loaded(store) => Ok(store.clone()),
            StoreSource::Path(path) => KeyStore::load(path, kind, password),
        }
    }
}

impl From<KeyStore> for StoreSource {
    fn from(store: KeyStore) -> Self {
        StoreSource::Loaded(store)
    }
}

impl From<PathBuf> for StoreSource {
    fn from(path: PathBuf) -> Self {
        StoreSource::Path(path)
    }
}

impl From<&str> for StoreSource {
    fn from(path: &str) -> Self {
        StoreSource::Path(PathBuf::from(path))
    }
}

impl<'de> Deserialize<'de> for StoreSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        PathBuf::deserialize(deserializer).map(StoreSource::Path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_type_parsing() {
        assert_eq!("PKCS12".parse::<StoreType>().unwrap(), StoreType::Pkcs12);
        assert_eq!("p12".parse::<StoreType>().unwrap(), StoreType::Pkcs12);
        assert_eq!("pem".parse::<StoreType>().unwrap(), StoreType::Pem);
        assert_eq!(StoreType::default(), StoreType::Pkcs12);
    }

    #[test]
    fn test_jks_is_rejected() {
        let err = "jks".parse::<StoreType>().unwrap_err();
        assert!(matches!(err, NetError::TlsConfiguration { .. }));
    }

    #[test]
    fn test_missing_file_is_tls_configuration_error() {
        let err = KeyStore::load(Path::new("/nonexistent/keystore.p12"), StoreType::Pkcs12, None)
            .unwrap_err();
        assert!(matches!(err, NetError::TlsConfiguration { .. }));
    }

    #[test]
    fn test_garbage_pkcs12_rejected() {
        let err = KeyStore::from_pkcs12(b"not a keystore", "changeit").unwrap_err();
        assert!(matches!(err, NetError::TlsConfiguration { .. }));
    }

    #[test]
    fn test_empty_pem_rejected() {
        assert!(KeyStore::from_pem(b"", None).is_err());
    }

    #[test]
    fn test_store_source_deserializes_as_path() {
        let source: StoreSource = serde_json::from_str("\"/etc/ssl/client.p12\"").unwrap();
        assert!(matches!(source, StoreSource::Path(p) if p == Path::new("/etc/ssl/client.p12")));
    }
}
