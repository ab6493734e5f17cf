//! Explicit key and trust managers: identity and trust supplied as objects
//! rather than store files.

use crate::base::neterror::NetError;
use crate::tls::keystore::KeyStore;
use boring::pkey::{PKey, Private};
use boring::x509::{X509StoreContextRef, X509};
use std::fmt;
use std::sync::Arc;

/// Custom chain verification: receives the pre-verification result and the
/// store context, returns whether to accept.
pub type VerifyFn = dyn Fn(bool, &mut X509StoreContextRef) -> bool + Send + Sync;

/// Supplies the client certificate presented during the handshake.
#[derive(Clone)]
pub struct KeyManager {
    certificate: X509,
    chain: Vec<X509>,
    key: PKey<Private>,
}

impl KeyManager {
    pub fn new(certificate: X509, key: PKey<Private>) -> Self {
        Self { certificate, chain: Vec::new(), key }
    }

    pub fn with_chain(mut self, chain: Vec<X509>) -> Self {
        self.chain = chain;
        self
    }

    /// Use the identity held by a key store.
    pub fn from_key_store(store: &KeyStore) -> Result<Self, NetError> {
        let (leaf, chain, key) = store
            .identity()
            .ok_or_else(|| NetError::tls_configuration("key store holds no private key"))?;
        Ok(Self { certificate: leaf.clone(), chain: chain.to_vec(), key: key.clone() })
    }

    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    pub fn chain(&self) -> &[X509] {
        &self.chain
    }

    pub fn private_key(&self) -> &PKey<Private> {
        &self.key
    }
}

impl fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyManager").field("chain", &self.chain.len()).finish_non_exhaustive()
    }
}

/// Decides which server certificate chains are trusted.
#[derive(Clone)]
pub enum TrustManager {
    /// Trust chains that end in one of these anchors.
    Anchors(Vec<X509>),
    /// Run a custom check on every certificate in the chain.
    Verifier(Arc<VerifyFn>),
}

impl TrustManager {
    pub fn anchors(certificates: Vec<X509>) -> Self {
        TrustManager::Anchors(certificates)
    }

    pub fn verifier<F>(f: F) -> Self
    where
        F: Fn(bool, &mut X509StoreContextRef) -> bool + Send + Sync + 'static,
    {
        TrustManager::Verifier(Arc::new(f))
    }
}

impl fmt::Debug for TrustManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustManager::Anchors(certs) => f.debug_tuple("Anchors").field(&certs.len()).finish(),
            TrustManager::Verifier(_) => f.write_str("Verifier(..)"),
        }
    }
}

/// A single manager or a collection of them; normalized to a `Vec`.
#[derive(Debug, Clone)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }

    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.clone().into_vec()
    }
}

impl From<KeyManager> for OneOrMany<KeyManager> {
    fn from(item: KeyManager) -> Self {
        OneOrMany::One(item)
    }
}

impl From<TrustManager> for OneOrMany<TrustManager> {
    fn from(item: TrustManager) -> Self {
        OneOrMany::One(item)
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(items: Vec<T>) -> Self {
        OneOrMany::Many(items)
    }
}
