//! Turns connection manager options into a [`TlsContext`].
//!
//! Exactly one category of options decides the context, first match wins:
//!
//! 1. explicit key/trust managers
//! 2. keystore and/or trust store
//! 3. `insecure?`
//! 4. the platform default
//!
//! Lower categories are ignored once a higher one is present.

use crate::base::context::TlsResultExt;
use crate::base::neterror::NetError;
use crate::config::ConnectionManagerConfig;
use crate::tls::context::{HostnameVerifier, TlsContext, TlsSource, TrustStrategy};
use crate::tls::keystore::KeyStore;
use crate::tls::managers::{KeyManager, TrustManager, VerifyFn};
use crate::tls::options::TlsConfig;
use boring::pkey::{PKey, Private};
use boring::ssl::{SslConnector, SslConnectorBuilder, SslMethod, SslVerifyMode};
use boring::x509::store::X509StoreBuilder;
use boring::x509::X509;
use std::sync::Arc;

/// Build the TLS context described by `config`.
pub fn resolve(config: &ConnectionManagerConfig) -> Result<TlsContext, NetError> {
    let verifier = hostname_verifier(config);
    let mut builder = base_builder()?;

    let (source, trust, has_identity) = if config.has_managers() {
        let keys = config.key_managers.as_ref().map(|m| m.to_vec()).unwrap_or_default();
        let trusts = config.trust_managers.as_ref().map(|m| m.to_vec()).unwrap_or_default();
        let (trust, has_identity) = from_managers(&mut builder, &keys, &trusts)?;
        (TlsSource::Managers, trust, has_identity)
    } else if config.has_stores() {
        let (trust, has_identity) = from_stores(&mut builder, config)?;
        (TlsSource::Stores, trust, has_identity)
    } else if config.insecure {
        tracing::warn!("TLS certificate verification disabled");
        builder.set_verify(SslVerifyMode::NONE);
        (TlsSource::Insecure, TrustStrategy::TrustAll, false)
    } else {
        (TlsSource::PlatformDefault, TrustStrategy::Platform, false)
    };

    tracing::debug!(?source, ?trust, ?verifier, has_identity, "resolved TLS context");
    Ok(TlsContext::new(builder.build(), source, trust, verifier, has_identity))
}

/// Accept-all when `insecure?` is set, strict otherwise.
pub fn hostname_verifier(config: &ConnectionManagerConfig) -> HostnameVerifier {
    if config.insecure {
        HostnameVerifier::AcceptAll
    } else {
        HostnameVerifier::Strict
    }
}

fn base_builder() -> Result<SslConnectorBuilder, NetError> {
    let mut builder =
        SslConnector::builder(SslMethod::tls()).tls_context("creating TLS connector")?;
    TlsConfig::default().apply_to_builder(&mut builder)?;
    Ok(builder)
}

fn from_managers(
    builder: &mut SslConnectorBuilder,
    keys: &[KeyManager],
    trusts: &[TrustManager],
) -> Result<(TrustStrategy, bool), NetError> {
    // Only the first key manager can present an identity.
    let has_identity = match keys.first() {
        Some(key) => {
            install_identity(builder, key.certificate(), key.chain(), key.private_key())?;
            true
        }
        None => false,
    };

    if trusts.is_empty() {
        return Ok((TrustStrategy::Platform, has_identity));
    }

    let mut anchors = Vec::new();
    let mut verifiers: Vec<Arc<VerifyFn>> = Vec::new();
    for trust in trusts {
        match trust {
            TrustManager::Anchors(certs) => anchors.extend(certs.iter().cloned()),
            TrustManager::Verifier(f) => verifiers.push(f.clone()),
        }
    }

    if !anchors.is_empty() {
        install_anchors(builder, anchors)?;
    }
    if !verifiers.is_empty() {
        builder.set_verify_callback(SslVerifyMode::PEER, move |preverified, ctx| {
            verifiers.iter().all(|verify| verify(preverified, ctx))
        });
    }
    Ok((TrustStrategy::Custom, has_identity))
}

fn from_stores(
    builder: &mut SslConnectorBuilder,
    config: &ConnectionManagerConfig,
) -> Result<(TrustStrategy, bool), NetError> {
    let mut has_identity = false;
    if let Some(source) = &config.keystore {
        let store = source.resolve(
            config.keystore_type.unwrap_or_default(),
            config.keystore_pass.as_deref().map(String::as_str),
        )?;
        let (leaf, chain, key) = store
            .identity()
            .ok_or_else(|| NetError::tls_configuration("keystore holds no private key"))?;
        install_identity(builder, leaf, chain, key)?;
        has_identity = true;
    }

    let trust = match &config.trust_store {
        Some(source) => {
            let store: KeyStore = source.resolve(
                config.trust_store_type.unwrap_or_default(),
                config.trust_store_pass.as_deref().map(String::as_str),
            )?;
            if store.certificates().is_empty() {
                return Err(NetError::tls_configuration("trust store holds no certificates"));
            }
            install_anchors(builder, store.certificates().to_vec())?;
            TrustStrategy::Anchored
        }
        None => TrustStrategy::Platform,
    };
    Ok((trust, has_identity))
}

fn install_identity(
    builder: &mut SslConnectorBuilder,
    leaf: &X509,
    chain: &[X509],
    key: &PKey<Private>,
) -> Result<(), NetError> {
    builder.set_certificate(leaf).tls_context("installing client certificate")?;
    builder.set_private_key(key).tls_context("installing client private key")?;
    for cert in chain {
        builder.add_extra_chain_cert(cert.clone()).tls_context("installing certificate chain")?;
    }
    builder.check_private_key().tls_context("client certificate does not match private key")
}

/// Replace the verification store with `anchors`; platform roots are no
/// longer consulted.
fn install_anchors(builder: &mut SslConnectorBuilder, anchors: Vec<X509>) -> Result<(), NetError> {
    let mut store = X509StoreBuilder::new().tls_context("creating trust store")?;
    for cert in anchors {
        store.add_cert(cert).tls_context("adding trust anchor")?;
    }
    builder.set_cert_store(store.build());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::keystore::StoreType;

    #[test]
    fn test_platform_default() {
        let ctx = resolve(&ConnectionManagerConfig::default()).unwrap();
        assert_eq!(ctx.source(), TlsSource::PlatformDefault);
        assert_eq!(ctx.trust_strategy(), TrustStrategy::Platform);
        assert_eq!(ctx.hostname_verifier(), HostnameVerifier::Strict);
        assert!(!ctx.has_identity());
    }

    #[test]
    fn test_insecure() {
        let ctx = resolve(&ConnectionManagerConfig::new().insecure(true)).unwrap();
        assert_eq!(ctx.source(), TlsSource::Insecure);
        assert!(ctx.trust_strategy().accepts_any_chain());
        assert!(!ctx.hostname_verifier().verifies_hostname());
    }

    #[test]
    fn test_managers_win_over_insecure() {
        let config = ConnectionManagerConfig::new()
            .insecure(true)
            .trust_managers(TrustManager::verifier(|ok, _| ok));
        let ctx = resolve(&config).unwrap();
        assert_eq!(ctx.source(), TlsSource::Managers);
        assert_eq!(ctx.trust_strategy(), TrustStrategy::Custom);
        // The host name check still follows the insecure flag.
        assert_eq!(ctx.hostname_verifier(), HostnameVerifier::AcceptAll);
    }

    #[test]
    fn test_managers_win_over_stores() {
        let config = ConnectionManagerConfig::new()
            .trust_store("/nonexistent/truststore.pem", Some(StoreType::Pem), None)
            .trust_managers(TrustManager::anchors(vec![]));
        let ctx = resolve(&config).unwrap();
        assert_eq!(ctx.source(), TlsSource::Managers);
    }

    #[test]
    fn test_unreadable_store_fails() {
        let config = ConnectionManagerConfig::new()
            .keystore("/nonexistent/keystore.p12", None, Some("changeit"));
        let err = resolve(&config).unwrap_err();
        assert!(matches!(err, NetError::TlsConfiguration { .. }));
    }

    #[test]
    fn test_keystore_without_key_fails() {
        let config = ConnectionManagerConfig::new().keystore(KeyStore::default(), None, None);
        let err = resolve(&config).unwrap_err();
        assert!(matches!(err, NetError::TlsConfiguration { .. }));
    }
}
