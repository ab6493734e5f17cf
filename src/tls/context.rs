use crate::base::neterror::NetError;
use crate::tls::options::TlsConfig;
use boring::ssl::SslConnector;
use std::fmt;
use tokio::net::TcpStream;
use tokio_boring::SslStream;

/// Which configuration category produced a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsSource {
    Managers,
    Stores,
    Insecure,
    PlatformDefault,
}

/// How server certificate chains are judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustStrategy {
    /// Platform root certificates.
    Platform,
    /// Only the configured anchors; platform roots are not consulted.
    Anchored,
    /// Anchors and/or custom verification callbacks from trust managers.
    Custom,
    /// Every chain is accepted.
    TrustAll,
}

impl TrustStrategy {
    pub fn accepts_any_chain(&self) -> bool {
        matches!(self, TrustStrategy::TrustAll)
    }
}

/// Whether the server certificate must match the requested host name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostnameVerifier {
    Strict,
    AcceptAll,
}

impl HostnameVerifier {
    pub fn verifies_hostname(&self) -> bool {
        matches!(self, HostnameVerifier::Strict)
    }
}

/// A ready-to-use client TLS context: BoringSSL connector plus the decisions
/// that produced it.
pub struct TlsContext {
    connector: SslConnector,
    source: TlsSource,
    trust: TrustStrategy,
    hostname_verifier: HostnameVerifier,
    has_identity: bool,
}

impl TlsContext {
    pub(crate) fn new(
        connector: SslConnector,
        source: TlsSource,
        trust: TrustStrategy,
        hostname_verifier: HostnameVerifier,
        has_identity: bool,
    ) -> Self {
        Self { connector, source, trust, hostname_verifier, has_identity }
    }

    pub fn source(&self) -> TlsSource {
        self.source
    }

    pub fn trust_strategy(&self) -> TrustStrategy {
        self.trust
    }

    pub fn hostname_verifier(&self) -> HostnameVerifier {
        self.hostname_verifier
    }

    /// True when a client certificate will be presented.
    pub fn has_identity(&self) -> bool {
        self.has_identity
    }

    pub fn connector(&self) -> &SslConnector {
        &self.connector
    }

    /// Run the client handshake for `host` over an established stream.
    pub async fn connect(
        &self,
        host: &str,
        stream: TcpStream,
    ) -> Result<SslStream<TcpStream>, NetError> {
        let mut config = self.connector.configure().map_err(|e| {
            tracing::debug!(error = %e, "cannot configure TLS session");
            NetError::SslProtocolError
        })?;
        config.set_verify_hostname(self.hostname_verifier.verifies_hostname());
        config.set_use_server_name_indication(TlsConfig::should_set_sni(host));

        let domain = host.trim_start_matches('[').trim_end_matches(']');
        tokio_boring::connect(config, domain, stream).await.map_err(|e| {
            tracing::debug!(host, error = ?e, "TLS handshake failed");
            NetError::SslProtocolError
        })
    }
}

impl fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsContext")
            .field("source", &self.source)
            .field("trust", &self.trust)
            .field("hostname_verifier", &self.hostname_verifier)
            .field("has_identity", &self.has_identity)
            .finish_non_exhaustive()
    }
}
