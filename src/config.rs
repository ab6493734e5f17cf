//! Connection manager configuration.
//!
//! One configuration type feeds every manager constructor. It is read once
//! per construction and never mutated by the manager afterwards.
//!
//! ```rust,ignore
//! use connmgr::config::ConnectionManagerConfig;
//!
//! let config = ConnectionManagerConfig::from_json(r#"{
//!     "threads": 8,
//!     "default-per-route": 4,
//!     "trust-store": "/etc/ssl/internal-ca.pem",
//!     "trust-store-type": "pem"
//! }"#)?;
//! ```

use crate::base::neterror::NetError;
use crate::dns::Resolve;
use crate::reactor::IoReactorConfig;
use crate::registry::RegistrySource;
use crate::tls::{KeyManager, OneOrMany, StoreSource, StoreType, TrustManager};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use zeroize::Zeroizing;

/// Time-to-live of pooled connections, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
/// Maximum total connections of a pooling manager.
pub const DEFAULT_THREADS: usize = 4;
/// Maximum connections per route when `default-per-route` is absent.
pub const DEFAULT_MAX_PER_ROUTE: usize = 2;

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_threads() -> usize {
    DEFAULT_THREADS
}

/// Recognized options for every connection manager constructor.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConnectionManagerConfig {
    /// Custom host resolution; the system resolver when absent.
    #[serde(skip)]
    pub dns_resolver: Option<Arc<dyn Resolve>>,
    /// Pooled connection time-to-live. Always seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Maximum total connections of pooling managers.
    #[serde(default = "default_threads")]
    pub threads: usize,
    pub default_per_route: Option<usize>,
    /// Accept any server certificate and any host name.
    #[serde(default, rename = "insecure?", alias = "insecure")]
    pub insecure: bool,
    pub keystore: Option<StoreSource>,
    pub keystore_type: Option<StoreType>,
    pub keystore_pass: Option<Zeroizing<String>>,
    pub trust_store: Option<StoreSource>,
    pub trust_store_type: Option<StoreType>,
    pub trust_store_pass: Option<Zeroizing<String>>,
    #[serde(skip)]
    pub key_managers: Option<OneOrMany<KeyManager>>,
    #[serde(skip)]
    pub trust_managers: Option<OneOrMany<TrustManager>>,
    /// Read timeout of basic-manager connections, in milliseconds.
    pub socket_timeout: Option<u64>,
    pub io_config: Option<IoReactorConfig>,
    /// Replaces the default `http`/`https` registry.
    #[serde(skip)]
    pub registry: Option<RegistrySource>,
}

impl Default for ConnectionManagerConfig {
    fn default() -> Self {
        Self {
            dns_resolver: None,
            timeout: DEFAULT_TIMEOUT_SECS,
            threads: DEFAULT_THREADS,
            default_per_route: None,
            insecure: false,
            keystore: None,
            keystore_type: None,
            keystore_pass: None,
            trust_store: None,
            trust_store_type: None,
            trust_store_pass: None,
            key_managers: None,
            trust_managers: None,
            socket_timeout: None,
            io_config: None,
            registry: None,
        }
    }
}

impl ConnectionManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the serializable options from JSON with kebab-case keys.
    pub fn from_json(json: &str) -> Result<Self, NetError> {
        serde_json::from_str(json)
            .map_err(|e| NetError::invalid_argument(format!("invalid configuration: {}", e)))
    }

    pub fn dns_resolver(mut self, resolver: Arc<dyn Resolve>) -> Self {
        self.dns_resolver = Some(resolver);
        self
    }

    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout = secs;
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn default_per_route(mut self, max: usize) -> Self {
        self.default_per_route = Some(max);
        self
    }

    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn keystore(
        mut self,
        source: impl Into<StoreSource>,
        kind: Option<StoreType>,
        password: Option<&str>,
    ) -> Self {
        self.keystore = Some(source.into());
        self.keystore_type = kind;
        self.keystore_pass = password.map(|p| Zeroizing::new(p.to_string()));
        self
    }

    pub fn trust_store(
        mut self,
        source: impl Into<StoreSource>,
        kind: Option<StoreType>,
        password: Option<&str>,
    ) -> Self {
        self.trust_store = Some(source.into());
        self.trust_store_type = kind;
        self.trust_store_pass = password.map(|p| Zeroizing::new(p.to_string()));
        self
    }

    pub fn key_managers(mut self, managers: impl Into<OneOrMany<KeyManager>>) -> Self {
        self.key_managers = Some(managers.into());
        self
    }

    pub fn trust_managers(mut self, managers: impl Into<OneOrMany<TrustManager>>) -> Self {
        self.trust_managers = Some(managers.into());
        self
    }

    pub fn socket_timeout(mut self, millis: u64) -> Self {
        self.socket_timeout = Some(millis);
        self
    }

    pub fn io_config(mut self, io_config: IoReactorConfig) -> Self {
        self.io_config = Some(io_config);
        self
    }

    pub fn registry(mut self, registry: impl Into<RegistrySource>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    /// Pooled connection time-to-live; `None` when `timeout` is zero.
    pub fn time_to_live(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(self.timeout))
    }

    pub fn socket_timeout_duration(&self) -> Option<Duration> {
        self.socket_timeout.filter(|ms| *ms > 0).map(Duration::from_millis)
    }

    pub fn max_per_route(&self) -> usize {
        self.default_per_route.unwrap_or(DEFAULT_MAX_PER_ROUTE)
    }

    pub(crate) fn has_managers(&self) -> bool {
        self.key_managers.is_some() || self.trust_managers.is_some()
    }

    pub(crate) fn has_stores(&self) -> bool {
        self.keystore.is_some() || self.trust_store.is_some()
    }
}

impl fmt::Debug for ConnectionManagerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManagerConfig")
            .field("dns_resolver", &self.dns_resolver.is_some())
            .field("timeout", &self.timeout)
            .field("threads", &self.threads)
            .field("default_per_route", &self.default_per_route)
            .field("insecure", &self.insecure)
            .field("keystore", &self.keystore)
            .field("keystore_type", &self.keystore_type)
            .field("trust_store", &self.trust_store)
            .field("trust_store_type", &self.trust_store_type)
            .field("key_managers", &self.key_managers)
            .field("trust_managers", &self.trust_managers)
            .field("socket_timeout", &self.socket_timeout)
            .field("io_config", &self.io_config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
