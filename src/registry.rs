//! Scheme → connection socket factory registry.
//!
//! A registry is built once and shared by every connection its manager opens.
//! Scheme keys are case-insensitive.

use crate::base::neterror::NetError;
use crate::socket::factory::{socket_factories, ConnectionSocketFactory};
use crate::socket::provider::SocketProvider;
use crate::tls::TlsContext;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Immutable scheme → factory mapping.
#[derive(Clone)]
pub struct Registry {
    factories: Arc<HashMap<String, Arc<dyn ConnectionSocketFactory>>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Normalize either a built registry or a raw mapping.
    pub fn from_source(source: RegistrySource) -> Result<Self, NetError> {
        match source {
            RegistrySource::Built(registry) => Ok(registry),
            RegistrySource::Mapping(mapping) => {
                let mut builder = RegistryBuilder::new();
                for (scheme, factory) in mapping {
                    builder = builder.register(scheme, factory);
                }
                builder.build()
            }
        }
    }

    /// The standard `http` (plain) and `https` (TLS) registry over one
    /// provider.
    pub fn with_defaults(provider: Arc<dyn SocketProvider>, tls: Arc<TlsContext>) -> Self {
        let (plain, secure) = socket_factories(provider, tls);
        let mut factories: HashMap<String, Arc<dyn ConnectionSocketFactory>> = HashMap::new();
        factories.insert("http".to_string(), Arc::new(plain));
        factories.insert("https".to_string(), Arc::new(secure));
        Self { factories: Arc::new(factories) }
    }

    /// The factory registered for `scheme`, exactly as it was registered.
    pub fn lookup(&self, scheme: &str) -> Option<Arc<dyn ConnectionSocketFactory>> {
        self.factories.get(&scheme.to_ascii_lowercase()).cloned()
    }

    pub fn contains(&self, scheme: &str) -> bool {
        self.factories.contains_key(&scheme.to_ascii_lowercase())
    }

    pub fn schemes(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut schemes: Vec<_> = self.schemes().collect();
        schemes.sort_unstable();
        f.debug_struct("Registry").field("schemes", &schemes).finish()
    }
}

/// Input accepted wherever a registry is configured.
#[derive(Clone)]
pub enum RegistrySource {
    Built(Registry),
    Mapping(HashMap<String, Arc<dyn ConnectionSocketFactory>>),
}

impl From<Registry> for RegistrySource {
    fn from(registry: Registry) -> Self {
        RegistrySource::Built(registry)
    }
}

impl From<HashMap<String, Arc<dyn ConnectionSocketFactory>>> for RegistrySource {
    fn from(mapping: HashMap<String, Arc<dyn ConnectionSocketFactory>>) -> Self {
        RegistrySource::Mapping(mapping)
    }
}

impl fmt::Debug for RegistrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrySource::Built(registry) => f.debug_tuple("Built").field(registry).finish(),
            RegistrySource::Mapping(mapping) => {
                f.debug_tuple("Mapping").field(&mapping.keys().collect::<Vec<_>>()).finish()
            }
        }
    }
}

/// Collects registrations, validating them on [`build`](Self::build).
#[derive(Default)]
pub struct RegistryBuilder {
    entries: Vec<(String, Arc<dyn ConnectionSocketFactory>)>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        scheme: impl Into<String>,
        factory: Arc<dyn ConnectionSocketFactory>,
    ) -> Self {
        self.entries.push((scheme.into(), factory));
        self
    }

    pub fn build(self) -> Result<Registry, NetError> {
        if self.entries.is_empty() {
            return Err(NetError::invalid_argument("registry needs at least one scheme"));
        }

        let mut factories = HashMap::with_capacity(self.entries.len());
        for (scheme, factory) in self.entries {
            if !is_valid_scheme(&scheme) {
                return Err(NetError::invalid_argument(format!("invalid scheme: {:?}", scheme)));
            }
            let key = scheme.to_ascii_lowercase();
            if factories.insert(key, factory).is_some() {
                return Err(NetError::invalid_argument(format!(
                    "scheme registered twice: {}",
                    scheme
                )));
            }
        }
        Ok(Registry { factories: Arc::new(factories) })
    }
}

/// `ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )`
fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
