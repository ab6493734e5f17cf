//! The resolver seam behind `dns-resolver`, and a static host table.

use crate::base::neterror::NetError;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;

/// Host name of a route, as handed to a [`Resolve`] implementation.
///
/// Stored lowercase without a trailing dot, so `Example.COM.` and
/// `example.com` are the same name.
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct Name(Box<str>);

impl Name {
    pub fn new(host: impl AsRef<str>) -> Self {
        let host = host.as_ref();
        Self(host.strip_suffix('.').unwrap_or(host).to_ascii_lowercase().into_boxed_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Name {
    fn from(host: &str) -> Self {
        Name::new(host)
    }
}

impl From<String> for Name {
    fn from(host: String) -> Self {
        Name::new(host)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved addresses. Ports are meaningless; [`resolve_target`] stamps the
/// route port on.
///
/// [`resolve_target`]: super::resolve_target
pub type Addrs = Box<dyn Iterator<Item = SocketAddr> + Send>;

pub type Resolving = Pin<Box<dyn Future<Output = Result<Addrs, NetError>> + Send>>;

/// Pluggable host resolution, the `dns-resolver` configuration option.
pub trait Resolve: Send + Sync {
    fn resolve(&self, name: Name) -> Resolving;
}

impl<R: Resolve + ?Sized> Resolve for Arc<R> {
    fn resolve(&self, name: Name) -> Resolving {
        (**self).resolve(name)
    }
}

/// Answers from a fixed host table. Names missing from the table go to the
/// fallback resolver, or fail with `NameNotResolved` when there is none.
///
/// ```rust,ignore
/// let resolver = StaticHostResolver::new()
///     .host("proxy.internal", [IpAddr::from([10, 0, 0, 7])])
///     .fallback(Arc::new(GaiResolver::new()));
/// let config = ConnectionManagerConfig::new().dns_resolver(Arc::new(resolver));
/// ```
#[derive(Default)]
pub struct StaticHostResolver {
    hosts: HashMap<Name, Arc<[IpAddr]>>,
    fallback: Option<Arc<dyn Resolve>>,
}

impl StaticHostResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin `host` to `addrs`, replacing any earlier entry for it.
    pub fn host(mut self, host: &str, addrs: impl IntoIterator<Item = IpAddr>) -> Self {
        self.hosts.insert(Name::new(host), addrs.into_iter().collect());
        self
    }

    pub fn fallback(mut self, resolver: Arc<dyn Resolve>) -> Self {
        self.fallback = Some(resolver);
        self
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

impl Resolve for StaticHostResolver {
    fn resolve(&self, name: Name) -> Resolving {
        if let Some(ips) = self.hosts.get(&name) {
            tracing::trace!(%name, count = ips.len(), "answered from host table");
            let addrs: Vec<_> = ips.iter().map(|ip| SocketAddr::new(*ip, 0)).collect();
            let addrs: Addrs = Box::new(addrs.into_iter());
            return Box::pin(std::future::ready(Ok(addrs)));
        }
        match &self.fallback {
            Some(fallback) => fallback.resolve(name),
            None => Box::pin(std::future::ready(Err(NetError::NameNotResolved))),
        }
    }
}

impl fmt::Debug for StaticHostResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticHostResolver")
            .field("hosts", &self.hosts.len())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_name_is_normalized() {
        assert_eq!(Name::new("Example.COM."), Name::from("example.com"));
        assert_eq!(Name::from(String::from("API.local")).to_string(), "api.local");
    }

    #[tokio::test]
    async fn test_table_without_fallback() {
        let resolver =
            StaticHostResolver::new().host("db.internal", [IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3))]);
        assert_eq!(resolver.len(), 1);

        let hit: Vec<_> = resolver.resolve(Name::new("DB.internal")).await.unwrap().collect();
        assert_eq!(hit, vec![SocketAddr::from(([10, 1, 2, 3], 0))]);

        let miss = resolver.resolve(Name::new("cache.internal")).await;
        assert!(matches!(miss, Err(NetError::NameNotResolved)));
    }

    #[tokio::test]
    async fn test_later_entry_replaces_earlier() {
        let resolver = StaticHostResolver::new()
            .host("svc", [IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))])
            .host("SVC", [IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))]);
        assert_eq!(resolver.len(), 1);

        let addrs: Vec<_> = resolver.resolve(Name::new("svc")).await.unwrap().collect();
        assert_eq!(addrs, vec![SocketAddr::from(([10, 0, 0, 2], 0))]);
    }
}
