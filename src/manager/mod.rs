//! Connection managers.
//!
//! Four variants share one assembly (registry, TLS context, socket options)
//! on top of [`ConnPool`]:
//! - [`basic`]: a single connection, replaced when the route changes
//! - [`pooling`]: bounded pool, `threads` total and `default-per-route`
//! - [`async_pooling`]: the same pool wired to an [`IoReactor`]
//! - [`socks`]: every scheme tunnelled through a fixed SOCKS5 proxy
//!
//! [`lifecycle::shutdown`] tears any of them down; [`scope`] holds the
//! managers the request layer currently works with.

pub mod async_pooling;
pub mod basic;
pub mod lifecycle;
pub mod pooling;
pub mod scope;
pub mod socks;

pub use async_pooling::{build_async_pooling_manager, AsyncPoolingConnectionManager};
pub use basic::{build_basic_manager, BasicConnectionManager};
pub use lifecycle::{shutdown, shutdown_async, ShutdownCapability, Shutdownable};
pub use pooling::{build_pooling_manager, PoolingConnectionManager};
pub use scope::{with_async_connection_pool, with_connection_pool, ActiveManagers, ScopeGuard};
pub use socks::{build_socks_manager, build_socks_manager_with, SocksConnectionManager};

use crate::base::neterror::NetError;
use crate::config::ConnectionManagerConfig;
use crate::dns::{GaiResolver, Resolve};
use crate::reactor::IoReactor;
use crate::registry::Registry;
use crate::socket::options::{ConnectOptions, SocketConfig};
use crate::socket::pool::{ConnPool, PoolStats, PooledConnection};
use crate::socket::provider::SocketProvider;
use crate::socket::route::Route;
use crate::tls::TlsContext;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Which constructor produced a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagerKind {
    Basic,
    Pooling,
    PoolingAsync,
    SocksProxied,
}

/// Whether leased connections may be returned and handed out again.
pub trait ReuseCapability {
    fn is_reusable(&self) -> bool;
}

pub fn is_reusable<M: ReuseCapability + ?Sized>(manager: &M) -> bool {
    manager.is_reusable()
}

/// Pieces every manager is built from.
pub(crate) struct Assembly {
    pub registry: Registry,
    pub tls: Arc<TlsContext>,
    pub connect: ConnectOptions,
}

/// Resolve TLS material and the registry for `config`.
///
/// A configured registry replaces the default one built over `provider`.
pub(crate) fn assemble(
    config: &ConnectionManagerConfig,
    provider: Arc<dyn SocketProvider>,
    socket: SocketConfig,
    connect_timeout: Option<Duration>,
) -> Result<Assembly, NetError> {
    let tls = Arc::new(crate::tls::resolve(config)?);
    let registry = match &config.registry {
        Some(source) => Registry::from_source(source.clone())?,
        None => Registry::with_defaults(provider, tls.clone()),
    };
    let resolver: Arc<dyn Resolve> = match &config.dns_resolver {
        Some(resolver) => resolver.clone(),
        None => Arc::new(GaiResolver),
    };
    let connect = ConnectOptions::default()
        .with_resolver(resolver)
        .with_socket_config(socket)
        .with_connect_timeout(connect_timeout);
    Ok(Assembly { registry, tls, connect })
}

/// Any of the four managers.
#[derive(Debug)]
pub enum ConnectionManager {
    Basic(BasicConnectionManager),
    Pooling(PoolingConnectionManager),
    PoolingAsync(AsyncPoolingConnectionManager),
    SocksProxied(SocksConnectionManager),
}

impl ConnectionManager {
    pub fn kind(&self) -> ManagerKind {
        match self {
            ConnectionManager::Basic(_) => ManagerKind::Basic,
            ConnectionManager::Pooling(_) => ManagerKind::Pooling,
            ConnectionManager::PoolingAsync(_) => ManagerKind::PoolingAsync,
            ConnectionManager::SocksProxied(_) => ManagerKind::SocksProxied,
        }
    }

    pub fn pool(&self) -> &ConnPool {
        match self {
            ConnectionManager::Basic(m) => m.pool(),
            ConnectionManager::Pooling(m) => m.pool(),
            ConnectionManager::PoolingAsync(m) => m.pool(),
            ConnectionManager::SocksProxied(m) => m.pool(),
        }
    }

    pub fn tls_context(&self) -> &Arc<TlsContext> {
        match self {
            ConnectionManager::Basic(m) => m.tls_context(),
            ConnectionManager::Pooling(m) => m.tls_context(),
            ConnectionManager::PoolingAsync(m) => m.tls_context(),
            ConnectionManager::SocksProxied(m) => m.tls_context(),
        }
    }

    pub fn registry(&self) -> &Registry {
        self.pool().registry()
    }

    /// The reactor, for the async variant.
    pub fn reactor(&self) -> Option<&IoReactor> {
        match self {
            ConnectionManager::PoolingAsync(m) => Some(m.reactor()),
            _ => None,
        }
    }

    pub async fn lease(&self, route: &Route) -> Result<PooledConnection, NetError> {
        match self {
            ConnectionManager::Basic(m) => m.lease(route).await,
            ConnectionManager::Pooling(m) => m.lease(route).await,
            ConnectionManager::PoolingAsync(m) => m.lease(route).await,
            ConnectionManager::SocksProxied(m) => m.lease(route).await,
        }
    }

    pub async fn lease_url(&self, url: &Url) -> Result<PooledConnection, NetError> {
        self.lease(&Route::from_url(url)?).await
    }

    pub fn stats(&self) -> PoolStats {
        self.pool().stats()
    }

    pub fn shutdown(&self) -> Result<(), NetError> {
        lifecycle::shutdown(Some(self))
    }
}

impl ReuseCapability for ConnectionManager {
    fn is_reusable(&self) -> bool {
        match self {
            ConnectionManager::Basic(m) => m.is_reusable(),
            ConnectionManager::Pooling(m) => m.is_reusable(),
            ConnectionManager::PoolingAsync(m) => m.is_reusable(),
            ConnectionManager::SocksProxied(m) => m.is_reusable(),
        }
    }
}

impl Shutdownable for ConnectionManager {
    fn shutdown_capability(&self) -> Option<ShutdownCapability<'_>> {
        match self {
            ConnectionManager::Basic(m) => m.shutdown_capability(),
            ConnectionManager::Pooling(m) => m.shutdown_capability(),
            ConnectionManager::PoolingAsync(m) => m.shutdown_capability(),
            ConnectionManager::SocksProxied(m) => m.shutdown_capability(),
        }
    }
}

impl From<BasicConnectionManager> for ConnectionManager {
    fn from(manager: BasicConnectionManager) -> Self {
        ConnectionManager::Basic(manager)
    }
}

impl From<PoolingConnectionManager> for ConnectionManager {
    fn from(manager: PoolingConnectionManager) -> Self {
        ConnectionManager::Pooling(manager)
    }
}

impl From<AsyncPoolingConnectionManager> for ConnectionManager {
    fn from(manager: AsyncPoolingConnectionManager) -> Self {
        ConnectionManager::PoolingAsync(manager)
    }
}

impl From<SocksConnectionManager> for ConnectionManager {
    fn from(manager: SocksConnectionManager) -> Self {
        ConnectionManager::SocksProxied(manager)
    }
}
