use crate::base::neterror::NetError;
use crate::config::ConnectionManagerConfig;
use crate::manager::lifecycle::{ShutdownCapability, Shutdownable};
use crate::manager::{assemble, ReuseCapability};
use crate::registry::Registry;
use crate::socket::options::SocketConfig;
use crate::socket::pool::{ConnPool, PoolSettings, PoolStats, PooledConnection};
use crate::socket::provider::Socks5Provider;
use crate::socket::route::Route;
use crate::tls::TlsContext;
use std::sync::Arc;

/// Manager whose `http` and `https` factories both open their transport
/// through a fixed SOCKS5 proxy.
#[derive(Debug)]
pub struct SocksConnectionManager {
    pool: ConnPool,
    tls: Arc<TlsContext>,
    proxy: Socks5Provider,
}

/// Build a manager tunnelling through the proxy at `host:port`. The pool
/// uses default limits; any configured registry is ignored.
pub fn build_socks_manager(
    host: &str,
    port: u16,
    config: &ConnectionManagerConfig,
) -> Result<SocksConnectionManager, NetError> {
    build_socks_manager_with(Socks5Provider::new(host, port), config)
}

/// Like [`build_socks_manager`], with a provider carrying credentials.
pub fn build_socks_manager_with(
    proxy: Socks5Provider,
    config: &ConnectionManagerConfig,
) -> Result<SocksConnectionManager, NetError> {
    let config = ConnectionManagerConfig { registry: None, ..config.clone() };
    let parts = assemble(&config, Arc::new(proxy.clone()), SocketConfig::default(), None)?;
    let pool = ConnPool::new(parts.registry, parts.connect, PoolSettings::default())?;
    tracing::debug!(
        proxy_host = proxy.proxy_host(),
        proxy_port = proxy.proxy_port(),
        "built SOCKS connection manager"
    );
    Ok(SocksConnectionManager { pool, tls: parts.tls, proxy })
}

impl SocksConnectionManager {
    pub fn pool(&self) -> &ConnPool {
        &self.pool
    }

    pub fn registry(&self) -> &Registry {
        self.pool.registry()
    }

    pub fn tls_context(&self) -> &Arc<TlsContext> {
        &self.tls
    }

    pub fn proxy(&self) -> &Socks5Provider {
        &self.proxy
    }

    pub async fn lease(&self, route: &Route) -> Result<PooledConnection, NetError> {
        self.pool.lease(route).await
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

impl ReuseCapability for SocksConnectionManager {
    fn is_reusable(&self) -> bool {
        true
    }
}

impl Shutdownable for SocksConnectionManager {
    fn shutdown_capability(&self) -> Option<ShutdownCapability<'_>> {
        Some(ShutdownCapability::Pool(&self.pool))
    }
}
