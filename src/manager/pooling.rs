use crate::base::neterror::NetError;
use crate::config::ConnectionManagerConfig;
use crate::manager::lifecycle::{ShutdownCapability, Shutdownable};
use crate::manager::{assemble, ReuseCapability};
use crate::registry::Registry;
use crate::socket::options::SocketConfig;
use crate::socket::pool::{ConnPool, PoolSettings, PoolStats, PooledConnection};
use crate::socket::provider::DirectSocketProvider;
use crate::socket::route::Route;
use crate::tls::TlsContext;
use std::sync::Arc;

/// Bounded pool: `threads` connections in total, `default-per-route` per
/// route, each living at most `timeout` seconds.
#[derive(Debug)]
pub struct PoolingConnectionManager {
    pool: ConnPool,
    tls: Arc<TlsContext>,
}

pub fn build_pooling_manager(
    config: &ConnectionManagerConfig,
) -> Result<PoolingConnectionManager, NetError> {
    let parts = assemble(config, Arc::new(DirectSocketProvider), SocketConfig::default(), None)?;
    let settings = PoolSettings {
        max_total: config.threads,
        max_per_route: config.max_per_route(),
        time_to_live: config.time_to_live(),
        read_timeout: None,
    };
    let pool = ConnPool::new(parts.registry, parts.connect, settings)?;
    tracing::debug!(
        max_total = settings.max_total,
        max_per_route = settings.max_per_route,
        "built pooling connection manager"
    );
    Ok(PoolingConnectionManager { pool, tls: parts.tls })
}

impl PoolingConnectionManager {
    pub fn pool(&self) -> &ConnPool {
        &self.pool
    }

    pub fn registry(&self) -> &Registry {
        self.pool.registry()
    }

    pub fn tls_context(&self) -> &Arc<TlsContext> {
        &self.tls
    }

    pub async fn lease(&self, route: &Route) -> Result<PooledConnection, NetError> {
        self.pool.lease(route).await
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

impl ReuseCapability for PoolingConnectionManager {
    fn is_reusable(&self) -> bool {
        true
    }
}

impl Shutdownable for PoolingConnectionManager {
    fn shutdown_capability(&self) -> Option<ShutdownCapability<'_>> {
        Some(ShutdownCapability::Pool(&self.pool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_limits_from_config() {
        let config = ConnectionManagerConfig::new().threads(7).default_per_route(3).timeout(30);
        let manager = build_pooling_manager(&config).unwrap();
        let settings = manager.pool().settings();
        assert_eq!(settings.max_total, 7);
        assert_eq!(settings.max_per_route, 3);
        assert_eq!(settings.time_to_live, Some(Duration::from_secs(30)));
        assert!(manager.is_reusable());
    }

    #[test]
    fn test_default_registry_schemes() {
        let manager = build_pooling_manager(&ConnectionManagerConfig::default()).unwrap();
        assert!(manager.registry().lookup("http").is_some());
        assert!(manager.registry().lookup("https").is_some());
        assert_eq!(manager.registry().len(), 2);
    }

    #[test]
    fn test_zero_threads_rejected() {
        let err = build_pooling_manager(&ConnectionManagerConfig::new().threads(0)).unwrap_err();
        assert!(matches!(err, NetError::InvalidArgument(_)));
    }
}
