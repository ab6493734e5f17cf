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

/// Holds at most one connection. Leasing a different route closes the idle
/// connection to the previous one.
#[derive(Debug)]
pub struct BasicConnectionManager {
    pool: ConnPool,
    tls: Arc<TlsContext>,
}

/// Build a single-connection manager. `socket-timeout` becomes the read
/// timeout of the leased connection.
pub fn build_basic_manager(
    config: &ConnectionManagerConfig,
) -> Result<BasicConnectionManager, NetError> {
    let read_timeout = config.socket_timeout_duration();
    let socket = SocketConfig { so_timeout: read_timeout, ..SocketConfig::default() };
    let parts = assemble(config, Arc::new(DirectSocketProvider), socket, None)?;

    let settings =
        PoolSettings { max_total: 1, max_per_route: 1, time_to_live: None, read_timeout };
    let pool = ConnPool::new(parts.registry, parts.connect, settings)?;
    tracing::debug!(?read_timeout, "built basic connection manager");
    Ok(BasicConnectionManager { pool, tls: parts.tls })
}

impl BasicConnectionManager {
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

impl ReuseCapability for BasicConnectionManager {
    fn is_reusable(&self) -> bool {
        false
    }
}

impl Shutdownable for BasicConnectionManager {
    fn shutdown_capability(&self) -> Option<ShutdownCapability<'_>> {
        Some(ShutdownCapability::Pool(&self.pool))
    }
}
