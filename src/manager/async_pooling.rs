use crate::base::neterror::NetError;
use crate::config::ConnectionManagerConfig;
use crate::manager::lifecycle::{ShutdownCapability, Shutdownable};
use crate::manager::{assemble, ReuseCapability};
use crate::reactor::{IoEventDispatch, IoReactor};
use crate::registry::Registry;
use crate::socket::pool::{ConnPool, PoolSettings, PoolStats, PooledConnection};
use crate::socket::provider::DirectSocketProvider;
use crate::socket::route::Route;
use crate::tls::TlsContext;
use std::sync::Arc;

/// Pool housekeeping driven by the reactor's tick.
struct PoolDispatch {
    pool: ConnPool,
}

impl IoEventDispatch for PoolDispatch {
    fn on_tick(&self) {
        self.pool.purge();
    }
}

/// Pooling manager wired to a running [`IoReactor`].
#[derive(Debug)]
pub struct AsyncPoolingConnectionManager {
    pool: ConnPool,
    tls: Arc<TlsContext>,
    reactor: IoReactor,
}

/// Build the pool, start its reactor, and return once the event loop is
/// live.
pub fn build_async_pooling_manager(
    config: &ConnectionManagerConfig,
) -> Result<AsyncPoolingConnectionManager, NetError> {
    let io_config = config.io_config.clone().unwrap_or_default();
    let reactor_settings = io_config.settings();
    let parts = assemble(
        config,
        Arc::new(DirectSocketProvider),
        reactor_settings.socket_config(),
        reactor_settings.connect_timeout(),
    )?;

    let settings = PoolSettings {
        max_total: config.threads,
        max_per_route: config.max_per_route(),
        time_to_live: config.time_to_live(),
        read_timeout: reactor_settings.socket_config().so_timeout,
    };
    let pool = ConnPool::new(parts.registry, parts.connect, settings)?;
    let reactor = IoReactor::start(&io_config, Arc::new(PoolDispatch { pool: pool.clone() }))?;

    tracing::debug!(
        max_total = settings.max_total,
        max_per_route = settings.max_per_route,
        queued = reactor_settings.interest_op_queued,
        "built async pooling connection manager"
    );
    Ok(AsyncPoolingConnectionManager { pool, tls: parts.tls, reactor })
}

impl AsyncPoolingConnectionManager {
    pub fn pool(&self) -> &ConnPool {
        &self.pool
    }

    pub fn registry(&self) -> &Registry {
        self.pool.registry()
    }

    pub fn tls_context(&self) -> &Arc<TlsContext> {
        &self.tls
    }

    pub fn reactor(&self) -> &IoReactor {
        &self.reactor
    }

    /// Lease a connection. New sockets are always opened on the reactor.
    ///
    /// With `interest-op-queued` the whole request, including any wait for
    /// pool capacity, is queued as a reactor task. Otherwise the caller waits
    /// for capacity itself and only the connect runs on the reactor.
    pub async fn lease(&self, route: &Route) -> Result<PooledConnection, NetError> {
        self.reactor.ensure_running()?;
        if self.reactor.settings().interest_op_queued {
            let pool = self.pool.clone();
            let route = route.clone();
            self.reactor.execute(async move { pool.lease(&route).await }).await
        } else {
            self.pool.lease_on(route, self.reactor.handle()).await
        }
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

impl ReuseCapability for AsyncPoolingConnectionManager {
    fn is_reusable(&self) -> bool {
        true
    }
}

impl Shutdownable for AsyncPoolingConnectionManager {
    fn shutdown_capability(&self) -> Option<ShutdownCapability<'_>> {
        Some(ShutdownCapability::Reactor { pool: &self.pool, reactor: &self.reactor })
    }
}
