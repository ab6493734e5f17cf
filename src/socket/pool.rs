use crate::base::neterror::NetError;
use crate::registry::Registry;
use crate::socket::client::{SocketType, StreamSocket};
use crate::socket::options::ConnectOptions;
use crate::socket::route::Route;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Sleep;
use url::Url;

/// Limits and lifetimes of a [`ConnPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Connections leased or idle, across all routes.
    pub max_total: usize,
    /// Connections leased or idle, per route.
    pub max_per_route: usize,
    /// Connections older than this are not handed out again.
    pub time_to_live: Option<Duration>,
    /// Read timeout applied to leased connections.
    pub read_timeout: Option<Duration>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self { max_total: 20, max_per_route: 2, time_to_live: None, read_timeout: None }
    }
}

/// Point-in-time pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub leased: usize,
    pub idle: usize,
    pub max: usize,
}

/// Idle connection with metadata for expiry tracking.
struct IdleConnection {
    socket: SocketType,
    created_at: Instant,
}

struct PoolInner {
    registry: Registry,
    connect: ConnectOptions,
    settings: PoolSettings,
    total: Arc<Semaphore>,
    routes: DashMap<Route, Arc<Semaphore>>,
    idle: DashMap<Route, VecDeque<IdleConnection>>,
    idle_count: AtomicUsize,
    closed: AtomicBool,
}

/// Route-aware connection pool enforcing total and per-route limits.
///
/// Leases wait while a limit is reached and fail with
/// [`NetError::ManagerShutdown`] once the pool is closed.
#[derive(Clone)]
pub struct ConnPool {
    inner: Arc<PoolInner>,
}

impl fmt::Debug for ConnPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnPool")
            .field("settings", &self.inner.settings)
            .field("stats", &self.stats())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ConnPool {
    pub fn new(
        registry: Registry,
        connect: ConnectOptions,
        settings: PoolSettings,
    ) -> Result<Self, NetError> {
        let in_range = |limit: usize| (1..=Semaphore::MAX_PERMITS).contains(&limit);
        if !in_range(settings.max_total) || !in_range(settings.max_per_route) {
            return Err(NetError::invalid_argument(format!(
                "pool limits must be between 1 and {} (total {}, per route {})",
                Semaphore::MAX_PERMITS,
                settings.max_total,
                settings.max_per_route
            )));
        }
        Ok(Self {
            inner: Arc::new(PoolInner {
                registry,
                connect,
                settings,
                total: Arc::new(Semaphore::new(settings.max_total)),
                routes: DashMap::new(),
                idle: DashMap::new(),
                idle_count: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
            }),
        })
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.inner.settings
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn connect_options(&self) -> &ConnectOptions {
        &self.inner.connect
    }

    /// Lease a connection for the origin of `url`.
    pub async fn lease_url(&self, url: &Url) -> Result<PooledConnection, NetError> {
        self.lease(&Route::from_url(url)?).await
    }

    /// Lease a connection for `route`, reusing an idle one when possible.
    pub async fn lease(&self, route: &Route) -> Result<PooledConnection, NetError> {
        self.lease_with(route, None).await
    }

    /// Like [`lease`](Self::lease), but a new connection is opened as a task
    /// on `runtime`, so its socket is registered with that runtime's driver.
    pub async fn lease_on(
        &self,
        route: &Route,
        runtime: &Handle,
    ) -> Result<PooledConnection, NetError> {
        self.lease_with(route, Some(runtime)).await
    }

    async fn lease_with(
        &self,
        route: &Route,
        runtime: Option<&Handle>,
    ) -> Result<PooledConnection, NetError> {
        self.ensure_open()?;

        let route_permit = self
            .route_semaphore(route)
            .acquire_owned()
            .await
            .map_err(|_| NetError::ManagerShutdown)?;
        let total_permit =
            self.inner.total.clone().acquire_owned().await.map_err(|_| NetError::ManagerShutdown)?;
        self.ensure_open()?;

        if let Some(idle) = self.take_idle(route) {
            tracing::trace!(%route, "reusing idle connection");
            return Ok(PooledConnection::new(
                idle.socket,
                route.clone(),
                self.clone(),
                idle.created_at,
                true,
                route_permit,
                total_permit,
            ));
        }

        self.make_room(route);

        let factory = self
            .inner
            .registry
            .lookup(route.scheme())
            .ok_or_else(|| NetError::UnknownUrlScheme(route.scheme().to_string()))?;
        let socket = match runtime {
            Some(runtime) => {
                let route = route.clone();
                let options = self.inner.connect.clone();
                let task = runtime.spawn(async move { factory.connect(&route, &options).await });
                match task.await {
                    Ok(result) => result?,
                    Err(e) if e.is_cancelled() => return Err(NetError::ManagerShutdown),
                    Err(e) => {
                        tracing::warn!(error = %e, "connect task panicked");
                        return Err(NetError::ConnectionAborted);
                    }
                }
            }
            None => factory.connect(route, &self.inner.connect).await?,
        };
        tracing::debug!(%route, tls = socket.is_tls(), "opened connection");

        Ok(PooledConnection::new(
            socket,
            route.clone(),
            self.clone(),
            Instant::now(),
            false,
            route_permit,
            total_permit,
        ))
    }

    /// Current occupancy across all routes.
    pub fn stats(&self) -> PoolStats {
        let max = self.inner.settings.max_total;
        PoolStats {
            leased: max.saturating_sub(self.inner.total.available_permits()),
            idle: self.inner.idle_count.load(Ordering::Relaxed),
            max,
        }
    }

    /// Current occupancy of one route.
    pub fn route_stats(&self, route: &Route) -> PoolStats {
        let max = self.inner.settings.max_per_route;
        let leased = self
            .inner
            .routes
            .get(route)
            .map(|sem| max.saturating_sub(sem.available_permits()))
            .unwrap_or(0);
        let idle = self.inner.idle.get(route).map(|q| q.len()).unwrap_or(0);
        PoolStats { leased, idle, max }
    }

    /// Drop idle connections that are closed or past their time-to-live.
    /// Returns how many were removed.
    pub fn purge(&self) -> usize {
        let mut removed = 0;
        for mut entry in self.inner.idle.iter_mut() {
            let before = entry.len();
            entry.retain(|conn| !self.is_expired(conn.created_at) && conn.socket.is_connected());
            removed += before - entry.len();
        }
        self.inner.idle.retain(|_, queue| !queue.is_empty());

        if removed > 0 {
            self.inner.idle_count.fetch_sub(removed, Ordering::Relaxed);
            tracing::debug!(removed, "purged idle connections");
        }
        removed
    }

    /// Close the pool: idle connections are dropped, waiting and future
    /// leases fail. Leased connections are closed when their holder lets
    /// go of them. Calling this more than once has no further effect.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.total.close();
        for sem in self.inner.routes.iter() {
            sem.close();
        }
        let dropped = self.inner.idle_count.swap(0, Ordering::Relaxed);
        self.inner.idle.clear();
        tracing::debug!(dropped, "connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), NetError> {
        if self.is_closed() {
            Err(NetError::ManagerShutdown)
        } else {
            Ok(())
        }
    }

    fn route_semaphore(&self, route: &Route) -> Arc<Semaphore> {
        self.inner
            .routes
            .entry(route.clone())
            .or_insert_with(|| Arc::new(Semaphore::new(self.inner.settings.max_per_route)))
            .clone()
    }

    fn is_expired(&self, created_at: Instant) -> bool {
        self.inner.settings.time_to_live.is_some_and(|ttl| created_at.elapsed() >= ttl)
    }

    /// Most recently released usable connection for `route`, if any.
    fn take_idle(&self, route: &Route) -> Option<IdleConnection> {
        let mut queue = self.inner.idle.get_mut(route)?;
        while let Some(conn) = queue.pop_back() {
            self.inner.idle_count.fetch_sub(1, Ordering::Relaxed);
            if self.is_expired(conn.created_at) || !conn.socket.is_connected() {
                tracing::trace!(%route, "discarding stale idle connection");
                continue;
            }
            return Some(conn);
        }
        None
    }

    /// Evict the oldest idle connection of another route when a new
    /// connection would exceed the total limit.
    fn make_room(&self, route: &Route) {
        let leased = self.stats().leased;
        if leased + self.inner.idle_count.load(Ordering::Relaxed) <= self.inner.settings.max_total {
            return;
        }

        let victim = self
            .inner
            .idle
            .iter()
            .filter(|entry| entry.key() != route)
            .filter_map(|entry| entry.front().map(|c| (c.created_at, entry.key().clone())))
            .min_by_key(|(created_at, _)| *created_at)
            .map(|(_, key)| key);

        if let Some(key) = victim {
            if let Some(mut queue) = self.inner.idle.get_mut(&key) {
                if queue.pop_front().is_some() {
                    self.inner.idle_count.fetch_sub(1, Ordering::Relaxed);
                    tracing::trace!(route = %key, "evicted idle connection");
                }
            }
        }
    }

    fn return_idle(&self, route: &Route, socket: SocketType, created_at: Instant) {
        if self.is_closed() || self.is_expired(created_at) || !socket.is_connected() {
            return;
        }
        self.inner
            .idle
            .entry(route.clone())
            .or_default()
            .push_back(IdleConnection { socket, created_at });
        self.inner.idle_count.fetch_add(1, Ordering::Relaxed);
    }
}

/// A connection leased from a [`ConnPool`].
///
/// Hand it back with [`release`](Self::release) to make it available for
/// reuse. Dropping it closes the underlying socket.
pub struct PooledConnection {
    socket: Option<SocketType>,
    route: Route,
    pool: ConnPool,
    created_at: Instant,
    reused: bool,
    read_timeout: Option<Duration>,
    read_deadline: Option<Pin<Box<Sleep>>>,
    _route_permit: OwnedSemaphorePermit,
    _total_permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    fn new(
        socket: SocketType,
        route: Route,
        pool: ConnPool,
        created_at: Instant,
        reused: bool,
        route_permit: OwnedSemaphorePermit,
        total_permit: OwnedSemaphorePermit,
    ) -> Self {
        let read_timeout = pool.settings().read_timeout;
        Self {
            socket: Some(socket),
            route,
            pool,
            created_at,
            reused,
            read_timeout,
            read_deadline: None,
            _route_permit: route_permit,
            _total_permit: total_permit,
        }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    /// True when the connection was served from the idle set.
    pub fn is_reused(&self) -> bool {
        self.reused
    }

    pub fn socket(&self) -> Option<&SocketType> {
        self.socket.as_ref()
    }

    pub fn is_tls(&self) -> bool {
        self.socket.as_ref().is_some_and(SocketType::is_tls)
    }

    /// Return the connection to the pool for reuse.
    pub fn release(mut self) {
        if let Some(socket) = self.socket.take() {
            self.pool.return_idle(&self.route, socket, self.created_at);
        }
    }

    /// Close the connection instead of returning it.
    pub fn discard(mut self) {
        self.socket = None;
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("route", &self.route)
            .field("reused", &self.reused)
            .field("open", &self.socket.is_some())
            .finish()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if self.socket.take().is_some() {
            tracing::trace!(route = %self.route, "closing unreleased connection");
        }
    }
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, NetError::SocketNotConnected)
}

impl AsyncRead for PooledConnection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let socket = this.socket.as_mut().ok_or_else(not_connected)?;
        match Pin::new(socket).poll_read(cx, buf) {
            Poll::Ready(result) => {
                this.read_deadline = None;
                Poll::Ready(result)
            }
            Poll::Pending => {
                if let Some(timeout) = this.read_timeout {
                    let deadline = this
                        .read_deadline
                        .get_or_insert_with(|| Box::pin(tokio::time::sleep(timeout)));
                    if deadline.as_mut().poll(cx).is_ready() {
                        this.read_deadline = None;
                        return Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            NetError::SocketReadTimedOut,
                        )));
                    }
                }
                Poll::Pending
            }
        }
    }
}

impl AsyncWrite for PooledConnection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let socket = self.get_mut().socket.as_mut().ok_or_else(not_connected)?;
        Pin::new(socket).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let socket = self.get_mut().socket.as_mut().ok_or_else(not_connected)?;
        Pin::new(socket).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let socket = self.get_mut().socket.as_mut().ok_or_else(not_connected)?;
        Pin::new(socket).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryBuilder;
    use crate::socket::factory::PlainSocketFactory;
    use crate::socket::provider::DirectSocketProvider;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn plain_pool(settings: PoolSettings) -> ConnPool {
        let registry = RegistryBuilder::new()
            .register("http", Arc::new(PlainSocketFactory::new(Arc::new(DirectSocketProvider))))
            .build()
            .unwrap();
        ConnPool::new(registry, ConnectOptions::default(), settings).unwrap()
    }

    async fn accept_forever() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        port
    }

    #[test]
    fn test_zero_limits_rejected() {
        let registry = RegistryBuilder::new()
            .register("http", Arc::new(PlainSocketFactory::new(Arc::new(DirectSocketProvider))))
            .build()
            .unwrap();
        let settings = PoolSettings { max_total: 0, ..PoolSettings::default() };
        let err = ConnPool::new(registry, ConnectOptions::default(), settings).unwrap_err();
        assert!(matches!(err, NetError::InvalidArgument(_)));
    }

    #[test]
    fn test_limits_beyond_semaphore_capacity_rejected() {
        let registry = RegistryBuilder::new()
            .register("http", Arc::new(PlainSocketFactory::new(Arc::new(DirectSocketProvider))))
            .build()
            .unwrap();
        for settings in [
            PoolSettings { max_total: usize::MAX, ..PoolSettings::default() },
            PoolSettings { max_per_route: Semaphore::MAX_PERMITS + 1, ..PoolSettings::default() },
        ] {
            let err = ConnPool::new(registry.clone(), ConnectOptions::default(), settings);
            assert!(matches!(err, Err(NetError::InvalidArgument(_))));
        }
    }

    #[tokio::test]
    async fn test_lease_on_opens_socket_on_given_runtime() {
        use crate::socket::provider::FnSocketProvider;
        use std::sync::Mutex;

        let port = accept_forever().await;
        let seen = Arc::new(Mutex::new(None));
        let provider = {
            let seen = seen.clone();
            FnSocketProvider::new(move || {
                *seen.lock().unwrap() = std::thread::current().name().map(str::to_string);
                tokio::net::TcpSocket::new_v4()
            })
        };
        let registry = RegistryBuilder::new()
            .register("http", Arc::new(PlainSocketFactory::new(Arc::new(provider))))
            .build()
            .unwrap();
        let pool = ConnPool::new(registry, ConnectOptions::default(), PoolSettings::default())
            .unwrap();

        let io = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("pool-io")
            .enable_all()
            .build()
            .unwrap();
        let route = Route::new("http", "127.0.0.1", port);
        let conn = pool.lease_on(&route, io.handle()).await.unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("pool-io"));
        assert_eq!(pool.stats().leased, 1);

        drop(conn);
        io.shutdown_background();
    }

    #[tokio::test]
    async fn test_release_then_reuse() {
        let port = accept_forever().await;
        let pool = plain_pool(PoolSettings::default());
        let route = Route::new("http", "127.0.0.1", port);

        let conn = pool.lease(&route).await.unwrap();
        assert!(!conn.is_reused());
        assert_eq!(pool.stats().leased, 1);
        conn.release();
        assert_eq!(pool.stats(), PoolStats { leased: 0, idle: 1, max: 20 });

        let conn = pool.lease(&route).await.unwrap();
        assert!(conn.is_reused());
        assert_eq!(pool.stats().idle, 0);
    }

    #[tokio::test]
    async fn test_discard_is_not_reused() {
        let port = accept_forever().await;
        let pool = plain_pool(PoolSettings::default());
        let route = Route::new("http", "127.0.0.1", port);

        pool.lease(&route).await.unwrap().discard();
        assert_eq!(pool.stats().idle, 0);
        assert!(!pool.lease(&route).await.unwrap().is_reused());
    }

    #[tokio::test]
    async fn test_unknown_scheme() {
        let pool = plain_pool(PoolSettings::default());
        let err = pool.lease(&Route::new("ftp", "127.0.0.1", 21)).await.unwrap_err();
        assert!(matches!(err, NetError::UnknownUrlScheme(ref s) if s == "ftp"));
        assert_eq!(pool.stats().leased, 0);
    }

    #[tokio::test]
    async fn test_per_route_limit_waits() {
        let port = accept_forever().await;
        let pool = plain_pool(PoolSettings { max_per_route: 1, ..PoolSettings::default() });
        let route = Route::new("http", "127.0.0.1", port);

        let held = pool.lease(&route).await.unwrap();
        let waiting = tokio::time::timeout(Duration::from_millis(100), pool.lease(&route)).await;
        assert!(waiting.is_err());

        held.release();
        let conn = tokio::time::timeout(Duration::from_secs(1), pool.lease(&route))
            .await
            .unwrap()
            .unwrap();
        assert!(conn.is_reused());
    }

    #[tokio::test]
    async fn test_expired_idle_not_reused() {
        let port = accept_forever().await;
        let pool = plain_pool(PoolSettings {
            time_to_live: Some(Duration::from_millis(50)),
            ..PoolSettings::default()
        });
        let route = Route::new("http", "127.0.0.1", port);

        pool.lease(&route).await.unwrap().release();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(pool.purge(), 1);
        assert!(!pool.lease(&route).await.unwrap().is_reused());
    }

    #[tokio::test]
    async fn test_close_fails_leases() {
        let port = accept_forever().await;
        let pool = plain_pool(PoolSettings { max_per_route: 1, ..PoolSettings::default() });
        let route = Route::new("http", "127.0.0.1", port);

        let held = pool.lease(&route).await.unwrap();
        let waiter = {
            let pool = pool.clone();
            let route = route.clone();
            tokio::spawn(async move { pool.lease(&route).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        pool.close();
        pool.close();
        assert!(matches!(waiter.await.unwrap(), Err(NetError::ManagerShutdown)));
        assert!(matches!(pool.lease(&route).await, Err(NetError::ManagerShutdown)));

        held.release();
        assert_eq!(pool.stats().idle, 0);
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let port = accept_forever().await;
        let pool = plain_pool(PoolSettings {
            read_timeout: Some(Duration::from_millis(50)),
            ..PoolSettings::default()
        });
        let mut conn = pool.lease(&Route::new("http", "127.0.0.1", port)).await.unwrap();

        let mut buf = [0u8; 8];
        let err = conn.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }
}
