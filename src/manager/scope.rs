//! Call-scoped "current manager" slots.
//!
//! [`ActiveManagers`] is a plain value owned by one call chain. A call that
//! switches managers either binds in place through `&mut` (the guard puts the
//! previous manager back when it drops) or hands its callee a rebound copy.
//! Concurrent calls each hold their own value, so one call's bindings are
//! never visible to another.

use crate::base::neterror::NetError;
use crate::config::ConnectionManagerConfig;
use crate::manager::lifecycle;
use crate::manager::{
    build_async_pooling_manager, build_pooling_manager, AsyncPoolingConnectionManager,
    ConnectionManager,
};
use std::fmt;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// The sync and async managers in effect for the current call.
#[derive(Clone, Default)]
pub struct ActiveManagers {
    sync: Option<Arc<ConnectionManager>>,
    async_: Option<Arc<AsyncPoolingConnectionManager>>,
}

impl ActiveManagers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_sync(&self) -> Option<Arc<ConnectionManager>> {
        self.sync.clone()
    }

    pub fn current_async(&self) -> Option<Arc<AsyncPoolingConnectionManager>> {
        self.async_.clone()
    }

    /// A copy of these bindings with `manager` as the sync manager.
    pub fn with_sync(&self, manager: Arc<ConnectionManager>) -> Self {
        Self { sync: Some(manager), async_: self.async_.clone() }
    }

    /// A copy of these bindings with `manager` as the async manager.
    pub fn with_async(&self, manager: Arc<AsyncPoolingConnectionManager>) -> Self {
        Self { sync: self.sync.clone(), async_: Some(manager) }
    }

    /// Make `manager` the current sync manager until the guard drops.
    pub fn bind_sync(&mut self, manager: Arc<ConnectionManager>) -> ScopeGuard<'_> {
        let previous = self.sync.replace(manager);
        ScopeGuard { scope: self, previous: Some(Previous::Sync(previous)) }
    }

    /// Make `manager` the current async manager until the guard drops.
    pub fn bind_async(&mut self, manager: Arc<AsyncPoolingConnectionManager>) -> ScopeGuard<'_> {
        let previous = self.async_.replace(manager);
        ScopeGuard { scope: self, previous: Some(Previous::Async(previous)) }
    }
}

impl fmt::Debug for ActiveManagers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveManagers")
            .field("sync", &self.sync.as_ref().map(|m| m.kind()))
            .field("async", &self.async_.is_some())
            .finish()
    }
}

enum Previous {
    Sync(Option<Arc<ConnectionManager>>),
    Async(Option<Arc<AsyncPoolingConnectionManager>>),
}

/// Exclusive access to a binding; the slot it changed is restored on drop.
///
/// Nested bindings go through the guard, so they are undone in reverse
/// order.
#[must_use = "the binding is undone as soon as the guard drops"]
pub struct ScopeGuard<'a> {
    scope: &'a mut ActiveManagers,
    previous: Option<Previous>,
}

impl Deref for ScopeGuard<'_> {
    type Target = ActiveManagers;

    fn deref(&self) -> &ActiveManagers {
        self.scope
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut ActiveManagers {
        self.scope
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(Previous::Sync(previous)) => self.scope.sync = previous,
            Some(Previous::Async(previous)) => self.scope.async_ = previous,
            None => {}
        }
    }
}

/// Closes the pool if the scope is left without reaching the normal
/// shutdown, on panic or cancellation. Never blocks.
struct CloseOnDrop {
    manager: Option<Arc<AsyncPoolingConnectionManager>>,
}

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.take() {
            tracing::debug!("scoped async connection manager abandoned");
            manager.pool().close();
            manager.reactor().signal_shutdown();
        }
    }
}

/// Shuts the manager down when the scope ends.
struct ShutdownOnDrop(Arc<ConnectionManager>);

impl Drop for ShutdownOnDrop {
    fn drop(&mut self) {
        if let Err(e) = lifecycle::shutdown(Some(self.0.as_ref())) {
            tracing::warn!(error = %e, "scoped connection manager shutdown failed");
        }
    }
}

/// Build a pooling manager and run `f` with a copy of `scope` in which it is
/// the current sync manager. The manager is shut down afterwards.
pub async fn with_connection_pool<F, Fut, T>(
    scope: &ActiveManagers,
    config: &ConnectionManagerConfig,
    f: F,
) -> Result<T, NetError>
where
    F: FnOnce(ActiveManagers) -> Fut,
    Fut: Future<Output = T>,
{
    let manager = Arc::new(ConnectionManager::from(build_pooling_manager(config)?));
    let _shutdown = ShutdownOnDrop(manager.clone());
    Ok(f(scope.with_sync(manager)).await)
}

/// Build an async pooling manager and run `f` with a copy of `scope` in
/// which it is the current async manager. The manager is shut down
/// afterwards without blocking the calling task.
pub async fn with_async_connection_pool<F, Fut, T>(
    scope: &ActiveManagers,
    config: &ConnectionManagerConfig,
    f: F,
) -> Result<T, NetError>
where
    F: FnOnce(ActiveManagers) -> Fut,
    Fut: Future<Output = T>,
{
    let manager = Arc::new(build_async_pooling_manager(config)?);
    let mut abandoned = CloseOnDrop { manager: Some(manager.clone()) };
    let output = f(scope.with_async(manager.clone())).await;

    abandoned.manager = None;
    if let Err(e) = lifecycle::shutdown_async(Some(manager.as_ref())).await {
        tracing::warn!(error = %e, "scoped async connection manager shutdown failed");
    }
    Ok(output)
}
