//! Shutdown dispatch across manager variants.

use crate::base::neterror::NetError;
use crate::reactor::IoReactor;
use crate::socket::pool::ConnPool;

/// How a manager is torn down.
#[derive(Debug, Clone, Copy)]
pub enum ShutdownCapability<'a> {
    /// Close the pool.
    Pool(&'a ConnPool),
    /// Close the pool, then stop the reactor within its grace period.
    Reactor { pool: &'a ConnPool, reactor: &'a IoReactor },
}

/// Implemented by anything that may be handed to [`shutdown`].
pub trait Shutdownable {
    /// `None` when the type has no known way to shut down.
    fn shutdown_capability(&self) -> Option<ShutdownCapability<'_>> {
        None
    }

    fn manager_type(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Shut a manager down. `None` is a no-op; repeated calls are harmless.
pub fn shutdown<M: Shutdownable + ?Sized>(manager: Option<&M>) -> Result<(), NetError> {
    let Some(manager) = manager else {
        return Ok(());
    };

    match manager.shutdown_capability() {
        Some(ShutdownCapability::Pool(pool)) => {
            pool.close();
            Ok(())
        }
        Some(ShutdownCapability::Reactor { pool, reactor }) => {
            pool.close();
            reactor.shutdown();
            tracing::info!(grace = ?reactor.grace_period(), "async connection manager shut down");
            Ok(())
        }
        None => Err(NetError::UnsupportedManagerType(manager.manager_type().to_string())),
    }
}

/// [`shutdown`] for async callers: the reactor thread is awaited on tokio's
/// blocking pool rather than joined on the calling task.
pub async fn shutdown_async<M: Shutdownable + ?Sized>(manager: Option<&M>) -> Result<(), NetError> {
    match manager.and_then(|m| m.shutdown_capability()) {
        Some(ShutdownCapability::Reactor { pool, reactor }) => {
            pool.close();
            reactor.shutdown_async().await;
            tracing::info!(grace = ?reactor.grace_period(), "async connection manager shut down");
            Ok(())
        }
        _ => shutdown(manager),
    }
}
