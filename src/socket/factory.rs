//! Connection socket factories: what a registry maps each scheme to.

use crate::base::neterror::NetError;
use crate::socket::client::SocketType;
use crate::socket::options::ConnectOptions;
use crate::socket::provider::SocketProvider;
use crate::socket::route::Route;
use crate::tls::TlsContext;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

/// Produces a ready-to-use connection for a route.
pub trait ConnectionSocketFactory: Send + Sync + fmt::Debug {
    fn connect<'a>(
        &'a self,
        route: &'a Route,
        options: &'a ConnectOptions,
    ) -> BoxFuture<'a, Result<SocketType, NetError>>;

    /// Whether connections from this factory are TLS-wrapped.
    fn is_layered(&self) -> bool {
        false
    }
}

/// Plain TCP connections from a provider.
#[derive(Debug, Clone)]
pub struct PlainSocketFactory {
    provider: Arc<dyn SocketProvider>,
}

impl PlainSocketFactory {
    pub fn new(provider: Arc<dyn SocketProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn SocketProvider> {
        &self.provider
    }
}

impl ConnectionSocketFactory for PlainSocketFactory {
    fn connect<'a>(
        &'a self,
        route: &'a Route,
        options: &'a ConnectOptions,
    ) -> BoxFuture<'a, Result<SocketType, NetError>> {
        Box::pin(async move {
            let stream = self.provider.connect(route, options).await?;
            Ok(SocketType::Tcp(stream))
        })
    }
}

/// TLS connections: the provider's stream, then a handshake through the
/// shared context.
#[derive(Debug, Clone)]
pub struct TlsSocketFactory {
    provider: Arc<dyn SocketProvider>,
    context: Arc<TlsContext>,
}

impl TlsSocketFactory {
    pub fn new(provider: Arc<dyn SocketProvider>, context: Arc<TlsContext>) -> Self {
        Self { provider, context }
    }

    pub fn provider(&self) -> &Arc<dyn SocketProvider> {
        &self.provider
    }

    pub fn context(&self) -> &Arc<TlsContext> {
        &self.context
    }
}

impl ConnectionSocketFactory for TlsSocketFactory {
    fn connect<'a>(
        &'a self,
        route: &'a Route,
        options: &'a ConnectOptions,
    ) -> BoxFuture<'a, Result<SocketType, NetError>> {
        Box::pin(async move {
            let stream = self.provider.connect(route, options).await?;
            let tls = self.context.connect(route.host(), stream).await?;
            tracing::trace!(%route, "TLS established");
            Ok(SocketType::Ssl(tls))
        })
    }

    fn is_layered(&self) -> bool {
        true
    }
}

/// Plain and TLS factories sharing one provider.
pub fn socket_factories(
    provider: Arc<dyn SocketProvider>,
    context: Arc<TlsContext>,
) -> (PlainSocketFactory, TlsSocketFactory) {
    (PlainSocketFactory::new(provider.clone()), TlsSocketFactory::new(provider, context))
}
