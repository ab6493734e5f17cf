//! Socket providers: the single "produce a connected socket" capability that
//! both registry factories delegate to.
//!
//! Swapping the provider beneath the plain and TLS factories is how custom
//! transports (SOCKS, pre-configured sockets) are injected under any scheme.

use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::dns::resolve_target;
use crate::socket::options::ConnectOptions;
use crate::socket::route::Route;
use crate::socket::socks::{self, SocksCredentials};
use futures::future::BoxFuture;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use tokio::net::{TcpSocket, TcpStream};
use zeroize::Zeroizing;

/// Strategy that opens the transport stream for a route.
pub trait SocketProvider: Send + Sync + fmt::Debug {
    fn connect<'a>(
        &'a self,
        route: &'a Route,
        options: &'a ConnectOptions,
    ) -> BoxFuture<'a, Result<TcpStream, NetError>>;
}

/// Try each address in order, returning the first stream that connects.
async fn connect_any<F>(
    host: &str,
    addrs: Vec<SocketAddr>,
    options: &ConnectOptions,
    mut make_socket: F,
) -> Result<TcpStream, NetError>
where
    F: FnMut(&SocketAddr) -> io::Result<TcpSocket>,
{
    let mut last_err = None;
    for addr in addrs {
        let attempt = async {
            let socket = make_socket(&addr)?;
            options.socket.apply_to_socket(&socket)?;
            options.connect_socket(socket, addr).await
        };
        match attempt.await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                tracing::debug!(%addr, error = %e, "connect attempt failed");
                last_err = Some((addr, e));
            }
        }
    }

    match last_err {
        Some((addr, e)) if e.kind() == io::ErrorKind::TimedOut => {
            tracing::debug!(host, %addr, "connect timed out");
            Err(NetError::ConnectionTimedOut)
        }
        Some((addr, e)) => Err(e).connection_context(host, addr.port()),
        None => Err(NetError::NameNotResolved),
    }
}

fn socket_for(addr: &SocketAddr) -> io::Result<TcpSocket> {
    if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
}

/// Opens a direct TCP connection to the route's host.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectSocketProvider;

impl SocketProvider for DirectSocketProvider {
    fn connect<'a>(
        &'a self,
        route: &'a Route,
        options: &'a ConnectOptions,
    ) -> BoxFuture<'a, Result<TcpStream, NetError>> {
        Box::pin(async move {
            let addrs =
                resolve_target(options.resolver.as_ref(), route.host(), route.port()).await?;
            connect_any(route.host(), addrs, options, socket_for).await
        })
    }
}

/// Adapts a zero-argument closure producing an unconnected socket.
///
/// The closure decides how the socket is created (address family, bind
/// address, extra options); the provider resolves the route and connects it.
pub struct FnSocketProvider<F> {
    make_socket: F,
}

impl<F> FnSocketProvider<F>
where
    F: Fn() -> io::Result<TcpSocket> + Send + Sync,
{
    pub fn new(make_socket: F) -> Self {
        Self { make_socket }
    }
}

impl<F> fmt::Debug for FnSocketProvider<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSocketProvider").finish_non_exhaustive()
    }
}

impl<F> SocketProvider for FnSocketProvider<F>
where
    F: Fn() -> io::Result<TcpSocket> + Send + Sync,
{
    fn connect<'a>(
        &'a self,
        route: &'a Route,
        options: &'a ConnectOptions,
    ) -> BoxFuture<'a, Result<TcpStream, NetError>> {
        Box::pin(async move {
            let addrs =
                resolve_target(options.resolver.as_ref(), route.host(), route.port()).await?;
            connect_any(route.host(), addrs, options, |_| (self.make_socket)()).await
        })
    }
}

/// Tunnels every connection through a fixed SOCKS5 proxy.
#[derive(Debug, Clone)]
pub struct Socks5Provider {
    proxy_host: String,
    proxy_port: u16,
    credentials: Option<SocksCredentials>,
}

impl Socks5Provider {
    pub fn new(proxy_host: impl Into<String>, proxy_port: u16) -> Self {
        Self { proxy_host: proxy_host.into(), proxy_port, credentials: None }
    }

    pub fn with_auth(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some(SocksCredentials {
            username: username.to_string(),
            password: Zeroizing::new(password.to_string()),
        });
        self
    }

    pub fn proxy_host(&self) -> &str {
        &self.proxy_host
    }

    pub fn proxy_port(&self) -> u16 {
        self.proxy_port
    }
}

impl SocketProvider for Socks5Provider {
    fn connect<'a>(
        &'a self,
        route: &'a Route,
        options: &'a ConnectOptions,
    ) -> BoxFuture<'a, Result<TcpStream, NetError>> {
        Box::pin(async move {
            let addrs =
                resolve_target(options.resolver.as_ref(), &self.proxy_host, self.proxy_port).await?;
            let mut stream = connect_any(&self.proxy_host, addrs, options, socket_for)
                .await
                .map_err(|e| {
                    tracing::debug!(
                        proxy = %self.proxy_host,
                        error = %e,
                        "SOCKS proxy unreachable"
                    );
                    NetError::SocksConnectionFailed
                })?;

            let credentials = self.credentials.as_ref();
            let handshake = socks::connect(&mut stream, route.host(), route.port(), credentials);
            match options.connect_timeout {
                Some(limit) => tokio::time::timeout(limit, handshake)
                    .await
                    .map_err(|_| NetError::ConnectionTimedOut)??,
                None => handshake.await?,
            }

            tracing::debug!(%route, proxy = %self.proxy_host, "SOCKS tunnel established");
            Ok(stream)
        })
    }
}
