//! System DNS resolver using getaddrinfo.
//!
//! Resolution runs on tokio's blocking pool so the reactor threads never
//! stall on the system resolver.

use super::{Addrs, Name, Resolve, Resolving};
use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use std::{
    io,
    net::{IpAddr, SocketAddr, ToSocketAddrs},
    sync::Arc,
};

/// System DNS resolver using `getaddrinfo` in a thread pool.
///
/// This is the resolver every manager uses when the configuration carries no
/// `dns-resolver`.
#[derive(Clone, Debug, Default)]
pub struct GaiResolver;

impl GaiResolver {
    pub fn new() -> Self {
        Self
    }
}

impl Resolve for GaiResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(async move {
            let host = name.as_str().to_string();
            let domain = host.clone();

            let result = tokio::task::spawn_blocking(move || {
                tracing::debug!(host = %host, "resolving via getaddrinfo");
                (host.as_str(), 0u16).to_socket_addrs().map(|iter| iter.collect::<Vec<_>>())
            })
            .await;

            let addrs = result
                .map_err(|e| {
                    tracing::error!(error = %e, "DNS resolution task failed");
                    NetError::NameNotResolved
                })?
                .inspect_err(|e| {
                    tracing::debug!(domain = %domain, error = %e, "DNS resolution failed")
                })
                .dns_context(&domain)?;

            if addrs.is_empty() {
                return Err(NetError::NameNotResolvedFor {
                    domain,
                    source: Arc::new(io::Error::new(
                        io::ErrorKind::NotFound,
                        "No addresses returned by getaddrinfo",
                    )),
                });
            }

            tracing::debug!(domain = %domain, count = addrs.len(), "DNS resolution complete");
            Ok(Box::new(addrs.into_iter()) as Addrs)
        })
    }
}

/// Resolve `host` to connectable addresses for `port`.
///
/// IP literals (including bracketed IPv6) bypass the resolver entirely.
pub async fn resolve_target(
    resolver: &dyn Resolve,
    host: &str,
    port: u16,
) -> Result<Vec<SocketAddr>, NetError> {
    let literal = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = literal.parse::<IpAddr>() {
        return Ok(vec![SocketAddr::new(ip, port)]);
    }

    let addrs: Vec<SocketAddr> = resolver
        .resolve(Name::new(host))
        .await?
        .map(|mut addr| {
            addr.set_port(port);
            addr
        })
        .collect();

    if addrs.is_empty() {
        return Err(NetError::NameNotResolved);
    }
    Ok(addrs)
}
