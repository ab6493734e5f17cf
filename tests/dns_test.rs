//! DNS Module Tests
//!
//! Covers:
//! - `StaticHostResolver` in front of a MockResolver
//! - `resolve_target` port handling and IP literals
//! - A custom `dns-resolver` steering manager connections
//! - `GaiResolver` (Basic System Resolver)

mod common;

use connmgr::dns::{
    resolve_target, Addrs, GaiResolver, Name, Resolve, Resolving, StaticHostResolver,
};
use connmgr::manager::build_pooling_manager;
use connmgr::{ConnectionManagerConfig, NetError, Route};

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct MockResolver {
    response: Vec<SocketAddr>,
    calls: AtomicUsize,
}

impl MockResolver {
    fn new(response: Vec<SocketAddr>) -> Self {
        Self { response, calls: AtomicUsize::new(0) }
    }
}

impl Resolve for MockResolver {
    fn resolve(&self, _name: Name) -> Resolving {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let addrs = self.response.clone();
        Box::pin(async move { Ok(Box::new(addrs.into_iter()) as Addrs) })
    }
}

#[tokio::test]
async fn test_host_table_falls_back() {
    let mock = Arc::new(MockResolver::new(vec![SocketAddr::new(
        IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)),
        0,
    )]));
    let resolver = StaticHostResolver::new()
        .host("local.override", [IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))])
        .fallback(mock.clone());

    // Table hit
    let addrs: Vec<_> = resolver.resolve(Name::new("local.override")).await.unwrap().collect();
    assert_eq!(addrs.len(), 1);
    assert_eq!(addrs[0].ip(), IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)));
    assert_eq!(mock.calls.load(Ordering::SeqCst), 0);

    // Passthrough (miss)
    let addrs: Vec<_> = resolver.resolve(Name::new("other.com")).await.unwrap().collect();
    assert_eq!(addrs.len(), 1);
    assert_eq!(addrs[0].ip(), IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)));
    assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_host_table_steers_route() {
    let port = common::spawn_tcp_server().await;
    let table = StaticHostResolver::new().host("App.Internal", [IpAddr::V4(Ipv4Addr::LOCALHOST)]);
    let config = ConnectionManagerConfig::new().dns_resolver(Arc::new(table));
    let manager = build_pooling_manager(&config).unwrap();

    let conn = manager.lease(&Route::new("http", "app.internal", port)).await.unwrap();
    assert_eq!(conn.socket().unwrap().tcp().peer_addr().unwrap().port(), port);

    let err = manager.lease(&Route::new("http", "unknown.internal", port)).await.unwrap_err();
    assert!(matches!(err, NetError::NameNotResolved));
}

#[tokio::test]
async fn test_resolve_target_sets_port() {
    let mock = MockResolver::new(vec![
        SocketAddr::from(([10, 0, 0, 1], 0)),
        SocketAddr::from(([10, 0, 0, 2], 0)),
    ]);
    let addrs = resolve_target(&mock, "service.internal", 8443).await.unwrap();
    let expected =
        vec![SocketAddr::from(([10, 0, 0, 1], 8443)), SocketAddr::from(([10, 0, 0, 2], 8443))];
    assert_eq!(addrs, expected);

    // IP literals never reach the resolver.
    resolve_target(&mock, "192.0.2.7", 80).await.unwrap();
    assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_resolve_target_empty_answer() {
    let mock = MockResolver::new(Vec::new());
    let err = resolve_target(&mock, "nothing.internal", 80).await.unwrap_err();
    assert!(matches!(err, NetError::NameNotResolved));
}

#[tokio::test]
async fn test_configured_resolver_is_used() {
    let port = common::spawn_tcp_server().await;
    let mock = Arc::new(MockResolver::new(vec![SocketAddr::from(([127, 0, 0, 1], 0))]));
    let config = ConnectionManagerConfig::new().dns_resolver(mock.clone());
    let manager = build_pooling_manager(&config).unwrap();

    let conn = manager.lease(&Route::new("http", "app.internal", port)).await.unwrap();
    assert!(!conn.is_tls());
    assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_gai_resolver_localhost() {
    let resolver = GaiResolver::new();
    // localhost should always resolve, usually to 127.0.0.1 or ::1
    let result = resolver.resolve(Name::new("localhost")).await;

    if let Ok(addrs) = result {
        let list: Vec<_> = addrs.collect();
        assert!(!list.is_empty());
    } else {
        println!("GaiResolver failed for localhost - possibly no network access");
    }
}
