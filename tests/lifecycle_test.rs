//! Shutdown across every manager kind, and scope holders.

mod common;

use connmgr::manager::{
    build_async_pooling_manager, build_basic_manager, build_pooling_manager, build_socks_manager,
    with_connection_pool, Shutdownable,
};
use connmgr::reactor::IoReactorConfig;
use connmgr::{
    is_reusable, shutdown, ActiveManagers, ConnectionManager, ConnectionManagerConfig, ManagerKind,
    NetError, Route,
};
use std::sync::Arc;

fn all_managers() -> Vec<ConnectionManager> {
    let config = ConnectionManagerConfig::new()
        .io_config(IoReactorConfig::new().io_thread_count(1).shutdown_grace_period(50));
    vec![
        build_basic_manager(&config).unwrap().into(),
        build_pooling_manager(&config).unwrap().into(),
        build_async_pooling_manager(&config).unwrap().into(),
        build_socks_manager("127.0.0.1", 1080, &config).unwrap().into(),
    ]
}

#[tokio::test]
async fn test_kinds_and_reuse() {
    let kinds: Vec<_> = all_managers().iter().map(|m| (m.kind(), is_reusable(m))).collect();
    assert_eq!(
        kinds,
        vec![
            (ManagerKind::Basic, false),
            (ManagerKind::Pooling, true),
            (ManagerKind::PoolingAsync, true),
            (ManagerKind::SocksProxied, true),
        ]
    );
}

#[tokio::test]
async fn test_every_kind_shuts_down_once_or_twice() {
    let port = common::spawn_tcp_server().await;
    for manager in all_managers() {
        shutdown(Some(&manager)).unwrap();
        shutdown(Some(&manager)).unwrap();
        assert!(manager.pool().is_closed());
        if let Some(reactor) = manager.reactor() {
            assert!(!reactor.is_running());
        }

        let err = manager.lease(&Route::new("http", "127.0.0.1", port)).await.unwrap_err();
        assert!(matches!(err, NetError::ManagerShutdown), "{:?}: {:?}", manager.kind(), err);
    }
}

#[tokio::test]
async fn test_shutdown_drops_idle_connections() {
    let port = common::spawn_tcp_server().await;
    let manager = build_pooling_manager(&ConnectionManagerConfig::default()).unwrap();
    let route = Route::new("http", "127.0.0.1", port);

    let held = manager.lease(&route).await.unwrap();
    manager.lease(&route).await.unwrap().release();
    assert_eq!(manager.stats().idle, 1);

    shutdown(Some(&manager)).unwrap();
    assert_eq!(manager.stats().idle, 0);

    // A connection leased before shutdown is not taken back.
    held.release();
    assert_eq!(manager.stats().idle, 0);
}

#[test]
fn test_absent_manager() {
    assert!(shutdown::<ConnectionManager>(None).is_ok());
}

struct HandRolled;

impl Shutdownable for HandRolled {}

#[test]
fn test_unknown_manager_type() {
    match shutdown(Some(&HandRolled)).unwrap_err() {
        NetError::UnsupportedManagerType(name) => assert!(name.contains("HandRolled")),
        other => panic!("Expected UnsupportedManagerType, got {:?}", other),
    }
}

#[tokio::test]
async fn test_scoped_pool_is_shut_down_after_error() {
    let scope = ActiveManagers::new();
    let config = ConnectionManagerConfig::new().threads(1).default_per_route(1);
    let (manager, result) = with_connection_pool(&scope, &config, |call| async move {
        let m = call.current_sync().unwrap();
        let result = m.lease(&Route::new("gopher", "127.0.0.1", 70)).await;
        (m, result)
    })
    .await
    .unwrap();

    assert!(matches!(result, Err(NetError::UnknownUrlScheme(_))));
    assert!(manager.pool().is_closed());
    assert!(scope.current_sync().is_none());
}

#[tokio::test]
async fn test_scope_restores_outer_binding() {
    let mut scope = ActiveManagers::new();
    let outer = Arc::new(ConnectionManager::from(
        build_basic_manager(&ConnectionManagerConfig::default()).unwrap(),
    ));
    let bound = scope.bind_sync(outer.clone());

    let config = ConnectionManagerConfig::default();
    let inner = with_connection_pool(&bound, &config, |call| async move {
        call.current_sync().unwrap()
    })
    .await
    .unwrap();
    assert!(!Arc::ptr_eq(&inner, &outer));
    assert_eq!(inner.kind(), ManagerKind::Pooling);

    let current = bound.current_sync().unwrap();
    assert!(Arc::ptr_eq(&current, &outer));
    assert_eq!(current.kind(), ManagerKind::Basic);
    drop(bound);
    assert!(scope.current_sync().is_none());
}

#[tokio::test]
async fn test_concurrent_scoped_pools_do_not_leak() {
    let scope = ActiveManagers::new();
    let config = ConnectionManagerConfig::default();
    let (release_first, first_done) = tokio::sync::oneshot::channel::<()>();

    // The first call outlives the second.
    let first = with_connection_pool(&scope, &config, |call| {
        async move {
            let _ = first_done.await;
            call.current_sync().unwrap()
        }
    });
    let second = with_connection_pool(&scope, &config, |call| {
        async move {
            let manager = call.current_sync().unwrap();
            let _ = release_first.send(());
            manager
        }
    });
    let (first, second) = tokio::join!(first, second);
    let (first, second) = (first.unwrap(), second.unwrap());

    assert!(!Arc::ptr_eq(&first, &second));
    assert!(first.pool().is_closed() && second.pool().is_closed());
    assert!(scope.current_sync().is_none());
}

#[test]
fn test_construction_failure_leaves_scope_untouched() {
    let scope = ActiveManagers::new();
    let config = ConnectionManagerConfig::new().threads(0);
    let result = futures::executor::block_on(with_connection_pool(&scope, &config, |_| async {}));
    assert!(matches!(result, Err(NetError::InvalidArgument(_))));
    assert!(scope.current_sync().is_none());
}
