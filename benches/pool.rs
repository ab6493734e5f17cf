use connmgr::manager::build_pooling_manager;
use connmgr::{ConnectionManagerConfig, Route};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tokio::net::TcpListener;

/// Lease/release cycles that hit the idle set; no new connections are opened
/// after the first iteration.
fn benchmark_pool_operations(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let port = rt.block_on(async {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        port
    });

    let manager = rt.block_on(async {
        build_pooling_manager(&ConnectionManagerConfig::new().threads(8).default_per_route(8))
            .unwrap()
    });
    let route = Route::new("http", "127.0.0.1", port);

    c.bench_function("pool_lease_release_reused", |b| {
        b.to_async(&rt).iter(|| async {
            let conn = manager.lease(&route).await.unwrap();
            black_box(conn.is_reused());
            conn.release();
        })
    });

    c.bench_function("pool_stats", |b| {
        b.iter(|| {
            black_box(manager.stats());
            black_box(manager.pool().route_stats(&route));
        })
    });

    c.bench_function("pool_purge_idle", |b| b.iter(|| black_box(manager.pool().purge())));
}

criterion_group!(benches, benchmark_pool_operations);
criterion_main!(benches);
