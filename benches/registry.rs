use connmgr::manager::build_pooling_manager;
use connmgr::tls::resolve;
use connmgr::ConnectionManagerConfig;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn benchmark_registry(c: &mut Criterion) {
    let manager = build_pooling_manager(&ConnectionManagerConfig::default()).unwrap();
    let registry = manager.pool().registry().clone();

    c.bench_function("registry_lookup", |b| {
        b.iter(|| {
            black_box(registry.lookup(black_box("https")));
            black_box(registry.lookup(black_box("HTTP")));
        })
    });

    c.bench_function("registry_lookup_miss", |b| {
        b.iter(|| black_box(registry.lookup(black_box("gopher"))))
    });
}

/// Building a TLS context dominates manager construction.
fn benchmark_tls_resolution(c: &mut Criterion) {
    let platform = ConnectionManagerConfig::default();
    let insecure = ConnectionManagerConfig::new().insecure(true);

    c.bench_function("tls_resolve_platform_default", |b| {
        b.iter(|| black_box(resolve(&platform).unwrap()))
    });

    c.bench_function("tls_resolve_insecure", |b| {
        b.iter(|| black_box(resolve(&insecure).unwrap()))
    });
}

criterion_group!(benches, benchmark_registry, benchmark_tls_resolution);
criterion_main!(benches);
