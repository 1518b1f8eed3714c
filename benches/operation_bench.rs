use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rayon::prelude::*;

use coordop::proj::transverse_mercator::utm_parameters;
use coordop::referencing::{
    BursaWolfParameters, CoordinateSystem, Crs, Ellipsoid, GeodeticDatum, ProjectedCrs, Unit,
};
use coordop::{CoordinateOperationFactory, FactoryConfig, MathTransformFactory};

fn ed50() -> Arc<Crs> {
    let datum = GeodeticDatum::new("European Datum 1950", Ellipsoid::INTERNATIONAL_1924)
        .with_bursa_wolf(BursaWolfParameters::translation("WGS84", -87.0, -98.0, -121.0));
    Arc::new(Crs::geographic(
        "ED50",
        datum,
        CoordinateSystem::ellipsoidal_2d_lat_lon(Unit::DEGREE),
    ))
}

fn utm(zone: u8) -> Arc<Crs> {
    let projected = ProjectedCrs::create(
        &format!("WGS 84 / UTM zone {zone}N"),
        Arc::new(Crs::wgs84()),
        "Transverse_Mercator",
        &utm_parameters(zone, true, &Ellipsoid::WGS84),
        CoordinateSystem::projected(Unit::METRE),
        &MathTransformFactory::default(),
    )
    .unwrap();
    Arc::new(Crs::Projected(projected))
}

fn bench_create_uncached(c: &mut Criterion) {
    let factory = CoordinateOperationFactory::new(FactoryConfig::default().with_cache_capacity(0));
    let source = ed50();
    let target = utm(33);
    c.bench_function("create_ed50_to_utm33_uncached", |b| {
        b.iter(|| black_box(factory.create_operation(&source, &target).unwrap()));
    });
}

fn bench_create_cached(c: &mut Criterion) {
    let factory = CoordinateOperationFactory::default();
    let source = ed50();
    let target = utm(33);
    factory.create_operation(&source, &target).unwrap();
    c.bench_function("create_ed50_to_utm33_cached", |b| {
        b.iter(|| black_box(factory.create_operation(&source, &target).unwrap()));
    });
}

fn bench_parallel_lookups(c: &mut Criterion) {
    // 60 zones, each requested from every thread
    let factory = CoordinateOperationFactory::default();
    let source = ed50();
    let targets: Vec<Arc<Crs>> = (1..=60).map(utm).collect();

    for &threads in &[1usize, 4, 8] {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .unwrap();
        c.bench_function(&format!("parallel_lookups_threads_{threads}"), |b| {
            b.iter(|| {
                factory.clear_cache();
                black_box(pool.install(|| {
                    targets
                        .par_iter()
                        .map(|target| factory.create_operation(&source, target).unwrap())
                        .count()
                }))
            });
        });
    }
}

fn bench_transform_points(c: &mut Criterion) {
    let factory = CoordinateOperationFactory::default();
    let op = factory.create_operation(&ed50(), &utm(33)).unwrap();
    let n = 100_000;
    let points: Vec<f64> = (0..n)
        .flat_map(|i| {
            let t = i as f64 / n as f64;
            [50.0 + t * 5.0, 12.0 + t * 6.0]
        })
        .collect();
    c.bench_function("transform_100k_points_ed50_to_utm33", |b| {
        b.iter(|| black_box(op.transform().transform_points(&points).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_create_uncached,
    bench_create_cached,
    bench_parallel_lookups,
    bench_transform_points
);
criterion_main!(benches);
