use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use livemon::reflect::{Monitored, TypeDescriptor};
use livemon::settings::LoggingSettings;
use livemon::{Assembly, MonitorAttribute, MonitorSettings, MonitorTarget, MonitoringContext, Target, TypeBuilder, TypeCatalog};

const HANDLES: usize = 1024;

struct Gauge {
    value: AtomicI32,
    ratio: AtomicI32,
}

impl MonitorTarget for Gauge {}

impl Monitored for Gauge {
    fn describe() -> TypeDescriptor {
        TypeBuilder::<Gauge>::new()
            .field("value", |g: &Gauge| g.value.load(Ordering::Relaxed))
            .monitored(MonitorAttribute::new())
            .property("ratio", |g: &Gauge| f64::from(g.ratio.load(Ordering::Relaxed)) / 7.0)
            .monitored(MonitorAttribute::new().format("F3"))
            .build()
    }
}

fn make_context() -> (MonitoringContext, Vec<Arc<Gauge>>) {
    let mut settings = MonitorSettings::default();
    settings.logging = LoggingSettings::silent();
    let mut context = MonitoringContext::new(settings).unwrap();
    context
        .start(&TypeCatalog::new().with_assembly(Assembly::new("bench").with::<Gauge>()))
        .unwrap();

    let gauges: Vec<Arc<Gauge>> = (0..HANDLES / 2)
        .map(|i| {
            Arc::new(Gauge {
                value: AtomicI32::new(i32::try_from(i).unwrap_or_default()),
                ratio: AtomicI32::new(1),
            })
        })
        .collect();
    for gauge in &gauges {
        let target: Target = gauge.clone();
        context.register_target(target);
    }
    context.tick();
    (context, gauges)
}

fn bench_unchanged_sweep(c: &mut Criterion) {
    let (mut context, _gauges) = make_context();
    let mut group = c.benchmark_group("refresh");
    group.throughput(Throughput::Elements(HANDLES as u64));
    group.bench_function("unchanged_sweep", |b| b.iter(|| context.tick()));
    group.finish();
}

fn bench_changing_sweep(c: &mut Criterion) {
    let (mut context, gauges) = make_context();
    let mut group = c.benchmark_group("refresh");
    group.throughput(Throughput::Elements(HANDLES as u64));
    group.bench_function("changing_sweep", |b| {
        b.iter(|| {
            for gauge in &gauges {
                gauge.value.fetch_add(1, Ordering::Relaxed);
                gauge.ratio.fetch_add(1, Ordering::Relaxed);
            }
            context.tick()
        });
    });
    group.finish();
}

criterion_group!(benches, bench_unchanged_sweep, bench_changing_sweep);
criterion_main!(benches);
