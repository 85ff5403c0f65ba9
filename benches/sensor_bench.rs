use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry_store::{
    BroadcastHub, BroadcastSampler, Ingestor, SensorSimulator, TelemetryConfig, TelemetryStore,
};

fn bench_sensor_pipeline(c: &mut Criterion) {
    let num_batches = 1_000;

    let mut simulator = SensorSimulator::with_seed(42);
    let batches: Vec<_> = (0..num_batches).map(|_| simulator.next_batch()).collect();

    let mut group = c.benchmark_group("sensor_pipeline");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("ingest_only", |b| {
        b.iter_custom(|iters| {
            let mut total_duration = Duration::ZERO;
            for _ in 0..iters {
                let ingestor = Ingestor::new(Arc::new(TelemetryStore::new()));
                let start = Instant::now();
                for batch in &batches {
                    black_box(ingestor.ingest(batch.clone()));
                }
                total_duration += start.elapsed();
            }
            total_duration
        });
    });

    group.bench_function("ingest_and_sample", |b| {
        b.iter_custom(|iters| {
            let mut total_duration = Duration::ZERO;
            for _ in 0..iters {
                let store = Arc::new(
                    TelemetryStore::try_new(
                        TelemetryConfig::default().with_broadcast_probabilities(1.0, 1.0),
                    )
                    .expect("valid config"),
                );
                let hub = Arc::new(BroadcastHub::new());
                let subscriber = hub.subscribe(num_batches * 3);
                let mut sampler = BroadcastSampler::with_seed(store.clone(), hub, 7);

                let start = Instant::now();
                for batch in &batches {
                    let stamped = store.add_readings(batch.iter().cloned());
                    black_box(sampler.sample_batch(&stamped));
                }
                total_duration += start.elapsed();

                while let Ok(payload) = subscriber.try_recv() {
                    black_box(payload);
                }
            }
            total_duration
        });
    });

    group.finish();
}

criterion_group!(benches, bench_sensor_pipeline);
criterion_main!(benches);
