//! Criterion benchmarks for the capture-thread hot paths
//!
//! Covers: event decoding, throttling and ring buffer push/pop.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use event_tapper::capture::{EventDecoder, EventRingBuffer, SyntheticEvent};
use event_tapper::pipeline::Throttler;
use event_tapper::time::timebase::MachTimebase;
use event_tapper::time::TimeReference;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn decoder() -> EventDecoder {
    MachTimebase::init();
    EventDecoder::new(Some(1080.0), TimeReference::now())
}

// ---------------------------------------------------------------------------
// Decoder benchmarks
// ---------------------------------------------------------------------------

fn bench_decode(c: &mut Criterion) {
    let decoder = decoder();
    let mut group = c.benchmark_group("decode");

    let mouse = SyntheticEvent::mouse_moved(640.0, 360.0)
        .with_int_field(4, 3)
        .with_int_field(5, -2);
    group.bench_function("mouse_moved", |b| {
        b.iter(|| decoder.decode_raw(black_box(&mouse)));
    });

    let key = SyntheticEvent::key_down(36, 0x0002_0000);
    group.bench_function("key_down", |b| {
        b.iter(|| decoder.decode_raw(black_box(&key)));
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Throttler benchmarks
// ---------------------------------------------------------------------------

fn bench_throttle(c: &mut Criterion) {
    let mut group = c.benchmark_group("throttle_offer");

    for interval_ms in [0u64, 16, 500] {
        group.bench_with_input(
            BenchmarkId::from_parameter(interval_ms),
            &interval_ms,
            |b, &interval_ms| {
                let mut throttler = Throttler::new(Duration::from_millis(interval_ms));
                let mut now = Instant::now();
                let step = Duration::from_micros(250);
                let mut n = 0u64;

                b.iter(|| {
                    now += step;
                    n += 1;
                    black_box(throttler.offer(black_box(n), now));
                });
            },
        );
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Ring buffer benchmarks
// ---------------------------------------------------------------------------

fn bench_ring_buffer_push(c: &mut Criterion) {
    let event = Arc::new(decoder().decode_raw(&SyntheticEvent::mouse_moved(1.0, 2.0)));

    c.bench_function("ring_buffer_push", |b| {
        let buffer = EventRingBuffer::with_capacity(8192);
        let (mut producer, mut consumer) = buffer.split();

        b.iter(|| {
            if !producer.push(black_box(Arc::clone(&event))) {
                // Drain periodically to avoid filling up
                while consumer.pop().is_some() {}
                producer.push(black_box(Arc::clone(&event)));
            }
        });
    });
}

fn bench_ring_buffer_pop(c: &mut Criterion) {
    let event = Arc::new(decoder().decode_raw(&SyntheticEvent::mouse_moved(1.0, 2.0)));

    c.bench_function("ring_buffer_pop", |b| {
        let buffer = EventRingBuffer::with_capacity(8192);
        let (mut producer, mut consumer) = buffer.split();

        // Pre-fill buffer
        for _ in 0..8192 {
            producer.push(Arc::clone(&event));
        }

        b.iter(|| {
            if let Some(slot) = consumer.pop() {
                black_box(slot);
                // Refill so we always have data
                producer.push(Arc::clone(&event));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_decode,
    bench_throttle,
    bench_ring_buffer_push,
    bench_ring_buffer_pop
);
criterion_main!(benches);
