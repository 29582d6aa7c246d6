//! Pool throughput benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use ticketpool::{CancellationToken, Customer, TicketPool, Vendor};

/// Uncontended release followed by a full drain
fn bench_release_retrieve(c: &mut Criterion) {
    let mut group = c.benchmark_group("release_retrieve");

    for batch in [1u32, 16, 256].iter() {
        group.bench_with_input(BenchmarkId::new("batch", batch), batch, |b, &batch| {
            let pool = TicketPool::new(u32::MAX).unwrap();
            b.iter(|| {
                let released = pool.release(batch).unwrap();
                black_box(released);
                while pool.retrieve(8).unwrap().is_success() {}
            });
        });
    }

    group.finish();
}

/// Vendor and customers with zero intervals, so only lock contention is measured
fn bench_contended_sale(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_sale");
    group.sample_size(20);

    for customers in [1usize, 4, 16].iter() {
        group.bench_with_input(
            BenchmarkId::new("customers", customers),
            customers,
            |b, &customers| {
                b.iter(|| {
                    let pool = Arc::new(TicketPool::new(2_000).unwrap());
                    let token = CancellationToken::new();

                    let handles: Vec<_> = (1..=customers)
                        .map(|id| {
                            let customer = Customer::new(id, Arc::clone(&pool), 3, Duration::ZERO);
                            let token = token.clone();
                            thread::spawn(move || customer.run(&token))
                        })
                        .collect();

                    let vendor = Vendor::new(Arc::clone(&pool), 50, Duration::ZERO);
                    black_box(vendor.run(&token));

                    let purchased: u64 = handles
                        .into_iter()
                        .map(|h| h.join().unwrap().tickets_purchased)
                        .sum();
                    black_box(purchased);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_release_retrieve, bench_contended_sale);
criterion_main!(benches);
