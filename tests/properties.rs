//! End-to-end properties of the ticket pool under real thread contention

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use ticketpool::{Config, PoolState, ReleaseOutcome, Simulation, TicketPool};

#[test]
fn purchases_match_releases_across_configurations() {
    for (capacity, batch, customers, amount) in
        [(1, 1, 1, 1), (10, 3, 2, 1), (40, 7, 5, 2), (9, 20, 3, 4)]
    {
        let config = Config {
            max_ticket_capacity: capacity,
            release_batch_size: batch,
            release_interval_ms: 1,
            retrieval_interval_ms: 1,
            customer_count: customers,
            retrieval_amount: amount,
        };

        let report = Simulation::new(config).unwrap().run().unwrap();
        assert_eq!(report.pool.total_released, capacity);
        assert_eq!(report.total_purchased(), capacity as u64);
        assert_eq!(report.pool.state(), PoolState::Stopped);
        assert!(report.is_balanced());
    }
}

#[test]
fn observers_never_see_broken_invariants() {
    let pool = Arc::new(TicketPool::new(60).unwrap());
    let done = Arc::new(AtomicBool::new(false));
    let bought = Arc::new(AtomicU64::new(0));

    let observer = {
        let pool = Arc::clone(&pool);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut seen_stopped = false;
            while !done.load(Ordering::SeqCst) {
                let snapshot = pool.snapshot();
                assert!(snapshot.available <= snapshot.total_released);
                assert!(snapshot.total_released <= snapshot.max_capacity);
                if seen_stopped {
                    assert!(!snapshot.selling, "selling resumed after stopping");
                }
                seen_stopped |= !snapshot.selling;
            }
        })
    };

    let customers: Vec<_> = (0..4)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let bought = Arc::clone(&bought);
            thread::spawn(move || loop {
                let snapshot = pool.snapshot();
                if snapshot.is_drained() {
                    break;
                }
                let taken = pool.retrieve(2).unwrap().retrieved();
                bought.fetch_add(taken as u64, Ordering::SeqCst);
                thread::yield_now();
            })
        })
        .collect();

    let mut outcomes = Vec::new();
    loop {
        let outcome = pool.release(11).unwrap();
        outcomes.push(outcome);
        if outcome == ReleaseOutcome::SoldOut || !pool.is_selling() {
            break;
        }
    }

    for customer in customers {
        customer.join().unwrap();
    }
    done.store(true, Ordering::SeqCst);
    observer.join().unwrap();

    let released: u32 = outcomes.iter().map(|o| o.released()).sum();
    assert_eq!(released, 60);
    assert_eq!(outcomes.last(), Some(&ReleaseOutcome::Released(5)));
    assert_eq!(bought.load(Ordering::SeqCst), 60);
    assert!(pool.snapshot().is_drained());
}

#[test]
fn stop_while_vendor_blocked_is_prompt() {
    let config = Config {
        max_ticket_capacity: 100,
        release_batch_size: 50,
        release_interval_ms: 1,
        retrieval_interval_ms: 10_000,
        customer_count: 1,
        retrieval_amount: 1,
    };
    let simulation = Simulation::new(config).unwrap();
    let stop = simulation.stop_handle();
    let pool = Arc::clone(simulation.pool());

    let runner = thread::spawn(move || simulation.run().unwrap());

    while pool.total_released() == 0 {
        thread::sleep(Duration::from_millis(5));
    }
    stop.stop();

    let report = runner.join().unwrap();
    assert!(report.interrupted());
    assert_eq!(report.vendor.batches, 1);
    assert!(report.total_purchased() <= 50);
    assert!(report.is_balanced());
}
