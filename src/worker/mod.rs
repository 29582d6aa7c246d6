//! Vendor and customer roles
//!
//! Each role is a plain loop over the shared [`TicketPool`], run on its own
//! named thread through [`WorkerHandle`]. Both loops poll on a fixed interval
//! and stop promptly once their [`CancellationToken`] is cancelled.

use crate::pool::{ReleaseOutcome, RetrieveOutcome, TicketPool};
use crate::{Error, Result};
use log::{error, info, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub use crate::utils::cancel::CancellationToken;

/// Summary of a vendor run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VendorReport {
    pub tickets_released: u64,
    pub batches: usize,
    pub interrupted: bool,
}

/// Summary of a customer run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerReport {
    pub id: usize,
    pub tickets_purchased: u64,
    pub successful_attempts: usize,
    pub failed_attempts: usize,
    pub interrupted: bool,
}

/// Producer role: releases a batch, then waits for the release interval
pub struct Vendor {
    pool: Arc<TicketPool>,
    batch_size: u32,
    release_interval: Duration,
}

impl Vendor {
    pub fn new(pool: Arc<TicketPool>, batch_size: u32, release_interval: Duration) -> Self {
        Self {
            pool,
            batch_size,
            release_interval,
        }
    }

    /// Release batches until selling stops or `token` is cancelled
    pub fn run(&self, token: &CancellationToken) -> VendorReport {
        let mut report = VendorReport::default();

        while !token.is_cancelled() && self.pool.is_selling() {
            match self.pool.release_interruptible(self.batch_size, token) {
                Ok(ReleaseOutcome::Released(count)) => {
                    report.tickets_released += count as u64;
                    report.batches += 1;
                }
                Ok(ReleaseOutcome::SoldOut) => break,
                Ok(ReleaseOutcome::Interrupted) => {
                    report.interrupted = true;
                    break;
                }
                Err(e) => {
                    error!("Vendor failed to release tickets: {}", e);
                    break;
                }
            }

            info!(
                "Vendor waiting {} ms before the next release",
                self.release_interval.as_millis()
            );
            if !token.sleep(self.release_interval) {
                warn!("Vendor interrupted");
                report.interrupted = true;
                break;
            }
        }

        if token.is_cancelled() {
            report.interrupted = true;
        }
        info!(
            "Vendor has stopped selling tickets after {} batches ({} tickets)",
            report.batches, report.tickets_released
        );
        report
    }
}

/// Consumer role: tries to buy a fixed amount, then waits for the retrieval interval
pub struct Customer {
    id: usize,
    pool: Arc<TicketPool>,
    retrieval_amount: u32,
    retrieval_interval: Duration,
}

impl Customer {
    pub fn new(
        id: usize,
        pool: Arc<TicketPool>,
        retrieval_amount: u32,
        retrieval_interval: Duration,
    ) -> Self {
        Self {
            id,
            pool,
            retrieval_amount,
            retrieval_interval,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Buy tickets while the pool is selling or still holds leftovers
    pub fn run(&self, token: &CancellationToken) -> CustomerReport {
        let mut report = CustomerReport {
            id: self.id,
            ..Default::default()
        };

        while !token.is_cancelled() {
            let snapshot = self.pool.snapshot();
            if !snapshot.selling && snapshot.available == 0 {
                break;
            }

            match self.pool.retrieve(self.retrieval_amount) {
                Ok(RetrieveOutcome::Retrieved(count)) => {
                    report.tickets_purchased += count as u64;
                    report.successful_attempts += 1;
                }
                Ok(RetrieveOutcome::Empty) => {
                    report.failed_attempts += 1;
                    if !self.pool.is_selling() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Customer {} failed to retrieve tickets: {}", self.id, e);
                    break;
                }
            }

            if !token.sleep(self.retrieval_interval) {
                warn!("Customer {} interrupted", self.id);
                break;
            }
        }

        report.interrupted = token.is_cancelled();
        info!(
            "Customer {} has stopped buying tickets ({} purchased)",
            self.id, report.tickets_purchased
        );
        report
    }
}

/// Named worker thread
pub struct WorkerHandle<R> {
    name: String,
    handle: JoinHandle<R>,
}

impl<R: Send + 'static> WorkerHandle<R> {
    /// Spawn `body` on a thread called `name`
    pub fn spawn<F>(name: &str, body: F) -> Result<Self>
    where
        F: FnOnce() -> R + Send + 'static,
    {
        let handle = thread::Builder::new().name(name.to_string()).spawn(body)?;
        info!("Started {}", name);

        Ok(Self {
            name: name.to_string(),
            handle,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the worker to finish
    pub fn join(self) -> Result<R> {
        match self.handle.join() {
            Ok(result) => {
                info!("{} has finished", self.name);
                Ok(result)
            }
            Err(_) => Err(Error::WorkerPanicked(self.name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_vendor_releases_until_capacity() {
        let pool = Arc::new(TicketPool::new(7).unwrap());
        let vendor = Vendor::new(Arc::clone(&pool), 3, Duration::ZERO);
        let token = CancellationToken::new();

        let customer_pool = Arc::clone(&pool);
        let drainer = thread::spawn(move || {
            let mut bought = 0;
            while bought < 7 {
                bought += customer_pool.retrieve(10).unwrap().retrieved();
                thread::yield_now();
            }
            bought
        });

        let report = vendor.run(&token);
        assert_eq!(drainer.join().unwrap(), 7);
        assert_eq!(report.tickets_released, 7);
        assert_eq!(report.batches, 3);
        assert!(!report.interrupted);
        assert!(!pool.is_selling());
    }

    #[test]
    fn test_vendor_stops_on_cancel_while_blocked() {
        let pool = Arc::new(TicketPool::new(100).unwrap());
        let vendor = Vendor::new(Arc::clone(&pool), 10, Duration::ZERO);
        let token = CancellationToken::new();

        let (tx, rx) = mpsc::channel();
        let vendor_token = token.clone();
        let handle = thread::spawn(move || {
            tx.send(vendor.run(&vendor_token)).unwrap();
        });

        // No customers: the vendor blocks after its first batch.
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        token.cancel();
        pool.interrupt();

        let report = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
        assert_eq!(report.batches, 1);
        assert_eq!(report.tickets_released, 10);
        assert!(report.interrupted);
        assert_eq!(pool.available_tickets(), 10);
    }

    #[test]
    fn test_customer_drains_leftovers_after_stop() {
        let pool = Arc::new(TicketPool::new(5).unwrap());
        pool.release(5).unwrap();
        assert!(!pool.is_selling());

        let customer = Customer::new(1, Arc::clone(&pool), 2, Duration::ZERO);
        let report = customer.run(&CancellationToken::new());

        assert_eq!(report.id, 1);
        assert_eq!(report.tickets_purchased, 5);
        assert_eq!(report.successful_attempts, 3);
        assert!(!report.interrupted);
        assert_eq!(pool.available_tickets(), 0);
    }

    #[test]
    fn test_customer_exits_on_stopped_empty_pool() {
        let pool = Arc::new(TicketPool::new(1).unwrap());
        pool.release(1).unwrap();
        pool.retrieve(1).unwrap();

        let customer = Customer::new(2, pool, 1, Duration::from_secs(60));
        let report = customer.run(&CancellationToken::new());
        assert_eq!(report.tickets_purchased, 0);
        assert_eq!(report.successful_attempts, 0);
    }

    #[test]
    fn test_customer_cancelled_during_sleep() {
        let pool = Arc::new(TicketPool::new(10).unwrap());
        let customer = Customer::new(3, Arc::clone(&pool), 1, Duration::from_secs(60));
        let token = CancellationToken::new();

        let customer_token = token.clone();
        let handle = WorkerHandle::spawn("customer-3", move || customer.run(&customer_token))
            .unwrap();
        assert_eq!(handle.name(), "customer-3");

        thread::sleep(Duration::from_millis(50));
        token.cancel();

        let report = handle.join().unwrap();
        assert!(report.interrupted);
        assert!(report.failed_attempts >= 1);
        assert!(pool.is_selling());
    }

    #[test]
    fn test_worker_panic_is_reported() {
        let handle = WorkerHandle::spawn("doomed", || -> u32 { panic!("boom") }).unwrap();
        match handle.join() {
            Err(Error::WorkerPanicked(name)) => assert_eq!(name, "doomed"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }
}
