//! Fork/join orchestration of one vendor and several customers

use crate::pool::{PoolSnapshot, TicketPool};
use crate::utils::cancel::CancellationToken;
use crate::utils::config::Config;
use crate::worker::{Customer, CustomerReport, Vendor, VendorReport, WorkerHandle};
use crate::Result;
use log::{info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Stops a running simulation from another thread (e.g. a signal handler)
#[derive(Clone, Debug)]
pub struct StopHandle {
    token: CancellationToken,
    pool: Arc<TicketPool>,
}

impl StopHandle {
    /// Cancel every worker and wake a vendor blocked on the pool
    pub fn stop(&self) {
        self.token.cancel();
        self.pool.interrupt();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Outcome of a full run
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub vendor: VendorReport,
    pub customers: Vec<CustomerReport>,
    /// Pool state after every worker has finished
    pub pool: PoolSnapshot,
    pub elapsed: Duration,
}

impl SimulationReport {
    /// Tickets bought across all customers
    pub fn total_purchased(&self) -> u64 {
        self.customers.iter().map(|c| c.tickets_purchased).sum()
    }

    /// Whether any worker was stopped early
    pub fn interrupted(&self) -> bool {
        self.vendor.interrupted || self.customers.iter().any(|c| c.interrupted)
    }

    /// Every released ticket is accounted for by a purchase or is still available
    pub fn is_balanced(&self) -> bool {
        self.total_purchased() + self.pool.available as u64 == self.pool.total_released as u64
            && self.vendor.tickets_released == self.pool.total_released as u64
    }
}

/// One ticket sale run
pub struct Simulation {
    config: Config,
    pool: Arc<TicketPool>,
    token: CancellationToken,
}

impl Simulation {
    /// Validate `config` and build the pool for a run
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let pool = Arc::new(TicketPool::new(config.max_ticket_capacity)?);

        Ok(Self {
            config,
            pool,
            token: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pool(&self) -> &Arc<TicketPool> {
        &self.pool
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            token: self.token.clone(),
            pool: Arc::clone(&self.pool),
        }
    }

    /// Start the vendor and customers and wait for all of them to finish
    pub fn run(&self) -> Result<SimulationReport> {
        let start = Instant::now();
        info!(
            "Starting ticket sale: capacity {}, batch {}, {} customers",
            self.config.max_ticket_capacity, self.config.release_batch_size, self.config.customer_count
        );

        let vendor = Vendor::new(
            Arc::clone(&self.pool),
            self.config.release_batch_size,
            self.config.release_interval(),
        );
        let vendor_token = self.token.clone();
        let vendor_handle = WorkerHandle::spawn("vendor", move || vendor.run(&vendor_token))?;

        let mut customer_handles = Vec::with_capacity(self.config.customer_count as usize);
        for id in 1..=self.config.customer_count as usize {
            let customer = Customer::new(
                id,
                Arc::clone(&self.pool),
                self.config.retrieval_amount,
                self.config.retrieval_interval(),
            );
            let token = self.token.clone();
            match WorkerHandle::spawn(&format!("customer-{}", id), move || customer.run(&token)) {
                Ok(handle) => customer_handles.push(handle),
                Err(e) => {
                    // Unwind the workers already running before reporting.
                    self.stop_handle().stop();
                    let _ = vendor_handle.join();
                    for handle in customer_handles {
                        let _ = handle.join();
                    }
                    return Err(e);
                }
            }
        }

        // Join everyone even if one worker panicked, then report the first failure.
        let vendor_result = vendor_handle.join();
        if vendor_result.is_err() {
            warn!("Vendor failed, stopping customers");
            self.stop_handle().stop();
        }
        let customer_results: Vec<_> = customer_handles
            .into_iter()
            .map(WorkerHandle::join)
            .collect();

        let vendor = vendor_result?;
        let customers = customer_results.into_iter().collect::<Result<Vec<_>>>()?;

        let report = SimulationReport {
            vendor,
            customers,
            pool: self.pool.snapshot(),
            elapsed: start.elapsed(),
        };
        info!(
            "Ticket sale completed: {} released, {} purchased in {:?}",
            report.pool.total_released,
            report.total_purchased(),
            report.elapsed
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn fast_config(capacity: u32, batch: u32, customers: u32) -> Config {
        Config {
            max_ticket_capacity: capacity,
            release_batch_size: batch,
            release_interval_ms: 1,
            retrieval_interval_ms: 1,
            customer_count: customers,
            retrieval_amount: 1,
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = Config {
            max_ticket_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            Simulation::new(config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_run_sells_every_ticket() {
        let simulation = Simulation::new(fast_config(25, 4, 2)).unwrap();
        let report = simulation.run().unwrap();

        assert_eq!(report.vendor.tickets_released, 25);
        assert_eq!(report.vendor.batches, 7);
        assert_eq!(report.total_purchased(), 25);
        assert_eq!(report.customers.len(), 2);
        assert!(report.pool.is_drained());
        assert!(report.is_balanced());
        assert!(!report.interrupted());
    }

    #[test]
    fn test_stop_handle_ends_run() {
        let config = Config {
            release_interval_ms: 60_000,
            retrieval_interval_ms: 60_000,
            ..fast_config(1000, 5, 3)
        };
        let simulation = Simulation::new(config).unwrap();
        let stop = simulation.stop_handle();

        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            stop.stop();
        });

        let report = simulation.run().unwrap();
        stopper.join().unwrap();

        assert!(report.interrupted());
        assert!(report.pool.total_released < 1000);
        assert!(report.pool.selling);
        assert!(report.is_balanced());
        assert!(simulation.stop_handle().is_stopped());
    }
}
