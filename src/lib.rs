//! Ticketpool - bounded ticket-sale buffer
//!
//! A single vendor releases tickets in batches into a shared pool while any
//! number of customers retrieve them concurrently. The pool admits one
//! outstanding batch at a time, enforces a lifetime capacity cap, and gives
//! every party a consistent "selling has stopped" signal to terminate on.

pub mod pool;
pub mod simulation;
pub mod utils;
pub mod worker;

// Re-export key components
pub use pool::{PoolSnapshot, PoolState, ReleaseOutcome, RetrieveOutcome, TicketPool};
pub use simulation::{Simulation, SimulationReport, StopHandle};
pub use utils::config::{Config, ConfigStore};
pub use worker::{CancellationToken, Customer, CustomerReport, Vendor, VendorReport, WorkerHandle};

use thiserror::Error;

/// Ticketpool error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Worker '{0}' panicked")]
    WorkerPanicked(String),

    #[error("Logger error: {0}")]
    Logger(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] std::num::ParseIntError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidConfig("maxTicketCapacity must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: maxTicketCapacity must be positive"
        );

        let err = Error::WorkerPanicked("customer-1".to_string());
        assert_eq!(err.to_string(), "Worker 'customer-1' panicked");
    }

    #[test]
    fn test_parse_error_conversion() {
        fn parse(input: &str) -> Result<u32> {
            Ok(input.trim().parse::<u32>()?)
        }

        assert_eq!(parse(" 42 ").unwrap(), 42);
        assert!(matches!(parse("forty"), Err(Error::Parse(_))));
    }
}
