//! Utility modules for ticketpool
//!
//! Configuration persistence, logging setup and cooperative cancellation.

pub mod cancel;
pub mod config;
pub mod logging;
