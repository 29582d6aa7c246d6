//! Shared ticket pool
//!
//! The pool is the only synchronization point between the vendor and the
//! customers. A single coarse lock guards every counter and a single condition
//! variable carries broadcast wake-ups, so each waiter re-checks its own
//! condition after every state change.
//!
//! Admission policy: the vendor may only introduce a new batch once the
//! previous one has been fully depleted, and the cumulative number of released
//! tickets never exceeds the lifetime capacity.

use crate::utils::cancel::CancellationToken;
use crate::{Error, Result};
use log::{debug, info, warn};
use parking_lot::{Condvar, Mutex};

/// Result of a release attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Tickets were added to the pool (possibly fewer than requested)
    Released(u32),
    /// Selling has stopped; nothing was added
    SoldOut,
    /// The caller was cancelled while waiting for the previous batch
    Interrupted,
}

impl ReleaseOutcome {
    /// Whether tickets were added
    pub fn is_success(&self) -> bool {
        matches!(self, ReleaseOutcome::Released(_))
    }

    /// Number of tickets added by this release
    pub fn released(&self) -> u32 {
        match self {
            ReleaseOutcome::Released(count) => *count,
            _ => 0,
        }
    }
}

/// Result of a retrieval attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrieveOutcome {
    /// Tickets were taken (possibly fewer than requested)
    Retrieved(u32),
    /// Nothing was available at the time of the call
    Empty,
}

impl RetrieveOutcome {
    /// Whether any ticket was taken
    pub fn is_success(&self) -> bool {
        matches!(self, RetrieveOutcome::Retrieved(_))
    }

    /// Number of tickets taken by this retrieval
    pub fn retrieved(&self) -> u32 {
        match self {
            RetrieveOutcome::Retrieved(count) => *count,
            RetrieveOutcome::Empty => 0,
        }
    }
}

/// Coarse pool state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Selling, with an undepleted batch outstanding
    Waiting,
    /// Selling, nothing outstanding; the vendor may release
    Idle,
    /// Selling has stopped for good. Leftover tickets may still be retrieved.
    Stopped,
}

/// Consistent view of the pool, taken under the pool lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub available: u32,
    pub total_released: u32,
    pub total_retrieved: u32,
    pub max_capacity: u32,
    pub selling: bool,
    /// Successful releases
    pub batches: usize,
    /// Retrievals that found the pool empty
    pub failed_retrievals: usize,
    /// Release calls that had to block on an undepleted batch
    pub vendor_waits: usize,
}

impl PoolSnapshot {
    /// Tickets that may still be released
    pub fn remaining_capacity(&self) -> u32 {
        self.max_capacity - self.total_released
    }

    /// Coarse state at the time of the snapshot
    pub fn state(&self) -> PoolState {
        if !self.selling {
            PoolState::Stopped
        } else if self.available > 0 {
            PoolState::Waiting
        } else {
            PoolState::Idle
        }
    }

    /// Stopped and fully sold
    pub fn is_drained(&self) -> bool {
        !self.selling && self.available == 0
    }
}

struct Inner {
    available: u32,
    total_released: u32,
    total_retrieved: u32,
    selling: bool,
    batches: usize,
    failed_retrievals: usize,
    vendor_waits: usize,
}

/// Bounded ticket pool shared by one vendor and many customers
pub struct TicketPool {
    inner: Mutex<Inner>,
    changed: Condvar,
    max_capacity: u32,
}

impl TicketPool {
    /// Create a pool that will release at most `max_capacity` tickets over its lifetime
    pub fn new(max_capacity: u32) -> Result<Self> {
        if max_capacity == 0 {
            return Err(Error::InvalidArgument(
                "maximum ticket capacity must be positive".to_string(),
            ));
        }

        Ok(Self {
            inner: Mutex::new(Inner {
                available: 0,
                total_released: 0,
                total_retrieved: 0,
                selling: true,
                batches: 0,
                failed_retrievals: 0,
                vendor_waits: 0,
            }),
            changed: Condvar::new(),
            max_capacity,
        })
    }

    /// Release a batch of tickets, waiting for the previous batch to sell out first.
    ///
    /// Requests larger than the remaining capacity are truncated to it.
    pub fn release(&self, num_tickets: u32) -> Result<ReleaseOutcome> {
        self.release_inner(num_tickets, None)
    }

    /// Like [`release`](Self::release), but gives up with
    /// [`ReleaseOutcome::Interrupted`] if `token` is cancelled while waiting.
    ///
    /// Whoever cancels the token must call [`interrupt`](Self::interrupt)
    /// afterwards so that a blocked caller re-checks it.
    pub fn release_interruptible(
        &self,
        num_tickets: u32,
        token: &CancellationToken,
    ) -> Result<ReleaseOutcome> {
        self.release_inner(num_tickets, Some(token))
    }

    fn release_inner(
        &self,
        num_tickets: u32,
        token: Option<&CancellationToken>,
    ) -> Result<ReleaseOutcome> {
        if num_tickets == 0 {
            return Err(Error::InvalidArgument(
                "cannot release zero tickets".to_string(),
            ));
        }

        let mut inner = self.inner.lock();

        if inner.total_released >= self.max_capacity {
            inner.selling = false;
            info!("Maximum ticket capacity already reached, cannot release more tickets");
            return Ok(ReleaseOutcome::SoldOut);
        }

        if inner.available > 0 && inner.selling {
            inner.vendor_waits += 1;
        }

        while inner.available > 0 && inner.selling {
            if token.map_or(false, |token| token.is_cancelled()) {
                warn!("Vendor interrupted while waiting to release tickets");
                return Ok(ReleaseOutcome::Interrupted);
            }
            debug!(
                "Vendor waiting for customers to buy {} outstanding tickets",
                inner.available
            );
            self.changed.wait(&mut inner);
        }

        if !inner.selling {
            info!("Vendor has stopped selling tickets");
            return Ok(ReleaseOutcome::SoldOut);
        }

        let to_release = num_tickets.min(self.max_capacity - inner.total_released);
        inner.available += to_release;
        inner.total_released += to_release;
        inner.batches += 1;
        info!(
            "Vendor released {} tickets, available: {}, released so far: {} of {}",
            to_release, inner.available, inner.total_released, self.max_capacity
        );

        if inner.total_released == self.max_capacity {
            inner.selling = false;
            info!("Maximum ticket capacity reached, vendor stops selling");
        }

        self.changed.notify_all();
        Ok(ReleaseOutcome::Released(to_release))
    }

    /// Take up to `num_tickets` tickets. Never blocks on the batch condition.
    pub fn retrieve(&self, num_tickets: u32) -> Result<RetrieveOutcome> {
        if num_tickets == 0 {
            return Err(Error::InvalidArgument(
                "cannot retrieve zero tickets".to_string(),
            ));
        }

        let mut inner = self.inner.lock();

        if inner.available == 0 {
            inner.failed_retrievals += 1;
            debug!("No tickets available for purchase");
            return Ok(RetrieveOutcome::Empty);
        }

        // Partial fulfilment: take whatever is left.
        let taken = num_tickets.min(inner.available);
        inner.available -= taken;
        inner.total_retrieved += taken;
        info!(
            "Customer bought {} tickets, available: {}",
            taken, inner.available
        );

        if inner.available == 0 && inner.selling {
            self.changed.notify_all();
        }

        Ok(RetrieveOutcome::Retrieved(taken))
    }

    /// Wake every thread blocked in a release so it re-checks its cancellation token
    pub fn interrupt(&self) {
        let _inner = self.inner.lock();
        self.changed.notify_all();
    }

    pub fn is_selling(&self) -> bool {
        self.inner.lock().selling
    }

    pub fn available_tickets(&self) -> u32 {
        self.inner.lock().available
    }

    pub fn total_released(&self) -> u32 {
        self.inner.lock().total_released
    }

    pub fn remaining_capacity(&self) -> u32 {
        self.max_capacity - self.inner.lock().total_released
    }

    pub fn max_capacity(&self) -> u32 {
        self.max_capacity
    }

    /// Current coarse state
    pub fn state(&self) -> PoolState {
        self.snapshot().state()
    }

    /// Read every counter under one lock acquisition
    pub fn snapshot(&self) -> PoolSnapshot {
        let inner = self.inner.lock();
        PoolSnapshot {
            available: inner.available,
            total_released: inner.total_released,
            total_retrieved: inner.total_retrieved,
            max_capacity: self.max_capacity,
            selling: inner.selling,
            batches: inner.batches,
            failed_retrievals: inner.failed_retrievals,
            vendor_waits: inner.vendor_waits,
        }
    }
}

impl std::fmt::Debug for TicketPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketPool")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}
