//! Worker pool: caps how many jobs scan at the same time.
//!
//! Backed by a semaphore whose permit count follows the thread limit. Growing
//! adds permits; shrinking forgets idle permits and records the rest as debt,
//! which running jobs pay back by forgetting their permit when they finish.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, thiserror::Error)]
#[error("worker pool is closed")]
pub struct PoolClosed;

#[derive(Debug)]
struct Sizing {
    capacity: usize,
    /// Permits still to be retired after a shrink.
    debt: usize,
}

#[derive(Debug)]
struct Shared {
    sem: Arc<Semaphore>,
    sizing: Mutex<Sizing>,
    in_use: AtomicUsize,
}

#[derive(Debug, Clone)]
pub struct WorkerPool {
    shared: Arc<Shared>,
}

/// One occupied slot. Dropping it frees the slot (or retires it after a shrink).
#[derive(Debug)]
pub struct PoolSlot {
    permit: Option<OwnedSemaphorePermit>,
    shared: Arc<Shared>,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            shared: Arc::new(Shared {
                sem: Arc::new(Semaphore::new(capacity)),
                sizing: Mutex::new(Sizing { capacity, debt: 0 }),
                in_use: AtomicUsize::new(0),
            }),
        }
    }

    /// Wait for a free slot. Fails once the pool is closed.
    pub async fn acquire(&self) -> Result<PoolSlot, PoolClosed> {
        let permit = Arc::clone(&self.shared.sem)
            .acquire_owned()
            .await
            .map_err(|_| PoolClosed)?;
        self.shared.in_use.fetch_add(1, Ordering::SeqCst);
        Ok(PoolSlot {
            permit: Some(permit),
            shared: Arc::clone(&self.shared),
        })
    }

    /// Change the number of slots. Running jobs keep their slot; a shrink takes
    /// effect as they finish.
    pub fn resize(&self, capacity: usize) {
        let capacity = capacity.max(1);
        let mut sizing = self.shared.sizing.lock().unwrap_or_else(PoisonError::into_inner);
        if capacity > sizing.capacity {
            let mut grow = capacity - sizing.capacity;
            let repaid = grow.min(sizing.debt);
            sizing.debt -= repaid;
            grow -= repaid;
            if grow > 0 {
                self.shared.sem.add_permits(grow);
            }
        } else if capacity < sizing.capacity {
            let shrink = sizing.capacity - capacity;
            let retired = self.shared.sem.forget_permits(shrink);
            sizing.debt += shrink - retired;
        }
        tracing::debug!(from = sizing.capacity, to = capacity, debt = sizing.debt, "worker pool resized");
        sizing.capacity = capacity;
    }

    pub fn capacity(&self) -> usize {
        self.shared
            .sizing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .capacity
    }

    /// Slots currently held by running jobs.
    pub fn in_use(&self) -> usize {
        self.shared.in_use.load(Ordering::SeqCst)
    }

    /// Refuse new acquisitions and wake every waiter with `PoolClosed`.
    pub fn close(&self) {
        self.shared.sem.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.sem.is_closed()
    }
}

impl Drop for PoolSlot {
    fn drop(&mut self) {
        let permit = self.permit.take();
        // Release under the sizing lock so a concurrent resize sees a consistent count.
        let mut sizing = self.shared.sizing.lock().unwrap_or_else(PoisonError::into_inner);
        self.shared.in_use.fetch_sub(1, Ordering::SeqCst);
        match permit {
            Some(p) if sizing.debt > 0 => {
                sizing.debt -= 1;
                p.forget();
            }
            other => drop(other),
        }
    }
}
