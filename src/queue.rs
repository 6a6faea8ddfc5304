use anyhow::{bail, Result};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::Endpoint;

/// Fixed-capacity FIFO of endpoints waiting for a worker.
///
/// Nothing here waits: `try_dequeue` returns `None` straight away on an empty
/// queue so callers can go back to checking the shutdown token.
#[derive(Debug)]
pub struct TargetQueue {
    capacity: usize,
    items: Mutex<VecDeque<Endpoint>>,
}

impl TargetQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn enqueue(&self, endpoint: Endpoint) -> Result<()> {
        let mut items = self.lock();
        if items.len() >= self.capacity {
            bail!("target queue full (capacity {}), rejecting {}", self.capacity, endpoint);
        }
        items.push_back(endpoint);
        Ok(())
    }

    /// Remove and return the next endpoint. Each endpoint is handed out once.
    pub fn try_dequeue(&self) -> Option<Endpoint> {
        self.lock().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    // Poisoning is ignored: every critical section is a single deque call.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Endpoint>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
