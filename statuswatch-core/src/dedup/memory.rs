//! Volatile in-memory dedup backend.

use super::DedupStore;
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Bounded in-memory set of seen ids.
///
/// Insertion order is tracked so that crossing the capacity bound evicts the
/// oldest-inserted half in one batch. Eviction is deliberately coarse; the
/// bound exists to cap memory, not to implement LRU.
pub struct MemoryDedupStore {
    capacity: usize,
    inner: Mutex<Inner>,
}

struct Inner {
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl MemoryDedupStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                seen: HashSet::new(),
                order: VecDeque::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock still holds a consistent set; dedup state is
        // always safe to reuse.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().seen.len()
    }
}

#[async_trait]
impl DedupStore for MemoryDedupStore {
    async fn has(&self, id: &str) -> bool {
        self.lock().seen.contains(id)
    }

    async fn mark(&self, id: &str) {
        let mut inner = self.lock();
        if !inner.seen.insert(id.to_owned()) {
            return;
        }
        inner.order.push_back(id.to_owned());
        if inner.seen.len() > self.capacity {
            let Inner { seen, order } = &mut *inner;
            let evict = order.len() / 2;
            for old in order.drain(..evict) {
                seen.remove(&old);
            }
            warn!(evicted = evict, "Dedup store over capacity, dropped oldest entries");
        }
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}
