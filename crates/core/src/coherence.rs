//! The central MESI coordinator shared by every L1 cache.
//!
//! All four bus operations run under one global mutex so that sibling L1s
//! observe a single, consistent ordering of invalidations and downgrades —
//! the linearisation point the concurrency model relies on.

use std::sync::{Arc, Mutex, RwLock};

use tracing::trace;

use crate::cache::Cache;
use crate::common::CacheError;

/// Broadcasts MESI transitions across sibling L1 caches.
///
/// The bus holds `Arc` handles rather than raw or weak pointers so that
/// sibling lookups never race with an L1 being torn down mid-simulation; all
/// L1s and the bus itself are owned for the lifetime of one run by the
/// `Hierarchy`, so the cycle this creates is broken by simply dropping the
/// hierarchy at the end of `main`.
pub struct CoherenceBus {
    lock: Mutex<()>,
    l1s: RwLock<Vec<Arc<Cache>>>,
}

impl CoherenceBus {
    /// Builds an empty bus with no registered L1s.
    pub fn new() -> Arc<Self> {
        Arc::new(CoherenceBus {
            lock: Mutex::new(()),
            l1s: RwLock::new(Vec::new()),
        })
    }

    /// Registers an L1 cache with the bus. Called once per core during
    /// hierarchy construction, after the cache itself has been built with a
    /// handle back to this bus.
    pub fn register(&self, l1: Arc<Cache>) {
        self.l1s.write().unwrap_or_else(|e| e.into_inner()).push(l1);
    }

    fn others(&self, requester: &Arc<Cache>) -> Vec<Arc<Cache>> {
        let guard = self.l1s.read().unwrap_or_else(|e| e.into_inner());
        guard.iter().filter(|c| !Arc::ptr_eq(c, requester)).cloned().collect()
    }

    /// For every other L1, invalidates its line for `addr` if it holds any
    /// non-`Invalid` copy (`Shared`, `Exclusive`, or `Modified`).
    pub fn invalidate_others(&self, addr: u32, requester: &Arc<Cache>) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        for sibling in self.others(requester) {
            sibling.invalidate_owned_copy(addr);
        }
        trace!(addr, "invalidated sibling L1s");
    }

    /// For every other L1, downgrades its line for `addr` from `Modified`
    /// or `Exclusive` to `Shared` — a peer has just taken on a copy of its
    /// own, so sole ownership can no longer stand.
    pub fn downgrade_owned_to_shared(&self, addr: u32, requester: &Arc<Cache>) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        for sibling in self.others(requester) {
            sibling.downgrade_owned_to_shared(addr);
        }
        trace!(addr, "downgraded any owning sibling to shared");
    }

    /// True if any other L1 currently holds a non-`Invalid` line for `addr`.
    /// Used on a read miss to decide whether the newly filled line should
    /// start `Exclusive` (no other holder) or `Shared` (a peer already has
    /// it).
    pub fn any_other_holder(&self, addr: u32, requester: &Arc<Cache>) -> bool {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.others(requester).iter().any(|sibling| sibling.holds_valid_copy(addr))
    }

    /// For every other L1 holding `addr` in `Modified`, flushes that
    /// cache's dirty lines and invalidates the holder's line.
    pub fn write_back_before_invalidation(&self, addr: u32, requester: &Arc<Cache>) -> Result<(), CacheError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        for sibling in self.others(requester) {
            sibling.writeback_and_invalidate_if_modified(addr)?;
        }
        trace!(addr, "wrote back any modified sibling before invalidation");
        Ok(())
    }
}
