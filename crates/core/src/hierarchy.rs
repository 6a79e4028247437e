//! Wires L1/L2/L3 caches to cores and owns the memory and coherence bus for
//! one simulation run.

use std::sync::Arc;

use tracing::debug;

use crate::cache::Cache;
use crate::coherence::CoherenceBus;
use crate::common::CacheError;
use crate::config::Config;
use crate::memory::Memory;
use crate::stats::{CacheStats, Level};
use crate::trace::MemoryRequest;

/// The fully wired cache hierarchy for one run: `threads` private L1s behind
/// `ceil(threads/2)` shared L2s behind `ceil(threads/4)` shared L3s, all
/// backed by one [`Memory`].
pub struct Hierarchy {
    l1s: Vec<Arc<Cache>>,
    l2s: Vec<Arc<Cache>>,
    l3s: Vec<Arc<Cache>>,
    memory: Arc<Memory>,
    stats: Arc<CacheStats>,
}

impl Hierarchy {
    /// Builds the hierarchy for `config.threads` cores.
    ///
    /// `config.threads` must be `1` or even and in `[1, 16]`; this is
    /// enforced by the CLI before `build` is ever called, so a violation
    /// here is an internal invariant rather than a user-facing error.
    pub fn build(config: &Config) -> Result<Self, CacheError> {
        let n = config.threads as usize;
        if n == 0 || n > 16 || (n > 1 && n % 2 != 0) {
            return Err(CacheError::InternalInvariant(format!(
                "hierarchy requested for invalid core count {n}"
            )));
        }

        let stats = Arc::new(CacheStats::default());
        let memory = Arc::new(Memory::new(config.sizes.memory_bytes));
        let bus = CoherenceBus::new();

        let l3_count = (n + 3) / 4;
        let l2_count = (n + 1) / 2;
        let assoc = config.associativity.ways_value();

        let mut l3s = Vec::with_capacity(l3_count);
        for _ in 0..l3_count {
            l3s.push(Cache::new(
                Level::L3,
                config.sizes.l3_bytes,
                assoc,
                config.write_policy,
                config.replacement,
                None,
                memory.clone(),
                None,
                stats.clone(),
            )?);
        }

        let mut l2s = Vec::with_capacity(l2_count);
        for j in 0..l2_count {
            l2s.push(Cache::new(
                Level::L2,
                config.sizes.l2_bytes,
                assoc,
                config.write_policy,
                config.replacement,
                Some(l3s[j / 2].clone()),
                memory.clone(),
                None,
                stats.clone(),
            )?);
        }

        let mut l1s = Vec::with_capacity(n);
        for k in 0..n {
            let l1 = Cache::new(
                Level::L1,
                config.sizes.l1_bytes,
                assoc,
                config.write_policy,
                config.replacement,
                Some(l2s[k / 2].clone()),
                memory.clone(),
                Some(bus.clone()),
                stats.clone(),
            )?;
            bus.register(l1.clone());
            l1s.push(l1);
        }

        debug!(cores = n, l2_count, l3_count, "hierarchy constructed");

        Ok(Hierarchy { l1s, l2s, l3s, memory, stats })
    }

    /// The L1 owned by core `idx`.
    pub fn core(&self, idx: usize) -> &Arc<Cache> {
        &self.l1s[idx]
    }

    /// Number of cores (L1 caches) in this hierarchy.
    pub fn core_count(&self) -> usize {
        self.l1s.len()
    }

    /// The statistics shared by every level and core thread.
    pub fn stats(&self) -> &Arc<CacheStats> {
        &self.stats
    }

    /// The backing memory.
    pub fn memory(&self) -> &Arc<Memory> {
        &self.memory
    }

    /// Drives `request` through the L1 owned by `core_idx`.
    pub fn apply(&self, core_idx: usize, request: &MemoryRequest) -> Result<(), CacheError> {
        let l1 = self.core(core_idx);
        match request {
            MemoryRequest::Read { address } => {
                l1.read(*address)?;
            }
            MemoryRequest::Write { address, value } => {
                l1.write(*address, *value)?;
            }
        }
        Ok(())
    }

    /// Flushes every L1, then every L2, then every L3, synchronously and
    /// top-down, as required before the run reports its statistics.
    pub fn flush_all(&self) -> Result<(), CacheError> {
        for l1 in &self.l1s {
            l1.flush()?;
        }
        for l2 in &self.l2s {
            l2.flush()?;
        }
        for l3 in &self.l3s {
            l3.flush()?;
        }
        Ok(())
    }
}
