//! Hit/miss/eviction/traffic counters shared across cache levels and core
//! threads, and the end-of-run report.
//!
//! Every counter is an independent [`AtomicU64`] rather than fields guarded
//! by one big mutex: cache levels and core worker threads increment these
//! concurrently on the hot path, and there is never a need to read more than
//! one counter atomically with another, so a lock would only add contention
//! without buying any consistency the report actually needs.

use std::sync::atomic::{AtomicU64, Ordering};

/// Aggregated statistics for one simulation run.
#[derive(Default)]
pub struct CacheStats {
    /// Total requests seen at L1 (reads + writes).
    pub total_ops: AtomicU64,
    /// Read requests seen at L1.
    pub reads: AtomicU64,
    /// Write requests seen at L1.
    pub writes: AtomicU64,

    pub l1_hits: AtomicU64,
    pub l1_misses: AtomicU64,
    pub l2_hits: AtomicU64,
    pub l2_misses: AtomicU64,
    pub l3_hits: AtomicU64,
    pub l3_misses: AtomicU64,

    /// Allocation attempts across all levels (§4.6: an allocation that may
    /// or may not require evicting a valid line).
    pub evictions: AtomicU64,
    /// Evictions of a dirty, write-back line that required a writeback.
    pub dirty_evictions: AtomicU64,
    /// Individual word transfers to/from main memory.
    pub memory_accesses: AtomicU64,
}

/// The cache level a hit/miss counter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    L1,
    L2,
    L3,
}

impl CacheStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request(&self, access: crate::common::AccessType) {
        Self::bump(&self.total_ops);
        match access {
            crate::common::AccessType::Read => Self::bump(&self.reads),
            crate::common::AccessType::Write => Self::bump(&self.writes),
        }
    }

    pub fn record_hit(&self, level: Level) {
        match level {
            Level::L1 => Self::bump(&self.l1_hits),
            Level::L2 => Self::bump(&self.l2_hits),
            Level::L3 => Self::bump(&self.l3_hits),
        }
    }

    pub fn record_miss(&self, level: Level) {
        match level {
            Level::L1 => Self::bump(&self.l1_misses),
            Level::L2 => Self::bump(&self.l2_misses),
            Level::L3 => Self::bump(&self.l3_misses),
        }
    }

    pub fn record_eviction_attempt(&self) {
        Self::bump(&self.evictions);
    }

    pub fn record_dirty_eviction(&self) {
        Self::bump(&self.dirty_evictions);
    }

    pub fn record_memory_access(&self) {
        Self::bump(&self.memory_accesses);
    }

    fn load(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    /// Renders the human-readable end-of-run summary, including the
    /// wall-clock duration of the replay phase.
    pub fn report(&self, elapsed: std::time::Duration) -> String {
        let print_level = |name: &str, hits: u64, misses: u64| -> String {
            let total = hits + misses;
            let rate = if total > 0 {
                100.0 * hits as f64 / total as f64
            } else {
                0.0
            };
            format!("  {name:<3} accesses: {total:<10} hits: {hits:<10} misses: {misses:<10} hit_rate: {rate:.2}%\n")
        };

        let mut out = String::new();
        out.push_str("==========================================================\n");
        out.push_str("CACHE HIERARCHY SIMULATION STATISTICS\n");
        out.push_str("==========================================================\n");
        out.push_str(&format!("replay_duration          {:.4} s\n", elapsed.as_secs_f64()));
        out.push_str(&format!("total_operations         {}\n", Self::load(&self.total_ops)));
        out.push_str(&format!("reads                    {}\n", Self::load(&self.reads)));
        out.push_str(&format!("writes                   {}\n", Self::load(&self.writes)));
        out.push_str("----------------------------------------------------------\n");
        out.push_str(&print_level("L1", Self::load(&self.l1_hits), Self::load(&self.l1_misses)));
        out.push_str(&print_level("L2", Self::load(&self.l2_hits), Self::load(&self.l2_misses)));
        out.push_str(&print_level("L3", Self::load(&self.l3_hits), Self::load(&self.l3_misses)));
        out.push_str("----------------------------------------------------------\n");
        out.push_str(&format!("eviction_attempts        {}\n", Self::load(&self.evictions)));
        out.push_str(&format!("dirty_evictions          {}\n", Self::load(&self.dirty_evictions)));
        out.push_str(&format!("memory_accesses          {}\n", Self::load(&self.memory_accesses)));
        out.push_str("==========================================================\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let stats = CacheStats::default();
        assert_eq!(CacheStats::load(&stats.total_ops), 0);
    }

    #[test]
    fn record_request_splits_reads_and_writes() {
        let stats = CacheStats::default();
        stats.record_request(crate::common::AccessType::Read);
        stats.record_request(crate::common::AccessType::Write);
        assert_eq!(CacheStats::load(&stats.total_ops), 2);
        assert_eq!(CacheStats::load(&stats.reads), 1);
        assert_eq!(CacheStats::load(&stats.writes), 1);
    }

    #[test]
    fn report_includes_every_level() {
        let stats = CacheStats::default();
        stats.record_hit(Level::L1);
        stats.record_miss(Level::L2);
        let report = stats.report(std::time::Duration::from_millis(5));
        assert!(report.contains("L1"));
        assert!(report.contains("L2"));
        assert!(report.contains("L3"));
    }
}
