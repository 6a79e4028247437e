//! One level of a set-associative cache: decode, lookup, allocate, evict,
//! forward, and (for L1 only) participate in the MESI coherence bus.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace};

use crate::common::{AccessType, CacheError, DecodedAddress, Geometry, MesiState};
use crate::config::{ReplacementPolicy, WritePolicy, BLOCK_BYTES};
use crate::coherence::CoherenceBus;
use crate::memory::Memory;
use crate::stats::{CacheStats, Level};

#[derive(Debug, Clone)]
struct CacheLine {
    tag: u32,
    data: Vec<i32>,
    valid: bool,
    dirty: bool,
    lru_age: u32,
    lfu_count: u32,
    mesi: MesiState,
}

impl CacheLine {
    fn empty(block_words: usize) -> Self {
        CacheLine {
            tag: 0,
            data: vec![0; block_words],
            valid: false,
            dirty: false,
            lru_age: 0,
            lfu_count: 0,
            mesi: MesiState::Invalid,
        }
    }
}

struct CacheState {
    sets: Vec<Vec<CacheLine>>,
    fifo_ptr: Vec<usize>,
}

/// One level of the memory hierarchy. Every level holds its own handle to
/// the backing [`Memory`] — block fills, dirty writebacks, and flushes
/// always go straight to `memory`, never through `next`. `next` additionally
/// chains to the level below (`None` at the bottommost level) purely for
/// bookkeeping: a miss or a write-through store also issues one forwarded
/// `read`/`write` down that chain so lower levels update their own hit/miss
/// statistics, matching the single-propagation model of forwarding. L1s
/// additionally hold a handle to the [`CoherenceBus`]; L2/L3 do not
/// participate in coherence.
pub struct Cache {
    level: Level,
    geometry: Geometry,
    write_policy: WritePolicy,
    replacement: ReplacementPolicy,
    state: Mutex<CacheState>,
    next: Option<Arc<Cache>>,
    memory: Arc<Memory>,
    bus: Option<Arc<CoherenceBus>>,
    stats: Arc<CacheStats>,
}

impl Cache {
    /// Builds one cache level. `next` is `Some` for every level but the
    /// bottommost one; `bus` is `Some` only for L1 levels.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        level: Level,
        size_bytes: usize,
        associativity: u32,
        write_policy: WritePolicy,
        replacement: ReplacementPolicy,
        next: Option<Arc<Cache>>,
        memory: Arc<Memory>,
        bus: Option<Arc<CoherenceBus>>,
        stats: Arc<CacheStats>,
    ) -> Result<Arc<Self>, CacheError> {
        let geometry = Geometry::new(size_bytes, associativity, BLOCK_BYTES)?;
        let sets = (0..geometry.num_sets)
            .map(|_| (0..geometry.ways).map(|_| CacheLine::empty(geometry.block_words)).collect())
            .collect();
        let fifo_ptr = vec![0usize; geometry.num_sets];

        debug!(?level, size_bytes, associativity, num_sets = geometry.num_sets, "cache level constructed");

        Ok(Arc::new(Cache {
            level,
            geometry,
            write_policy,
            replacement,
            state: Mutex::new(CacheState { sets, fifo_ptr }),
            next,
            memory,
            bus,
            stats,
        }))
    }

    /// This level (L1, L2, or L3).
    pub fn level(&self) -> Level {
        self.level
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reads the word at `addr`, filling from lower levels on a miss.
    pub fn read(self: &Arc<Self>, addr: u32) -> Result<i32, CacheError> {
        if addr % 4 != 0 {
            return Err(CacheError::Unaligned(addr));
        }
        if self.level == Level::L1 {
            self.stats.record_request(AccessType::Read);
        }
        let decoded = self.geometry.decode(addr);
        let mut state = self.lock_state();

        if let Some(way) = self.find(&mut state, decoded) {
            self.stats.record_hit(self.level);
            if let Some(bus) = self.bus.as_ref() {
                bus.downgrade_owned_to_shared(addr, self);
                state.sets[decoded.index][way].mesi = MesiState::Shared;
            }
            trace!(addr, level = ?self.level, "read hit");
            return Ok(state.sets[decoded.index][way].data[decoded.offset / 4]);
        }

        self.stats.record_miss(self.level);
        trace!(addr, level = ?self.level, "read miss");
        if let Some(bus) = self.bus.as_ref() {
            // A sibling's Modified copy is the only up-to-date copy of this
            // block; flush it to the backing levels before we fetch.
            bus.write_back_before_invalidation(addr, self)?;
        }
        // Single bookkeeping-only propagation per §4.8: lower levels update
        // their own hit/miss stats, but the returned word is discarded — the
        // actual block fill below reads straight from `memory`.
        self.forward(addr, false, 0)?;
        let way = self.allocate(&mut state, decoded)?;
        self.fill_block(&mut state, decoded, way)?;
        if let Some(bus) = self.bus.as_ref() {
            if bus.any_other_holder(addr, self) {
                bus.downgrade_owned_to_shared(addr, self);
                state.sets[decoded.index][way].mesi = MesiState::Shared;
            } else {
                state.sets[decoded.index][way].mesi = MesiState::Exclusive;
            }
        }
        Ok(state.sets[decoded.index][way].data[decoded.offset / 4])
    }

    /// Writes `value` at `addr`, filling from lower levels on a miss.
    pub fn write(self: &Arc<Self>, addr: u32, value: i32) -> Result<(), CacheError> {
        if addr % 4 != 0 {
            return Err(CacheError::Unaligned(addr));
        }
        if self.level == Level::L1 {
            self.stats.record_request(AccessType::Write);
        }
        let decoded = self.geometry.decode(addr);
        let mut state = self.lock_state();

        let (way, was_hit) = if let Some(way) = self.find(&mut state, decoded) {
            self.stats.record_hit(self.level);
            trace!(addr, level = ?self.level, "write hit");
            (way, true)
        } else {
            self.stats.record_miss(self.level);
            trace!(addr, level = ?self.level, "write miss");
            if let Some(bus) = self.bus.as_ref() {
                bus.write_back_before_invalidation(addr, self)?;
            }
            let way = self.allocate(&mut state, decoded)?;
            self.fill_block(&mut state, decoded, way)?;
            (way, false)
        };

        state.sets[decoded.index][way].data[decoded.offset / 4] = value;

        if let Some(bus) = self.bus.as_ref() {
            // On a hit, a sibling's Modified copy was already flushed above
            // when this was a miss; on a hit it still needs flushing here.
            if was_hit {
                bus.write_back_before_invalidation(addr, self)?;
            }
            bus.invalidate_others(addr, self);
            state.sets[decoded.index][way].mesi = MesiState::Modified;
        }

        match self.write_policy {
            WritePolicy::WriteBack => state.sets[decoded.index][way].dirty = true,
            WritePolicy::WriteThrough => {
                self.memory.write(addr, value)?;
                self.stats.record_memory_access();
                self.forward(addr, true, value)?;
            }
        }

        Ok(())
    }

    /// Scans the set for a tag match. Applies the replacement policy's
    /// per-access bookkeeping (LRU touch, LFU increment) on a hit; has no
    /// other side effects.
    fn find(&self, state: &mut CacheState, decoded: DecodedAddress) -> Option<usize> {
        let coherent = self.bus.is_some();
        let set = &mut state.sets[decoded.index];
        let way = set
            .iter()
            .position(|line| line.valid && line.tag == decoded.tag && (!coherent || line.mesi != MesiState::Invalid))?;
        match self.replacement {
            ReplacementPolicy::Lru => Self::lru_touch(set, way, 0),
            ReplacementPolicy::Lfu => set[way].lfu_count = set[way].lfu_count.saturating_add(1),
            ReplacementPolicy::Fifo => {}
        }
        Some(way)
    }

    fn lru_touch(set: &mut [CacheLine], touched: usize, sentinel: u32) {
        for (i, line) in set.iter_mut().enumerate() {
            if i == touched {
                line.lru_age = sentinel;
            } else if line.valid {
                line.lru_age = line.lru_age.saturating_add(1);
            }
        }
    }

    /// Claims a slot for a new tag, evicting a victim if the set is full.
    fn allocate(&self, state: &mut CacheState, decoded: DecodedAddress) -> Result<usize, CacheError> {
        self.stats.record_eviction_attempt();
        let set_idx = decoded.index;

        let free_way = state.sets[set_idx].iter().position(|line| !line.valid);
        let way = match free_way {
            Some(w) => w,
            None => self.evict(state, set_idx)?,
        };

        let block_words = self.geometry.block_words;
        let set = &mut state.sets[set_idx];
        set[way] = CacheLine {
            tag: decoded.tag,
            data: vec![0; block_words],
            valid: true,
            dirty: false,
            lru_age: 1,
            lfu_count: 1,
            mesi: MesiState::Invalid,
        };
        if self.replacement == ReplacementPolicy::Lru {
            Self::lru_touch(set, way, 1);
        }
        Ok(way)
    }

    /// Chooses and frees a victim in `set_idx`, writing it back first if it
    /// is dirty under a write-back policy.
    fn evict(&self, state: &mut CacheState, set_idx: usize) -> Result<usize, CacheError> {
        let victim = match self.replacement {
            ReplacementPolicy::Fifo => {
                let ptr = state.fifo_ptr[set_idx];
                state.fifo_ptr[set_idx] = (ptr + 1) % self.geometry.ways;
                ptr
            }
            ReplacementPolicy::Lru => state.sets[set_idx]
                .iter()
                .enumerate()
                .filter(|(_, line)| line.valid)
                .max_by_key(|(i, line)| (line.lru_age, std::cmp::Reverse(*i)))
                .map(|(i, _)| i)
                .ok_or_else(|| CacheError::InternalInvariant("LRU eviction found no valid line".into()))?,
            ReplacementPolicy::Lfu => state.sets[set_idx]
                .iter()
                .enumerate()
                .filter(|(_, line)| line.valid)
                .min_by_key(|(i, line)| (line.lfu_count, *i))
                .map(|(i, _)| i)
                .ok_or_else(|| CacheError::InternalInvariant("LFU eviction found no valid line".into()))?,
        };

        let (needs_writeback, block_addr, words) = {
            let line = &state.sets[set_idx][victim];
            let needs_writeback = line.valid && line.dirty && self.write_policy == WritePolicy::WriteBack;
            (needs_writeback, self.geometry.block_address(line.tag, set_idx), line.data.clone())
        };

        if needs_writeback {
            self.stats.record_dirty_eviction();
            for (i, word) in words.iter().enumerate() {
                self.memory.write(block_addr + (i as u32) * 4, *word)?;
                self.stats.record_memory_access();
            }
        }

        let line = &mut state.sets[set_idx][victim];
        line.valid = false;
        line.dirty = false;
        Ok(victim)
    }

    /// Fetches a freshly-allocated line's block contents, one word at a
    /// time, straight from `memory` — never through `next` (see the
    /// module-level doc comment on [`Cache`]).
    fn fill_block(&self, state: &mut CacheState, decoded: DecodedAddress, way: usize) -> Result<(), CacheError> {
        let block_addr = self.geometry.block_address(decoded.tag, decoded.index);
        for i in 0..self.geometry.block_words {
            let word = self.memory.read(block_addr + (i as u32) * 4)?;
            self.stats.record_memory_access();
            state.sets[decoded.index][way].data[i] = word;
        }
        Ok(())
    }

    /// One bookkeeping-only propagated access per §4.8: recurses into
    /// `next` if present (so a lower level updates its own hit/miss
    /// counters and, on its own miss, allocates a line there too), or
    /// touches `memory` directly and counts one `memory_access` at the
    /// bottommost level. The result, if any, is discarded by every caller —
    /// block fills and writebacks always go straight to `self.memory`
    /// instead (see `fill_block`, `evict`, `flush`).
    fn forward(&self, addr: u32, is_write: bool, value: i32) -> Result<(), CacheError> {
        match self.next.as_ref() {
            Some(next) => {
                if is_write {
                    next.write(addr, value)?;
                } else {
                    next.read(addr)?;
                }
            }
            None => {
                if is_write {
                    self.memory.write(addr, value)?;
                } else {
                    self.memory.read(addr)?;
                }
                self.stats.record_memory_access();
            }
        }
        Ok(())
    }

    /// Writes back every valid, dirty line straight to `memory`.
    /// Idempotent: a second call finds nothing dirty left to do.
    pub fn flush(&self) -> Result<(), CacheError> {
        let mut state = self.lock_state();
        for set_idx in 0..self.geometry.num_sets {
            for way in 0..self.geometry.ways {
                let (dirty, block_addr, words) = {
                    let line = &state.sets[set_idx][way];
                    if !(line.valid && line.dirty) {
                        (false, 0, Vec::new())
                    } else {
                        (true, self.geometry.block_address(line.tag, set_idx), line.data.clone())
                    }
                };
                if !dirty {
                    continue;
                }
                for (i, word) in words.iter().enumerate() {
                    self.memory.write(block_addr + (i as u32) * 4, *word)?;
                    self.stats.record_memory_access();
                }
                state.sets[set_idx][way].dirty = false;
            }
        }
        Ok(())
    }

    /// If this L1 holds `addr` in `Modified` or `Exclusive`, downgrades it
    /// to `Shared`. Called by the bus on every sibling when the requester
    /// takes on a copy of its own, via either a read hit or a read miss.
    pub(crate) fn downgrade_owned_to_shared(&self, addr: u32) {
        let mut state = self.lock_state();
        let decoded = self.geometry.decode(addr);
        if let Some(line) = state.sets[decoded.index].iter_mut().find(|l| l.valid && l.tag == decoded.tag) {
            if matches!(line.mesi, MesiState::Modified | MesiState::Exclusive) {
                line.mesi = MesiState::Shared;
            }
        }
    }

    /// If this L1 holds any non-`Invalid` copy of `addr`, invalidates it.
    pub(crate) fn invalidate_owned_copy(&self, addr: u32) {
        let mut state = self.lock_state();
        let decoded = self.geometry.decode(addr);
        if let Some(line) = state.sets[decoded.index].iter_mut().find(|l| l.valid && l.tag == decoded.tag) {
            if line.mesi != MesiState::Invalid {
                line.mesi = MesiState::Invalid;
            }
        }
    }

    /// True if this L1 holds a non-`Invalid` copy of `addr`.
    pub(crate) fn holds_valid_copy(&self, addr: u32) -> bool {
        let state = self.lock_state();
        let decoded = self.geometry.decode(addr);
        state.sets[decoded.index].iter().any(|l| l.valid && l.tag == decoded.tag && l.mesi != MesiState::Invalid)
    }

    /// If this L1 holds `addr` in `Modified`, flushes every dirty line in
    /// this cache and invalidates the holder's line.
    pub(crate) fn writeback_and_invalidate_if_modified(&self, addr: u32) -> Result<(), CacheError> {
        let is_modified = {
            let state = self.lock_state();
            let decoded = self.geometry.decode(addr);
            state.sets[decoded.index]
                .iter()
                .any(|l| l.valid && l.tag == decoded.tag && l.mesi == MesiState::Modified)
        };
        if !is_modified {
            return Ok(());
        }
        self.flush()?;
        let mut state = self.lock_state();
        let decoded = self.geometry.decode(addr);
        if let Some(line) = state.sets[decoded.index].iter_mut().find(|l| l.valid && l.tag == decoded.tag) {
            line.mesi = MesiState::Invalid;
        }
        Ok(())
    }
}
