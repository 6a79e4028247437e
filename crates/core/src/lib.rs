//! Multi-core cache hierarchy and MESI coherence simulator engine.
//!
//! This crate implements the core memory-hierarchy model described in the
//! project's design documents:
//! 1. **Memory:** a flat, bounded, word-addressable backing store.
//! 2. **Cache:** one set-associative level — decode, lookup, allocate,
//!    evict, forward — parameterised by size, associativity, replacement
//!    policy (FIFO/LRU/LFU), and write policy (write-back/write-through).
//! 3. **Coherence:** a central bus enforcing MESI across sibling L1s.
//! 4. **Hierarchy:** wires per-core L1s to shared L2/L3 levels and memory.
//! 5. **Trace/Sim:** parses a request trace and replays it across one
//!    worker thread per core.
//!
//! Argument parsing and the human-readable report belong to the
//! `cachesim-cli` binary crate; this crate exposes the simulation engine
//! only.

/// Geometry-agnostic cache line: one set-associative level of the hierarchy.
pub mod cache;
/// The MESI coherence bus shared by every L1.
pub mod coherence;
/// Address decoding, shared value types, and the error taxonomy.
pub mod common;
/// Resolved simulation configuration: geometry, policies, size presets.
pub mod config;
/// Wires L1/L2/L3 caches to cores and owns memory and the coherence bus.
pub mod hierarchy;
/// Flat, bounded, byte-addressed main memory.
pub mod memory;
/// Replays a parsed trace across one worker thread per core.
pub mod sim;
/// Hit/miss/eviction/traffic counters and the end-of-run report.
pub mod stats;
/// Trace-file parsing into a shared [`trace::RequestQueue`].
pub mod trace;

pub use crate::common::CacheError;
pub use crate::config::Config;
pub use crate::hierarchy::Hierarchy;
pub use crate::sim::{replay, RunReport};
pub use crate::trace::{parse_trace_file, MemoryRequest, RequestQueue};
