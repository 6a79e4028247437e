//! Error taxonomy for the cache simulator.
//!
//! Every fallible operation in the hierarchy — memory access, cache request,
//! trace parsing — returns one of the variants below rather than panicking.
//! Counters that were incremented before a failure point are left as-is; see
//! the per-operation documentation in [`crate::cache`] for exactly which
//! counters are audited this way.

use thiserror::Error;

/// Unified error type for the cache simulator.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A read or write targeted an address that is not a multiple of 4.
    #[error("unaligned access at {0:#x}")]
    Unaligned(u32),

    /// A memory access fell outside `[base, base + size - 4]`.
    #[error("address {0:#x} is out of bounds")]
    InvalidAddress(u32),

    /// A trace line failed to parse; carries the 1-based line number and the
    /// raw (trimmed) line text for diagnostics.
    #[error("malformed trace line {line}: {text:?}")]
    BadTraceFormat {
        /// 1-based line number within the trace file.
        line: usize,
        /// The offending line, trimmed of surrounding whitespace.
        text: String,
    },

    /// A post-eviction lookup found no line, a set index fell outside
    /// `num_sets`, or the hierarchy's level fan-out arithmetic produced an
    /// out-of-range L2/L3 index. These indicate a broken invariant in the
    /// engine itself and are never retried.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    /// The trace file could not be opened or read.
    #[error("trace file I/O error: {0}")]
    FileIo(#[from] std::io::Error),
}
