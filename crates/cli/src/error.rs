//! CLI-level error taxonomy: usage validation failures plus every error the
//! simulation engine itself can raise.

use thiserror::Error;

use cachesim_core::CacheError;

/// Top-level error type for the `cache_sim` binary.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument validation failed before any cache, memory, or hierarchy
    /// object was constructed.
    #[error(
        "{0}\n\nusage: cache_sim -cache_size {{small|medium|large}} -threads N \
         -policy {{LRU|FIFO|LFU}} -assoc {{0|1|4}} -write_policy {{WB|WT}} \
         -trace FILE [--verbose]"
    )]
    Usage(String),

    /// A failure raised by trace parsing or the simulation engine.
    #[error(transparent)]
    Sim(#[from] CacheError),
}
