//! Replays a [`RequestQueue`] against a [`Hierarchy`] using one OS thread
//! per core (or inline, for the single-core case).

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::info;

use crate::common::CacheError;
use crate::hierarchy::Hierarchy;
use crate::trace::RequestQueue;

/// Outcome of one replay pass: just the wall-clock duration, since every
/// other statistic lives in the hierarchy's shared [`crate::stats::CacheStats`].
pub struct RunReport {
    pub elapsed: Duration,
}

/// Drains `queue` against `hierarchy`, one core worker per L1, then flushes
/// every level top-down before returning.
///
/// Dispatch is address-independent: whichever thread's mutex acquisition
/// wins drains the next request onto *that thread's own* L1. The trace is
/// not partitioned by address ahead of time.
pub fn replay(hierarchy: Arc<Hierarchy>, queue: Arc<RequestQueue>) -> Result<RunReport, CacheError> {
    let start = Instant::now();
    let core_count = hierarchy.core_count();
    info!(core_count, pending = queue.len(), "replay starting");

    if core_count == 1 {
        while let Some(request) = queue.pop() {
            hierarchy.apply(0, &request)?;
        }
    } else {
        let mut handles = Vec::with_capacity(core_count);
        for core_idx in 0..core_count {
            let hierarchy = hierarchy.clone();
            let queue = queue.clone();
            handles.push(thread::spawn(move || -> Result<(), CacheError> {
                while let Some(request) = queue.pop() {
                    hierarchy.apply(core_idx, &request)?;
                }
                Ok(())
            }));
        }
        for handle in handles {
            handle
                .join()
                .map_err(|_| CacheError::InternalInvariant("a core worker thread panicked".into()))??;
        }
    }

    hierarchy.flush_all()?;
    let elapsed = start.elapsed();
    info!(elapsed_ms = elapsed.as_millis() as u64, "replay finished");
    Ok(RunReport { elapsed })
}
