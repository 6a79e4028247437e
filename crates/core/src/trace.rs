//! Parses a trace file into a [`RequestQueue`] of typed memory requests.
//!
//! Parsing is eager and all-or-nothing: the whole file is read and checked
//! before replay starts, so the hierarchy never sees a partially-valid
//! trace.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use tracing::debug;

use crate::common::CacheError;

/// One parsed trace operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryRequest {
    /// `R 0x<hex_address>`
    Read { address: u32 },
    /// `W 0x<hex_address> <signed_decimal_int>`
    Write { address: u32, value: i32 },
}

/// A shared FIFO of parsed requests, drained concurrently by core worker
/// threads. The queue is fully populated before any thread starts draining
/// it, so the only suspension point is the mutex acquired to pop the next
/// entry — there is no condvar wait.
pub struct RequestQueue {
    entries: Mutex<VecDeque<MemoryRequest>>,
}

impl RequestQueue {
    /// Builds a queue directly from already-parsed requests (used by tests
    /// and by [`parse_trace_file`]).
    pub fn from_entries(entries: Vec<MemoryRequest>) -> Self {
        RequestQueue { entries: Mutex::new(entries.into()) }
    }

    /// Pops the next request, or `None` once the queue is exhausted.
    pub fn pop(&self) -> Option<MemoryRequest> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).pop_front()
    }

    /// Total number of requests originally parsed.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the queue has no requests left.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reads and parses a trace file from `path`.
///
/// Fails the whole file with [`CacheError::BadTraceFormat`] naming the
/// first offending line, or [`CacheError::FileIo`] if the file cannot be
/// opened or read. No semantic validation (e.g. address bounds) is
/// performed here — that happens at replay time in the hierarchy.
pub fn parse_trace_file(path: &Path) -> Result<RequestQueue, CacheError> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        entries.push(parse_line(idx + 1, line)?);
    }

    debug!(path = %path.display(), operations = entries.len(), "trace parsed");
    Ok(RequestQueue::from_entries(entries))
}

fn parse_line(line_number: usize, line: &str) -> Result<MemoryRequest, CacheError> {
    let bad = || CacheError::BadTraceFormat { line: line_number, text: line.to_string() };

    let mut tokens = line.split_whitespace();
    let kind = tokens.next().ok_or_else(bad)?;
    let addr_token = tokens.next().ok_or_else(bad)?;
    let address = parse_hex_address(addr_token).ok_or_else(bad)?;

    match kind {
        "R" => {
            if tokens.next().is_some() {
                return Err(bad());
            }
            Ok(MemoryRequest::Read { address })
        }
        "W" => {
            let value_token = tokens.next().ok_or_else(bad)?;
            if tokens.next().is_some() {
                return Err(bad());
            }
            let value: i32 = value_token.parse().map_err(|_| bad())?;
            Ok(MemoryRequest::Write { address, value })
        }
        _ => Err(bad()),
    }
}

fn parse_hex_address(token: &str) -> Option<u32> {
    let hex = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X"))?;
    u32::from_str_radix(hex, 16).ok()
}
