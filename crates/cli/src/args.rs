//! Parser for the simulator's flag grammar.
//!
//! The canonical invocation uses single-dash, multi-character flags —
//! `-cache_size medium -threads 4 -policy LRU -assoc 4 -write_policy WB
//! -trace foo.txt [--verbose]` — which is not GNU's double-dash long-option
//! convention, so this reaches for a small bespoke scanner rather than
//! `clap`. Flags may appear in any order; `--verbose` is the one flag that
//! takes no value.

use std::path::PathBuf;

use cachesim_core::config::{Associativity, Config, ReplacementPolicy, SizePreset, WritePolicy};

use crate::error::CliError;

/// Fully parsed and validated command line.
pub struct Cli {
    pub config: Config,
    pub trace_path: PathBuf,
}

/// Scans `args` (the program's argv, excluding `argv[0]`) into a validated
/// [`Cli`]. Validation happens entirely here, before any cache, memory, or
/// hierarchy object is constructed, per the failure model.
pub fn parse(args: impl Iterator<Item = String>) -> Result<Cli, CliError> {
    let tokens: Vec<String> = args.collect();

    let mut cache_size = None;
    let mut threads = None;
    let mut policy = None;
    let mut assoc = None;
    let mut write_policy = None;
    let mut trace = None;
    let mut verbose = false;

    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        if token == "--verbose" {
            verbose = true;
            i += 1;
            continue;
        }
        let value = tokens
            .get(i + 1)
            .ok_or_else(|| CliError::Usage(format!("flag {token} is missing its value")))?;
        match token {
            "-cache_size" => cache_size = Some(value.clone()),
            "-threads" => threads = Some(value.clone()),
            "-policy" => policy = Some(value.clone()),
            "-assoc" => assoc = Some(value.clone()),
            "-write_policy" => write_policy = Some(value.clone()),
            "-trace" => trace = Some(value.clone()),
            other => return Err(CliError::Usage(format!("unrecognised flag {other:?}"))),
        }
        i += 2;
    }

    let cache_size = require(cache_size, "-cache_size")?;
    let threads = require(threads, "-threads")?;
    let policy = require(policy, "-policy")?;
    let assoc = require(assoc, "-assoc")?;
    let write_policy = require(write_policy, "-write_policy")?;
    let trace = require(trace, "-trace")?;

    let preset = match cache_size.as_str() {
        "small" => SizePreset::Small,
        "medium" => SizePreset::Medium,
        "large" => SizePreset::Large,
        other => {
            return Err(CliError::Usage(format!(
                "-cache_size must be small, medium, or large, got {other:?}"
            )))
        }
    };

    let threads: u32 = threads
        .parse()
        .map_err(|_| CliError::Usage(format!("-threads must be an integer, got {threads:?}")))?;
    if threads == 0 || threads > 16 || (threads > 1 && threads % 2 != 0) {
        return Err(CliError::Usage(format!(
            "-threads must be 1 or an even number in [2,16], got {threads}"
        )));
    }

    let replacement = match policy.as_str() {
        "LRU" => ReplacementPolicy::Lru,
        "FIFO" => ReplacementPolicy::Fifo,
        "LFU" => ReplacementPolicy::Lfu,
        other => {
            return Err(CliError::Usage(format!(
                "-policy must be LRU, FIFO, or LFU, got {other:?}"
            )))
        }
    };

    let associativity = match assoc.as_str() {
        "0" => Associativity::Full,
        "1" => Associativity::DirectMapped,
        "4" => Associativity::Ways(4),
        other => return Err(CliError::Usage(format!("-assoc must be 0, 1, or 4, got {other:?}"))),
    };

    let write_policy = match write_policy.as_str() {
        "WB" => WritePolicy::WriteBack,
        "WT" => WritePolicy::WriteThrough,
        other => {
            return Err(CliError::Usage(format!("-write_policy must be WB or WT, got {other:?}")))
        }
    };

    Ok(Cli {
        config: Config {
            sizes: preset.sizes(),
            associativity,
            replacement,
            write_policy,
            threads,
            verbose,
        },
        trace_path: PathBuf::from(trace),
    })
}

fn require(value: Option<String>, flag: &str) -> Result<String, CliError> {
    value.ok_or_else(|| CliError::Usage(format!("missing required flag {flag}")))
}
