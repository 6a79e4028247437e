//! `cache_sim` — command-line front end for the cache hierarchy simulator.
//!
//! Resolves flags to a [`cachesim_core::Config`], parses the trace file,
//! builds the [`cachesim_core::Hierarchy`], replays the trace across one
//! worker thread per core, flushes every level, and prints the statistics
//! report.

mod args;
mod error;

use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use cachesim_core::{hierarchy::Hierarchy, sim, trace};

use error::CliError;

fn main() -> ExitCode {
    let argv = std::env::args().skip(1);
    match run(argv) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(argv: impl Iterator<Item = String>) -> Result<(), CliError> {
    let cli = args::parse(argv)?;
    init_tracing(cli.config.verbose);

    tracing::info!(
        threads = cli.config.threads,
        l1_bytes = cli.config.sizes.l1_bytes,
        l2_bytes = cli.config.sizes.l2_bytes,
        l3_bytes = cli.config.sizes.l3_bytes,
        memory_bytes = cli.config.sizes.memory_bytes,
        replacement = ?cli.config.replacement,
        write_policy = ?cli.config.write_policy,
        trace = %cli.trace_path.display(),
        "resolved configuration"
    );

    let queue = Arc::new(trace::parse_trace_file(&cli.trace_path)?);
    let hierarchy = Arc::new(Hierarchy::build(&cli.config)?);

    let report = sim::replay(hierarchy.clone(), queue)?;

    print!("{}", hierarchy.stats().report(report.elapsed));
    Ok(())
}

/// Installs a `tracing-subscriber` `fmt` subscriber. `--verbose` raises the
/// engine's own spans to `debug`; otherwise only `warn`-and-above is shown.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("warn,cachesim_core=debug,cachesim_cli=info")
    } else {
        EnvFilter::new("warn")
    };
    let _ = tracing_subscriber::fmt().with_env_filter(filter).without_time().try_init();
}
