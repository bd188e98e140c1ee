//! Diagnostics setup. Diagnostics go to stderr, results to stdout.

use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber.
///
/// Warnings are shown by default, `verbose` adds debug output (skipped
/// binary files, broken symlinks, the ignore rules in effect). `RUST_LOG`
/// overrides both.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .try_init();
}
