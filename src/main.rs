//! The main entry point for the `grr` command-line application.
//!
//! This file parses command-line arguments, layers the defaults file under
//! them and dispatches to search or replace mode in the `grr` library.

use grr::cli;
use grr::config::ConfigLoader;
use grr::errors::Result;
use grr::logging::init_logging;
use grr::{replacer, scanner, Walker};
use std::env;
use std::io::{self, Write};
use std::process;

fn main() {
    if let Err(e) = run() {
        eprintln!("{e}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = cli::parse_args();
    let mut config = args.to_run_config();
    init_logging(config.verbose);

    let cwd = env::current_dir()?;
    if let Some(path) = ConfigLoader::find_config(args.config.as_deref(), &cwd)? {
        tracing::debug!("using defaults from {}", path.display());
        config.merge_defaults(ConfigLoader::load_defaults(&path)?);
    }
    config.validate()?;

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());

    if args.show_ignores {
        let walker = Walker::from_config(&config)?;
        write!(out, "{}", walker.matcher())?;
        out.flush()?;
        return Ok(());
    }

    if config.replacement.is_some() {
        replacer::run_replace(&config, &mut out)?;
    } else {
        scanner::run_search(&config, &mut out)?;
    }
    out.flush()?;
    Ok(())
}
