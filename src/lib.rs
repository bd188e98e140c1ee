//! `grr` is a library for recursive search and replace over a directory tree.
//!
//! It provides the core logic for the `grr` command-line tool but can also be
//! used as a standalone library. The main components are:
//!
//! - `glob` and `ignore_file`: translate `.gitignore`/`.hgignore` content into
//!   typed ignore rules.
//! - `matcher`: the ignore predicate for a run, picked by looking for the
//!   nearest `.git` or `.hg` directory, plus the `--only` accept filter.
//! - `walker`: depth-first traversal that prunes ignored directories and
//!   skips empty, oversized and ignored files.
//! - `Scanner`: finds matching lines, with line numbers and match spans.
//! - `Replacer`: substitutes matches and rewrites files in place.
//! - `OutputFormatter`: renders results as text or JSON lines.

pub mod cli;
pub mod config;
pub mod errors;
pub mod glob;
pub mod ignore_file;
pub mod logging;
pub mod matcher;
pub mod output_formatter;
pub mod patterns;
pub mod replacer;
pub mod scanner;
pub mod walker;

// Re-export main types for easier access by library users.
pub use config::RunConfig;
pub use errors::{Error, Result};
pub use matcher::{Acceptor, Matcher};
pub use output_formatter::{OutputFormat, OutputFormatter};
pub use patterns::{Pattern, PatternOptions};
pub use replacer::Replacer;
pub use scanner::Scanner;
pub use walker::Walker;
