use std::path::PathBuf;
use thiserror::Error;

/// The primary error type for all operations in `grr`.
///
/// Variants follow how far an error is allowed to travel: configuration and
/// write-back failures end the run, everything else is reported and the walk
/// carries on (see [`Error::is_fatal`]).
#[derive(Error, Debug)]
pub enum Error {
    /// An error related to file system I/O.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The search expression failed to compile.
    #[error("Pattern compilation failed: {0}")]
    Regex(#[from] regex::Error),

    /// An error that occurred while parsing a YAML defaults file.
    #[error("Config parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A general configuration-related error, e.g. a pattern that matches
    /// the empty string.
    #[error("Config error: {0}")]
    Config(String),

    /// A glob or regex inside an ignore file (or the user's exclude list)
    /// that could not be compiled. The rule is dropped.
    #[error("can't compile pattern {pattern} from {source_name}: {reason}")]
    IgnoreRule {
        source_name: String,
        pattern: String,
        reason: String,
    },

    /// A file that could not be opened or read. Only that file is skipped.
    #[error("can't read file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A directory entry that could not be visited.
    #[error("Cannot visit {}: {reason}", path.display())]
    Traversal { path: PathBuf, reason: String },

    /// Options that cannot be combined in one run.
    #[error("Unsupported combination: {0}")]
    UnsupportedCombination(&'static str),

    /// Replacement was requested on binary content without `--force`.
    #[error("Refusing to change binary file {}; supply --force to force change", path.display())]
    BinaryWriteRefused { path: PathBuf },

    /// Writing a computed replacement back to disk failed. The file may be
    /// half-written, so the run stops.
    #[error("Error writing replacement in file {}: {source}", path.display())]
    WriteBack {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An error related to JSON serialization.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An error from the `walkdir` crate.
    #[error("Walkdir error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// An error that occurred while building the Rayon thread pool.
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    /// Whether this error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::IgnoreRule { .. }
            | Error::Read { .. }
            | Error::Traversal { .. }
            | Error::BinaryWriteRefused { .. }
            | Error::WalkDir(_) => false,
            Error::Io(_)
            | Error::Regex(_)
            | Error::Yaml(_)
            | Error::Config(_)
            | Error::UnsupportedCombination(_)
            | Error::WriteBack { .. }
            | Error::Json(_)
            | Error::ThreadPool(_) => true,
        }
    }
}

/// A convenient type alias for `Result<T, grr::errors::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Config(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Config(s.to_string())
    }
}
