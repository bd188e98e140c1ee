//! Depth-first walk of the tree, deciding which files get searched.

use crate::config::RunConfig;
use crate::errors::{Error, Result};
use crate::glob::GlobCache;
use crate::matcher::{Acceptor, Matcher};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Files at or above this size are skipped.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// A regular file that passed every filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub size: u64,
}

impl FileEntry {
    pub fn new(path: PathBuf, size: u64) -> Self {
        Self { path, size }
    }

    /// The path as shown to the user, without a leading `./`.
    pub fn display_path(&self) -> PathBuf {
        self.path
            .strip_prefix(".")
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| self.path.clone())
    }
}

/// Walks a directory tree, pruning ignored directories and handing eligible
/// regular files to a visitor.
pub struct Walker {
    root: PathBuf,
    matcher: Matcher,
    acceptor: Acceptor,
    include_empty: bool,
}

impl Walker {
    pub fn new(root: impl Into<PathBuf>, matcher: Matcher, acceptor: Acceptor) -> Self {
        Self {
            root: root.into(),
            matcher,
            acceptor,
            include_empty: false,
        }
    }

    /// Also hand over empty files. Used when only file names are reported.
    pub fn include_empty(mut self, include: bool) -> Self {
        self.include_empty = include;
        self
    }

    /// Builds the walker for a run: discovers the ignore rules for the
    /// root directory and adds the user's exclude and accept patterns.
    pub fn from_config(config: &RunConfig) -> Result<Self> {
        let working_dir = config.root.canonicalize()?;
        let mut cache = GlobCache::new();

        let mut matcher = Matcher::discover(&working_dir, config.no_autoignore, &mut cache);
        // Rejected patterns are already reported by the matcher.
        let _ = matcher.append(config.exclude.as_slice());
        debug!("{matcher}");

        let (acceptor, _) = Acceptor::new(config.only.as_slice(), &mut cache);

        Ok(Self::new(&config.root, matcher, acceptor).include_empty(config.filename_only))
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Walks the tree in lexical pre-order and calls `visit` for every
    /// eligible file.
    ///
    /// Problems with single entries are logged and skipped. An error
    /// returned by `visit` stops the walk and is returned.
    pub fn walk<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(FileEntry) -> Result<()>,
    {
        let entries = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_pruned(e));

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    report_walk_error(e);
                    continue;
                }
            };
            if let Some(file) = self.eligible(&entry) {
                visit(file)?;
            }
        }
        Ok(())
    }

    /// Runs the walk and returns the eligible files in walk order.
    pub fn collect_files(&self) -> Vec<FileEntry> {
        let mut files = Vec::new();
        let collected: Result<()> = self.walk(|file| {
            files.push(file);
            Ok(())
        });
        if let Err(e) = collected {
            warn!("{e}");
        }
        files
    }

    /// Ignored directories are never entered.
    fn is_pruned(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && self
                .matcher
                .is_match(&relative_path(&self.root, entry.path()), true)
    }

    fn eligible(&self, entry: &DirEntry) -> Option<FileEntry> {
        let file_type = entry.file_type();
        if file_type.is_dir() {
            return None;
        }

        let size = if file_type.is_symlink() {
            // Resolve the link; links to directories are not followed.
            match fs::metadata(entry.path()) {
                Ok(meta) if meta.is_file() => meta.len(),
                Ok(_) => return None,
                Err(e) => {
                    debug!("Cannot visit {}: {}", entry.path().display(), e);
                    return None;
                }
            }
        } else if file_type.is_file() {
            match entry.metadata() {
                Ok(meta) => meta.len(),
                Err(e) => {
                    report_walk_error(e);
                    return None;
                }
            }
        } else {
            return None;
        };

        let rel = relative_path(&self.root, entry.path());
        if self.matcher.is_match(&rel, false) || !self.acceptor.accepts(&rel) {
            return None;
        }

        if size == 0 && !self.include_empty {
            return None;
        }
        if size >= MAX_FILE_SIZE {
            warn!("Skipping {}, too big: {}", entry.path().display(), size);
            return None;
        }

        Some(FileEntry::new(entry.path().to_path_buf(), size))
    }
}

fn report_walk_error(e: walkdir::Error) {
    let err = Error::Traversal {
        path: e.path().map(Path::to_path_buf).unwrap_or_default(),
        reason: e
            .io_error()
            .map(|io| io.to_string())
            .unwrap_or_else(|| e.to_string()),
    };
    warn!("{err}");
}

/// `path` relative to `root`, `/`-separated.
fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
