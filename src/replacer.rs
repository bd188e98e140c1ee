use crate::config::RunConfig;
use crate::errors::{Error, Result};
use crate::output_formatter::OutputFormatter;
use crate::patterns::Pattern;
use crate::walker::{FileEntry, Walker};
use rayon::prelude::*;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Core engine for replacing the search pattern in files.
///
/// The replacement template may refer to capture groups (`$1`, `${name}`),
/// expanded with the regex crate's own substitution rules.
pub struct Replacer {
    pattern: Pattern,
    template: String,
    force: bool,
}

/// The outcome of replacing in one buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceResult {
    /// `true` if at least one match was substituted.
    pub changed: bool,
    /// The new content. Only meaningful when `changed` is set.
    pub content: Vec<u8>,
    /// Number of matches substituted.
    pub change_count: usize,
    /// The content is binary, matched, and `force` was not given.
    pub binary_refused: bool,
}

impl ReplaceResult {
    fn unchanged() -> Self {
        Self {
            changed: false,
            content: Vec::new(),
            change_count: 0,
            binary_refused: false,
        }
    }
}

/// The result of processing a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessResult {
    /// The total number of substitutions made.
    pub changes: usize,
    /// `true` if the file was rewritten.
    pub modified: bool,
}

impl Replacer {
    /// Creates a new `Replacer`.
    ///
    /// Single-line and plain-text patterns are refused: their semantics for
    /// replacement are not defined, and guessing would corrupt files.
    pub fn new(pattern: Pattern, template: impl Into<String>, force: bool) -> Result<Self> {
        let options = pattern.options();
        if options.single_line {
            return Err(Error::UnsupportedCombination(
                "can't handle singleline replacements",
            ));
        }
        if options.plain_text {
            return Err(Error::UnsupportedCombination(
                "can't handle plain text replacements",
            ));
        }

        Ok(Self {
            pattern,
            template: template.into(),
            force,
        })
    }

    /// Substitutes every non-overlapping match in `content`.
    ///
    /// Binary content (any zero byte) is left alone unless `force` is set.
    pub fn replace(&self, content: &[u8]) -> ReplaceResult {
        let regex = self.pattern.regex();
        if !self.force && content.contains(&0) {
            let mut result = ReplaceResult::unchanged();
            result.binary_refused = regex.is_match(content);
            return result;
        }

        let mut out = Vec::with_capacity(content.len());
        let mut last = 0;
        let mut count = 0;
        for caps in regex.captures_iter(content) {
            let Some(m) = caps.get(0) else { continue };
            out.extend_from_slice(&content[last..m.start()]);
            caps.expand(self.template.as_bytes(), &mut out);
            last = m.end();
            count += 1;
        }

        if count == 0 {
            return ReplaceResult::unchanged();
        }
        out.extend_from_slice(&content[last..]);

        ReplaceResult {
            changed: true,
            content: out,
            change_count: count,
            binary_refused: false,
        }
    }

    /// Replaces the pattern inside a file, rewriting it in place.
    ///
    /// Open and read failures only concern this file and come back as
    /// [`Error::Read`]. Failures after the new content has been computed come
    /// back as [`Error::WriteBack`], since the file may now be half-written.
    pub fn process_file(&self, path: &Path) -> Result<ProcessResult> {
        let read_error = |source| Error::Read {
            path: path.to_path_buf(),
            source,
        };
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(read_error)?;
        let mut content = Vec::new();
        file.read_to_end(&mut content).map_err(read_error)?;

        let result = self.replace(&content);
        if result.binary_refused {
            return Err(Error::BinaryWriteRefused {
                path: path.to_path_buf(),
            });
        }
        if !result.changed {
            return Ok(ProcessResult {
                changes: 0,
                modified: false,
            });
        }

        let write_error = |source| Error::WriteBack {
            path: path.to_path_buf(),
            source,
        };
        file.seek(SeekFrom::Start(0)).map_err(write_error)?;
        file.write_all(&result.content).map_err(write_error)?;
        // The replacement may be shorter than what it replaced; drop the
        // stale tail of the old content.
        file.set_len(result.content.len() as u64)
            .map_err(write_error)?;

        Ok(ProcessResult {
            changes: result.change_count,
            modified: true,
        })
    }

    /// Processes a file, keeping per-file failures local. Only write-back
    /// failures are returned.
    fn replace_entry(&self, entry: &FileEntry) -> Result<Option<ProcessResult>> {
        match self.process_file(&entry.path) {
            Ok(result) => Ok(result.modified.then_some(result)),
            Err(e @ Error::BinaryWriteRefused { .. }) => {
                debug!("{e}");
                Ok(None)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("{e}");
                Ok(None)
            }
        }
    }
}

/// Statistics from a replace run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceStats {
    pub files_processed: usize,
    pub files_changed: usize,
    pub total_changes: usize,
}

impl ReplaceStats {
    fn record(&mut self, result: Option<&ProcessResult>) {
        self.files_processed += 1;
        if let Some(result) = result {
            self.files_changed += 1;
            self.total_changes += result.changes;
        }
    }
}

/// The main entry point for replace mode.
///
/// This function orchestrates the entire replacement process:
/// 1. It validates the options and compiles the pattern.
/// 2. It walks the tree and rewrites each eligible file.
/// 3. It reports every changed file and a final summary.
///
/// A failed write-back stops the run at once.
pub fn run_replace<W: Write>(config: &RunConfig, writer: &mut W) -> Result<ReplaceStats> {
    config.validate()?;
    let template = config
        .replacement
        .clone()
        .ok_or_else(|| Error::Config("no replacement given".to_string()))?;
    let pattern = Pattern::new(&config.pattern, config.pattern_options())?;
    let replacer = Replacer::new(pattern, template, config.force)?;
    let walker = Walker::from_config(config)?;
    let mut formatter = OutputFormatter::from_config(config);
    let mut stats = ReplaceStats::default();

    let workers = config.worker_count();
    if workers == 1 {
        walker.walk(|entry| {
            let result = replacer.replace_entry(&entry)?;
            stats.record(result.as_ref());
            if let Some(result) = result {
                formatter.write_replacement(writer, &entry.display_path(), result.changes)?;
            }
            Ok(())
        })?;
    } else {
        let files = walker.collect_files();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()?;

        // After a fatal error the remaining files are left alone, but those
        // already rewritten are still reported.
        let failed = AtomicBool::new(false);
        let results: Vec<Result<Option<ProcessResult>>> = pool.install(|| {
            files
                .par_iter()
                .map(|entry| {
                    if failed.load(Ordering::Relaxed) {
                        return Ok(None);
                    }
                    let result = replacer.replace_entry(entry);
                    if result.is_err() {
                        failed.store(true, Ordering::Relaxed);
                    }
                    result
                })
                .collect()
        });

        report_results(&files, results, &mut formatter, writer, &mut stats)?;
    }

    formatter.write_summary(writer, stats.total_changes, stats.files_changed)?;
    Ok(stats)
}

/// Reports parallel results in walk order. The first error is returned
/// once every rewritten file has been reported.
fn report_results<W: Write>(
    files: &[FileEntry],
    results: Vec<Result<Option<ProcessResult>>>,
    formatter: &mut OutputFormatter,
    writer: &mut W,
    stats: &mut ReplaceStats,
) -> Result<()> {
    let mut first_error = None;
    for (entry, result) in files.iter().zip(results) {
        match result {
            Ok(result) => {
                stats.record(result.as_ref());
                if let Some(result) = result {
                    formatter.write_replacement(writer, &entry.display_path(), result.changes)?;
                }
            }
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    match first_error {
        Some(e) => {
            warn!(
                "aborting after {} change(s) in {} file(s)",
                stats.total_changes, stats.files_changed
            );
            Err(e)
        }
        None => Ok(()),
    }
}
