use crate::config::RunConfig;
use crate::errors::{Error, Result};
use crate::output_formatter::OutputFormatter;
use crate::patterns::Pattern;
use crate::walker::{FileEntry, Walker};
use rayon::prelude::*;
use std::fs;
use std::io::Write;
use std::ops::Range;
use std::path::PathBuf;
use tracing::warn;

/// Finds the lines of a file that contain the search pattern.
///
/// The scanner has two modes. By default the pattern runs over the whole
/// buffer, so `^`/`$` mean start and end of file and a match may span lines;
/// each match is then mapped back to the line it starts on. In single-line
/// mode the buffer is cut into lines first and each line is tested alone.
pub struct Scanner {
    pattern: Pattern,
    filename_only: bool,
}

/// One line of a scanned file that holds at least one match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInfo<'a> {
    /// 1-based line number.
    pub number: usize,
    /// The line's bytes, without the trailing newline.
    pub content: &'a [u8],
    /// Byte ranges of the matches within `content`.
    pub spans: Vec<Range<usize>>,
}

/// The lines of one buffer that matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult<'a> {
    /// Matching lines in file order, one entry per line.
    pub lines: Vec<LineInfo<'a>>,
    /// The buffer contains a zero byte.
    pub is_binary: bool,
}

impl ScanResult<'_> {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Represents a matching line of a file, ready to be reported.
#[derive(Debug, Clone)]
pub struct Match {
    /// The line number of the match.
    pub line_number: usize,
    /// The content of the line that contained the match.
    pub line_content: Vec<u8>,
    /// Byte ranges of every occurrence of the pattern within the line.
    pub spans: Vec<Range<usize>>,
}

/// Everything found in one file.
#[derive(Debug, Clone)]
pub struct FileMatches {
    /// The path to the file where the matches were found.
    pub file_path: PathBuf,
    pub is_binary: bool,
    pub matches: Vec<Match>,
}

impl Scanner {
    /// Creates a new `Scanner`. With `filename_only` set the scan stops at
    /// the first match, since only the file's name will be reported.
    pub fn new(pattern: Pattern, filename_only: bool) -> Self {
        Self {
            pattern,
            filename_only,
        }
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Scans a buffer for the pattern.
    ///
    /// Binary content (any zero byte) stops at the first match because there
    /// is no useful line-oriented report for it.
    pub fn scan<'a>(&self, content: &'a [u8]) -> ScanResult<'a> {
        let is_binary = content.contains(&0);
        let first_only = is_binary || self.filename_only;

        let lines = if self.pattern.options().single_line {
            self.scan_lines(content, first_only)
        } else {
            self.scan_buffer(content, first_only)
        };

        ScanResult { lines, is_binary }
    }

    fn scan_buffer<'a>(&self, content: &'a [u8], first_only: bool) -> Vec<LineInfo<'a>> {
        let mut lines: Vec<LineInfo<'a>> = Vec::new();
        let mut line_number = 1;
        let mut last = 0;
        let mut line_start = 0;

        for m in self.pattern.regex().find_iter(content) {
            // Count only the newlines since the previous match.
            line_number += count_newlines(&content[last..m.start()]);
            last = m.start();

            if let Some(line) = lines.last_mut().filter(|l| l.number == line_number) {
                line.spans.push(clip(m.range(), line_start, line.content.len()));
                continue;
            }

            let (begin, end) = line_bounds(content, m.start(), m.end());
            line_start = begin;
            lines.push(LineInfo {
                number: line_number,
                content: &content[begin..end],
                spans: vec![clip(m.range(), begin, end - begin)],
            });
            if first_only {
                break;
            }
        }
        lines
    }

    fn scan_lines<'a>(&self, content: &'a [u8], first_only: bool) -> Vec<LineInfo<'a>> {
        let mut lines = Vec::new();
        for (idx, line) in content.split(|&b| b == b'\n').enumerate() {
            if !self.pattern.is_match(line) {
                continue;
            }
            lines.push(LineInfo {
                number: idx + 1,
                content: line,
                spans: self.spans(line),
            });
            if first_only {
                break;
            }
        }
        lines
    }

    /// Byte ranges of every occurrence of the pattern inside `line`.
    pub fn spans(&self, line: &[u8]) -> Vec<Range<usize>> {
        self.pattern
            .regex()
            .find_iter(line)
            .map(|m| m.range())
            .collect()
    }

    /// Reads and scans a single file. Returns `None` when nothing matched.
    pub fn scan_file(&self, entry: &FileEntry) -> Result<Option<FileMatches>> {
        let content = fs::read(&entry.path).map_err(|source| Error::Read {
            path: entry.path.clone(),
            source,
        })?;

        let result = self.scan(&content);
        if result.is_empty() {
            return Ok(None);
        }

        let matches = result
            .lines
            .iter()
            .map(|line| Match {
                line_number: line.number,
                line_content: line.content.to_vec(),
                spans: line.spans.clone(),
            })
            .collect();

        Ok(Some(FileMatches {
            file_path: entry.display_path(),
            is_binary: result.is_binary,
            matches,
        }))
    }

    /// Scans a file, logging per-file failures instead of returning them.
    fn search_entry(&self, entry: &FileEntry) -> Option<FileMatches> {
        match self.scan_file(entry) {
            Ok(found) => found,
            Err(e) => {
                warn!("{e}");
                None
            }
        }
    }
}

/// A buffer match as a range within the line starting at `line_start`,
/// cut at the line's end.
fn clip(found: Range<usize>, line_start: usize, line_len: usize) -> Range<usize> {
    let start = (found.start - line_start).min(line_len);
    let end = (found.end - line_start).clamp(start, line_len);
    start..end
}

fn count_newlines(bytes: &[u8]) -> usize {
    bytes.iter().filter(|&&b| b == b'\n').count()
}

/// Finds the newlines around `content[start..end]` and returns the bounds of
/// the line(s) it sits on.
fn line_bounds(content: &[u8], start: usize, end: usize) -> (usize, usize) {
    let begin = content[..start]
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |i| i + 1);

    // A match ending in a newline stays on the line that newline ends.
    let from = end.saturating_sub(1).max(start);
    let finish = content[from..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(content.len(), |i| from + i);

    (begin, finish)
}

/// Statistics from a search run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SearchStats {
    pub files_searched: usize,
    pub files_matched: usize,
    pub lines_matched: usize,
}

impl SearchStats {
    fn record(&mut self, found: Option<&FileMatches>) {
        self.files_searched += 1;
        if let Some(found) = found {
            self.files_matched += 1;
            self.lines_matched += found.matches.len();
        }
    }
}

/// The main entry point for search mode.
///
/// This function handles:
/// 1. Compiling the pattern and discovering the ignore rules.
/// 2. Walking the tree and scanning each eligible file.
/// 3. Writing the results in walk order.
///
/// With a single worker files are scanned as the walk finds them; otherwise
/// the walk runs first and the files are scanned on a Rayon pool.
pub fn run_search<W: Write>(config: &RunConfig, writer: &mut W) -> Result<SearchStats> {
    config.validate()?;
    let pattern = Pattern::new(&config.pattern, config.pattern_options())?;
    let scanner = Scanner::new(pattern, config.filename_only);
    let walker = Walker::from_config(config)?;
    let mut formatter = OutputFormatter::from_config(config);
    let mut stats = SearchStats::default();

    let workers = config.worker_count();
    if workers == 1 {
        walker.walk(|entry| {
            let found = scanner.search_entry(&entry);
            stats.record(found.as_ref());
            if let Some(found) = found {
                formatter.write_matches(writer, &found)?;
            }
            Ok(())
        })?;
        return Ok(stats);
    }

    let files = walker.collect_files();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()?;

    // `collect` keeps the walk order.
    let results: Vec<Option<FileMatches>> = pool.install(|| {
        files
            .par_iter()
            .map(|entry| scanner.search_entry(entry))
            .collect()
    });

    for found in results {
        stats.record(found.as_ref());
        if let Some(found) = found {
            formatter.write_matches(writer, &found)?;
        }
    }

    Ok(stats)
}
