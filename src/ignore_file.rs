//! Parsing of `.gitignore` and `.hgignore` files into typed rules.

use crate::errors::Error;
use crate::glob::{self, Glob, GlobCache};
use regex::Regex;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// One ignore rule. Rules are OR-combined; there is no negation.
#[derive(Debug, Clone)]
pub enum IgnoreRule {
    /// A regular expression searched for anywhere in the re-rooted path.
    Regex(Regex),
    /// A glob, either rooted at the ignore file's directory or matched
    /// against the last path component.
    Glob(Glob),
    /// A literal directory name; matches that directory and everything in it.
    DirName(String),
}

/// A path prepared once for testing against many rules.
pub struct PathQuery<'a> {
    path: &'a str,
    subject: String,
    is_dir: bool,
}

impl<'a> PathQuery<'a> {
    /// `path` is relative and `/`-separated, with any `./` already removed.
    pub fn new(path: &'a str, is_dir: bool) -> Self {
        Self {
            path,
            subject: glob::subject(path),
            is_dir,
        }
    }

    pub fn path(&self) -> &str {
        self.path
    }

    /// Names of the directories this path lies in, plus its own name when
    /// it is a directory.
    fn directories(&self) -> impl Iterator<Item = &str> {
        let mut parts: Vec<&str> = self.path.split('/').filter(|p| !p.is_empty()).collect();
        if !self.is_dir {
            parts.pop();
        }
        parts.into_iter()
    }
}

impl IgnoreRule {
    pub fn is_match(&self, query: &PathQuery<'_>) -> bool {
        match self {
            IgnoreRule::Regex(re) => re.is_match(query.path),
            IgnoreRule::Glob(g) => {
                g.is_match_subject(&query.subject)
                    || (query.is_dir && g.is_match_subject(&format!("{}/", query.subject)))
            }
            IgnoreRule::DirName(name) => query.directories().any(|d| d == name),
        }
    }
}

impl fmt::Display for IgnoreRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreRule::Regex(re) => write!(f, "{}", re.as_str()),
            IgnoreRule::Glob(g) => write!(f, "{}", g.as_str()),
            IgnoreRule::DirName(name) => write!(f, "{name}/"),
        }
    }
}

/// Which dialect an ignore file is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreSyntax {
    Git,
    Hg,
}

impl IgnoreSyntax {
    /// The metadata directory that marks a repository root.
    pub fn marker(self) -> &'static str {
        match self {
            IgnoreSyntax::Git => ".git",
            IgnoreSyntax::Hg => ".hg",
        }
    }

    /// The ignore file read from the repository root.
    pub fn file_name(self) -> &'static str {
        match self {
            IgnoreSyntax::Git => ".gitignore",
            IgnoreSyntax::Hg => ".hgignore",
        }
    }
}

/// The rules read from one ignore file.
#[derive(Debug)]
pub struct IgnoreFile {
    pub path: PathBuf,
    pub rules: Vec<IgnoreRule>,
    /// Location of the working directory relative to the ignore file's
    /// directory, `/`-separated. Empty when the working directory is that
    /// directory or lies outside it.
    pub prefix: String,
    /// Lines that were dropped because they did not compile.
    pub skipped: Vec<Error>,
}

impl IgnoreFile {
    /// Reads `path` in the given dialect.
    ///
    /// A missing or unreadable ignore file yields an empty rule set (plus the
    /// implicit metadata-directory rule); it is never an error.
    pub fn load(
        path: &Path,
        syntax: IgnoreSyntax,
        working_dir: &Path,
        cache: &mut GlobCache,
    ) -> Self {
        let content = match fs::read(path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                debug!("no ignore rules from {}: {}", path.display(), e);
                String::new()
            }
        };

        let source_name = path.display().to_string();
        let (rules, skipped) = match syntax {
            IgnoreSyntax::Git => parse_git(&content, &source_name, cache),
            IgnoreSyntax::Hg => parse_hg(&content, &source_name, cache),
        };

        let anchor = path.parent().unwrap_or_else(|| Path::new("/"));
        Self {
            path: path.to_path_buf(),
            rules,
            prefix: compute_prefix(anchor, working_dir),
            skipped,
        }
    }
}

/// Relative path from `anchor` down to `working_dir`, or empty when
/// `working_dir` is not below `anchor`.
pub fn compute_prefix(anchor: &Path, working_dir: &Path) -> String {
    match working_dir.strip_prefix(anchor) {
        Ok(rel) => rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => String::new(),
    }
}

fn rule_error(source_name: &str, pattern: &str, reason: impl ToString) -> Error {
    let err = Error::IgnoreRule {
        source_name: source_name.to_string(),
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };
    warn!("{err}");
    err
}

fn has_wildcard(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Parses `.gitignore` content.
///
/// A line without `/` is a basename glob, a line whose only `/` is the
/// trailing one names a directory, any other line is rooted at the ignore
/// file's directory.
pub fn parse_git(
    content: &str,
    source_name: &str,
    cache: &mut GlobCache,
) -> (Vec<IgnoreRule>, Vec<Error>) {
    let mut rules = vec![IgnoreRule::DirName(IgnoreSyntax::Git.marker().to_string())];
    let mut skipped = Vec::new();

    for raw in content.lines() {
        let line = raw.trim_end_matches([' ', '\t', '\r']);
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('!') {
            debug!("{source_name}: negated pattern {line} is not supported, skipping");
            continue;
        }

        let compiled = match line.find('/') {
            None => cache.compile(line, false),
            Some(pos) if pos == line.len() - 1 => {
                let name = &line[..pos];
                if name.is_empty() {
                    continue;
                }
                if !has_wildcard(name) {
                    rules.push(IgnoreRule::DirName(name.to_string()));
                    continue;
                }
                cache.compile(line, false)
            }
            Some(_) => cache.compile(line, true),
        };

        match compiled {
            Ok(g) => rules.push(IgnoreRule::Glob(g)),
            Err(e) => skipped.push(rule_error(source_name, line, e)),
        }
    }

    (rules, skipped)
}

/// Parses `.hgignore` content.
///
/// The file starts in regexp syntax; `syntax: glob` and `syntax: regexp`
/// (or `re`) switch it for the lines that follow.
pub fn parse_hg(
    content: &str,
    source_name: &str,
    cache: &mut GlobCache,
) -> (Vec<IgnoreRule>, Vec<Error>) {
    let mut rules = vec![IgnoreRule::DirName(IgnoreSyntax::Hg.marker().to_string())];
    let mut skipped = Vec::new();
    let mut is_regex = true;

    for raw in content.lines() {
        let line = match raw.find('#') {
            Some(0) => continue,
            Some(pos) => &raw[..pos],
            None => raw,
        };
        let line = line.trim_end_matches([' ', '\t', '\r']);
        if line.is_empty() {
            continue;
        }

        if let Some(syntax) = line.strip_prefix("syntax:") {
            match syntax.trim() {
                "re" | "regexp" => is_regex = true,
                "glob" => is_regex = false,
                other => debug!("{source_name}: unknown syntax {other}, keeping current"),
            }
            continue;
        }

        if is_regex {
            match Regex::new(line) {
                Ok(re) => rules.push(IgnoreRule::Regex(re)),
                Err(e) => skipped.push(rule_error(source_name, line, e)),
            }
        } else {
            match cache.compile(line, false) {
                Ok(g) => rules.push(IgnoreRule::Glob(g)),
                Err(e) => skipped.push(rule_error(source_name, line, e)),
            }
        }
    }

    (rules, skipped)
}
