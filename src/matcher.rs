//! Ignore and accept predicates over relative paths.
//!
//! A [`Matcher`] answers "should this path be skipped?". Which rules it holds
//! depends on the repository the working directory lives in: the nearest
//! ancestor with a `.git` or `.hg` directory supplies its ignore file, and
//! outside any repository a built-in list of common junk is used.

use crate::errors::Error;
use crate::glob::{Glob, GlobCache};
use crate::ignore_file::{IgnoreFile, IgnoreRule, IgnoreSyntax, PathQuery};
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directories skipped when no repository is found.
pub const GENERAL_DIRS: &[&str] = &[
    "autom4te.cache",
    "blib",
    "_build",
    ".bzr",
    ".cdv",
    "cover_db",
    "CVS",
    "_darcs",
    "~.dep",
    "~.dot",
    ".git",
    ".hg",
    "~.nib",
    ".pc",
    "~.plst",
    "RCS",
    "SCCS",
    "_sgbak",
    ".svn",
    "_obj",
];

/// File patterns skipped when no repository is found: backups, editor swap
/// files, core dumps and object files.
pub const GENERAL_PATTERNS: &[&str] = &[
    r"~$",
    r"#.+#$",
    r"[._].*\.swp$",
    r"core\.[0-9]+$",
    r"\.pyc$",
    r"\.o$",
    r"\.6$",
];

/// Rules read from a repository's ignore file.
#[derive(Debug)]
pub struct RepoRules {
    ignore_file: PathBuf,
    prefix: String,
    rules: Vec<IgnoreRule>,
    exclude: Vec<Regex>,
}

impl RepoRules {
    fn from_file(file: IgnoreFile) -> Self {
        Self {
            ignore_file: file.path,
            prefix: file.prefix,
            rules: file.rules,
            exclude: Vec::new(),
        }
    }
}

/// The ignore predicate for a run.
#[derive(Debug)]
pub enum Matcher {
    /// Built-in rules, used outside any repository or with `--no-autoignore`.
    General {
        rules: Vec<IgnoreRule>,
        exclude: Vec<Regex>,
    },
    /// Rules from the repository's `.gitignore`.
    Git(RepoRules),
    /// Rules from the repository's `.hgignore`.
    Hg(RepoRules),
}

impl Matcher {
    /// Picks the matcher for `working_dir`, which must be absolute.
    ///
    /// Walks up from `working_dir` until a directory holding `.git` or `.hg`
    /// is found; with `no_autoignore` set, or at the filesystem root, the
    /// general matcher is used.
    pub fn discover(working_dir: &Path, no_autoignore: bool, cache: &mut GlobCache) -> Self {
        if no_autoignore {
            return Self::general();
        }

        for dir in working_dir.ancestors() {
            for syntax in [IgnoreSyntax::Hg, IgnoreSyntax::Git] {
                if !dir.join(syntax.marker()).is_dir() {
                    continue;
                }
                let file = IgnoreFile::load(
                    &dir.join(syntax.file_name()),
                    syntax,
                    working_dir,
                    cache,
                );
                debug!(
                    "found {} in {}, prefix {:?}",
                    syntax.marker(),
                    dir.display(),
                    file.prefix
                );
                let rules = RepoRules::from_file(file);
                return match syntax {
                    IgnoreSyntax::Git => Matcher::Git(rules),
                    IgnoreSyntax::Hg => Matcher::Hg(rules),
                };
            }
        }

        Self::general()
    }

    /// The built-in matcher.
    pub fn general() -> Self {
        let mut rules: Vec<IgnoreRule> = GENERAL_DIRS
            .iter()
            .map(|d| IgnoreRule::DirName(d.to_string()))
            .collect();
        for pattern in GENERAL_PATTERNS {
            match Regex::new(pattern) {
                Ok(re) => rules.push(IgnoreRule::Regex(re)),
                Err(e) => warn!("built-in pattern {pattern} failed to compile: {e}"),
            }
        }
        Matcher::General {
            rules,
            exclude: Vec::new(),
        }
    }

    /// Adds user-supplied exclude patterns. They are always regular
    /// expressions, whatever the variant, and are tested against the path
    /// relative to the working directory, not the re-rooted one. Patterns
    /// that fail to compile are dropped and returned.
    pub fn append<S: AsRef<str>>(&mut self, patterns: &[S]) -> Vec<Error> {
        let mut errors = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            match Regex::new(pattern) {
                Ok(re) => self.exclude_mut().push(re),
                Err(e) => {
                    let err = Error::IgnoreRule {
                        source_name: "--exclude".to_string(),
                        pattern: pattern.to_string(),
                        reason: e.to_string(),
                    };
                    warn!("{err}");
                    errors.push(err);
                }
            }
        }
        errors
    }

    /// Whether `path` (relative to the working directory) is ignored.
    pub fn is_match(&self, path: &str, is_dir: bool) -> bool {
        let path = normalize(path);
        if path.is_empty() {
            return false;
        }
        if self.exclude().iter().any(|re| re.is_match(path)) {
            return true;
        }

        let prefix = self.prefix();
        let rerooted;
        let path = if prefix.is_empty() {
            path
        } else {
            rerooted = format!("{prefix}/{path}");
            rerooted.as_str()
        };

        let query = PathQuery::new(path, is_dir);
        self.rules().iter().any(|rule| rule.is_match(&query))
    }

    pub fn rules(&self) -> &[IgnoreRule] {
        match self {
            Matcher::General { rules, .. } => rules,
            Matcher::Git(repo) | Matcher::Hg(repo) => &repo.rules,
        }
    }

    /// The user's exclude patterns.
    pub fn exclude(&self) -> &[Regex] {
        match self {
            Matcher::General { exclude, .. } => exclude,
            Matcher::Git(repo) | Matcher::Hg(repo) => &repo.exclude,
        }
    }

    fn exclude_mut(&mut self) -> &mut Vec<Regex> {
        match self {
            Matcher::General { exclude, .. } => exclude,
            Matcher::Git(repo) | Matcher::Hg(repo) => &mut repo.exclude,
        }
    }

    /// Working directory relative to the ignore file's directory.
    pub fn prefix(&self) -> &str {
        match self {
            Matcher::General { .. } => "",
            Matcher::Git(repo) | Matcher::Hg(repo) => &repo.prefix,
        }
    }

    /// The ignore file the rules came from, if any.
    pub fn ignore_file(&self) -> Option<&Path> {
        match self {
            Matcher::General { .. } => None,
            Matcher::Git(repo) | Matcher::Hg(repo) => Some(&repo.ignore_file),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ignore_file() {
            None => writeln!(f, "General ignorer")?,
            Some(source) => {
                writeln!(f, "Ignoring patterns from {}:", source.display())?;
                if !self.prefix().is_empty() {
                    writeln!(f, "\tprefix: {}", self.prefix())?;
                }
            }
        }
        describe(f, self.rules())?;

        if !self.exclude().is_empty() {
            let listed: Vec<&str> = self.exclude().iter().map(Regex::as_str).collect();
            writeln!(f, "\texcludes: {}", listed.join(" "))?;
        }
        Ok(())
    }
}

fn describe(f: &mut fmt::Formatter<'_>, rules: &[IgnoreRule]) -> fmt::Result {
    let groups: [(&str, fn(&IgnoreRule) -> bool); 3] = [
        ("regular expressions", |r| matches!(r, IgnoreRule::Regex(_))),
        ("globs", |r| matches!(r, IgnoreRule::Glob(_))),
        ("dirs", |r| matches!(r, IgnoreRule::DirName(_))),
    ];

    for (label, wanted) in groups {
        let listed: Vec<String> = rules
            .iter()
            .filter(|r| wanted(r))
            .map(|r| r.to_string())
            .collect();
        if !listed.is_empty() {
            writeln!(f, "\t{label}: {}", listed.join(" "))?;
        }
    }
    Ok(())
}

fn normalize(path: &str) -> &str {
    let path = path.strip_prefix("./").unwrap_or(path);
    if path == "." { "" } else { path }
}

/// The positive filter: a file is searched only if it matches one of the
/// accept globs. Without globs every file is accepted.
#[derive(Debug, Default)]
pub struct Acceptor {
    globs: Option<Vec<Glob>>,
}

impl Acceptor {
    /// An acceptor that lets every file through.
    pub fn accept_all() -> Self {
        Self { globs: None }
    }

    /// Builds an acceptor from `--only` globs. Globs that fail to compile are
    /// dropped and returned; the filter stays active even if all of them fail.
    pub fn new<S: AsRef<str>>(globs: &[S], cache: &mut GlobCache) -> (Self, Vec<Error>) {
        if globs.is_empty() {
            return (Self::accept_all(), Vec::new());
        }

        let mut compiled = Vec::with_capacity(globs.len());
        let mut errors = Vec::new();
        for glob in globs {
            let glob = glob.as_ref();
            match cache.compile_auto(glob) {
                Ok(g) => compiled.push(g),
                Err(e) => {
                    let err = Error::IgnoreRule {
                        source_name: "--only".to_string(),
                        pattern: glob.to_string(),
                        reason: e.to_string(),
                    };
                    warn!("{err}");
                    errors.push(err);
                }
            }
        }
        (Self { globs: Some(compiled) }, errors)
    }

    pub fn accepts(&self, path: &str) -> bool {
        match &self.globs {
            None => true,
            Some(globs) => {
                let path = normalize(path);
                globs.iter().any(|g| g.is_match(path))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_general_matcher() {
        let m = Matcher::general();
        assert!(m.is_match(".svn", true));
        assert!(m.is_match("./vendor/CVS", true));
        assert!(m.is_match("src/module.pyc", false));
        assert!(m.is_match("notes.txt~", false));
        assert!(m.is_match(".main.rs.swp", false));
        assert!(m.is_match("#scratch#", false));
        assert!(m.is_match("core.1234", false));
        assert!(!m.is_match("src/main.rs", false));
        assert!(!m.is_match("src", true));
        assert!(!m.is_match(".", true));
    }

    #[test]
    fn test_append_user_patterns() {
        let mut m = Matcher::general();
        let errors = m.append(&["\\.lock$", "(broken"]);
        assert_eq!(errors.len(), 1);
        assert!(m.is_match("Cargo.lock", false));
        assert!(!m.is_match("Cargo.toml", false));
    }

    #[test]
    fn test_discover_git_from_subdirectory() {
        let repo = TempDir::new().unwrap();
        let root = repo.path();
        fs::create_dir(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("src/gen")).unwrap();
        fs::write(root.join(".gitignore"), "/src/gen/\n*.tmp\n").unwrap();

        let mut cache = GlobCache::new();
        let m = Matcher::discover(&root.join("src"), false, &mut cache);
        assert!(matches!(m, Matcher::Git(_)));
        assert_eq!(m.prefix(), "src");

        // The rooted rule is written relative to the repository root, the
        // queries are relative to src/.
        assert!(m.is_match("gen", true));
        assert!(m.is_match("gen/x.rs", false));
        assert!(!m.is_match("lib.rs", false));
        assert!(m.is_match("a/b.tmp", false));
        assert!(m.is_match(".git", true));
    }

    #[test]
    fn test_excludes_ignore_prefix() {
        let repo = TempDir::new().unwrap();
        let root = repo.path();
        fs::create_dir(root.join(".git")).unwrap();
        fs::create_dir(root.join("src")).unwrap();

        let mut cache = GlobCache::new();
        let mut m = Matcher::discover(&root.join("src"), false, &mut cache);
        assert_eq!(m.prefix(), "src");
        assert!(m.append(&["^lib"]).is_empty());

        // Exclude patterns are relative to where the search starts.
        assert!(m.is_match("lib.rs", false));
        assert!(m.is_match("lib", true));
        assert!(!m.is_match("main.rs", false));
        assert!(!m.is_match("sub/lib.rs", false));
        assert!(m.to_string().contains("excludes: ^lib"));
    }

    #[test]
    fn test_discover_hg_from_subdirectory() {
        let repo = TempDir::new().unwrap();
        let root = repo.path();
        fs::create_dir(root.join(".hg")).unwrap();
        fs::create_dir_all(root.join("src/gen")).unwrap();
        fs::write(root.join(".hgignore"), "^src/gen/\n").unwrap();

        let mut cache = GlobCache::new();
        let m = Matcher::discover(&root.join("src"), false, &mut cache);
        assert!(matches!(m, Matcher::Hg(_)));
        assert_eq!(m.prefix(), "src");
        assert!(m.is_match("gen/x", false));
        assert!(m.is_match("gen/deep/y.rs", false));
        assert!(!m.is_match("gen", false));
        assert!(!m.is_match("lib.rs", false));
    }

    #[test]
    fn test_hg_wins_over_git_in_same_directory() {
        let repo = TempDir::new().unwrap();
        let root = repo.path();
        fs::create_dir(root.join(".git")).unwrap();
        fs::create_dir(root.join(".hg")).unwrap();
        fs::write(root.join(".gitignore"), "*.git-only\n").unwrap();
        fs::write(root.join(".hgignore"), "\\.hg-only$\n").unwrap();

        let mut cache = GlobCache::new();
        let m = Matcher::discover(root, false, &mut cache);
        assert!(matches!(m, Matcher::Hg(_)));
        assert!(m.is_match("a.hg-only", false));
        assert!(!m.is_match("a.git-only", false));
    }

    #[test]
    fn test_discover_hg() {
        let repo = TempDir::new().unwrap();
        let root = repo.path();
        fs::create_dir(root.join(".hg")).unwrap();
        fs::write(root.join(".hgignore"), "^build/\nsyntax: glob\n*.orig\n").unwrap();

        let mut cache = GlobCache::new();
        let m = Matcher::discover(root, false, &mut cache);
        assert!(matches!(m, Matcher::Hg(_)));
        assert!(m.is_match("build/out", false));
        assert!(m.is_match("a.c.orig", false));
        assert!(m.is_match(".hg", true));
        assert!(!m.is_match("src/build.rs", false));
    }

    #[test]
    fn test_no_autoignore_forces_general() {
        let repo = TempDir::new().unwrap();
        fs::create_dir(repo.path().join(".git")).unwrap();
        fs::write(repo.path().join(".gitignore"), "*.txt\n").unwrap();

        let mut cache = GlobCache::new();
        let m = Matcher::discover(repo.path(), true, &mut cache);
        assert!(matches!(m, Matcher::General { .. }));
        assert!(!m.is_match("a.txt", false));
    }

    #[test]
    fn test_description() {
        let repo = TempDir::new().unwrap();
        fs::create_dir(repo.path().join(".git")).unwrap();
        fs::write(repo.path().join(".gitignore"), "*.log\ntarget/\n").unwrap();

        let mut cache = GlobCache::new();
        let m = Matcher::discover(repo.path(), false, &mut cache);
        let text = m.to_string();
        assert!(text.starts_with("Ignoring patterns from"));
        assert!(text.contains("globs: *.log"));
        assert!(text.contains("dirs: .git/ target/"));

        assert!(Matcher::general().to_string().starts_with("General ignorer"));
    }

    #[test]
    fn test_acceptor() {
        let mut cache = GlobCache::new();
        assert!(Acceptor::accept_all().accepts("anything.bin"));

        let (only, errors) = Acceptor::new(&["*.rs", "docs/*.md"], &mut cache);
        assert!(errors.is_empty());
        assert!(only.accepts("./src/lib.rs"));
        assert!(only.accepts("docs/intro.md"));
        assert!(!only.accepts("src/docs/intro.md"));
        assert!(!only.accepts("README.md"));

        let (broken, errors) = Acceptor::new(&["[z-a]"], &mut cache);
        assert_eq!(errors.len(), 1);
        assert!(!broken.accepts("main.rs"));
    }
}
