//! Translation of ignore-file globs into regular expressions.
//!
//! Every glob is compiled into a regex that is tested against a *subject*:
//! the relative path with a `/` prepended (`src/foo.pyc` becomes
//! `/src/foo.pyc`). A rooted glob must match right after that leading `/`;
//! a basename glob may match after any `/`, which is what makes `*.pyc`
//! behave like a match on the last path component.

use crate::errors::Result;
use regex::Regex;
use std::collections::HashMap;

/// A compiled glob predicate.
#[derive(Debug, Clone)]
pub struct Glob {
    text: String,
    anchored: bool,
    regex: Regex,
}

impl Glob {
    /// The glob as it was written.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether the glob is rooted at the start of the path.
    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    /// Tests a relative path such as `src/foo.pyc`.
    pub fn is_match(&self, path: &str) -> bool {
        self.is_match_subject(&subject(path))
    }

    /// Tests a subject that already carries its leading `/`.
    pub fn is_match_subject(&self, subject: &str) -> bool {
        self.regex.is_match(subject)
    }
}

/// Builds the string a glob predicate is tested against.
pub fn subject(path: &str) -> String {
    let path = path.trim_start_matches("./").trim_start_matches('/');
    let mut s = String::with_capacity(path.len() + 1);
    s.push('/');
    s.push_str(path);
    s
}

/// A glob containing a path separator is rooted at the ignore file's directory.
pub fn is_rooted(glob: &str) -> bool {
    glob.contains('/')
}

/// Translates glob syntax into regex source.
///
/// - `*` matches a run of non-separator characters, except as the final
///   character of the glob where it matches anything (like `.*`).
/// - `?` matches any single character, the separator included.
/// - `[...]` is a character class; a leading `!` negates it, a leading `^`
///   is literal, and a `[` with no closing `]` is a literal `[`.
/// - A trailing `/` leaves the end of the expression open so the glob
///   also matches everything below that directory.
pub fn translate(glob: &str, anchored: bool) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let n = chars.len();
    let mut i = if anchored && chars.first() == Some(&'/') { 1 } else { 0 };

    let mut out = String::with_capacity(glob.len() * 2 + 4);
    out.push_str(if anchored { "^/" } else { "/" });

    let mut last_was_separator = false;
    while i < n {
        let c = chars[i];
        i += 1;
        last_was_separator = c == '/';

        match c {
            '*' if i == n => out.push_str(".*"),
            '*' => out.push_str("[^/]*"),
            '?' => out.push('.'),
            '[' => {
                let mut j = i;
                if j < n && chars[j] == '!' {
                    j += 1;
                }
                if j < n && chars[j] == ']' {
                    j += 1;
                }
                while j < n && chars[j] != ']' {
                    j += 1;
                }

                if j >= n {
                    out.push_str(r"\[");
                } else {
                    out.push('[');
                    push_class(&mut out, &chars[i..j]);
                    out.push(']');
                    i = j + 1;
                }
            }
            _ => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
            }
        }
    }

    if !last_was_separator {
        out.push('$');
    }
    out
}

/// Writes the inside of a bracket expression, keeping ranges intact and
/// escaping what the regex class syntax would otherwise interpret.
fn push_class(out: &mut String, class: &[char]) {
    for (idx, &c) in class.iter().enumerate() {
        match c {
            '!' if idx == 0 => out.push('^'),
            '^' if idx == 0 => out.push_str(r"\^"),
            '\\' => out.push_str(r"\\"),
            '[' | ']' | '&' | '~' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
}

/// Compiles globs into predicates, translating each distinct glob once.
///
/// Owned by the run that builds the matchers rather than living in a
/// global, so two runs never share state.
pub struct GlobCache {
    cache: HashMap<(String, bool), Regex>,
}

impl Default for GlobCache {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobCache {
    /// Creates a new, empty `GlobCache`.
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    /// Compiles `glob`, rooted when `anchored` is set.
    pub fn compile(&mut self, glob: &str, anchored: bool) -> Result<Glob> {
        let key = (glob.to_string(), anchored);
        let regex = match self.cache.get(&key) {
            Some(regex) => regex.clone(),
            None => {
                let regex = Regex::new(&translate(glob, anchored))?;
                self.cache.insert(key, regex.clone());
                regex
            }
        };

        Ok(Glob {
            text: glob.to_string(),
            anchored,
            regex,
        })
    }

    /// Compiles `glob`, rooted if it contains a path separator.
    pub fn compile_auto(&mut self, glob: &str) -> Result<Glob> {
        self.compile(glob, is_rooted(glob))
    }

    /// Number of distinct globs translated so far.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glob(pattern: &str) -> Glob {
        GlobCache::new().compile_auto(pattern).unwrap()
    }

    #[test]
    fn test_basename_glob() {
        let g = glob("*.pyc");
        assert!(g.is_match("src/foo.pyc"));
        assert!(g.is_match("foo.pyc"));
        assert!(!g.is_match("src/foo.pyc.bak"));
        assert!(!g.is_match("src/foopyc"));
    }

    #[test]
    fn test_literal_basename() {
        let g = glob("Makefile");
        assert!(g.is_match("Makefile"));
        assert!(g.is_match("deep/nested/Makefile"));
        assert!(!g.is_match("deep/nested/NotMakefile"));
        assert!(!g.is_match("Makefile.in"));
    }

    #[test]
    fn test_star_does_not_cross_separator() {
        let g = glob("doc/*.txt");
        assert!(g.is_anchored());
        assert!(g.is_match("doc/a.txt"));
        assert!(!g.is_match("doc/sub/a.txt"));
        assert!(!g.is_match("other/doc/a.txt"));
    }

    #[test]
    fn test_trailing_star_crosses_separator() {
        let g = glob("build*");
        assert!(g.is_match("build"));
        assert!(g.is_match("build-out/x/y.o"));
        assert!(g.is_match("src/builder"));
    }

    #[test]
    fn test_question_mark_crosses_separator() {
        // `?` is looser than shell globbing: it also matches `/`.
        let g = glob("a?b");
        assert!(g.is_match("axb"));
        assert!(g.is_match("a/b"));
        assert!(!g.is_match("ab"));
    }

    #[test]
    fn test_character_classes() {
        let g = glob("*.[oa]");
        assert!(g.is_match("lib/x.o"));
        assert!(g.is_match("x.a"));
        assert!(!g.is_match("x.c"));

        let negated = glob("*.[!oa]");
        assert!(negated.is_match("x.c"));
        assert!(!negated.is_match("x.o"));

        let caret = glob("[^x]");
        assert!(caret.is_match("^"));
        assert!(caret.is_match("x"));
        assert!(!caret.is_match("y"));

        let range = glob("file[0-9]");
        assert!(range.is_match("file7"));
        assert!(!range.is_match("fileA"));
    }

    #[test]
    fn test_unterminated_bracket_is_literal() {
        assert_eq!(translate("foo[", false), r"/foo\[$");
        let g = glob("foo[");
        assert!(g.is_match("dir/foo["));
        assert!(!g.is_match("dir/foo"));

        let g = glob("[abc");
        assert!(g.is_match("[abc"));
    }

    #[test]
    fn test_bracket_metacharacters_are_escaped() {
        let g = glob("x[&[]");
        assert!(g.is_match("x&"));
        assert!(g.is_match("x["));
        assert!(!g.is_match("xa"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let g = glob("a+b(1).txt");
        assert!(g.is_match("a+b(1).txt"));
        assert!(!g.is_match("aab1.txt"));
    }

    #[test]
    fn test_rooted_leading_slash() {
        let g = glob("/target");
        assert!(g.is_match("target"));
        assert!(!g.is_match("crates/target"));
    }

    #[test]
    fn test_trailing_slash_leaves_end_open() {
        assert_eq!(translate("src/gen/", true), "^/src/gen/");
        let g = glob("src/gen/");
        assert!(g.is_match_subject("/src/gen/"));
        assert!(g.is_match("src/gen/out.rs"));
        assert!(!g.is_match("src/gen"));
    }

    #[test]
    fn test_invalid_class_is_an_error() {
        let mut cache = GlobCache::new();
        assert!(cache.compile("[z-a]", false).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_translates_once() {
        let mut cache = GlobCache::new();
        cache.compile("*.o", false).unwrap();
        cache.compile("*.o", false).unwrap();
        cache.compile("*.o", true).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_subject_strips_dot_prefix() {
        assert_eq!(subject("./src/a.rs"), "/src/a.rs");
        assert_eq!(subject("a.rs"), "/a.rs");
    }
}
