use crate::errors::{Error, Result};
use regex::bytes::Regex;

/// Flags that change how the search expression is compiled and applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternOptions {
    /// Match regardless of case.
    pub ignore_case: bool,
    /// Treat the expression as literal text.
    pub plain_text: bool,
    /// Evaluate `^`/`$` against each line instead of the whole file.
    pub single_line: bool,
}

/// The compiled search expression for a run.
///
/// Built once from the user's input and shared read-only by every scan and
/// replacement. Works on raw bytes so files need not be valid UTF-8.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
    options: PatternOptions,
}

impl Pattern {
    /// Compiles `expr` with the given options.
    ///
    /// Fails when the expression is invalid or when it matches the empty
    /// string, since such a pattern would match every position of every file.
    pub fn new(expr: &str, options: PatternOptions) -> Result<Self> {
        let mut source = if options.plain_text {
            regex::escape(expr)
        } else {
            expr.to_string()
        };
        if options.ignore_case {
            source = format!("(?i:{source})");
        }

        let regex = Regex::new(&source)?;
        if regex.is_match(b"") {
            return Err(Error::Config("Your pattern matches empty string".to_string()));
        }

        Ok(Self { regex, options })
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn options(&self) -> PatternOptions {
        self.options
    }

    pub fn is_match(&self, haystack: &[u8]) -> bool {
        self.regex.is_match(haystack)
    }
}
