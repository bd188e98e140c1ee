use crate::errors::{Error, Result};
use crate::output_formatter::OutputFormat;
use crate::patterns::PatternOptions;
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Name of the per-directory defaults file.
pub const LOCAL_CONFIG_NAME: &str = ".grr.yaml";

/// Everything a run needs to know, built once at startup and handed to each
/// component by reference.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// The search expression.
    pub pattern: String,
    pub ignore_case: bool,
    pub plain_text: bool,
    pub single_line: bool,
    /// Report file names only, without lines.
    pub filename_only: bool,
    /// Replacement template. `Some` switches the run to replace mode.
    pub replacement: Option<String>,
    /// Allow replacements in binary files.
    pub force: bool,
    /// Do not look for `.gitignore`/`.hgignore`.
    pub no_autoignore: bool,
    /// Extra regexes of paths to skip.
    pub exclude: Vec<String>,
    /// Globs of the only files to search. Empty means all files.
    pub only: Vec<String>,
    pub no_colors: bool,
    pub format: OutputFormat,
    /// Worker threads for scanning. `None` means one per CPU.
    pub workers: Option<usize>,
    pub verbose: bool,
    /// Directory to walk.
    pub root: PathBuf,
}

impl RunConfig {
    /// A configuration with every option at its default.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ignore_case: false,
            plain_text: false,
            single_line: false,
            filename_only: false,
            replacement: None,
            force: false,
            no_autoignore: false,
            exclude: Vec::new(),
            only: Vec::new(),
            no_colors: false,
            format: OutputFormat::Text,
            workers: None,
            verbose: false,
            root: PathBuf::from("."),
        }
    }

    /// Rejects option combinations that would silently produce wrong results.
    pub fn validate(&self) -> Result<()> {
        if self.replacement.is_some() {
            if self.single_line {
                return Err(Error::UnsupportedCombination(
                    "can't handle singleline replacements",
                ));
            }
            if self.plain_text {
                return Err(Error::UnsupportedCombination(
                    "can't handle plain text replacements",
                ));
            }
        }
        if self.workers == Some(0) {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn pattern_options(&self) -> PatternOptions {
        PatternOptions {
            ignore_case: self.ignore_case,
            plain_text: self.plain_text,
            single_line: self.single_line,
        }
    }

    /// Number of worker threads to scan with.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Layers a defaults file underneath the command-line options: lists are
    /// concatenated, flags are OR-ed, an explicit worker count wins.
    pub fn merge_defaults(&mut self, defaults: Defaults) {
        let mut exclude = defaults.exclude;
        exclude.append(&mut self.exclude);
        self.exclude = exclude;

        let mut only = defaults.only;
        only.append(&mut self.only);
        self.only = only;

        self.ignore_case |= defaults.ignore_case;
        self.no_colors |= defaults.no_colors;
        self.no_autoignore |= defaults.no_autoignore;
        if self.workers.is_none() {
            self.workers = defaults.workers;
        }
    }
}

/// Defaults read from a YAML file.
///
/// ```yaml
/// exclude: ['\.min\.js$']
/// only: ['*.rs', '*.toml']
/// ignore_case: false
/// no_colors: true
/// workers: 4
/// ```
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
pub struct Defaults {
    pub exclude: Vec<String>,
    pub only: Vec<String>,
    pub ignore_case: bool,
    pub no_colors: bool,
    pub no_autoignore: bool,
    pub workers: Option<usize>,
}

/// A utility for locating and loading the defaults file.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Finds the defaults file.
    ///
    /// The search order is:
    /// 1. `explicit`, which must exist when given.
    /// 2. `.grr.yaml` in `working_dir`.
    /// 3. `grr/config.yaml` under the user's configuration directory.
    ///
    /// Returns `Ok(None)` when no defaults file is present.
    pub fn find_config(explicit: Option<&Path>, working_dir: &Path) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.is_file() {
                return Ok(Some(path.to_path_buf()));
            }
            let in_working_dir = working_dir.join(path);
            if in_working_dir.is_file() {
                return Ok(Some(in_working_dir));
            }
            return Err(format!(
                "Config file '{}' not found. Searched in:\n  - {}\n  - {}",
                path.display(),
                path.display(),
                in_working_dir.display()
            )
            .into());
        }

        let local = working_dir.join(LOCAL_CONFIG_NAME);
        if local.is_file() {
            return Ok(Some(local));
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user = config_dir.join("grr").join("config.yaml");
            if user.is_file() {
                return Ok(Some(user));
            }
        }

        Ok(None)
    }

    /// Loads `Defaults` from a YAML file.
    pub fn load_defaults(path: &Path) -> Result<Defaults> {
        let file = File::open(path)?;
        Ok(serde_yaml::from_reader(file)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_replace_combinations_rejected() {
        let mut cfg = RunConfig::new("foo");
        cfg.replacement = Some("bar".into());
        assert!(cfg.validate().is_ok());

        cfg.single_line = true;
        assert!(matches!(cfg.validate(), Err(Error::UnsupportedCombination(_))));

        cfg.single_line = false;
        cfg.plain_text = true;
        assert!(matches!(cfg.validate(), Err(Error::UnsupportedCombination(_))));

        // searching is fine in both modes
        cfg.replacement = None;
        cfg.single_line = true;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut cfg = RunConfig::new("foo");
        cfg.workers = Some(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_merge_defaults() {
        let mut cfg = RunConfig::new("foo");
        cfg.exclude = vec!["cli".into()];
        cfg.workers = Some(2);

        cfg.merge_defaults(Defaults {
            exclude: vec!["file".into()],
            only: vec!["*.rs".into()],
            no_colors: true,
            workers: Some(8),
            ..Default::default()
        });

        assert_eq!(cfg.exclude, vec!["file".to_string(), "cli".to_string()]);
        assert_eq!(cfg.only, vec!["*.rs".to_string()]);
        assert!(cfg.no_colors);
        assert!(!cfg.ignore_case);
        assert_eq!(cfg.workers, Some(2));
    }

    #[test]
    fn test_load_defaults_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(LOCAL_CONFIG_NAME);
        fs::write(&path, "exclude: ['\\.min\\.js$']\nignore_case: true\n").unwrap();

        let found = ConfigLoader::find_config(None, dir.path()).unwrap();
        assert_eq!(found.as_deref(), Some(path.as_path()));

        let defaults = ConfigLoader::load_defaults(&path).unwrap();
        assert_eq!(defaults.exclude, vec![r"\.min\.js$".to_string()]);
        assert!(defaults.ignore_case);
        assert!(defaults.only.is_empty());
        assert_eq!(defaults.workers, None);
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = Path::new("nope.yaml");
        assert!(ConfigLoader::find_config(Some(missing), dir.path()).is_err());
    }

    #[test]
    fn test_bad_yaml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(&path, "exclude: [unterminated\n").unwrap();
        assert!(matches!(
            ConfigLoader::load_defaults(&path),
            Err(Error::Yaml(_))
        ));
    }
}
