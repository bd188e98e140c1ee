use crate::config::RunConfig;
use crate::output_formatter::OutputFormat;
use clap::{Arg, ArgAction, Command, CommandFactory, FromArgMatches, Parser};
use std::path::PathBuf;

/// Search and replace recursively, respecting VCS ignore files.
///
/// `grr` walks the current directory, skips whatever the nearest
/// `.gitignore`/`.hgignore` (or a built-in list of junk) excludes, and prints
/// every line matching PATTERN. With `--replace` it rewrites the matches in
/// place instead.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Recursive search and replace that respects .gitignore/.hgignore",
    long_about = "grr - search (and replace) a regular expression through a directory tree.

Ignore rules come from the nearest ancestor directory holding .git or .hg;
outside a repository common VCS, editor and build artifacts are skipped.

EXAMPLES:
  grr 'fn \\w+_test'                  # Search for a regex
  grr -i -o '*.rs' todo               # Case-insensitive, Rust files only
  grr -x '\\.min\\.js$' console.log    # Skip minified files
  grr 'old_(\\w+)' -r 'new_$1'        # Replace, with capture groups
  grr --show-ignores x                # Print the ignore rules in effect"
)]
pub struct Args {
    /// The expression to search for.
    #[arg(required = true)]
    pub pattern: String,

    /// Ignore pattern case.
    #[arg(short, long)]
    pub ignore_case: bool,

    /// Print only the names of matching files.
    #[arg(short = 'n', long = "filename")]
    pub filename_only: bool,

    /// Exclude files matching this regular expression (repeatable).
    #[arg(short = 'x', long = "exclude", value_name = "RE")]
    pub exclude: Vec<String>,

    /// Search only files matching this glob (repeatable).
    #[arg(short = 'o', long = "only", value_name = "GLOB")]
    pub only: Vec<String>,

    /// Match on a single line (^/$ will be beginning/end of line).
    #[arg(short = 's', long = "singleline")]
    pub single_line: bool,

    /// Search plain text instead of a regular expression.
    #[arg(short = 'p', long = "plain")]
    pub plain_text: bool,

    /// Replace found substrings with this template (`$1` refers to groups).
    #[arg(short, long, value_name = "TEMPLATE")]
    pub replace: Option<String>,

    /// Force replacement in binary files.
    #[arg(long)]
    pub force: bool,

    /// Do not read .gitignore/.hgignore files.
    #[arg(short = 'I', long = "no-autoignore")]
    pub no_autoignore: bool,

    /// Do not colorize output.
    #[arg(short = 'c', long = "no-colors", env = "GRR_NO_COLORS")]
    pub no_colors: bool,

    /// The output format (`text` or `json`).
    #[arg(short = 'f', long = "format", default_value = "text")]
    pub format: String,

    /// The number of parallel worker threads to use. Defaults to the number of logical CPU cores.
    #[arg(short = 'w', long = "workers", env = "GRR_WORKERS")]
    pub workers: Option<usize>,

    /// Path to a YAML file with default options.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Report skipped files and other diagnostics.
    #[arg(long)]
    pub verbose: bool,

    /// Print the ignore rules in effect and exit.
    #[arg(long)]
    pub show_ignores: bool,
}

impl Args {
    /// Converts the parsed arguments into a run configuration rooted at the
    /// current directory.
    pub fn to_run_config(&self) -> RunConfig {
        let mut config = RunConfig::new(self.pattern.clone());
        config.ignore_case = self.ignore_case;
        config.plain_text = self.plain_text;
        config.single_line = self.single_line;
        config.filename_only = self.filename_only;
        config.replacement = self.replace.clone();
        config.force = self.force;
        config.no_autoignore = self.no_autoignore;
        config.exclude = self.exclude.clone();
        config.only = self.only.clone();
        config.no_colors = self.no_colors;
        config.format = OutputFormat::from(self.format.as_str());
        config.workers = self.workers;
        config.verbose = self.verbose;
        config
    }
}

/// The command definition, with `-v/--version` in place of clap's `-V`.
pub fn command() -> Command {
    Args::command().disable_version_flag(true).arg(
        Arg::new("version")
            .short('v')
            .long("version")
            .action(ArgAction::Version)
            .help("Print version"),
    )
}

/// Parses command-line arguments and returns the populated `Args` struct.
pub fn parse_args() -> Args {
    let matches = command().get_matches();
    Args::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
}
