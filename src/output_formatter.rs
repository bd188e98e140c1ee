use crate::config::RunConfig;
use crate::errors::Result;
use crate::scanner::{FileMatches, Match};
use colored::Colorize;
use serde::Serialize;
use std::io::Write;
use std::ops::Range;
use std::path::Path;

/// Defines the possible output formats for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text, optionally colored.
    Text,
    /// One JSON object per line, suitable for machine processing.
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

/// One reported event in JSON-lines output.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Event<'a> {
    Match {
        path: &'a str,
        line: usize,
        text: &'a str,
        spans: Vec<[usize; 2]>,
    },
    Binary {
        path: &'a str,
    },
    File {
        path: &'a str,
    },
    Replace {
        path: &'a str,
        changes: usize,
    },
    Summary {
        changes: usize,
        files: usize,
    },
}

/// Renders search and replace results.
pub struct OutputFormatter {
    format: OutputFormat,
    colors: bool,
    filename_only: bool,
    // Set after a file's lines were printed, so the next file starts after
    // a blank line and the output does not end with one.
    separate_next: bool,
}

impl OutputFormatter {
    /// Creates a new `OutputFormatter`.
    ///
    /// # Arguments
    ///
    /// * `format` - The `OutputFormat` to use.
    /// * `colors` - Whether text output is highlighted with ANSI colors.
    /// * `filename_only` - Print only the names of matching files.
    pub fn new(format: OutputFormat, colors: bool, filename_only: bool) -> Self {
        Self {
            format,
            colors,
            filename_only,
            separate_next: false,
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.format, !config.no_colors, config.filename_only)
    }

    /// Writes the matches found in one file.
    pub fn write_matches<W: Write>(&mut self, writer: &mut W, found: &FileMatches) -> Result<()> {
        let path = found.file_path.display().to_string();
        match self.format {
            OutputFormat::Text => self.text_matches(writer, &path, found),
            OutputFormat::Json => self.json_matches(writer, &path, found),
        }
    }

    fn text_matches<W: Write>(
        &mut self,
        writer: &mut W,
        path: &str,
        found: &FileMatches,
    ) -> Result<()> {
        if self.filename_only {
            writeln!(writer, "{}", self.paint_path(path))?;
            return Ok(());
        }

        if self.separate_next {
            writeln!(writer)?;
        }
        self.separate_next = true;

        if found.is_binary {
            writeln!(writer, "Binary file {path} matches")?;
            return Ok(());
        }

        writeln!(writer, "{}", self.paint_path(path))?;
        for m in &found.matches {
            let number = format!("{}:", m.line_number);
            let number = if self.colors {
                number.bold().yellow().to_string()
            } else {
                number
            };
            writeln!(writer, "{}{}", number, self.highlight(m))?;
        }
        Ok(())
    }

    fn json_matches<W: Write>(&mut self, writer: &mut W, path: &str, found: &FileMatches) -> Result<()> {
        if self.filename_only {
            return write_event(writer, &Event::File { path });
        }
        if found.is_binary {
            return write_event(writer, &Event::Binary { path });
        }

        for m in &found.matches {
            let text = String::from_utf8_lossy(&m.line_content);
            write_event(
                writer,
                &Event::Match {
                    path,
                    line: m.line_number,
                    text: &text,
                    spans: m.spans.iter().map(|s| [s.start, s.end]).collect(),
                },
            )?;
        }
        Ok(())
    }

    /// Writes the result of rewriting one file.
    pub fn write_replacement<W: Write>(
        &mut self,
        writer: &mut W,
        path: &Path,
        changes: usize,
    ) -> Result<()> {
        let path = path.display().to_string();
        match self.format {
            OutputFormat::Text => {
                let count = format!(" - {} change{} made", changes, plural(changes));
                let count = if self.colors {
                    count.bold().yellow().to_string()
                } else {
                    count
                };
                writeln!(writer, "{}{}", self.paint_path(&path), count)?;
                Ok(())
            }
            OutputFormat::Json => write_event(writer, &Event::Replace { path: &path, changes }),
        }
    }

    /// Writes the closing summary of a replace run.
    pub fn write_summary<W: Write>(&mut self, writer: &mut W, changes: usize, files: usize) -> Result<()> {
        match self.format {
            OutputFormat::Text => {
                writeln!(
                    writer,
                    "{} change{} made in {} file{}",
                    changes,
                    plural(changes),
                    files,
                    plural(files)
                )?;
                Ok(())
            }
            OutputFormat::Json => write_event(writer, &Event::Summary { changes, files }),
        }
    }

    fn paint_path(&self, path: &str) -> String {
        if self.colors {
            path.green().to_string()
        } else {
            path.to_string()
        }
    }

    /// Renders a line with every match span highlighted.
    fn highlight(&self, m: &Match) -> String {
        if !self.colors {
            return String::from_utf8_lossy(&m.line_content).into_owned();
        }

        let line = &m.line_content;
        let mut out = String::with_capacity(line.len() + m.spans.len() * 16);
        let mut last = 0;
        for Range { start, end } in m.spans.iter().cloned() {
            if start < last || end > line.len() {
                continue;
            }
            out.push_str(&String::from_utf8_lossy(&line[last..start]));
            let matched = String::from_utf8_lossy(&line[start..end]);
            out.push_str(&matched.black().on_yellow().to_string());
            last = end;
        }
        out.push_str(&String::from_utf8_lossy(&line[last..]));
        out
    }
}

fn write_event<W: Write>(writer: &mut W, event: &Event<'_>) -> Result<()> {
    serde_json::to_writer(&mut *writer, event)?;
    writeln!(writer)?;
    Ok(())
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn found(binary: bool) -> FileMatches {
        FileMatches {
            file_path: PathBuf::from("src/lib.rs"),
            is_binary: binary,
            matches: vec![
                Match {
                    line_number: 3,
                    line_content: b"let foo = foo();".to_vec(),
                    spans: vec![4..7, 10..13],
                },
                Match {
                    line_number: 9,
                    line_content: b"foo".to_vec(),
                    spans: vec![0..3],
                },
            ],
        }
    }

    fn render(formatter: &mut OutputFormatter, files: &[FileMatches]) -> String {
        let mut out = Vec::new();
        for f in files {
            formatter.write_matches(&mut out, f).unwrap();
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::from("text"), OutputFormat::Text);
        assert_eq!(OutputFormat::from("anything"), OutputFormat::Text);
    }

    #[test]
    fn test_plain_text() {
        let mut f = OutputFormatter::new(OutputFormat::Text, false, false);
        let out = render(&mut f, &[found(false), found(true)]);
        assert_eq!(
            out,
            "src/lib.rs\n3:let foo = foo();\n9:foo\n\nBinary file src/lib.rs matches\n"
        );
    }

    #[test]
    fn test_filename_only() {
        let mut f = OutputFormatter::new(OutputFormat::Text, false, true);
        let out = render(&mut f, &[found(false), found(true)]);
        assert_eq!(out, "src/lib.rs\nsrc/lib.rs\n");
    }

    #[test]
    fn test_colored_highlight_keeps_text() {
        colored::control::set_override(true);
        let f = OutputFormatter::new(OutputFormat::Text, true, false);
        let line = f.highlight(&found(false).matches[0]);
        assert!(line.contains("\x1b["));
        assert!(line.starts_with("let "));
        assert!(line.ends_with("();"));
    }

    #[test]
    fn test_json_lines() {
        let mut f = OutputFormatter::new(OutputFormat::Json, true, false);
        let out = render(&mut f, &[found(false)]);
        let events: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["type"], "match");
        assert_eq!(events[0]["line"], 3);
        assert_eq!(events[0]["spans"][1][0], 10);
        assert_eq!(events[1]["text"], "foo");

        let out = render(&mut f, &[found(true)]);
        assert_eq!(out, "{\"type\":\"binary\",\"path\":\"src/lib.rs\"}\n");
    }

    #[test]
    fn test_replacement_and_summary() {
        let mut f = OutputFormatter::new(OutputFormat::Text, false, false);
        let mut out = Vec::new();
        f.write_replacement(&mut out, Path::new("a.txt"), 1).unwrap();
        f.write_replacement(&mut out, Path::new("b.txt"), 4).unwrap();
        f.write_summary(&mut out, 5, 2).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "a.txt - 1 change made\nb.txt - 4 changes made\n5 changes made in 2 files\n"
        );

        let mut json = OutputFormatter::new(OutputFormat::Json, false, false);
        let mut out = Vec::new();
        json.write_summary(&mut out, 0, 0).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"type\":\"summary\",\"changes\":0,\"files\":0}\n"
        );
    }
}
