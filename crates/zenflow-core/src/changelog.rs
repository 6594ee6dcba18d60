use std::io;
use std::path::PathBuf;

use chrono::NaiveDate;

use crate::version::Version;

/// Heading under which pending entries accumulate.
pub const UNRELEASED_HEADING: &str = "### Unreleased";

/// The repository changelog: a pending section of bullet entries on top of
/// dated release sections.
#[derive(Debug)]
pub struct Changelog {
    path: PathBuf,
}

impl Changelog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> io::Result<String> {
        if !self.path.exists() {
            return Ok(String::new());
        }
        std::fs::read_to_string(&self.path)
    }

    fn save(&self, lines: Vec<String>) -> io::Result<()> {
        std::fs::write(&self.path, lines.join("\n") + "\n")
    }

    /// Adds a bullet entry at the top of the pending section, creating the
    /// section (and the file) when missing.
    pub fn append(&self, entry: &str) -> io::Result<()> {
        let text = self.load()?;
        let mut lines: Vec<String> = text.lines().map(ToOwned::to_owned).collect();
        match lines.iter().position(|line| line == UNRELEASED_HEADING) {
            Some(heading) => lines.insert(heading + 1, format!("* {entry}")),
            None => {
                let mut fresh = vec![UNRELEASED_HEADING.to_string(), format!("* {entry}")];
                if !lines.is_empty() {
                    fresh.push(String::new());
                }
                fresh.extend(lines);
                lines = fresh;
            }
        }
        self.save(lines)
    }

    /// Retitles the pending section as a released one, stamped with the
    /// version (when the finishing flow bumps one) and the date, and opens a
    /// fresh pending section above it.
    pub fn rotate(&self, version: Option<&Version>, date: NaiveDate) -> io::Result<()> {
        let title = match version {
            Some(version) => format!("### {version} / {date}"),
            None => format!("### {date}"),
        };

        let text = self.load()?;
        let mut lines: Vec<String> = text.lines().map(ToOwned::to_owned).collect();
        match lines.iter().position(|line| line == UNRELEASED_HEADING) {
            Some(heading) => lines[heading] = title,
            None => {
                if !lines.is_empty() {
                    lines.insert(0, String::new());
                }
                lines.insert(0, title);
            }
        }

        let mut rotated = vec![UNRELEASED_HEADING.to_string(), String::new()];
        rotated.extend(lines);
        self.save(rotated)
    }
}
