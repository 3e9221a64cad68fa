//! Human-readable record of a run: a header describing the configuration, then one entry
//! per segment with the dialog and the prompt it produced.

use anyhow::Context;
use chrono::{DateTime, Local};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::episode::Excerpt;
use crate::error::Result;
use crate::strategy::{PromptDecoration, Strategy};

/// Everything the header records about a run.
#[derive(Debug, Clone)]
pub struct LogHeader<'a> {
    pub run_id: Uuid,
    pub strategy: Strategy,
    pub decoration: &'a PromptDecoration,
    pub setup: Option<&'a str>,
    pub source_id: &'a str,
    pub excerpt: Excerpt,
    pub seed: u32,
}

/// One generated segment.
#[derive(Debug, Clone)]
pub struct LogEntry<'a> {
    /// Position in the source, in seconds.
    pub time: f64,
    pub wall_clock: DateTime<Local>,
    pub dialog: &'a str,
    pub text_prompt: &'a str,
    pub progress: &'a str,
}

pub struct RunLog {
    path: PathBuf,
    file: File,
}

impl RunLog {
    /// Start a fresh log at `path`, discarding any previous content.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create dir: {}", dir.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .with_context(|| format!("failed to open run log: {}", path.display()))?;

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&mut self, header: &LogHeader<'_>) -> Result<()> {
        let end = header
            .excerpt
            .end
            .map_or_else(|| "end".to_string(), |e| e.to_string());

        let mut text = String::new();
        text.push_str(&"#".repeat(80));
        text.push('\n');
        text.push_str(&format!("# {}\n", header.strategy));
        for line in header.strategy.description().lines() {
            text.push_str(&format!("# {line}\n"));
        }
        text.push_str("#\n");
        text.push_str(&format!("# Source: {}\n", header.source_id));
        text.push_str(&format!("# From {} to {end}\n", header.excerpt.start));
        text.push_str(&format!("# Seed: {}\n", header.seed));
        text.push_str(&format!("# Run: {}\n", header.run_id));
        text.push_str(&"#".repeat(80));
        text.push('\n');
        text.push_str(&format!("{}\n", header.decoration));
        if let Some(setup) = header.setup {
            text.push_str(&format!("setup: {setup}\n"));
        }
        text.push('\n');

        self.write(&text)
    }

    pub fn entry(&mut self, entry: &LogEntry<'_>) -> Result<()> {
        let text = format!(
            "time: {}\nwall_clock: {}\ndialog:\n {}\ntext_prompt:\n {}\nprogress: {}\n\n\n",
            format_clock(entry.time),
            entry.wall_clock.format("%Y-%m-%d %H:%M:%S"),
            entry.dialog,
            entry.text_prompt,
            entry.progress,
        );
        self.write(&text)
    }

    fn write(&mut self, text: &str) -> Result<()> {
        self.file
            .write_all(text.as_bytes())
            .and_then(|()| self.file.flush())
            .with_context(|| format!("failed to write run log: {}", self.path.display()))?;
        Ok(())
    }
}

/// `H:MM:SS` (whole seconds).
pub fn format_clock(secs: f64) -> String {
    let secs = secs.max(0.0) as u64;
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
