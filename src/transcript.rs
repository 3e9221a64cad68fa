//! Transcript entries and the sources that provide them.
//!
//! A transcript is an ordered list of dialog spans (`text`, `start`, `duration`). Fetching one
//! is usually a remote call, so we keep a directory cache keyed by source id in front of the
//! real source. The cache is invalidated as a whole, never per entry.

use std::fs;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One span of dialog. Times are in seconds from the start of the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

impl TranscriptEntry {
    pub fn new(text: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            text: text.into(),
            start,
            duration,
        }
    }

    /// End time of the span in seconds.
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Anything that can produce the transcript of a source.
///
/// Implementations should return entries ordered by start time.
pub trait TranscriptSource {
    fn fetch(&self, source_id: &str, language: &str) -> Result<Vec<TranscriptEntry>>;
}

impl<T: TranscriptSource + ?Sized> TranscriptSource for &T {
    fn fetch(&self, source_id: &str, language: &str) -> Result<Vec<TranscriptEntry>> {
        (**self).fetch(source_id, language)
    }
}

impl<T: TranscriptSource + ?Sized> TranscriptSource for Box<T> {
    fn fetch(&self, source_id: &str, language: &str) -> Result<Vec<TranscriptEntry>> {
        (**self).fetch(source_id, language)
    }
}

/// A cache-backed source that fails on misses.
///
/// Useful for offline runs where transcripts were placed into the cache directory by hand.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheOnly;

impl TranscriptSource for CacheOnly {
    fn fetch(&self, source_id: &str, _language: &str) -> Result<Vec<TranscriptEntry>> {
        bail!("transcript for '{source_id}' is not cached and no remote source is configured")
    }
}

/// Fetch transcripts from an HTTP endpoint returning the JSON entry array.
///
/// The request is `GET {base_url}/{source_id}?lang={language}`.
pub struct HttpTranscripts {
    client: Client,
    base_url: String,
}

impl HttpTranscripts {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent("bardic-transcripts")
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }
}

impl TranscriptSource for HttpTranscripts {
    fn fetch(&self, source_id: &str, language: &str) -> Result<Vec<TranscriptEntry>> {
        let url = format!("{}/{}?lang={}", self.base_url, source_id, language);
        let resp = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("request failed: {url}"))?
            .error_for_status()
            .with_context(|| format!("transcript fetch failed (bad status): {url}"))?;

        let entries: Vec<TranscriptEntry> =
            serde_json::from_reader(resp).context("failed to parse transcript JSON")?;
        Ok(entries)
    }
}

/// A directory cache in front of another [`TranscriptSource`].
///
/// Each transcript lives at `<dir>/<source_id>.json`.
pub struct CachedTranscripts<S> {
    dir: PathBuf,
    inner: S,
}

impl<S: TranscriptSource> CachedTranscripts<S> {
    pub fn new(dir: impl Into<PathBuf>, inner: S) -> Self {
        Self {
            dir: dir.into(),
            inner,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the cached transcript for `source_id`.
    pub fn entry_path(&self, source_id: &str) -> PathBuf {
        self.dir.join(format!("{source_id}.json"))
    }

    /// Remove every cached transcript.
    pub fn clear(&self) -> Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)
                .with_context(|| format!("failed to clear cache: {}", self.dir.display()))?;
        }
        info!(dir = %self.dir.display(), "cleared transcript cache");
        Ok(())
    }

    fn store(&self, path: &Path, entries: &[TranscriptEntry]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create cache dir: {}", self.dir.display()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer(&mut tmp, entries)?;
        tmp.flush()?;
        tmp.persist(path)
            .with_context(|| format!("failed to move into place: {}", path.display()))?;
        Ok(())
    }
}

impl<S: TranscriptSource> TranscriptSource for CachedTranscripts<S> {
    fn fetch(&self, source_id: &str, language: &str) -> Result<Vec<TranscriptEntry>> {
        let path = self.entry_path(source_id);

        if path.is_file() {
            let file = fs::File::open(&path)
                .with_context(|| format!("failed to open cached transcript: {}", path.display()))?;
            let entries = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("corrupt cached transcript: {}", path.display()))?;
            info!(path = %path.display(), "using cached transcript");
            return Ok(entries);
        }

        debug!(source_id, language, "transcript cache miss");
        let entries = self.inner.fetch(source_id, language)?;
        self.store(&path, &entries)?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingSource {
        calls: Cell<usize>,
    }

    impl TranscriptSource for CountingSource {
        fn fetch(&self, _source_id: &str, _language: &str) -> Result<Vec<TranscriptEntry>> {
            self.calls.set(self.calls.get() + 1);
            Ok(vec![
                TranscriptEntry::new("hello there", 0.0, 2.5),
                TranscriptEntry::new("general kenobi", 2.5, 3.0),
            ])
        }
    }

    #[test]
    fn entry_end_is_start_plus_duration() {
        assert_eq!(TranscriptEntry::new("x", 12.0, 10.0).end(), 22.0);
    }

    #[test]
    fn parses_the_transcript_json_shape() -> anyhow::Result<()> {
        let json = r#"[{"text": "hi", "start": 1.5, "duration": 2.0}]"#;
        let entries: Vec<TranscriptEntry> = serde_json::from_str(json)?;
        assert_eq!(entries, vec![TranscriptEntry::new("hi", 1.5, 2.0)]);
        Ok(())
    }

    #[test]
    fn second_fetch_is_served_from_cache() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let cache = CachedTranscripts::new(
            dir.path().join("transcripts"),
            CountingSource {
                calls: Cell::new(0),
            },
        );

        let first = cache.fetch("abc", "en")?;
        let second = cache.fetch("abc", "en")?;

        assert_eq!(first, second);
        assert_eq!(cache.inner.calls.get(), 1);
        assert!(cache.entry_path("abc").is_file());
        Ok(())
    }

    #[test]
    fn clear_removes_every_entry() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let cache = CachedTranscripts::new(
            dir.path().join("transcripts"),
            CountingSource {
                calls: Cell::new(0),
            },
        );
        cache.fetch("abc", "en")?;
        cache.fetch("def", "en")?;

        cache.clear()?;
        assert!(!cache.dir().exists());

        cache.fetch("abc", "en")?;
        assert_eq!(cache.inner.calls.get(), 3);
        Ok(())
    }

    #[test]
    fn cache_only_misses_are_errors() {
        let err = CacheOnly.fetch("abc", "en").unwrap_err();
        assert!(err.to_string().contains("not cached"));
    }
}
