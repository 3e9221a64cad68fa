//! Transcript windowing.
//!
//! We walk an ordered transcript and group consecutive entries into windows of roughly
//! `target` seconds. The target boundaries are evenly spaced from the first entry of the
//! excerpt, so a window that overshoots (long entries) does not push the following ones.
//!
//! Boundary rule, per window:
//! - the first pending entry is always taken
//! - another entry is taken while the *next* entry's end is `<=` the running boundary
//! - after emitting, the boundary advances by exactly `target`
//!
//! With an explicit excerpt end, the first entry whose end exceeds it stops the iteration.
//! Partial entries are dropped rather than truncated.

use crate::transcript::TranscriptEntry;

/// A group of consecutive transcript entries used as one conditioning text.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// Entry texts in order.
    pub texts: Vec<String>,

    /// Start of the first entry (seconds from the start of the source).
    pub start: f64,

    /// From the start of the first entry to the end of the last one.
    pub actual_duration: f64,
}

impl Window {
    /// The conditioning string: entry texts joined by a single space.
    pub fn text(&self) -> String {
        self.texts.join(" ")
    }
}

/// Splits a transcript into target-duration windows over `[start, end)`.
///
/// The segmenter itself is immutable; every call to [`TranscriptSegmenter::windows`] starts a
/// fresh pass, so the sequence can be replayed.
#[derive(Debug, Clone)]
pub struct TranscriptSegmenter<'a> {
    entries: &'a [TranscriptEntry],
    target: f64,
    start: f64,
    end: Option<f64>,
    first: usize,
}

impl<'a> TranscriptSegmenter<'a> {
    /// Create a segmenter. `target` must be positive.
    pub fn new(entries: &'a [TranscriptEntry], target: f64, start: f64, end: Option<f64>) -> Self {
        debug_assert!(target > 0.0, "window target must be positive");

        // Skip entries that begin before the excerpt start.
        let first = entries
            .iter()
            .position(|e| e.start >= start)
            .unwrap_or(entries.len());

        Self {
            entries,
            target,
            start,
            end,
            first,
        }
    }

    /// Requested excerpt start (seconds).
    pub fn start(&self) -> f64 {
        self.start
    }

    /// Target window duration (seconds).
    pub fn target(&self) -> f64 {
        self.target
    }

    /// Number of windows planned for the excerpt.
    ///
    /// This is `ceil((effective_end - first_start) / target)` and is known before iterating.
    /// It is an estimate for progress display: the actual count can differ when entries are
    /// long or the end boundary drops a partial entry.
    pub fn len(&self) -> usize {
        let Some(first) = self.entries.get(self.first) else {
            return 0;
        };
        let effective_end = match self.end {
            Some(end) => end,
            None => self.entries.last().map_or(first.start, TranscriptEntry::end),
        };

        let span = effective_end - first.start;
        if span <= 0.0 {
            return 0;
        }
        (span / self.target).ceil() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start a new pass over the windows.
    pub fn windows(&self) -> Windows<'a> {
        let boundary = self
            .entries
            .get(self.first)
            .map_or(0.0, |e| e.start + self.target);

        Windows {
            entries: self.entries,
            target: self.target,
            end: self.end,
            cursor: self.first,
            boundary,
        }
    }
}

/// Iterator produced by [`TranscriptSegmenter::windows`].
#[derive(Debug, Clone)]
pub struct Windows<'a> {
    entries: &'a [TranscriptEntry],
    target: f64,
    end: Option<f64>,
    cursor: usize,
    boundary: f64,
}

impl Iterator for Windows<'_> {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        let first = self.entries.get(self.cursor)?;

        let mut texts = Vec::new();
        let mut actual_duration = 0.0;
        let mut next_end = f64::NEG_INFINITY;

        while next_end <= self.boundary {
            let entry = &self.entries[self.cursor];
            let entry_end = entry.end();

            if self.end.is_some_and(|end| entry_end > end) {
                // Past the excerpt: nothing more will ever be emitted.
                self.cursor = self.entries.len();
                break;
            }

            texts.push(entry.text.clone());
            self.cursor += 1;
            actual_duration = entry_end - first.start;

            let Some(next) = self.entries.get(self.cursor) else {
                break;
            };
            next_end = next.end();
        }

        self.boundary += self.target;

        if texts.is_empty() {
            return None;
        }

        Some(Window {
            texts,
            start: first.start,
            actual_duration,
        })
    }
}
