//! High-level API for scoring a transcript with generated music.
//!
//! We expose a single entry point (`Bardic`) that owns the long-lived collaborators:
//! - a music generator (expensive to load, reused across runs)
//! - an optional chat backend
//! - a transcript source
//! - the output layout
//!
//! Each call to [`Bardic::play`] runs one strategy over one source: it windows the
//! transcript, resolves a prompt per window, stitches the generated segments and writes the
//! final track. A run whose output already exists is skipped, so batch jobs can be resumed.

use std::path::PathBuf;

use anyhow::Context;
use chrono::Local;
use tracing::{info, info_span};
use uuid::Uuid;

use crate::chat::{ChatBackend, ChatSession};
use crate::continuity::{Checkpointer, ContinuityEngine};
use crate::error::{Error, Result};
use crate::generator::MusicGenerator;
use crate::layout::Layout;
use crate::opts::Opts;
use crate::progress::ProgressMeter;
use crate::resolver::{PromptResolver, ResolvedPrompt};
use crate::run_log::{LogEntry, LogHeader, RunLog};
use crate::segmenter::TranscriptSegmenter;
use crate::transcript::{TranscriptEntry, TranscriptSource};
use crate::waveform::TARGET_LOUDNESS_DB;
use crate::wav::write_wav;

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The output already existed; nothing was generated.
    Skipped { path: PathBuf },

    /// A new track was written.
    Completed {
        path: PathBuf,
        segments: usize,
        seconds: f64,
    },
}

/// Per-segment notification for frontends (progress bars, live logs).
#[derive(Debug)]
pub struct SegmentEvent<'a> {
    pub idx: usize,

    /// Planned number of segments.
    pub total: usize,

    pub dialog: &'a str,
    pub prompt: &'a ResolvedPrompt,
}

pub struct Bardic<G, C, S> {
    generator: G,
    chat: Option<C>,
    transcripts: S,
    layout: Layout,
}

impl<G, C, S> Bardic<G, C, S>
where
    G: MusicGenerator,
    C: ChatBackend,
    S: TranscriptSource,
{
    /// `chat` may be `None` when only strategies that skip the chat model are played.
    pub fn new(generator: G, chat: Option<C>, transcripts: S, layout: Layout) -> Self {
        Self {
            generator,
            chat,
            transcripts,
            layout,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Fetch the transcript of `source_id`.
    pub fn transcript(&self, source_id: &str, language: &str) -> Result<Vec<TranscriptEntry>> {
        self.transcripts
            .fetch(source_id, language)
            .map_err(|err| Error::TranscriptUnavailable {
                source_id: source_id.to_owned(),
                message: format!("{err:#}"),
            })
    }

    /// Play one strategy over one source.
    pub fn play(&mut self, source_id: &str, opts: &Opts) -> Result<Outcome> {
        self.play_with(source_id, opts, |_| {})
    }

    /// Like [`Bardic::play`], calling `on_segment` after every stitched segment.
    pub fn play_with<F>(&mut self, source_id: &str, opts: &Opts, mut on_segment: F) -> Result<Outcome>
    where
        F: FnMut(&SegmentEvent<'_>),
    {
        let strategy = opts.strategy;
        let span = info_span!("play", source_id, %strategy);
        let _guard = span.enter();

        if strategy.uses_chat() && self.chat.is_none() {
            return Err(Error::invalid_config(format!(
                "strategy '{strategy}' needs a chat backend"
            )));
        }
        if opts.window_secs.is_nan() || opts.window_secs <= 0.0 {
            return Err(Error::invalid_config(format!(
                "window length must be positive, got {}",
                opts.window_secs
            )));
        }

        let output = self.layout.output(strategy, source_id);
        if output.exists() {
            info!(path = %output.display(), "output exists, skipping");
            return Ok(Outcome::Skipped { path: output });
        }

        // INIT
        for dir in self.layout.dirs_to_create(strategy) {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create dir: {}", dir.display()))?;
        }

        let entries = self.transcript(source_id, &opts.language)?;

        let seed = opts.seed.unwrap_or_else(rand::random::<u32>);
        info!(seed, "using seed for music and chat models");
        self.generator.set_seed(u64::from(seed));
        let mut engine = ContinuityEngine::new(
            &mut self.generator,
            opts.duration,
            opts.extend_stride,
            opts.crossfade,
        )?;

        let mut resolver = match self.chat.as_ref() {
            Some(chat) if strategy.uses_chat() => PromptResolver::with_chat(
                strategy,
                ChatSession::new(chat, opts.chat_window, u64::from(seed)),
            ),
            _ => PromptResolver::mute(strategy),
        };

        let setup = strategy.setup(&opts.campaign);
        let mut log = RunLog::create(self.layout.log(strategy, source_id))?;
        log.header(&LogHeader {
            run_id: Uuid::new_v4(),
            strategy,
            decoration: resolver.decoration(),
            setup: setup.as_deref(),
            source_id,
            excerpt: opts.excerpt,
            seed,
        })?;
        resolver.setup(&opts.campaign);

        let segmenter = TranscriptSegmenter::new(
            &entries,
            opts.window_secs,
            opts.excerpt.start_secs(),
            opts.excerpt.end_secs(),
        );
        let total = segmenter.len();
        let meter = ProgressMeter::start(total);
        let checkpointer =
            Checkpointer::new(opts.save_every, self.layout.partial_dir(strategy, source_id));

        info!(windows = total, "generating");

        for (idx, window) in segmenter.windows().enumerate() {
            // RESOLVE_PROMPT
            let dialog = window.text();
            let prompt = resolver.resolve(&dialog);
            info!(segment = idx, prompt = prompt.display_text(), "generating segment");

            // GENERATE + STITCH
            engine.step(prompt.conditioning())?;

            log.entry(&LogEntry {
                time: opts.excerpt.start_secs() + idx as f64 * opts.window_secs,
                wall_clock: Local::now(),
                dialog: &dialog,
                text_prompt: prompt.display_text(),
                progress: &meter.format(idx + 1),
            })?;

            on_segment(&SegmentEvent {
                idx,
                total,
                dialog: &dialog,
                prompt: &prompt,
            });

            // CHECKPOINT
            if let Some(waveform) = engine.waveform() {
                checkpointer.maybe_write(idx, waveform)?;
            }
        }

        // FINALIZE
        let segments = engine.session().segments();
        let mut waveform = engine
            .into_waveform()
            .ok_or_else(|| Error::EmptyExcerpt(source_id.to_owned()))?;
        waveform.normalize_loudness(TARGET_LOUDNESS_DB);
        write_wav(&output, &waveform)?;

        let seconds = waveform.duration_secs();
        info!(path = %output.display(), segments, seconds, "track written");

        Ok(Outcome::Completed {
            path: output,
            segments,
            seconds,
        })
    }
}
