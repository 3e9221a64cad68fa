//! Segment-to-segment stitching on the generator's token representation.
//!
//! Each segment after the first continues the previous segment's tokens, and the boundary
//! between them is decoded from one contiguous token run so the codec renders it without
//! a seam.

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::generator::{GenerationParams, MusicGenerator};
use crate::tokens::TokenStream;
use crate::waveform::{TARGET_LOUDNESS_DB, Waveform};
use crate::wav::write_wav;

/// Default crossfade between segments, in seconds.
pub const DEFAULT_CROSSFADE_SECS: u32 = 1;

/// State carried from one segment to the next.
#[derive(Debug, Default)]
pub struct GenerationSession {
    previous_tokens: Option<TokenStream>,
    waveform: Option<Waveform>,
    segments: usize,
}

impl GenerationSession {
    pub fn previous_tokens(&self) -> Option<&TokenStream> {
        self.previous_tokens.as_ref()
    }

    pub fn waveform(&self) -> Option<&Waveform> {
        self.waveform.as_ref()
    }

    /// Segments stitched so far.
    pub fn segments(&self) -> usize {
        self.segments
    }
}

/// Drives a [`MusicGenerator`] segment by segment and accumulates one continuous waveform.
pub struct ContinuityEngine<G> {
    generator: G,
    params: GenerationParams,
    crossfade: u32,
    session: GenerationSession,
}

impl<G: MusicGenerator> ContinuityEngine<G> {
    /// Configure `generator` for `duration`-second requests extending by `extend_stride`.
    ///
    /// Fails with [`Error::InvalidConfig`] before touching the model when the crossfade
    /// cannot fit twice into one request or the stride is outside `1..=duration`.
    pub fn new(mut generator: G, duration: u32, extend_stride: u32, crossfade: u32) -> Result<Self> {
        if crossfade.saturating_mul(2) > duration {
            return Err(Error::invalid_config(format!(
                "crossfade of {crossfade}s needs a generation duration of at least {}s, got {duration}s",
                crossfade.saturating_mul(2)
            )));
        }
        if extend_stride == 0 || extend_stride > duration {
            return Err(Error::invalid_config(format!(
                "extend stride must be in 1..={duration}s, got {extend_stride}s"
            )));
        }

        generator.set_generation_params(duration, extend_stride)?;
        let params = generator.params();

        Ok(Self {
            generator,
            params,
            crossfade,
            session: GenerationSession::default(),
        })
    }

    pub fn params(&self) -> GenerationParams {
        self.params
    }

    pub fn crossfade(&self) -> u32 {
        self.crossfade
    }

    pub fn session(&self) -> &GenerationSession {
        &self.session
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// The waveform stitched so far.
    pub fn waveform(&self) -> Option<&Waveform> {
        self.session.waveform.as_ref()
    }

    /// Consume the engine, returning the stitched waveform.
    pub fn into_waveform(self) -> Option<Waveform> {
        self.session.waveform
    }

    /// Generate the next segment and stitch it onto the running waveform.
    ///
    /// `prompt` is the text conditioning; `None` continues the music unconditioned.
    pub fn step(&mut self, prompt: Option<&str>) -> Result<()> {
        let idx = self.session.segments;

        // The session is only touched once every fallible call has succeeded.
        let current = match self.session.previous_tokens.as_ref() {
            None => self
                .generator
                .generate(prompt)
                .context("failed to generate the first segment")?,
            Some(previous) => {
                let overlap = previous.tail(self.params.overlap_frames());
                self.generator
                    .continue_from(&overlap, prompt)
                    .with_context(|| format!("failed to continue segment {idx}"))?
            }
        };

        match (self.session.waveform.as_mut(), self.session.previous_tokens.as_ref()) {
            (Some(wav), Some(previous)) => {
                let tail = render_boundary(
                    &mut self.generator,
                    self.params,
                    self.crossfade,
                    previous,
                    &current,
                )?;
                // Leaves `wav` untouched on a format mismatch.
                wav.append(&tail)?;
            }
            _ => {
                let mut wav = self
                    .generator
                    .decode(&current)
                    .context("failed to decode the first segment")?;
                wav.trim(0, self.params.samples_for(self.crossfade));
                self.session.waveform = Some(wav);
            }
        }

        debug!(
            segment = idx,
            frames = current.frames(),
            seconds = self.session.waveform.as_ref().map(Waveform::duration_secs),
            "segment stitched"
        );

        self.session.previous_tokens = Some(current);
        self.session.segments += 1;
        Ok(())
    }
}

/// Decode `current` with the last `2 * crossfade` seconds of `previous` in front of it,
/// then drop `crossfade` seconds from each end.
///
/// The head trim lands exactly where the previous render stopped, so the running
/// waveform gets `crossfade` seconds rendered with full context on both sides.
fn render_boundary<G: MusicGenerator>(
    generator: &mut G,
    params: GenerationParams,
    crossfade: u32,
    previous: &TokenStream,
    current: &TokenStream,
) -> Result<Waveform> {
    let fade_frames = params.frames_for(crossfade * 2);
    let fade_samples = params.samples_for(crossfade);

    let render = previous.tail(fade_frames).concat_time(current)?;
    let mut wav = generator
        .decode(&render)
        .context("failed to decode the segment boundary")?;
    wav.trim(fade_samples, fade_samples);
    Ok(wav)
}

/// Writes the running waveform every `every` segments to `<dir>/<idx>.wav`.
#[derive(Debug, Clone)]
pub struct Checkpointer {
    every: usize,
    dir: PathBuf,
}

impl Checkpointer {
    /// `every == 0` disables checkpoints.
    pub fn new(every: usize, dir: impl Into<PathBuf>) -> Self {
        Self {
            every,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a loudness-normalized copy of `waveform` if segment `idx` is due.
    ///
    /// Returns the written path.
    pub fn maybe_write(&self, idx: usize, waveform: &Waveform) -> Result<Option<PathBuf>> {
        if self.every == 0 || (idx + 1) % self.every != 0 {
            return Ok(None);
        }

        let path = self.dir.join(format!("{idx}.wav"));
        write_wav(&path, &waveform.normalized(TARGET_LOUDNESS_DB))?;
        info!(segment = idx, path = %path.display(), "checkpoint written");
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Deterministic generator: every frame holds one code, decoded to `sr / fr` samples of
    /// `code / 1000`. Records the prompts it was given.
    struct Recording {
        params: GenerationParams,
        next_code: u32,
        prompts: Vec<Option<String>>,
        continued_from: Vec<usize>,
        fail_next_decode: Cell<bool>,
    }

    impl Recording {
        fn new() -> Self {
            Self {
                params: GenerationParams {
                    duration: 30,
                    extend_stride: 10,
                    sample_rate: 100,
                    frame_rate: 10,
                },
                next_code: 1,
                prompts: Vec::new(),
                continued_from: Vec::new(),
                fail_next_decode: Cell::new(false),
            }
        }

        fn fresh(&mut self, frames: usize) -> Vec<u32> {
            (0..frames)
                .map(|_| {
                    let c = self.next_code;
                    self.next_code += 1;
                    c
                })
                .collect()
        }
    }

    impl MusicGenerator for Recording {
        fn params(&self) -> GenerationParams {
            self.params
        }

        fn set_generation_params(&mut self, duration: u32, extend_stride: u32) -> anyhow::Result<()> {
            self.params.duration = duration;
            self.params.extend_stride = extend_stride;
            Ok(())
        }

        fn set_seed(&mut self, _seed: u64) {}

        fn generate(&mut self, prompt: Option<&str>) -> anyhow::Result<TokenStream> {
            self.prompts.push(prompt.map(str::to_owned));
            let row = self.fresh(self.params.frames_for(self.params.duration));
            TokenStream::from_rows(&[row])
        }

        fn continue_from(
            &mut self,
            prompt_tokens: &TokenStream,
            prompt: Option<&str>,
        ) -> anyhow::Result<TokenStream> {
            self.prompts.push(prompt.map(str::to_owned));
            self.continued_from.push(prompt_tokens.frames());
            let total = self.params.frames_for(self.params.duration);
            let mut row = prompt_tokens.row(0, 0).to_vec();
            let fresh = self.fresh(total - row.len());
            row.extend(fresh);
            TokenStream::from_rows(&[row])
        }

        fn decode(&mut self, tokens: &TokenStream) -> anyhow::Result<Waveform> {
            if self.fail_next_decode.replace(false) {
                anyhow::bail!("decoder unavailable");
            }
            let per_frame = (self.params.sample_rate / self.params.frame_rate) as usize;
            let samples = tokens
                .row(0, 0)
                .iter()
                .flat_map(|&c| std::iter::repeat_n(c as f32 / 1000.0, per_frame))
                .collect();
            Waveform::mono(self.params.sample_rate, samples)
        }
    }

    #[test]
    fn rejects_crossfade_longer_than_half_the_duration() {
        let err = ContinuityEngine::new(Recording::new(), 10, 5, 6)
            .err()
            .expect("invalid crossfade");
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn rejects_extend_stride_outside_the_duration() {
        for stride in [0, 31] {
            let err = ContinuityEngine::new(Recording::new(), 30, stride, 1)
                .err()
                .expect("invalid stride");
            assert!(matches!(err, Error::InvalidConfig(_)));
        }
        assert!(ContinuityEngine::new(Recording::new(), 30, 30, 1).is_ok());
    }

    #[test]
    fn first_segment_drops_the_crossfade_tail() -> anyhow::Result<()> {
        let mut engine = ContinuityEngine::new(Recording::new(), 30, 10, 1)?;
        engine.step(Some("calm"))?;

        let wav = engine.waveform().expect("waveform");
        assert_eq!(wav.frames(), 29 * 100);
        assert_eq!(engine.session().segments(), 1);
        Ok(())
    }

    #[test]
    fn stitched_length_consumes_one_crossfade_per_boundary() -> anyhow::Result<()> {
        let mut engine = ContinuityEngine::new(Recording::new(), 30, 10, 1)?;
        engine.step(Some("a"))?;
        let first = engine.waveform().expect("waveform").frames();
        engine.step(Some("b"))?;
        let second = engine.waveform().expect("waveform").frames();
        engine.step(None)?;
        let third = engine.waveform().expect("waveform").frames();

        // (L0 - cf) + (L1 - cf) + cf for every boundary.
        let (seg, cf) = (3000, 100);
        assert_eq!(first, seg - cf);
        assert_eq!(second, (seg - cf) + (seg - cf) + cf);
        assert_eq!(third - second, seg);
        Ok(())
    }

    #[test]
    fn boundary_resumes_exactly_where_the_previous_render_stopped() -> anyhow::Result<()> {
        let mut engine = ContinuityEngine::new(Recording::new(), 30, 10, 1)?;
        engine.step(Some("a"))?;
        let first = engine.waveform().expect("waveform").clone();
        engine.step(Some("b"))?;
        let joined = engine.waveform().expect("waveform");

        // The first sample after the join is the first dropped frame of segment 0 (code 291).
        let seam = joined.samples()[first.frames()];
        assert!((seam - 291.0 / 1000.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn continuation_uses_the_overlap_and_passes_none_through() -> anyhow::Result<()> {
        let mut engine = ContinuityEngine::new(Recording::new(), 30, 10, 1)?;
        engine.step(Some("a"))?;
        engine.step(None)?;

        let generator = engine.generator();
        assert_eq!(generator.continued_from, vec![20 * 10]);
        assert_eq!(generator.prompts, vec![Some("a".to_string()), None]);
        Ok(())
    }

    #[test]
    fn previous_tokens_are_the_latest_segment() -> anyhow::Result<()> {
        let mut engine = ContinuityEngine::new(Recording::new(), 30, 10, 1)?;
        engine.step(Some("a"))?;
        engine.step(Some("b"))?;
        let prev = engine.session().previous_tokens().expect("tokens");
        assert_eq!(prev.frames(), 300);
        // Head reproduces the last 20 s of segment 0 (codes 101..=300).
        assert_eq!(prev.row(0, 0)[0], 101);
        Ok(())
    }

    #[test]
    fn failed_step_keeps_the_accumulated_audio() -> anyhow::Result<()> {
        let mut engine = ContinuityEngine::new(Recording::new(), 30, 10, 1)?;
        engine.step(Some("a"))?;
        let first = engine.waveform().expect("waveform").clone();

        engine.generator().fail_next_decode.set(true);
        assert!(engine.step(Some("b")).is_err());
        assert_eq!(engine.session().segments(), 1);
        assert_eq!(engine.waveform(), Some(&first));
        let prev = engine.session().previous_tokens().expect("tokens");
        assert_eq!(prev.row(0, 0)[0], 1);

        engine.step(Some("b"))?;
        let (seg, cf) = (3000, 100);
        assert_eq!(engine.waveform().expect("waveform").frames(), (seg - cf) + (seg - cf) + cf);
        assert_eq!(engine.session().segments(), 2);
        Ok(())
    }

    #[test]
    fn checkpoints_only_on_multiples() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let cp = Checkpointer::new(2, dir.path().join("out_partial"));
        let wav = Waveform::mono(100, vec![0.1; 100])?;

        assert!(cp.maybe_write(0, &wav)?.is_none());
        let written = cp.maybe_write(1, &wav)?.expect("checkpoint at idx 1");
        assert_eq!(written, dir.path().join("out_partial").join("1.wav"));
        assert!(written.exists());

        assert!(Checkpointer::new(0, dir.path()).maybe_write(1, &wav)?.is_none());
        Ok(())
    }
}
