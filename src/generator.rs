use anyhow::Result;

use crate::tokens::TokenStream;
use crate::waveform::Waveform;

/// Model-level generation settings.
///
/// `duration` and `extend_stride` are chosen by the caller; `sample_rate` and `frame_rate` are
/// properties of the model's audio codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationParams {
    /// Seconds of audio produced per request.
    pub duration: u32,

    /// Seconds of *new* audio per continuation; the remaining `duration - extend_stride`
    /// seconds are the audio prompt taken from the previous segment.
    pub extend_stride: u32,

    /// Decoded audio sample rate (Hz).
    pub sample_rate: u32,

    /// Token frames per second.
    pub frame_rate: u32,
}

impl GenerationParams {
    /// Token frames covering `seconds` of audio.
    pub fn frames_for(&self, seconds: u32) -> usize {
        seconds as usize * self.frame_rate as usize
    }

    /// Audio frames covering `seconds` of audio.
    pub fn samples_for(&self, seconds: u32) -> usize {
        seconds as usize * self.sample_rate as usize
    }

    /// Token frames carried over from one segment into the next as the audio prompt.
    pub fn overlap_frames(&self) -> usize {
        self.frames_for(self.duration.saturating_sub(self.extend_stride))
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            duration: 30,
            extend_stride: 10,
            sample_rate: 32_000,
            frame_rate: 50,
        }
    }
}

/// Pluggable text-to-music model.
///
/// A generator works on codebook [`TokenStream`]s and only turns them into audio on request,
/// so callers can splice token streams before decoding.
///
/// Continuation contract: `continue_from` returns a full-length stream whose head reproduces
/// `prompt_tokens`, followed by the newly generated frames.
pub trait MusicGenerator {
    /// Current generation settings.
    fn params(&self) -> GenerationParams;

    /// Configure how much audio each request produces and how far continuations extend.
    fn set_generation_params(&mut self, duration: u32, extend_stride: u32) -> Result<()>;

    /// Seed the model's sampler so runs are reproducible.
    fn set_seed(&mut self, seed: u64);

    /// Generate tokens conditioned only on an optional text prompt.
    fn generate(&mut self, prompt: Option<&str>) -> Result<TokenStream>;

    /// Generate tokens continuing `prompt_tokens`, optionally conditioned on text.
    fn continue_from(
        &mut self,
        prompt_tokens: &TokenStream,
        prompt: Option<&str>,
    ) -> Result<TokenStream>;

    /// Decode tokens into audio.
    fn decode(&mut self, tokens: &TokenStream) -> Result<Waveform>;
}

impl<G: MusicGenerator + ?Sized> MusicGenerator for &mut G {
    fn params(&self) -> GenerationParams {
        (**self).params()
    }

    fn set_generation_params(&mut self, duration: u32, extend_stride: u32) -> Result<()> {
        (**self).set_generation_params(duration, extend_stride)
    }

    fn set_seed(&mut self, seed: u64) {
        (**self).set_seed(seed)
    }

    fn generate(&mut self, prompt: Option<&str>) -> Result<TokenStream> {
        (**self).generate(prompt)
    }

    fn continue_from(
        &mut self,
        prompt_tokens: &TokenStream,
        prompt: Option<&str>,
    ) -> Result<TokenStream> {
        (**self).continue_from(prompt_tokens, prompt)
    }

    fn decode(&mut self, tokens: &TokenStream) -> Result<Waveform> {
        (**self).decode(tokens)
    }
}

impl<G: MusicGenerator + ?Sized> MusicGenerator for Box<G> {
    fn params(&self) -> GenerationParams {
        (**self).params()
    }

    fn set_generation_params(&mut self, duration: u32, extend_stride: u32) -> Result<()> {
        (**self).set_generation_params(duration, extend_stride)
    }

    fn set_seed(&mut self, seed: u64) {
        (**self).set_seed(seed)
    }

    fn generate(&mut self, prompt: Option<&str>) -> Result<TokenStream> {
        (**self).generate(prompt)
    }

    fn continue_from(
        &mut self,
        prompt_tokens: &TokenStream,
        prompt: Option<&str>,
    ) -> Result<TokenStream> {
        (**self).continue_from(prompt_tokens, prompt)
    }

    fn decode(&mut self, tokens: &TokenStream) -> Result<Waveform> {
        (**self).decode(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_overlap_is_twenty_seconds_of_frames() {
        let p = GenerationParams::default();
        assert_eq!(p.overlap_frames(), 20 * 50);
        assert_eq!(p.samples_for(1), 32_000);
    }
}
