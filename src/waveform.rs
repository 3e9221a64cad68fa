//! Decoded audio buffers.

use anyhow::{Result, ensure};

/// Interleaved `f32` audio.
///
/// Lengths and trims are expressed in *frames* (one sample per channel).
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    sample_rate: u32,
    channels: u16,
    samples: Vec<f32>,
}

/// Target loudness used when normalizing output audio (dBFS RMS).
pub const TARGET_LOUDNESS_DB: f32 = -14.0;

impl Waveform {
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<f32>) -> Result<Self> {
        ensure!(channels > 0, "waveform needs at least one channel");
        ensure!(sample_rate > 0, "waveform sample rate must be positive");
        ensure!(
            samples.len() % channels as usize == 0,
            "{} samples do not divide into {channels} channels",
            samples.len()
        );
        Ok(Self {
            sample_rate,
            channels,
            samples,
        })
    }

    pub fn mono(sample_rate: u32, samples: Vec<f32>) -> Result<Self> {
        Self::new(sample_rate, 1, samples)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Drop `head` frames from the start and `tail` frames from the end.
    ///
    /// Trimming more than the buffer holds leaves it empty.
    pub fn trim(&mut self, head: usize, tail: usize) {
        let ch = self.channels as usize;
        let frames = self.frames();
        let end = frames.saturating_sub(tail).max(head.min(frames));
        let start = head.min(end);

        self.samples.truncate(end * ch);
        self.samples.drain(..start * ch);
    }

    /// Append another buffer with the same format.
    pub fn append(&mut self, other: &Waveform) -> Result<()> {
        ensure!(
            self.sample_rate == other.sample_rate && self.channels == other.channels,
            "cannot append {} Hz x{} audio to {} Hz x{} audio",
            other.sample_rate,
            other.channels,
            self.sample_rate,
            self.channels
        );
        self.samples.extend_from_slice(&other.samples);
        Ok(())
    }

    /// Root-mean-square level in dBFS, or `None` for silence.
    pub fn rms_db(&self) -> Option<f32> {
        if self.samples.is_empty() {
            return None;
        }
        let mean_sq =
            self.samples.iter().map(|s| s * s).sum::<f32>() / self.samples.len() as f32;
        if mean_sq <= f32::EPSILON * f32::EPSILON {
            return None;
        }
        Some(10.0 * mean_sq.log10())
    }

    /// Bring the RMS level to `target_db` and soft-limit peaks with `tanh` so the gain never
    /// clips. Silent buffers are left untouched.
    pub fn normalize_loudness(&mut self, target_db: f32) {
        let Some(current) = self.rms_db() else {
            return;
        };
        let gain = 10f32.powf((target_db - current) / 20.0);
        for s in &mut self.samples {
            *s = (*s * gain).tanh();
        }
    }

    /// Owned copy with loudness normalization applied, leaving `self` untouched.
    pub fn normalized(&self, target_db: f32) -> Waveform {
        let mut out = self.clone();
        out.normalize_loudness(target_db);
        out
    }
}
