//! `bardic`: background music generated along a dialog transcript.
//!
//! This crate provides:
//! - Transcript windowing and caching
//! - Chat-mediated prompt resolution with bounded history
//! - Segment continuation and crossfade stitching on codec tokens
//! - A resumable per-source run loop with reproducible excerpt selection
//!
//! The music and language models are black boxes behind the [`generator::MusicGenerator`]
//! and [`chat::ChatBackend`] traits.

// High-level API (most consumers should start here).
pub mod bardic;
pub mod opts;

// Crate-wide error type.
pub mod error;
pub use error::{Error, Result};

// Transcripts and dialog windows.
pub mod segmenter;
pub mod transcript;

// Prompt resolution.
pub mod chat;
pub mod ollama;
pub mod resolver;
pub mod retry;
pub mod strategy;

// Generation and stitching.
pub mod backends;
pub mod continuity;
pub mod generator;
pub mod tokens;
pub mod waveform;
pub mod wav;

// Run bookkeeping.
pub mod episode;
pub mod layout;
pub mod progress;
pub mod run_log;

// Logging configuration.
#[cfg(feature = "logging")]
pub mod logging;
