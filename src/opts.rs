use crate::continuity::DEFAULT_CROSSFADE_SECS;
use crate::episode::Excerpt;
use crate::strategy::Strategy;

/// Seed used when the caller does not ask for a random one.
pub const DEFAULT_SEED: u32 = 2_147_483_647;

/// Options that control one scoring run.
///
/// This struct represents *library-level configuration*, not CLI flags directly.
/// The CLI is responsible for mapping user input into this type so that:
/// - the library remains reusable outside of a CLI context
/// - other frontends (batch jobs, tests) can construct options programmatically
#[derive(Debug, Clone)]
pub struct Opts {
    /// How dialog windows become music prompts.
    pub strategy: Strategy,

    /// Name of what the transcript is about, used in chat setup instructions.
    pub campaign: String,

    /// Transcript language (e.g. `"en"`, `"pt"`).
    pub language: String,

    /// Seed for the music model and the chat sampler.
    ///
    /// `None` draws a fresh random seed per run; the seed used is recorded in the run log.
    pub seed: Option<u32>,

    /// Part of the source to score.
    pub excerpt: Excerpt,

    /// Target dialog window length in seconds.
    pub window_secs: f64,

    /// Non-pinned chat turns kept in the history.
    pub chat_window: usize,

    /// Seconds of audio per generation request.
    pub duration: u32,

    /// Seconds of new audio per continuation.
    pub extend_stride: u32,

    /// Seconds of audio re-rendered across each segment boundary.
    pub crossfade: u32,

    /// Write the running waveform every N segments; 0 disables checkpoints.
    pub save_every: usize,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            strategy: Strategy::Direct,
            campaign: String::new(),
            language: "en".to_string(),
            seed: Some(DEFAULT_SEED),
            excerpt: Excerpt::WHOLE,
            window_secs: 30.0,
            chat_window: 20,
            duration: 30,
            extend_stride: 10,
            crossfade: DEFAULT_CROSSFADE_SECS,
            save_every: 0,
        }
    }
}
