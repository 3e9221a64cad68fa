// Command-line frontend: score one or more sources with every requested strategy.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use tracing::warn;

use bardic::backends::remote::RemoteGenerator;
use bardic::backends::synthetic::SyntheticGenerator;
use bardic::bardic::{Bardic, Outcome};
use bardic::chat::ChatBackend;
use bardic::episode::{EpisodeStarts, Excerpt};
use bardic::generator::MusicGenerator;
use bardic::layout::Layout;
use bardic::logging;
use bardic::ollama::{DEFAULT_OLLAMA_MODEL, OllamaChat};
use bardic::opts::{DEFAULT_SEED, Opts};
use bardic::strategy::Strategy;
use bardic::transcript::{CacheOnly, CachedTranscripts, HttpTranscripts, TranscriptSource};

#[derive(Parser, Debug)]
#[command(name = "bardic")]
#[command(about = "Generate background music that follows a dialog transcript", long_about = None)]
struct Args {
    /// Source ids to score (transcripts are looked up by id).
    #[arg(required = true)]
    sources: Vec<String>,

    /// Output root directory.
    #[arg(short = 'r', long, default_value = "./results")]
    root: PathBuf,

    /// Prompt strategies to run, in order. Repeat the flag for several.
    #[arg(short = 's', long = "strategy", value_enum, default_values_t = [Strategy::Direct])]
    strategies: Vec<Strategy>,

    /// Name of the campaign, used in chat instructions.
    #[arg(short = 'c', long, default_value = "")]
    campaign: String,

    /// Transcript language.
    #[arg(short = 'l', long, default_value = "en")]
    language: String,

    /// Excerpt start in seconds (skips random excerpt selection).
    #[arg(long)]
    start: Option<u64>,

    /// Excerpt end in seconds (requires --start).
    #[arg(long, requires = "start")]
    end: Option<u64>,

    /// Score a random excerpt of this many seconds, remembered per source in eps_start.json.
    #[arg(long, conflicts_with = "start")]
    excerpt_length: Option<u64>,

    /// Source length in seconds; derived from the transcript when omitted.
    #[arg(long, requires = "excerpt_length")]
    total_duration: Option<u64>,

    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u32,

    /// Draw a fresh seed for every run instead of --seed.
    #[arg(long, default_value_t = false)]
    random_seed: bool,

    /// Write the track so far every N segments (0 disables).
    #[arg(long, default_value_t = 0)]
    save_every: usize,

    /// Dialog window length in seconds.
    #[arg(long, default_value_t = 30.0)]
    window: f64,

    /// Non-pinned chat turns kept in the history.
    #[arg(long, default_value_t = 20)]
    chat_window: usize,

    /// Seconds of audio per generation request.
    #[arg(long, default_value_t = 30)]
    duration: u32,

    /// Seconds of new audio per continuation.
    #[arg(long, default_value_t = 10)]
    extend_stride: u32,

    /// Crossfade between segments, in seconds.
    #[arg(long, default_value_t = 1)]
    crossfade: u32,

    /// Remove cached transcripts before running.
    #[arg(long = "clear-cache", default_value_t = false)]
    clear_cache: bool,

    /// Base URL serving transcripts as `{url}/{id}?lang=..`; cache-only when omitted.
    #[arg(long)]
    transcript_url: Option<String>,

    /// Ollama `host:port`; falls back to $OLLAMA_ADDRES.
    #[arg(long)]
    ollama: Option<String>,

    #[arg(long, default_value = DEFAULT_OLLAMA_MODEL)]
    ollama_model: String,

    /// Generation server base URL; a synthetic generator is used when omitted.
    #[arg(long)]
    generator_url: Option<String>,
}

fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();
    let layout = Layout::new(&args.root);

    let inner: Box<dyn TranscriptSource> = match &args.transcript_url {
        Some(url) => Box::new(HttpTranscripts::new(url)?),
        None => Box::new(CacheOnly),
    };
    let transcripts = CachedTranscripts::new(layout.transcript_cache(), inner);
    if args.clear_cache {
        transcripts.clear()?;
    }

    let generator: Box<dyn MusicGenerator> = match &args.generator_url {
        Some(url) => Box::new(RemoteGenerator::connect(url)?),
        None => {
            warn!("no --generator-url given, using the synthetic generator (dry run)");
            Box::new(SyntheticGenerator::new())
        }
    };

    let chat = if args.strategies.iter().any(|s| s.uses_chat()) {
        let chat = match &args.ollama {
            Some(address) => OllamaChat::new(address, &args.ollama_model)?,
            None => OllamaChat::from_env(&args.ollama_model)
                .context("a chat strategy was requested; pass --ollama or set OLLAMA_ADDRES")?,
        };
        Some(chat)
    } else {
        None
    };

    let mut bardic = Bardic::new(generator, chat, transcripts, layout.clone());
    let mut episodes = EpisodeStarts::load(layout.episode_starts())?;
    episodes.register(args.sources.iter().map(String::as_str));
    let mut rng = StdRng::seed_from_u64(u64::from(args.seed));

    for source_id in &args.sources {
        // Every strategy scores the same excerpt of a source.
        let excerpt = match (args.start, args.excerpt_length) {
            (Some(start), _) => Excerpt {
                start,
                end: args.end,
            },
            (None, Some(len)) => {
                let total = match args.total_duration {
                    Some(total) => total,
                    None => transcript_length(&bardic, source_id, &args.language)?,
                };
                episodes.select(source_id, total, len, &mut rng)?
            }
            (None, None) => Excerpt::WHOLE,
        };

        for &strategy in &args.strategies {
            let opts = Opts {
                strategy,
                campaign: args.campaign.clone(),
                language: args.language.clone(),
                seed: (!args.random_seed).then_some(args.seed),
                excerpt,
                window_secs: args.window,
                chat_window: args.chat_window,
                duration: args.duration,
                extend_stride: args.extend_stride,
                crossfade: args.crossfade,
                save_every: args.save_every,
            };

            let pb = ProgressBar::new(0);
            pb.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} {prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
                )?
                .progress_chars("#>-"),
            );
            pb.set_prefix(format!("{strategy} {source_id}"));

            let result = bardic.play_with(source_id, &opts, |event| {
                pb.set_length(event.total.max(event.idx + 1) as u64);
                pb.set_position(event.idx as u64 + 1);
                pb.set_message(event.prompt.display_text().to_owned());
            });
            pb.finish_and_clear();

            match result? {
                Outcome::Skipped { path } => {
                    println!("skipped {strategy} {source_id}: {} exists", path.display());
                }
                Outcome::Completed {
                    path,
                    segments,
                    seconds,
                } => {
                    println!(
                        "wrote {} ({segments} segments, {seconds:.1}s)",
                        path.display()
                    );
                }
            }
        }
    }

    Ok(())
}

/// Whole seconds up to the end of the last transcript entry.
fn transcript_length<G, C, S>(bardic: &Bardic<G, C, S>, source_id: &str, language: &str) -> Result<u64>
where
    G: MusicGenerator,
    C: ChatBackend,
    S: TranscriptSource,
{
    let entries = bardic.transcript(source_id, language)?;
    let end = entries.iter().map(|e| e.end()).fold(0.0_f64, f64::max);
    Ok(end.ceil() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn repeated_strategy_flags_accumulate() {
        let args = Args::try_parse_from([
            "bardic",
            "ep1",
            "-s",
            "emotion-classify",
            "-s",
            "describe-with-continue",
        ])
        .expect("valid args");
        assert_eq!(
            args.strategies,
            vec![Strategy::EmotionClassify, Strategy::DescribeWithContinue]
        );
        assert_eq!(args.seed, DEFAULT_SEED);
    }

    #[test]
    fn excerpt_flags_conflict() {
        assert!(Args::try_parse_from(["bardic", "ep1", "--start", "10", "--excerpt-length", "60"]).is_err());
    }
}
