use std::path::{Path, PathBuf};

use crate::strategy::Strategy;

/// Where a run reads and writes its files, all under one root directory.
///
/// ```text
/// <root>/eps_start.json
/// <root>/cache/transcripts/<source id>.json
/// <root>/<strategy>/audios/generated/<strategy>_<source id>.wav
/// <root>/<strategy>/audios/generated/<strategy>_<source id>_partial/<idx>.wav
/// <root>/<strategy>/logs/<strategy>_<source id>.txt
/// ```
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn episode_starts(&self) -> PathBuf {
        self.root.join("eps_start.json")
    }

    pub fn transcript_cache(&self) -> PathBuf {
        self.root.join("cache").join("transcripts")
    }

    pub fn generated_dir(&self, strategy: Strategy) -> PathBuf {
        self.root
            .join(strategy.name())
            .join("audios")
            .join("generated")
    }

    pub fn logs_dir(&self, strategy: Strategy) -> PathBuf {
        self.root.join(strategy.name()).join("logs")
    }

    /// The final artifact; its existence marks the run as done.
    pub fn output(&self, strategy: Strategy, source_id: &str) -> PathBuf {
        self.generated_dir(strategy)
            .join(format!("{}.wav", stem(strategy, source_id)))
    }

    pub fn partial_dir(&self, strategy: Strategy, source_id: &str) -> PathBuf {
        self.generated_dir(strategy)
            .join(format!("{}_partial", stem(strategy, source_id)))
    }

    pub fn log(&self, strategy: Strategy, source_id: &str) -> PathBuf {
        self.logs_dir(strategy)
            .join(format!("{}.txt", stem(strategy, source_id)))
    }

    /// Directories a run writes into.
    pub fn dirs_to_create(&self, strategy: Strategy) -> [PathBuf; 2] {
        [self.generated_dir(strategy), self.logs_dir(strategy)]
    }
}

fn stem(strategy: Strategy, source_id: &str) -> String {
    format!("{}_{source_id}", strategy.name())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_the_strategy_tree() {
        let layout = Layout::new("/data");
        assert_eq!(
            layout.output(Strategy::DescribeFree, "abc"),
            Path::new("/data/describe/audios/generated/describe_abc.wav")
        );
        assert_eq!(
            layout.partial_dir(Strategy::DescribeFree, "abc"),
            Path::new("/data/describe/audios/generated/describe_abc_partial")
        );
        assert_eq!(
            layout.log(Strategy::Direct, "abc"),
            Path::new("/data/direct/logs/direct_abc.txt")
        );
        assert_eq!(
            layout.transcript_cache(),
            Path::new("/data/cache/transcripts")
        );
        assert_eq!(layout.episode_starts(), Path::new("/data/eps_start.json"));
    }
}
