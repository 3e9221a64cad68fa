//! Prompting strategies.
//!
//! A strategy decides how a dialog window becomes a music prompt: whether a chat model is
//! involved, what it is told up front, how its answer is decorated, and whether it may answer
//! with the continue sentinel. Every strategy also owns its output names so several strategies
//! can score the same source side by side.

use std::fmt;

/// Reply that asks for pure audio continuation instead of a new text prompt.
pub const CONTINUE_SENTINEL: &str = "CONTINUE.";

/// How a window's text is turned into a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Strategy {
    /// The dialog itself, prefixed, is the prompt.
    Direct,

    /// Like `Direct`, but a chat model first translates the dialog to English.
    DirectTranslated,

    /// A chat model classifies the dialog into one of four emotions.
    EmotionClassify,

    /// A chat model writes a free music description for the dialog.
    DescribeFree,

    /// Like `DescribeFree`, but the model answers `CONTINUE.` when the dialog belongs to the
    /// same chapter as the previous window.
    DescribeWithContinue,
}

/// Fixed text around the resolved prompt.
///
/// With a chat model it wraps the model's answer; without one it wraps the dialog.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PromptDecoration {
    pub prefix: String,
    pub suffix: String,
}

impl PromptDecoration {
    pub fn apply(&self, text: &str) -> String {
        format!("{}{}{}", self.prefix, text, self.suffix)
    }
}

impl fmt::Display for PromptDecoration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prompt start: {}\nprompt end: {}", self.prefix, self.suffix)
    }
}

const DIALOG_PREFIX: &str = "Background music for the following Role-playing Game (RPG) dialog: ";
const EMOTION_PREFIX: &str =
    "Background music for a Role-playing Game (RPG) dialog, with the following emotion: ";

const TRANSLATE_TASK: &str = "For each transcript excerpt you will translate the dialog to english. \
Your answer will only contain the translation.";

const EMOTION_TASK: &str = "You will classify each dialog into one of the following emotions: \
Happy, Calm, Agitated, or Suspenseful. Your answer will be just one word, that is, one of those emotions.";

const EXAMPLE_PROMPT: &str = "Here is a prompt that worked well with the music model: A grand orchestral \
arrangement with thunderous percussion, epic brass fanfares, and soaring strings, creating a cinematic \
atmosphere fit for a heroic battle.";

const DESCRIBE_TASK: &str = "For each transcript excerpt you will, in english, describe a piece of \
background music that matches that excerpt. Your answer will be fed to a text to music model and should \
only contain a music description. The description should be concise. Do not mention any dialog excerpt details.";

const DESCRIBE_CONTINUE_TASK: &str = "Your task is to determine whether each excerpt is from the same \
campaign chapter as the previous one, and based on this determination, either return the word 'CONTINUE.' \
or generate a music description in english. If no previous transcript has been provided, consider that the \
current excerpt is the beginning of a new chapter. For each transcript excerpt you will describe a piece of \
background music that matches that excerpt. If the excerpt is part of the same story chapter as the previous \
excerpt, the given answer should only contain the word 'CONTINUE.' Your description will be fed to a text to \
music model. The description should be concise. Do not mention anything about the dialog excerpt.";

impl Strategy {
    pub const ALL: [Strategy; 5] = [
        Strategy::Direct,
        Strategy::DirectTranslated,
        Strategy::EmotionClassify,
        Strategy::DescribeFree,
        Strategy::DescribeWithContinue,
    ];

    /// Stable name used for output directories and file names.
    pub fn name(self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::DirectTranslated => "direct_translated",
            Strategy::EmotionClassify => "emotion",
            Strategy::DescribeFree => "describe",
            Strategy::DescribeWithContinue => "describe_continue",
        }
    }

    /// Whether window text goes through a chat model.
    pub fn uses_chat(self) -> bool {
        !matches!(self, Strategy::Direct)
    }

    /// Whether the chat model is told it may answer with [`CONTINUE_SENTINEL`].
    pub fn detects_continue(self) -> bool {
        matches!(self, Strategy::DescribeWithContinue)
    }

    pub fn decoration(self) -> PromptDecoration {
        let prefix = match self {
            Strategy::Direct | Strategy::DirectTranslated => DIALOG_PREFIX,
            Strategy::EmotionClassify => EMOTION_PREFIX,
            Strategy::DescribeFree | Strategy::DescribeWithContinue => "",
        };
        PromptDecoration {
            prefix: prefix.to_owned(),
            suffix: String::new(),
        }
    }

    /// Task instructions pinned at the top of the chat, if the strategy uses one.
    ///
    /// `campaign` names what the transcript is about (e.g. an RPG campaign).
    pub fn setup(self, campaign: &str) -> Option<String> {
        let common = format!(
            "You are going to receive a series of Role-playing Game (RPG) video transcript excerpts \
from players dialogs playing a campaing called {campaign}. "
        );

        let task = match self {
            Strategy::Direct => return None,
            Strategy::DirectTranslated => TRANSLATE_TASK.to_owned(),
            Strategy::EmotionClassify => EMOTION_TASK.to_owned(),
            Strategy::DescribeFree => format!("{DESCRIBE_TASK} {EXAMPLE_PROMPT}"),
            Strategy::DescribeWithContinue => format!("{DESCRIBE_CONTINUE_TASK} {EXAMPLE_PROMPT}"),
        };

        Some(common + &task)
    }

    /// One-paragraph description for run log headers.
    pub fn description(self) -> &'static str {
        match self {
            Strategy::Direct => "Dialog text is fed directly to the music model.",
            Strategy::DirectTranslated => {
                "Dialog is translated to English by the chat model, then fed to the music model."
            }
            Strategy::EmotionClassify => {
                "The chat model classifies each dialog as Happy, Calm, Agitated or Suspenseful and \
the music model is conditioned on that emotion."
            }
            Strategy::DescribeFree => {
                "The chat model describes a piece of music for each dialog and the description \
conditions the music model."
            }
            Strategy::DescribeWithContinue => {
                "The chat model describes music for each dialog, or answers CONTINUE. when the \
dialog continues the previous chapter, in which case the music is extended from the previous audio \
tokens without a new text prompt."
            }
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_direct_skips_the_chat_model() {
        for s in Strategy::ALL {
            assert_eq!(s.uses_chat(), s.setup("Call Of The Wild").is_some(), "{s}");
        }
        assert!(!Strategy::Direct.uses_chat());
    }

    #[test]
    fn continue_detection_is_mentioned_in_its_setup() {
        let setup = Strategy::DescribeWithContinue
            .setup("Call Of The Wild")
            .expect("setup");
        assert!(setup.contains(CONTINUE_SENTINEL));
        assert!(setup.contains("Call Of The Wild"));
        assert!(Strategy::DescribeWithContinue.detects_continue());
        assert!(!Strategy::DescribeFree.detects_continue());
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<&str> = Strategy::ALL.iter().map(|s| s.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Strategy::ALL.len());
    }

    #[test]
    fn decoration_wraps_text() {
        let deco = Strategy::EmotionClassify.decoration();
        assert_eq!(
            deco.apply("Calm"),
            "Background music for a Role-playing Game (RPG) dialog, with the following emotion: Calm"
        );
        assert_eq!(Strategy::DescribeFree.decoration().apply("x"), "x");
    }
}
