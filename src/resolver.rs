//! Dialog window → music prompt.

use tracing::{info, warn};

use crate::chat::{ChatBackend, ChatSession};
use crate::strategy::{CONTINUE_SENTINEL, PromptDecoration, Strategy};

/// What the generator should be conditioned on for one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedPrompt {
    /// Condition on this text.
    Text(String),

    /// The chat model asked to extend the previous audio with no new text.
    Continue,

    /// The chat model gave no usable answer; generate without text conditioning.
    Empty,
}

impl ResolvedPrompt {
    /// Text conditioning for the generator, if any.
    pub fn conditioning(&self) -> Option<&str> {
        match self {
            ResolvedPrompt::Text(text) => Some(text),
            ResolvedPrompt::Continue | ResolvedPrompt::Empty => None,
        }
    }

    /// Human-readable form for the run log.
    pub fn display_text(&self) -> &str {
        match self {
            ResolvedPrompt::Text(text) => text,
            ResolvedPrompt::Continue => "None (CONTINUE.)",
            ResolvedPrompt::Empty => "None (no reply)",
        }
    }
}

/// Resolves prompts for one run according to a [`Strategy`].
///
/// `Direct` resolves locally; every other strategy talks to the chat session.
pub struct PromptResolver<C> {
    strategy: Strategy,
    decoration: PromptDecoration,
    chat: Option<ChatSession<C>>,
}

impl<C: ChatBackend> PromptResolver<C> {
    /// A resolver that never calls a chat model.
    pub fn mute(strategy: Strategy) -> Self {
        Self {
            strategy,
            decoration: strategy.decoration(),
            chat: None,
        }
    }

    /// A resolver backed by a chat session.
    pub fn with_chat(strategy: Strategy, chat: ChatSession<C>) -> Self {
        Self {
            strategy,
            decoration: strategy.decoration(),
            chat: Some(chat),
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn decoration(&self) -> &PromptDecoration {
        &self.decoration
    }

    pub fn chat(&self) -> Option<&ChatSession<C>> {
        self.chat.as_ref()
    }

    /// Send the strategy's setup instructions, if it has any and a chat session exists.
    pub fn setup(&mut self, campaign: &str) {
        let Some(chat) = self.chat.as_mut() else {
            return;
        };
        if let Some(instructions) = self.strategy.setup(campaign) {
            chat.setup(&instructions);
            info!(strategy = %self.strategy, "chat setup sent");
        }
    }

    /// Resolve the prompt for one dialog window.
    pub fn resolve(&mut self, dialog: &str) -> ResolvedPrompt {
        let Some(chat) = self.chat.as_mut() else {
            return ResolvedPrompt::Text(self.decoration.apply(dialog));
        };

        let reply = chat.send(dialog);
        let reply = normalize_reply(&reply);

        if self.strategy.detects_continue() && reply == CONTINUE_SENTINEL {
            info!("received CONTINUE., extending previous audio without a text prompt");
            return ResolvedPrompt::Continue;
        }
        if reply.is_empty() {
            warn!("empty chat reply, generating without text conditioning");
            return ResolvedPrompt::Empty;
        }

        ResolvedPrompt::Text(self.decoration.apply(reply))
    }
}

/// Strip surrounding whitespace and quote characters from a chat reply.
fn normalize_reply(reply: &str) -> &str {
    reply.trim().trim_matches('"').trim()
}
