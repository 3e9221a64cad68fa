//! Bounded chat history and a blocking chat session on top of a [`ChatBackend`].
//!
//! The history keeps an optional pinned system message (the task setup) and a rolling FIFO
//! window of user/assistant turns. The pinned message is never evicted; the total length never
//! exceeds `window_size + 1`.

use std::collections::VecDeque;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::retry::{DEFAULT_ATTEMPTS, retry};

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Chat history with one reserved slot for the setup message.
#[derive(Debug, Clone)]
pub struct ChatState {
    pinned: Option<ChatMessage>,
    rolling: VecDeque<ChatMessage>,
    window_size: usize,
}

impl ChatState {
    /// `window_size` counts user/assistant turns; the pinned setup message is extra.
    pub fn new(window_size: usize) -> Self {
        Self {
            pinned: None,
            rolling: VecDeque::with_capacity(window_size + 1),
            window_size,
        }
    }

    /// Maximum number of messages held, pinned slot included.
    pub fn capacity(&self) -> usize {
        self.window_size + 1
    }

    /// Pin the system setup message at index 0, replacing any previous one.
    pub fn pin(&mut self, content: impl Into<String>) {
        self.pinned = Some(ChatMessage::new(Role::System, content));
        self.evict();
    }

    /// Append a turn, evicting the oldest non-pinned messages when over capacity.
    pub fn push(&mut self, message: ChatMessage) {
        self.rolling.push_back(message);
        self.evict();
    }

    fn evict(&mut self) {
        let limit = if self.pinned.is_some() {
            self.window_size
        } else {
            self.window_size + 1
        };
        while self.rolling.len() > limit {
            self.rolling.pop_front();
        }
    }

    pub fn pinned(&self) -> Option<&ChatMessage> {
        self.pinned.as_ref()
    }

    pub fn len(&self) -> usize {
        self.rolling.len() + usize::from(self.pinned.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages in send order: pinned first, then the rolling window.
    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.pinned.iter().chain(self.rolling.iter())
    }

    /// Owned copy of the history, as sent on the wire.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.iter().cloned().collect()
    }
}

/// Sampling options forwarded to the remote model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingOptions {
    pub seed: u64,
    pub temperature: f32,
    pub top_k: u32,
}

impl SamplingOptions {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            temperature: 0.4,
            top_k: 20,
        }
    }
}

/// One chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub options: SamplingOptions,
    /// How long the service should keep the model loaded after answering, in seconds.
    pub keep_alive_secs: u64,
}

/// A conversational model that answers a full chat history with one reply.
///
/// Errors are treated as transient by [`ChatSession`] and retried.
pub trait ChatBackend {
    fn chat(&self, request: &ChatRequest) -> Result<String>;
}

impl<T: ChatBackend + ?Sized> ChatBackend for &T {
    fn chat(&self, request: &ChatRequest) -> Result<String> {
        (**self).chat(request)
    }
}

impl<T: ChatBackend + ?Sized> ChatBackend for Box<T> {
    fn chat(&self, request: &ChatRequest) -> Result<String> {
        (**self).chat(request)
    }
}

/// Default keep-alive sent with every request.
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 300;

/// A stateful conversation: history plus the backend it is sent to.
pub struct ChatSession<C> {
    backend: C,
    state: ChatState,
    options: SamplingOptions,
    keep_alive_secs: u64,
    attempts: usize,
}

impl<C: ChatBackend> ChatSession<C> {
    pub fn new(backend: C, window_size: usize, seed: u64) -> Self {
        Self {
            backend,
            state: ChatState::new(window_size),
            options: SamplingOptions::with_seed(seed),
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
            attempts: DEFAULT_ATTEMPTS,
        }
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn options(&self) -> &SamplingOptions {
        &self.options
    }

    pub fn backend(&self) -> &C {
        &self.backend
    }

    /// Pin the task instructions and send them.
    ///
    /// The service's acknowledgement is recorded like any other assistant turn.
    pub fn setup(&mut self, instructions: &str) -> String {
        self.state.pin(instructions);
        self.exchange()
    }

    /// Send one user turn and return the reply, or `""` when every attempt failed.
    ///
    /// The user turn is recorded before the call and stays in the history even when the call
    /// fails; only a successful reply is recorded as an assistant turn.
    pub fn send(&mut self, text: &str) -> String {
        self.state.push(ChatMessage::new(Role::User, text));
        self.exchange()
    }

    fn exchange(&mut self) -> String {
        let request = ChatRequest {
            messages: self.state.snapshot(),
            options: self.options,
            keep_alive_secs: self.keep_alive_secs,
        };

        match retry(self.attempts, |_| self.backend.chat(&request)) {
            Ok(reply) => {
                debug!(history = self.state.len(), "chat reply received");
                self.state.push(ChatMessage::new(Role::Assistant, reply.clone()));
                reply
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "chat request failed, continuing without a reply");
                String::new()
            }
        }
    }
}
