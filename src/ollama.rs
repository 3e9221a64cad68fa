//! [`ChatBackend`] for an Ollama server (`POST /api/chat`, non-streaming).

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

use crate::chat::{ChatBackend, ChatMessage, ChatRequest};

/// Model used when none is configured.
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.1:70b";

/// Environment variable holding the `host:port` of the Ollama server.
pub const OLLAMA_ADDRESS_ENV: &str = "OLLAMA_ADDRES";

pub struct OllamaChat {
    client: Client,
    url: String,
    model: String,
}

impl OllamaChat {
    /// `address` is `host:port` (no scheme), e.g. `localhost:11434`.
    pub fn new(address: &str, model: impl Into<String>) -> Result<Self> {
        // Large models can take minutes to answer while loading.
        let client = Client::builder()
            .user_agent("bardic")
            .timeout(Duration::from_secs(600))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            url: format!("http://{address}/api/chat"),
            model: model.into(),
        })
    }

    /// Build a client from `OLLAMA_ADDRES`.
    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let address = std::env::var(OLLAMA_ADDRESS_ENV)
            .with_context(|| format!("{OLLAMA_ADDRESS_ENV} is not set"))?;
        Self::new(&address, model)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Serialize)]
struct Payload<'a> {
    model: &'a str,
    stream: bool,
    keep_alive: u64,
    options: PayloadOptions,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Serialize)]
struct PayloadOptions {
    seed: u64,
    temperature: f32,
    top_k: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

fn payload<'a>(model: &'a str, request: &'a ChatRequest) -> Payload<'a> {
    Payload {
        model,
        stream: false,
        keep_alive: request.keep_alive_secs,
        options: PayloadOptions {
            seed: request.options.seed,
            temperature: request.options.temperature,
            top_k: request.options.top_k,
        },
        messages: &request.messages,
    }
}

impl ChatBackend for OllamaChat {
    fn chat(&self, request: &ChatRequest) -> Result<String> {
        let body = serde_json::to_vec(&payload(&self.model, request))?;

        let resp = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .with_context(|| format!("request failed: {}", self.url))?
            .error_for_status()
            .with_context(|| format!("chat failed (bad status): {}", self.url))?;

        let parsed: ChatResponse =
            serde_json::from_reader(resp).context("failed to parse chat response")?;
        Ok(parsed.message.content)
    }
}
