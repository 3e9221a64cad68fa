//! [`MusicGenerator`] backed by an HTTP generation server.
//!
//! The server owns the model and speaks JSON:
//!
//! - `GET  {base}/info` → `{"sample_rate", "frame_rate"}`
//! - `POST {base}/generate` → tokens
//! - `POST {base}/continue` → tokens (head reproduces the prompt tokens)
//! - `POST {base}/decode` → `{"sample_rate", "channels", "samples"}`
//!
//! Tokens travel as `{"batch", "codebooks", "frames", "codes"}` with codes row-major.

use std::time::Duration;

use anyhow::{Context, Result, ensure};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::generator::{GenerationParams, MusicGenerator};
use crate::tokens::TokenStream;
use crate::waveform::Waveform;

pub struct RemoteGenerator {
    client: Client,
    base_url: String,
    params: GenerationParams,
    seed: u64,
}

#[derive(Debug, Deserialize)]
struct Info {
    sample_rate: u32,
    frame_rate: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireTokens {
    batch: usize,
    codebooks: usize,
    frames: usize,
    codes: Vec<u32>,
}

impl From<&TokenStream> for WireTokens {
    fn from(tokens: &TokenStream) -> Self {
        Self {
            batch: tokens.batch(),
            codebooks: tokens.codebooks(),
            frames: tokens.frames(),
            codes: tokens.codes().to_vec(),
        }
    }
}

impl TryFrom<WireTokens> for TokenStream {
    type Error = anyhow::Error;

    fn try_from(wire: WireTokens) -> Result<Self> {
        TokenStream::new(wire.batch, wire.codebooks, wire.frames, wire.codes)
    }
}

#[derive(Debug, Deserialize)]
struct WireAudio {
    sample_rate: u32,
    channels: u16,
    samples: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: Option<&'a str>,
    seed: u64,
    duration: u32,
    extend_stride: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tokens: Option<WireTokens>,
}

#[derive(Debug, Serialize)]
struct DecodeRequest {
    tokens: WireTokens,
}

impl RemoteGenerator {
    /// Connect to the server at `base_url` and read its codec rates.
    pub fn connect(base_url: &str) -> Result<Self> {
        // Generation on a busy GPU can take minutes per request.
        let client = Client::builder()
            .user_agent("bardic")
            .timeout(Duration::from_secs(1800))
            .build()
            .context("failed to build HTTP client")?;

        let base_url = base_url.trim_end_matches('/').to_owned();
        let url = format!("{base_url}/info");
        let resp = client
            .get(&url)
            .send()
            .with_context(|| format!("request failed: {url}"))?
            .error_for_status()
            .with_context(|| format!("generator info failed (bad status): {url}"))?;
        let info: Info =
            serde_json::from_reader(resp).context("failed to parse generator info")?;

        Ok(Self {
            client,
            base_url,
            params: GenerationParams {
                sample_rate: info.sample_rate,
                frame_rate: info.frame_rate,
                ..GenerationParams::default()
            },
            seed: 0,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post<B: Serialize, T: DeserializeOwned>(&self, endpoint: &str, body: &B) -> Result<T> {
        let url = format!("{}/{endpoint}", self.base_url);
        let body = serde_json::to_vec(body)?;

        let resp = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .with_context(|| format!("request failed: {url}"))?
            .error_for_status()
            .with_context(|| format!("{endpoint} failed (bad status): {url}"))?;

        serde_json::from_reader(resp).with_context(|| format!("failed to parse {endpoint} response"))
    }

    fn request<'a>(&self, prompt: Option<&'a str>, tokens: Option<WireTokens>) -> GenerateRequest<'a> {
        GenerateRequest {
            prompt,
            seed: self.seed,
            duration: self.params.duration,
            extend_stride: self.params.extend_stride,
            tokens,
        }
    }
}

impl MusicGenerator for RemoteGenerator {
    fn params(&self) -> GenerationParams {
        self.params
    }

    fn set_generation_params(&mut self, duration: u32, extend_stride: u32) -> Result<()> {
        ensure!(
            extend_stride > 0 && extend_stride <= duration,
            "extend stride {extend_stride}s must be in 1..={duration}s"
        );
        self.params.duration = duration;
        self.params.extend_stride = extend_stride;
        Ok(())
    }

    fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }

    fn generate(&mut self, prompt: Option<&str>) -> Result<TokenStream> {
        let wire: WireTokens = self.post("generate", &self.request(prompt, None))?;
        wire.try_into()
    }

    fn continue_from(
        &mut self,
        prompt_tokens: &TokenStream,
        prompt: Option<&str>,
    ) -> Result<TokenStream> {
        let body = self.request(prompt, Some(prompt_tokens.into()));
        let wire: WireTokens = self.post("continue", &body)?;
        wire.try_into()
    }

    fn decode(&mut self, tokens: &TokenStream) -> Result<Waveform> {
        let body = DecodeRequest {
            tokens: tokens.into(),
        };
        let audio: WireAudio = self.post("decode", &body)?;
        Waveform::new(audio.sample_rate, audio.channels, audio.samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continuation_request_carries_tokens_and_settings() -> anyhow::Result<()> {
        let tokens = TokenStream::from_rows(&[vec![1, 2], vec![3, 4]])?;
        let body = GenerateRequest {
            prompt: None,
            seed: 9,
            duration: 30,
            extend_stride: 10,
            tokens: Some((&tokens).into()),
        };

        let value = serde_json::to_value(&body)?;
        assert!(value["prompt"].is_null());
        assert_eq!(value["seed"], 9);
        assert_eq!(value["tokens"]["codebooks"], 2);
        assert_eq!(value["tokens"]["codes"], serde_json::json!([1, 2, 3, 4]));
        Ok(())
    }

    #[test]
    fn generate_request_omits_tokens() -> anyhow::Result<()> {
        let body = GenerateRequest {
            prompt: Some("calm harp"),
            seed: 1,
            duration: 30,
            extend_stride: 10,
            tokens: None,
        };
        let value = serde_json::to_value(&body)?;
        assert!(value.get("tokens").is_none());
        assert_eq!(value["prompt"], "calm harp");
        Ok(())
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let wire = WireTokens {
            batch: 1,
            codebooks: 4,
            frames: 10,
            codes: vec![0; 3],
        };
        assert!(TokenStream::try_from(wire).is_err());
    }
}
