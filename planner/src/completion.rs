//! Completion client: calls an OpenAI-compatible text completion endpoint.
//!
//! The local model server (Ollama, llama.cpp) exposes `/v1/completions`.
//! The client returns the response body untouched; `completion_text` pulls
//! the generated text out of the canonical envelope
//! `{"choices": [{"text": "..."}]}`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{snippet, PlanError};

pub const DEFAULT_MODEL: &str = "mistral:latest";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_MAX_TOKENS: u32 = 512;
/// Local models on modest hardware routinely take over a minute
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const COMPLETIONS_PATH: &str = "/v1/completions";

/// Optional sampling parameters; unset fields fall back to the defaults above
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Anything that can turn a prompt into a raw completion response body
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, PlanError>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionEnvelope {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: Option<String>,
}

/// Extract the generated text from a raw completion response body.
///
/// A response with no choices, or a null text, yields an empty string, which
/// the extractor then rejects as containing no JSON.
pub fn completion_text(body: &str) -> Result<String, PlanError> {
    let envelope: CompletionEnvelope =
        serde_json::from_str(body).map_err(|source| PlanError::InvalidEnvelope {
            source,
            snippet: snippet(body),
        })?;

    Ok(envelope
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.text)
        .map(|text| text.trim().to_string())
        .unwrap_or_default())
}

// ---------------------------------------------------------------------------
// HttpCompletionClient
// ---------------------------------------------------------------------------

/// Completion backend speaking HTTP to a configured base URL.
pub struct HttpCompletionClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpCompletionClient {
    pub fn new(base_url: &str) -> Result<Self, PlanError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, PlanError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(PlanError::Transport)?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, COMPLETIONS_PATH)
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionClient {
    async fn complete(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, PlanError> {
        let url = self.endpoint();
        let body = CompletionRequest {
            model,
            prompt: prompt.trim(),
            temperature: options.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            stream: false,
        };

        info!(
            %url,
            model,
            max_tokens = body.max_tokens,
            temperature = body.temperature,
            "Sending completion request"
        );

        let start = Instant::now();

        let resp = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(%url, timeout = e.is_timeout(), "Completion request failed: {e}");
                PlanError::Transport(e)
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable>".to_string());
            warn!(%url, %status, "Completion endpoint returned an error");
            return Err(PlanError::Upstream {
                status: status.as_u16(),
                body: snippet(&body_text),
            });
        }

        let text = resp.text().await.map_err(PlanError::Transport)?;

        debug!(
            model,
            latency_ms = start.elapsed().as_millis() as u64,
            bytes = text.len(),
            "Completion received"
        );

        Ok(text)
    }
}
