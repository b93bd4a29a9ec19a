//! Model client — chat completions and embeddings over an OpenAI-shaped API
//!
//! One `ModelClient` serves both call shapes:
//! - `complete_chat` — `POST {base}/chat/completions`
//! - `embed` / `embed_many` — `POST {base}/embeddings`
//!
//! Transient failures (429, 5xx, connect/timeout) are retried with exponential
//! backoff (250ms, 500ms, ... by default); everything else propagates after a
//! single attempt. The client holds no mutable state, so concurrent calls are
//! independent.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_retry::RetryIf;

/// Default chat completion model
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Default embedding model and its fixed output dimensionality
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const EMBEDDING_DIMENSIONS: usize = 1536;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_CHAT_TEMPERATURE: f32 = 0.2;
const DEFAULT_RETRIES: usize = 2;
const DEFAULT_BASE_DELAY_MS: u64 = 250;

// ============================================================================
// Message types
// ============================================================================

/// Role of a prompt message, serialized lowercase on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }

    /// Parse a stored role string; unknown values default to `User` so a
    /// corrupted row degrades the prompt rather than failing the request.
    pub fn parse(s: &str) -> ChatRole {
        match s {
            "system" => ChatRole::System,
            "assistant" => ChatRole::Assistant,
            _ => ChatRole::User,
        }
    }
}

/// An ephemeral prompt message. Built fresh per request, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: ChatRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Per-call overrides for `complete_chat`.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub retries: Option<usize>,
}

/// The usable part of a chat completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub content: String,
    pub model: String,
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Missing API key")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limited by inference API: {message}")]
    RateLimited { message: String },

    #[error("Inference API server error ({code}): {message}")]
    ServerError { code: u16, message: String },

    #[error("Invalid request ({code}): {message}")]
    InvalidRequest { code: u16, message: String },

    #[error("Inference API returned no usable payload")]
    EmptyResponse,

    #[error("Invalid embedding: expected {expected} dimensions, got {actual}")]
    InvalidDimensions { expected: usize, actual: usize },

    #[error("Model unavailable after {attempts} attempts: {last}")]
    Unavailable { attempts: usize, last: String },
}

impl ModelError {
    /// A transient failure worth another attempt: rate limit, 5xx, or a
    /// network-level connect/timeout. Everything else is permanent — notably
    /// an empty payload, which is a content problem rather than a transport one.
    pub fn is_retriable(&self) -> bool {
        match self {
            ModelError::RateLimited { .. } | ModelError::ServerError { .. } => true,
            ModelError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

// ============================================================================
// Config
// ============================================================================

/// Model client configuration. The bearer credential comes from the
/// environment when not supplied explicitly; its absence is fatal at
/// construction time.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub api_key: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub retries: usize,
    pub base_delay_ms: u64,
}

impl ModelConfig {
    pub fn new(api_key: Option<String>) -> Self {
        let api_key = api_key
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_default();

        Self {
            api_key,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimensions: EMBEDDING_DIMENSIONS,
            retries: DEFAULT_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
        }
    }
}

// ============================================================================
// Wire structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    messages: &'a [PromptMessage],
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// ModelClient
// ============================================================================

/// Client for the external inference API.
#[derive(Debug, Clone)]
pub struct ModelClient {
    client: Client,
    config: ModelConfig,
    base_url: String,
}

impl ModelClient {
    pub fn new(config: ModelConfig) -> Result<Self, ModelError> {
        Self::with_base_url(config, DEFAULT_BASE_URL.to_string())
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(config: ModelConfig, base_url: String) -> Result<Self, ModelError> {
        if config.api_key.is_empty() {
            return Err(ModelError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    pub fn embedding_dimensions(&self) -> usize {
        self.config.embedding_dimensions
    }

    /// Issue a chat completion request. `messages` must be non-empty.
    pub async fn complete_chat(
        &self,
        messages: &[PromptMessage],
        opts: &ChatOptions,
    ) -> Result<ChatCompletion, ModelError> {
        if messages.is_empty() {
            return Err(ModelError::InvalidRequest {
                code: 400,
                message: "messages must not be empty".to_string(),
            });
        }

        let model = opts.model.as_deref().unwrap_or(&self.config.chat_model);
        let request = ChatCompletionRequest {
            model,
            temperature: opts.temperature.unwrap_or(DEFAULT_CHAT_TEMPERATURE),
            max_tokens: opts.max_tokens,
            messages,
        };

        let retries = opts.retries.unwrap_or(self.config.retries);
        let response: ChatCompletionResponse = self
            .with_retries(retries, || self.post_json("chat/completions", &request))
            .await?;

        let model = response.model.unwrap_or_else(|| model.to_string());
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or(ModelError::EmptyResponse)?;
        let content = choice.message.content.ok_or(ModelError::EmptyResponse)?;

        Ok(ChatCompletion { content, model })
    }

    /// Embed a single text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let input = [text.to_string()];
        let mut vectors = self.embed_many(&input).await?;
        if vectors.is_empty() {
            return Err(ModelError::EmptyResponse);
        }
        Ok(vectors.swap_remove(0))
    }

    /// Embed a batch of texts, preserving input order.
    pub async fn embed_many(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.config.embedding_model,
            input: inputs,
        };

        let response: EmbeddingResponse = self
            .with_retries(self.config.retries, || {
                self.post_json("embeddings", &request)
            })
            .await?;

        if response.data.is_empty() {
            return Err(ModelError::EmptyResponse);
        }

        let expected = self.config.embedding_dimensions;
        let mut vectors = Vec::with_capacity(response.data.len());
        for item in response.data {
            if item.embedding.len() != expected {
                return Err(ModelError::InvalidDimensions {
                    expected,
                    actual: item.embedding.len(),
                });
            }
            vectors.push(item.embedding);
        }

        Ok(vectors)
    }

    /// Run `action` with up to `retries` additional attempts for retriable
    /// failures. Delay before attempt n's retry is `base × 2^(n-1)`.
    async fn with_retries<T, F, Fut>(&self, retries: usize, action: F) -> Result<T, ModelError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ModelError>>,
    {
        // Delays double from the exact configured base: base, 2×base, 4×base, ...
        let base = self.config.base_delay_ms;
        let strategy = (0..retries as u32)
            .map(move |attempt| Duration::from_millis(base.saturating_mul(1u64 << attempt.min(32))));

        match RetryIf::spawn(strategy, action, |e: &ModelError| e.is_retriable()).await {
            Ok(value) => Ok(value),
            Err(e) if e.is_retriable() => {
                let attempts = retries + 1;
                tracing::error!(attempts, error = %e, "All inference attempts failed");
                Err(ModelError::Unavailable {
                    attempts,
                    last: e.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ModelError> {
        let url = format!("{}/{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or(error_body);
            let code = status.as_u16();

            return Err(match code {
                429 => ModelError::RateLimited { message },
                c if c >= 500 => ModelError::ServerError { code: c, message },
                c => {
                    tracing::error!(code = c, message = %message, "Inference API rejected request");
                    ModelError::InvalidRequest { code: c, message }
                }
            });
        }

        Ok(response.json().await?)
    }
}

// ============================================================================
// TESTS
// ============================================================================
