//! Anthropic provider using the messages API.
//!
//! This module is only available when the `anthropic` feature is enabled.
//! Anthropic offers no embedding endpoint, so embedding calls fail with
//! [`RagError::EmbeddingFailed`]; pair it with another embedding provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Call, decode, env_var, send};
use crate::error::{RagError, Result};
use crate::provider::{
    AiProvider, CompletionOptions, CompletionProvider, EmbeddingProvider, ProviderKind,
};

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-opus-20240229";
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// An [`AiProvider`] backed by `/v1/messages`.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl AnthropicProvider {
    /// A provider authenticating with `api_key`.
    pub fn new(api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        Self {
            client: reqwest::Client::new(),
            base_url: ANTHROPIC_BASE_URL.to_string(),
            api_key: Some(api_key).filter(|k| !k.is_empty()),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// A provider using `ANTHROPIC_API_KEY`. A missing key surfaces from
    /// [`check_credentials`](AiProvider::check_credentials).
    pub fn from_env() -> Self {
        Self::new(env_var("ANTHROPIC_API_KEY").unwrap_or_default())
    }

    /// Point the provider at another server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[async_trait]
impl EmbeddingProvider for AnthropicProvider {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::EmbeddingFailed {
            provider: "anthropic".into(),
            message: "Anthropic does not offer embeddings; configure another embedding provider"
                .into(),
        })
    }

    fn dimensions(&self) -> usize {
        0
    }
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        self.check_credentials()?;
        let model = options.model.as_deref().unwrap_or(&self.model);
        debug!(provider = "anthropic", model, prompt_len = prompt.len(), "requesting completion");

        let body = MessagesRequest {
            model,
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            messages: vec![Message { role: "user", content: prompt }],
            system: options.system.as_deref(),
            temperature: options.temperature,
            top_p: options.top_p,
        };
        let request = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.as_deref().unwrap_or_default())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        let response = send(request, "anthropic", Call::Completion).await?;
        let parsed: MessagesResponse = decode(response, "anthropic", Call::Completion).await?;

        let text: String = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect();
        if text.is_empty() {
            return Err(Call::Completion.error("anthropic", "API returned no text content"));
        }
        Ok(text)
    }
}

impl AiProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn check_credentials(&self) -> Result<()> {
        if self.api_key.is_none() {
            return Err(RagError::ProviderNotConfigured {
                provider: "anthropic".into(),
                reason: "API key not set (ANTHROPIC_API_KEY)".into(),
            });
        }
        Ok(())
    }
}
