//! OpenAI-compatible provider for OpenAI, Mistral and LM Studio.
//!
//! This module is only available when the `openai` feature is enabled. All
//! three vendors expose `/embeddings` and `/chat/completions` with the same
//! request shape; they differ in base URL, default models and whether an API
//! key is needed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Call, decode, env_var, send};
use crate::error::{RagError, Result};
use crate::provider::{
    AiProvider, CompletionOptions, CompletionProvider, EmbeddingProvider, ProviderKind,
};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const MISTRAL_BASE_URL: &str = "https://api.mistral.ai/v1";
const LMSTUDIO_BASE_URL: &str = "http://localhost:1234/v1";

/// An [`AiProvider`] speaking the OpenAI REST dialect.
///
/// # Configuration
///
/// - `base_url` – vendor default, overridable with [`with_base_url`](Self::with_base_url)
/// - `model` / `embedding_model` – vendor defaults
/// - `api_key` – required for OpenAI and Mistral, unused by LM Studio
///
/// # Example
///
/// ```rust,ignore
/// use noteweave_rag::providers::openai::OpenAIProvider;
///
/// let provider = OpenAIProvider::from_env(ProviderKind::OpenAI)?;
/// let embedding = provider.embed("hello world").await?;
/// ```
#[derive(Debug, Clone)]
pub struct OpenAIProvider {
    kind: ProviderKind,
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    embedding_model: String,
    dimensions: usize,
    /// If set, passed to the API for Matryoshka dimension truncation.
    request_dimensions: Option<usize>,
    context_window_chars: Option<usize>,
}

impl OpenAIProvider {
    /// An OpenAI provider using `text-embedding-3-small` and `gpt-4o-mini`.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::for_kind(ProviderKind::OpenAI, Some(api_key.into()))
    }

    /// A Mistral provider using `mistral-embed` and `mistral-large-latest`.
    pub fn mistral(api_key: impl Into<String>) -> Self {
        Self::for_kind(ProviderKind::Mistral, Some(api_key.into()))
    }

    /// An LM Studio provider talking to a local server.
    pub fn lm_studio() -> Self {
        Self::for_kind(ProviderKind::LmStudio, None)
    }

    /// Build the provider for `kind` from the environment.
    ///
    /// Reads `OPENAI_API_KEY`, `MISTRAL_API_KEY` or `LMSTUDIO_URL`. A missing
    /// key is not an error here; [`check_credentials`](AiProvider::check_credentials)
    /// reports it when the provider is first used.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `kind` is not OpenAI compatible.
    pub fn from_env(kind: ProviderKind) -> Result<Self> {
        match kind {
            ProviderKind::OpenAI => Ok(Self::for_kind(kind, env_var("OPENAI_API_KEY"))),
            ProviderKind::Mistral => Ok(Self::for_kind(kind, env_var("MISTRAL_API_KEY"))),
            ProviderKind::LmStudio => {
                let provider = Self::lm_studio();
                Ok(match env_var("LMSTUDIO_URL") {
                    Some(url) => provider.with_base_url(url),
                    None => provider,
                })
            }
            other => Err(RagError::ConfigError(format!(
                "{other} is not an OpenAI-compatible provider"
            ))),
        }
    }

    fn for_kind(kind: ProviderKind, api_key: Option<String>) -> Self {
        let (base_url, model, embedding_model, dimensions) = match kind {
            ProviderKind::Mistral => {
                (MISTRAL_BASE_URL, "mistral-large-latest", "mistral-embed", 1024)
            }
            ProviderKind::LmStudio => {
                (LMSTUDIO_BASE_URL, "local-model", "nomic-embed-text-v1.5", 768)
            }
            _ => (OPENAI_BASE_URL, "gpt-4o-mini", "text-embedding-3-small", 1536),
        };
        Self {
            kind,
            client: reqwest::Client::new(),
            base_url: base_url.to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            model: model.to_string(),
            embedding_model: embedding_model.to_string(),
            dimensions,
            request_dimensions: None,
            context_window_chars: None,
        }
    }

    /// Point the provider at another server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the chat model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the embedding model and its output size.
    pub fn with_embedding_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.embedding_model = model.into();
        self.dimensions = dimensions;
        self
    }

    /// Ask the API to truncate embeddings to `dims` (OpenAI `text-embedding-3-*` only).
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }

    /// Advertise the model's context window in characters.
    pub fn with_context_window_chars(mut self, chars: usize) -> Self {
        self.context_window_chars = Some(chars);
        self
    }

    fn name_str(&self) -> &'static str {
        self.kind.as_str()
    }

    fn post(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let request = self.client.post(format!("{}/{endpoint}", self.base_url));
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

// API request/response types

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

// Trait implementations

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| Call::Embedding.error(self.name_str(), "API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let provider = self.name_str();
        debug!(
            provider,
            batch_size = texts.len(),
            model = %self.embedding_model,
            "embedding batch"
        );

        let body = EmbeddingRequest {
            model: &self.embedding_model,
            input: texts.to_vec(),
            dimensions: self.request_dimensions,
        };
        let response = send(self.post("embeddings").json(&body), provider, Call::Embedding).await?;
        let parsed: EmbeddingResponse = decode(response, provider, Call::Embedding).await?;

        if parsed.data.len() != texts.len() {
            return Err(Call::Embedding.error(
                provider,
                format!("expected {} embeddings, got {}", texts.len(), parsed.data.len()),
            ));
        }
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[async_trait]
impl CompletionProvider for OpenAIProvider {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        let provider = self.name_str();
        let model = options.model.as_deref().unwrap_or(&self.model);
        debug!(provider, model, prompt_len = prompt.len(), "requesting completion");

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = options.system.as_deref() {
            messages.push(ChatMessage { role: "system", content: system });
        }
        messages.push(ChatMessage { role: "user", content: prompt });

        let body = ChatRequest {
            model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            top_p: options.top_p,
            frequency_penalty: options.frequency_penalty,
            presence_penalty: options.presence_penalty,
        };
        let request = self.post("chat/completions").json(&body);
        let response = send(request, provider, Call::Completion).await?;
        let parsed: ChatResponse = decode(response, provider, Call::Completion).await?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Call::Completion.error(provider, "API returned no choices"))
    }

    fn context_window_chars(&self) -> Option<usize> {
        self.context_window_chars
    }
}

impl AiProvider for OpenAIProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn check_credentials(&self) -> Result<()> {
        if self.kind.requires_api_key() && self.api_key.is_none() {
            let var = match self.kind {
                ProviderKind::Mistral => "MISTRAL_API_KEY",
                _ => "OPENAI_API_KEY",
            };
            return Err(RagError::ProviderNotConfigured {
                provider: self.kind.to_string(),
                reason: format!("API key not set ({var})"),
            });
        }
        Ok(())
    }
}
