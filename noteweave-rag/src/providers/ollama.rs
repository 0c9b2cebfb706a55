//! Ollama provider using a local Ollama server.
//!
//! This module is only available when the `ollama` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Call, decode, env_var, send};
use crate::error::Result;
use crate::provider::{
    AiProvider, CompletionOptions, CompletionProvider, EmbeddingProvider, ProviderKind,
};

/// The default Ollama host.
pub const DEFAULT_HOST: &str = "http://localhost:11434";

const DEFAULT_MODEL: &str = "llama3";
const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
const DEFAULT_DIMENSIONS: usize = 768;

/// An [`AiProvider`] backed by Ollama's `/api/embeddings` and `/api/generate`.
///
/// # Example
///
/// ```rust,ignore
/// use noteweave_rag::providers::ollama::OllamaProvider;
///
/// let provider = OllamaProvider::from_env().with_model("mistral");
/// ```
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: reqwest::Client,
    host: String,
    model: String,
    embedding_model: String,
    dimensions: usize,
}

impl OllamaProvider {
    /// A provider talking to `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            host: host.into().trim_end_matches('/').to_string(),
            model: DEFAULT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: DEFAULT_DIMENSIONS,
        }
    }

    /// A provider talking to `OLLAMA_HOST`, or the default local host.
    pub fn from_env() -> Self {
        Self::new(env_var("OLLAMA_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()))
    }

    /// Set the generation model.
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
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(
            provider = "ollama",
            text_len = text.len(),
            model = %self.embedding_model,
            "embedding text"
        );
        let body = EmbeddingRequest { model: &self.embedding_model, prompt: text };
        let request = self.client.post(format!("{}/api/embeddings", self.host)).json(&body);
        let response = send(request, "ollama", Call::Embedding).await?;
        let parsed: EmbeddingResponse = decode(response, "ollama", Call::Embedding).await?;
        if parsed.embedding.is_empty() {
            return Err(Call::Embedding.error("ollama", "API returned an empty embedding"));
        }
        Ok(parsed.embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        let model = options.model.as_deref().unwrap_or(&self.model);
        debug!(provider = "ollama", model, prompt_len = prompt.len(), "requesting completion");

        let body = GenerateRequest {
            model,
            prompt,
            system: options.system.as_deref(),
            stream: false,
            options: GenerateOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
                top_p: options.top_p,
                frequency_penalty: options.frequency_penalty,
                presence_penalty: options.presence_penalty,
            },
        };
        let request = self.client.post(format!("{}/api/generate", self.host)).json(&body);
        let response = send(request, "ollama", Call::Completion).await?;
        let parsed: GenerateResponse = decode(response, "ollama", Call::Completion).await?;
        Ok(parsed.response)
    }
}

impl AiProvider for OllamaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }
}
