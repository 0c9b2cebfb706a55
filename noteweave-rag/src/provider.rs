//! Provider traits, provider kinds and the provider registry.
//!
//! Every vendor integration implements [`AiProvider`], which combines
//! [`EmbeddingProvider`] and [`CompletionProvider`]. The orchestrator resolves
//! providers by [`ProviderKind`] through a [`ProviderRegistry`] built once at
//! startup.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// The vendors a knowledge base can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// A local Ollama server.
    Ollama,
    /// The OpenAI API.
    #[serde(rename = "openai")]
    OpenAI,
    /// The Anthropic messages API. Completion only.
    Anthropic,
    /// The Mistral API.
    Mistral,
    /// A local LM Studio server (OpenAI compatible).
    #[serde(rename = "lmstudio")]
    LmStudio,
    /// The deterministic in-process provider.
    Mock,
}

impl ProviderKind {
    /// Every provider kind.
    pub const ALL: [ProviderKind; 6] =
        [Self::Ollama, Self::OpenAI, Self::Anthropic, Self::Mistral, Self::LmStudio, Self::Mock];

    /// The serialized name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Mistral => "mistral",
            Self::LmStudio => "lmstudio",
            Self::Mock => "mock",
        }
    }

    /// Whether the vendor needs an API key.
    pub fn requires_api_key(self) -> bool {
        matches!(self, Self::OpenAI | Self::Anthropic | Self::Mistral)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "mistral" | "mistralai" => Ok(Self::Mistral),
            "lmstudio" | "lm-studio" => Ok(Self::LmStudio),
            "mock" => Ok(Self::Mock),
            other => Err(RagError::ConfigError(format!("unknown provider '{other}'"))),
        }
    }
}

/// Parameters for one completion call. Unset fields use the provider default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOptions {
    /// Model override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Nucleus sampling cutoff.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Penalty on repeated tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    /// Penalty on tokens already present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    /// System prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

impl CompletionOptions {
    /// Fill every unset field from `defaults`.
    pub fn or(self, defaults: &CompletionOptions) -> Self {
        Self {
            model: self.model.or_else(|| defaults.model.clone()),
            temperature: self.temperature.or(defaults.temperature),
            max_tokens: self.max_tokens.or(defaults.max_tokens),
            top_p: self.top_p.or(defaults.top_p),
            frequency_penalty: self.frequency_penalty.or(defaults.frequency_penalty),
            presence_penalty: self.presence_penalty.or(defaults.presence_penalty),
            system: self.system.or_else(|| defaults.system.clone()),
        }
    }
}

/// A provider that turns text into vectors.
///
/// Every vector a provider returns has [`dimensions`](Self::dimensions)
/// elements; the store rejects anything else.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, returning vectors in input order. Embeds one text
    /// at a time unless the vendor has a batch endpoint.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Length of the vectors this provider produces (0 if it cannot embed).
    fn dimensions(&self) -> usize;
}

/// A provider that turns a prompt into generated text.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String>;

    /// How many prompt characters the model comfortably accepts, if known.
    fn context_window_chars(&self) -> Option<usize> {
        None
    }
}

/// A vendor integration offering embeddings and completions.
pub trait AiProvider: EmbeddingProvider + CompletionProvider {
    /// Which vendor this is.
    fn kind(&self) -> ProviderKind;

    /// Human-readable name used in logs and errors.
    fn name(&self) -> &str {
        self.kind().as_str()
    }

    /// Check that the provider has what it needs to make calls.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ProviderNotConfigured`] when a credential is missing.
    fn check_credentials(&self) -> Result<()> {
        Ok(())
    }
}

/// The set of providers available to the orchestrator.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn AiProvider>>,
}

impl ProviderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under its own kind, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn AiProvider>) -> &mut Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, provider: Arc<dyn AiProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Whether a provider of this kind is registered.
    pub fn contains(&self, kind: ProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    /// Registered kinds in a stable order.
    pub fn kinds(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL.into_iter().filter(|kind| self.contains(*kind)).collect()
    }

    /// The provider registered for `kind`, without checking credentials.
    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn AiProvider>> {
        self.providers.get(&kind).cloned()
    }

    /// Look up a usable provider.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ProviderNotConfigured`] if the kind is not registered
    /// or its credentials are missing.
    pub fn resolve(&self, kind: ProviderKind) -> Result<Arc<dyn AiProvider>> {
        let provider = self.providers.get(&kind).ok_or_else(|| RagError::ProviderNotConfigured {
            provider: kind.to_string(),
            reason: "provider is not registered".to_string(),
        })?;
        provider.check_credentials()?;
        Ok(Arc::clone(provider))
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry").field("kinds", &self.kinds()).finish()
    }
}
