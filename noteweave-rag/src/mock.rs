//! A deterministic in-process provider for tests and offline use.
//!
//! Embeddings are a normalized bag of hashed words, so texts sharing words
//! land close together under cosine similarity. Completions echo a canned
//! answer and every prompt is recorded for inspection.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{RagError, Result};
use crate::keywords::tokenize;
use crate::provider::{
    AiProvider, CompletionOptions, CompletionProvider, EmbeddingProvider, ProviderKind,
};

const DEFAULT_ANSWER: &str = "This is a mock answer.";

/// A provider that never leaves the process.
#[derive(Debug)]
pub struct MockProvider {
    dimensions: usize,
    answer: String,
    fixed_embeddings: HashMap<String, Vec<f32>>,
    embed_error: Option<String>,
    complete_error: Option<String>,
    delay: Option<Duration>,
    has_credentials: bool,
    context_window_chars: Option<usize>,
    prompts: Mutex<Vec<String>>,
}

impl MockProvider {
    /// A provider producing `dimensions`-long embeddings.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            answer: DEFAULT_ANSWER.to_string(),
            fixed_embeddings: HashMap::new(),
            embed_error: None,
            complete_error: None,
            delay: None,
            has_credentials: true,
            context_window_chars: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answer every completion with `answer`.
    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = answer.into();
        self
    }

    /// Return `embedding` whenever exactly `text` is embedded.
    pub fn with_embedding(mut self, text: impl Into<String>, embedding: Vec<f32>) -> Self {
        self.fixed_embeddings.insert(text.into(), embedding);
        self
    }

    /// Fail every embedding call with `message`.
    pub fn failing_embeddings(mut self, message: impl Into<String>) -> Self {
        self.embed_error = Some(message.into());
        self
    }

    /// Fail every completion call with `message`.
    pub fn failing_completions(mut self, message: impl Into<String>) -> Self {
        self.complete_error = Some(message.into());
        self
    }

    /// Sleep for `delay` before answering any call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Behave like a hosted provider whose API key is missing.
    pub fn without_credentials(mut self) -> Self {
        self.has_credentials = false;
        self
    }

    /// Advertise a context window.
    pub fn with_context_window_chars(mut self, chars: usize) -> Self {
        self.context_window_chars = Some(chars);
        self
    }

    /// Every prompt passed to [`complete`](CompletionProvider::complete) so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn hashed_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; self.dimensions];
        for word in tokenize(text) {
            let slot = fnv1a(&word.to_lowercase()) as usize % self.dimensions;
            embedding[slot] += 1.0;
        }
        let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            embedding.iter_mut().for_each(|x| *x /= norm);
        }
        embedding
    }
}

fn fnv1a(text: &str) -> u64 {
    text.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[async_trait]
impl EmbeddingProvider for MockProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.pause().await;
        if let Some(message) = &self.embed_error {
            return Err(RagError::EmbeddingFailed {
                provider: "mock".into(),
                message: message.clone(),
            });
        }
        if let Some(fixed) = self.fixed_embeddings.get(text) {
            return Ok(fixed.clone());
        }
        if self.dimensions == 0 {
            return Ok(Vec::new());
        }
        debug!(provider = "mock", text_len = text.len(), "embedding text");
        Ok(self.hashed_embedding(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    async fn complete(&self, prompt: &str, _options: &CompletionOptions) -> Result<String> {
        self.pause().await;
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if let Some(message) = &self.complete_error {
            return Err(RagError::CompletionFailed {
                provider: "mock".into(),
                message: message.clone(),
            });
        }
        Ok(self.answer.clone())
    }

    fn context_window_chars(&self) -> Option<usize> {
        self.context_window_chars
    }
}

impl AiProvider for MockProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }

    fn check_credentials(&self) -> Result<()> {
        if self.has_credentials {
            Ok(())
        } else {
            Err(RagError::ProviderNotConfigured {
                provider: "mock".into(),
                reason: "API key not set".into(),
            })
        }
    }
}
