//! HTTP-backed [`AiProvider`](crate::provider::AiProvider) implementations.
//!
//! Each vendor sits behind its own cargo feature:
//!
//! - `ollama`: [`ollama::OllamaProvider`]
//! - `openai`: [`openai::OpenAIProvider`] for OpenAI, Mistral and LM Studio
//! - `anthropic`: [`anthropic::AnthropicProvider`]

#[cfg(feature = "anthropic")]
pub mod anthropic;
#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;

use serde::Deserialize;
use tracing::error;

use crate::error::RagError;

/// Which provider call failed, used to pick the error variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Call {
    Embedding,
    Completion,
}

impl Call {
    pub(crate) fn error(self, provider: &str, message: impl Into<String>) -> RagError {
        let provider = provider.to_string();
        let message = message.into();
        match self {
            Self::Embedding => RagError::EmbeddingFailed { provider, message },
            Self::Completion => RagError::CompletionFailed { provider, message },
        }
    }
}

/// Error bodies across vendors: `{"error": {"message": ...}}` or `{"error": "..."}`.
#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Object { message: String },
    Text(String),
}

/// Send `request`, mapping transport failures and non-success statuses to a
/// typed error for `call`.
pub(crate) async fn send(
    request: reqwest::RequestBuilder,
    provider: &str,
    call: Call,
) -> Result<reqwest::Response, RagError> {
    let response = request.send().await.map_err(|e| {
        error!(provider, error = %e, "request failed");
        call.error(provider, format!("request failed: {e}"))
    })?;

    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| match e.error {
            ErrorDetail::Object { message } | ErrorDetail::Text(message) => message,
        })
        .unwrap_or(body);

    error!(provider, %status, "API error");
    Err(call.error(provider, format!("API returned {status}: {detail}")))
}

/// Decode a successful JSON response body.
pub(crate) async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    provider: &str,
    call: Call,
) -> Result<T, RagError> {
    response.json().await.map_err(|e| {
        error!(provider, error = %e, "failed to parse response");
        call.error(provider, format!("failed to parse response: {e}"))
    })
}

/// Read an environment variable, treating an empty value as unset.
pub(crate) fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
