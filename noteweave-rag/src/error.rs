//! Error types for the `noteweave-rag` crate.

use thiserror::Error;

/// Errors that can occur in knowledge-base operations.
///
/// Every failure mode has its own variant so front ends can render targeted
/// messages (for example "check your API key" versus "file not found").
#[derive(Debug, Error)]
pub enum RagError {
    /// An embedding length disagrees with the store dimension.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimension the store was configured with.
        expected: usize,
        /// The length of the offending embedding.
        actual: usize,
    },

    /// The requested provider is not registered or lacks a credential.
    #[error("Provider '{provider}' is not configured: {reason}")]
    ProviderNotConfigured {
        /// The provider that could not be resolved.
        provider: String,
        /// Why the provider is unusable.
        reason: String,
    },

    /// The embedding provider failed (network, auth, rate limit).
    #[error("Embedding failed ({provider}): {message}")]
    EmbeddingFailed {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The completion provider failed (network, auth, rate limit).
    #[error("Completion failed ({provider}): {message}")]
    CompletionFailed {
        /// The completion provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An operation referenced an unknown document id or a missing file.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Reading or writing persisted data failed.
    #[error("Persistence error ({path}): {message}")]
    Persistence {
        /// The file involved.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// An import payload failed shape validation. Nothing was replaced.
    #[error("Malformed import: {0}")]
    MalformedImport(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error occurred during document chunking.
    #[error("Chunking error: {0}")]
    ChunkingError(String),

    /// A provider call exceeded the caller-supplied timeout.
    #[error("{operation} timed out after {after_ms} ms")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout that elapsed.
        after_ms: u64,
    },

    /// The caller cancelled the operation.
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl RagError {
    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::ProviderNotConfigured { .. } => "provider_not_configured",
            Self::EmbeddingFailed { .. } => "embedding_failed",
            Self::CompletionFailed { .. } => "completion_failed",
            Self::NotFound(_) => "not_found",
            Self::Persistence { .. } => "persistence",
            Self::MalformedImport(_) => "malformed_import",
            Self::ConfigError(_) => "config",
            Self::ChunkingError(_) => "chunking",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled(_) => "cancelled",
        }
    }
}

/// A convenience result type for knowledge-base operations.
pub type Result<T> = std::result::Result<T, RagError>;
