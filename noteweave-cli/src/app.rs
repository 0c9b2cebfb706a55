//! The application context: one store, one provider registry and one
//! orchestrator, built once per invocation from [`Settings`].

use std::sync::Arc;
use std::time::Duration;

use noteweave_rag::{
    InMemoryVectorStore, MockProvider, ProviderKind, ProviderRegistry, RagConfig, RagError,
    RagOrchestrator, VectorStoreConfig,
};
use tracing::{debug, info};

use crate::cli::Settings;

/// Embedding size of the offline mock provider.
pub const MOCK_DIMENSIONS: usize = 384;

/// Everything a command needs.
pub struct App {
    settings: Settings,
    store: Arc<InMemoryVectorStore>,
    orchestrator: RagOrchestrator,
}

impl App {
    /// Build the context with providers read from the environment.
    ///
    /// # Errors
    ///
    /// Fails if the embedding provider is unavailable and no dimension was
    /// given, or if the configuration is invalid.
    pub async fn from_settings(settings: Settings) -> Result<Self, RagError> {
        let registry = registry_from_env(settings.dimension);
        Self::with_registry(settings, registry).await
    }

    /// Build the context around an explicit registry.
    ///
    /// # Errors
    ///
    /// See [`from_settings`](Self::from_settings).
    pub async fn with_registry(
        settings: Settings,
        registry: ProviderRegistry,
    ) -> Result<Self, RagError> {
        let embedding_kind = settings.embedding_kind();
        let dimension = match settings.dimension {
            Some(dimension) => dimension,
            None => embedding_dimension(&registry, embedding_kind)?,
        };

        let store_config =
            VectorStoreConfig::new(dimension, settings.metric).with_path(&settings.store);
        let store = Arc::new(InMemoryVectorStore::open(store_config).await?);

        let mut config = RagConfig::builder().embedding_provider(embedding_kind);
        if let Some(secs) = settings.timeout_secs {
            config = config.request_timeout(Duration::from_secs(secs));
        }

        let orchestrator = RagOrchestrator::builder()
            .config(config.build()?)
            .providers(registry)
            .vector_store(store.clone())
            .build()?;

        info!(
            store = %settings.store.display(),
            provider = %settings.provider,
            embedding_provider = %embedding_kind,
            dimension,
            "knowledge base opened"
        );
        Ok(Self { settings, store, orchestrator })
    }

    /// The settings this context was built from.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The knowledge base.
    pub fn store(&self) -> &InMemoryVectorStore {
        &self.store
    }

    /// The orchestrator over [`store`](Self::store).
    pub fn orchestrator(&self) -> &RagOrchestrator {
        &self.orchestrator
    }
}

fn embedding_dimension(registry: &ProviderRegistry, kind: ProviderKind) -> Result<usize, RagError> {
    let provider = registry.get(kind).ok_or_else(|| RagError::ProviderNotConfigured {
        provider: kind.to_string(),
        reason: "provider is not available in this build".to_string(),
    })?;
    match provider.dimensions() {
        0 => Err(RagError::ConfigError(format!(
            "{kind} cannot embed text; choose another --embedding-provider"
        ))),
        dimension => Ok(dimension),
    }
}

/// Every provider compiled into this binary, configured from the environment.
///
/// Missing API keys are not an error here; a provider without its key is
/// reported when it is first used.
pub fn registry_from_env(dimension: Option<usize>) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(MockProvider::new(dimension.unwrap_or(MOCK_DIMENSIONS))));

    #[cfg(feature = "ollama")]
    registry.register(Arc::new(noteweave_rag::providers::ollama::OllamaProvider::from_env()));

    #[cfg(feature = "openai")]
    for kind in [ProviderKind::OpenAI, ProviderKind::Mistral, ProviderKind::LmStudio] {
        match noteweave_rag::providers::openai::OpenAIProvider::from_env(kind) {
            Ok(provider) => {
                registry.register(Arc::new(provider));
            }
            Err(e) => debug!(provider = %kind, error = %e, "skipping provider"),
        }
    }

    #[cfg(feature = "anthropic")]
    registry.register(Arc::new(noteweave_rag::providers::anthropic::AnthropicProvider::from_env()));

    debug!(providers = ?registry.kinds(), "providers registered");
    registry
}
