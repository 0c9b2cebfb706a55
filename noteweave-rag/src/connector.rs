//! External platform connectors (Notion, Microsoft 365, ClickUp, ...).
//!
//! A connector only fetches items; the orchestrator turns them into
//! documents and ingests them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{Document, Metadata, SOURCE_KEY, TITLE_KEY};
use crate::error::Result;
use crate::progress::{ProgressCallback, ProgressReporter};

/// Metadata key naming the platform an item came from.
pub const PLATFORM_KEY: &str = "platform";

/// One item fetched from an external platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformItem {
    /// Identifier on the platform.
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// Text content.
    pub content: String,
    /// Platform-specific fields.
    #[serde(default)]
    pub metadata: Metadata,
}

impl PlatformItem {
    /// Create an item with no extra metadata.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    /// Convert into a document whose id and `source` are `{platform}:{id}`.
    pub fn into_document(self, platform: &str) -> Document {
        let source = format!("{platform}:{}", self.id);
        Document::new(source.clone(), self.content, source.clone())
            .with_extra_metadata(&self.metadata)
            .with_metadata(SOURCE_KEY, source)
            .with_metadata(TITLE_KEY, self.title)
            .with_metadata(PLATFORM_KEY, Value::String(platform.to_string()))
    }
}

/// A source of documents on an external platform.
#[async_trait]
pub trait PlatformConnector: Send + Sync {
    /// Short platform name, used as the `source` prefix.
    fn platform(&self) -> &str;

    /// Fetch every item visible to the connector.
    async fn fetch_items(
        &self,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<Vec<PlatformItem>>;
}

/// A connector serving a fixed list of items.
#[derive(Debug, Clone)]
pub struct StaticConnector {
    platform: String,
    items: Vec<PlatformItem>,
}

impl StaticConnector {
    /// A connector for `platform` returning `items`.
    pub fn new(platform: impl Into<String>, items: Vec<PlatformItem>) -> Self {
        Self { platform: platform.into(), items }
    }
}

#[async_trait]
impl PlatformConnector for StaticConnector {
    fn platform(&self) -> &str {
        &self.platform
    }

    async fn fetch_items(
        &self,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<Vec<PlatformItem>> {
        let mut reporter = ProgressReporter::new(progress, self.items.len());
        reporter.start();
        for item in &self.items {
            reporter.advance(Some(&item.id));
        }
        reporter.complete();
        Ok(self.items.clone())
    }
}
