use std::{fmt, sync::Arc};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::domain::SaveOutcome;

/// One-based page number inside a loaded source document.
pub type PageNumber = u32;

/// Parses, copies pages between, and serializes documents in the underlying
/// binary format. The orchestrator drives one source at a time through
/// `load` -> `page_indices` -> `copy_pages` -> `append`.
#[async_trait]
pub trait MergeCollaborator: Send + Sync {
    type Output: Send;
    type Source: Send + Sync;
    type Page: Send;

    async fn create_empty(&self) -> Result<Self::Output>;
    async fn load(&self, payload: &[u8]) -> Result<Self::Source>;
    /// Every page of `source`, in the document's native order.
    fn page_indices(&self, source: &Self::Source) -> Vec<PageNumber>;
    /// Copies `pages` (content and referenced resources) into `output`'s
    /// object space, consuming `source`. Returned pages are detached until
    /// appended.
    async fn copy_pages(
        &self,
        output: &mut Self::Output,
        source: Self::Source,
        pages: &[PageNumber],
    ) -> Result<Vec<Self::Page>>;
    async fn append(&self, output: &mut Self::Output, page: Self::Page) -> Result<()>;
    async fn serialize(&self, output: Self::Output) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewImage {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

#[async_trait]
pub trait PreviewRenderer: Send + Sync {
    async fn render_first_page(&self, payload: Arc<[u8]>, target_width: u32)
        -> Result<PreviewImage>;
}

pub struct MissingPreviewRenderer;

#[async_trait]
impl PreviewRenderer for MissingPreviewRenderer {
    async fn render_first_page(
        &self,
        _payload: Arc<[u8]>,
        _target_width: u32,
    ) -> Result<PreviewImage> {
        Err(anyhow!("preview renderer is unavailable"))
    }
}

/// Opaque locator for a published output resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceHandle(pub String);

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Holds produced output so a save action can retrieve it by handle.
pub trait ResourceHost: Send + Sync {
    fn create(&self, bytes: Vec<u8>, media_type: &str) -> Result<ResourceHandle>;
    fn fetch(&self, handle: &ResourceHandle) -> Option<Arc<[u8]>>;
    /// Releasing an unknown or already released handle is a no-op.
    fn release(&self, handle: &ResourceHandle);
}

/// User-facing save action for a published resource.
#[async_trait]
pub trait SaveTrigger: Send + Sync {
    async fn trigger(
        &self,
        host: &dyn ResourceHost,
        handle: &ResourceHandle,
        file_name: &str,
    ) -> Result<SaveOutcome>;
}

pub struct MissingSaveTrigger;

#[async_trait]
impl SaveTrigger for MissingSaveTrigger {
    async fn trigger(
        &self,
        _host: &dyn ResourceHost,
        handle: &ResourceHandle,
        _file_name: &str,
    ) -> Result<SaveOutcome> {
        Err(anyhow!("no save action is configured for resource {handle}"))
    }
}
