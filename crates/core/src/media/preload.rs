//! Asset preloading.

use async_trait::async_trait;

use crate::Error;

/// Warms one media asset so the next request for it is cheap.
///
/// Called fire-and-forget from the prefetch worker; errors are only logged.
#[async_trait]
pub trait AssetPreloader: Send + Sync {
    async fn preload(&self, path: &str) -> Result<(), Error>;
}

/// Reads local files so they land in the OS page cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalPreloader;

#[async_trait]
impl AssetPreloader for LocalPreloader {
    async fn preload(&self, path: &str) -> Result<(), Error> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::Fetch(format!("{path}: {e}")))?;
        tracing::trace!(path, bytes = bytes.len(), "preloaded local asset");
        Ok(())
    }
}
