//! HTTP asset preloading for remote media roots.

use std::sync::Arc;

use async_trait::async_trait;
use copertine_core::{AssetPreloader, Error};
use reqwest::header;

use crate::StoreError;

/// Warms remote assets by fetching them and discarding the body, so that
/// any cache in front of the media host holds them.
#[derive(Debug, Clone)]
pub struct HttpPreloader {
    http: reqwest::Client,
}

impl HttpPreloader {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// A preloader with its own client.
    pub fn with_timeout(timeout: std::time::Duration, user_agent: &str) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| StoreError::Network(Arc::new(e)))?;
        Ok(Self::new(http))
    }
}

#[async_trait]
impl AssetPreloader for HttpPreloader {
    async fn preload(&self, path: &str) -> Result<(), Error> {
        let response = self
            .http
            .get(path)
            .header(header::ACCEPT, "image/*")
            .send()
            .await
            .map_err(|e| Error::from(StoreError::from(e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!("{path}: HTTP {}", status.as_u16())));
        }

        let bytes = response.bytes().await.map_err(|e| Error::from(StoreError::from(e)))?;
        tracing::trace!(path, bytes = bytes.len(), "preloaded remote asset");
        Ok(())
    }
}
