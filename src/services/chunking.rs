//! Client for the text chunking service.

use super::ServiceClient;
use crate::config::ChunkingSettings;
use crate::error::{CocoError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Serialize)]
struct ChunkRequest<'a> {
    text: &'a str,
    chunk_size: usize,
    chunk_overlap: usize,
}

#[derive(Debug, Deserialize)]
struct ChunkResponse {
    chunks: Vec<String>,
}

/// Splits text into overlapping chunks remotely.
#[derive(Debug, Clone)]
pub struct ChunkingClient {
    service: ServiceClient,
    settings: ChunkingSettings,
}

impl ChunkingClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration, settings: ChunkingSettings) -> Self {
        Self {
            service: ServiceClient::new(base_url, api_key, timeout, CocoError::Chunking),
            settings,
        }
    }

    pub fn service(&self) -> &ServiceClient {
        &self.service
    }

    /// Chunk with the configured size and overlap.
    pub async fn chunk_text(&self, text: &str) -> Result<Vec<String>> {
        self.chunk_text_with(text, self.settings.chunk_size, self.settings.chunk_overlap)
            .await
    }

    #[instrument(skip(self, text), fields(len = text.len()))]
    pub async fn chunk_text_with(&self, text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<String>> {
        let response: ChunkResponse = self
            .service
            .post_json(
                "/chunk/json",
                &ChunkRequest {
                    text,
                    chunk_size,
                    chunk_overlap,
                },
            )
            .await?;
        debug!("Text split into {} chunks", response.chunks.len());
        Ok(response.chunks)
    }
}
