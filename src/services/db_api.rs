//! Client for the vector database service.

use super::ServiceClient;
use crate::error::{CocoError, Result};
use crate::vector_store::{AddOutcome, DateRange, Document, SearchResult, StoredDocument, VectorStore};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument};

#[derive(Debug, Serialize)]
struct AddRequest<'a> {
    documents: &'a [Document],
}

#[derive(Debug, Serialize)]
struct ClosestRequest<'a> {
    embedding: &'a [f32],
    n_results: usize,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    text: &'a str,
    n_results: usize,
}

#[derive(Debug, Deserialize)]
struct Results<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct DeleteResponse {
    #[serde(default)]
    count: usize,
}

/// Vector store backed by the remote database service.
#[derive(Debug, Clone)]
pub struct DbApiClient {
    service: ServiceClient,
}

impl DbApiClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Self {
        Self {
            service: ServiceClient::new(base_url, api_key, timeout, CocoError::Database),
        }
    }

    pub fn service(&self) -> &ServiceClient {
        &self.service
    }

    /// Nearest documents to a text query, embedded by the service itself.
    #[instrument(skip(self))]
    pub async fn query_text(&self, text: &str, n_results: usize) -> Result<Vec<SearchResult>> {
        let response: Results<SearchResult> = self
            .service
            .post_json("/query", &QueryRequest { text, n_results })
            .await?;
        Ok(response.results)
    }
}

#[async_trait]
impl VectorStore for DbApiClient {
    #[instrument(skip(self, documents), fields(count = documents.len()))]
    async fn add(&self, documents: &[Document]) -> Result<AddOutcome> {
        let outcome: AddOutcome = self
            .service
            .post_json("/add", &AddRequest { documents })
            .await?;
        info!("Stored {} documents, skipped {}", outcome.added, outcome.skipped);
        Ok(outcome)
    }

    #[instrument(skip(self, embedding))]
    async fn get_closest(
        &self,
        embedding: &[f32],
        n_results: usize,
        dates: DateRange,
    ) -> Result<Vec<SearchResult>> {
        let response: Results<SearchResult> = self
            .service
            .post_json(
                "/get_closest",
                &ClosestRequest {
                    embedding,
                    n_results,
                    start_date: dates.start,
                    end_date: dates.end,
                },
            )
            .await?;
        debug!("Found {} matching documents", response.results.len());
        Ok(response.results)
    }

    async fn get_all(&self) -> Result<Vec<StoredDocument>> {
        let response: Results<StoredDocument> = self
            .service
            .send("/get_all", self.service.get("/get_all"))
            .await?;
        Ok(response.results)
    }

    #[instrument(skip(self))]
    async fn delete_all(&self) -> Result<usize> {
        let response: DeleteResponse = self
            .service
            .send("/delete_all", self.service.delete("/delete_all"))
            .await?;
        info!("Deleted {} documents", response.count);
        Ok(response.count)
    }
}
