//! Retrieval-augmented generation over the stored documents.
//!
//! Retrieval embeds each query and asks the vector store for its nearest
//! chunks; answering formats those chunks into a prompt and generates.
//! Both run through the batch scheduler.

pub mod context;

pub use context::{format_context, format_prompt, split_results};

use crate::batch::{BatchScheduler, Broadcast};
use crate::config::{BatchSettings, Prompts};
use crate::error::{CocoError, Result};
use crate::lm::{Generation, LanguageModelClient};
use crate::vector_store::{DateRange, DocumentMetadata, SearchResult, VectorStore};
use std::sync::Arc;
use tracing::{info, instrument};

/// Retrieves context and answers questions with it.
#[derive(Clone)]
pub struct RagClient {
    embedder: LanguageModelClient,
    generator: LanguageModelClient,
    store: Arc<dyn VectorStore>,
    prompts: Prompts,
    batching: BatchSettings,
}

impl RagClient {
    /// `embedder` embeds queries; `generator` writes the answers.
    pub fn new(
        embedder: LanguageModelClient,
        generator: LanguageModelClient,
        store: Arc<dyn VectorStore>,
        prompts: Prompts,
        batching: BatchSettings,
    ) -> Self {
        Self {
            embedder,
            generator,
            store,
            prompts,
            batching,
        }
    }

    fn scheduler(&self, description: &str) -> BatchScheduler {
        BatchScheduler::from_settings(&self.batching)
            .with_progress_if(self.batching.show_progress, description)
    }

    /// The `n_results` closest documents for every query, in query order.
    #[instrument(skip(self, queries), fields(count = queries.len()))]
    pub async fn retrieve_multiple(
        &self,
        queries: Vec<String>,
        n_results: usize,
        model: &str,
        dates: DateRange,
    ) -> Result<Vec<Vec<SearchResult>>> {
        let backend = self.embedder.backend();
        let store = &self.store;
        self.scheduler("Retrieving documents")
            .run(
                move |(queries, Broadcast(n_results), Broadcast(model), Broadcast(dates)): (
                    Vec<String>,
                    Broadcast<usize>,
                    Broadcast<String>,
                    Broadcast<DateRange>,
                )| async move {
                    let embeddings = backend.embed(&queries, &model).await?;
                    if embeddings.len() != queries.len() {
                        return Err(CocoError::Embedding(format!(
                            "expected {} embeddings, got {}",
                            queries.len(),
                            embeddings.len()
                        )));
                    }
                    let mut results = Vec::with_capacity(embeddings.len());
                    for embedding in &embeddings {
                        results.push(store.get_closest(embedding, n_results, dates).await?);
                    }
                    Ok(results)
                },
                (
                    queries,
                    Broadcast(n_results),
                    Broadcast(model.to_string()),
                    Broadcast(dates),
                ),
            )
            .await
    }

    /// Answer each query from its own context chunks.
    ///
    /// `metadata`, when given, holds one list per query aligned with its
    /// chunks. `template` defaults to the configured RAG answer prompt.
    #[instrument(skip(self, queries, contexts, metadata, template), fields(count = queries.len()))]
    pub async fn answer_multiple(
        &self,
        queries: Vec<String>,
        contexts: Vec<Vec<String>>,
        metadata: Option<Vec<Vec<DocumentMetadata>>>,
        template: Option<&str>,
        model: &str,
        temperature: f32,
    ) -> Result<Generation> {
        let metadata = metadata.unwrap_or_else(|| vec![Vec::new(); queries.len()]);
        if contexts.len() != queries.len() || metadata.len() != queries.len() {
            return Err(CocoError::InvalidArgument(format!(
                "{} queries but {} contexts and {} metadata lists",
                queries.len(),
                contexts.len(),
                metadata.len()
            )));
        }
        let template = template.unwrap_or(&self.prompts.rag.answer).to_string();
        let backend = self.generator.backend();
        let prompts = &self.prompts;

        self.scheduler("Generating answers")
            .run(
                move |(queries, contexts, metadata, Broadcast(template), Broadcast(model), Broadcast(temperature)): (
                    Vec<String>,
                    Vec<Vec<String>>,
                    Vec<Vec<DocumentMetadata>>,
                    Broadcast<String>,
                    Broadcast<String>,
                    Broadcast<f32>,
                )| async move {
                    let filled = queries
                        .iter()
                        .zip(&contexts)
                        .zip(&metadata)
                        .map(|((q, c), m)| format_prompt(prompts, q, c, m, &template))
                        .collect::<Result<Vec<_>>>()?;
                    backend.generate(&filled, &model, temperature).await
                },
                (
                    queries,
                    contexts,
                    metadata,
                    Broadcast(template),
                    Broadcast(model.to_string()),
                    Broadcast(temperature),
                ),
            )
            .await
    }

    /// Retrieve then answer, keeping the sources of every answer.
    pub async fn ask_multiple(
        &self,
        queries: Vec<String>,
        n_results: usize,
        embedding_model: &str,
        model: &str,
        temperature: f32,
        dates: DateRange,
    ) -> Result<Vec<(String, Vec<SearchResult>)>> {
        let retrieved = self
            .retrieve_multiple(queries.clone(), n_results, embedding_model, dates)
            .await?;
        let (contexts, metadata): (Vec<_>, Vec<_>) =
            retrieved.iter().map(|r| split_results(r)).unzip();

        let (answers, speeds) = self
            .answer_multiple(queries, contexts, Some(metadata), None, model, temperature)
            .await?;
        if !speeds.is_empty() {
            info!(
                "Answered {} queries at {:.1} tokens/s on average",
                answers.len(),
                speeds.iter().sum::<f64>() / speeds.len() as f64
            );
        }
        Ok(answers.into_iter().zip(retrieved).collect())
    }
}
