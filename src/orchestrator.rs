//! Ingestion and query facade for Coco.
//!
//! Wires the service clients, language-model backends, tools and agent
//! together from one [`Settings`].

use crate::agent::{Agent, AgentOptions};
use crate::batch::{BatchScheduler, Broadcast};
use crate::config::{Prompts, Settings};
use crate::error::{CocoError, Result};
use crate::lm::{create_backend, LanguageModel, LanguageModelClient};
use crate::rag::RagClient;
use crate::services::{
    health_check, ChunkingClient, DbApiClient, ServiceHealth, Transcript, TranscriptionClient,
};
use crate::tools::{builtin, ToolContext, ToolRegistry};
use crate::vector_store::{documents_for_file, AddOutcome, VectorStore};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument};

/// What a transcription ingest produced.
#[derive(Debug, Clone)]
pub struct TranscriptionResult {
    pub transcript: Transcript,
    /// Where the transcript text was written.
    pub transcript_path: PathBuf,
    pub outcome: AddOutcome,
}

/// Entry point tying every Coco component together.
pub struct Orchestrator {
    settings: Settings,
    prompts: Prompts,
    embedder: LanguageModelClient,
    llm: LanguageModelClient,
    store: Arc<dyn VectorStore>,
    chunking: ChunkingClient,
    transcription: TranscriptionClient,
    rag: RagClient,
    tools: Arc<ToolRegistry>,
    agent: Agent,
}

impl Orchestrator {
    /// Build every client from `settings`.
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;

        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let services = &settings.services;
        let api_key = services.api_key.clone().unwrap_or_default();
        let timeout = settings.timeout();
        let url = |value: &Option<String>| value.clone().unwrap_or_default();

        let store: Arc<dyn VectorStore> =
            Arc::new(DbApiClient::new(&url(&services.db_api_base), &api_key, timeout));
        let chunking = ChunkingClient::new(
            &url(&services.chunking_base),
            &api_key,
            timeout,
            settings.chunking.clone(),
        );
        let transcription =
            TranscriptionClient::new(&url(&services.transcription_base), &api_key, timeout);

        let embed_backend = create_backend(settings.embedding.api, &settings)?;
        let llm_backend = if settings.llm.api == settings.embedding.api {
            Arc::clone(&embed_backend)
        } else {
            create_backend(settings.llm.api, &settings)?
        };

        info!(
            "Embeddings via {} ({}), generation via {} ({})",
            settings.embedding.api, settings.embedding.model, settings.llm.api, settings.llm.model
        );

        Self::with_components(
            settings,
            prompts,
            embed_backend,
            llm_backend,
            store,
            chunking,
            transcription,
        )
    }

    /// Assemble an orchestrator from already-built components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        embed_backend: Arc<dyn LanguageModel>,
        llm_backend: Arc<dyn LanguageModel>,
        store: Arc<dyn VectorStore>,
        chunking: ChunkingClient,
        transcription: TranscriptionClient,
    ) -> Result<Self> {
        let embedder = LanguageModelClient::new(Arc::clone(&embed_backend), settings.batching.clone());
        let llm = LanguageModelClient::new(Arc::clone(&llm_backend), settings.batching.clone());

        let context = Arc::new(ToolContext::new(
            embed_backend,
            Arc::clone(&store),
            &settings.embedding.model,
        ));
        let tools = Arc::new(builtin::registry(context)?);

        let agent = Agent::new(
            llm_backend,
            Arc::clone(&tools),
            &prompts.agent_system(),
            AgentOptions::from_settings(&settings),
        );

        let rag = RagClient::new(
            embedder.clone(),
            llm.clone(),
            Arc::clone(&store),
            prompts.clone(),
            settings.batching.clone(),
        );

        Ok(Self {
            settings,
            prompts,
            embedder,
            llm,
            store,
            chunking,
            transcription,
            rag,
            tools,
            agent,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn prompts(&self) -> &Prompts {
        &self.prompts
    }

    pub fn embedder(&self) -> &LanguageModelClient {
        &self.embedder
    }

    pub fn llm(&self) -> &LanguageModelClient {
        &self.llm
    }

    pub fn store(&self) -> Arc<dyn VectorStore> {
        Arc::clone(&self.store)
    }

    pub fn chunking(&self) -> &ChunkingClient {
        &self.chunking
    }

    pub fn transcription(&self) -> &TranscriptionClient {
        &self.transcription
    }

    pub fn rag(&self) -> &RagClient {
        &self.rag
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Probe every configured service.
    pub async fn health_check(&self, raise_on_error: bool) -> Result<Vec<ServiceHealth>> {
        health_check(&self.settings, raise_on_error).await
    }

    /// Embed chunks of one file and store them, batch by batch.
    ///
    /// `dates` holds one entry per chunk. Chunk indices count across the
    /// whole file, not per batch.
    #[instrument(skip(self, chunks, dates), fields(count = chunks.len()))]
    pub async fn embed_and_store_multiple(
        &self,
        chunks: Vec<String>,
        language: &str,
        filename: &str,
        dates: Vec<Option<NaiveDate>>,
        model: &str,
    ) -> Result<AddOutcome> {
        if chunks.len() != dates.len() {
            return Err(CocoError::InvalidArgument(format!(
                "{} chunks but {} dates",
                chunks.len(),
                dates.len()
            )));
        }
        if chunks.is_empty() {
            return Ok(AddOutcome::default());
        }

        let total = chunks.len();
        let positions: Vec<usize> = (0..total).collect();
        let backend = self.embedder.backend();
        let store = &self.store;
        let batching = &self.settings.batching;

        let outcomes: Vec<AddOutcome> = BatchScheduler::from_settings(batching)
            .with_progress_if(batching.show_progress, "Embedding and storing")
            .run(
                move |(chunks, positions, dates, Broadcast(language), Broadcast(filename), Broadcast(model)): (
                    Vec<String>,
                    Vec<usize>,
                    Vec<Option<NaiveDate>>,
                    Broadcast<String>,
                    Broadcast<String>,
                    Broadcast<String>,
                )| async move {
                    let embeddings = backend.embed(&chunks, &model).await?;
                    let mut documents = documents_for_file(&chunks, embeddings, &language, &filename, &dates);
                    for (document, position) in documents.iter_mut().zip(&positions) {
                        document.metadata.chunk_index = *position;
                        document.metadata.total_chunks = total;
                    }
                    Ok(vec![store.add(&documents).await?])
                },
                (
                    chunks,
                    positions,
                    dates,
                    Broadcast(language.to_string()),
                    Broadcast(filename.to_string()),
                    Broadcast(model.to_string()),
                ),
            )
            .await?;

        let outcome = outcomes.into_iter().fold(AddOutcome::default(), |acc, o| acc + o);
        info!(
            "Stored {} of {} chunks from '{}' ({} already present)",
            outcome.added, total, filename, outcome.skipped
        );
        Ok(outcome)
    }

    /// Chunk `text` remotely, then embed and store the chunks.
    pub async fn chunk_and_store(
        &self,
        text: &str,
        language: &str,
        filename: &str,
        date: Option<NaiveDate>,
    ) -> Result<AddOutcome> {
        let chunks = self.chunking.chunk_text(text).await?;
        let dates = vec![date; chunks.len()];
        self.embed_and_store_multiple(chunks, language, filename, dates, &self.settings.embedding.model)
            .await
    }

    /// Read a UTF-8 text file and ingest it under its file name.
    pub async fn ingest_text_file(
        &self,
        path: &Path,
        language: &str,
        date: Option<NaiveDate>,
    ) -> Result<AddOutcome> {
        let text = tokio::fs::read_to_string(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.chunk_and_store(&text, language, &filename, date).await
    }

    /// Transcribe an audio file, keep the transcript beside it as `.txt`,
    /// then chunk, embed and store the text.
    #[instrument(skip(self, prompt))]
    pub async fn transcribe_and_store(
        &self,
        audio: &Path,
        prompt: Option<&str>,
        date: Option<NaiveDate>,
    ) -> Result<TranscriptionResult> {
        let transcript = self.transcription.transcribe_audio(audio, prompt).await?;

        let transcript_path = audio.with_extension("txt");
        tokio::fs::write(&transcript_path, &transcript.text).await?;
        info!("Transcript written to {}", transcript_path.display());

        let outcome = self
            .chunk_and_store(&transcript.text, &transcript.language, &transcript.filename, date)
            .await?;

        Ok(TranscriptionResult {
            transcript,
            transcript_path,
            outcome,
        })
    }
}
