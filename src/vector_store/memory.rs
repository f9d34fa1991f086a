//! In-memory vector store implementation.
//!
//! Useful for testing and small datasets.

use super::{
    cosine_similarity, AddOutcome, DateRange, Document, SearchResult, StoredDocument, VectorStore,
};
use crate::error::{CocoError, Result};
use async_trait::async_trait;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory vector store.
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    documents: RwLock<Vec<(i64, Document)>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<(i64, Document)>>> {
        self.documents
            .read()
            .map_err(|_| CocoError::Database("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<(i64, Document)>>> {
        self.documents
            .write()
            .map_err(|_| CocoError::Database("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn add(&self, documents: &[Document]) -> Result<AddOutcome> {
        let mut store = self.write()?;
        let mut outcome = AddOutcome::default();

        for doc in documents {
            if store.iter().any(|(_, existing)| existing.text == doc.text) {
                outcome.skipped += 1;
                continue;
            }
            let id = store.last().map_or(1, |(id, _)| id + 1);
            store.push((id, doc.clone()));
            outcome.added += 1;
        }
        Ok(outcome)
    }

    async fn get_closest(
        &self,
        embedding: &[f32],
        n_results: usize,
        dates: DateRange,
    ) -> Result<Vec<SearchResult>> {
        let store = self.read()?;

        let mut results: Vec<SearchResult> = store
            .iter()
            .filter(|(_, doc)| dates.contains(doc.metadata.date))
            .map(|(id, doc)| SearchResult {
                id: *id,
                document: doc.text.clone(),
                metadata: doc.metadata.clone(),
                distance: 1.0 - cosine_similarity(embedding, &doc.embedding),
            })
            .collect();

        results.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(n_results);

        Ok(results)
    }

    async fn get_all(&self) -> Result<Vec<StoredDocument>> {
        let store = self.read()?;
        Ok(store
            .iter()
            .map(|(id, doc)| StoredDocument {
                id: *id,
                document: doc.text.clone(),
                metadata: doc.metadata.clone(),
            })
            .collect())
    }

    async fn delete_all(&self) -> Result<usize> {
        let mut store = self.write()?;
        let deleted = store.len();
        store.clear();
        Ok(deleted)
    }
}
