//! Vector store abstraction for Coco.
//!
//! Documents live in the remote database service; [`MemoryVectorStore`]
//! implements the same trait in-process.

mod memory;

pub use memory::MemoryVectorStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Provenance of a stored chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentMetadata {
    /// Language of the chunk.
    pub language: String,
    /// Audio or text file the chunk was extracted from.
    pub filename: String,
    /// Position of the chunk within its file.
    pub chunk_index: usize,
    /// Number of chunks the file produced.
    pub total_chunks: usize,
    /// Date of the source, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

/// A chunk with its embedding, ready to be stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: DocumentMetadata,
}

/// A document as returned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: i64,
    /// Chunk text.
    pub document: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

/// A nearest-neighbour hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: i64,
    pub document: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
    /// Cosine distance to the query (lower is closer).
    pub distance: f32,
}

impl SearchResult {
    /// `1 - distance`; higher is better.
    pub fn relevance_score(&self) -> f32 {
        1.0 - self.distance
    }
}

/// Outcome of a bulk insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOutcome {
    pub added: usize,
    /// Documents whose text was already stored.
    pub skipped: usize,
}

impl std::ops::Add for AddOutcome {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            added: self.added + other.added,
            skipped: self.skipped + other.skipped,
        }
    }
}

/// Optional inclusive date window for retrieval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// Whether a document dated `date` falls inside the window.
    ///
    /// Undated documents only match an unbounded window.
    pub fn contains(&self, date: Option<NaiveDate>) -> bool {
        if self.start.is_none() && self.end.is_none() {
            return true;
        }
        let Some(date) = date else {
            return false;
        };
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store documents, skipping any whose text is already present.
    async fn add(&self, documents: &[Document]) -> Result<AddOutcome>;

    /// The `n_results` documents closest to `embedding` within `dates`.
    async fn get_closest(
        &self,
        embedding: &[f32],
        n_results: usize,
        dates: DateRange,
    ) -> Result<Vec<SearchResult>>;

    /// Every stored document.
    async fn get_all(&self) -> Result<Vec<StoredDocument>>;

    /// Remove every document, returning how many were deleted.
    async fn delete_all(&self) -> Result<usize>;
}

/// Build documents for the chunks of one file.
///
/// `chunk_index` counts within this call and `total_chunks` is the number
/// of chunks passed in.
pub fn documents_for_file(
    chunks: &[String],
    embeddings: Vec<Vec<f32>>,
    language: &str,
    filename: &str,
    dates: &[Option<NaiveDate>],
) -> Vec<Document> {
    let total = chunks.len();
    chunks
        .iter()
        .zip(embeddings)
        .enumerate()
        .map(|(i, (text, embedding))| Document {
            text: text.clone(),
            embedding,
            metadata: DocumentMetadata {
                language: language.to_string(),
                filename: filename.to_string(),
                chunk_index: i,
                total_chunks: total,
                date: dates.get(i).copied().flatten(),
            },
        })
        .collect()
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2024, 5, d)
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&a, &[0.0, 1.0, 0.0]).abs() < 0.001);
        assert!((cosine_similarity(&a, &[-1.0, 0.0, 0.0]) + 1.0).abs() < 0.001);
        assert_eq!(cosine_similarity(&a, &[1.0]), 0.0);
    }

    #[test]
    fn test_date_range() {
        let open = DateRange::default();
        assert!(open.contains(None));
        assert!(open.contains(day(3)));

        let window = DateRange::new(day(2), day(4));
        assert!(window.contains(day(2)));
        assert!(window.contains(day(4)));
        assert!(!window.contains(day(5)));
        assert!(!window.contains(None));

        let from = DateRange::new(day(10), None);
        assert!(from.contains(day(31)));
        assert!(!from.contains(day(9)));
    }

    #[test]
    fn test_documents_for_file() {
        let chunks = vec!["a".to_string(), "b".to_string()];
        let docs = documents_for_file(
            &chunks,
            vec![vec![1.0], vec![2.0]],
            "en",
            "talk.mp3",
            &[day(1), None],
        );

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].metadata.chunk_index, 1);
        assert_eq!(docs[1].metadata.total_chunks, 2);
        assert_eq!(docs[0].metadata.date, day(1));
        assert_eq!(docs[1].metadata.date, None);
    }

    #[test]
    fn test_metadata_serializes_iso_date() {
        let meta = DocumentMetadata {
            language: "de".to_string(),
            filename: "notes.txt".to_string(),
            chunk_index: 0,
            total_chunks: 1,
            date: day(7),
        };
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["date"], "2024-05-07");
    }
}
