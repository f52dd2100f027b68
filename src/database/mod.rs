// Database module
// Chunk storage with vector similarity search

pub mod lancedb;
pub mod memory;


use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

pub use self::lancedb::VectorStore;
pub use self::memory::MemoryStore;

/// Metadata stored alongside each chunk embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Canonical URL of the document the chunk was cut from
    pub source_url: String,
    /// Raw section text, newlines preserved
    pub content: String,
    /// Position of the section within its document
    pub section_index: u32,
    /// RFC 3339 timestamp of insertion
    pub created_at: String,
    /// Repository path of the file the chunk came from; empty when unknown
    #[serde(default)]
    pub document_path: String,
}

/// A chunk ready to be written: embedding plus metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

impl ChunkRecord {
    #[inline]
    pub fn new(source_url: &str, content: &str, section_index: u32, vector: Vec<f32>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            vector,
            metadata: ChunkMetadata {
                source_url: source_url.to_string(),
                content: content.to_string(),
                section_index,
                created_at: chrono::Utc::now().to_rfc3339(),
                document_path: String::new(),
            },
        }
    }

    #[inline]
    pub fn with_document_path(mut self, document_path: &str) -> Self {
        self.metadata.document_path = document_path.to_string();
        self
    }
}

/// A chunk already present in the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredChunk {
    pub id: String,
    pub metadata: ChunkMetadata,
}

/// Nearest-neighbour hit, most similar first
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub chunk: ChunkMetadata,
    /// Cosine similarity in `[-1, 1]`
    pub similarity: f32,
}

/// Vector store holding the indexed chunks
///
/// `source_url` is the identity key: every chunk of one document shares it
/// and re-indexing replaces all of them at once.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    async fn find_by_source_url(&self, source_url: &str) -> Result<Vec<StoredChunk>>;

    /// Remove every chunk for `source_url`, returning how many were removed
    async fn delete_by_source_url(&self, source_url: &str) -> Result<u64>;

    async fn insert(&self, record: ChunkRecord) -> Result<()>;

    /// Distinct source URLs holding chunks cut from the repository file `document_path`
    async fn source_urls_for_document(&self, document_path: &str) -> Result<Vec<String>>;

    /// Chunks with similarity strictly above `threshold`, best first, at most `limit`
    async fn nearest_neighbors(
        &self,
        query: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Number of stored chunks, optionally restricted to one source URL
    async fn count_chunks(&self, source_url: Option<&str>) -> Result<u64>;
}

/// Cosine similarity; zero for empty, mismatched or zero-length vectors
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
