// Retrieval module
// Finds stored sections relevant to a question and assembles the grounded prompt

pub mod composer;


use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::Result;
use crate::config::RetrievalConfig;
use crate::database::{ChunkStore, SearchResult};
use crate::embeddings::Embedder;

pub use composer::{ComposedContext, ContextComposer};

/// A stored section judged relevant to a question
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalCandidate {
    pub content: String,
    pub source_url: String,
    pub similarity: f32,
}

impl From<SearchResult> for RetrievalCandidate {
    #[inline]
    fn from(result: SearchResult) -> Self {
        Self {
            content: result.chunk.content,
            source_url: result.chunk.source_url,
            similarity: result.similarity,
        }
    }
}

/// Embeds questions and looks up their nearest stored sections
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn ChunkStore>,
    match_threshold: f32,
    match_count: usize,
}

impl Retriever {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn ChunkStore>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            match_threshold: config.match_threshold,
            match_count: config.match_count,
        }
    }

    #[inline]
    pub fn match_threshold(&self) -> f32 {
        self.match_threshold
    }

    #[inline]
    pub fn match_count(&self) -> usize {
        self.match_count
    }

    /// Sections most similar to `question`, best first
    ///
    /// A failure to embed or search is logged and yields no candidates; the
    /// caller then answers without grounding.
    #[inline]
    pub async fn retrieve(&self, question: &str) -> Vec<RetrievalCandidate> {
        match self.try_retrieve(question).await {
            Ok(candidates) => {
                info!(
                    "Retrieved {} candidates for question: {}",
                    candidates.len(),
                    question
                );
                candidates
            }
            Err(e) => {
                warn!(
                    "Retrieval failed for question '{}', answering without grounding: {}",
                    question, e
                );
                Vec::new()
            }
        }
    }

    /// Like [`Retriever::retrieve`] but surfaces the failure
    #[inline]
    pub async fn try_retrieve(&self, question: &str) -> Result<Vec<RetrievalCandidate>> {
        let query = self.embedder.embed(question).await?;
        let results = self
            .store
            .nearest_neighbors(&query, self.match_threshold, self.match_count)
            .await?;

        for result in &results {
            debug!(
                "Candidate {} (similarity {:.3})",
                result.chunk.source_url, result.similarity
            );
        }

        Ok(results.into_iter().map(RetrievalCandidate::from).collect())
    }
}
