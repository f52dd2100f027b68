// Embeddings module
// Text embedding and answer generation backends

pub mod ollama;

use async_trait::async_trait;

use crate::Result;

pub use ollama::{DEFAULT_EMBEDDING_DIMENSION, OllamaClient};

/// Produces a fixed-length vector for a piece of text
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Generates a free-text answer for a prompt
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Text handed to the embedding model for a stored section
///
/// Newlines are flattened to spaces; the stored content keeps them.
#[inline]
pub fn embedding_input(content: &str) -> String {
    content.replace('\n', " ")
}
