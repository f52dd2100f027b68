use thiserror::Error;

pub type Result<T> = std::result::Result<T, DocsError>;

#[derive(Error, Debug)]
pub enum DocsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited by content source until {reset_at} (unix seconds)")]
    RateLimited { reset_at: i64 },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Completion error: {0}")]
    Completion(String),

    #[error("Repository path does not exist: {0}")]
    PathNotFound(String),

    #[error("Re-index of {source_url} left {} section(s) unwritten: {failed_sections:?}", failed_sections.len())]
    PartialReindex {
        source_url: String,
        failed_sections: Vec<usize>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chat;
pub mod commands;
pub mod config;
pub mod crawler;
pub mod database;
pub mod documents;
pub mod embeddings;
pub mod github;
pub mod indexer;
pub mod retrieval;
