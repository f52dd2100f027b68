// Indexer module
// Replaces the stored chunks of one document with freshly embedded sections

pub mod locks;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use tracing::{debug, error, info};

use crate::database::{ChunkRecord, ChunkStore};
use crate::embeddings::{Embedder, embedding_input};
use crate::{DocsError, Result};

pub use locks::{SourceGuard, SourceLocks};

/// Outcome of re-indexing one document
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReindexReport {
    pub source_url: String,
    /// Chunks removed from the previous generation
    pub removed: u64,
    /// Sections written in this generation
    pub inserted: usize,
    /// Indexes of sections that could not be embedded or written
    pub failed_sections: Vec<usize>,
}

impl ReindexReport {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.failed_sections.is_empty()
    }

    /// `Err(PartialReindex)` when any section was left unwritten
    #[inline]
    pub fn into_result(self) -> Result<Self> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(DocsError::PartialReindex {
                source_url: self.source_url,
                failed_sections: self.failed_sections,
            })
        }
    }
}

/// Delete-then-insert replacement of a document's chunks
///
/// Every mutation of one source URL runs under that URL's lock, so at most
/// one generation of chunks is ever being written for it.
#[derive(Clone)]
pub struct Reindexer {
    store: Arc<dyn ChunkStore>,
    embedder: Arc<dyn Embedder>,
    locks: SourceLocks,
}

impl Reindexer {
    #[inline]
    pub fn new(store: Arc<dyn ChunkStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            locks: SourceLocks::new(),
        }
    }

    #[inline]
    pub fn with_locks(mut self, locks: SourceLocks) -> Self {
        self.locks = locks;
        self
    }

    #[inline]
    pub fn store(&self) -> &Arc<dyn ChunkStore> {
        &self.store
    }

    /// Replace all chunks stored for `source_url` with `sections`
    ///
    /// A failed lookup or delete aborts before anything is inserted. A failed
    /// section is logged and skipped; the remaining sections are still written
    /// and the call then returns [`DocsError::PartialReindex`].
    #[inline]
    pub async fn reindex(&self, sections: &[String], source_url: &str) -> Result<ReindexReport> {
        self.reindex_document(sections, source_url, "").await
    }

    /// [`Reindexer::reindex`], recording `document_path` on every written chunk
    /// so the document can later be found by its repository path
    #[inline]
    pub async fn reindex_document(
        &self,
        sections: &[String],
        source_url: &str,
        document_path: &str,
    ) -> Result<ReindexReport> {
        let _guard = self.locks.lock(source_url).await;
        debug!("Re-indexing {} ({} sections)", source_url, sections.len());

        let existing = self
            .store
            .find_by_source_url(source_url)
            .await
            .inspect_err(|e| error!("Failed to look up chunks for {}: {}", source_url, e))?;

        let removed = if existing.is_empty() {
            0
        } else {
            self.store
                .delete_by_source_url(source_url)
                .await
                .inspect_err(|e| {
                    error!(
                        "Failed to delete {} chunks for {}; not inserting: {}",
                        existing.len(),
                        source_url,
                        e
                    );
                })?
        };

        let mut report = ReindexReport {
            source_url: source_url.to_string(),
            removed,
            ..ReindexReport::default()
        };

        for (index, section) in sections.iter().enumerate() {
            match self
                .write_section(source_url, document_path, index, section)
                .await
            {
                Ok(()) => report.inserted += 1,
                Err(e) => {
                    error!(
                        "Failed to index section {} of {}: {}",
                        index, source_url, e
                    );
                    report.failed_sections.push(index);
                }
            }
        }

        info!(
            "Re-indexed {}: removed {}, inserted {}, failed {}",
            source_url,
            report.removed,
            report.inserted,
            report.failed_sections.len()
        );

        report.into_result()
    }

    /// Remove every chunk for `source_url`
    #[inline]
    pub async fn purge(&self, source_url: &str) -> Result<u64> {
        let _guard = self.locks.lock(source_url).await;
        let removed = self
            .store
            .delete_by_source_url(source_url)
            .await
            .inspect_err(|e| error!("Failed to purge chunks for {}: {}", source_url, e))?;

        info!("Purged {} chunks for {}", removed, source_url);
        Ok(removed)
    }

    async fn write_section(
        &self,
        source_url: &str,
        document_path: &str,
        index: usize,
        section: &str,
    ) -> Result<()> {
        let vector = self.embedder.embed(&embedding_input(section)).await?;
        let section_index = u32::try_from(index).unwrap_or(u32::MAX);
        let record = ChunkRecord::new(source_url, section, section_index, vector)
            .with_document_path(document_path);
        self.store.insert(record).await
    }
}
