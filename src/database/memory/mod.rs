//! In-process [`ChunkStore`] with brute-force cosine search.
//!
//! Nothing is persisted. Used by tests and by callers that index a small
//! corpus per process.


use async_trait::async_trait;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use super::{ChunkRecord, ChunkStore, SearchResult, StoredChunk, cosine_similarity};
use crate::{DocsError, Result};

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<ChunkRecord>>,
}

impl MemoryStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<ChunkRecord>>> {
        self.records
            .read()
            .map_err(|_| DocsError::Database("Memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<ChunkRecord>>> {
        self.records
            .write()
            .map_err(|_| DocsError::Database("Memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl ChunkStore for MemoryStore {
    async fn find_by_source_url(&self, source_url: &str) -> Result<Vec<StoredChunk>> {
        Ok(self
            .read()?
            .iter()
            .filter(|record| record.metadata.source_url == source_url)
            .map(|record| StoredChunk {
                id: record.id.clone(),
                metadata: record.metadata.clone(),
            })
            .collect())
    }

    async fn delete_by_source_url(&self, source_url: &str) -> Result<u64> {
        let mut records = self.write()?;
        let before = records.len();
        records.retain(|record| record.metadata.source_url != source_url);
        let removed = (before - records.len()) as u64;
        debug!("Removed {} chunks for {}", removed, source_url);
        Ok(removed)
    }

    async fn insert(&self, record: ChunkRecord) -> Result<()> {
        self.write()?.push(record);
        Ok(())
    }

    async fn source_urls_for_document(&self, document_path: &str) -> Result<Vec<String>> {
        let mut urls: Vec<String> = Vec::new();
        for record in self
            .read()?
            .iter()
            .filter(|record| record.metadata.document_path == document_path)
        {
            if !urls.contains(&record.metadata.source_url) {
                urls.push(record.metadata.source_url.clone());
            }
        }
        Ok(urls)
    }

    async fn nearest_neighbors(
        &self,
        query: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let mut hits: Vec<SearchResult> = self
            .read()?
            .iter()
            .map(|record| SearchResult {
                chunk: record.metadata.clone(),
                similarity: cosine_similarity(query, &record.vector),
            })
            .filter(|hit| hit.similarity > threshold)
            .collect();

        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count_chunks(&self, source_url: Option<&str>) -> Result<u64> {
        let records = self.read()?;
        let count = match source_url {
            Some(url) => records
                .iter()
                .filter(|record| record.metadata.source_url == url)
                .count(),
            None => records.len(),
        };
        Ok(count as u64)
    }
}
