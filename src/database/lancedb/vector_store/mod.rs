
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{CHUNKS_TABLE, document_path_predicate, source_url_predicate};
use crate::config::Config;
use crate::database::{ChunkMetadata, ChunkRecord, ChunkStore, SearchResult, StoredChunk};
use crate::{DocsError, Result};

/// LanceDB-backed [`ChunkStore`]
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    vector_dimension: usize,
}

impl VectorStore {
    /// Open the store under the configured data directory
    #[inline]
    pub async fn new(config: &Config) -> Result<Self> {
        Self::open(
            &config.vector_database_path(),
            config.ollama.embedding_dimension as usize,
        )
        .await
    }

    /// Open (or create) the store at `db_path`
    ///
    /// An existing table keeps its vector dimension; `vector_dimension` is
    /// only used when the table has to be created.
    #[inline]
    pub async fn open(db_path: &Path, vector_dimension: usize) -> Result<Self> {
        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(db_path).map_err(|e| {
            DocsError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = db_path.to_string_lossy().to_string();
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| DocsError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        let mut store = Self {
            connection,
            table_name: CHUNKS_TABLE.to_string(),
            vector_dimension,
        };
        store.initialize_table().await?;

        info!(
            "Vector store ready ({} dimensions) at {:?}",
            store.vector_dimension, db_path
        );
        Ok(store)
    }

    #[inline]
    pub fn vector_dimension(&self) -> usize {
        self.vector_dimension
    }

    async fn initialize_table(&mut self) -> Result<()> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| DocsError::Database(format!("Failed to list tables: {}", e)))?;

        if table_names.contains(&self.table_name) {
            let existing = self.detect_existing_vector_dimension().await?;
            if existing != self.vector_dimension {
                warn!(
                    "Chunks table stores {}-dimensional vectors but {} were configured; keeping {}",
                    existing, self.vector_dimension, existing
                );
                self.vector_dimension = existing;
            }
            return Ok(());
        }

        let schema = Self::create_schema(self.vector_dimension);
        self.connection
            .create_empty_table(&self.table_name, schema)
            .execute()
            .await
            .map_err(|e| DocsError::Database(format!("Failed to create table: {}", e)))?;

        info!(
            "Chunks table created with {} dimensions",
            self.vector_dimension
        );
        Ok(())
    }

    async fn detect_existing_vector_dimension(&self) -> Result<usize> {
        let table = self.table().await?;
        let schema = table
            .schema()
            .await
            .map_err(|e| DocsError::Database(format!("Failed to get table schema: {}", e)))?;

        schema
            .fields()
            .iter()
            .find(|field| field.name() == "vector")
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            })
            .ok_or_else(|| {
                DocsError::Database("Could not find vector column or determine dimension".to_string())
            })
    }

    fn create_schema(vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("source_url", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("section_index", DataType::UInt32, false),
            Field::new("created_at", DataType::Utf8, false),
            Field::new("document_path", DataType::Utf8, false),
        ]))
    }

    async fn table(&self) -> Result<Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| DocsError::Database(format!("Failed to open table: {}", e)))
    }

    fn create_record_batch(&self, record: &ChunkRecord) -> Result<RecordBatch> {
        if record.vector.len() != self.vector_dimension {
            return Err(DocsError::Database(format!(
                "Embedding has {} dimensions, store expects {}",
                record.vector.len(),
                self.vector_dimension
            )));
        }

        let schema = Self::create_schema(self.vector_dimension);

        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let values = Float32Array::from(record.vector.clone());
        let vector_array = FixedSizeListArray::try_new(
            field,
            self.vector_dimension as i32,
            Arc::new(values),
            None,
        )
        .map_err(|e| DocsError::Database(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(vec![record.id.as_str()])),
            Arc::new(vector_array),
            Arc::new(StringArray::from(vec![record.metadata.source_url.as_str()])),
            Arc::new(StringArray::from(vec![record.metadata.content.as_str()])),
            Arc::new(UInt32Array::from(vec![record.metadata.section_index])),
            Arc::new(StringArray::from(vec![record.metadata.created_at.as_str()])),
            Arc::new(StringArray::from(vec![record.metadata.document_path.as_str()])),
        ];

        RecordBatch::try_new(schema, arrays)
            .map_err(|e| DocsError::Database(format!("Failed to create record batch: {}", e)))
    }

    async fn collect_rows(
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<(String, ChunkMetadata, Option<f32>)>> {
        let mut rows = Vec::new();

        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| DocsError::Database(format!("Failed to read result stream: {}", e)))?
        {
            rows.extend(Self::parse_batch(&batch)?);
        }

        Ok(rows)
    }

    fn parse_batch(batch: &RecordBatch) -> Result<Vec<(String, ChunkMetadata, Option<f32>)>> {
        let ids = string_column(batch, "id")?;
        let source_urls = string_column(batch, "source_url")?;
        let contents = string_column(batch, "content")?;
        let created_ats = string_column(batch, "created_at")?;
        let document_paths = string_column(batch, "document_path")?;
        let section_indices = batch
            .column_by_name("section_index")
            .ok_or_else(|| DocsError::Database("Missing section_index column".to_string()))?
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| DocsError::Database("Invalid section_index column type".to_string()))?;

        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        let rows = (0..batch.num_rows())
            .map(|row| {
                let metadata = ChunkMetadata {
                    source_url: source_urls.value(row).to_string(),
                    content: contents.value(row).to_string(),
                    section_index: section_indices.value(row),
                    created_at: created_ats.value(row).to_string(),
                    document_path: document_paths.value(row).to_string(),
                };
                let distance = distances
                    .filter(|d| !d.is_null(row))
                    .map(|d| d.value(row));
                (ids.value(row).to_string(), metadata, distance)
            })
            .collect();

        Ok(rows)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| DocsError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| DocsError::Database(format!("Invalid {} column type", name)))
}

#[async_trait]
impl ChunkStore for VectorStore {
    async fn find_by_source_url(&self, source_url: &str) -> Result<Vec<StoredChunk>> {
        let table = self.table().await?;
        let results = table
            .query()
            .only_if(source_url_predicate(source_url))
            .execute()
            .await
            .map_err(|e| {
                DocsError::Database(format!("Failed to query chunks for {}: {}", source_url, e))
            })?;

        let chunks: Vec<StoredChunk> = Self::collect_rows(results)
            .await?
            .into_iter()
            .map(|(id, metadata, _)| StoredChunk { id, metadata })
            .collect();

        debug!("Found {} stored chunks for {}", chunks.len(), source_url);
        Ok(chunks)
    }

    async fn delete_by_source_url(&self, source_url: &str) -> Result<u64> {
        let table = self.table().await?;
        let predicate = source_url_predicate(source_url);

        let existing = table
            .count_rows(Some(predicate.clone()))
            .await
            .map_err(|e| DocsError::Database(format!("Failed to count rows: {}", e)))?;

        table.delete(&predicate).await.map_err(|e| {
            DocsError::Database(format!("Failed to delete chunks for {}: {}", source_url, e))
        })?;

        info!("Deleted {} chunks for {}", existing, source_url);
        Ok(existing as u64)
    }

    async fn insert(&self, record: ChunkRecord) -> Result<()> {
        let record_batch = self.create_record_batch(&record)?;
        let table = self.table().await?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table.add(reader).execute().await.map_err(|e| {
            DocsError::Database(format!(
                "Failed to insert chunk for {}: {}",
                record.metadata.source_url, e
            ))
        })?;

        debug!(
            "Stored chunk {} of {}",
            record.metadata.section_index, record.metadata.source_url
        );
        Ok(())
    }

    async fn source_urls_for_document(&self, document_path: &str) -> Result<Vec<String>> {
        let table = self.table().await?;
        let results = table
            .query()
            .only_if(document_path_predicate(document_path))
            .execute()
            .await
            .map_err(|e| {
                DocsError::Database(format!(
                    "Failed to query chunks of {}: {}",
                    document_path, e
                ))
            })?;

        let mut urls: Vec<String> = Vec::new();
        for (_, metadata, _) in Self::collect_rows(results).await? {
            if !urls.contains(&metadata.source_url) {
                urls.push(metadata.source_url);
            }
        }

        debug!("{} is stored under {} source URLs", document_path, urls.len());
        Ok(urls)
    }

    async fn nearest_neighbors(
        &self,
        query: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        debug!(
            "Searching for {} nearest chunks above similarity {}",
            limit, threshold
        );

        let table = self.table().await?;
        let results = table
            .vector_search(query)
            .map_err(|e| DocsError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| DocsError::Database(format!("Failed to execute search: {}", e)))?;

        let mut hits: Vec<SearchResult> = Self::collect_rows(results)
            .await?
            .into_iter()
            .map(|(_, chunk, distance)| SearchResult {
                chunk,
                // Cosine distance is 1 - similarity
                similarity: 1.0 - distance.unwrap_or(1.0),
            })
            .filter(|hit| hit.similarity > threshold)
            .collect();

        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(limit);

        debug!("Search returned {} chunks", hits.len());
        Ok(hits)
    }

    async fn count_chunks(&self, source_url: Option<&str>) -> Result<u64> {
        let table = self.table().await?;
        let count = table
            .count_rows(source_url.map(source_url_predicate))
            .await
            .map_err(|e| DocsError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }
}
