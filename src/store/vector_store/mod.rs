
use super::DocumentRecord;
use crate::{RagError, config::Config};
use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use std::sync::Arc;
use tracing::{debug, info};

/// Persistent document collection backed by LanceDB, with load-or-create
/// semantics across process restarts
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    vector_dimension: usize,
}

/// A single ranked result from a similarity search
#[derive(Debug, Clone)]
pub struct DocumentMatch {
    pub id: String,
    pub content: String,
    pub created_at: String,
    pub similarity_score: f32,
    pub distance: f32,
}

impl VectorStore {
    /// Open the configured collection, creating it if absent
    #[inline]
    pub async fn open(config: &Config) -> Result<Self, RagError> {
        let db_path = config.vector_store_path();
        debug!("Initializing LanceDB at path: {:?}", db_path);

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RagError::Store(format!("Failed to create vector store directory: {}", e))
            })?;
        }

        let uri = format!("file://{}", db_path.display());

        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to connect to LanceDB: {}", e)))?;

        let store = Self {
            connection,
            table_name: config.retrieval.collection.clone(),
            vector_dimension: config.ollama.embedding_dimension as usize,
        };

        store.initialize_table().await?;

        info!("Vector store initialized (collection: {})", store.table_name);
        Ok(store)
    }

    /// Create the collection table with the configured schema if it does
    /// not exist yet
    async fn initialize_table(&self) -> Result<(), RagError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to list tables: {}", e)))?;

        if table_names.contains(&self.table_name) {
            debug!("Collection table {} already exists", self.table_name);
            return Ok(());
        }

        info!(
            "Creating collection table {} with {} dimensions",
            self.table_name, self.vector_dimension
        );

        let schema = self.create_schema();
        self.connection
            .create_empty_table(&self.table_name, schema)
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to create table: {}", e)))?;

        Ok(())
    }

    fn create_schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    self.vector_dimension as i32,
                ),
                false,
            ),
            Field::new("content", DataType::Utf8, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    /// Store a document record, replacing any existing record with the same
    /// id. Re-ingesting under the same id deterministically overwrites.
    #[inline]
    pub async fn upsert_document(&self, record: DocumentRecord) -> Result<(), RagError> {
        if record.vector.len() != self.vector_dimension {
            return Err(RagError::Store(format!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.vector_dimension,
                record.vector.len()
            )));
        }

        debug!("Upserting document {}", record.id);

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to open table: {}", e)))?;

        // Drop any previous record under this id so re-ingestion overwrites
        let predicate = format!("id = '{}'", escape_literal(&record.id));
        table
            .delete(&predicate)
            .await
            .map_err(|e| RagError::Store(format!("Failed to clear existing record: {}", e)))?;

        let record_batch = self.create_record_batch(&record)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to insert document: {}", e)))?;

        info!("Stored document {}", record.id);
        Ok(())
    }

    fn create_record_batch(&self, record: &DocumentRecord) -> Result<RecordBatch, RagError> {
        let schema = self.create_schema();

        let values_array = Float32Array::from(record.vector.clone());
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            field,
            self.vector_dimension as i32,
            Arc::new(values_array),
            None,
        )
        .map_err(|e| RagError::Store(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn arrow::array::Array>> = vec![
            Arc::new(StringArray::from(vec![record.id.as_str()])),
            Arc::new(vector_array),
            Arc::new(StringArray::from(vec![record.content.as_str()])),
            Arc::new(StringArray::from(vec![record.created_at.as_str()])),
        ];

        RecordBatch::try_new(schema, arrays)
            .map_err(|e| RagError::Store(format!("Failed to create record batch: {}", e)))
    }

    /// Search for the nearest stored documents to a query vector
    #[inline]
    pub async fn search_similar(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<DocumentMatch>, RagError> {
        debug!("Searching for similar documents with limit: {}", limit);

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to open table: {}", e)))?;

        let query = table
            .vector_search(query_vector)
            .map_err(|e| RagError::Store(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(limit);

        let mut results = query
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to execute search: {}", e)))?;

        let mut matches = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| RagError::Store(format!("Failed to read result stream: {}", e)))?
        {
            matches.extend(Self::parse_search_batch(&batch)?);
        }

        debug!("Found {} matching documents", matches.len());
        Ok(matches)
    }

    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<DocumentMatch>, RagError> {
        let num_rows = batch.num_rows();

        let ids = batch
            .column_by_name("id")
            .ok_or_else(|| RagError::Store("Missing id column".to_string()))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| RagError::Store("Invalid id column type".to_string()))?;

        let contents = batch
            .column_by_name("content")
            .ok_or_else(|| RagError::Store("Missing content column".to_string()))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| RagError::Store("Invalid content column type".to_string()))?;

        let created_ats = batch
            .column_by_name("created_at")
            .ok_or_else(|| RagError::Store("Missing created_at column".to_string()))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| RagError::Store("Invalid created_at column type".to_string()))?;

        let distances = batch
            .column_by_name("_distance")
            .map(|col| col.as_any().downcast_ref::<Float32Array>());

        let mut matches = Vec::with_capacity(num_rows);
        for row in 0..num_rows {
            let distance = distances
                .flatten()
                .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            matches.push(DocumentMatch {
                id: ids.value(row).to_string(),
                content: contents.value(row).to_string(),
                created_at: created_ats.value(row).to_string(),
                similarity_score: 1.0 - distance,
                distance,
            });
        }

        Ok(matches)
    }

    /// Delete a document by id; returns whether a matching record existed
    #[inline]
    pub async fn delete_document(&self, id: &str) -> Result<bool, RagError> {
        let existed = self.contains_document(id).await?;

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to open table: {}", e)))?;

        let predicate = format!("id = '{}'", escape_literal(id));
        table
            .delete(&predicate)
            .await
            .map_err(|e| RagError::Store(format!("Failed to delete document: {}", e)))?;

        Ok(existed)
    }

    /// Check whether a document with the given id is stored
    #[inline]
    pub async fn contains_document(&self, id: &str) -> Result<bool, RagError> {
        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to open table: {}", e)))?;

        let predicate = format!("id = '{}'", escape_literal(id));
        let count = table
            .count_rows(Some(predicate))
            .await
            .map_err(|e| RagError::Store(format!("Failed to count rows: {}", e)))?;

        Ok(count > 0)
    }

    /// Get the total number of stored documents
    #[inline]
    pub async fn count_documents(&self) -> Result<u64, RagError> {
        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to open table: {}", e)))?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Store(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }
}

/// Escape a string for use inside a single-quoted SQL literal
fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}
