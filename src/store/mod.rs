// LanceDB vector store module
// Handles persistence and similarity search for document records

#[cfg(test)]
mod tests;

pub mod vector_store;

use serde::{Deserialize, Serialize};

pub use vector_store::{DocumentMatch, VectorStore};

/// Document record stored in the vector store collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentRecord {
    /// Unique identifier for this document
    pub id: String,
    /// The raw text content, ingested as a single chunk
    pub content: String,
    /// The embedding vector computed at ingestion time
    pub vector: Vec<f32>,
    /// Timestamp when this record was created
    pub created_at: String,
}

impl DocumentRecord {
    /// Build a record stamped with the current UTC time
    #[inline]
    pub fn new(id: String, content: String, vector: Vec<f32>) -> Self {
        Self {
            id,
            content,
            vector,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
