//! Retrieval-augmented query pipeline
//!
//! The pipeline wires three narrow seams together: a document store that
//! ingests text and answers similarity searches, a generator that completes
//! prompts, and the prompt construction joining the two. Both seams are
//! traits so the pipeline logic is testable with mock implementations.


use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::ollama::OllamaClient;
use crate::store::{DocumentRecord, VectorStore};
use crate::{RagError, Result};

/// A retrieved passage with its similarity ranking
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPassage {
    pub id: String,
    pub text: String,
    pub score: f32,
}

/// Ingests documents and answers similarity searches against them
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn ingest(&self, id: &str, text: &str) -> Result<()>;
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredPassage>>;
}

/// Completes a prompt with a full (non-streaming) generated text
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// The answer to a question, along with the passages it was grounded on
#[derive(Debug, Clone)]
pub struct Answer {
    pub answer: String,
    pub passages: Vec<ScoredPassage>,
}

/// Orchestrates retrieve-then-generate for a single question
pub struct QueryPipeline {
    store: Arc<dyn DocumentStore>,
    generator: Arc<dyn Generator>,
    default_n_results: usize,
}

impl QueryPipeline {
    #[inline]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        generator: Arc<dyn Generator>,
        default_n_results: usize,
    ) -> Self {
        Self {
            store,
            generator,
            default_n_results: default_n_results.max(1),
        }
    }

    /// Answer a question from the document store.
    ///
    /// Empty questions are rejected before any retrieval or generation
    /// happens. When the store returns no matches the pipeline degrades to
    /// a context-free prompt rather than failing the request.
    #[inline]
    pub async fn answer(&self, question: &str, n_results: Option<usize>) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::EmptyQuestion);
        }

        let limit = n_results.unwrap_or(self.default_n_results).max(1);

        debug!("Retrieving top {} passages for question", limit);
        let passages = self.store.search(question, limit).await?;

        if passages.is_empty() {
            warn!("No passages retrieved; generating with empty context");
        }

        let prompt = build_prompt(&passages, question);
        let answer = self.generator.generate(&prompt).await?;

        Ok(Answer { answer, passages })
    }
}

/// Build the generation prompt from retrieved passages and the question.
///
/// Passages are concatenated in rank order, so raising the retrieval limit
/// can only extend the context, never shrink it.
pub fn build_prompt(passages: &[ScoredPassage], question: &str) -> String {
    let context = passages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    if context.is_empty() {
        format!(
            "Answer the following question clearly and concisely.\n\n\
             Question: {question}\n\nAnswer:"
        )
    } else {
        format!(
            "Use the following context to answer the question clearly and concisely.\n\n\
             Context:\n{context}\n\nQuestion: {question}\n\nAnswer:"
        )
    }
}

/// Production document store: Ollama embeddings over a LanceDB collection.
///
/// The blocking HTTP calls run on the blocking thread pool so a slow
/// embedding request does not stall the async executor.
pub struct VectorSearchStore {
    client: OllamaClient,
    store: Arc<VectorStore>,
}

impl VectorSearchStore {
    #[inline]
    pub fn new(client: OllamaClient, store: Arc<VectorStore>) -> Self {
        Self { client, store }
    }

    async fn embed(&self, text: String) -> Result<Vec<f32>> {
        let client = self.client.clone();
        tokio::task::spawn_blocking(move || client.generate_embedding(&text))
            .await
            .map_err(|e| RagError::Embedding(format!("Embedding task failed: {}", e)))?
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))
    }
}

#[async_trait]
impl DocumentStore for VectorSearchStore {
    #[inline]
    async fn ingest(&self, id: &str, text: &str) -> Result<()> {
        let vector = self.embed(text.to_string()).await?;
        let record = DocumentRecord::new(id.to_string(), text.to_string(), vector);
        self.store.upsert_document(record).await?;
        Ok(())
    }

    #[inline]
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredPassage>> {
        let query_vector = self.embed(query.to_string()).await?;
        let matches = self.store.search_similar(&query_vector, limit).await?;

        Ok(matches
            .into_iter()
            .map(|m| ScoredPassage {
                id: m.id,
                text: m.content,
                score: m.similarity_score,
            })
            .collect())
    }
}

/// Production generator backed by the Ollama generation endpoint
pub struct OllamaGenerator {
    client: OllamaClient,
}

impl OllamaGenerator {
    #[inline]
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    #[inline]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let client = self.client.clone();
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || client.generate(&prompt))
            .await
            .map_err(|e| RagError::Generation(format!("Generation task failed: {}", e)))?
            .map_err(|e| RagError::Generation(format!("{:#}", e)))
    }
}
