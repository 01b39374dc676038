use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::Config;
use crate::ollama::OllamaClient;
use crate::pipeline::{DocumentStore, OllamaGenerator, QueryPipeline, VectorSearchStore};
use crate::server::RpcServer;
use crate::store::VectorStore;

/// Ingest a document file into the collection
#[inline]
pub async fn ingest_document(path: PathBuf, id: Option<String>) -> Result<()> {
    let text = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read document from {}", path.display()))?;

    if text.trim().is_empty() {
        anyhow::bail!("Document {} is empty", path.display());
    }

    // Fall back to a generated id so repeated unnamed ingests never collide
    let document_id = id.unwrap_or_else(|| Uuid::new_v4().to_string());

    let config = Config::load().context("Failed to load configuration")?;
    let store = open_document_store(&config).await?;

    info!("Ingesting document {} from {}", document_id, path.display());
    store.ingest(&document_id, &text).await?;

    println!("Ingested document: {}", document_id);
    println!("  Source: {}", path.display());
    println!("  Length: {} characters", text.len());

    Ok(())
}

/// Answer a question from the command line
#[inline]
pub async fn ask_question(question: String, limit: Option<usize>) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let pipeline = build_pipeline(&config).await?;

    let answer = pipeline.answer(&question, limit).await?;

    if answer.passages.is_empty() {
        println!("(no matching documents; answering without context)");
        println!();
    }

    println!("{}", answer.answer);

    Ok(())
}

/// Start the JSON-RPC query server
#[inline]
pub async fn serve(host: Option<String>, port: Option<u16>) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    // The server is useless without a reachable Ollama, so fail fast here
    let client = OllamaClient::new(&config).context("Failed to create Ollama client")?;
    {
        let client = client.clone();
        tokio::task::spawn_blocking(move || client.health_check())
            .await
            .context("Health check task failed")?
            .map_err(|e| {
                error!("Ollama health check failed: {}", e);
                println!(
                    "Error: Cannot reach Ollama at {}:{}",
                    config.ollama.host, config.ollama.port
                );
                println!("Please ensure Ollama is running and both models are pulled.");
                println!("Use 'askdocs config' to update connection settings.");
                e
            })?;
    }

    let pipeline = build_pipeline(&config).await?;
    let server = Arc::new(RpcServer::new(pipeline));

    let listener = RpcServer::bind(&host, port)
        .await
        .with_context(|| format!("Failed to bind {}:{}", host, port))?;

    println!("Query server listening on {}:{}", host, port);
    println!("Methods: ask, ping (JSON-RPC 2.0, one request per line)");
    println!("Press Ctrl+C to stop the server");

    tokio::select! {
        result = server.serve(listener) => {
            if let Err(e) = result {
                error!("Query server error: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nReceived interrupt signal, shutting down...");
        }
    }

    println!("Shutdown complete");
    Ok(())
}

/// Show connectivity and collection status
#[inline]
pub async fn show_status() -> Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("Askdocs Status");
    println!("{}", "=".repeat(40));
    println!();

    println!("Ollama:");
    match OllamaClient::new(&config) {
        Ok(client) => {
            let check = tokio::task::spawn_blocking(move || client.health_check())
                .await
                .context("Health check task failed")?;
            match check {
                Ok(()) => {
                    println!(
                        "  Connected ({}:{})",
                        config.ollama.host, config.ollama.port
                    );
                    println!("  Embedding model:  {}", config.ollama.embedding_model);
                    println!("  Generation model: {}", config.ollama.generation_model);
                }
                Err(e) => {
                    println!("  Unhealthy: {}", e);
                }
            }
        }
        Err(e) => {
            println!("  Failed to create client: {}", e);
        }
    }

    println!();
    println!("Vector store:");
    match VectorStore::open(&config).await {
        Ok(store) => {
            println!("  Connected ({})", config.vector_store_path().display());
            println!("  Collection: {}", config.retrieval.collection);
            match store.count_documents().await {
                Ok(count) => println!("  Documents: {}", count),
                Err(e) => println!("  Documents: unavailable - {}", e),
            }
        }
        Err(e) => {
            println!("  Failed to open: {}", e);
        }
    }

    println!();
    println!("Server: {}:{}", config.server.host, config.server.port);
    println!("Default results per query: {}", config.retrieval.n_results);

    Ok(())
}

/// Wire up the production pipeline from configuration
async fn build_pipeline(config: &Config) -> Result<Arc<QueryPipeline>> {
    let store = open_document_store(config).await?;
    let client = OllamaClient::new(config).context("Failed to create Ollama client")?;
    let generator = Arc::new(OllamaGenerator::new(client));

    Ok(Arc::new(QueryPipeline::new(
        store,
        generator,
        config.retrieval.n_results,
    )))
}

async fn open_document_store(config: &Config) -> Result<Arc<VectorSearchStore>> {
    let client = OllamaClient::new(config).context("Failed to create Ollama client")?;
    let vector_store = Arc::new(
        VectorStore::open(config)
            .await
            .context("Failed to open vector store")?,
    );

    Ok(Arc::new(VectorSearchStore::new(client, vector_store)))
}
