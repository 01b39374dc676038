//! TCP query server
//!
//! Serves the retrieval pipeline over newline-delimited JSON-RPC 2.0: one
//! request per line, one response per line. Each accepted connection gets
//! its own task and may issue any number of requests.

pub mod protocol;

#[cfg(test)]
mod tests;

use anyhow::Result;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::RagError;
use crate::pipeline::QueryPipeline;
use crate::server::protocol::{
    AskParams, JSONRPC_VERSION, JsonRpcError, JsonRpcErrorResponse, JsonRpcRequest,
    JsonRpcResponse,
};

/// JSON-RPC server exposing the query pipeline
pub struct RpcServer {
    pipeline: Arc<QueryPipeline>,
}

impl RpcServer {
    #[inline]
    pub fn new(pipeline: Arc<QueryPipeline>) -> Self {
        Self { pipeline }
    }

    /// Bind the listening socket
    #[inline]
    pub async fn bind(host: &str, port: u16) -> Result<TcpListener> {
        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&addr).await?;
        info!("Query server listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Accept connections until the listener is dropped
    #[inline]
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            debug!("Accepted connection from {}", peer);

            let server = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = server.handle_connection(stream, peer).await {
                    error!("Connection {} failed: {}", peer, e);
                }
            });
        }
    }

    /// Read and answer requests from a single connection until EOF
    async fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) -> Result<()> {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    debug!("Connection {} closed", peer);
                    break;
                }
                Ok(_) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    let response = self.process_line(line).await?;
                    write_half.write_all(response.as_bytes()).await?;
                    write_half.write_all(b"\n").await?;
                    write_half.flush().await?;
                }
                Err(e) => {
                    error!("Error reading from {}: {}", peer, e);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Process one request line and serialize the response
    pub async fn process_line(&self, line: &str) -> Result<String> {
        let raw_value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to parse request JSON: {}", e);
                let response = JsonRpcErrorResponse::new(JsonRpcError::parse_error(), None);
                return Ok(serde_json::to_string(&response)?);
            }
        };

        let request: JsonRpcRequest = match serde_json::from_value(raw_value) {
            Ok(request) => request,
            Err(e) => {
                warn!("Request does not conform to JSON-RPC 2.0: {}", e);
                let response = JsonRpcErrorResponse::new(JsonRpcError::invalid_request(), None);
                return Ok(serde_json::to_string(&response)?);
            }
        };

        if request.jsonrpc != JSONRPC_VERSION {
            let response = JsonRpcErrorResponse::new(
                JsonRpcError::invalid_request(),
                Some(request.id),
            );
            return Ok(serde_json::to_string(&response)?);
        }

        let id = request.id.clone();
        match self.dispatch(request).await {
            Ok(result) => {
                let response = JsonRpcResponse::new(result, id);
                Ok(serde_json::to_string(&response)?)
            }
            Err(error) => {
                let response = JsonRpcErrorResponse::new(error, Some(id));
                Ok(serde_json::to_string(&response)?)
            }
        }
    }

    /// Route a request to its method handler
    async fn dispatch(&self, request: JsonRpcRequest) -> Result<Value, JsonRpcError> {
        match request.method.as_str() {
            "ask" => self.handle_ask(request.params).await,
            "ping" => Ok(json!({})),
            _ => {
                warn!("Unknown method: {}", request.method);
                Err(JsonRpcError::method_not_found())
            }
        }
    }

    /// Handle the `ask` method: retrieve context and generate an answer
    async fn handle_ask(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: AskParams = match params {
            Some(p) => serde_json::from_value(p)
                .map_err(|e| JsonRpcError::invalid_params(Some(format!("{}", e))))?,
            None => {
                return Err(JsonRpcError::invalid_params(Some(
                    "ask requires parameters".to_string(),
                )));
            }
        };

        let answer = self
            .pipeline
            .answer(&params.question, params.n_results)
            .await
            .map_err(map_pipeline_error)?;

        debug!(
            "Answered question using {} passages",
            answer.passages.len()
        );
        Ok(json!({ "answer": answer.answer }))
    }
}

/// Map a pipeline failure onto the JSON-RPC error taxonomy.
///
/// A rejected question is the caller's fault (invalid params); everything
/// downstream of validation is an internal error.
fn map_pipeline_error(error: RagError) -> JsonRpcError {
    match error {
        RagError::EmptyQuestion => {
            JsonRpcError::invalid_params(Some(error.to_string()))
        }
        other => JsonRpcError::internal_error(Some(other.to_string())),
    }
}
