use super::*;
use crate::Result as RagResult;
use crate::pipeline::{DocumentStore, Generator, ScoredPassage};
use async_trait::async_trait;
use protocol::error_codes;

struct StubStore {
    passages: Vec<ScoredPassage>,
    fail: bool,
}

#[async_trait]
impl DocumentStore for StubStore {
    async fn ingest(&self, _id: &str, _text: &str) -> RagResult<()> {
        Ok(())
    }

    async fn search(&self, _query: &str, limit: usize) -> RagResult<Vec<ScoredPassage>> {
        if self.fail {
            return Err(RagError::Store("collection unavailable".to_string()));
        }
        Ok(self.passages.iter().take(limit).cloned().collect())
    }
}

struct StubGenerator {
    answer: String,
}

#[async_trait]
impl Generator for StubGenerator {
    async fn generate(&self, _prompt: &str) -> RagResult<String> {
        Ok(self.answer.clone())
    }
}

fn test_server() -> RpcServer {
    test_server_with_store(StubStore {
        passages: vec![ScoredPassage {
            id: "doc1".to_string(),
            text: "Kubernetes is a container orchestration platform.".to_string(),
            score: 0.9,
        }],
        fail: false,
    })
}

fn test_server_with_store(store: StubStore) -> RpcServer {
    let generator = StubGenerator {
        answer: "It orchestrates containers.".to_string(),
    };
    let pipeline = QueryPipeline::new(Arc::new(store), Arc::new(generator), 1);
    RpcServer::new(Arc::new(pipeline))
}

async fn process(server: &RpcServer, line: &str) -> Value {
    let response = server
        .process_line(line)
        .await
        .expect("processing should produce a response");
    serde_json::from_str(&response).expect("response should be valid JSON")
}

#[tokio::test]
async fn ask_returns_answer() {
    let server = test_server();
    let request =
        r#"{"jsonrpc":"2.0","method":"ask","params":{"question":"What is Kubernetes?"},"id":1}"#;

    let response = process(&server, request).await;

    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["id"], 1);
    assert_eq!(response["result"]["answer"], "It orchestrates containers.");
    assert!(response.get("error").is_none());
}

#[tokio::test]
async fn ask_accepts_n_results_override() {
    let server = test_server();
    let request = r#"{"jsonrpc":"2.0","method":"ask","params":{"question":"What is Kubernetes?","n_results":3},"id":"req-1"}"#;

    let response = process(&server, request).await;

    assert_eq!(response["id"], "req-1");
    assert_eq!(response["result"]["answer"], "It orchestrates containers.");
}

#[tokio::test]
async fn empty_question_is_invalid_params() {
    let server = test_server();
    let request = r#"{"jsonrpc":"2.0","method":"ask","params":{"question":"   "},"id":2}"#;

    let response = process(&server, request).await;

    assert_eq!(response["id"], 2);
    assert_eq!(response["error"]["code"], error_codes::INVALID_PARAMS);
    assert!(response.get("result").is_none());
}

#[tokio::test]
async fn missing_params_is_invalid_params() {
    let server = test_server();
    let request = r#"{"jsonrpc":"2.0","method":"ask","id":3}"#;

    let response = process(&server, request).await;

    assert_eq!(response["error"]["code"], error_codes::INVALID_PARAMS);
}

#[tokio::test]
async fn unknown_method_is_rejected() {
    let server = test_server();
    let request = r#"{"jsonrpc":"2.0","method":"summarize","params":{},"id":4}"#;

    let response = process(&server, request).await;

    assert_eq!(response["id"], 4);
    assert_eq!(response["error"]["code"], error_codes::METHOD_NOT_FOUND);
}

#[tokio::test]
async fn malformed_json_is_parse_error() {
    let server = test_server();

    let response = process(&server, "{not json").await;

    assert_eq!(response["error"]["code"], error_codes::PARSE_ERROR);
    assert_eq!(response["id"], Value::Null);
}

#[tokio::test]
async fn request_without_id_is_invalid() {
    let server = test_server();
    let request = r#"{"jsonrpc":"2.0","method":"ask","params":{"question":"hi"}}"#;

    let response = process(&server, request).await;

    assert_eq!(response["error"]["code"], error_codes::INVALID_REQUEST);
}

#[tokio::test]
async fn wrong_protocol_version_is_invalid() {
    let server = test_server();
    let request = r#"{"jsonrpc":"1.0","method":"ping","id":5}"#;

    let response = process(&server, request).await;

    assert_eq!(response["id"], 5);
    assert_eq!(response["error"]["code"], error_codes::INVALID_REQUEST);
}

#[tokio::test]
async fn store_failure_is_internal_error() {
    let server = test_server_with_store(StubStore {
        passages: Vec::new(),
        fail: true,
    });
    let request = r#"{"jsonrpc":"2.0","method":"ask","params":{"question":"hi"},"id":6}"#;

    let response = process(&server, request).await;

    assert_eq!(response["error"]["code"], error_codes::INTERNAL_ERROR);
    assert!(
        response["error"]["message"]
            .as_str()
            .expect("error message should be a string")
            .contains("collection unavailable")
    );
}

#[tokio::test]
async fn ping_responds_with_empty_object() {
    let server = test_server();
    let request = r#"{"jsonrpc":"2.0","method":"ping","id":7}"#;

    let response = process(&server, request).await;

    assert_eq!(response["id"], 7);
    assert_eq!(response["result"], json!({}));
}

#[tokio::test]
async fn connection_answers_over_tcp() {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;

    let server = Arc::new(test_server());
    let listener = RpcServer::bind("127.0.0.1", 0)
        .await
        .expect("should bind ephemeral port");
    let addr = listener.local_addr().expect("should get local addr");

    tokio::spawn(server.serve(listener));

    let stream = TcpStream::connect(addr).await.expect("should connect");
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    write_half
        .write_all(
            b"{\"jsonrpc\":\"2.0\",\"method\":\"ask\",\"params\":{\"question\":\"What is Kubernetes?\"},\"id\":1}\n",
        )
        .await
        .expect("should write request");

    let mut line = String::new();
    reader
        .read_line(&mut line)
        .await
        .expect("should read response");

    let response: Value = serde_json::from_str(&line).expect("response should be valid JSON");
    assert_eq!(response["result"]["answer"], "It orchestrates containers.");

    // Same connection serves further requests
    write_half
        .write_all(b"{\"jsonrpc\":\"2.0\",\"method\":\"ping\",\"id\":2}\n")
        .await
        .expect("should write second request");

    line.clear();
    reader
        .read_line(&mut line)
        .await
        .expect("should read second response");
    let response: Value = serde_json::from_str(&line).expect("response should be valid JSON");
    assert_eq!(response["id"], 2);
}
