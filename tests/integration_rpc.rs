#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

use std::sync::Arc;

use askdocs::config::{Config, OllamaConfig};
use askdocs::ollama::OllamaClient;
use askdocs::pipeline::{DocumentStore, OllamaGenerator, QueryPipeline, VectorSearchStore};
use askdocs::server::RpcServer;
use askdocs::store::VectorStore;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DIMENSION: usize = 64;

const KUBERNETES_DOC: &str =
    "Kubernetes is a container orchestration platform that automates deployment and scaling.";
const COOKING_DOC: &str = "Sourdough bread needs a well-fed starter and a long, slow ferment.";
const QUESTION: &str = "What is Kubernetes?";
const ANSWER: &str = "Kubernetes is a platform for orchestrating containers.";

fn test_vector(seed: f32) -> Vec<f32> {
    (0..DIMENSION).map(|i| seed + i as f32 * 0.001).collect()
}

fn config_for(server_uri: &str, base_dir: &TempDir) -> Config {
    let url = url::Url::parse(server_uri).expect("mock server URI should parse");

    Config {
        base_dir: base_dir.path().to_path_buf(),
        ollama: OllamaConfig {
            protocol: url.scheme().to_string(),
            host: url.host_str().expect("mock server should have host").to_string(),
            port: url.port().expect("mock server should have port"),
            embedding_dimension: DIMENSION as u32,
            ..OllamaConfig::default()
        },
        ..Config::default()
    }
}

/// Mount embedding mocks: the Kubernetes document and the question embed
/// near each other, the cooking document far away
async fn mount_embedding_mocks(server: &MockServer) {
    for (text, seed) in [
        (KUBERNETES_DOC, 0.1_f32),
        (QUESTION, 0.11),
        (COOKING_DOC, 0.9),
    ] {
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .and(body_partial_json(json!({ "prompt": text })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "embedding": test_vector(seed) })),
            )
            .mount(server)
            .await;
    }
}

async fn start_query_server(
    mock: &MockServer,
    base_dir: &TempDir,
) -> (std::net::SocketAddr, Arc<VectorSearchStore>) {
    let config = config_for(&mock.uri(), base_dir);

    let client = OllamaClient::new(&config)
        .expect("should create client")
        .with_retry_attempts(1);

    let vector_store = Arc::new(
        VectorStore::open(&config)
            .await
            .expect("should open vector store"),
    );
    let store = Arc::new(VectorSearchStore::new(client.clone(), vector_store));

    let generator = Arc::new(OllamaGenerator::new(client));
    let pipeline = Arc::new(QueryPipeline::new(
        Arc::clone(&store) as Arc<dyn DocumentStore>,
        generator,
        config.retrieval.n_results,
    ));

    let server = Arc::new(RpcServer::new(pipeline));
    let listener = RpcServer::bind("127.0.0.1", 0)
        .await
        .expect("should bind ephemeral port");
    let addr = listener.local_addr().expect("should get local addr");

    tokio::spawn(server.serve(listener));

    (addr, store)
}

async fn send_request(addr: std::net::SocketAddr, request: &str) -> Value {
    let stream = TcpStream::connect(addr).await.expect("should connect");
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    write_half
        .write_all(request.as_bytes())
        .await
        .expect("should write request");
    write_half.write_all(b"\n").await.expect("should write newline");

    let mut line = String::new();
    reader
        .read_line(&mut line)
        .await
        .expect("should read response");

    serde_json::from_str(&line).expect("response should be valid JSON")
}

#[tokio::test(flavor = "multi_thread")]
async fn ask_answers_from_ingested_documents() {
    let mock = MockServer::start().await;
    let base_dir = TempDir::new().expect("should create temp dir");

    mount_embedding_mocks(&mock).await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": ANSWER })))
        .expect(1)
        .mount(&mock)
        .await;

    let (addr, store) = start_query_server(&mock, &base_dir).await;

    store
        .ingest("k8s", KUBERNETES_DOC)
        .await
        .expect("should ingest document");
    store
        .ingest("bread", COOKING_DOC)
        .await
        .expect("should ingest document");

    let request = json!({
        "jsonrpc": "2.0",
        "method": "ask",
        "params": { "question": QUESTION },
        "id": 1
    });
    let response = send_request(addr, &request.to_string()).await;

    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["id"], 1);
    assert_eq!(response["result"]["answer"], ANSWER);
    assert!(response.get("error").is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_question_is_rejected_before_generation() {
    let mock = MockServer::start().await;
    let base_dir = TempDir::new().expect("should create temp dir");

    mount_embedding_mocks(&mock).await;

    // Validation must short-circuit: no generation request may be issued
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": ANSWER })))
        .expect(0)
        .mount(&mock)
        .await;

    let (addr, _store) = start_query_server(&mock, &base_dir).await;

    let request = json!({
        "jsonrpc": "2.0",
        "method": "ask",
        "params": { "question": "   " },
        "id": 2
    });
    let response = send_request(addr, &request.to_string()).await;

    assert_eq!(response["id"], 2);
    assert_eq!(response["error"]["code"], -32602);
    assert!(response.get("result").is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn reingesting_a_document_id_overwrites_it() {
    let mock = MockServer::start().await;
    let base_dir = TempDir::new().expect("should create temp dir");

    mount_embedding_mocks(&mock).await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": ANSWER })))
        .mount(&mock)
        .await;

    let (addr, store) = start_query_server(&mock, &base_dir).await;

    store
        .ingest("doc", COOKING_DOC)
        .await
        .expect("should ingest document");
    store
        .ingest("doc", KUBERNETES_DOC)
        .await
        .expect("re-ingestion should overwrite");

    let request = json!({
        "jsonrpc": "2.0",
        "method": "ask",
        "params": { "question": QUESTION },
        "id": 3
    });
    let response = send_request(addr, &request.to_string()).await;

    assert_eq!(response["result"]["answer"], ANSWER);
}
