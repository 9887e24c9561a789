use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};

use axum::{Json, Router, extract::State, routing::post};
use serde_json::{Map, Value, json};

use desk_config::EmbeddingProviderConfig;
use desk_providers::EmbeddingClient;

#[derive(Clone)]
struct ServerState {
	calls: Arc<AtomicUsize>,
	max_batch: Arc<AtomicUsize>,
}

/// Answers like an OpenAI-style embeddings endpoint, but in reverse order so
/// the client's index re-sort is actually exercised. Each vector's first
/// component encodes the input's numeric suffix.
async fn embeddings(State(state): State<ServerState>, Json(body): Json<Value>) -> Json<Value> {
	let inputs = body["input"].as_array().cloned().unwrap_or_default();

	state.calls.fetch_add(1, Ordering::SeqCst);
	state.max_batch.fetch_max(inputs.len(), Ordering::SeqCst);

	let data: Vec<Value> = inputs
		.iter()
		.enumerate()
		.rev()
		.map(|(index, input)| {
			let marker = input
				.as_str()
				.and_then(|text| text.rsplit('-').next())
				.and_then(|suffix| suffix.parse::<f64>().ok())
				.unwrap_or(-1.0);

			json!({ "index": index, "embedding": [marker, 0.0] })
		})
		.collect();

	Json(json!({ "data": data }))
}

async fn spawn_server(state: ServerState) -> String {
	let app = Router::new().route("/v1/embeddings", post(embeddings)).with_state(state);
	let listener =
		tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind test server.");
	let addr = listener.local_addr().expect("Missing local addr.");

	tokio::spawn(async move {
		axum::serve(listener, app).await.expect("Test server failed.");
	});

	format!("http://{addr}")
}

fn test_cfg(api_base: String) -> EmbeddingProviderConfig {
	EmbeddingProviderConfig {
		provider_id: "test".to_string(),
		api_base,
		api_key: "test-key".to_string(),
		path: "/v1/embeddings".to_string(),
		model: "test-embedding".to_string(),
		dimensions: 2,
		batch_size: 100,
		batch_delay_ms: 0,
		timeout_ms: 5_000,
		default_headers: Map::new(),
	}
}

#[tokio::test]
async fn batch_of_250_returns_250_results_in_input_order() {
	let state =
		ServerState { calls: Arc::new(AtomicUsize::new(0)), max_batch: Arc::new(AtomicUsize::new(0)) };
	let api_base = spawn_server(state.clone()).await;
	let client = EmbeddingClient::new(test_cfg(api_base)).expect("Failed to build client.");
	let texts: Vec<String> = (0..250).map(|i| format!("text-{i}")).collect();
	let results = client.embed_batch(&texts, None).await.expect("Batch embed failed.");

	assert_eq!(results.len(), 250);

	for (i, result) in results.iter().enumerate() {
		assert_eq!(result.source_index, i);
		assert_eq!(result.text, format!("text-{i}"));
		assert_eq!(result.embedding[0], i as f32);
	}

	assert_eq!(state.calls.load(Ordering::SeqCst), 3);
	assert!(state.max_batch.load(Ordering::SeqCst) <= 100);
}

#[tokio::test]
async fn progress_callback_reports_completed_counts() {
	let state =
		ServerState { calls: Arc::new(AtomicUsize::new(0)), max_batch: Arc::new(AtomicUsize::new(0)) };
	let api_base = spawn_server(state.clone()).await;
	let client = EmbeddingClient::new(test_cfg(api_base)).expect("Failed to build client.");
	let texts: Vec<String> = (0..150).map(|i| format!("text-{i}")).collect();
	let mut seen = Vec::new();
	let results = client
		.embed_batch(&texts, Some(&mut |done, total| seen.push((done, total))))
		.await
		.expect("Batch embed failed.");

	assert_eq!(results.len(), 150);
	assert_eq!(seen, vec![(100, 150), (150, 150)]);
}
