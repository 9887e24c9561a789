use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

/// One embedded input, tagged with its position in the caller's input slice.
#[derive(Clone, Debug)]
pub struct EmbeddingResult {
	pub text: String,
	pub embedding: Vec<f32>,
	pub source_index: usize,
}

pub struct EmbeddingClient {
	cfg: desk_config::EmbeddingProviderConfig,
	http: Client,
}
impl EmbeddingClient {
	pub fn new(cfg: desk_config::EmbeddingProviderConfig) -> Result<Self> {
		let http = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self { cfg, http })
	}

	pub fn dimensions(&self) -> u32 {
		self.cfg.dimensions
	}

	pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
		let input = [text.to_string()];
		let mut vectors = self.embed_call(&input).await?;

		vectors.pop().ok_or_else(|| Error::MalformedResponse {
			message: "Embedding response contained no vectors.".to_string(),
		})
	}

	/// Embeds every input, preserving input order in the output regardless of
	/// how the provider orders each response. Inputs are sent in batches of at
	/// most 100 (the provider limit) with a small delay between batches; a
	/// failed batch aborts the whole call rather than returning partial
	/// results.
	pub async fn embed_batch(
		&self,
		texts: &[String],
		mut on_progress: Option<&mut (dyn FnMut(usize, usize) + Send)>,
	) -> Result<Vec<EmbeddingResult>> {
		let batch_size = self.cfg.batch_size.clamp(1, 100) as usize;
		let mut results = Vec::with_capacity(texts.len());

		for (batch_index, batch) in texts.chunks(batch_size).enumerate() {
			if batch_index > 0 && self.cfg.batch_delay_ms > 0 {
				tokio::time::sleep(Duration::from_millis(self.cfg.batch_delay_ms)).await;
			}

			let vectors = self.embed_call(batch).await?;

			if vectors.len() != batch.len() {
				return Err(Error::MalformedResponse {
					message: format!(
						"Embedding response returned {} vectors for {} inputs.",
						vectors.len(),
						batch.len()
					),
				});
			}

			for (offset, (text, embedding)) in batch.iter().zip(vectors).enumerate() {
				results.push(EmbeddingResult {
					text: text.clone(),
					embedding,
					source_index: batch_index * batch_size + offset,
				});
			}

			if let Some(progress) = on_progress.as_mut() {
				(*progress)(results.len(), texts.len());
			}
		}

		Ok(results)
	}

	async fn embed_call(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		let url = format!("{}{}", self.cfg.api_base, self.cfg.path);
		let body = serde_json::json!({
			"model": self.cfg.model,
			"input": texts,
			"dimensions": self.cfg.dimensions,
		});
		let res = self
			.http
			.post(url)
			.headers(crate::auth_headers(&self.cfg.api_key, &self.cfg.default_headers)?)
			.json(&body)
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;

		parse_embedding_response(json)
	}
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
	if a.len() != b.len() {
		return Err(Error::DimensionMismatch { left: a.len(), right: b.len() });
	}

	let mut dot = 0.0_f32;
	let mut norm_a = 0.0_f32;
	let mut norm_b = 0.0_f32;

	for (x, y) in a.iter().zip(b) {
		dot += x * y;
		norm_a += x * x;
		norm_b += y * y;
	}

	if norm_a == 0.0 || norm_b == 0.0 {
		return Ok(0.0);
	}

	Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Provider responses are not guaranteed ordered; items are re-sorted by their
/// reported index before return.
fn parse_embedding_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json.get("data").and_then(|v| v.as_array()).ok_or_else(|| {
		Error::MalformedResponse { message: "Embedding response is missing data array.".to_string() }
	})?;

	let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());

	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.map(|v| v as usize)
			.unwrap_or(fallback_index);
		let embedding = item.get("embedding").and_then(|v| v.as_array()).ok_or_else(|| {
			Error::MalformedResponse {
				message: "Embedding item missing embedding array.".to_string(),
			}
		})?;
		let mut vec = Vec::with_capacity(embedding.len());

		for value in embedding {
			let number = value.as_f64().ok_or_else(|| Error::MalformedResponse {
				message: "Embedding value must be numeric.".to_string(),
			})?;

			vec.push(number as f32);
		}

		indexed.push((index, vec));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}
