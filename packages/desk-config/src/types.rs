use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub chunking: Chunking,
	pub retrieval: Retrieval,
	pub guardrails: Guardrails,
	pub agents: Agents,
	pub playbooks: Playbooks,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub chat: ChatProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	#[serde(default = "default_batch_size")]
	pub batch_size: u32,
	#[serde(default = "default_batch_delay_ms")]
	pub batch_delay_ms: u64,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Chunking {
	pub max_tokens: u32,
	pub min_tokens: u32,
	pub overlap_tokens: u32,
}
impl Default for Chunking {
	fn default() -> Self {
		Self { max_tokens: 500, min_tokens: 100, overlap_tokens: 50 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	pub min_score: f32,
	pub probe_min_score: f32,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self { min_score: 0.7, probe_min_score: 0.75 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Guardrails {
	pub max_response_chars: u32,
	pub max_failed_attempts: u32,
}
impl Default for Guardrails {
	fn default() -> Self {
		Self { max_response_chars: 4_000, max_failed_attempts: 3 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Agents {
	pub tier1: TierConfig,
	pub tier2: TierConfig,
}
impl Default for Agents {
	fn default() -> Self {
		Self {
			tier1: TierConfig { top_k: 5, context_tokens: 2_000, max_history_messages: 20 },
			tier2: TierConfig { top_k: 8, context_tokens: 3_000, max_history_messages: 40 },
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct TierConfig {
	pub top_k: u32,
	pub context_tokens: u32,
	pub max_history_messages: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Playbooks {
	pub dir: Option<PathBuf>,
}

fn default_batch_size() -> u32 {
	100
}

fn default_batch_delay_ms() -> u64 {
	200
}
