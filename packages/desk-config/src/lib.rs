mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Agents, ChatProviderConfig, Chunking, Config, EmbeddingProviderConfig, Guardrails, Playbooks,
	Providers, Qdrant, Retrieval, Service, Storage, TierConfig,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.collection must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.providers.embedding.batch_size == 0 || cfg.providers.embedding.batch_size > 100 {
		return Err(Error::Validation {
			message: "providers.embedding.batch_size must be in the range 1-100.".to_string(),
		});
	}
	if !(0.0..=2.0).contains(&cfg.providers.chat.temperature) {
		return Err(Error::Validation {
			message: "providers.chat.temperature must be in the range 0.0-2.0.".to_string(),
		});
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("chat", &cfg.providers.chat.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	if cfg.chunking.max_tokens == 0 {
		return Err(Error::Validation {
			message: "chunking.max_tokens must be greater than zero.".to_string(),
		});
	}
	if cfg.chunking.min_tokens >= cfg.chunking.max_tokens {
		return Err(Error::Validation {
			message: "chunking.min_tokens must be less than chunking.max_tokens.".to_string(),
		});
	}
	if cfg.chunking.overlap_tokens >= cfg.chunking.max_tokens {
		return Err(Error::Validation {
			message: "chunking.overlap_tokens must be less than chunking.max_tokens.".to_string(),
		});
	}

	for (label, value) in
		[("retrieval.min_score", cfg.retrieval.min_score), ("retrieval.probe_min_score", cfg.retrieval.probe_min_score)]
	{
		if !value.is_finite() || !(0.0..=1.0).contains(&value) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-1.0."),
			});
		}
	}

	if cfg.guardrails.max_response_chars == 0 {
		return Err(Error::Validation {
			message: "guardrails.max_response_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.guardrails.max_failed_attempts == 0 {
		return Err(Error::Validation {
			message: "guardrails.max_failed_attempts must be greater than zero.".to_string(),
		});
	}

	for (label, tier) in [("agents.tier1", &cfg.agents.tier1), ("agents.tier2", &cfg.agents.tier2)]
	{
		if tier.top_k == 0 {
			return Err(Error::Validation {
				message: format!("{label}.top_k must be greater than zero."),
			});
		}
		if tier.context_tokens == 0 {
			return Err(Error::Validation {
				message: format!("{label}.context_tokens must be greater than zero."),
			});
		}
		if tier.max_history_messages == 0 {
			return Err(Error::Validation {
				message: format!("{label}.max_history_messages must be greater than zero."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg
		.playbooks
		.dir
		.as_deref()
		.map(|dir| dir.as_os_str().is_empty())
		.unwrap_or(false)
	{
		cfg.playbooks.dir = None;
	}
}
