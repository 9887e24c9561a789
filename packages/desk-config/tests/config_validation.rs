use toml::Value;

use desk_config::{Config, Error};

const SAMPLE_CONFIG_TOML: &str = include_str!("fixtures/sample_config.toml");

fn sample_config() -> Config {
	toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample config.")
}

fn sample_with<F>(mutate: F) -> Result<(), Error>
where
	F: FnOnce(&mut toml::Table),
{
	let mut value: Value =
		toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample config.");
	let root = value.as_table_mut().expect("Sample config must be a table.");

	mutate(root);

	let rendered = toml::to_string(&value).expect("Failed to render sample config.");
	let cfg: Config = toml::from_str(&rendered).expect("Failed to parse mutated config.");

	desk_config::validate(&cfg)
}

fn set(root: &mut toml::Table, path: &[&str], value: Value) {
	let mut table = root;

	for key in &path[..path.len() - 1] {
		table = table
			.get_mut(*key)
			.and_then(Value::as_table_mut)
			.expect("Sample config must include the mutated table.");
	}

	table.insert(path[path.len() - 1].to_string(), value);
}

#[test]
fn sample_config_is_valid() {
	assert!(desk_config::validate(&sample_config()).is_ok());
}

#[test]
fn rejects_dimension_mismatch_with_qdrant() {
	let result = sample_with(|root| {
		set(root, &["storage", "qdrant", "vector_dim"], Value::Integer(768));
	});

	assert!(matches!(result, Err(Error::Validation { .. })));
}

#[test]
fn rejects_zero_embedding_dimensions() {
	let result = sample_with(|root| {
		set(root, &["providers", "embedding", "dimensions"], Value::Integer(0));
		set(root, &["storage", "qdrant", "vector_dim"], Value::Integer(0));
	});

	assert!(matches!(result, Err(Error::Validation { .. })));
}

#[test]
fn rejects_oversized_batch() {
	let result = sample_with(|root| {
		set(root, &["providers", "embedding", "batch_size"], Value::Integer(250));
	});

	assert!(matches!(result, Err(Error::Validation { .. })));
}

#[test]
fn rejects_overlap_not_below_max_tokens() {
	let result = sample_with(|root| {
		set(root, &["chunking", "overlap_tokens"], Value::Integer(500));
	});

	assert!(matches!(result, Err(Error::Validation { .. })));
}

#[test]
fn rejects_min_tokens_not_below_max_tokens() {
	let result = sample_with(|root| {
		set(root, &["chunking", "min_tokens"], Value::Integer(500));
	});

	assert!(matches!(result, Err(Error::Validation { .. })));
}

#[test]
fn rejects_out_of_range_min_score() {
	let result = sample_with(|root| {
		set(root, &["retrieval", "min_score"], Value::Float(1.5));
	});

	assert!(matches!(result, Err(Error::Validation { .. })));
}

#[test]
fn rejects_blank_api_key() {
	let result = sample_with(|root| {
		set(root, &["providers", "chat", "api_key"], Value::String(" ".to_string()));
	});

	assert!(matches!(result, Err(Error::Validation { .. })));
}

#[test]
fn rejects_zero_tier_top_k() {
	let result = sample_with(|root| {
		set(root, &["agents", "tier2", "top_k"], Value::Integer(0));
	});

	assert!(matches!(result, Err(Error::Validation { .. })));
}
