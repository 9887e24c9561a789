pub mod chat;
pub mod embedding;

mod error;

pub use chat::{ChatClient, ChatCompletion, ChatMessage, Role, TokenUsage, ToolInvocation, ToolSpec};
pub use embedding::{EmbeddingClient, EmbeddingResult, cosine_similarity};
pub use error::{Error, Result};

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName};
use serde_json::{Map, Value};

pub(crate) fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(
		AUTHORIZATION,
		format!("Bearer {api_key}")
			.parse()
			.map_err(|_| Error::Header { message: "API key is not a valid header value.".to_string() })?,
	);

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::Header { message: "Default header values must be strings.".to_string() });
		};

		headers.insert(
			HeaderName::from_bytes(key.as_bytes())
				.map_err(|_| Error::Header { message: format!("Invalid header name {key}.") })?,
			raw.parse()
				.map_err(|_| Error::Header { message: format!("Invalid header value for {key}.") })?,
		);
	}

	Ok(headers)
}

#[cfg(test)]
mod tests {
	use reqwest::header::AUTHORIZATION;
	use serde_json::Map;

	#[test]
	fn builds_bearer_auth_header() {
		let headers =
			super::auth_headers("secret", &Map::new()).expect("Failed to build headers.");
		let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");

		assert_eq!(value, "Bearer secret");
	}
}
