use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	System,
	User,
	Assistant,
	Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
	pub role: Role,
	pub content: String,
}
impl ChatMessage {
	pub fn system(content: impl Into<String>) -> Self {
		Self { role: Role::System, content: content.into() }
	}

	pub fn user(content: impl Into<String>) -> Self {
		Self { role: Role::User, content: content.into() }
	}

	pub fn assistant(content: impl Into<String>) -> Self {
		Self { role: Role::Assistant, content: content.into() }
	}

	pub fn tool(content: impl Into<String>) -> Self {
		Self { role: Role::Tool, content: content.into() }
	}
}

/// A function exposed to the model. `parameters` is a JSON Schema object.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
	pub name: String,
	pub description: String,
	pub parameters: Value,
}

/// The single structured tool invocation a completion may carry.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
	pub name: String,
	pub arguments: Value,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
	pub prompt_tokens: u32,
	pub completion_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct ChatCompletion {
	pub content: Option<String>,
	pub tool_call: Option<ToolInvocation>,
	pub model: String,
	pub usage: TokenUsage,
}

pub struct ChatClient {
	cfg: desk_config::ChatProviderConfig,
	http: Client,
}
impl ChatClient {
	pub fn new(cfg: desk_config::ChatProviderConfig) -> Result<Self> {
		let http = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self { cfg, http })
	}

	pub async fn complete(
		&self,
		messages: &[ChatMessage],
		tools: &[ToolSpec],
	) -> Result<ChatCompletion> {
		let url = format!("{}{}", self.cfg.api_base, self.cfg.path);
		let mut body = serde_json::json!({
			"model": self.cfg.model,
			"temperature": self.cfg.temperature,
			"messages": messages,
		});

		if !tools.is_empty() {
			let specs: Vec<Value> = tools
				.iter()
				.map(|tool| {
					serde_json::json!({
						"type": "function",
						"function": {
							"name": tool.name,
							"description": tool.description,
							"parameters": tool.parameters,
						},
					})
				})
				.collect();

			body["tools"] = Value::Array(specs);
			body["tool_choice"] = Value::String("auto".to_string());
		}

		let res = self
			.http
			.post(url)
			.headers(crate::auth_headers(&self.cfg.api_key, &self.cfg.default_headers)?)
			.json(&body)
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;

		parse_chat_response(json)
	}
}

fn parse_chat_response(json: Value) -> Result<ChatCompletion> {
	let message = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.ok_or_else(|| Error::MalformedResponse {
			message: "Chat response is missing choices[0].message.".to_string(),
		})?;
	let content = message
		.get("content")
		.and_then(|v| v.as_str())
		.map(str::to_string)
		.filter(|text| !text.trim().is_empty());
	let tool_call = match message.get("tool_calls").and_then(|v| v.as_array()) {
		Some(calls) if !calls.is_empty() => {
			if calls.len() > 1 {
				tracing::warn!(count = calls.len(), "Model returned multiple tool calls; using the first.");
			}

			Some(parse_tool_call(&calls[0])?)
		},
		_ => None,
	};

	if content.is_none() && tool_call.is_none() {
		return Err(Error::MalformedResponse {
			message: "Chat response carries neither content nor a tool call.".to_string(),
		});
	}

	let model = json.get("model").and_then(|v| v.as_str()).unwrap_or_default().to_string();
	let usage = TokenUsage {
		prompt_tokens: usage_field(&json, "prompt_tokens"),
		completion_tokens: usage_field(&json, "completion_tokens"),
	};

	Ok(ChatCompletion { content, tool_call, model, usage })
}

fn parse_tool_call(call: &Value) -> Result<ToolInvocation> {
	let function = call.get("function").ok_or_else(|| Error::MalformedResponse {
		message: "Tool call is missing its function object.".to_string(),
	})?;
	let name = function
		.get("name")
		.and_then(|v| v.as_str())
		.ok_or_else(|| Error::MalformedResponse {
			message: "Tool call is missing a function name.".to_string(),
		})?
		.to_string();
	let arguments = match function.get("arguments") {
		Some(Value::String(raw)) =>
			serde_json::from_str(raw).map_err(|_| Error::MalformedResponse {
				message: format!("Tool call {name} arguments are not valid JSON."),
			})?,
		Some(value) => value.clone(),
		None => Value::Object(serde_json::Map::new()),
	};

	Ok(ToolInvocation { name, arguments })
}

fn usage_field(json: &Value, field: &str) -> u32 {
	json.get("usage").and_then(|usage| usage.get(field)).and_then(|v| v.as_u64()).unwrap_or(0) as u32
}
