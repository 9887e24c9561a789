use serde::Deserialize;
use serde_json::json;

use desk_playbook::StepOutcome;
use desk_providers::{ToolInvocation, ToolSpec};

use crate::{Error, Result, collaborators::SessionMode};

/// Tier-1's constrained tool set. Each variant carries its typed payload;
/// dispatch is an exhaustive match, not a string switch.
#[derive(Debug, Clone, PartialEq)]
pub enum Tier1Tool {
	LookupDocumentation { query: String },
	ExecutePlaybookStep { step_id: String, outcome: StepOutcome },
	EscalateToL2 { reason: String },
	EscalateToHuman { reason: String },
	MarkResolved { summary: Option<String> },
}

/// Tier-2's richer tool set. There is deliberately no escalate-to-self.
#[derive(Debug, Clone, PartialEq)]
pub enum Tier2Tool {
	LookupDocumentation { query: String },
	AnalyzeError { error_text: String },
	SuggestDiagnosticSteps { category: Option<String> },
	InitiateVisionscreen { mode: SessionMode },
	EscalateToHuman { reason: String },
	MarkResolved { summary: Option<String> },
}

#[derive(Deserialize)]
struct QueryArgs {
	query: String,
}

#[derive(Deserialize)]
struct PlaybookStepArgs {
	step_id: String,
	outcome: StepOutcome,
}

#[derive(Deserialize)]
struct ReasonArgs {
	reason: String,
}

#[derive(Deserialize)]
struct SummaryArgs {
	#[serde(default)]
	summary: Option<String>,
}

#[derive(Deserialize)]
struct ErrorArgs {
	error_text: String,
}

#[derive(Deserialize)]
struct DiagnosticArgs {
	#[serde(default)]
	category: Option<String>,
}

#[derive(Deserialize)]
struct VisionscreenArgs {
	#[serde(default = "default_mode")]
	mode: SessionMode,
}

fn default_mode() -> SessionMode {
	SessionMode::Screen
}

fn parse_args<T>(invocation: &ToolInvocation) -> Result<T>
where
	T: serde::de::DeserializeOwned,
{
	serde_json::from_value(invocation.arguments.clone())
		.map_err(|_| Error::ToolArguments { name: invocation.name.clone() })
}

impl Tier1Tool {
	pub fn parse(invocation: &ToolInvocation) -> Result<Self> {
		match invocation.name.as_str() {
			"lookup_documentation" => {
				let QueryArgs { query } = parse_args(invocation)?;

				Ok(Self::LookupDocumentation { query })
			},
			"execute_playbook_step" => {
				let PlaybookStepArgs { step_id, outcome } = parse_args(invocation)?;

				Ok(Self::ExecutePlaybookStep { step_id, outcome })
			},
			"escalate_to_l2" => {
				let ReasonArgs { reason } = parse_args(invocation)?;

				Ok(Self::EscalateToL2 { reason })
			},
			"escalate_to_human" => {
				let ReasonArgs { reason } = parse_args(invocation)?;

				Ok(Self::EscalateToHuman { reason })
			},
			"mark_resolved" => {
				let SummaryArgs { summary } = parse_args(invocation)?;

				Ok(Self::MarkResolved { summary })
			},
			other => Err(Error::UnknownTool { name: other.to_string() }),
		}
	}

	pub fn specs() -> Vec<ToolSpec> {
		vec![
			ToolSpec {
				name: "lookup_documentation".to_string(),
				description: "Search the tenant knowledge base for documentation relevant to a query."
					.to_string(),
				parameters: json!({
					"type": "object",
					"properties": {
						"query": { "type": "string", "description": "What to look up." }
					},
					"required": ["query"]
				}),
			},
			ToolSpec {
				name: "execute_playbook_step".to_string(),
				description:
					"Report the outcome of the current troubleshooting step so the playbook can advance."
						.to_string(),
				parameters: json!({
					"type": "object",
					"properties": {
						"step_id": { "type": "string" },
						"outcome": { "type": "string", "enum": ["success", "failure"] }
					},
					"required": ["step_id", "outcome"]
				}),
			},
			ToolSpec {
				name: "escalate_to_l2".to_string(),
				description: "Hand the case to the tier-2 agent with a reason.".to_string(),
				parameters: json!({
					"type": "object",
					"properties": { "reason": { "type": "string" } },
					"required": ["reason"]
				}),
			},
			ToolSpec {
				name: "escalate_to_human".to_string(),
				description: "Hand the case to the human queue with a reason.".to_string(),
				parameters: json!({
					"type": "object",
					"properties": { "reason": { "type": "string" } },
					"required": ["reason"]
				}),
			},
			ToolSpec {
				name: "mark_resolved".to_string(),
				description: "Mark the case resolved, optionally with a closing summary.".to_string(),
				parameters: json!({
					"type": "object",
					"properties": { "summary": { "type": "string" } }
				}),
			},
		]
	}
}

impl Tier2Tool {
	pub fn parse(invocation: &ToolInvocation) -> Result<Self> {
		match invocation.name.as_str() {
			"lookup_documentation" => {
				let QueryArgs { query } = parse_args(invocation)?;

				Ok(Self::LookupDocumentation { query })
			},
			"analyze_error" => {
				let ErrorArgs { error_text } = parse_args(invocation)?;

				Ok(Self::AnalyzeError { error_text })
			},
			"suggest_diagnostic_steps" => {
				let DiagnosticArgs { category } = parse_args(invocation)?;

				Ok(Self::SuggestDiagnosticSteps { category })
			},
			"initiate_visionscreen" => {
				let VisionscreenArgs { mode } = parse_args(invocation)?;

				Ok(Self::InitiateVisionscreen { mode })
			},
			"escalate_to_human" => {
				let ReasonArgs { reason } = parse_args(invocation)?;

				Ok(Self::EscalateToHuman { reason })
			},
			"mark_resolved" => {
				let SummaryArgs { summary } = parse_args(invocation)?;

				Ok(Self::MarkResolved { summary })
			},
			other => Err(Error::UnknownTool { name: other.to_string() }),
		}
	}

	pub fn specs() -> Vec<ToolSpec> {
		vec![
			ToolSpec {
				name: "lookup_documentation".to_string(),
				description: "Search the tenant knowledge base for documentation relevant to a query."
					.to_string(),
				parameters: json!({
					"type": "object",
					"properties": {
						"query": { "type": "string", "description": "What to look up." }
					},
					"required": ["query"]
				}),
			},
			ToolSpec {
				name: "analyze_error".to_string(),
				description: "Analyze an error message or log excerpt the customer reported."
					.to_string(),
				parameters: json!({
					"type": "object",
					"properties": { "error_text": { "type": "string" } },
					"required": ["error_text"]
				}),
			},
			ToolSpec {
				name: "suggest_diagnostic_steps".to_string(),
				description: "Produce a short list of diagnostic steps for the customer's problem."
					.to_string(),
				parameters: json!({
					"type": "object",
					"properties": {
						"category": {
							"type": "string",
							"description": "Optional hint such as network, crash, or performance."
						}
					}
				}),
			},
			ToolSpec {
				name: "initiate_visionscreen".to_string(),
				description:
					"Start a visual support session so the customer can share their screen or camera."
						.to_string(),
				parameters: json!({
					"type": "object",
					"properties": {
						"mode": { "type": "string", "enum": ["screen", "camera"] }
					}
				}),
			},
			ToolSpec {
				name: "escalate_to_human".to_string(),
				description: "Hand the case to the human queue with a reason.".to_string(),
				parameters: json!({
					"type": "object",
					"properties": { "reason": { "type": "string" } },
					"required": ["reason"]
				}),
			},
			ToolSpec {
				name: "mark_resolved".to_string(),
				description: "Mark the case resolved, optionally with a closing summary.".to_string(),
				parameters: json!({
					"type": "object",
					"properties": { "summary": { "type": "string" } }
				}),
			},
		]
	}
}
