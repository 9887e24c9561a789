use serde::{Deserialize, Serialize};

use desk_domain::{EscalationLevel, Severity};
use desk_playbook::ExecutionState;
use desk_providers::{ChatMessage, TokenUsage};
use desk_retrieval::SourceRef;

use crate::collaborators::SessionMode;

/// Everything one turn needs, rebuilt by the caller every time. There is no
/// hidden session object: the caller persists history, counters, and playbook
/// state between turns and supplies them again.
#[derive(Debug, Clone)]
pub struct AgentContext {
	pub tenant_id: String,
	pub case_id: String,
	pub product: Option<String>,
	pub category: Option<String>,
	pub language: Option<String>,
	pub severity: Option<Severity>,
	pub history: Vec<ChatMessage>,
	pub playbook_state: Option<ExecutionState>,
	pub failed_attempts: u32,
}

/// Tier-1's attempt record, summarized for the tier-2 prompt so the customer
/// never repeats themselves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseHistory {
	pub steps_attempted: Vec<String>,
	pub failure_count: u32,
	pub last_response: Option<String>,
}

/// Side effect the caller is asked to carry out after the turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentAction {
	Resolve,
	EscalateToTier2,
	EscalateToHuman,
	StartVisualSession { join_url: String, mode: SessionMode },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMetadata {
	pub model: Option<String>,
	pub usage: TokenUsage,
	pub processing_ms: u64,
}

/// The sole output contract of both agents.
#[derive(Debug, Clone)]
pub struct AgentResponse {
	pub message: String,
	pub action: Option<AgentAction>,
	pub should_escalate: bool,
	pub escalation_level: Option<EscalationLevel>,
	pub escalation_reason: Option<String>,
	pub sources: Vec<SourceRef>,
	/// Updated playbook execution state for the caller to persist, when a
	/// playbook is active on the case.
	pub playbook_state: Option<ExecutionState>,
	pub metadata: ResponseMetadata,
}
