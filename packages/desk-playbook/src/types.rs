use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use desk_domain::Severity;

/// A versioned, declarative troubleshooting procedure. Immutable once loaded;
/// a reload replaces the registry entry wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playbook {
	pub metadata: PlaybookMetadata,
	#[serde(default)]
	pub triggers: Triggers,
	pub steps: Vec<PlaybookStep>,
	#[serde(default)]
	pub escalation: Option<EscalationConfig>,
	#[serde(default)]
	pub variables: HashMap<String, String>,
}
impl Playbook {
	pub fn step(&self, id: &str) -> Option<&PlaybookStep> {
		self.steps.iter().find(|step| step.id == id)
	}

	pub fn first_step(&self) -> Option<&PlaybookStep> {
		self.steps.first()
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookMetadata {
	pub id: String,
	pub name: String,
	#[serde(default)]
	pub version: Option<String>,
	#[serde(default)]
	pub product: Option<String>,
	#[serde(default)]
	pub category: Option<String>,
	#[serde(default)]
	pub language: Option<String>,
}

/// Absent dimensions are unconstrained: a playbook with no product list
/// matches every product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Triggers {
	#[serde(default)]
	pub keywords: Vec<String>,
	#[serde(default)]
	pub categories: Vec<String>,
	#[serde(default)]
	pub products: Vec<String>,
	#[serde(default)]
	pub severity: Option<Severity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookStep {
	pub id: String,
	pub title: String,
	pub instruction: String,
	#[serde(default)]
	pub expected_outcome: Option<String>,
	#[serde(default)]
	pub failure_hint: Option<String>,
	#[serde(default)]
	pub next_on_success: Option<String>,
	#[serde(default)]
	pub next_on_failure: Option<String>,
	#[serde(default)]
	pub escalate_on_failure: Option<bool>,
	#[serde(default = "default_max_attempts")]
	pub max_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
	pub default_message: String,
	#[serde(default)]
	pub conditions: Vec<String>,
}

fn default_max_attempts() -> u32 {
	3
}
