use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::{Playbook, PlaybookStep};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
	InProgress,
	Resolved,
	Escalated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
	Success,
	Failure,
}

/// Mutable per-case execution state. Owned by one case's turn loop; the engine
/// never shares it across cases. The caller persists and re-supplies it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionState {
	pub playbook_id: String,
	pub current_step_id: String,
	pub step_attempts: HashMap<String, u32>,
	pub completed_steps: Vec<String>,
	pub failed_steps: Vec<String>,
	pub variables: HashMap<String, String>,
	pub outcome: ExecutionOutcome,
}
impl ExecutionState {
	/// Initial state: positioned on the playbook's first declared step.
	pub fn start(playbook: &Playbook) -> Option<Self> {
		let first = playbook.first_step()?;

		Some(Self {
			playbook_id: playbook.metadata.id.clone(),
			current_step_id: first.id.clone(),
			step_attempts: HashMap::new(),
			completed_steps: Vec::new(),
			failed_steps: Vec::new(),
			variables: playbook.variables.clone(),
			outcome: ExecutionOutcome::InProgress,
		})
	}
}

#[derive(Debug, Clone)]
pub struct StepResult {
	pub should_escalate: bool,
	pub escalation_reason: Option<String>,
	pub resolved: bool,
	/// The step the state advanced to, when execution continues.
	pub next_step_id: Option<String>,
}

/// Advances the state machine by one reported outcome.
///
/// An unknown current step fails closed: the state is marked escalated rather
/// than silently stalling. Success without a `next_on_success` is the normal
/// termination path. A failure beyond the step's attempt budget records the
/// step and escalates unless the step opted out.
pub fn execute_step(
	playbook: &Playbook,
	state: &mut ExecutionState,
	outcome: StepOutcome,
) -> StepResult {
	let Some(step) = playbook.step(&state.current_step_id) else {
		tracing::warn!(
			playbook = %playbook.metadata.id,
			step = %state.current_step_id,
			"Execution state points at a step that does not exist."
		);

		state.outcome = ExecutionOutcome::Escalated;

		return StepResult {
			should_escalate: true,
			escalation_reason: Some(format!("step {} not found", state.current_step_id)),
			resolved: false,
			next_step_id: None,
		};
	};

	let attempts = state.step_attempts.entry(step.id.clone()).or_insert(0);

	*attempts += 1;

	let attempts = *attempts;

	match outcome {
		StepOutcome::Success => {
			state.completed_steps.push(step.id.clone());

			match step.next_on_success.as_ref() {
				Some(next) => {
					state.current_step_id = next.clone();

					StepResult {
						should_escalate: false,
						escalation_reason: None,
						resolved: false,
						next_step_id: Some(next.clone()),
					}
				},
				None => {
					state.outcome = ExecutionOutcome::Resolved;

					StepResult {
						should_escalate: false,
						escalation_reason: None,
						resolved: true,
						next_step_id: None,
					}
				},
			}
		},
		StepOutcome::Failure if attempts > step.max_attempts => {
			if !state.failed_steps.contains(&step.id) {
				state.failed_steps.push(step.id.clone());
			}

			let should_escalate = step.escalate_on_failure.unwrap_or(true);

			if should_escalate {
				state.outcome = ExecutionOutcome::Escalated;
			}

			StepResult {
				should_escalate,
				escalation_reason: should_escalate
					.then(|| format!("step {} failed {attempts} times", step.id)),
				resolved: false,
				next_step_id: None,
			}
		},
		StepOutcome::Failure => match step.next_on_failure.as_ref() {
			Some(next) => {
				state.current_step_id = next.clone();

				StepResult {
					should_escalate: false,
					escalation_reason: None,
					resolved: false,
					next_step_id: Some(next.clone()),
				}
			},
			None => StepResult {
				should_escalate: false,
				escalation_reason: None,
				resolved: false,
				next_step_id: Some(step.id.clone()),
			},
		},
	}
}

/// Renders a step instruction with `{{variable}}` substitution from the
/// execution state. Unknown variables are left in place.
pub fn format_instruction(step: &PlaybookStep, variables: &HashMap<String, String>) -> String {
	static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

	let pattern = PLACEHOLDER
		.get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("Pattern is static."));

	pattern
		.replace_all(&step.instruction, |caps: &regex::Captures<'_>| {
			variables.get(&caps[1]).cloned().unwrap_or_else(|| caps[0].to_string())
		})
		.into_owned()
}

#[cfg(test)]
mod tests {
	use crate::types::{PlaybookMetadata, Triggers};

	use super::*;

	fn step(id: &str, next_on_success: Option<&str>, max_attempts: u32) -> PlaybookStep {
		PlaybookStep {
			id: id.to_string(),
			title: format!("Step {id}"),
			instruction: format!("Do {id}."),
			expected_outcome: None,
			failure_hint: None,
			next_on_success: next_on_success.map(str::to_string),
			next_on_failure: None,
			escalate_on_failure: None,
			max_attempts,
		}
	}

	fn playbook(steps: Vec<PlaybookStep>) -> Playbook {
		Playbook {
			metadata: PlaybookMetadata {
				id: "pb-net".to_string(),
				name: "Network diagnosis".to_string(),
				version: Some("2.1".to_string()),
				product: None,
				category: None,
				language: None,
			},
			triggers: Triggers::default(),
			steps,
			escalation: None,
			variables: HashMap::new(),
		}
	}

	#[test]
	fn success_without_next_step_resolves() {
		let book = playbook(vec![step("s1", None, 3)]);
		let mut state = ExecutionState::start(&book).expect("playbook has steps");
		let result = execute_step(&book, &mut state, StepOutcome::Success);

		assert!(result.resolved);
		assert!(!result.should_escalate);
		assert_eq!(state.outcome, ExecutionOutcome::Resolved);
		assert_eq!(state.completed_steps, vec!["s1".to_string()]);
	}

	#[test]
	fn success_advances_to_the_next_step() {
		let book = playbook(vec![step("s1", Some("s2"), 3), step("s2", None, 3)]);
		let mut state = ExecutionState::start(&book).expect("playbook has steps");
		let result = execute_step(&book, &mut state, StepOutcome::Success);

		assert_eq!(result.next_step_id.as_deref(), Some("s2"));
		assert_eq!(state.current_step_id, "s2");
		assert_eq!(state.outcome, ExecutionOutcome::InProgress);
	}

	#[test]
	fn third_failure_with_two_attempts_escalates() {
		let book = playbook(vec![step("s1", None, 2)]);
		let mut state = ExecutionState::start(&book).expect("playbook has steps");

		let first = execute_step(&book, &mut state, StepOutcome::Failure);
		let second = execute_step(&book, &mut state, StepOutcome::Failure);
		let third = execute_step(&book, &mut state, StepOutcome::Failure);

		assert!(!first.should_escalate);
		assert!(!second.should_escalate);
		assert!(third.should_escalate);
		assert!(state.failed_steps.contains(&"s1".to_string()));
		assert_eq!(state.outcome, ExecutionOutcome::Escalated);
	}

	#[test]
	fn escalate_on_failure_false_suppresses_escalation() {
		let mut exhausted = step("s1", None, 1);

		exhausted.escalate_on_failure = Some(false);

		let book = playbook(vec![exhausted]);
		let mut state = ExecutionState::start(&book).expect("playbook has steps");

		execute_step(&book, &mut state, StepOutcome::Failure);

		let result = execute_step(&book, &mut state, StepOutcome::Failure);

		assert!(!result.should_escalate);
		assert!(state.failed_steps.contains(&"s1".to_string()));
		assert_eq!(state.outcome, ExecutionOutcome::InProgress);
	}

	#[test]
	fn failure_with_attempts_left_takes_the_failure_branch() {
		let mut branching = step("s1", Some("s2"), 3);

		branching.next_on_failure = Some("s3".to_string());

		let book = playbook(vec![branching, step("s2", None, 3), step("s3", None, 3)]);
		let mut state = ExecutionState::start(&book).expect("playbook has steps");
		let result = execute_step(&book, &mut state, StepOutcome::Failure);

		assert!(!result.should_escalate);
		assert_eq!(state.current_step_id, "s3");
		assert_eq!(result.next_step_id.as_deref(), Some("s3"));
	}

	#[test]
	fn failure_without_branch_stays_on_the_step() {
		let book = playbook(vec![step("s1", None, 3)]);
		let mut state = ExecutionState::start(&book).expect("playbook has steps");
		let result = execute_step(&book, &mut state, StepOutcome::Failure);

		assert!(!result.should_escalate);
		assert_eq!(state.current_step_id, "s1");
		assert_eq!(result.next_step_id.as_deref(), Some("s1"));
	}

	#[test]
	fn unknown_current_step_fails_closed() {
		let book = playbook(vec![step("s1", None, 3)]);
		let mut state = ExecutionState::start(&book).expect("playbook has steps");

		state.current_step_id = "gone".to_string();

		let result = execute_step(&book, &mut state, StepOutcome::Success);

		assert!(result.should_escalate);
		assert!(result.escalation_reason.expect("reason expected").contains("not found"));
		assert_eq!(state.outcome, ExecutionOutcome::Escalated);
	}

	#[test]
	fn instruction_variables_are_substituted() {
		let mut templated = step("s1", None, 3);

		templated.instruction = "Open {{portal_url}} and sign in as {{username}}.".to_string();

		let variables = HashMap::from([
			("portal_url".to_string(), "https://status.example.com".to_string()),
		]);
		let rendered = format_instruction(&templated, &variables);

		assert_eq!(rendered, "Open https://status.example.com and sign in as {{username}}.");
	}
}
