use std::{collections::HashMap, sync::Arc};

use serde_json::json;

use desk_agents::{
	AgentAction, AgentContext, AgentDeps, CaseHistory, CaseRecord, Collaborators, SessionMode,
	Tier1Agent, Tier2Agent,
};
use desk_config::{Guardrails, TierConfig};
use desk_domain::{CaseStatus, EscalationLevel};
use desk_playbook::{
	EscalationConfig, ExecutionState, Playbook, PlaybookMetadata, PlaybookRegistry, PlaybookStep,
	Triggers,
};
use desk_retrieval::{RetrievalEngine, VectorIndex};
use desk_testkit::{
	CannedIndex, FixedEmbedder, RecordingCaseStore, RecordingSink, ScriptedChat, StubVisualSessions,
};

fn tier1_cfg() -> TierConfig {
	TierConfig { top_k: 5, context_tokens: 2_000, max_history_messages: 20 }
}

fn tier2_cfg() -> TierConfig {
	TierConfig { top_k: 8, context_tokens: 3_000, max_history_messages: 40 }
}

struct Harness {
	chat: Arc<ScriptedChat>,
	sink: Arc<RecordingSink>,
	store: Arc<RecordingCaseStore>,
	deps: AgentDeps,
}

fn harness_with(index: Arc<dyn VectorIndex>, playbooks: PlaybookRegistry) -> Harness {
	let chat = Arc::new(ScriptedChat::new());
	let sink = Arc::new(RecordingSink::new());
	let store = Arc::new(RecordingCaseStore::new(CaseRecord {
		case_id: "case-1".to_string(),
		tenant_id: "t1".to_string(),
		status: CaseStatus::Open,
		severity: None,
		product: Some("AI Factory".to_string()),
	}));
	let deps = AgentDeps {
		chat: chat.clone(),
		retrieval: Arc::new(RetrievalEngine::new(index, Arc::new(FixedEmbedder::new(8)))),
		playbooks: Arc::new(playbooks),
		collaborators: Collaborators {
			case_store: store.clone(),
			visual_sessions: Arc::new(StubVisualSessions::new()),
			notifications: sink.clone(),
		},
		guardrails: Guardrails { max_response_chars: 4_000, max_failed_attempts: 3 },
	};

	Harness { chat, sink, store, deps }
}

fn harness() -> Harness {
	harness_with(Arc::new(CannedIndex::default()), PlaybookRegistry::empty())
}

fn ctx() -> AgentContext {
	AgentContext {
		tenant_id: "t1".to_string(),
		case_id: "case-1".to_string(),
		product: Some("AI Factory".to_string()),
		category: None,
		language: Some("en".to_string()),
		severity: None,
		history: Vec::new(),
		playbook_state: None,
		failed_attempts: 0,
	}
}

fn login_playbook() -> Playbook {
	Playbook {
		metadata: PlaybookMetadata {
			id: "pb-login".to_string(),
			name: "Login recovery".to_string(),
			version: Some("1.0".to_string()),
			product: Some("AI Factory".to_string()),
			category: None,
			language: None,
		},
		triggers: Triggers {
			keywords: vec!["log in".to_string(), "login".to_string()],
			products: vec!["AI Factory".to_string()],
			..Triggers::default()
		},
		steps: vec![
			PlaybookStep {
				id: "s1".to_string(),
				title: "Check spam".to_string(),
				instruction: "Ask the customer to check spam for the reset email.".to_string(),
				expected_outcome: None,
				failure_hint: None,
				next_on_success: Some("s2".to_string()),
				next_on_failure: None,
				escalate_on_failure: None,
				max_attempts: 2,
			},
			PlaybookStep {
				id: "s2".to_string(),
				title: "Resend the email".to_string(),
				instruction: "Trigger a new reset email from {{portal_url}}.".to_string(),
				expected_outcome: None,
				failure_hint: None,
				next_on_success: None,
				next_on_failure: None,
				escalate_on_failure: None,
				max_attempts: 3,
			},
		],
		escalation: Some(EscalationConfig {
			default_message: "This needs a closer look - routing you to our specialist team."
				.to_string(),
			conditions: Vec::new(),
		}),
		variables: HashMap::from([(
			"portal_url".to_string(),
			"https://portal.example.com".to_string(),
		)]),
	}
}

// Scenario: a plain troubleshooting message with no playbook match gets a
// direct model-guided answer and no escalation.
#[tokio::test]
async fn tier1_answers_directly_without_playbook_or_context() {
	let h = harness();

	h.chat.push_text("Let's get you back in. First, does the login page show any error?");

	let agent = Tier1Agent::new(h.deps.clone(), tier1_cfg());
	let response = agent
		.handle_turn(&ctx(), "I can't log in, password reset email never arrived")
		.await
		.expect("turn failed");

	assert!(!response.should_escalate);
	assert!(response.escalation_level.is_none());
	assert!(response.message.contains("login page"));
	assert_eq!(h.chat.calls(), 1);
	assert_eq!(h.store.event_kinds(), vec!["tier1_turn".to_string()]);
}

// Scenario: a legal threat short-circuits before any model or retrieval call.
#[tokio::test]
async fn tier1_short_circuits_on_legal_threats() {
	let h = harness();
	let agent = Tier1Agent::new(h.deps.clone(), tier1_cfg());
	let response =
		agent.handle_turn(&ctx(), "I'm going to sue you over this").await.expect("turn failed");

	assert!(response.should_escalate);
	assert_eq!(response.escalation_level, Some(EscalationLevel::Human));
	assert_eq!(response.action, Some(AgentAction::EscalateToHuman));
	assert_eq!(h.chat.calls(), 0, "no model call may happen on a critical trigger");
	assert_eq!(h.sink.count(), 1);
	assert_eq!(h.store.event_kinds(), vec!["escalated_to_human".to_string()]);
	assert!(response.metadata.model.is_none());
}

// A failing notification sink must not fail the escalation turn.
#[tokio::test]
async fn notification_failure_does_not_abort_the_turn() {
	let chat = Arc::new(ScriptedChat::new());
	let store = Arc::new(RecordingCaseStore::new(CaseRecord {
		case_id: "case-1".to_string(),
		tenant_id: "t1".to_string(),
		status: CaseStatus::Open,
		severity: None,
		product: None,
	}));
	let deps = AgentDeps {
		chat: chat.clone(),
		retrieval: Arc::new(RetrievalEngine::new(
			Arc::new(CannedIndex::default()),
			Arc::new(FixedEmbedder::new(8)),
		)),
		playbooks: Arc::new(PlaybookRegistry::empty()),
		collaborators: Collaborators {
			case_store: store,
			visual_sessions: Arc::new(StubVisualSessions::new()),
			notifications: Arc::new(RecordingSink::failing()),
		},
		guardrails: Guardrails { max_response_chars: 4_000, max_failed_attempts: 3 },
	};
	let agent = Tier1Agent::new(deps, tier1_cfg());
	let response = agent.handle_turn(&ctx(), "this is a lawsuit waiting to happen").await;

	assert!(response.expect("turn must survive a dead sink").should_escalate);
}

#[tokio::test]
async fn tier1_escalates_to_l2_when_the_model_asks() {
	let h = harness();

	h.chat.push_tool("escalate_to_l2", json!({ "reason": "needs backend access" }));

	let agent = Tier1Agent::new(h.deps.clone(), tier1_cfg());
	let response = agent.handle_turn(&ctx(), "the export job hangs at 99%").await.expect("turn failed");

	assert!(response.should_escalate);
	assert_eq!(response.escalation_level, Some(EscalationLevel::Tier2));
	assert_eq!(response.action, Some(AgentAction::EscalateToTier2));
	assert_eq!(response.escalation_reason.as_deref(), Some("needs backend access"));
}

#[tokio::test]
async fn tier1_advances_a_playbook_on_reported_success() {
	let registry = PlaybookRegistry::new(vec![login_playbook()]).expect("valid playbook");
	let h = harness_with(Arc::new(CannedIndex::default()), registry);

	h.chat.push_tool("execute_playbook_step", json!({ "step_id": "s1", "outcome": "success" }));

	let agent = Tier1Agent::new(h.deps.clone(), tier1_cfg());
	let response =
		agent.handle_turn(&ctx(), "I still can't log in to my account").await.expect("turn failed");
	let state = response.playbook_state.expect("playbook state must be returned");

	assert_eq!(state.current_step_id, "s2");
	assert_eq!(state.completed_steps, vec!["s1".to_string()]);
	assert!(!response.should_escalate);
	// The fallback message is the next step's instruction with variables filled in.
	assert!(response.message.contains("https://portal.example.com"));
}

#[tokio::test]
async fn tier1_escalates_when_a_playbook_step_exhausts_its_attempts() {
	let registry = PlaybookRegistry::new(vec![login_playbook()]).expect("valid playbook");
	let h = harness_with(Arc::new(CannedIndex::default()), registry);
	let book = login_playbook();
	let mut state = ExecutionState::start(&book).expect("playbook has steps");

	state.step_attempts.insert("s1".to_string(), 2);

	let mut context = ctx();

	context.playbook_state = Some(state);

	h.chat.push_tool("execute_playbook_step", json!({ "step_id": "s1", "outcome": "failure" }));

	let agent = Tier1Agent::new(h.deps.clone(), tier1_cfg());
	let response = agent.handle_turn(&context, "checked spam, nothing there").await.expect("turn failed");
	let state = response.playbook_state.expect("playbook state must be returned");

	assert!(response.should_escalate);
	assert_eq!(response.escalation_level, Some(EscalationLevel::Tier2));
	assert!(state.failed_steps.contains(&"s1".to_string()));
	assert_eq!(response.message, "This needs a closer look - routing you to our specialist team.");
}

// Scenario: tier-2 sees every tier-1 attempt in its prompt.
#[tokio::test]
async fn tier2_prompt_contains_the_tier1_attempt_history() {
	let h = harness();

	h.chat.push_text("Since restarting and clearing the cache didn't help, let's go deeper.");

	let agent = Tier2Agent::new(h.deps.clone(), tier2_cfg());
	let history = CaseHistory {
		steps_attempted: vec!["restart app".to_string(), "clear cache".to_string()],
		failure_count: 2,
		last_response: Some("Please clear the cache and retry.".to_string()),
	};
	let response =
		agent.handle_turn(&ctx(), &history, "it still crashes on startup").await.expect("turn failed");

	assert!(!response.should_escalate);

	let captured = h.chat.captured();
	let system = &captured[0][0].content;

	assert!(system.contains("restart app"));
	assert!(system.contains("clear cache"));
}

#[tokio::test]
async fn tier2_suggests_deterministic_diagnostics_without_a_second_model_call() {
	let h = harness();

	h.chat.push_tool("suggest_diagnostic_steps", json!({ "category": "network" }));

	let agent = Tier2Agent::new(h.deps.clone(), tier2_cfg());
	let response = agent
		.handle_turn(&ctx(), &CaseHistory::default(), "the sync keeps dropping")
		.await
		.expect("turn failed");

	assert_eq!(h.chat.calls(), 1);
	assert!(response.message.contains("1."));
	assert!(response.message.to_lowercase().contains("router"));
}

#[tokio::test]
async fn tier2_starts_a_visual_session() {
	let h = harness();

	h.chat.push_tool("initiate_visionscreen", json!({ "mode": "screen" }));

	let agent = Tier2Agent::new(h.deps.clone(), tier2_cfg());
	let response = agent
		.handle_turn(&ctx(), &CaseHistory::default(), "hard to describe what I'm seeing")
		.await
		.expect("turn failed");

	match response.action {
		Some(AgentAction::StartVisualSession { ref join_url, mode }) => {
			assert!(join_url.contains("visual.example.com"));
			assert_eq!(mode, SessionMode::Screen);
			assert!(response.message.contains(join_url));
		},
		other => panic!("expected a visual session action, got {other:?}"),
	}
}

#[tokio::test]
async fn tier2_survives_a_dead_visual_session_service() {
	let chat = Arc::new(ScriptedChat::new());
	let store = Arc::new(RecordingCaseStore::new(CaseRecord {
		case_id: "case-1".to_string(),
		tenant_id: "t1".to_string(),
		status: CaseStatus::EscalatedL2,
		severity: None,
		product: None,
	}));
	let deps = AgentDeps {
		chat: chat.clone(),
		retrieval: Arc::new(RetrievalEngine::new(
			Arc::new(CannedIndex::default()),
			Arc::new(FixedEmbedder::new(8)),
		)),
		playbooks: Arc::new(PlaybookRegistry::empty()),
		collaborators: Collaborators {
			case_store: store,
			visual_sessions: Arc::new(StubVisualSessions::failing()),
			notifications: Arc::new(RecordingSink::new()),
		},
		guardrails: Guardrails { max_response_chars: 4_000, max_failed_attempts: 3 },
	};

	chat.push_tool("initiate_visionscreen", json!({ "mode": "camera" }));

	let agent = Tier2Agent::new(deps, tier2_cfg());
	let response = agent
		.handle_turn(&ctx(), &CaseHistory::default(), "can you just look at it?")
		.await
		.expect("turn must survive the dead service");

	assert!(response.action.is_none());
	assert!(response.message.contains("couldn't start a visual session"));
}

#[tokio::test]
async fn tier1_leaked_secret_in_model_output_is_sanitized() {
	let h = harness();

	h.chat.push_text("Your admin key is sk-abc123def456ghi789jkl012 - keep it safe.");

	let agent = Tier1Agent::new(h.deps.clone(), tier1_cfg());
	let response = agent.handle_turn(&ctx(), "what is my admin key?").await.expect("turn failed");

	assert!(!response.message.contains("sk-abc123def456ghi789jkl012"));
	assert!(response.message.contains("[REDACTED ApiKey]"));
}

#[tokio::test]
async fn tier1_marks_resolution_when_the_model_asks() {
	let h = harness();

	h.chat.push_tool("mark_resolved", json!({ "summary": "Cache cleared, login works again." }));

	let agent = Tier1Agent::new(h.deps.clone(), tier1_cfg());
	let response = agent.handle_turn(&ctx(), "that fixed it, thanks!").await.expect("turn failed");

	assert_eq!(response.action, Some(AgentAction::Resolve));
	assert!(!response.should_escalate);
	assert_eq!(response.message, "Cache cleared, login works again.");
}
