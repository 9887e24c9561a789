pub mod collaborators;
pub mod context;
pub mod diagnostics;
pub mod prompt;
pub mod tools;

mod error;
mod tier1;
mod tier2;
mod time_serde;

pub use collaborators::{
	CaseRecord, CaseStore, CaseUpdate, ChatProvider, Collaborators, HttpChat, Notification,
	NotificationSink, SessionMode, TimelineEvent, VisualSession, VisualSessionRequest,
	VisualSessionService,
};
pub use context::{AgentAction, AgentContext, AgentResponse, CaseHistory, ResponseMetadata};
pub use error::{Error, Result};
pub use tier1::Tier1Agent;
pub use tier2::Tier2Agent;
pub use tools::{Tier1Tool, Tier2Tool};

use std::{future::Future, pin::Pin, sync::Arc, time::Instant};

use desk_config::{Guardrails, TierConfig};
use desk_domain::{EscalationLevel, Severity, TriggerEvaluation};
use desk_playbook::PlaybookRegistry;
use desk_providers::TokenUsage;
use desk_retrieval::{ContextWithSources, RetrievalEngine, RetrievalOptions};
use time::OffsetDateTime;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Sent verbatim when a critical trigger short-circuits the turn, and reused
/// by the transport layer as its unhandled-failure fallback: the caller must
/// always have a path to a human.
pub const HUMAN_HANDOFF_MESSAGE: &str = "I'm connecting you with a human support specialist \
	right away. Your case details travel with you, so you won't have to repeat anything.";

/// Closing line when the model resolves a case without providing its own text.
pub const RESOLVED_MESSAGE: &str =
	"Glad that's sorted. I've marked the case resolved - reach out any time if it comes back.";

/// Everything both agents share. Injected at construction; no hidden
/// singletons, no lazy initialization.
#[derive(Clone)]
pub struct AgentDeps {
	pub chat: Arc<dyn ChatProvider>,
	pub retrieval: Arc<RetrievalEngine>,
	pub playbooks: Arc<PlaybookRegistry>,
	pub collaborators: Collaborators,
	pub guardrails: Guardrails,
}
impl AgentDeps {
	/// Timeline writes are best-effort: a dead case store must not fail a
	/// turn that otherwise succeeded.
	pub(crate) async fn record_event(&self, case_id: &str, kind: &str, detail: &str) {
		let event = TimelineEvent {
			kind: kind.to_string(),
			detail: detail.to_string(),
			at: OffsetDateTime::now_utc(),
		};

		if let Err(err) = self.collaborators.case_store.add_timeline_event(case_id, event).await {
			tracing::warn!(case = case_id, error = %err, "Failed to append timeline event.");
		}
	}

	pub(crate) async fn notify_best_effort(&self, notification: Notification) {
		let case_id = notification.case_id.clone();

		if let Err(err) = self.collaborators.notifications.notify(notification).await {
			tracing::warn!(case = %case_id, error = %err, "Notification delivery failed.");
		}
	}

	/// Critical-trigger short circuit: no model call, no retrieval, an
	/// immediate handoff to the human queue.
	pub(crate) async fn human_handoff(
		&self,
		ctx: &AgentContext,
		evaluation: &TriggerEvaluation,
		started: Instant,
	) -> AgentResponse {
		let reason = evaluation.reasons.join("; ");

		self.record_event(&ctx.case_id, "escalated_to_human", &reason).await;
		self.notify_best_effort(Notification {
			case_id: ctx.case_id.clone(),
			severity: evaluation.severity,
			message: format!("Critical trigger on case {}: {reason}", ctx.case_id),
		})
		.await;

		AgentResponse {
			message: HUMAN_HANDOFF_MESSAGE.to_string(),
			action: Some(AgentAction::EscalateToHuman),
			should_escalate: true,
			escalation_level: Some(EscalationLevel::Human),
			escalation_reason: Some(reason),
			sources: Vec::new(),
			playbook_state: ctx.playbook_state.clone(),
			metadata: ResponseMetadata {
				model: None,
				usage: TokenUsage::default(),
				processing_ms: started.elapsed().as_millis() as u64,
			},
		}
	}

	/// RAG context for the turn. Probes first so cheap turns skip retrieval
	/// entirely; any retrieval failure degrades to "no context" instead of
	/// failing the turn.
	pub(crate) async fn gather_context(
		&self,
		ctx: &AgentContext,
		query: &str,
		tier: &TierConfig,
	) -> Option<ContextWithSources> {
		let relevant = match self
			.retrieval
			.has_relevant_content(&ctx.tenant_id, query, ctx.product.as_deref())
			.await
		{
			Ok(relevant) => relevant,
			Err(err) => {
				tracing::warn!(error = %err, "Relevance probe failed; continuing without context.");

				return None;
			},
		};

		if !relevant {
			return None;
		}

		let options = RetrievalOptions {
			top_k: tier.top_k,
			min_score: self.retrieval.min_score(),
			product: ctx.product.clone(),
			..RetrievalOptions::default()
		};

		match self.retrieval.retrieve(&ctx.tenant_id, query, &options).await {
			Ok(results) if results.is_empty() => None,
			Ok(results) =>
				Some(desk_retrieval::assemble_context_with_sources(&results, tier.context_tokens)),
			Err(err) => {
				tracing::warn!(error = %err, "Retrieval failed; continuing without context.");

				None
			},
		}
	}

	/// Tool-assisted follow-up: run one retrieval for the model's query, feed
	/// the assembled context back, and complete once more with tools disabled,
	/// preserving the one-tool-call-per-turn rule.
	pub(crate) async fn retrieve_followup(
		&self,
		ctx: &AgentContext,
		query: &str,
		narration: &str,
		messages: &[desk_providers::ChatMessage],
		tier: &TierConfig,
	) -> Result<FollowupOutcome> {
		let options = RetrievalOptions {
			top_k: tier.top_k,
			min_score: self.retrieval.min_score(),
			product: ctx.product.clone(),
			..RetrievalOptions::default()
		};
		let results = match self.retrieval.retrieve(&ctx.tenant_id, query, &options).await {
			Ok(results) => results,
			Err(err) => {
				tracing::warn!(error = %err, "Follow-up retrieval failed; answering without it.");

				Vec::new()
			},
		};
		let assembled =
			desk_retrieval::assemble_context_with_sources(&results, tier.context_tokens);
		let mut followup = messages.to_vec();

		followup.push(desk_providers::ChatMessage::assistant(narration));
		followup.push(desk_providers::ChatMessage::tool(if assembled.text.is_empty() {
			"No matching documentation was found.".to_string()
		} else {
			assembled.text.clone()
		}));

		let completion = self.chat.complete(&followup, &[]).await?;

		Ok(FollowupOutcome {
			message: completion.content.unwrap_or_default(),
			sources: assembled.sources,
			usage: completion.usage,
			model: model_of(&completion.model),
		})
	}

	/// Output guardrail: callers always ship the sanitized variant.
	pub(crate) fn sanitize_outgoing(&self, message: &str) -> String {
		let validation =
			desk_domain::validate_response(message, self.guardrails.max_response_chars as usize);

		if !validation.valid {
			tracing::warn!(issues = ?validation.issues, "Outgoing response sanitized.");
		}

		validation.sanitized
	}

	pub(crate) fn signals_for(&self, ctx: &AgentContext) -> desk_domain::ContextSignals {
		desk_domain::ContextSignals {
			failed_attempts: ctx.failed_attempts,
			failed_attempt_limit: self.guardrails.max_failed_attempts,
			case_severity: ctx.severity,
		}
	}
}

pub(crate) struct FollowupOutcome {
	pub(crate) message: String,
	pub(crate) sources: Vec<desk_retrieval::SourceRef>,
	pub(crate) usage: TokenUsage,
	pub(crate) model: Option<String>,
}

pub(crate) fn is_critical(evaluation: &TriggerEvaluation) -> bool {
	evaluation.severity == Severity::Critical
}

pub(crate) fn combine_usage(a: TokenUsage, b: TokenUsage) -> TokenUsage {
	TokenUsage {
		prompt_tokens: a.prompt_tokens + b.prompt_tokens,
		completion_tokens: a.completion_tokens + b.completion_tokens,
	}
}

pub(crate) fn model_of(model: &str) -> Option<String> {
	if model.trim().is_empty() { None } else { Some(model.to_string()) }
}
