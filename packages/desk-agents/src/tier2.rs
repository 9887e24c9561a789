use std::time::Instant;

use desk_config::TierConfig;
use desk_domain::EscalationLevel;
use desk_providers::{ChatMessage, TokenUsage};
use desk_retrieval::SourceRef;

use crate::{
	AgentAction, AgentContext, AgentDeps, AgentResponse, CaseHistory, Error,
	HUMAN_HANDOFF_MESSAGE, RESOLVED_MESSAGE, ResponseMetadata, Result, SessionMode, Tier2Tool,
	VisualSessionRequest, combine_usage, diagnostics, is_critical, model_of, prompt,
};

/// How long a visual-session invite stays joinable.
const VISUAL_SESSION_EXPIRY_SECS: u64 = 900;

/// The tier-2 specialist agent: wider retrieval, tier-1 attempt history in the
/// prompt, diagnostics, and visual-session initiation. It never executes
/// playbook steps; tier-1's attempts arrive as text in [`CaseHistory`].
pub struct Tier2Agent {
	deps: AgentDeps,
	cfg: TierConfig,
}

struct Draft {
	message: String,
	action: Option<AgentAction>,
	should_escalate: bool,
	escalation_level: Option<EscalationLevel>,
	escalation_reason: Option<String>,
	sources: Vec<SourceRef>,
	usage: TokenUsage,
	model: Option<String>,
}

impl Tier2Agent {
	pub fn new(deps: AgentDeps, cfg: TierConfig) -> Self {
		Self { deps, cfg }
	}

	pub async fn handle_turn(
		&self,
		ctx: &AgentContext,
		case_history: &CaseHistory,
		message: &str,
	) -> Result<AgentResponse> {
		let started = Instant::now();
		let inbound = desk_domain::redact(message);

		if inbound.has_secrets {
			tracing::warn!(
				case = %ctx.case_id,
				count = inbound.records.len(),
				"Redacted secrets from an inbound message."
			);
		}

		let evaluation = desk_domain::evaluate_triggers(&inbound.text, &self.deps.signals_for(ctx));

		if is_critical(&evaluation) {
			return Ok(self.deps.human_handoff(ctx, &evaluation, started).await);
		}

		let rag = self.deps.gather_context(ctx, &inbound.text, &self.cfg).await;
		let messages = prompt::tier2_messages(
			ctx,
			case_history,
			&inbound.text,
			rag.as_ref(),
			self.cfg.max_history_messages as usize,
		);
		let completion = self.deps.chat.complete(&messages, &Tier2Tool::specs()).await?;
		let mut draft = Draft {
			message: completion.content.clone().unwrap_or_default(),
			action: None,
			should_escalate: evaluation.should_escalate,
			escalation_level: evaluation.should_escalate.then_some(EscalationLevel::Human),
			escalation_reason: (!evaluation.reasons.is_empty())
				.then(|| evaluation.reasons.join("; ")),
			sources: rag.map(|rag| rag.sources).unwrap_or_default(),
			usage: completion.usage,
			model: model_of(&completion.model),
		};

		if let Some(invocation) = completion.tool_call.as_ref() {
			match Tier2Tool::parse(invocation) {
				Ok(tool) => self.dispatch(ctx, tool, &messages, &mut draft).await?,
				Err(err @ (Error::UnknownTool { .. } | Error::ToolArguments { .. })) => {
					tracing::warn!(case = %ctx.case_id, error = %err, "Ignoring unusable tool call.");
				},
				Err(err) => return Err(err),
			}
		}
		if draft.message.trim().is_empty() {
			draft.message = HUMAN_HANDOFF_MESSAGE.to_string();
			draft.should_escalate = true;
			draft.escalation_level = Some(EscalationLevel::Human);
			draft.action = Some(AgentAction::EscalateToHuman);
		}

		let message = self.deps.sanitize_outgoing(&draft.message);
		let detail = match draft.escalation_reason.as_ref() {
			Some(reason) if draft.should_escalate => format!("escalating: {reason}"),
			_ => "responded".to_string(),
		};

		self.deps.record_event(&ctx.case_id, "tier2_turn", &detail).await;

		Ok(AgentResponse {
			message,
			action: draft.action,
			should_escalate: draft.should_escalate,
			escalation_level: draft.escalation_level,
			escalation_reason: draft.escalation_reason,
			sources: draft.sources,
			playbook_state: ctx.playbook_state.clone(),
			metadata: ResponseMetadata {
				model: draft.model,
				usage: draft.usage,
				processing_ms: started.elapsed().as_millis() as u64,
			},
		})
	}

	async fn dispatch(
		&self,
		ctx: &AgentContext,
		tool: Tier2Tool,
		messages: &[ChatMessage],
		draft: &mut Draft,
	) -> Result<()> {
		match tool {
			Tier2Tool::LookupDocumentation { query } => {
				let narration = format!("Looking up documentation for: {query}");
				let outcome =
					self.deps.retrieve_followup(ctx, &query, &narration, messages, &self.cfg).await?;

				self.absorb_followup(outcome, draft);
			},
			Tier2Tool::AnalyzeError { error_text } => {
				let narration = "Analyzing the reported error against known issues.".to_string();
				let outcome = self
					.deps
					.retrieve_followup(ctx, &error_text, &narration, messages, &self.cfg)
					.await?;

				self.absorb_followup(outcome, draft);
			},
			Tier2Tool::SuggestDiagnosticSteps { category } => {
				let topic = category.unwrap_or_else(|| draft_topic(messages));
				let steps = diagnostics::suggest_diagnostic_steps(&topic);
				let mut message = String::from("Let's narrow this down. Please try the following:");

				for (i, step) in steps.iter().enumerate() {
					message.push_str(&format!("\n{}. {step}", i + 1));
				}

				message.push_str("\nTell me what happens after each step.");

				draft.message = message;
			},
			Tier2Tool::InitiateVisionscreen { mode } => {
				self.initiate_visionscreen(ctx, mode, draft).await;
			},
			Tier2Tool::EscalateToHuman { reason } => {
				draft.should_escalate = true;
				draft.escalation_level = Some(EscalationLevel::Human);
				draft.escalation_reason = Some(reason);
				draft.action = Some(AgentAction::EscalateToHuman);

				if draft.message.trim().is_empty() {
					draft.message = HUMAN_HANDOFF_MESSAGE.to_string();
				}
			},
			Tier2Tool::MarkResolved { summary } => {
				draft.action = Some(AgentAction::Resolve);
				draft.should_escalate = false;
				draft.escalation_level = None;
				draft.escalation_reason = None;

				if draft.message.trim().is_empty() {
					draft.message = summary.unwrap_or_else(|| RESOLVED_MESSAGE.to_string());
				}
			},
		}

		Ok(())
	}

	/// Visual-session setup is degraded-dependency territory: a failure keeps
	/// the turn alive instead of erroring out to the caller.
	async fn initiate_visionscreen(&self, ctx: &AgentContext, mode: SessionMode, draft: &mut Draft) {
		let request = VisualSessionRequest { mode, expiry_secs: VISUAL_SESSION_EXPIRY_SECS };
		let session = self
			.deps
			.collaborators
			.visual_sessions
			.create_session(&ctx.tenant_id, &ctx.case_id, request)
			.await;

		match session {
			Ok(session) => {
				draft.message = format!(
					"Let's look at this together. Open {} on the affected device and I'll see what you see. The link expires in 15 minutes.",
					session.join_url,
				);
				draft.action =
					Some(AgentAction::StartVisualSession { join_url: session.join_url, mode });
			},
			Err(err) => {
				tracing::warn!(case = %ctx.case_id, error = %err, "Visual session setup failed.");

				draft.message = "I couldn't start a visual session just now. Let's keep going here - \
					describe what you see on screen and we'll work through it."
					.to_string();
			},
		}
	}

	fn absorb_followup(&self, outcome: crate::FollowupOutcome, draft: &mut Draft) {
		if !outcome.sources.is_empty() {
			draft.sources = outcome.sources;
		}

		draft.usage = combine_usage(draft.usage, outcome.usage);

		if let Some(model) = outcome.model {
			draft.model = Some(model);
		}

		draft.message = outcome.message;
	}
}

/// Topic hint for the diagnostic generator when the model passed no category:
/// the customer's latest message.
fn draft_topic(messages: &[ChatMessage]) -> String {
	messages
		.iter()
		.rev()
		.find(|message| message.role == desk_providers::Role::User)
		.map(|message| message.content.clone())
		.unwrap_or_default()
}
