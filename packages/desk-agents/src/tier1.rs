use std::{sync::Arc, time::Instant};

use desk_config::TierConfig;
use desk_domain::EscalationLevel;
use desk_playbook::{ExecutionState, MatchCriteria, Playbook, StepOutcome, execute_step, format_instruction};
use desk_providers::{ChatMessage, TokenUsage};
use desk_retrieval::SourceRef;

use crate::{
	AgentAction, AgentContext, AgentDeps, AgentResponse, Error, HUMAN_HANDOFF_MESSAGE,
	RESOLVED_MESSAGE, ResponseMetadata, Result, Tier1Tool, combine_usage, is_critical, model_of,
	prompt::{self, PlaybookPrompt},
};

/// The tier-1 conversational agent: guardrails, RAG context, playbook step
/// tracking, and a constrained tool set around a single model call per turn.
pub struct Tier1Agent {
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

impl Tier1Agent {
	pub fn new(deps: AgentDeps, cfg: TierConfig) -> Self {
		Self { deps, cfg }
	}

	pub async fn handle_turn(&self, ctx: &AgentContext, message: &str) -> Result<AgentResponse> {
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
		let playbook = self.active_playbook(ctx, &inbound.text);
		let playbook_prompt = playbook.as_ref().and_then(|(book, state)| {
			let step = book.step(&state.current_step_id)?;

			Some(PlaybookPrompt {
				playbook_name: book.metadata.name.clone(),
				step_title: step.title.clone(),
				instruction: format_instruction(step, &state.variables),
			})
		});
		let messages = prompt::tier1_messages(
			ctx,
			&inbound.text,
			rag.as_ref(),
			playbook_prompt.as_ref(),
			self.cfg.max_history_messages as usize,
		);
		let completion = self.deps.chat.complete(&messages, &Tier1Tool::specs()).await?;
		let mut state = playbook.as_ref().map(|(_, state)| state.clone());
		let mut draft = Draft {
			message: completion.content.clone().unwrap_or_default(),
			action: None,
			should_escalate: evaluation.should_escalate,
			escalation_level: evaluation.should_escalate.then_some(EscalationLevel::Tier2),
			escalation_reason: (!evaluation.reasons.is_empty())
				.then(|| evaluation.reasons.join("; ")),
			sources: rag.map(|rag| rag.sources).unwrap_or_default(),
			usage: completion.usage,
			model: model_of(&completion.model),
		};

		if let Some(invocation) = completion.tool_call.as_ref() {
			match Tier1Tool::parse(invocation) {
				Ok(tool) =>
					self.dispatch(ctx, tool, &messages, playbook.as_ref().map(|(book, _)| book), state.as_mut(), &mut draft)
						.await?,
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

		self.deps.record_event(&ctx.case_id, "tier1_turn", &detail).await;

		Ok(AgentResponse {
			message,
			action: draft.action,
			should_escalate: draft.should_escalate,
			escalation_level: draft.escalation_level,
			escalation_reason: draft.escalation_reason,
			sources: draft.sources,
			playbook_state: state.or_else(|| ctx.playbook_state.clone()),
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
		tool: Tier1Tool,
		messages: &[ChatMessage],
		playbook: Option<&Arc<Playbook>>,
		state: Option<&mut ExecutionState>,
		draft: &mut Draft,
	) -> Result<()> {
		match tool {
			Tier1Tool::LookupDocumentation { query } => {
				let followup = self.lookup_documentation(ctx, &query, messages, draft).await?;

				draft.message = followup;
			},
			Tier1Tool::ExecutePlaybookStep { step_id, outcome } =>
				self.execute_playbook_step(ctx, playbook, state, &step_id, outcome, draft),
			Tier1Tool::EscalateToL2 { reason } => {
				draft.should_escalate = true;
				draft.escalation_level = Some(EscalationLevel::Tier2);
				draft.escalation_reason = Some(reason);
				draft.action = Some(AgentAction::EscalateToTier2);

				if draft.message.trim().is_empty() {
					draft.message =
						"I'm bringing in a specialist from our tier-2 team - they already have your case details."
							.to_string();
				}
			},
			Tier1Tool::EscalateToHuman { reason } => {
				draft.should_escalate = true;
				draft.escalation_level = Some(EscalationLevel::Human);
				draft.escalation_reason = Some(reason);
				draft.action = Some(AgentAction::EscalateToHuman);

				if draft.message.trim().is_empty() {
					draft.message = HUMAN_HANDOFF_MESSAGE.to_string();
				}
			},
			Tier1Tool::MarkResolved { summary } => {
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

	async fn lookup_documentation(
		&self,
		ctx: &AgentContext,
		query: &str,
		messages: &[ChatMessage],
		draft: &mut Draft,
	) -> Result<String> {
		let narration = format!("Looking up documentation for: {query}");
		let outcome =
			self.deps.retrieve_followup(ctx, query, &narration, messages, &self.cfg).await?;

		if !outcome.sources.is_empty() {
			draft.sources = outcome.sources;
		}

		draft.usage = combine_usage(draft.usage, outcome.usage);

		if let Some(model) = outcome.model {
			draft.model = Some(model);
		}

		Ok(outcome.message)
	}

	fn execute_playbook_step(
		&self,
		ctx: &AgentContext,
		playbook: Option<&Arc<Playbook>>,
		state: Option<&mut ExecutionState>,
		step_id: &str,
		outcome: StepOutcome,
		draft: &mut Draft,
	) {
		let (Some(playbook), Some(state)) = (playbook, state) else {
			tracing::warn!(
				case = %ctx.case_id,
				step = step_id,
				"Model reported a playbook step but no playbook is active."
			);

			return;
		};

		if state.current_step_id != step_id {
			tracing::warn!(
				case = %ctx.case_id,
				reported = step_id,
				current = %state.current_step_id,
				"Reported step id differs from the tracked step; trusting tracked state."
			);
		}

		let result = execute_step(playbook, state, outcome);

		if result.should_escalate {
			draft.should_escalate = true;
			draft.escalation_level = Some(EscalationLevel::Tier2);
			draft.escalation_reason = result.escalation_reason.clone();
			draft.action = Some(AgentAction::EscalateToTier2);

			let default_message = playbook
				.escalation
				.as_ref()
				.map(|escalation| escalation.default_message.clone());

			draft.message = default_message.unwrap_or_else(|| {
				"That didn't work despite several tries, so I'm escalating you to our specialist team."
					.to_string()
			});
		} else if result.resolved {
			draft.action = Some(AgentAction::Resolve);

			if draft.message.trim().is_empty() {
				draft.message = RESOLVED_MESSAGE.to_string();
			}
		} else if draft.message.trim().is_empty()
			&& let Some(step) = playbook.step(&state.current_step_id)
		{
			draft.message = format_instruction(step, &state.variables);
		}
	}

	/// Resumes the state the caller supplied, or selects a fresh playbook by
	/// the documented match policy. Lookup failures degrade to "no playbook".
	fn active_playbook(
		&self,
		ctx: &AgentContext,
		message: &str,
	) -> Option<(Arc<Playbook>, ExecutionState)> {
		if let Some(state) = ctx.playbook_state.as_ref() {
			if state.outcome != desk_playbook::ExecutionOutcome::InProgress {
				return None;
			}

			return match self.deps.playbooks.get(&state.playbook_id) {
				Some(playbook) => Some((playbook, state.clone())),
				None => {
					tracing::warn!(
						case = %ctx.case_id,
						playbook = %state.playbook_id,
						"Case references a playbook that is no longer registered."
					);

					None
				},
			};
		}

		let criteria = MatchCriteria {
			product: ctx.product.as_deref(),
			category: ctx.category.as_deref(),
			severity: ctx.severity,
			message,
		};
		let playbook = self.deps.playbooks.find(&criteria).into_iter().next()?;
		let state = ExecutionState::start(&playbook)?;

		Some((playbook, state))
	}
}
