use desk_providers::ChatMessage;
use desk_retrieval::ContextWithSources;

use crate::context::{AgentContext, CaseHistory};

/// The active playbook step, already rendered with variable substitution.
#[derive(Debug, Clone)]
pub struct PlaybookPrompt {
	pub playbook_name: String,
	pub step_title: String,
	pub instruction: String,
}

pub fn tier1_messages(
	ctx: &AgentContext,
	message: &str,
	rag: Option<&ContextWithSources>,
	playbook: Option<&PlaybookPrompt>,
	max_history: usize,
) -> Vec<ChatMessage> {
	let mut system = String::from(
		"You are a tier-1 customer support agent. Resolve the customer's problem using only the \
		 documentation context and the active troubleshooting step provided below. Never invent \
		 product behavior, never ask for credentials, and keep answers short enough to read aloud \
		 over the phone. Use a tool when the situation calls for one; otherwise answer directly.",
	);

	push_case_facts(&mut system, ctx);

	if let Some(rag) = rag
		&& !rag.text.is_empty()
	{
		system.push_str("\n\nDocumentation context (numbered by source):\n");
		system.push_str(&rag.text);
	}
	if let Some(playbook) = playbook {
		system.push_str(&format!(
			"\n\nActive troubleshooting procedure: {}\nCurrent step: {}\nInstruction for the customer: {}\nReport the step outcome with the execute_playbook_step tool once the customer has tried it.",
			playbook.playbook_name, playbook.step_title, playbook.instruction,
		));
	}

	assemble(system, ctx, message, max_history)
}

pub fn tier2_messages(
	ctx: &AgentContext,
	case_history: &CaseHistory,
	message: &str,
	rag: Option<&ContextWithSources>,
	max_history: usize,
) -> Vec<ChatMessage> {
	let mut system = String::from(
		"You are a tier-2 customer support specialist. The tier-1 agent could not resolve this \
		 case; its attempts are summarized below so the customer never has to repeat themselves. \
		 You can analyze errors, suggest diagnostics, and start a visual session when seeing the \
		 problem would help. Never invent product behavior and never ask for credentials.",
	);

	push_case_facts(&mut system, ctx);

	system.push_str("\n\nTier-1 attempt history:");

	if case_history.steps_attempted.is_empty() {
		system.push_str("\n- no steps recorded");
	} else {
		for step in &case_history.steps_attempted {
			system.push_str("\n- ");
			system.push_str(step);
		}
	}

	system.push_str(&format!("\nFailed attempts so far: {}", case_history.failure_count));

	if let Some(last) = case_history.last_response.as_ref() {
		system.push_str("\nLast tier-1 response: ");
		system.push_str(last);
	}
	if let Some(rag) = rag
		&& !rag.text.is_empty()
	{
		system.push_str("\n\nDocumentation context (numbered by source):\n");
		system.push_str(&rag.text);
	}

	assemble(system, ctx, message, max_history)
}

fn push_case_facts(system: &mut String, ctx: &AgentContext) {
	if let Some(product) = ctx.product.as_ref() {
		system.push_str(&format!("\n\nProduct: {product}"));
	}
	if let Some(category) = ctx.category.as_ref() {
		system.push_str(&format!("\nCategory: {category}"));
	}
	if let Some(language) = ctx.language.as_ref() {
		system.push_str(&format!("\nRespond in language: {language}"));
	}
	if let Some(severity) = ctx.severity {
		system.push_str(&format!("\nCase severity: {severity}"));
	}
}

/// System prompt, then the most recent history tail, then the new message.
fn assemble(
	system: String,
	ctx: &AgentContext,
	message: &str,
	max_history: usize,
) -> Vec<ChatMessage> {
	let skip = ctx.history.len().saturating_sub(max_history);
	let mut messages = Vec::with_capacity(ctx.history.len() - skip + 2);

	messages.push(ChatMessage::system(system));
	messages.extend(ctx.history.iter().skip(skip).cloned());
	messages.push(ChatMessage::user(message));

	messages
}

#[cfg(test)]
mod tests {
	use desk_providers::Role;

	use super::*;

	fn ctx() -> AgentContext {
		AgentContext {
			tenant_id: "t1".to_string(),
			case_id: "case-9".to_string(),
			product: Some("AI Factory".to_string()),
			category: None,
			language: Some("en".to_string()),
			severity: None,
			history: vec![
				ChatMessage::user("it is broken"),
				ChatMessage::assistant("let us check a few things"),
			],
			playbook_state: None,
			failed_attempts: 0,
		}
	}

	#[test]
	fn tier2_prompt_carries_every_attempted_step() {
		let history = CaseHistory {
			steps_attempted: vec!["restart app".to_string(), "clear cache".to_string()],
			failure_count: 2,
			last_response: Some("Please try clearing the cache.".to_string()),
		};
		let messages = tier2_messages(&ctx(), &history, "still broken", None, 10);
		let system = &messages[0].content;

		assert!(system.contains("restart app"));
		assert!(system.contains("clear cache"));
		assert!(system.contains("Please try clearing the cache."));
	}

	#[test]
	fn history_tail_is_bounded() {
		let mut context = ctx();

		for i in 0..50 {
			context.history.push(ChatMessage::user(format!("message {i}")));
		}

		let messages = tier1_messages(&context, "latest", None, None, 10);

		// system + 10 history + new user message
		assert_eq!(messages.len(), 12);
		assert_eq!(messages.last().map(|m| m.content.as_str()), Some("latest"));
		assert_eq!(messages[0].role, Role::System);
	}

	#[test]
	fn playbook_step_is_injected_into_the_system_prompt() {
		let playbook = PlaybookPrompt {
			playbook_name: "Login recovery".to_string(),
			step_title: "Check the reset email".to_string(),
			instruction: "Ask the customer to check spam for the reset email.".to_string(),
		};
		let messages = tier1_messages(&ctx(), "no email arrived", None, Some(&playbook), 10);

		assert!(messages[0].content.contains("Check the reset email"));
		assert!(messages[0].content.contains("execute_playbook_step"));
	}
}
