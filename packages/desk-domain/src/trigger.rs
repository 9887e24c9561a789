use crate::severity::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TriggerCategory {
	Legal,
	SecurityIncident,
	BillingFraud,
	Frustration,
	Urgency,
	HumanRequest,
}
impl TriggerCategory {
	fn severity(self) -> Severity {
		match self {
			Self::Legal | Self::SecurityIncident => Severity::Critical,
			Self::BillingFraud | Self::HumanRequest => Severity::High,
			Self::Frustration | Self::Urgency => Severity::Medium,
		}
	}

	fn label(self) -> &'static str {
		match self {
			Self::Legal => "legal/compliance",
			Self::SecurityIncident => "security incident",
			Self::BillingFraud => "billing fraud",
			Self::Frustration => "customer frustration",
			Self::Urgency => "urgency",
			Self::HumanRequest => "explicit human request",
		}
	}
}

const KEYWORDS: &[(&str, TriggerCategory)] = &[
	("lawsuit", TriggerCategory::Legal),
	("sue", TriggerCategory::Legal),
	("suing", TriggerCategory::Legal),
	("attorney", TriggerCategory::Legal),
	("lawyer", TriggerCategory::Legal),
	("legal action", TriggerCategory::Legal),
	("gdpr", TriggerCategory::Legal),
	("hacked", TriggerCategory::SecurityIncident),
	("breach", TriggerCategory::SecurityIncident),
	("data leak", TriggerCategory::SecurityIncident),
	("compromised", TriggerCategory::SecurityIncident),
	("unauthorized access", TriggerCategory::SecurityIncident),
	("fraud", TriggerCategory::BillingFraud),
	("fraudulent", TriggerCategory::BillingFraud),
	("unauthorized charge", TriggerCategory::BillingFraud),
	("chargeback", TriggerCategory::BillingFraud),
	("double charged", TriggerCategory::BillingFraud),
	("ridiculous", TriggerCategory::Frustration),
	("unacceptable", TriggerCategory::Frustration),
	("terrible", TriggerCategory::Frustration),
	("furious", TriggerCategory::Frustration),
	("fed up", TriggerCategory::Frustration),
	("urgent", TriggerCategory::Urgency),
	("emergency", TriggerCategory::Urgency),
	("immediately", TriggerCategory::Urgency),
	("asap", TriggerCategory::Urgency),
	("speak to a human", TriggerCategory::HumanRequest),
	("talk to a human", TriggerCategory::HumanRequest),
	("speak to a person", TriggerCategory::HumanRequest),
	("real person", TriggerCategory::HumanRequest),
	("human agent", TriggerCategory::HumanRequest),
	("representative", TriggerCategory::HumanRequest),
];

#[derive(Debug, Clone, Default)]
pub struct ContextSignals {
	pub failed_attempts: u32,
	/// Attempt count at which repeated failures become a trigger on their own.
	/// Zero falls back to the catalogue default of 3.
	pub failed_attempt_limit: u32,
	pub case_severity: Option<Severity>,
}

#[derive(Debug, Clone)]
pub struct TriggerEvaluation {
	pub should_escalate: bool,
	pub reasons: Vec<String>,
	pub severity: Severity,
}

/// Scans the lowercased message against the keyword taxonomy and combines the
/// hits with contextual signals. The result severity is a pure fold: the max
/// rank over every matched trigger, so a critical hit can never be downgraded
/// by a later, weaker one.
pub fn evaluate_triggers(message: &str, signals: &ContextSignals) -> TriggerEvaluation {
	let lowered = message.to_lowercase();
	let mut reasons = Vec::new();
	let mut severities = Vec::new();

	for (keyword, category) in KEYWORDS {
		if message_contains(&lowered, keyword) {
			reasons.push(format!("{} keyword \"{keyword}\"", category.label()));
			severities.push(category.severity());
		}
	}

	let limit = if signals.failed_attempt_limit == 0 { 3 } else { signals.failed_attempt_limit };

	if signals.failed_attempts >= limit {
		reasons.push(format!("{} failed attempts reached the escalation limit", signals.failed_attempts));
		severities.push(Severity::High);
	}
	if let Some(case_severity) = signals.case_severity
		&& case_severity >= Severity::High
	{
		reasons.push(format!("case severity is {case_severity}"));
		severities.push(case_severity);
	}

	let severity = severities.into_iter().max().unwrap_or(Severity::Low);

	TriggerEvaluation { should_escalate: !reasons.is_empty(), reasons, severity }
}

/// Multi-word keywords match as substrings; single words must match a whole
/// token, so "sue" never fires on "issue".
fn message_contains(lowered: &str, keyword: &str) -> bool {
	if keyword.contains(' ') {
		return lowered.contains(keyword);
	}

	lowered.split(|ch: char| !ch.is_alphanumeric()).any(|word| word == keyword)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lawsuit_is_always_critical() {
		let evaluation = evaluate_triggers("I will file a lawsuit tomorrow", &ContextSignals::default());

		assert!(evaluation.should_escalate);
		assert_eq!(evaluation.severity, Severity::Critical);
	}

	#[test]
	fn critical_never_downgrades_within_one_evaluation() {
		let evaluation = evaluate_triggers(
			"this is urgent, I was hacked and I am furious",
			&ContextSignals::default(),
		);

		assert_eq!(evaluation.severity, Severity::Critical);
		assert!(evaluation.reasons.len() >= 3);
	}

	#[test]
	fn plain_message_does_not_escalate() {
		let evaluation =
			evaluate_triggers("my export finished but the file is empty", &ContextSignals::default());

		assert!(!evaluation.should_escalate);
		assert_eq!(evaluation.severity, Severity::Low);
		assert!(evaluation.reasons.is_empty());
	}

	#[test]
	fn sue_does_not_fire_on_issue() {
		let evaluation =
			evaluate_triggers("I have an issue with my login", &ContextSignals::default());

		assert!(!evaluation.should_escalate);
	}

	#[test]
	fn repeated_failures_are_a_contextual_trigger() {
		let signals = ContextSignals { failed_attempts: 3, ..ContextSignals::default() };
		let evaluation = evaluate_triggers("still not working", &signals);

		assert!(evaluation.should_escalate);
		assert_eq!(evaluation.severity, Severity::High);
	}

	#[test]
	fn high_case_severity_folds_in() {
		let signals =
			ContextSignals { case_severity: Some(Severity::Critical), ..ContextSignals::default() };
		let evaluation = evaluate_triggers("any update on my ticket?", &signals);

		assert!(evaluation.should_escalate);
		assert_eq!(evaluation.severity, Severity::Critical);
	}
}
