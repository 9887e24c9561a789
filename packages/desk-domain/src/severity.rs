use serde::{Deserialize, Serialize};

/// Ordering is the escalation rank: folding a set of triggers with `max`
/// yields the strongest severity seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
	Low,
	Medium,
	High,
	Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscalationLevel {
	#[serde(rename = "L2")]
	Tier2,
	#[serde(rename = "L3")]
	Human,
}

impl std::fmt::Display for Severity {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let label = match self {
			Self::Low => "low",
			Self::Medium => "medium",
			Self::High => "high",
			Self::Critical => "critical",
		};

		write!(f, "{label}")
	}
}

impl std::fmt::Display for EscalationLevel {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let label = match self {
			Self::Tier2 => "L2",
			Self::Human => "L3",
		};

		write!(f, "{label}")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn severity_orders_by_rank() {
		assert!(Severity::Critical > Severity::High);
		assert!(Severity::High > Severity::Medium);
		assert!(Severity::Medium > Severity::Low);
	}

	#[test]
	fn escalation_level_serializes_as_tier_label() {
		assert_eq!(serde_json::to_string(&EscalationLevel::Human).unwrap(), "\"L3\"");
		assert_eq!(serde_json::to_string(&EscalationLevel::Tier2).unwrap(), "\"L2\"");
	}
}
