use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseStatus {
	#[serde(rename = "open")]
	Open,
	#[serde(rename = "pending")]
	Pending,
	#[serde(rename = "resolved")]
	Resolved,
	#[serde(rename = "escalated_L2")]
	EscalatedL2,
	#[serde(rename = "escalated_human")]
	EscalatedHuman,
}

/// The case-store collaborator enforces this table; it is kept here so agent
/// code can refuse to request an impossible transition instead of round-tripping
/// a rejection.
pub fn can_transition(from: CaseStatus, to: CaseStatus) -> bool {
	use CaseStatus::*;

	matches!(
		(from, to),
		(Open, Pending | Resolved | EscalatedL2)
			| (Pending, Open | Resolved | EscalatedL2)
			| (EscalatedL2, Pending | Resolved | EscalatedHuman)
			| (EscalatedHuman, Resolved)
	)
}
