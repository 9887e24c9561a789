pub mod case;
pub mod redact;
pub mod severity;
pub mod trigger;
pub mod validate;

pub use case::{CaseStatus, can_transition};
pub use redact::{Redaction, RedactionRecord, SecretKind, redact};
pub use severity::{EscalationLevel, Severity};
pub use trigger::{ContextSignals, TriggerEvaluation, evaluate_triggers};
pub use validate::{ResponseValidation, validate_response};
