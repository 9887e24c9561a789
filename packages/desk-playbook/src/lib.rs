mod error;
mod executor;
mod registry;
mod types;
mod validate;

pub use error::{Error, Result};
pub use executor::{
	ExecutionOutcome, ExecutionState, StepOutcome, StepResult, execute_step, format_instruction,
};
pub use registry::{MatchCriteria, PlaybookRegistry};
pub use types::{EscalationConfig, Playbook, PlaybookMetadata, PlaybookStep, Triggers};
pub use validate::validate;
