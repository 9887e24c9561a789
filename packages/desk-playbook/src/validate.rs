use std::collections::HashSet;

use crate::{Error, Result, types::Playbook};

/// Load-time validation. Structural defects are hard errors; a missing version
/// or escalation config is only worth a warning.
pub fn validate(playbook: &Playbook) -> Result<Vec<String>> {
	let id = playbook.metadata.id.trim();

	if id.is_empty() {
		return Err(Error::Validation { message: "Playbook metadata.id must be non-empty.".to_string() });
	}
	if playbook.metadata.name.trim().is_empty() {
		return Err(Error::Validation {
			message: format!("Playbook {id}: metadata.name must be non-empty."),
		});
	}
	if playbook.steps.is_empty() {
		return Err(Error::Validation {
			message: format!("Playbook {id}: at least one step is required."),
		});
	}

	let mut step_ids = HashSet::new();

	for step in &playbook.steps {
		if step.id.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Playbook {id}: every step needs a non-empty id."),
			});
		}
		if !step_ids.insert(step.id.as_str()) {
			return Err(Error::Validation {
				message: format!("Playbook {id}: duplicate step id {}.", step.id),
			});
		}
		if step.title.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Playbook {id}: step {} is missing a title.", step.id),
			});
		}
		if step.instruction.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Playbook {id}: step {} is missing an instruction.", step.id),
			});
		}
		if step.max_attempts == 0 {
			return Err(Error::Validation {
				message: format!("Playbook {id}: step {} max_attempts must be greater than zero.", step.id),
			});
		}
	}

	for step in &playbook.steps {
		for (label, target) in
			[("next_on_success", &step.next_on_success), ("next_on_failure", &step.next_on_failure)]
		{
			if let Some(target) = target
				&& !step_ids.contains(target.as_str())
			{
				return Err(Error::Validation {
					message: format!(
						"Playbook {id}: step {} {label} references unknown step {target}.",
						step.id
					),
				});
			}
		}
	}

	let mut warnings = Vec::new();

	if playbook.metadata.version.as_deref().map(str::trim).unwrap_or("").is_empty() {
		warnings.push(format!("Playbook {id} declares no version."));
	}
	if playbook.escalation.is_none() {
		warnings.push(format!("Playbook {id} declares no escalation config."));
	}

	Ok(warnings)
}
