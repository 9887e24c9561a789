use std::sync::OnceLock;

use regex::Regex;

use crate::redact;

/// Phrasings a support answer must never contain, matched case-insensitively.
const UNSAFE_PHRASES: &[&str] = &[
	"send me your password",
	"share your password",
	"tell me your password",
	"read me your verification code",
	"disable your antivirus",
	"i guarantee a refund",
	"this constitutes legal advice",
];

fn unsafe_patterns() -> &'static [(&'static str, Regex)] {
	static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();

	PATTERNS.get_or_init(|| {
		UNSAFE_PHRASES
			.iter()
			.map(|phrase| {
				let pattern = format!("(?i){}", regex::escape(phrase));

				(*phrase, Regex::new(&pattern).expect("Unsafe phrases are static."))
			})
			.collect()
	})
}

pub const MAX_RESPONSE_CHARS: usize = 4_000;

#[derive(Debug, Clone)]
pub struct ResponseValidation {
	pub valid: bool,
	pub issues: Vec<String>,
	/// The delivery-safe variant. Callers must send this, not the original,
	/// whenever `valid` is false.
	pub sanitized: String,
}

/// Re-runs redaction against model output (a leaked secret must never reach
/// the user), strips unsafe phrasings, and enforces the length ceiling.
pub fn validate_response(text: &str, max_chars: usize) -> ResponseValidation {
	let mut issues = Vec::new();
	let redaction = redact::redact(text);

	if redaction.has_secrets {
		for record in &redaction.records {
			issues.push(format!("response leaked a {} value", record.kind.label()));
		}
	}

	let mut sanitized = redaction.text;

	for (phrase, pattern) in unsafe_patterns() {
		if pattern.is_match(&sanitized) {
			issues.push(format!("unsafe phrasing \"{phrase}\""));

			sanitized = pattern.replace_all(&sanitized, "[removed]").into_owned();
		}
	}

	if sanitized.chars().count() > max_chars {
		issues.push(format!("response exceeds the {max_chars} character ceiling"));

		sanitized = truncate_chars(&sanitized, max_chars);
	}

	ResponseValidation { valid: issues.is_empty(), issues, sanitized }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
	match text.char_indices().nth(max_chars) {
		Some((byte_index, _)) => text[..byte_index].to_string(),
		None => text.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn clean_response_is_valid_and_unchanged() {
		let validation = validate_response("Try restarting the app first.", MAX_RESPONSE_CHARS);

		assert!(validation.valid);
		assert!(validation.issues.is_empty());
		assert_eq!(validation.sanitized, "Try restarting the app first.");
	}

	#[test]
	fn leaked_secret_is_scrubbed_from_sanitized_output() {
		let validation =
			validate_response("Use the key sk-abc123def456ghi789jkl012 to log in.", MAX_RESPONSE_CHARS);

		assert!(!validation.valid);
		assert!(!validation.sanitized.contains("sk-abc123def456ghi789jkl012"));
		assert!(validation.sanitized.contains("[REDACTED ApiKey]"));
	}

	#[test]
	fn unsafe_phrase_is_removed() {
		let validation = validate_response("Please share your password with me.", MAX_RESPONSE_CHARS);

		assert!(!validation.valid);
		assert!(!validation.sanitized.to_lowercase().contains("share your password"));
	}

	#[test]
	fn overlong_response_is_truncated_to_the_ceiling() {
		let long = "a".repeat(5_000);
		let validation = validate_response(&long, MAX_RESPONSE_CHARS);

		assert!(!validation.valid);
		assert_eq!(validation.sanitized.chars().count(), MAX_RESPONSE_CHARS);
	}
}
