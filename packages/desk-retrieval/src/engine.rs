use std::sync::Arc;

use desk_chunking::estimate_tokens;

use crate::{
	BoxFuture, Embedder, Error, Result,
	index::{QueryFilter, QueryParams, RecordMetadata, VectorIndex},
};

/// Delimiter between chunks in an assembled context block.
const CONTEXT_DELIMITER: &str = "\n\n---\n\n";
/// A truncated chunk shorter than this is dropped instead of included.
const MIN_USEFUL_CHARS: usize = 100;
/// Stricter score floor used by the cheap relevance probe.
pub const PROBE_MIN_SCORE: f32 = 0.75;

#[derive(Debug, Clone)]
pub struct RetrievalOptions {
	pub top_k: u32,
	pub min_score: f32,
	pub product: Option<String>,
	pub kb_id: Option<String>,
	pub language: Option<String>,
}
impl Default for RetrievalOptions {
	fn default() -> Self {
		Self { top_k: 5, min_score: 0.7, product: None, kb_id: None, language: None }
	}
}

/// Ephemeral per-query result; never persisted.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
	pub content: String,
	pub score: f32,
	pub metadata: RecordMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
	pub number: usize,
	pub kb_id: String,
	pub doc_id: String,
}

#[derive(Debug, Clone)]
pub struct ContextWithSources {
	pub text: String,
	pub sources: Vec<SourceRef>,
}

pub struct RetrievalEngine {
	index: Arc<dyn VectorIndex>,
	embedder: Arc<dyn Embedder>,
	min_score: f32,
	probe_min_score: f32,
}
impl RetrievalEngine {
	pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<dyn Embedder>) -> Self {
		Self { index, embedder, min_score: 0.7, probe_min_score: PROBE_MIN_SCORE }
	}

	pub fn with_thresholds(mut self, retrieval: &desk_config::Retrieval) -> Self {
		self.min_score = retrieval.min_score;
		self.probe_min_score = retrieval.probe_min_score;

		self
	}

	/// The configured score floor, for callers building their own options.
	pub fn min_score(&self) -> f32 {
		self.min_score
	}

	pub fn index(&self) -> &Arc<dyn VectorIndex> {
		&self.index
	}

	pub fn embedder(&self) -> &Arc<dyn Embedder> {
		&self.embedder
	}

	/// Embeds the query and returns above-threshold matches, best first. The
	/// index is expected to return roughly sorted results already; the filter
	/// and explicit re-sort still run unconditionally.
	pub fn retrieve<'a>(
		&'a self,
		tenant_id: &'a str,
		query: &'a str,
		options: &'a RetrievalOptions,
	) -> BoxFuture<'a, Result<Vec<RetrievalResult>>> {
		Box::pin(async move {
			let vectors = self.embedder.embed(&[query.to_string()]).await?;
			let Some(vector) = vectors.into_iter().next() else {
				return Err(Error::Index {
					message: "Embedder returned no vector for the query.".to_string(),
				});
			};
			let params = QueryParams {
				top_k: options.top_k,
				filter: QueryFilter {
					product: options.product.clone(),
					kb_id: options.kb_id.clone(),
					language: options.language.clone(),
				},
			};
			let matches = self.index.query(tenant_id, &vector, &params).await?;
			let mut results: Vec<RetrievalResult> = matches
				.into_iter()
				.filter(|m| m.score >= options.min_score)
				.map(|m| RetrievalResult { content: m.metadata.content.clone(), score: m.score, metadata: m.metadata })
				.collect();

			results.sort_by(|a, b| b.score.total_cmp(&a.score));
			results.truncate(options.top_k as usize);

			Ok(results)
		})
	}

	/// Cheap boolean probe used to decide whether RAG context is worth
	/// injecting at all.
	pub fn has_relevant_content<'a>(
		&'a self,
		tenant_id: &'a str,
		query: &'a str,
		product: Option<&'a str>,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let options = RetrievalOptions {
				top_k: 1,
				min_score: self.probe_min_score,
				product: product.map(str::to_string),
				..RetrievalOptions::default()
			};
			let results = self.retrieve(tenant_id, query, &options).await?;

			Ok(!results.is_empty())
		})
	}
}

/// Packs chunk contents into a token-bounded block, best score first. The
/// estimated token count of the output never exceeds `max_tokens`.
pub fn assemble_context(results: &[RetrievalResult], max_tokens: u32) -> String {
	let mut ordered: Vec<&RetrievalResult> = results.iter().collect();

	ordered.sort_by(|a, b| b.score.total_cmp(&a.score));

	let mut out = String::new();
	let mut used_tokens = 0_u32;

	for result in ordered {
		let delimiter_tokens = if out.is_empty() { 0 } else { estimate_tokens(CONTEXT_DELIMITER) };
		let chunk_tokens = estimate_tokens(&result.content);

		if used_tokens + delimiter_tokens + chunk_tokens > max_tokens {
			if out.is_empty() {
				let budget_chars = max_tokens as usize * 4;
				let truncated = truncate_chars(&result.content, budget_chars);

				if truncated.chars().count() >= MIN_USEFUL_CHARS {
					used_tokens += estimate_tokens(&truncated);
					out.push_str(&truncated);
				}

				continue;
			}

			break;
		}

		if !out.is_empty() {
			out.push_str(CONTEXT_DELIMITER);
		}

		out.push_str(&result.content);

		used_tokens += delimiter_tokens + chunk_tokens;
	}

	out
}

/// Like [`assemble_context`], but prefixes each chunk with a source marker and
/// reports the cited documents, deduplicated by (kb, doc) and numbered in the
/// order first referenced.
pub fn assemble_context_with_sources(
	results: &[RetrievalResult],
	max_tokens: u32,
) -> ContextWithSources {
	let mut ordered: Vec<&RetrievalResult> = results.iter().collect();

	ordered.sort_by(|a, b| b.score.total_cmp(&a.score));

	let mut out = String::new();
	let mut used_tokens = 0_u32;
	let mut sources: Vec<SourceRef> = Vec::new();

	for result in ordered {
		let number = sources
			.iter()
			.find(|source| {
				source.kb_id == result.metadata.kb_id && source.doc_id == result.metadata.doc_id
			})
			.map(|source| source.number)
			.unwrap_or(sources.len() + 1);
		let block = format!("[{number}] {}", result.content);
		let delimiter_tokens = if out.is_empty() { 0 } else { estimate_tokens(CONTEXT_DELIMITER) };
		let block_tokens = estimate_tokens(&block);

		if used_tokens + delimiter_tokens + block_tokens > max_tokens {
			if out.is_empty() {
				continue;
			}

			break;
		}

		if number > sources.len() {
			sources.push(SourceRef {
				number,
				kb_id: result.metadata.kb_id.clone(),
				doc_id: result.metadata.doc_id.clone(),
			});
		}
		if !out.is_empty() {
			out.push_str(CONTEXT_DELIMITER);
		}

		out.push_str(&block);

		used_tokens += delimiter_tokens + block_tokens;
	}

	ContextWithSources { text: out, sources }
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

	fn result(content: &str, score: f32, kb_id: &str, doc_id: &str) -> RetrievalResult {
		RetrievalResult {
			content: content.to_string(),
			score,
			metadata: RecordMetadata {
				tenant_id: "t1".to_string(),
				kb_id: kb_id.to_string(),
				doc_id: doc_id.to_string(),
				product: "AI Factory".to_string(),
				chunk_index: 0,
				content: content.to_string(),
				language: Some("en".to_string()),
			},
		}
	}

	#[test]
	fn context_never_exceeds_the_budget() {
		let results = vec![
			result(&"a".repeat(800), 0.9, "kb", "d1"),
			result(&"b".repeat(800), 0.8, "kb", "d2"),
			result(&"c".repeat(800), 0.7, "kb", "d3"),
		];
		let context = assemble_context(&results, 300);

		assert!(estimate_tokens(&context) <= 300);
		assert!(context.starts_with('a'));
	}

	#[test]
	fn chunks_are_packed_best_score_first() {
		let results = vec![
			result("low score", 0.71, "kb", "d1"),
			result("high score", 0.95, "kb", "d2"),
		];
		let context = assemble_context(&results, 500);

		assert!(context.starts_with("high score"));
		assert!(context.contains("low score"));
	}

	#[test]
	fn oversized_first_chunk_is_truncated_when_useful() {
		let results = vec![result(&"x".repeat(2_000), 0.9, "kb", "d1")];
		let context = assemble_context(&results, 100);

		assert!(!context.is_empty());
		assert!(estimate_tokens(&context) <= 100);
	}

	#[test]
	fn useless_truncation_is_dropped() {
		let results = vec![result(&"x".repeat(2_000), 0.9, "kb", "d1")];
		let context = assemble_context(&results, 10);

		assert!(context.is_empty());
	}

	#[test]
	fn sources_deduplicate_by_kb_and_doc() {
		let results = vec![
			result("first chunk", 0.9, "kb", "doc-a"),
			result("second chunk", 0.85, "kb", "doc-a"),
			result("third chunk", 0.8, "kb", "doc-b"),
		];
		let assembled = assemble_context_with_sources(&results, 500);

		assert_eq!(assembled.sources.len(), 2);
		assert_eq!(assembled.sources[0].doc_id, "doc-a");
		assert_eq!(assembled.sources[0].number, 1);
		assert_eq!(assembled.sources[1].doc_id, "doc-b");
		assert_eq!(assembled.sources[1].number, 2);
		assert!(assembled.text.contains("[1] first chunk"));
		assert!(assembled.text.contains("[1] second chunk"));
		assert!(assembled.text.contains("[2] third chunk"));
	}
}
