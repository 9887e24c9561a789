use unicode_segmentation::UnicodeSegmentation;

#[derive(Clone, Debug)]
pub struct ChunkingConfig {
	pub max_tokens: u32,
	pub min_tokens: u32,
	pub overlap_tokens: u32,
}
impl Default for ChunkingConfig {
	fn default() -> Self {
		Self { max_tokens: 500, min_tokens: 100, overlap_tokens: 50 }
	}
}

/// One retrieval unit cut from a document. Offsets are byte positions in the
/// normalized section text the chunk was cut from.
#[derive(Clone, Debug)]
pub struct Chunk {
	pub content: String,
	pub index: usize,
	pub start_char: usize,
	pub end_char: usize,
	pub token_estimate: u32,
}

/// The provider-agnostic token estimate used across the engine: one token per
/// four characters, rounded up.
pub fn estimate_tokens(text: &str) -> u32 {
	(text.chars().count() as u32).div_ceil(4)
}

/// Splits a document into overlapping, size-bounded chunks. Markdown-style
/// headers open a new section so a chunk never straddles a topic boundary;
/// within a section, paragraphs accumulate until the budget would overflow,
/// and each flush seeds the next buffer with an overlap tail for retrieval
/// continuity. Empty and whitespace-only input yields no chunks.
pub fn chunk(text: &str, cfg: &ChunkingConfig) -> Vec<Chunk> {
	let normalized = normalize_whitespace(text);

	if normalized.trim().is_empty() {
		return Vec::new();
	}

	let mut chunks = Vec::new();

	for section in split_sections(&normalized) {
		let mut section_chunks = chunk_section(&section, cfg);

		merge_trailing_fragment(&mut section_chunks, cfg);
		chunks.append(&mut section_chunks);
	}

	for (index, chunk) in chunks.iter_mut().enumerate() {
		chunk.index = index;
	}

	chunks
}

fn normalize_whitespace(text: &str) -> String {
	let unified = text.replace("\r\n", "\n").replace('\r', "\n");
	let mut out = String::with_capacity(unified.len());
	let mut blank_run = 0_usize;

	for line in unified.split('\n') {
		let line = line.trim_end();

		if line.is_empty() {
			blank_run += 1;

			if blank_run > 1 {
				continue;
			}
		} else {
			blank_run = 0;
		}
		if !out.is_empty() {
			out.push('\n');
		}

		out.push_str(line);
	}

	out
}

fn split_sections(text: &str) -> Vec<String> {
	if !text.lines().any(is_header_line) {
		return vec![text.to_string()];
	}

	let mut sections = Vec::new();
	let mut current = String::new();

	for line in text.lines() {
		if is_header_line(line) && !current.trim().is_empty() {
			sections.push(std::mem::take(&mut current));
		}
		if !current.is_empty() {
			current.push('\n');
		}

		current.push_str(line);
	}

	if !current.trim().is_empty() {
		sections.push(current);
	}

	sections
}

fn is_header_line(line: &str) -> bool {
	let trimmed = line.trim_start();

	trimmed.starts_with('#') && trimmed.trim_start_matches('#').starts_with(' ')
}

fn chunk_section(section: &str, cfg: &ChunkingConfig) -> Vec<Chunk> {
	let mut chunks = Vec::new();
	let mut buffer = String::new();
	let mut buffer_start = 0_usize;
	let mut buffer_end = 0_usize;
	// True while the buffer holds nothing but an overlap tail; such a buffer
	// must never be flushed as a chunk of its own.
	let mut buffer_is_overlap_only = false;

	for (offset, paragraph) in paragraphs(section) {
		let paragraph_tokens = estimate_tokens(paragraph);

		if paragraph_tokens > cfg.max_tokens {
			if !buffer.trim().is_empty() && !buffer_is_overlap_only {
				push_chunk(&mut chunks, &buffer, buffer_start, buffer_end);
			}

			buffer.clear();

			let mut split = split_large_paragraph(paragraph, offset, cfg);

			chunks.append(&mut split);

			if let Some(last) = chunks.last() {
				let overlap = overlap_tail(&last.content, cfg.overlap_tokens);

				buffer_start = last.end_char.saturating_sub(overlap.len());
				buffer_end = last.end_char;
				buffer = overlap;
				buffer_is_overlap_only = true;
			}

			continue;
		}

		let separator_tokens = if buffer.is_empty() { 0 } else { 1 };
		let candidate_tokens = estimate_tokens(&buffer) + separator_tokens + paragraph_tokens;

		if candidate_tokens > cfg.max_tokens && !buffer.trim().is_empty() {
			if buffer_is_overlap_only {
				// Overlap alone never justifies a chunk; drop it to make room.
				buffer.clear();
			} else {
				push_chunk(&mut chunks, &buffer, buffer_start, buffer_end);

				let overlap = overlap_tail(&buffer, cfg.overlap_tokens);

				buffer_start = buffer_end.saturating_sub(overlap.len());
				buffer = overlap;
			}
		}
		if buffer.is_empty() {
			buffer_start = offset;
		} else {
			buffer.push_str("\n\n");
		}

		buffer.push_str(paragraph);

		buffer_end = offset + paragraph.len();
		buffer_is_overlap_only = false;
	}

	if !buffer.trim().is_empty() && !buffer_is_overlap_only {
		push_chunk(&mut chunks, &buffer, buffer_start, buffer_end);
	}

	chunks
}

fn paragraphs(section: &str) -> Vec<(usize, &str)> {
	let mut out = Vec::new();
	let mut cursor = 0_usize;

	for part in section.split("\n\n") {
		let trimmed = part.trim();

		if !trimmed.is_empty() {
			let lead = part.len() - part.trim_start().len();

			out.push((cursor + lead, part.trim_start().trim_end()));
		}

		cursor += part.len() + 2;
	}

	out
}

/// A single paragraph over the budget is cut at sentence boundaries with the
/// same overlap rule. A lone sentence longer than the budget becomes its own
/// oversized chunk rather than being cut mid-sentence.
fn split_large_paragraph(paragraph: &str, base_offset: usize, cfg: &ChunkingConfig) -> Vec<Chunk> {
	let mut chunks = Vec::new();
	let mut current = String::new();
	let mut current_start = 0_usize;
	let mut last_end = 0_usize;

	for (idx, sentence) in paragraph.split_sentence_bound_indices() {
		let candidate_tokens = estimate_tokens(&current) + estimate_tokens(sentence);

		if candidate_tokens > cfg.max_tokens && !current.trim().is_empty() {
			push_chunk(&mut chunks, &current, base_offset + current_start, base_offset + last_end);

			let overlap = overlap_tail(&current, cfg.overlap_tokens);

			current_start = last_end.saturating_sub(overlap.len());
			current = overlap;
		}
		if current.is_empty() {
			current_start = idx;
		}

		current.push_str(sentence);

		last_end = idx + sentence.len();
	}

	if !current.trim().is_empty() {
		push_chunk(&mut chunks, &current, base_offset + current_start, base_offset + last_end);
	}

	chunks
}

/// The tail of the previous buffer carried into the next one. Whole trailing
/// sentences are preferred; when even the last sentence is longer than the
/// overlap budget, the cut falls back to a hard character boundary.
fn overlap_tail(text: &str, overlap_tokens: u32) -> String {
	if overlap_tokens == 0 {
		return String::new();
	}

	let budget_chars = overlap_tokens as usize * 4;

	if text.chars().count() <= budget_chars {
		return text.to_string();
	}

	let mut tail_start = None;

	for (idx, _) in text.split_sentence_bound_indices() {
		if text[idx..].chars().count() <= budget_chars {
			tail_start = Some(idx);

			break;
		}
	}

	match tail_start {
		Some(idx) if idx < text.len() => text[idx..].to_string(),
		_ => {
			let skip = text.chars().count() - budget_chars;

			text.chars().skip(skip).collect()
		},
	}
}

fn push_chunk(chunks: &mut Vec<Chunk>, content: &str, start_char: usize, end_char: usize) {
	let content = content.trim().to_string();
	let token_estimate = estimate_tokens(&content);

	chunks.push(Chunk { content, index: 0, start_char, end_char, token_estimate });
}

/// A trailing fragment below `min_tokens` folds into its predecessor instead
/// of standing alone, unless it is the section's only chunk.
fn merge_trailing_fragment(chunks: &mut Vec<Chunk>, cfg: &ChunkingConfig) {
	if chunks.len() < 2 {
		return;
	}
	if chunks[chunks.len() - 1].token_estimate >= cfg.min_tokens {
		return;
	}

	let Some(last) = chunks.pop() else {
		return;
	};
	let Some(previous) = chunks.last_mut() else {
		chunks.push(last);

		return;
	};

	previous.content.push_str("\n\n");
	previous.content.push_str(&last.content);

	previous.end_char = last.end_char;
	previous.token_estimate = estimate_tokens(&previous.content);
}
