use std::{
	fs,
	path::Path,
	sync::{Arc, RwLock},
};

use ahash::AHashMap;

use desk_domain::Severity;

use crate::{Error, Result, types::Playbook, validate};

/// Read-mostly registry of loaded playbooks. Reads take an `Arc` snapshot of
/// the whole map, so a concurrent reload can never expose a partially-updated
/// playbook; reload builds a complete new map and swaps it in one write.
pub struct PlaybookRegistry {
	inner: RwLock<Arc<AHashMap<String, Arc<Playbook>>>>,
}

#[derive(Debug, Clone, Default)]
pub struct MatchCriteria<'a> {
	pub product: Option<&'a str>,
	pub category: Option<&'a str>,
	pub severity: Option<Severity>,
	pub message: &'a str,
}

impl PlaybookRegistry {
	pub fn new(playbooks: Vec<Playbook>) -> Result<Self> {
		let map = build_map(playbooks)?;

		Ok(Self { inner: RwLock::new(Arc::new(map)) })
	}

	pub fn empty() -> Self {
		Self { inner: RwLock::new(Arc::new(AHashMap::new())) }
	}

	/// Loads every `*.json` playbook file in a directory.
	pub fn load_dir(dir: &Path) -> Result<Self> {
		let entries = fs::read_dir(dir)
			.map_err(|err| Error::ReadDir { path: dir.to_path_buf(), source: err })?;
		let mut playbooks = Vec::new();

		for entry in entries {
			let entry =
				entry.map_err(|err| Error::ReadDir { path: dir.to_path_buf(), source: err })?;
			let path = entry.path();

			if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
				continue;
			}

			let raw = fs::read_to_string(&path)
				.map_err(|err| Error::ReadFile { path: path.clone(), source: err })?;
			let playbook: Playbook = serde_json::from_str(&raw)
				.map_err(|err| Error::ParseFile { path: path.clone(), source: err })?;

			playbooks.push(playbook);
		}

		Self::new(playbooks)
	}

	/// Atomic wholesale replacement. Readers holding a pre-reload snapshot keep
	/// a consistent view until they drop it.
	pub fn reload(&self, playbooks: Vec<Playbook>) -> Result<()> {
		let map = Arc::new(build_map(playbooks)?);
		let mut guard = self.inner.write().unwrap_or_else(|err| err.into_inner());

		*guard = map;

		Ok(())
	}

	pub fn get(&self, id: &str) -> Option<Arc<Playbook>> {
		self.snapshot().get(id).cloned()
	}

	pub fn all(&self) -> Vec<Arc<Playbook>> {
		let mut playbooks: Vec<Arc<Playbook>> = self.snapshot().values().cloned().collect();

		playbooks.sort_by(|a, b| a.metadata.id.cmp(&b.metadata.id));

		playbooks
	}

	pub fn len(&self) -> usize {
		self.snapshot().len()
	}

	pub fn is_empty(&self) -> bool {
		self.snapshot().is_empty()
	}

	/// Returns every playbook matching the criteria, ranked by the documented
	/// tie-break: most explicitly matched trigger dimensions first, then
	/// higher keyword overlap, then lexicographic id. A playbook declaring no
	/// trigger dimension at all is unconstrained and ranks last.
	pub fn find(&self, criteria: &MatchCriteria<'_>) -> Vec<Arc<Playbook>> {
		let mut ranked: Vec<(usize, usize, Arc<Playbook>)> = self
			.snapshot()
			.values()
			.filter_map(|playbook| {
				score(playbook, criteria)
					.map(|(dimensions, overlap)| (dimensions, overlap, playbook.clone()))
			})
			.collect();

		ranked.sort_by(|a, b| {
			b.0.cmp(&a.0).then(b.1.cmp(&a.1)).then(a.2.metadata.id.cmp(&b.2.metadata.id))
		});

		ranked.into_iter().map(|(_, _, playbook)| playbook).collect()
	}

	fn snapshot(&self) -> Arc<AHashMap<String, Arc<Playbook>>> {
		self.inner.read().unwrap_or_else(|err| err.into_inner()).clone()
	}
}

fn build_map(playbooks: Vec<Playbook>) -> Result<AHashMap<String, Arc<Playbook>>> {
	let mut map = AHashMap::with_capacity(playbooks.len());

	for playbook in playbooks {
		let warnings = validate::validate(&playbook)?;

		for warning in warnings {
			tracing::warn!(playbook = %playbook.metadata.id, "{warning}");
		}

		let id = playbook.metadata.id.clone();

		if map.insert(id.clone(), Arc::new(playbook)).is_some() {
			return Err(Error::Validation { message: format!("Duplicate playbook id {id}.") });
		}
	}

	Ok(map)
}

/// `None` when a declared dimension rules the playbook out; otherwise the
/// (matched dimension count, keyword overlap count) used for ranking.
fn score(playbook: &Playbook, criteria: &MatchCriteria<'_>) -> Option<(usize, usize)> {
	let triggers = &playbook.triggers;
	let mut dimensions = 0_usize;

	if !triggers.products.is_empty() {
		let product = criteria.product?;

		if !triggers.products.iter().any(|candidate| candidate.eq_ignore_ascii_case(product)) {
			return None;
		}

		dimensions += 1;
	}
	if !triggers.categories.is_empty() {
		let category = criteria.category?;

		if !triggers.categories.iter().any(|candidate| candidate.eq_ignore_ascii_case(category)) {
			return None;
		}

		dimensions += 1;
	}
	if let Some(min_severity) = triggers.severity {
		let severity = criteria.severity?;

		if severity < min_severity {
			return None;
		}

		dimensions += 1;
	}

	let mut overlap = 0_usize;

	if !triggers.keywords.is_empty() {
		let lowered = criteria.message.to_lowercase();
		let words: Vec<&str> = lowered
			.split(|ch: char| !ch.is_alphanumeric())
			.filter(|word| word.len() >= 3)
			.collect();

		for keyword in &triggers.keywords {
			let keyword = keyword.to_lowercase();

			if lowered.contains(&keyword) || words.iter().any(|word| keyword.contains(word)) {
				overlap += 1;
			}
		}

		if overlap == 0 {
			return None;
		}

		dimensions += 1;
	}

	Some((dimensions, overlap))
}
