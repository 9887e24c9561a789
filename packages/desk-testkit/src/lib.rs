//! Test doubles for the agent engine: deterministic embedders, in-memory and
//! canned vector indexes, a scripted chat provider, and recording
//! collaborators. Everything here implements the production seams exactly, so
//! tests wire the real agents against fakes with no conditional code paths.

use std::{
	collections::{HashMap, VecDeque},
	sync::{
		Mutex,
		atomic::{AtomicUsize, Ordering},
	},
};

use desk_agents::{
	CaseRecord, CaseStore, CaseUpdate, ChatProvider, Notification, NotificationSink, TimelineEvent,
	VisualSession, VisualSessionRequest, VisualSessionService,
};
use desk_providers::{ChatCompletion, ChatMessage, TokenUsage, ToolInvocation, ToolSpec};
use desk_retrieval::{
	DeleteFilter, Embedder, QueryParams, ScoredMatch, VectorIndex, VectorRecord,
};

/// Deterministic embedder: folds bytes into a fixed number of buckets and
/// normalizes, so identical texts embed identically and similar scores are
/// reproducible.
pub struct FixedEmbedder {
	pub dimensions: usize,
}
impl FixedEmbedder {
	pub fn new(dimensions: usize) -> Self {
		Self { dimensions }
	}

	fn vector(&self, text: &str) -> Vec<f32> {
		let mut vec = vec![0.0_f32; self.dimensions.max(1)];

		let len = vec.len();

		for (i, byte) in text.bytes().enumerate() {
			vec[i % len] += f32::from(byte) / 255.0;
		}

		let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();

		if norm > 0.0 {
			for value in &mut vec {
				*value /= norm;
			}
		}

		vec
	}
}
impl Embedder for FixedEmbedder {
	fn embed<'a>(
		&'a self,
		texts: &'a [String],
	) -> desk_retrieval::BoxFuture<'a, desk_retrieval::Result<Vec<Vec<f32>>>> {
		let vectors = texts.iter().map(|text| self.vector(text)).collect();

		Box::pin(async move { Ok(vectors) })
	}
}

/// Embedder that always fails, for degraded-dependency paths.
pub struct FailingEmbedder;
impl Embedder for FailingEmbedder {
	fn embed<'a>(
		&'a self,
		_texts: &'a [String],
	) -> desk_retrieval::BoxFuture<'a, desk_retrieval::Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			Err(desk_retrieval::Error::Index { message: "embedder down".to_string() })
		})
	}
}

/// Real in-memory vector store with cosine scoring and tenant namespacing.
#[derive(Default)]
pub struct InMemoryVectorIndex {
	records: Mutex<HashMap<String, Vec<VectorRecord>>>,
}
impl InMemoryVectorIndex {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn count(&self, namespace: &str) -> usize {
		self.records
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.get(namespace)
			.map(Vec::len)
			.unwrap_or(0)
	}
}
impl VectorIndex for InMemoryVectorIndex {
	fn upsert<'a>(
		&'a self,
		namespace: &'a str,
		records: &'a [VectorRecord],
	) -> desk_retrieval::BoxFuture<'a, desk_retrieval::Result<()>> {
		Box::pin(async move {
			let mut store = self.records.lock().unwrap_or_else(|err| err.into_inner());
			let existing = store.entry(namespace.to_string()).or_default();

			for record in records {
				existing.retain(|candidate| candidate.id != record.id);
				existing.push(record.clone());
			}

			Ok(())
		})
	}

	fn query<'a>(
		&'a self,
		namespace: &'a str,
		vector: &'a [f32],
		params: &'a QueryParams,
	) -> desk_retrieval::BoxFuture<'a, desk_retrieval::Result<Vec<ScoredMatch>>> {
		Box::pin(async move {
			let store = self.records.lock().unwrap_or_else(|err| err.into_inner());
			let mut matches: Vec<ScoredMatch> = store
				.get(namespace)
				.map(|records| {
					records
						.iter()
						.filter(|record| {
							let filter = &params.filter;

							filter
								.product
								.as_ref()
								.map(|product| &record.metadata.product == product)
								.unwrap_or(true) && filter
								.kb_id
								.as_ref()
								.map(|kb_id| &record.metadata.kb_id == kb_id)
								.unwrap_or(true) && filter
								.language
								.as_ref()
								.map(|language| {
									record.metadata.language.as_ref() == Some(language)
								})
								.unwrap_or(true)
						})
						.filter_map(|record| {
							let score =
								desk_providers::cosine_similarity(vector, &record.values).ok()?;

							Some(ScoredMatch { id: record.id, score, metadata: record.metadata.clone() })
						})
						.collect()
				})
				.unwrap_or_default();

			matches.sort_by(|a, b| b.score.total_cmp(&a.score));
			matches.truncate(params.top_k as usize);

			Ok(matches)
		})
	}

	fn delete_by_filter<'a>(
		&'a self,
		namespace: &'a str,
		filter: &'a DeleteFilter,
	) -> desk_retrieval::BoxFuture<'a, desk_retrieval::Result<()>> {
		Box::pin(async move {
			let mut store = self.records.lock().unwrap_or_else(|err| err.into_inner());

			if let Some(records) = store.get_mut(namespace) {
				records.retain(|record| {
					let kb_hit = filter
						.kb_id
						.as_ref()
						.map(|kb_id| &record.metadata.kb_id == kb_id)
						.unwrap_or(true);
					let doc_hit = filter
						.doc_id
						.as_ref()
						.map(|doc_id| &record.metadata.doc_id == doc_id)
						.unwrap_or(true);

					!(kb_hit && doc_hit)
				});
			}

			Ok(())
		})
	}
}

/// Index double that answers every query with preset matches, regardless of
/// the query vector. Useful for exercising score thresholds precisely.
#[derive(Default)]
pub struct CannedIndex {
	pub matches: Vec<ScoredMatch>,
}
impl CannedIndex {
	pub fn new(matches: Vec<ScoredMatch>) -> Self {
		Self { matches }
	}
}
impl VectorIndex for CannedIndex {
	fn upsert<'a>(
		&'a self,
		_namespace: &'a str,
		_records: &'a [VectorRecord],
	) -> desk_retrieval::BoxFuture<'a, desk_retrieval::Result<()>> {
		Box::pin(async move { Ok(()) })
	}

	fn query<'a>(
		&'a self,
		_namespace: &'a str,
		_vector: &'a [f32],
		params: &'a QueryParams,
	) -> desk_retrieval::BoxFuture<'a, desk_retrieval::Result<Vec<ScoredMatch>>> {
		let mut matches = self.matches.clone();

		matches.truncate(params.top_k as usize);

		Box::pin(async move { Ok(matches) })
	}

	fn delete_by_filter<'a>(
		&'a self,
		_namespace: &'a str,
		_filter: &'a DeleteFilter,
	) -> desk_retrieval::BoxFuture<'a, desk_retrieval::Result<()>> {
		Box::pin(async move { Ok(()) })
	}
}

/// Index double whose queries always fail, for degraded-retrieval paths.
pub struct FailingIndex;
impl VectorIndex for FailingIndex {
	fn upsert<'a>(
		&'a self,
		_namespace: &'a str,
		_records: &'a [VectorRecord],
	) -> desk_retrieval::BoxFuture<'a, desk_retrieval::Result<()>> {
		Box::pin(async move {
			Err(desk_retrieval::Error::Index { message: "index down".to_string() })
		})
	}

	fn query<'a>(
		&'a self,
		_namespace: &'a str,
		_vector: &'a [f32],
		_params: &'a QueryParams,
	) -> desk_retrieval::BoxFuture<'a, desk_retrieval::Result<Vec<ScoredMatch>>> {
		Box::pin(async move {
			Err(desk_retrieval::Error::Index { message: "index down".to_string() })
		})
	}

	fn delete_by_filter<'a>(
		&'a self,
		_namespace: &'a str,
		_filter: &'a DeleteFilter,
	) -> desk_retrieval::BoxFuture<'a, desk_retrieval::Result<()>> {
		Box::pin(async move {
			Err(desk_retrieval::Error::Index { message: "index down".to_string() })
		})
	}
}

/// Scripted chat provider: pops queued completions in order, capturing every
/// prompt it was given.
#[derive(Default)]
pub struct ScriptedChat {
	responses: Mutex<VecDeque<ChatCompletion>>,
	captured: Mutex<Vec<Vec<ChatMessage>>>,
	calls: AtomicUsize,
}
impl ScriptedChat {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push_text(&self, content: &str) {
		self.push(ChatCompletion {
			content: Some(content.to_string()),
			tool_call: None,
			model: "scripted-model".to_string(),
			usage: TokenUsage { prompt_tokens: 10, completion_tokens: 5 },
		});
	}

	pub fn push_tool(&self, name: &str, arguments: serde_json::Value) {
		self.push(ChatCompletion {
			content: None,
			tool_call: Some(ToolInvocation { name: name.to_string(), arguments }),
			model: "scripted-model".to_string(),
			usage: TokenUsage { prompt_tokens: 10, completion_tokens: 5 },
		});
	}

	pub fn push(&self, completion: ChatCompletion) {
		self.responses.lock().unwrap_or_else(|err| err.into_inner()).push_back(completion);
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn captured(&self) -> Vec<Vec<ChatMessage>> {
		self.captured.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl ChatProvider for ScriptedChat {
	fn complete<'a>(
		&'a self,
		messages: &'a [ChatMessage],
		_tools: &'a [ToolSpec],
	) -> desk_agents::BoxFuture<'a, desk_agents::Result<ChatCompletion>> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		self.captured.lock().unwrap_or_else(|err| err.into_inner()).push(messages.to_vec());

		let next = self.responses.lock().unwrap_or_else(|err| err.into_inner()).pop_front();

		Box::pin(async move {
			next.ok_or_else(|| desk_agents::Error::Collaborator {
				message: "ScriptedChat ran out of queued completions.".to_string(),
			})
		})
	}
}

/// Case store that records every call and serves a canned case record.
pub struct RecordingCaseStore {
	pub events: Mutex<Vec<(String, TimelineEvent)>>,
	pub updates: Mutex<Vec<(String, CaseUpdate)>>,
	pub record: CaseRecord,
}
impl RecordingCaseStore {
	pub fn new(record: CaseRecord) -> Self {
		Self { events: Mutex::new(Vec::new()), updates: Mutex::new(Vec::new()), record }
	}

	pub fn event_kinds(&self) -> Vec<String> {
		self.events
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.iter()
			.map(|(_, event)| event.kind.clone())
			.collect()
	}
}
impl CaseStore for RecordingCaseStore {
	fn add_timeline_event<'a>(
		&'a self,
		case_id: &'a str,
		event: TimelineEvent,
	) -> desk_agents::BoxFuture<'a, desk_agents::Result<()>> {
		self.events
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.push((case_id.to_string(), event));

		Box::pin(async move { Ok(()) })
	}

	fn get_case<'a>(
		&'a self,
		_case_id: &'a str,
	) -> desk_agents::BoxFuture<'a, desk_agents::Result<CaseRecord>> {
		let record = self.record.clone();

		Box::pin(async move { Ok(record) })
	}

	fn update_case<'a>(
		&'a self,
		case_id: &'a str,
		update: CaseUpdate,
	) -> desk_agents::BoxFuture<'a, desk_agents::Result<()>> {
		self.updates
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.push((case_id.to_string(), update));

		Box::pin(async move { Ok(()) })
	}
}

/// Visual-session service returning a canned join URL, or failing on demand.
pub struct StubVisualSessions {
	pub fail: bool,
}
impl StubVisualSessions {
	pub fn new() -> Self {
		Self { fail: false }
	}

	pub fn failing() -> Self {
		Self { fail: true }
	}
}
impl Default for StubVisualSessions {
	fn default() -> Self {
		Self::new()
	}
}
impl VisualSessionService for StubVisualSessions {
	fn create_session<'a>(
		&'a self,
		tenant_id: &'a str,
		case_id: &'a str,
		_request: VisualSessionRequest,
	) -> desk_agents::BoxFuture<'a, desk_agents::Result<VisualSession>> {
		let fail = self.fail;
		let session = VisualSession {
			token: format!("vs-{tenant_id}-{case_id}"),
			join_url: format!("https://visual.example.com/join/{tenant_id}/{case_id}"),
		};

		Box::pin(async move {
			if fail {
				return Err(desk_agents::Error::Collaborator {
					message: "visual session service down".to_string(),
				});
			}

			Ok(session)
		})
	}
}

/// Notification sink that records deliveries, or fails every send on demand.
#[derive(Default)]
pub struct RecordingSink {
	pub fail: bool,
	pub notifications: Mutex<Vec<Notification>>,
}
impl RecordingSink {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn failing() -> Self {
		Self { fail: true, notifications: Mutex::new(Vec::new()) }
	}

	pub fn count(&self) -> usize {
		self.notifications.lock().unwrap_or_else(|err| err.into_inner()).len()
	}
}
impl NotificationSink for RecordingSink {
	fn notify<'a>(
		&'a self,
		notification: Notification,
	) -> desk_agents::BoxFuture<'a, desk_agents::Result<()>> {
		let fail = self.fail;

		if !fail {
			self.notifications.lock().unwrap_or_else(|err| err.into_inner()).push(notification);
		}

		Box::pin(async move {
			if fail {
				return Err(desk_agents::Error::Collaborator {
					message: "notification sink down".to_string(),
				});
			}

			Ok(())
		})
	}
}
