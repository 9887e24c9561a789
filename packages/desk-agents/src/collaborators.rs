use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use desk_domain::{CaseStatus, Severity};
use desk_providers::{ChatClient, ChatCompletion, ChatMessage, ToolSpec};

use crate::{BoxFuture, Result};

/// Chat-completion seam. The HTTP client below is the production
/// implementation; tests substitute scripted doubles.
pub trait ChatProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		messages: &'a [ChatMessage],
		tools: &'a [ToolSpec],
	) -> BoxFuture<'a, Result<ChatCompletion>>;
}

pub struct HttpChat {
	client: ChatClient,
}
impl HttpChat {
	pub fn new(client: ChatClient) -> Arc<Self> {
		Arc::new(Self { client })
	}
}
impl ChatProvider for HttpChat {
	fn complete<'a>(
		&'a self,
		messages: &'a [ChatMessage],
		tools: &'a [ToolSpec],
	) -> BoxFuture<'a, Result<ChatCompletion>> {
		Box::pin(async move { Ok(self.client.complete(messages, tools).await?) })
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
	pub kind: String,
	pub detail: String,
	#[serde(with = "crate::time_serde")]
	pub at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecord {
	pub case_id: String,
	pub tenant_id: String,
	pub status: CaseStatus,
	pub severity: Option<Severity>,
	pub product: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseUpdate {
	pub status: Option<CaseStatus>,
	pub severity: Option<Severity>,
}

/// Append-only timeline plus status read/update. The status transition table
/// itself is enforced by the store; `desk_domain::can_transition` mirrors it
/// so agents can refuse impossible requests early.
pub trait CaseStore
where
	Self: Send + Sync,
{
	fn add_timeline_event<'a>(
		&'a self,
		case_id: &'a str,
		event: TimelineEvent,
	) -> BoxFuture<'a, Result<()>>;

	fn get_case<'a>(&'a self, case_id: &'a str) -> BoxFuture<'a, Result<CaseRecord>>;

	fn update_case<'a>(
		&'a self,
		case_id: &'a str,
		update: CaseUpdate,
	) -> BoxFuture<'a, Result<()>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
	Screen,
	Camera,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualSessionRequest {
	pub mode: SessionMode,
	pub expiry_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualSession {
	pub token: String,
	pub join_url: String,
}

pub trait VisualSessionService
where
	Self: Send + Sync,
{
	fn create_session<'a>(
		&'a self,
		tenant_id: &'a str,
		case_id: &'a str,
		request: VisualSessionRequest,
	) -> BoxFuture<'a, Result<VisualSession>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
	pub case_id: String,
	pub severity: Severity,
	pub message: String,
}

/// Fire-and-forget sink. Failures are logged by the caller and never abort
/// the owning turn or escalation.
pub trait NotificationSink
where
	Self: Send + Sync,
{
	fn notify<'a>(&'a self, notification: Notification) -> BoxFuture<'a, Result<()>>;
}

#[derive(Clone)]
pub struct Collaborators {
	pub case_store: Arc<dyn CaseStore>,
	pub visual_sessions: Arc<dyn VisualSessionService>,
	pub notifications: Arc<dyn NotificationSink>,
}
