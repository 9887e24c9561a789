use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{BoxFuture, Result};

/// Payload stored alongside each vector. Owned by the knowledge base: deleting
/// a document or KB deletes every record carrying its ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMetadata {
	pub tenant_id: String,
	pub kb_id: String,
	pub doc_id: String,
	pub product: String,
	pub chunk_index: u32,
	pub content: String,
	pub language: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VectorRecord {
	pub id: Uuid,
	pub values: Vec<f32>,
	pub metadata: RecordMetadata,
}

#[derive(Debug, Clone)]
pub struct ScoredMatch {
	pub id: Uuid,
	pub score: f32,
	pub metadata: RecordMetadata,
}

/// Optional equality filters applied inside the index query.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
	pub product: Option<String>,
	pub kb_id: Option<String>,
	pub language: Option<String>,
}

#[derive(Debug, Clone)]
pub struct QueryParams {
	pub top_k: u32,
	pub filter: QueryFilter,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteFilter {
	pub kb_id: Option<String>,
	pub doc_id: Option<String>,
}

/// The narrow collaborator interface over the vector store. `namespace` is the
/// tenant id; implementations must scope every operation to it — cross-tenant
/// visibility is a contract violation, not a tuning knob.
pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn upsert<'a>(
		&'a self,
		namespace: &'a str,
		records: &'a [VectorRecord],
	) -> BoxFuture<'a, Result<()>>;

	fn query<'a>(
		&'a self,
		namespace: &'a str,
		vector: &'a [f32],
		params: &'a QueryParams,
	) -> BoxFuture<'a, Result<Vec<ScoredMatch>>>;

	fn delete_by_filter<'a>(
		&'a self,
		namespace: &'a str,
		filter: &'a DeleteFilter,
	) -> BoxFuture<'a, Result<()>>;
}
