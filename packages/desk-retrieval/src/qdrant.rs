use std::collections::HashMap;

use qdrant_client::{
	Payload,
	qdrant::{
		Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointStruct,
		QueryPointsBuilder, ScoredPoint, UpsertPointsBuilder, Value, VectorParamsBuilder,
		value::Kind,
	},
};
use uuid::Uuid;

use crate::{
	BoxFuture, Error, Result,
	index::{DeleteFilter, QueryParams, RecordMetadata, ScoredMatch, VectorIndex, VectorRecord},
};

pub struct QdrantIndex {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantIndex {
	pub fn new(cfg: &desk_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Explicit connection step: creates the collection when missing so a
	/// misconfigured store fails at startup, not on the first turn.
	pub async fn ensure_collection(&self) -> Result<()> {
		if self.client.collection_exists(&self.collection).await? {
			return Ok(());
		}

		self.client
			.create_collection(
				CreateCollectionBuilder::new(&self.collection)
					.vectors_config(VectorParamsBuilder::new(self.vector_dim as u64, Distance::Cosine)),
			)
			.await?;

		Ok(())
	}

	fn tenant_filter(namespace: &str, extra: Vec<Condition>) -> Filter {
		let mut conditions = vec![Condition::matches("tenant_id", namespace.to_string())];

		conditions.extend(extra);

		Filter::must(conditions)
	}
}

impl VectorIndex for QdrantIndex {
	fn upsert<'a>(
		&'a self,
		namespace: &'a str,
		records: &'a [VectorRecord],
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut points = Vec::with_capacity(records.len());

			for record in records {
				if record.metadata.tenant_id != namespace {
					return Err(Error::InvalidRequest {
						message: "Record tenant does not match the upsert namespace.".to_string(),
					});
				}

				let payload = Payload::try_from(serde_json::json!({
					"tenant_id": record.metadata.tenant_id,
					"kb_id": record.metadata.kb_id,
					"doc_id": record.metadata.doc_id,
					"product": record.metadata.product,
					"chunk_index": record.metadata.chunk_index,
					"content": record.metadata.content,
					"language": record.metadata.language,
				}))
				.map_err(|err| Error::Index { message: format!("Payload conversion failed: {err}.") })?;

				points.push(PointStruct::new(
					record.id.to_string(),
					record.values.clone(),
					payload,
				));
			}

			self.client
				.upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
				.await?;

			Ok(())
		})
	}

	fn query<'a>(
		&'a self,
		namespace: &'a str,
		vector: &'a [f32],
		params: &'a QueryParams,
	) -> BoxFuture<'a, Result<Vec<ScoredMatch>>> {
		Box::pin(async move {
			let mut conditions = Vec::new();

			if let Some(product) = params.filter.product.as_ref() {
				conditions.push(Condition::matches("product", product.clone()));
			}
			if let Some(kb_id) = params.filter.kb_id.as_ref() {
				conditions.push(Condition::matches("kb_id", kb_id.clone()));
			}
			if let Some(language) = params.filter.language.as_ref() {
				conditions.push(Condition::matches("language", language.clone()));
			}

			let response = self
				.client
				.query(
					QueryPointsBuilder::new(&self.collection)
						.query(vector.to_vec())
						.limit(params.top_k as u64)
						.filter(Self::tenant_filter(namespace, conditions))
						.with_payload(true),
				)
				.await?;

			Ok(response.result.iter().filter_map(scored_match).collect())
		})
	}

	fn delete_by_filter<'a>(
		&'a self,
		namespace: &'a str,
		filter: &'a DeleteFilter,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut conditions = Vec::new();

			if let Some(kb_id) = filter.kb_id.as_ref() {
				conditions.push(Condition::matches("kb_id", kb_id.clone()));
			}
			if let Some(doc_id) = filter.doc_id.as_ref() {
				conditions.push(Condition::matches("doc_id", doc_id.clone()));
			}

			self.client
				.delete_points(
					DeletePointsBuilder::new(&self.collection)
						.points(Self::tenant_filter(namespace, conditions))
						.wait(true),
				)
				.await?;

			Ok(())
		})
	}
}

/// Points missing a required payload field are logged and skipped rather than
/// failing the whole query.
fn scored_match(point: &ScoredPoint) -> Option<ScoredMatch> {
	let id = point
		.id
		.as_ref()
		.and_then(|point_id| point_id.point_id_options.as_ref())
		.and_then(|options| match options {
			qdrant_client::qdrant::point_id::PointIdOptions::Uuid(raw) => Uuid::parse_str(raw).ok(),
			qdrant_client::qdrant::point_id::PointIdOptions::Num(_) => None,
		});
	let Some(id) = id else {
		tracing::warn!("Scored point is missing a UUID id.");

		return None;
	};

	let required = |key: &str| -> Option<String> {
		let value = payload_str(&point.payload, key);

		if value.is_none() {
			tracing::warn!(point = %id, key, "Scored point is missing a payload field.");
		}

		value
	};

	Some(ScoredMatch {
		id,
		score: point.score,
		metadata: RecordMetadata {
			tenant_id: required("tenant_id")?,
			kb_id: required("kb_id")?,
			doc_id: required("doc_id")?,
			product: required("product")?,
			chunk_index: payload_u32(&point.payload, "chunk_index").unwrap_or(0),
			content: required("content")?,
			language: payload_str(&point.payload, "language"),
		},
	})
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	payload.get(key).and_then(|value| match value.kind.as_ref() {
		Some(Kind::StringValue(text)) => Some(text.clone()),
		_ => None,
	})
}

fn payload_u32(payload: &HashMap<String, Value>, key: &str) -> Option<u32> {
	payload.get(key).and_then(|value| match value.kind.as_ref() {
		Some(Kind::IntegerValue(number)) => u32::try_from(*number).ok(),
		Some(Kind::DoubleValue(number)) => Some(*number as u32),
		_ => None,
	})
}
