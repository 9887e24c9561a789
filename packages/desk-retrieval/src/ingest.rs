use desk_chunking::ChunkingConfig;
use uuid::Uuid;

use crate::{
	Error, Result,
	engine::RetrievalEngine,
	index::{DeleteFilter, RecordMetadata, VectorRecord},
};

#[derive(Debug, Clone)]
pub struct IngestRequest<'a> {
	pub tenant_id: &'a str,
	pub kb_id: &'a str,
	pub doc_id: &'a str,
	pub product: &'a str,
	pub language: Option<&'a str>,
	pub text: &'a str,
}

#[derive(Debug, Clone)]
pub struct IngestReport {
	pub chunks: usize,
	pub language: Option<String>,
}

impl RetrievalEngine {
	/// Chunks a document, embeds every chunk in one ordered batch, and upserts
	/// the vectors under the tenant namespace. Point ids are deterministic
	/// (v5 over tenant/kb/doc/chunk), so re-ingesting a document overwrites
	/// its previous vectors instead of duplicating them.
	pub async fn ingest_document(
		&self,
		request: &IngestRequest<'_>,
		chunking: &ChunkingConfig,
	) -> Result<IngestReport> {
		if request.tenant_id.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "tenant_id must be non-empty.".to_string() });
		}

		let chunks = desk_chunking::chunk(request.text, chunking);

		if chunks.is_empty() {
			return Ok(IngestReport { chunks: 0, language: None });
		}

		let language = request
			.language
			.map(str::to_string)
			.or_else(|| whatlang::detect(request.text).map(|info| info.lang().code().to_string()));
		let texts: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
		let vectors = self.embedder().embed(&texts).await?;

		if vectors.len() != chunks.len() {
			return Err(Error::Index {
				message: format!(
					"Embedder returned {} vectors for {} chunks.",
					vectors.len(),
					chunks.len()
				),
			});
		}

		let records: Vec<VectorRecord> = chunks
			.iter()
			.zip(vectors)
			.map(|(chunk, values)| VectorRecord {
				id: point_id(request.tenant_id, request.kb_id, request.doc_id, chunk.index),
				values,
				metadata: RecordMetadata {
					tenant_id: request.tenant_id.to_string(),
					kb_id: request.kb_id.to_string(),
					doc_id: request.doc_id.to_string(),
					product: request.product.to_string(),
					chunk_index: chunk.index as u32,
					content: chunk.content.clone(),
					language: language.clone(),
				},
			})
			.collect();

		self.index().upsert(request.tenant_id, &records).await?;

		Ok(IngestReport { chunks: records.len(), language })
	}

	pub async fn delete_document(&self, tenant_id: &str, kb_id: &str, doc_id: &str) -> Result<()> {
		let filter =
			DeleteFilter { kb_id: Some(kb_id.to_string()), doc_id: Some(doc_id.to_string()) };

		self.index().delete_by_filter(tenant_id, &filter).await
	}

	pub async fn delete_knowledge_base(&self, tenant_id: &str, kb_id: &str) -> Result<()> {
		let filter = DeleteFilter { kb_id: Some(kb_id.to_string()), doc_id: None };

		self.index().delete_by_filter(tenant_id, &filter).await
	}
}

fn point_id(tenant_id: &str, kb_id: &str, doc_id: &str, chunk_index: usize) -> Uuid {
	let name = format!("{tenant_id}/{kb_id}/{doc_id}/{chunk_index}");

	Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}
