mod engine;
mod error;
mod index;
mod ingest;

pub mod qdrant;

pub use engine::{
	ContextWithSources, PROBE_MIN_SCORE, RetrievalEngine, RetrievalOptions, RetrievalResult,
	SourceRef, assemble_context, assemble_context_with_sources,
};
pub use error::{Error, Result};
pub use index::{
	DeleteFilter, QueryFilter, QueryParams, RecordMetadata, ScoredMatch, VectorIndex, VectorRecord,
};
pub use ingest::{IngestReport, IngestRequest};

use std::{future::Future, pin::Pin, sync::Arc};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe embedding seam. The HTTP-backed implementation lives below;
/// tests substitute deterministic doubles.
pub trait Embedder
where
	Self: Send + Sync,
{
	fn embed<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

/// Production embedder: wraps the batched HTTP client, discarding per-item
/// bookkeeping the engine does not need.
pub struct HttpEmbedder {
	client: desk_providers::EmbeddingClient,
}
impl HttpEmbedder {
	pub fn new(client: desk_providers::EmbeddingClient) -> Arc<Self> {
		Arc::new(Self { client })
	}
}
impl Embedder for HttpEmbedder {
	fn embed<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			let results = self.client.embed_batch(texts, None).await?;

			Ok(results.into_iter().map(|result| result.embedding).collect())
		})
	}
}
