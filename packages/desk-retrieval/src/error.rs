pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Provider(#[from] desk_providers::Error),

	#[error(transparent)]
	Qdrant(Box<qdrant_client::QdrantError>),

	#[error("Vector index error: {message}")]
	Index { message: String },

	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
}
impl From<qdrant_client::QdrantError> for Error {
	fn from(err: qdrant_client::QdrantError) -> Self {
		Self::Qdrant(Box::new(err))
	}
}
