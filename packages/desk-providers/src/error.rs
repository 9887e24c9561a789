pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Provider request failed.")]
	Http(#[from] reqwest::Error),
	#[error("Invalid provider header: {message}")]
	Header { message: String },
	#[error("Vector dimensions differ ({left} vs {right}).")]
	DimensionMismatch { left: usize, right: usize },
	#[error("Malformed provider response: {message}")]
	MalformedResponse { message: String },
}
