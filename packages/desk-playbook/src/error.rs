pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{message}")]
	Validation { message: String },
	#[error("Failed to read playbook directory at {path:?}.")]
	ReadDir { path: std::path::PathBuf, source: std::io::Error },
	#[error("Failed to read playbook file at {path:?}.")]
	ReadFile { path: std::path::PathBuf, source: std::io::Error },
	#[error("Failed to parse playbook file at {path:?}.")]
	ParseFile { path: std::path::PathBuf, source: serde_json::Error },
}
