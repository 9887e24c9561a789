pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Provider(#[from] desk_providers::Error),

	#[error(transparent)]
	Retrieval(#[from] desk_retrieval::Error),

	#[error(transparent)]
	Playbook(#[from] desk_playbook::Error),

	#[error("Collaborator error: {message}")]
	Collaborator { message: String },

	#[error("Unknown tool {name}.")]
	UnknownTool { name: String },

	#[error("Malformed arguments for tool {name}.")]
	ToolArguments { name: String },

	#[error("Invalid turn context: {message}")]
	InvalidContext { message: String },
}
