pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Search failed: {message}")]
	Engine { message: String },
	#[error("Error processing CSV: {message}")]
	Ingest { message: String },
	#[error("Internal error: {message}")]
	Internal { message: String },
}
impl Error {
	pub fn invalid(message: impl Into<String>) -> Self {
		Self::InvalidRequest { message: message.into() }
	}

	/// Message without the category prefix, as shown to HTTP clients.
	pub fn message(&self) -> &str {
		match self {
			Self::InvalidRequest { message }
			| Self::NotFound { message }
			| Self::Engine { message }
			| Self::Ingest { message }
			| Self::Internal { message } => message,
		}
	}
}

impl From<nearby_storage::Error> for Error {
	fn from(err: nearby_storage::Error) -> Self {
		match err {
			nearby_storage::Error::Engine(message) => Self::Engine { message },
			nearby_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			nearby_storage::Error::NotFound(message) => Self::NotFound { message },
			err @ nearby_storage::Error::Csv { .. } => Self::Ingest { message: err.to_string() },
			err @ (nearby_storage::Error::Io { .. } | nearby_storage::Error::Json { .. }) =>
				Self::Internal { message: err.to_string() },
		}
	}
}

impl From<tokio::task::JoinError> for Error {
	fn from(err: tokio::task::JoinError) -> Self {
		Self::Internal { message: format!("Background worker failed: {err}.") }
	}
}
