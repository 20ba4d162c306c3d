//! Error types for RAGbot

use thiserror::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the RAGbot system
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Index build error: {0}")]
    IndexBuild(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Document loader error: {0}")]
    DocumentLoader(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<String>,
    },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Whether this error came from the language model exchange.
    pub fn is_agent_error(&self) -> bool {
        matches!(
            self,
            Error::Authentication(_)
                | Error::Service(_)
                | Error::RateLimit { .. }
                | Error::MalformedResponse(_)
        )
    }

    /// Whether this error must stop the process at startup.
    ///
    /// A rejected credential is fatal too: no turn could succeed with it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_) | Error::IndexBuild(_) | Error::Authentication(_)
        )
    }

    /// Re-tag a failure that happened while building the index.
    ///
    /// Configuration problems keep their kind so the user sees which
    /// setting is wrong.
    pub fn into_index_build(self) -> Self {
        match self {
            Error::Configuration(_) | Error::IndexBuild(_) => self,
            other => Error::IndexBuild(other.to_string()),
        }
    }

    /// Re-tag a failure that happened while answering a query.
    pub fn into_retrieval(self) -> Self {
        match self {
            Error::Retrieval(_) => self,
            other => Error::Retrieval(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}
