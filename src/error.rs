//! Error types shared by the provider seams and the chat pipeline.

/// Failure of an external collaborator: embedding API, completion API,
/// memory API, or the document store.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("embedding has {actual} dimensions, expected {expected}")]
    Dimension { expected: usize, actual: usize },
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Why a chat turn could not be answered.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The request itself is unusable; no upstream call was made.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("embedding failed: {0}")]
    Embedding(#[source] ProviderError),
    #[error("retrieval failed: {0}")]
    Retrieval(#[source] ProviderError),
    #[error("completion failed: {0}")]
    Completion(#[source] ProviderError),
}
