use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("no usable text: {0}")]
    EmptyContent(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("vector store failed: {0}")]
    Store(#[from] StoreError),
}

impl IngestError {
    /// True for failures raised while computing embeddings or writing to the
    /// vector store, as opposed to input problems caught before any side effect.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, Self::Embedding(_) | Self::Store(_))
    }
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding endpoint {endpoint} returned {status}")]
    Status { endpoint: String, status: String },

    #[error("malformed embedding response: {0}")]
    Response(String),

    #[error("embedding endpoint not configured: {0}")]
    NotConfigured(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record {id} already exists in {collection}")]
    Duplicate { collection: String, id: String },

    #[error("store request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("image source not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot decode image {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("vector store failed: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("vector store failed: {0}")]
    Store(#[from] StoreError),

    #[error("record {id} has unexpected metadata: {source}")]
    Metadata {
        id: String,
        source: serde_json::Error,
    },
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
