use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("secrets file is not a json object: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid setting {key}: {details}")]
    InvalidValue { key: String, details: String },
}

#[derive(Debug, Error)]
pub enum IngestError {
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
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("manifest error: {0}")]
    Manifest(#[from] rusqlite::Error),

    #[error("store request failed: {0}")]
    Request(String),

    #[error("manifest clock behind requested time: now {now} < {time_at_least}")]
    ClockSkew { now: f64, time_at_least: f64 },
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("{provider} returned {status}: {body}")]
    Response {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("token stream failed: {0}")]
    Stream(String),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("embedding failed: {0}")]
    Embedding(#[from] ProviderError),

    #[error("embedding count {embeddings} doesn't match chunk count {chunks}")]
    EmbeddingCount { chunks: usize, embeddings: usize },
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("prompt variable missing: {0}")]
    MissingVariable(String),

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] StoreError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frontend closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Frontend(#[from] FrontendError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no files uploaded after {attempts} attempt(s)")]
    UploadTimedOut { attempts: u32 },

    #[error("upload rejected: {0}")]
    UploadRejected(String),

    #[error("session is not ready (phase {0})")]
    NotReady(String),
}
