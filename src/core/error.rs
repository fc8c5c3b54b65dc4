use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session already active: {0}")]
    SessionAlreadyActive(String),

    #[error("Replay already running for session: {0}")]
    ReplayAlreadyRunning(String),

    #[error("Data corrupted: {0}")]
    DataCorrupted(String),

    #[error("Decompression failed: {0}")]
    DecompressionFailure(String),

    #[error("Ingestion failed{}: {message}", status_suffix(.status))]
    IngestionFailure {
        status: Option<u16>,
        message: String,
    },

    #[error("Storage error: {0}")]
    StorageFailure(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Async task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|code| format!(" (HTTP {code})")).unwrap_or_default()
}

/// Result type alias for recorder operations
pub type Result<T> = std::result::Result<T, RecorderError>;

impl RecorderError {
    /// Creates a new storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::StorageFailure(msg.into())
    }

    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new data corruption error
    pub fn corrupted<S: Into<String>>(msg: S) -> Self {
        Self::DataCorrupted(msg.into())
    }

    /// Creates a new ingestion error
    pub fn ingestion<S: Into<String>>(status: Option<u16>, msg: S) -> Self {
        Self::IngestionFailure {
            status,
            message: msg.into(),
        }
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) | Self::NotFound(_) => "not_found",
            Self::SessionAlreadyActive(_) | Self::ReplayAlreadyRunning(_) => "conflict",
            Self::DataCorrupted(_) => "corruption",
            Self::DecompressionFailure(_) => "compression",
            Self::IngestionFailure { .. } => "network",
            Self::StorageFailure(_) => "storage",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Join(_) => "async",
        }
    }

    /// Maps a missing blob onto a missing session, leaving other errors alone
    pub(crate) fn into_session_not_found(self, session_id: &str) -> Self {
        match self {
            Self::NotFound(_) => Self::SessionNotFound(session_id.to_string()),
            other => other,
        }
    }
}
