use thiserror::Error;

/// Explorer error types
#[derive(Error, Debug)]
pub enum ExplorerError {
    /// Configuration errors (unknown filter key, bad filter value, bad settings)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A direct lookup matched no document
    #[error("Document not found: {0}")]
    NotFound(String),

    /// The selection spans more than one value of fields that must agree
    #[error("Conflicting values for field(s): {}", fields.join(", "))]
    Conflict { fields: Vec<String> },

    /// The selection contains documents that cannot take part in an aggregation
    #[error("Composition error: {0}")]
    Composition(String),

    /// The caller has no permissions for the requested asset
    #[error("No permissions for asset: {0}")]
    PermissionDenied(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Non-success response from the backend
    #[error("Backend returned status {status}: {body}")]
    Http { status: u16, body: String },

    /// Connection and other transport failures
    #[error("Transport error: {0}")]
    Transport(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The backend answered with an unexpected document shape
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Multi-file aggregation payload could not be unpacked
    #[error("Archive error: {0}")]
    Archive(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExplorerError {
    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            ExplorerError::Configuration(_) => "CONFIGURATION_ERROR",
            ExplorerError::NotFound(_) => "NOT_FOUND",
            ExplorerError::Conflict { .. } => "CONFLICT",
            ExplorerError::Composition(_) => "COMPOSITION_ERROR",
            ExplorerError::PermissionDenied(_) => "PERMISSION_DENIED",
            ExplorerError::Timeout(_) => "TIMEOUT",
            ExplorerError::Http { .. } => "HTTP_ERROR",
            ExplorerError::Transport(_) => "TRANSPORT_ERROR",
            ExplorerError::Serialization(_) => "SERIALIZATION_ERROR",
            ExplorerError::Protocol(_) => "PROTOCOL_ERROR",
            ExplorerError::Archive(_) => "ARCHIVE_ERROR",
            ExplorerError::Io(_) => "IO_ERROR",
        }
    }

    /// Whether a caller may reasonably retry the failed operation.
    ///
    /// The explorer itself never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExplorerError::Timeout(_) => true,
            ExplorerError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn protocol(what: impl std::fmt::Display) -> Self {
        ExplorerError::Protocol(format!("missing or malformed {}", what))
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for ExplorerError {
    fn from(err: serde_json::Error) -> Self {
        ExplorerError::Serialization(err.to_string())
    }
}

/// Conversion from reqwest::Error
impl From<reqwest::Error> for ExplorerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExplorerError::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            ExplorerError::Http {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            ExplorerError::Transport(err.to_string())
        }
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for ExplorerError {
    fn from(err: config::ConfigError) -> Self {
        ExplorerError::Configuration(err.to_string())
    }
}

/// Conversion from zip::result::ZipError
impl From<zip::result::ZipError> for ExplorerError {
    fn from(err: zip::result::ZipError) -> Self {
        ExplorerError::Archive(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ExplorerError>;
