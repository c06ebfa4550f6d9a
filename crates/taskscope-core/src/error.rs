//! Error types for taskscope-core.

use thiserror::Error;

/// Result type alias using taskscope-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for taskscope operations
#[derive(Error, Debug)]
pub enum Error {
    // Document errors
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Corrupt document {filename}: {reason}")]
    CorruptDocument { filename: String, reason: String },

    #[error("Document contains no text: {0}")]
    EmptyDocument(String),

    // Provider errors
    #[error("LLM provider rejected credentials: {0}")]
    ProviderAuth(String),

    #[error("LLM provider rate limit exceeded")]
    ProviderRateLimited,

    #[error("LLM provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    // Cache errors (never surfaced past ResponseCache)
    #[error("Cache error: {0}")]
    Cache(String),

    // Lookup errors
    #[error("Workshop not found: {0}")]
    WorkshopNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    // Run errors
    #[error("Workshop {0} has no files to analyze")]
    NoFiles(String),

    #[error("No text could be extracted from any file in workshop {0}")]
    NoExtractableText(String),

    #[error("Analysis already running for workshop {0}")]
    AnalysisInProgress(String),

    #[error("Analysis cancelled for workshop {0}")]
    Cancelled(String),

    #[error("Invalid workshop transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    // Upload errors
    #[error("Upload rejected: {0}")]
    UploadRejected(String),

    #[error("Upload too large: {size} bytes exceeds limit of {limit} bytes")]
    UploadTooLarge { size: u64, limit: u64 },

    // Config errors
    #[error("Invalid configuration: {0}")]
    Config(String),

    // Auth errors
    #[error("Invalid token")]
    InvalidToken,

    // Database errors
    #[cfg(feature = "db")]
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Lock poisoned")]
    LockPoisoned,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a corrupt-document error
    pub fn corrupt(filename: impl Into<String>, reason: impl ToString) -> Self {
        Self::CorruptDocument {
            filename: filename.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid-transition error
    pub fn transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Errors raised by the LLM provider. These must reach the caller.
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            Self::ProviderAuth(_) | Self::ProviderRateLimited | Self::ProviderUnavailable(_)
        )
    }

    /// Errors confined to a single file; the workshop run continues past them.
    pub fn is_file_scoped(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat(_)
                | Self::CorruptDocument { .. }
                | Self::EmptyDocument(_)
                | Self::MalformedResponse(_)
        ) || self.is_provider_error()
    }

    /// Whether the error means the caller referenced something that doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::WorkshopNotFound(_) | Self::FileNotFound(_))
    }

    /// Stable machine-readable code, used on the wire
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            Self::CorruptDocument { .. } => "CORRUPT_DOCUMENT",
            Self::EmptyDocument(_) => "EMPTY_DOCUMENT",
            Self::ProviderAuth(_) => "PROVIDER_AUTH",
            Self::ProviderRateLimited => "PROVIDER_RATE_LIMITED",
            Self::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            Self::MalformedResponse(_) => "MALFORMED_RESPONSE",
            Self::Cache(_) => "CACHE_ERROR",
            Self::WorkshopNotFound(_) => "WORKSHOP_NOT_FOUND",
            Self::FileNotFound(_) => "FILE_NOT_FOUND",
            Self::NoFiles(_) => "NO_FILES",
            Self::NoExtractableText(_) => "NO_EXTRACTABLE_TEXT",
            Self::AnalysisInProgress(_) => "ANALYSIS_IN_PROGRESS",
            Self::Cancelled(_) => "CANCELLED",
            Self::InvalidStateTransition { .. } => "INVALID_STATE",
            Self::UploadRejected(_) => "UPLOAD_REJECTED",
            Self::UploadTooLarge { .. } => "UPLOAD_TOO_LARGE",
            Self::Config(_) => "INVALID_CONFIG",
            Self::InvalidToken => "INVALID_TOKEN",
            #[cfg(feature = "db")]
            Self::Database(_) => "DATABASE_ERROR",
            Self::LockPoisoned => "LOCK_POISONED",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Other(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
