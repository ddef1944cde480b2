//! Error types for mealscan.
//!
//! Every fallible operation in the crate returns [`Result`]. The `Display`
//! output of each variant is what the CLI shows to the user, so messages are
//! written to be read by someone who just tried to scan a meal.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for mealscan operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// A referenced row does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of row that was looked up (`meal`, `ingredient`, `user`).
        entity: &'static str,
        /// The id that was requested.
        id: i64,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Analysis Errors ===
    /// No API key is configured for the vision service.
    #[error("no API key configured; set api.api_key in the config file or OPENAI_API_KEY")]
    MissingApiKey,

    /// The HTTP request could not be sent or its body could not be read.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The vision service answered with a non-success status.
    #[error("analysis service returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Body or reason returned by the service.
        message: String,
    },

    /// The model answered, but its answer could not be understood.
    #[error("could not read analysis response: {message}")]
    ResponseParse {
        /// Description of what was wrong with the response.
        message: String,
    },

    /// The model understood the photo but refused to produce a meal.
    #[error("meal could not be analyzed: {reason}")]
    AnalysisRejected {
        /// The error string reported by the model.
        reason: String,
    },

    /// The image file is unusable.
    #[error("unsupported image {path}: {message}")]
    UnsupportedImage {
        /// Path to the offending file.
        path: PathBuf,
        /// Why the file was rejected.
        message: String,
    },

    /// The operation was interrupted by the user.
    #[error("operation cancelled")]
    Cancelled,

    // === Input Errors ===
    /// A user-supplied value is out of range or malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for mealscan operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a new invalid input error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a response parse error.
    #[must_use]
    pub fn response_parse(message: impl Into<String>) -> Self {
        Self::ResponseParse {
            message: message.into(),
        }
    }

    /// Create a not-found error for the given entity.
    #[must_use]
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Check if this error means a row was missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error came from talking to the analysis service.
    ///
    /// These are the failures the user can fix by retrying or by fixing
    /// their API settings, as opposed to local storage problems.
    #[must_use]
    pub fn is_analysis_error(&self) -> bool {
        matches!(
            self,
            Self::MissingApiKey
                | Self::Network(_)
                | Self::Api { .. }
                | Self::ResponseParse { .. }
                | Self::AnalysisRejected { .. }
        )
    }
}
