//! Error types.
//!
//! Every error carries a stable `error_type()` string. Assertion failures are
//! wrapped in [`Error::Failure`] so callers can tell a failed check apart from a
//! broken setup with [`Error::is_failure`].

use std::path::PathBuf;

use crate::failure::Failure;
use crate::value::TemporalKind;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed source error coming from a persistence backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required setting is missing or invalid.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// The settings file does not exist.
    #[error("settings file not found: {}\nShould be at: {}", .path.display(), .expected_at.display())]
    SettingsNotFound {
        path: PathBuf,
        expected_at: PathBuf,
    },

    /// A named resource (template, data file) could not be loaded.
    #[error("Cannot read file {name}. {hint}")]
    Resource { name: String, hint: &'static str },

    /// The configured driver has no session implementation.
    #[error("unsupported driver: {driver}")]
    UnsupportedDriver { driver: String },

    /// The database could not be opened.
    #[error("Cannot connect to database URL {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: BoxError,
    },

    /// A statement or query failed inside the persistence backend.
    #[error("{context}: {source}")]
    Persistence {
        context: &'static str,
        #[source]
        source: BoxError,
    },

    /// A null was handed to the parameter binder.
    #[error("Setting parameter value to null is not supported{}", column_suffix(.column))]
    UnsupportedParameter { column: Option<String> },

    /// An operation the current dialect or backend cannot perform.
    #[error("unsupported operation: {message}")]
    Unsupported { message: String },

    /// A cell could not be coerced into its temporal type.
    #[error("malformed {kind} value {value:?} in column {column}")]
    MalformedValue {
        column: String,
        value: String,
        kind: TemporalKind,
    },

    /// Tabular or scalar input that does not have the expected shape.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// A document path that cannot be parsed.
    #[error("invalid document path {path:?}: {message}")]
    InvalidPath { path: String, message: String },

    /// A document path that does not resolve for a set.
    #[error("path {path:?} not found in document")]
    PathNotFound { path: String },

    /// A document that is not valid JSON.
    #[error("invalid document {name}: {source}")]
    Document {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// The wait between poll attempts was interrupted.
    #[error("Interrupted while awaiting {awaiting}")]
    Interrupted { awaiting: String },

    /// A verification did not hold.
    #[error(transparent)]
    Failure(#[from] Failure),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

fn column_suffix(column: &Option<String>) -> String {
    match column {
        Some(c) => format!(" (column {c})"),
        None => String::new(),
    }
}

impl Error {
    /// Get the error type as a stable string.
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::SettingsNotFound { .. } => "settings_not_found",
            Error::Resource { .. } => "resource_error",
            Error::UnsupportedDriver { .. } => "unsupported_driver",
            Error::Connection { .. } => "connection_error",
            Error::Persistence { .. } => "persistence_error",
            Error::UnsupportedParameter { .. } => "unsupported_parameter",
            Error::Unsupported { .. } => "unsupported",
            Error::MalformedValue { .. } => "malformed_value",
            Error::InvalidInput { .. } => "invalid_input",
            Error::InvalidPath { .. } => "invalid_path",
            Error::PathNotFound { .. } => "path_not_found",
            Error::Document { .. } => "document_error",
            Error::Interrupted { .. } => "interrupted",
            Error::Failure(f) => f.error_type(),
            Error::Io(_) => "io_error",
            Error::Toml(_) => "toml_error",
        }
    }

    /// Whether this is an assertion failure rather than a setup or input error.
    pub fn is_failure(&self) -> bool {
        matches!(self, Error::Failure(_))
    }

    /// The assertion failure, if this is one.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Error::Failure(f) => Some(f),
            _ => None,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput {
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Error::Unsupported {
            message: message.into(),
        }
    }

    pub fn persistence(
        context: &'static str,
        source: impl Into<BoxError>,
    ) -> Self {
        Error::Persistence {
            context,
            source: source.into(),
        }
    }
}
