//! Error handling for the ground station engine
//!
//! This module defines the error taxonomy used by every component:
//!
//! - [`ParseError`] - a single malformed line or row; recorded and skipped
//! - [`TelemetryError::SourceOpen`] - the source could not be opened
//! - [`TelemetryError::SourceUnavailable`] - the source went away mid-stream
//! - [`TelemetryError::Config`] - invalid channel set or settings
//!
//! Nothing in the engine panics on bad input; every failure resolves to one
//! of these values and the caller decides what the operator sees.

use serde::Serialize;
use thiserror::Error;

/// Why a raw line or row could not become a record
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ParseErrorKind {
    /// Field count does not match the header or the channel set
    #[error("expected {expected} fields, found {found}")]
    WrongFieldCount { expected: usize, found: usize },

    /// A required field was empty
    #[error("missing required field {0}")]
    MissingField(String),

    /// A required numeric field did not parse as a number
    #[error("field {field} is not numeric: {value:?}")]
    NonNumeric { field: String, value: String },

    /// Bytes were not valid UTF-8
    #[error("line is not valid UTF-8")]
    InvalidEncoding,
}

/// A malformed line or row, identified by its source offset
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("parse error at line {offset}: {kind}")]
pub struct ParseError {
    /// Line (live) or row (replay) number the error came from
    pub offset: u64,
    /// What went wrong
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(offset: u64, kind: ParseErrorKind) -> Self {
        Self { offset, kind }
    }
}

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// File missing, empty or unreadable; port unavailable
    #[error("Failed to open {source_name}: {reason}")]
    SourceOpen { source_name: String, reason: String },

    /// Connection lost after a successful open
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// A malformed record surfaced as an error
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Errors related to configuration loading/validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<TelemetryError>,
    },
}

impl TelemetryError {
    /// Shorthand for a [`TelemetryError::SourceOpen`]
    pub fn source_open(source_name: impl Into<String>, reason: impl ToString) -> Self {
        TelemetryError::SourceOpen {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        TelemetryError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether the source should be considered gone after this error
    pub fn is_source_lost(&self) -> bool {
        match self {
            TelemetryError::SourceUnavailable(_) => true,
            TelemetryError::WithContext { source, .. } => source.is_source_lost(),
            _ => false,
        }
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
