//! Unified error types for the Longan library.
//!
//! Every failure is fatal for the document being processed: there is no
//! internal retry, and a new document has to be opened to try again.
use thiserror::Error;

/// Main error type for Longan operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP archive error
    #[error("ZIP error: {0}")]
    Zip(String),

    /// XML reader or writer error
    #[error("XML error: {0}")]
    Xml(String),

    /// Malformed nesting, mismatched or missing tags
    #[error("Unexpected structure: {0}")]
    UnexpectedStructure(String),

    /// The input is not an acceptable IDML package
    #[error("Bad input: {0}")]
    BadInput(String),

    /// A package part referenced by the design map is absent
    #[error("Missing entry: {0}")]
    MissingEntry(String),

    /// Invalid configuration value
    #[error("{0}")]
    Config(String),

    /// An item references something that does not exist
    #[error("Referential integrity error: {0}")]
    Referential(String),

    /// Processing was cancelled by the caller
    #[error("Processing cancelled")]
    Cancelled,

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for the parser's fatal structure error.
    pub(crate) fn unexpected(context: impl std::fmt::Display) -> Self {
        Error::UnexpectedStructure(context.to_string())
    }
}

/// Result type for Longan operations.
pub type Result<T> = std::result::Result<T, Error>;
