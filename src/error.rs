//! The single error surface of the crate.
//!
//! Every failure mode funnels into [`ReadError`]: configuration mistakes are
//! raised before any I/O, tokenizer and structural failures carry the record
//! number they occurred on, and type-guess failures explain how to retry.

use thiserror::Error;

/// Convenience result type used throughout gridiron.
pub type Result<T> = std::result::Result<T, ReadError>;

/// Canonical error enumeration for every way a read can fail.
#[derive(Debug, Error)]
pub enum ReadError {
    /// Invalid delimiter/quote/trim/skip/chunksize combination. Raised during
    /// validation, before any byte is read.
    #[error("invalid reader configuration: {0}")]
    Config(String),

    /// The tokenizer reached an illegal byte transition.
    #[error("parse error at line {line}: {message}")]
    Parse { line: u64, message: String },

    /// A data row's column count disagrees with the header.
    #[error("line {line} has {found} column(s) while {expected} were expected")]
    Structure {
        line: u64,
        expected: usize,
        found: usize,
    },

    /// A later chunk contradicted the type inferred from the first chunk.
    #[error(
        "type guess for column '{column}' failed: {message}; \
         increase chunksize or set chunksize to 0 to scan the whole input at once"
    )]
    TypeGuess { column: String, message: String },

    /// A required external tool (e.g. the URL downloader) is unavailable.
    #[error("environment error: {0}")]
    Environment(String),

    /// Failure in the underlying stream.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReadError {
    pub(crate) fn parse(line: u64, message: impl Into<String>) -> Self {
        ReadError::Parse {
            line,
            message: message.into(),
        }
    }
}
