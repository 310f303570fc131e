//! Error types for LDraw parsing, linking and archive decoding
//!
//! Every fatal error carries an error code and, where it applies, the name of
//! the operation that failed so a caller can tell which stage aborted.
//! Recoverable conditions (unresolved references, duplicate submodels, catalog
//! hash collisions) are never reported through this type: they are logged with
//! `tracing` and the operation continues.
//!
//! # Error Codes
//!
//! Error codes follow the pattern: `E<category><number>`
//!
//! Categories:
//! - **E1xxx**: I/O and stream errors
//! - **E2xxx**: Binary archive errors
//! - **E3xxx**: Model structure and text grammar errors
//! - **E4xxx**: Part library and unsupported features
//!
//! ## Common Error Codes
//!
//! - `E1001`: I/O error
//! - `E1002`: Stream could not be opened
//! - `E2001`: Bit read past the end of an archive
//! - `E2002`: Malformed archive container or catalog
//! - `E2003`: Value does not fit a fixed archive field
//! - `E3001`: Cyclic reference between models
//! - `E3002`: Numeric parse error
//! - `E4001`: Part library directory structure not found
//! - `E4002`: Unsupported feature

use std::io;
use thiserror::Error;

/// Result type for LDraw operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading, linking or exporting LDraw models
#[derive(Error, Debug)]
pub enum Error {
    /// IO error occurred while reading or writing a stream
    ///
    /// **Error Code**: E1001
    #[error("[E1001] I/O error: {0}")]
    Io(#[from] io::Error),

    /// A requested stream could not be opened
    ///
    /// **Error Code**: E1002
    ///
    /// **Common Causes**:
    /// - The file was indexed by the part library but has since been removed
    /// - Insufficient permissions
    #[error("[E1002] {operation}: could not open stream for reading: {name}")]
    StreamOpen {
        /// Operation that requested the stream
        operation: &'static str,
        /// Name or path of the stream
        name: String,
    },

    /// A bit read went past the end of the backing buffer
    ///
    /// **Error Code**: E2001
    ///
    /// This always indicates a corrupted or truncated archive.
    #[error(
        "[E2001] {operation}: bit read out of range (offset {offset}, {bits} bits, buffer holds {len} bits)"
    )]
    BitRange {
        /// Operation that performed the read
        operation: &'static str,
        /// Bit offset of the read
        offset: usize,
        /// Number of bits requested
        bits: u32,
        /// Size of the buffer in bits
        len: usize,
    },

    /// Archive container or catalog is malformed
    ///
    /// **Error Code**: E2002
    ///
    /// **Common Causes**:
    /// - Wrong magic bytes or version
    /// - Truncated catalog
    /// - Record with an unknown line-type tag
    #[error("[E2002] {operation}: invalid archive: {message}")]
    InvalidArchive {
        /// Operation that detected the problem
        operation: &'static str,
        /// Description of the problem
        message: String,
    },

    /// A value cannot be encoded in its fixed-width archive field
    ///
    /// **Error Code**: E2003
    #[error("[E2003] {operation}: archive limit exceeded: {message}")]
    ArchiveLimit {
        /// Operation that tried to encode the value
        operation: &'static str,
        /// Description of the value and the limit
        message: String,
    },

    /// The model graph contains a reference cycle
    ///
    /// **Error Code**: E3001
    ///
    /// **Suggestions**:
    /// - The file is most likely corrupted; inspect the reported chain of submodels
    #[error("[E3001] {operation}: cyclic reference detected: {path}")]
    CyclicReference {
        /// Operation that ran the check
        operation: &'static str,
        /// Cycle rendered as `a → b → a`
        path: String,
    },

    /// Parse error for numeric values
    ///
    /// **Error Code**: E3002
    ///
    /// **Suggestions**:
    /// - Verify numeric values use proper format (e.g., "1.5" not "1,5")
    #[error("[E3002] Parse error: {0}")]
    ParseError(String),

    /// The part library directory structure could not be found
    ///
    /// **Error Code**: E4001
    ///
    /// **Suggestions**:
    /// - Install an LDraw part library and point `LDRAWDIR` at it
    /// - Provide a compressed archive as a fallback
    #[error("[E4001] {operation}: part library not found: {message}")]
    LibraryNotFound {
        /// Operation that looked for the library
        operation: &'static str,
        /// Description of what was missing
        message: String,
    },

    /// Unsupported feature
    ///
    /// **Error Code**: E4002
    #[error("[E4002] Unsupported feature: {0}")]
    Unsupported(String),
}

impl From<std::num::ParseFloatError> for Error {
    fn from(err: std::num::ParseFloatError) -> Self {
        Error::ParseError(format!("Failed to parse floating-point number: {}", err))
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Self {
        Error::ParseError(format!("Failed to parse integer: {}", err))
    }
}

impl Error {
    /// Create a StreamOpen error
    pub fn stream_open(operation: &'static str, name: impl Into<String>) -> Self {
        Error::StreamOpen {
            operation,
            name: name.into(),
        }
    }

    /// Create an InvalidArchive error
    pub fn invalid_archive(operation: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidArchive {
            operation,
            message: message.into(),
        }
    }

    /// Create a CyclicReference error from the names along the cycle
    ///
    /// # Example
    /// ```
    /// use libldr::Error;
    ///
    /// let err = Error::cyclic_reference("load_from_stream", &["a.ldr", "b.ldr", "a.ldr"]);
    /// assert!(err.to_string().contains("a.ldr → b.ldr → a.ldr"));
    /// ```
    pub fn cyclic_reference<S: AsRef<str>>(operation: &'static str, path: &[S]) -> Self {
        Error::CyclicReference {
            operation,
            path: path
                .iter()
                .map(|s| s.as_ref())
                .collect::<Vec<_>>()
                .join(" → "),
        }
    }

    /// Create a ParseError with context about what was being parsed
    ///
    /// # Arguments
    /// * `field_name` - The name of the field being parsed (e.g., "line 3 color")
    /// * `value` - The value that failed to parse
    /// * `expected_type` - The expected type (e.g., "integer")
    pub fn parse_error_with_context(field_name: &str, value: &str, expected_type: &str) -> Self {
        Error::ParseError(format!(
            "Failed to parse '{}': expected {}, got '{}'",
            field_name, expected_type, value
        ))
    }

    /// Returns true for errors caused by a damaged archive
    pub fn is_archive_corruption(&self) -> bool {
        matches!(self, Error::BitRange { .. } | Error::InvalidArchive { .. })
    }
}
