//! Error types for marshal report processing.
//!
//! All errors implement the `std::error::Error` trait and carry enough
//! structured context (frame kind, slot index, lap) to diagnose a protocol
//! desync in the field.
//!
//! ## Error Categories
//!
//! - **Decode Errors**: unrecognized frame length, bad text encoding, short
//!   reads. The offending datagram is discarded and prior state is unchanged.
//! - **Sequence Errors**: a roster name frame arrived before any telemetry
//!   established a roster size. The stream is assumed desynchronized.
//! - **Reconciliation Errors**: a roster-shrink diff produced an ambiguous
//!   shape. Attributing lap history to the wrong driver is worse than
//!   stopping, so these are fatal.
//! - **I/O Errors**: capture file and UDP socket failures from the sources.
//!
//! Use `is_fatal()` to decide whether stream processing may continue:
//!
//! ```rust
//! use marshal::MarshalError;
//!
//! let error = MarshalError::unrecognized_frame(500);
//! assert!(!error.is_fatal());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for marshal operations.
pub type Result<T, E = MarshalError> = std::result::Result<T, E>;

/// Main error type for marshal report processing.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MarshalError {
    #[error("unrecognized frame length {length} (expected 1028, 1347 or 1367)")]
    UnrecognizedFrame { length: usize },

    #[error("invalid text in {frame} frame, field '{field}' at offset {offset}")]
    InvalidText {
        frame: &'static str,
        field: &'static str,
        offset: usize,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("truncated read in {frame} frame: {wanted} bytes at offset {offset}")]
    Truncated { frame: &'static str, offset: usize, wanted: usize },

    #[error("frame sequence violation: {details}")]
    Sequence { details: String },

    #[error("roster reconciliation failed: {details}")]
    Reconciliation { details: String },

    #[error("capture file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("socket error: {context}")]
    Socket {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl MarshalError {
    /// Returns whether stream processing must stop after this error.
    ///
    /// Decode failures discard a single datagram and leave state untouched;
    /// sequence and reconciliation failures mean any further frame could be
    /// attributed to the wrong driver.
    pub fn is_fatal(&self) -> bool {
        match self {
            MarshalError::UnrecognizedFrame { .. } => false,
            MarshalError::InvalidText { .. } => false,
            MarshalError::Truncated { .. } => false,
            MarshalError::Sequence { .. } => true,
            MarshalError::Reconciliation { .. } => true,
            MarshalError::File { .. } => false,
            MarshalError::Socket { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            MarshalError::UnrecognizedFrame { .. } => vec![
                "Check that the game is broadcasting the supported protocol version",
                "Verify nothing else is sending datagrams to the marshal port",
            ],
            MarshalError::InvalidText { .. } | MarshalError::Truncated { .. } => vec![
                "Verify the capture was recorded from a supported game build",
                "Check for datagram corruption on the network path",
            ],
            MarshalError::Sequence { .. } => vec![
                "Restart the listener so telemetry establishes the roster before names arrive",
                "Replay captures from the first telemetry frame, not mid-stream",
            ],
            MarshalError::Reconciliation { .. } => vec![
                "Capture the packet stream and report the roster transition",
                "Restart the session to re-establish a clean roster",
            ],
            MarshalError::File { .. } => vec![
                "Check the capture directory exists and is readable",
                "Verify pdata files were not truncated while recording",
            ],
            MarshalError::Socket { .. } => vec![
                "Check the UDP port is not already bound",
                "Verify firewall rules allow the game's broadcast",
            ],
        }
    }

    /// Helper constructor for unrecognized frame lengths.
    pub fn unrecognized_frame(length: usize) -> Self {
        MarshalError::UnrecognizedFrame { length }
    }

    /// Helper constructor for sequence violations.
    pub fn sequence(details: impl Into<String>) -> Self {
        MarshalError::Sequence { details: details.into() }
    }

    /// Helper constructor for reconciliation failures.
    pub fn reconciliation(details: impl Into<String>) -> Self {
        MarshalError::Reconciliation { details: details.into() }
    }

    /// Helper constructor for capture file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        MarshalError::File { path, source }
    }

    /// Helper constructor for socket errors.
    pub fn socket_error(context: impl Into<String>, source: std::io::Error) -> Self {
        MarshalError::Socket { context: context.into(), source }
    }
}
