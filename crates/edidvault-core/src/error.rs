//! Error types for EDID Vault.
//!
//! One taxonomy for the whole core: decode failures, dump-store failures,
//! hardware transport failures, and transfer failures, each mapped to a
//! JSON-RPC application error code for the frontend.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for EDID Vault operations.
#[derive(Debug, Error)]
pub enum EdidError {
    // Decode errors
    #[error("EDID too short: {len} bytes (base block is 128)")]
    TooShort { len: usize },

    #[error("EDID length {len} is not a multiple of 128")]
    NotBlockAligned { len: usize },

    #[error("EDID header does not match the fixed magic pattern")]
    MalformedHeader,

    // Dump store errors
    #[error("Invalid dump filename {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Dump already exists with different content: {filename}")]
    AlreadyExists { filename: String },

    #[error("Dump not found: {filename}")]
    DumpNotFound { filename: String },

    // Hardware transport errors
    #[error("Device unreachable on {bus}: {message}")]
    Unreachable { bus: String, message: String },

    #[error("Bus busy: {bus}")]
    BusBusy { bus: String },

    #[error("Short write on {bus}: wrote {written} of {expected} bytes")]
    ShortWrite {
        bus: String,
        written: usize,
        expected: usize,
    },

    #[error("Connector not found: {connector}")]
    ConnectorNotFound { connector: String },

    // Transfer errors
    #[error("Removable mount not found: {mount}")]
    MountNotFound { mount: String },

    // Workflow gating
    #[error("Precondition unmet: {message}")]
    PreconditionUnmet { message: String },

    #[error("Operation was cancelled")]
    Cancelled,

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Boundary parameter errors
    #[error("Invalid parameters: {message}")]
    InvalidParams { message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for EDID Vault operations.
pub type Result<T> = std::result::Result<T, EdidError>;

impl From<std::io::Error> for EdidError {
    fn from(err: std::io::Error) -> Self {
        EdidError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl EdidError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        EdidError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// True for EDID decode failures, as opposed to store or hardware
    /// failures.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            EdidError::TooShort { .. }
                | EdidError::NotBlockAligned { .. }
                | EdidError::MalformedHeader
        )
    }

    /// Convert to a JSON-RPC error code.
    ///
    /// Standard JSON-RPC error codes:
    /// - -32602: Invalid params
    /// - -32603: Internal error
    ///
    /// Custom error codes (application-defined, -32000 to -32099):
    /// - -32000: Hardware transport error
    /// - -32001: EDID decode error
    /// - -32002: Dump / connector / mount not found
    /// - -32003: Dump name conflict or invalid name
    /// - -32004: Cancelled by operator
    /// - -32005: Destructive-action precondition unmet
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            EdidError::Unreachable { .. }
            | EdidError::BusBusy { .. }
            | EdidError::ShortWrite { .. } => -32000,

            EdidError::TooShort { .. }
            | EdidError::NotBlockAligned { .. }
            | EdidError::MalformedHeader => -32001,

            EdidError::DumpNotFound { .. }
            | EdidError::ConnectorNotFound { .. }
            | EdidError::MountNotFound { .. } => -32002,

            EdidError::InvalidName { .. } | EdidError::AlreadyExists { .. } => -32003,

            EdidError::Cancelled => -32004,

            EdidError::PreconditionUnmet { .. } => -32005,

            EdidError::InvalidParams { .. } => -32602,

            // All other errors are internal errors
            _ => -32603,
        }
    }
}
