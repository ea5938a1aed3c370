//! Error types for opusbench.

use std::fmt;

use thiserror::Error;

/// Result type alias using opusbench's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// The storage primitive that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoOperation {
    Stat,
    Open,
    Read,
    Seek,
    Tell,
    Close,
}

impl fmt::Display for IoOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stat => "stat",
            Self::Open => "open",
            Self::Read => "read",
            Self::Seek => "seek",
            Self::Tell => "tell",
            Self::Close => "close",
        };
        f.write_str(name)
    }
}

/// Main error type for opusbench.
///
/// Every variant is terminal for the decode session that raised it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Backing store errors
    #[error("File {operation} failed: {message}")]
    Io {
        operation: IoOperation,
        message: String,
    },

    #[error("Invalid backing store: {0}")]
    InvalidStore(String),

    // Decoder errors
    #[error("Decoder error upon opening stream: {code} ({message})")]
    DecoderOpen { code: i32, message: String },

    #[error("Decode error: {code} ({message})")]
    Decode { code: i32, message: String },

    // Application errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build an I/O error from the failing primitive and the underlying error.
    pub fn io(operation: IoOperation, err: &std::io::Error) -> Self {
        Self::Io {
            operation,
            message: err.to_string(),
        }
    }

    /// The decoder's numeric code, for decoder errors.
    pub const fn code(&self) -> Option<i32> {
        match self {
            Self::DecoderOpen { code, .. } | Self::Decode { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns true if the error came from the storage side rather than the decoder.
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::InvalidStore(_))
    }
}
