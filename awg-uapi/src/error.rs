//! Error types for awg-uapi

use thiserror::Error;

/// Result type alias for control-protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while building or interpreting control-protocol data
#[derive(Debug, Error)]
pub enum Error {
    /// A key field could not be decoded from base64
    #[error("invalid key in {field}: {reason}")]
    InvalidKey { field: String, reason: String },

    /// Jmin must be strictly less than Jmax when both are set
    #[error("invalid obfuscation parameters: Jmin ({jmin}) must be less than Jmax ({jmax})")]
    JunkRange { jmin: u32, jmax: u32 },

    /// The engine answered a transaction with a non-zero errno
    #[error("engine rejected configuration (errno={0})")]
    Rejected(i64),

    /// The engine reply could not be interpreted
    #[error("malformed engine reply: {0}")]
    MalformedReply(String),
}

impl Error {
    /// Check if this error stems from configuration input rather than the engine
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::InvalidKey { .. } | Error::JunkRange { .. })
    }
}
