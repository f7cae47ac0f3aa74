//! Error types for awg-link

use std::io;
use thiserror::Error;

/// Result type alias for interface operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring the tunnel interface
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the netlink socket
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Interface lookup failed
    #[error("failed to get link {0}")]
    DeviceNotFound(String),

    /// Address string is not valid CIDR notation
    #[error("invalid address format {0}")]
    InvalidAddress(String),

    /// Setting the MTU failed
    #[error("failed to set MTU {mtu}: {source}")]
    SetMtu { mtu: u16, source: io::Error },

    /// Adding an address failed
    #[error("failed to add address {address}: {source}")]
    AddAddress { address: String, source: io::Error },

    /// Bringing the link up failed
    #[error("failed to set link up: {0}")]
    LinkUp(io::Error),

    /// The kernel answered with something other than an ack
    #[error("netlink protocol error: {0}")]
    Protocol(String),

    /// Operation not supported on this platform
    #[error("operation not supported: {0}")]
    NotSupported(String),
}

impl Error {
    /// Check if the error is caused by invalid input rather than the OS
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::InvalidAddress(_))
    }

    /// Check if the error is a permission-related error
    pub fn is_permission_denied(&self) -> bool {
        let io = match self {
            Error::Io(e) | Error::LinkUp(e) => e,
            Error::SetMtu { source, .. } | Error::AddAddress { source, .. } => source,
            _ => return false,
        };
        io.kind() == io::ErrorKind::PermissionDenied
    }
}
