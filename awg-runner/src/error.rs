//! Error types for the runner
//!
//! Every fatal condition is carried back to the caller as a value; nothing in
//! this crate terminates the process.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for runner operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error, one variant per failure domain
#[derive(Debug, Error)]
pub enum Error {
    /// Bad input; raised before any engine or OS state is touched
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The engine could not be reached or rejected the configuration
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// Interface state could not be applied
    #[error("system error: {0}")]
    System(#[from] awg_link::Error),
}

impl Error {
    /// Check if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        match self {
            Error::Config(_) => true,
            Error::System(e) => e.is_config_error(),
            Error::Engine(_) => false,
        }
    }

    /// Check if this is an engine error
    pub fn is_engine_error(&self) -> bool {
        matches!(self, Error::Engine(_))
    }

    /// Check if this is an OS interface configuration error
    pub fn is_system_error(&self) -> bool {
        matches!(self, Error::System(e) if !e.is_config_error())
    }
}

/// Errors in the configuration document or resolved credentials
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to stat config file {path:?}: {source}")]
    Stat { path: PathBuf, source: io::Error },

    #[error("config file {path:?} has insecure permissions {mode:o} (expected 0600 or more restrictive)")]
    InsecurePermissions { path: PathBuf, mode: u32 },

    #[error("failed to read config file {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse config file: {0}")]
    Parse(String),

    #[error("missing [{0}] section")]
    MissingSection(&'static str),

    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("invalid address format {value:?} in {key}")]
    InvalidAddress { key: String, value: String },

    #[error("no private key configured (WG_PRIVATE_KEY, WG_PRIVATE_KEY_FILE and Interface.PrivateKey are all empty)")]
    MissingPrivateKey,

    #[error("{section} has no PublicKey")]
    MissingPublicKey { section: String },

    /// Key decoding or obfuscation parameter failure
    #[error(transparent)]
    Protocol(#[from] awg_uapi::Error),
}

/// Errors talking to the engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start engine {program:?}: {source}")]
    Spawn { program: PathBuf, source: io::Error },

    #[error("engine exited during startup ({0})")]
    ExitedEarly(String),

    #[error("control socket {path:?} did not become available within {timeout:?}")]
    SocketTimeout { path: PathBuf, timeout: Duration },

    #[error("failed to connect to control socket {path:?}: {source}")]
    Connect { path: PathBuf, source: io::Error },

    #[error("control channel I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to apply configuration: {0}")]
    Rejected(awg_uapi::Error),

    #[error("engine closed the control channel")]
    Closed,
}
