//! Process-level runner settings
//!
//! Everything that used to be a global default (config path, interface name,
//! engine location) is an explicit field here, so several runners can coexist
//! in one process (tests do exactly that).

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use zeroize::Zeroizing;

/// Default configuration document location
pub const DEFAULT_CONFIG_PATH: &str = "/config/wg0.conf";

/// Default tunnel interface name
pub const DEFAULT_INTERFACE: &str = "wg0";

/// Default engine binary
pub const DEFAULT_ENGINE_PROGRAM: &str = "amneziawg-go";

/// Default engine log level (passed as `LOG_LEVEL`)
pub const DEFAULT_ENGINE_LOG_LEVEL: &str = "error";

/// Directory holding engine control sockets
pub const DEFAULT_SOCKET_DIR: &str = "/var/run/amneziawg";

/// How the runner reaches the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineMode {
    /// Start the engine as a child process in foreground mode
    Spawn { program: PathBuf, log_level: String },
    /// Connect to an engine that is already running
    Attach,
}

impl Default for EngineMode {
    fn default() -> Self {
        EngineMode::Spawn {
            program: PathBuf::from(DEFAULT_ENGINE_PROGRAM),
            log_level: DEFAULT_ENGINE_LOG_LEVEL.to_string(),
        }
    }
}

/// Settings for one runner instance
#[derive(Clone)]
pub struct RunnerSettings {
    /// Configuration document path
    pub config_path: PathBuf,
    /// Tunnel interface name
    pub interface: String,
    /// Private key given directly (highest precedence)
    pub private_key: Option<Zeroizing<String>>,
    /// File holding the private key (second precedence)
    pub private_key_file: Option<PathBuf>,
    /// Engine reachability
    pub engine: EngineMode,
    /// Directory of the engine control socket
    pub socket_dir: PathBuf,
    /// How long to wait for the control socket after starting the engine
    pub startup_timeout: Duration,
    /// Upper bound on engine release during shutdown
    pub shutdown_timeout: Duration,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            interface: DEFAULT_INTERFACE.to_string(),
            private_key: None,
            private_key_file: None,
            engine: EngineMode::default(),
            socket_dir: PathBuf::from(DEFAULT_SOCKET_DIR),
            startup_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl RunnerSettings {
    /// Settings for a given document, everything else default
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            ..Default::default()
        }
    }

    /// Set the interface name
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = interface.into();
        self
    }

    /// Set the directly supplied private key
    pub fn with_private_key(mut self, key: impl Into<String>) -> Self {
        self.private_key = Some(Zeroizing::new(key.into()));
        self
    }

    /// Set the private key file
    pub fn with_private_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.private_key_file = Some(path.into());
        self
    }

    /// Set the engine mode
    pub fn with_engine(mut self, engine: EngineMode) -> Self {
        self.engine = engine;
        self
    }

    /// Set the control socket directory
    pub fn with_socket_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.socket_dir = dir.into();
        self
    }

    /// Control socket of the configured interface
    pub fn socket_path(&self) -> PathBuf {
        self.socket_dir.join(format!("{}.sock", self.interface))
    }

    /// Directly supplied private key, if any
    pub fn private_key(&self) -> Option<&str> {
        self.private_key.as_ref().map(|k| k.as_str())
    }

    /// Private key file, if any
    pub fn private_key_file(&self) -> Option<&Path> {
        self.private_key_file.as_deref()
    }
}

impl fmt::Debug for RunnerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerSettings")
            .field("config_path", &self.config_path)
            .field("interface", &self.interface)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("private_key_file", &self.private_key_file)
            .field("engine", &self.engine)
            .field("socket_dir", &self.socket_dir)
            .field("startup_timeout", &self.startup_timeout)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish()
    }
}
