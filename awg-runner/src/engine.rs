//! Engine control
//!
//! The engine is a separate AmneziaWG userspace process (`amneziawg-go`)
//! that owns the tunnel device and exposes a line-oriented control socket
//! at `<socket_dir>/<interface>.sock`. The runner either starts it as a child
//! in foreground mode or attaches to one that is already running, then keeps
//! the control connection open for the lifetime of the tunnel. End of file
//! on that connection, or the child exiting, means the device is closed.

use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use awg_uapi::{protocol, ControlStream};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::process::{Child, Command};

use crate::error::EngineError;
use crate::settings::{EngineMode, RunnerSettings};

/// How long to wait for the reply to a configuration transaction
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval while waiting for the control socket
const SOCKET_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A running engine instance bound to one interface
#[async_trait]
pub trait Engine: Send {
    /// Apply a configuration stream in a single transaction
    async fn apply(&mut self, stream: &ControlStream) -> Result<(), EngineError>;

    /// Resolve once the engine has closed the device
    async fn closed(&mut self);

    /// Release the engine; idempotent
    async fn release(&mut self, timeout: Duration);
}

/// Engine driven over its control socket
pub struct UapiEngine {
    interface: String,
    reader: Option<BufReader<OwnedReadHalf>>,
    writer: Option<OwnedWriteHalf>,
    child: Option<Child>,
}

impl UapiEngine {
    /// Start or attach to the engine described by `settings`
    pub async fn start(settings: &RunnerSettings) -> Result<Self, EngineError> {
        let socket_path = settings.socket_path();
        match &settings.engine {
            EngineMode::Spawn { program, log_level } => {
                Self::spawn(
                    program,
                    log_level,
                    &settings.interface,
                    &socket_path,
                    settings.startup_timeout,
                )
                .await
            }
            EngineMode::Attach => Self::attach(&settings.interface, &socket_path).await,
        }
    }

    /// Connect to an engine that is already running
    pub async fn attach(interface: &str, socket_path: &Path) -> Result<Self, EngineError> {
        let stream = UnixStream::connect(socket_path)
            .await
            .map_err(|source| EngineError::Connect {
                path: socket_path.to_path_buf(),
                source,
            })?;
        log::info!("Attached to engine for {} at {:?}", interface, socket_path);
        Ok(Self::from_stream(interface, stream, None))
    }

    /// Start `program -f <interface>` and wait for its control socket
    pub async fn spawn(
        program: &Path,
        log_level: &str,
        interface: &str,
        socket_path: &Path,
        startup_timeout: Duration,
    ) -> Result<Self, EngineError> {
        log::info!("Starting AmneziaWG engine {:?} for {}", program, interface);

        let mut child = Command::new(program)
            .arg("-f")
            .arg(interface)
            .env("LOG_LEVEL", log_level)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: program.to_path_buf(),
                source,
            })?;

        let stream = tokio::time::timeout(startup_timeout, wait_for_socket(&mut child, socket_path))
            .await
            .map_err(|_| EngineError::SocketTimeout {
                path: socket_path.to_path_buf(),
                timeout: startup_timeout,
            })??;

        log::info!(
            "Engine running (pid {}), control socket {:?}",
            child.id().map(|id| id.to_string()).unwrap_or_else(|| "?".into()),
            socket_path
        );
        Ok(Self::from_stream(interface, stream, Some(child)))
    }

    fn from_stream(interface: &str, stream: UnixStream, child: Option<Child>) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            interface: interface.to_string(),
            reader: Some(BufReader::new(reader)),
            writer: Some(writer),
            child,
        }
    }

    /// Interface this engine serves
    pub fn interface(&self) -> &str {
        &self.interface
    }

    async fn transact(&mut self, request: &[u8]) -> Result<String, EngineError> {
        let (Some(reader), Some(writer)) = (self.reader.as_mut(), self.writer.as_mut()) else {
            return Err(EngineError::Closed);
        };

        writer.write_all(request).await?;
        writer.flush().await?;

        tokio::time::timeout(REPLY_TIMEOUT, read_reply(reader))
            .await
            .map_err(|_| {
                EngineError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "timeout waiting for engine reply",
                ))
            })?
    }
}

async fn read_reply(reader: &mut BufReader<OwnedReadHalf>) -> Result<String, EngineError> {
    let mut reply = String::new();
    loop {
        if reader.read_line(&mut reply).await? == 0 {
            return Err(EngineError::Closed);
        }
        if protocol::reply_complete(&reply) {
            return Ok(reply);
        }
    }
}

/// Poll for the control socket, failing early if the child exits
async fn wait_for_socket(child: &mut Child, socket_path: &Path) -> Result<UnixStream, EngineError> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Err(EngineError::ExitedEarly(status.to_string()));
        }
        if socket_path.exists() {
            match UnixStream::connect(socket_path).await {
                Ok(stream) => return Ok(stream),
                // A stale socket from a previous run refuses connections
                Err(e) => log::trace!("Control socket {:?} not ready: {}", socket_path, e),
            }
        }
        tokio::time::sleep(SOCKET_POLL_INTERVAL).await;
    }
}

async fn drain(reader: &mut BufReader<OwnedReadHalf>) {
    let mut buf = [0u8; 256];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => return,
            Ok(n) => log::debug!("Ignoring {} unsolicited bytes from engine", n),
            Err(e) => {
                log::debug!("Control channel read error: {}", e);
                return;
            }
        }
    }
}

#[async_trait]
impl Engine for UapiEngine {
    async fn apply(&mut self, stream: &ControlStream) -> Result<(), EngineError> {
        log::info!(
            "Applying configuration via UAPI ({} lines)...",
            stream.line_count()
        );
        let request = protocol::set_request(stream);
        let reply = self.transact(request.as_bytes()).await?;
        protocol::parse_reply(&reply).map_err(EngineError::Rejected)?;
        log::debug!("Engine accepted configuration for {}", self.interface);
        Ok(())
    }

    async fn closed(&mut self) {
        let Self { reader, child, .. } = self;
        let Some(reader) = reader.as_mut() else {
            return;
        };
        match child.as_mut() {
            Some(child) => {
                tokio::select! {
                    status = child.wait() => match status {
                        Ok(status) => log::warn!("Engine exited: {}", status),
                        Err(e) => log::warn!("Failed to wait for engine: {}", e),
                    },
                    _ = drain(reader) => log::warn!("Engine closed the control channel"),
                }
            }
            None => {
                drain(reader).await;
                log::warn!("Engine closed the control channel");
            }
        }
    }

    async fn release(&mut self, timeout: Duration) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
        }
        self.reader = None;

        let Some(mut child) = self.child.take() else {
            return;
        };
        // SIGTERM first, SIGKILL once the timeout expires
        if let Some(pid) = child.id() {
            log::info!("Stopping engine (pid {})", pid);
            if let Err(e) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                log::warn!("Failed to send SIGTERM to engine (pid {}): {}", pid, e);
            }
        }
        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => log::info!("Engine stopped: {}", status),
            Ok(Err(e)) => log::warn!("Failed to reap engine: {}", e),
            Err(_) => {
                log::warn!("Engine did not exit within {:?}, killing it", timeout);
                if let Err(e) = child.kill().await {
                    log::warn!("Failed to kill engine: {}", e);
                }
            }
        }
    }
}
