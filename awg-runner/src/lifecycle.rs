//! Runner lifecycle
//!
//! ```text
//! Starting -> ConfigLoaded -> EngineUp -> ProtocolApplied -> InterfaceConfigured
//!          -> Running -> (Signaled | EngineExited) -> Closing -> Terminated
//! ```
//!
//! Any failure jumps straight to `Closing`. Whatever was acquired by then is
//! released in reverse order of acquisition: the interface handle first, then
//! the engine. Release happens exactly once on every path.

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use awg_link::{LinkOps, NetlinkLink};

use crate::document::Document;
use crate::engine::{Engine, UapiEngine};
use crate::error::{EngineError, Error, Result};
use crate::settings::RunnerSettings;
use crate::tunnel::TunnelConfig;

/// Lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    ConfigLoaded,
    EngineUp,
    ProtocolApplied,
    InterfaceConfigured,
    Running,
    Signaled,
    EngineExited,
    Closing,
    Terminated,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Starting => "starting",
            Phase::ConfigLoaded => "config-loaded",
            Phase::EngineUp => "engine-up",
            Phase::ProtocolApplied => "protocol-applied",
            Phase::InterfaceConfigured => "interface-configured",
            Phase::Running => "running",
            Phase::Signaled => "signaled",
            Phase::EngineExited => "engine-exited",
            Phase::Closing => "closing",
            Phase::Terminated => "terminated",
        };
        write!(f, "{}", s)
    }
}

/// Why a running tunnel stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Termination or interrupt signal
    Signal,
    /// The engine closed the device on its own
    EngineExited,
}

/// Source of the engine and interface handles
#[async_trait]
pub trait Backend: Send {
    type Engine: Engine;
    type Link: LinkOps + Send;

    /// Start (or attach to) the engine for `settings.interface`
    async fn start_engine(
        &mut self,
        settings: &RunnerSettings,
    ) -> std::result::Result<Self::Engine, EngineError>;

    /// Open a handle on the interface the engine created
    fn open_link(&mut self, interface: &str) -> awg_link::Result<Self::Link>;
}

/// Real backend: `amneziawg-go` over its control socket, rtnetlink for the link
#[derive(Debug, Default)]
pub struct SystemBackend;

#[async_trait]
impl Backend for SystemBackend {
    type Engine = UapiEngine;
    type Link = NetlinkLink;

    async fn start_engine(
        &mut self,
        settings: &RunnerSettings,
    ) -> std::result::Result<UapiEngine, EngineError> {
        UapiEngine::start(settings).await
    }

    fn open_link(&mut self, interface: &str) -> awg_link::Result<NetlinkLink> {
        NetlinkLink::open(interface)
    }
}

/// Drives one tunnel from configuration to termination
pub struct Runner<B: Backend = SystemBackend> {
    settings: RunnerSettings,
    backend: B,
    phase: Phase,
    history: Vec<Phase>,
}

impl Runner<SystemBackend> {
    /// Runner with the real engine and interface backend
    pub fn system(settings: RunnerSettings) -> Self {
        Self::new(settings, SystemBackend)
    }
}

impl<B: Backend> Runner<B> {
    pub fn new(settings: RunnerSettings, backend: B) -> Self {
        Self {
            settings,
            backend,
            phase: Phase::Starting,
            history: vec![Phase::Starting],
        }
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Every phase entered so far, in order
    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    fn enter(&mut self, phase: Phase) {
        log::debug!("{}: {} -> {}", self.settings.interface, self.phase, phase);
        self.phase = phase;
        self.history.push(phase);
    }

    /// Load and validate the configuration without touching any system state
    pub fn load(&mut self) -> Result<TunnelConfig> {
        log::info!("Loading config from {:?}", self.settings.config_path);
        let doc = Document::load(&self.settings.config_path)?;
        let tunnel = TunnelConfig::resolve(&doc, &self.settings)?;
        self.enter(Phase::ConfigLoaded);
        Ok(tunnel)
    }

    /// Bring the tunnel up and hold it until `shutdown` resolves or the
    /// engine exits.
    ///
    /// Both are normal terminations. On error, everything acquired so far is
    /// released before the error is returned.
    pub async fn run<S>(&mut self, shutdown: S) -> Result<ShutdownReason>
    where
        S: Future<Output = ()> + Send,
    {
        let mut engine: Option<B::Engine> = None;
        let mut link: Option<B::Link> = None;

        let outcome = self.bring_up(&mut engine, &mut link, shutdown).await;
        if let Err(ref e) = outcome {
            log::error!("{} failed in phase {}: {}", self.settings.interface, self.phase, e);
            if let Error::System(link_err) = e {
                if link_err.is_permission_denied() {
                    log::error!("Configuring {} requires CAP_NET_ADMIN", self.settings.interface);
                }
            }
        }

        self.enter(Phase::Closing);
        if let Some(link) = link.take() {
            log::debug!("Releasing interface handle for {}", link.name());
            drop(link);
        }
        if let Some(mut engine) = engine.take() {
            engine.release(self.settings.shutdown_timeout).await;
        }
        self.enter(Phase::Terminated);
        log::info!("{} terminated", self.settings.interface);

        outcome
    }

    async fn bring_up<S>(
        &mut self,
        engine: &mut Option<B::Engine>,
        link: &mut Option<B::Link>,
        shutdown: S,
    ) -> Result<ShutdownReason>
    where
        S: Future<Output = ()> + Send,
    {
        let tunnel = self.load()?;
        let stream = tunnel.control_stream();

        let engine = engine.insert(self.backend.start_engine(&self.settings).await?);
        self.enter(Phase::EngineUp);

        engine.apply(&stream).await?;
        self.enter(Phase::ProtocolApplied);

        let link = link.insert(self.backend.open_link(&self.settings.interface)?);
        awg_link::apply(link, &tunnel.interface.addresses, tunnel.interface.mtu)?;
        self.enter(Phase::InterfaceConfigured);

        log::info!(
            "AmneziaWG interface {} started successfully",
            self.settings.interface
        );
        self.enter(Phase::Running);

        let reason = tokio::select! {
            biased;
            _ = shutdown => ShutdownReason::Signal,
            _ = engine.closed() => ShutdownReason::EngineExited,
        };

        match reason {
            ShutdownReason::Signal => {
                log::info!("Shutdown signal received, stopping {}", self.settings.interface);
                self.enter(Phase::Signaled);
            }
            ShutdownReason::EngineExited => {
                log::warn!("Engine closed {}, shutting down", self.settings.interface);
                self.enter(Phase::EngineExited);
            }
        }
        Ok(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_names() {
        assert_eq!(Phase::Starting.to_string(), "starting");
        assert_eq!(Phase::InterfaceConfigured.to_string(), "interface-configured");
        assert_eq!(Phase::Terminated.to_string(), "terminated");
    }

    #[test]
    fn test_new_runner_is_starting() {
        let runner = Runner::system(RunnerSettings::default());
        assert_eq!(runner.phase(), Phase::Starting);
        assert_eq!(runner.history(), &[Phase::Starting]);
    }

    #[test]
    fn test_load_missing_document_stays_starting() {
        let mut runner = Runner::system(RunnerSettings::new("/nonexistent/awg/wg0.conf"));
        let err = runner.load().unwrap_err();
        assert!(err.is_config_error());
        assert_eq!(runner.phase(), Phase::Starting);
    }
}
