//! AmneziaWG tunnel runner
//!
//! Brings one AmneziaWG interface up from an INI configuration document and
//! holds it until a shutdown signal arrives or the engine exits:
//!
//! - **Config**: [`Document`] (owner-only permission check, INI parsing) and
//!   [`TunnelConfig`] (credential precedence, integer/list/CIDR validation,
//!   obfuscation checks)
//! - **Engine**: [`UapiEngine`] starts or attaches to `amneziawg-go` and sends
//!   the rendered control stream in one transaction
//! - **Interface**: MTU, addresses and link state via `awg-link`
//! - **Lifecycle**: [`Runner`] sequences the above and releases everything
//!   exactly once
//!
//! ```rust,no_run
//! use awg_runner::{Runner, RunnerSettings};
//!
//! # async fn example() -> awg_runner::Result<()> {
//! let mut runner = Runner::system(RunnerSettings::new("/config/wg0.conf"));
//! let reason = runner.run(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await?;
//! println!("stopped: {:?}", reason);
//! # Ok(())
//! # }
//! ```

pub mod credentials;
pub mod document;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod settings;
pub mod tunnel;

pub use credentials::{resolve_private_key, KeySource, ResolvedKey};
pub use document::Document;
pub use engine::{Engine, UapiEngine};
pub use error::{ConfigError, EngineError, Error, Result};
pub use lifecycle::{Backend, Phase, Runner, ShutdownReason, SystemBackend};
pub use settings::{EngineMode, RunnerSettings};
pub use tunnel::TunnelConfig;
