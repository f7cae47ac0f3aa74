//! Lifecycle tests against a recording backend
//!
//! The backend records every engine and interface operation into a shared
//! log so ordering and release counts can be asserted without privileges.

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use awg_link::LinkOps;
use awg_runner::{
    Backend, ConfigError, Engine, EngineError, Error, Phase, Runner, RunnerSettings,
    ShutdownReason,
};
use awg_uapi::ControlStream;
use ipnet::IpNet;
use tokio::sync::oneshot;

const SK: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=";
const PK: &str = "ICEiIyQlJicoKSorLC0uLzAxMjM0NTY3ODk6Ozw9Pj8=";

type Log = Arc<Mutex<Vec<String>>>;

fn record(log: &Log, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

struct MockEngine {
    log: Log,
    reject: bool,
    exit: Option<oneshot::Receiver<()>>,
}

#[async_trait]
impl Engine for MockEngine {
    async fn apply(&mut self, stream: &ControlStream) -> Result<(), EngineError> {
        record(&self.log, format!("apply {} lines", stream.line_count()));
        if self.reject {
            return Err(EngineError::Rejected(awg_uapi::Error::Rejected(22)));
        }
        Ok(())
    }

    async fn closed(&mut self) {
        match self.exit.take() {
            Some(exit) => {
                let _ = exit.await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    async fn release(&mut self, _timeout: Duration) {
        record(&self.log, "engine released");
    }
}

struct MockLink {
    log: Log,
    fail_mtu: bool,
}

impl LinkOps for MockLink {
    fn name(&self) -> &str {
        "wg0"
    }

    fn set_mtu(&mut self, mtu: u16) -> awg_link::Result<()> {
        record(&self.log, format!("mtu {}", mtu));
        if self.fail_mtu {
            return Err(awg_link::Error::SetMtu {
                mtu,
                source: std::io::Error::from_raw_os_error(1),
            });
        }
        Ok(())
    }

    fn add_address(&mut self, address: &IpNet) -> awg_link::Result<()> {
        record(&self.log, format!("addr {}", address));
        Ok(())
    }

    fn set_up(&mut self) -> awg_link::Result<()> {
        record(&self.log, "up");
        Ok(())
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        record(&self.log, "link released");
    }
}

#[derive(Default)]
struct MockBackend {
    log: Log,
    reject: bool,
    fail_mtu: bool,
    exit: Option<oneshot::Receiver<()>>,
}

#[async_trait]
impl Backend for MockBackend {
    type Engine = MockEngine;
    type Link = MockLink;

    async fn start_engine(&mut self, settings: &RunnerSettings) -> Result<MockEngine, EngineError> {
        record(&self.log, format!("engine started {}", settings.interface));
        Ok(MockEngine {
            log: self.log.clone(),
            reject: self.reject,
            exit: self.exit.take(),
        })
    }

    fn open_link(&mut self, interface: &str) -> awg_link::Result<MockLink> {
        record(&self.log, format!("link opened {}", interface));
        Ok(MockLink {
            log: self.log.clone(),
            fail_mtu: self.fail_mtu,
        })
    }
}

fn write_config(content: &str, mode: u32) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(mode)).unwrap();
    file
}

fn valid_config() -> String {
    format!(
        "[Interface]\n\
         PrivateKey = {}\n\
         Address = 10.8.0.2/24, fd00::2/64\n\
         MTU = 1380\n\
         Jc = 3\nJmin = 10\nJmax = 50\n\n\
         [Peer]\n\
         PublicKey = {}\n\
         AllowedIPs = 0.0.0.0/0\n",
        SK, PK
    )
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

const BRING_UP: &[&str] = &[
    "engine started wg0",
    "apply 7 lines",
    "link opened wg0",
    "mtu 1380",
    "addr 10.8.0.2/24",
    "addr fd00::2/64",
    "up",
];

const RELEASE: &[&str] = &["link released", "engine released"];

#[tokio::test]
async fn test_signal_shutdown() {
    let file = write_config(&valid_config(), 0o600);
    let backend = MockBackend::default();
    let log = backend.log.clone();
    let mut runner = Runner::new(RunnerSettings::new(file.path()), backend);

    let reason = runner.run(async {}).await.unwrap();
    assert_eq!(reason, ShutdownReason::Signal);
    assert_eq!(runner.phase(), Phase::Terminated);
    assert_eq!(
        runner.history(),
        &[
            Phase::Starting,
            Phase::ConfigLoaded,
            Phase::EngineUp,
            Phase::ProtocolApplied,
            Phase::InterfaceConfigured,
            Phase::Running,
            Phase::Signaled,
            Phase::Closing,
            Phase::Terminated,
        ]
    );

    let expected: Vec<_> = BRING_UP.iter().chain(RELEASE).map(|s| s.to_string()).collect();
    assert_eq!(entries(&log), expected);
}

#[tokio::test]
async fn test_engine_exit_shutdown() {
    let file = write_config(&valid_config(), 0o600);
    let (exit_tx, exit_rx) = oneshot::channel();
    let backend = MockBackend {
        exit: Some(exit_rx),
        ..Default::default()
    };
    let log = backend.log.clone();
    let mut runner = Runner::new(RunnerSettings::new(file.path()), backend);

    let run = runner.run(std::future::pending());
    let trigger = async {
        tokio::task::yield_now().await;
        exit_tx.send(()).unwrap();
    };
    let (result, ()) = tokio::join!(run, trigger);

    assert_eq!(result.unwrap(), ShutdownReason::EngineExited);
    assert_eq!(runner.phase(), Phase::Terminated);
    assert!(runner.history().contains(&Phase::EngineExited));
    assert!(!runner.history().contains(&Phase::Signaled));

    let expected: Vec<_> = BRING_UP.iter().chain(RELEASE).map(|s| s.to_string()).collect();
    assert_eq!(entries(&log), expected);
}

#[tokio::test]
async fn test_both_paths_release_identically() {
    let mut tails = Vec::new();
    for engine_exits in [false, true] {
        let file = write_config(&valid_config(), 0o600);
        let (exit_tx, exit_rx) = oneshot::channel();
        let backend = MockBackend {
            exit: Some(exit_rx),
            ..Default::default()
        };
        let log = backend.log.clone();
        let mut runner = Runner::new(RunnerSettings::new(file.path()), backend);

        if engine_exits {
            drop(exit_tx);
            runner.run(std::future::pending()).await.unwrap();
        } else {
            runner.run(async {}).await.unwrap();
            drop(exit_tx);
        }

        let log = entries(&log);
        let released: Vec<_> = log.iter().filter(|e| e.ends_with("released")).cloned().collect();
        tails.push(released);
    }
    assert_eq!(tails[0], tails[1]);
    assert_eq!(tails[0], RELEASE);
}

#[tokio::test]
async fn test_insecure_permissions_abort_before_engine() {
    let file = write_config(&valid_config(), 0o644);
    let backend = MockBackend::default();
    let log = backend.log.clone();
    let mut runner = Runner::new(RunnerSettings::new(file.path()), backend);

    let err = runner.run(async {}).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::InsecurePermissions { .. })
    ));
    assert!(entries(&log).is_empty());
    assert_eq!(
        runner.history(),
        &[Phase::Starting, Phase::Closing, Phase::Terminated]
    );
}

#[tokio::test]
async fn test_invalid_junk_range_aborts_before_engine() {
    let config = format!("[Interface]\nPrivateKey = {}\nJmin = 90\nJmax = 10\n", SK);
    let file = write_config(&config, 0o600);
    let backend = MockBackend::default();
    let log = backend.log.clone();
    let mut runner = Runner::new(RunnerSettings::new(file.path()), backend);

    let err = runner.run(async {}).await.unwrap_err();
    assert!(err.is_config_error());
    assert!(entries(&log).is_empty());
}

#[tokio::test]
async fn test_bad_direct_key_aborts_before_engine() {
    let file = write_config(&valid_config(), 0o600);
    let backend = MockBackend::default();
    let log = backend.log.clone();
    let settings = RunnerSettings::new(file.path()).with_private_key("AAAA");
    let mut runner = Runner::new(settings, backend);

    let err = runner.run(async {}).await.unwrap_err();
    assert!(err.is_config_error());
    assert!(entries(&log).is_empty());
}

#[tokio::test]
async fn test_engine_rejection_releases_engine_only() {
    let file = write_config(&valid_config(), 0o600);
    let backend = MockBackend {
        reject: true,
        ..Default::default()
    };
    let log = backend.log.clone();
    let mut runner = Runner::new(RunnerSettings::new(file.path()), backend);

    let err = runner.run(async {}).await.unwrap_err();
    assert!(err.is_engine_error());
    assert_eq!(
        entries(&log),
        vec!["engine started wg0", "apply 7 lines", "engine released"]
    );
    assert!(!runner.history().contains(&Phase::ProtocolApplied));
    assert_eq!(runner.phase(), Phase::Terminated);
}

#[tokio::test]
async fn test_link_failure_releases_in_reverse_order() {
    let file = write_config(&valid_config(), 0o600);
    let backend = MockBackend {
        fail_mtu: true,
        ..Default::default()
    };
    let log = backend.log.clone();
    let mut runner = Runner::new(RunnerSettings::new(file.path()), backend);

    let err = runner.run(async {}).await.unwrap_err();
    assert!(err.is_system_error());
    assert_eq!(
        entries(&log),
        vec![
            "engine started wg0",
            "apply 7 lines",
            "link opened wg0",
            "mtu 1380",
            "link released",
            "engine released",
        ]
    );
    assert!(!runner.history().contains(&Phase::Running));
}

#[tokio::test]
async fn test_custom_interface_name() {
    let file = write_config(&valid_config(), 0o600);
    let backend = MockBackend::default();
    let log = backend.log.clone();
    let settings = RunnerSettings::new(file.path()).with_interface("awg7");
    let mut runner = Runner::new(settings, backend);

    runner.run(async {}).await.unwrap();
    let log = entries(&log);
    assert_eq!(log[0], "engine started awg7");
    assert_eq!(log[2], "link opened awg7");
}
