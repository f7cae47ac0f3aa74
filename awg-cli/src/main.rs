//! AmneziaWG runner CLI
//!
//! Container entrypoint: reads a wg-quick style config, starts the engine,
//! configures the interface and stays up until SIGTERM/SIGINT.

use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use awg_runner::settings::{
    DEFAULT_CONFIG_PATH, DEFAULT_ENGINE_LOG_LEVEL, DEFAULT_ENGINE_PROGRAM, DEFAULT_INTERFACE,
    DEFAULT_SOCKET_DIR,
};
use awg_runner::{EngineMode, Runner, RunnerSettings, ShutdownReason, TunnelConfig};

/// Bring up an AmneziaWG interface from a config file
#[derive(Parser)]
#[command(name = "awg-runner")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (must be mode 0600 or stricter)
    #[arg(short, long, env = "WG_CONFIG_FILE", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Interface name
    #[arg(short, long, env = "WG_INTERFACE", default_value = DEFAULT_INTERFACE)]
    interface: String,

    /// Private key (base64); overrides the key file and the config file
    #[arg(long, env = "WG_PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// File containing the private key (base64)
    #[arg(long, env = "WG_PRIVATE_KEY_FILE")]
    private_key_file: Option<PathBuf>,

    /// Engine binary to start
    #[arg(long, env = "AWG_ENGINE", default_value = DEFAULT_ENGINE_PROGRAM)]
    engine: PathBuf,

    /// Log level passed to the engine
    #[arg(long, env = "LOG_LEVEL", default_value = DEFAULT_ENGINE_LOG_LEVEL)]
    engine_log_level: String,

    /// Attach to an already running engine instead of starting one
    #[arg(long)]
    attach: bool,

    /// Directory containing the engine control socket
    #[arg(long, env = "AWG_SOCKET_DIR", default_value = DEFAULT_SOCKET_DIR)]
    socket_dir: PathBuf,

    /// Seconds to wait for the engine control socket
    #[arg(long, default_value_t = 5)]
    startup_timeout: u64,

    /// Seconds to wait for the engine to exit on shutdown
    #[arg(long, default_value_t = 5)]
    shutdown_timeout: u64,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
enum Commands {
    /// Bring the interface up and wait for a shutdown signal (default)
    Up,

    /// Validate the configuration and print a summary without touching the system
    Check,
}

impl Cli {
    fn settings(&self) -> RunnerSettings {
        let engine = if self.attach {
            EngineMode::Attach
        } else {
            EngineMode::Spawn {
                program: self.engine.clone(),
                log_level: self.engine_log_level.clone(),
            }
        };

        let mut settings = RunnerSettings::new(&self.config)
            .with_interface(&self.interface)
            .with_engine(engine)
            .with_socket_dir(&self.socket_dir);
        if let Some(ref key) = self.private_key {
            settings = settings.with_private_key(key.as_str());
        }
        if let Some(ref path) = self.private_key_file {
            settings = settings.with_private_key_file(path);
        }
        settings.startup_timeout = Duration::from_secs(self.startup_timeout);
        settings.shutdown_timeout = Duration::from_secs(self.shutdown_timeout);
        settings
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli.log_level);

    let result = match cli.command.unwrap_or(Commands::Up) {
        Commands::Up => run_up(&cli).await,
        Commands::Check => check(&cli),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run_up(cli: &Cli) -> Result<()> {
    info!("Starting AmneziaWG runner for {}...", cli.interface);

    // Registered before startup so a signal during bring-up still cleans up
    let shutdown = shutdown_signal().context("Failed to register signal handlers")?;

    let mut runner = Runner::system(cli.settings());
    let reason = runner.run(shutdown).await?;

    match reason {
        ShutdownReason::Signal => info!("Shutting down..."),
        ShutdownReason::EngineExited => info!("Device closed, exiting"),
    }
    Ok(())
}

fn check(cli: &Cli) -> Result<()> {
    let mut runner = Runner::system(cli.settings());
    let tunnel = runner
        .load()
        .with_context(|| format!("Invalid configuration {:?}", cli.config))?;

    print_summary(&cli.interface, &tunnel);
    Ok(())
}

fn print_summary(interface: &str, tunnel: &TunnelConfig) {
    let iface = &tunnel.interface;
    let stream = tunnel.control_stream();

    println!("Interface:   {}", interface);
    println!("Listen port: {}", iface.listen_port);
    if iface.fwmark != 0 {
        println!("FwMark:      {:#x}", iface.fwmark);
    }
    println!("MTU:         {}", iface.mtu);
    println!("Addresses:   {}", join_or_none(&iface.addresses));
    if iface.obfuscation.is_empty() {
        println!("Obfuscation: off");
    } else {
        let obf = &iface.obfuscation;
        println!(
            "Obfuscation: jc={} jmin={} jmax={} s1={} s2={}",
            obf.jc, obf.jmin, obf.jmax, obf.s1, obf.s2
        );
    }

    for (index, peer) in tunnel.peers.iter().enumerate() {
        println!();
        println!("Peer {}:", index);
        println!("  Endpoint:    {}", peer.endpoint.as_deref().unwrap_or("(none)"));
        println!("  Allowed IPs: {}", join_or_none(&peer.allowed_ips));
        println!("  Preshared:   {}", if peer.preshared_key.is_some() { "yes" } else { "no" });
        if peer.persistent_keepalive != 0 {
            println!("  Keepalive:   {}s", peer.persistent_keepalive);
        }
    }

    println!();
    println!("Control stream: {} lines", stream.line_count());
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

/// Future that resolves on the first SIGTERM or SIGINT
fn shutdown_signal() -> std::io::Result<impl Future<Output = ()> + Send> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    })
}
