//! duofa identity server — entry point.
//!
//! Wires together the key roster, the shared server state, and the three
//! long-running tasks, then waits for Ctrl-C:
//!
//! ```text
//! main()
//!  └─ load_secret_keys()        -- fatal if the roster is missing/empty
//!  └─ ServerState::new()        -- registry + keys + config
//!  └─ spawn run_sweeper         -- expiry sweeps, once per tick
//!  └─ spawn run_issuance_prompt -- stdin identifier prompt
//!  └─ run_server().await        -- accept loop (fatal if bind fails)
//! ```
//!
//! # Usage
//!
//! ```text
//! duofa-server [OPTIONS]
//!
//! Options:
//!   --bind <ADDR>             Listen address [default: 127.0.0.1:65432]
//!   --keys-file <PATH>        Key roster TOML [default: keys.toml]
//!   --idle-timeout-secs <N>   Per-connection idle timeout [default: 30]
//!   --no-prompt               Disable the stdin identifier prompt
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use duofa_server::domain::config::ServerConfig;
use duofa_server::infrastructure::issuance::run_issuance_prompt;
use duofa_server::infrastructure::roster::load_secret_keys;
use duofa_server::infrastructure::{run_server, run_sweeper, ServerState};

/// duofa identity server.
///
/// Issues one-time identifiers and verifies time-windowed HMAC pins sent by
/// the companion device application.
#[derive(Debug, Parser)]
#[command(name = "duofa-server", about = "duofa two-device 2FA identity server", version)]
struct Cli {
    /// Address and port for the authentication listener.
    #[arg(long, default_value = "127.0.0.1:65432", env = "DUOFA_BIND")]
    bind: SocketAddr,

    /// Path to the TOML key roster (`[keys]` table of user = "secret").
    #[arg(long, default_value = "keys.toml", env = "DUOFA_KEYS_FILE")]
    keys_file: PathBuf,

    /// Seconds a connection may sit idle mid-exchange before being closed.
    #[arg(long, default_value_t = 30, env = "DUOFA_IDLE_TIMEOUT_SECS")]
    idle_timeout_secs: u64,

    /// Disable the interactive stdin identifier prompt (for running under
    /// a supervisor with no usable stdin).
    #[arg(long)]
    no_prompt: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging; level overridden by RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let keys = load_secret_keys(&cli.keys_file)
        .with_context(|| format!("failed to load key roster {}", cli.keys_file.display()))?;
    info!("loaded {} user key(s) from {}", keys.len(), cli.keys_file.display());

    let config = ServerConfig {
        bind_addr: cli.bind,
        idle_timeout: Duration::from_secs(cli.idle_timeout_secs),
        ..ServerConfig::default()
    };
    let state = ServerState::new(config, keys);

    // Shutdown flag shared across all tasks.
    let running = Arc::new(AtomicBool::new(true));
    let running_ctrlc = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            running_ctrlc.store(false, Ordering::Relaxed);
        }
    });

    tokio::spawn(run_sweeper(Arc::clone(&state), Arc::clone(&running)));
    if !cli.no_prompt {
        tokio::spawn(run_issuance_prompt(Arc::clone(&state), Arc::clone(&running)));
    }

    run_server(state, running).await
}
