//! duofa device application — entry point.
//!
//! Resolves a session (from the roster file or direct flags), prompts for
//! the identifier the server issued, computes the pin, submits it, and
//! prints the server's verdict.
//!
//! # Usage
//!
//! ```text
//! duofa-device [OPTIONS]
//!
//! Options:
//!   --roster <PATH>    Server roster TOML [default: roster.toml]
//!   --label <LABEL>    Roster entry to use [default: first entry]
//!   --host <HOST>      Direct mode: server host (with --port/--user/--secret)
//!   --port <PORT>      Direct mode: server port
//!   --user <USER>      Direct mode: account name
//!   --secret <SECRET>  Direct mode: shared secret
//! ```
//!
//! Direct mode skips the roster entirely; all four of `--host`, `--port`,
//! `--user`, and `--secret` must be given together.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use duofa_core::MAX_IDENTIFIER;
use duofa_device::domain::session::DeviceSession;
use duofa_device::infrastructure::{authenticate, load_roster};

/// duofa device: computes a time-windowed HMAC pin over a server-issued
/// identifier and submits it for verification.
#[derive(Debug, Parser)]
#[command(name = "duofa-device", about = "duofa two-device 2FA device client", version)]
struct Cli {
    /// Path to the TOML server roster.
    #[arg(long, default_value = "roster.toml", env = "DUOFA_ROSTER")]
    roster: PathBuf,

    /// Label of the roster entry to authenticate against.
    #[arg(long)]
    label: Option<String>,

    /// Direct mode: server host.
    #[arg(long, requires_all = ["port", "user", "secret"])]
    host: Option<String>,

    /// Direct mode: server port.
    #[arg(long, requires = "host")]
    port: Option<u16>,

    /// Direct mode: account name.
    #[arg(long, requires = "host")]
    user: Option<String>,

    /// Direct mode: shared secret.
    #[arg(long, requires = "host")]
    secret: Option<String>,
}

impl Cli {
    /// Resolves the session to authenticate with: direct flags win,
    /// otherwise the roster entry picked by `--label` (or the first one).
    fn resolve_session(&self) -> anyhow::Result<DeviceSession> {
        if let (Some(host), Some(port), Some(user), Some(secret)) =
            (&self.host, self.port, &self.user, &self.secret)
        {
            return Ok(DeviceSession {
                label: "direct".to_string(),
                host: host.clone(),
                port,
                user: user.clone(),
                secret: secret.clone(),
            });
        }

        let roster = load_roster(&self.roster)
            .with_context(|| format!("failed to load roster {}", self.roster.display()))?;
        let session = match &self.label {
            Some(label) => roster
                .select(label)
                .with_context(|| format!("no roster entry labelled '{label}'"))?,
            None => roster
                .first()
                .context("roster is empty and no direct server was given")?,
        };
        Ok(session.clone())
    }
}

/// Prompts on stdout and reads the issued identifier from stdin.
async fn prompt_identifier() -> anyhow::Result<u32> {
    println!("Enter identifier: ");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let line = lines
        .next_line()
        .await
        .context("failed to read identifier from stdin")?
        .context("stdin closed before an identifier was entered")?;
    let identifier: u32 = line
        .trim()
        .parse()
        .with_context(|| format!("'{}' is not a valid identifier", line.trim()))?;
    if identifier > MAX_IDENTIFIER {
        bail!("identifier {identifier} is out of range (0..={MAX_IDENTIFIER})");
    }
    Ok(identifier)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let session = cli.resolve_session()?;

    println!(
        "Authenticating as {} against {}",
        session.user,
        session.server_addr()
    );
    let identifier = prompt_identifier().await?;

    let result = authenticate(&session, identifier)
        .await
        .context("authentication exchange failed")?;
    println!("Got result: {result}");
    Ok(())
}
