//! Authentication listener: accept loop, shared state, and the sweep tick.
//!
//! One listener task accepts connections and hands each socket to its own
//! [`ServerConnection`] task, so a slow or stalled device never delays the
//! others. A separate tick task sweeps expired identifiers and
//! authorizations once per [`crate::domain::config::ServerConfig::tick_interval`].
//!
//! The identifier-issuance entry point (`ServerState::issue_identifier`)
//! is called from outside the listener — the interactive prompt task in the
//! binary, or any embedding application — and contends with connection
//! tasks on the registry's internal lock. That contention is the reason the
//! registry is synchronized at all.

pub mod connection;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::time::{interval, timeout};
use tracing::{debug, error, info, warn};

use duofa_core::unix_now;

use crate::application::registry::Registry;
use crate::domain::config::ServerConfig;
use crate::domain::keys::SecretKeyTable;

use connection::ServerConnection;

/// Shared server state: the registry, the key table, and the config.
///
/// Wrapped in an `Arc` once at startup and shared by the accept loop, every
/// connection task, the sweep tick, and the issuance entry point. Only the
/// registry is mutable, and it synchronizes itself.
pub struct ServerState {
    pub registry: Registry,
    pub keys: SecretKeyTable,
    pub config: ServerConfig,
}

impl ServerState {
    pub fn new(config: ServerConfig, keys: SecretKeyTable) -> Arc<Self> {
        Arc::new(Self {
            registry: Registry::new(),
            keys,
            config,
        })
    }

    /// Issuance entry point: returns the user's current identifier, minting
    /// a fresh one if the existing one is missing or near expiry.
    ///
    /// Returns `None` for users with no provisioned secret — an identifier
    /// for an unknown user could never verify, so none is issued.
    pub fn issue_identifier(&self, user: &str) -> Option<u32> {
        if !self.keys.contains_user(user) {
            return None;
        }
        Some(self.registry.issue_identifier(user, unix_now()))
    }

    /// True while `user` holds an unexpired authorization grant.
    pub fn is_authorized(&self, user: &str) -> bool {
        self.registry.is_authorized(user, unix_now())
    }
}

/// Binds the configured address and runs the accept loop until `running`
/// is cleared.
///
/// # Errors
///
/// Binding is the only fatal failure — a busy port or missing permission is
/// reported with context and the caller exits. Accept failures after that
/// are transient (file-descriptor pressure, peer resets) and only logged.
pub async fn run_server(state: Arc<ServerState>, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(state.config.bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", state.config.bind_addr))?;
    info!("listening on {}", state.config.bind_addr);
    serve_listener(listener, state, running).await;
    Ok(())
}

/// Accept loop over an already-bound listener.
///
/// Split out from [`run_server`] so integration tests can bind port 0
/// themselves and learn the real address before serving.
pub async fn serve_listener(
    listener: TcpListener,
    state: Arc<ServerState>,
    running: Arc<AtomicBool>,
) {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // Bounded accept wait so the loop can observe the shutdown flag
        // even when no devices are connecting.
        match timeout(Duration::from_millis(200), listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                debug!("accepted connection from {peer}");
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let engine = ServerConnection::new(stream, peer, state.config.idle_timeout);
                    // Per-connection errors end here: the offending
                    // connection is dropped, the listener is unaffected.
                    if let Err(e) = engine.serve(&state.registry, &state.keys).await {
                        warn!("connection from {peer} failed: {e}");
                    }
                });
            }
            Ok(Err(e)) => {
                error!("accept error: {e}");
            }
            Err(_) => {
                // Accept timeout — loop back and recheck the running flag.
            }
        }
    }
}

/// Sweeps expired registry state once per tick until `running` is cleared.
pub async fn run_sweeper(state: Arc<ServerState>, running: Arc<AtomicBool>) {
    let mut ticker = interval(state.config.tick_interval);
    while running.load(Ordering::Relaxed) {
        ticker.tick().await;
        let now = unix_now();
        state.registry.sweep_authorizations(now);
        state.registry.sweep_identifiers(now);
    }
    debug!("sweeper stopped");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
