//! Interactive identifier-issuance prompt.
//!
//! The user asks the server (not the device) for an identifier, reads the
//! six-digit value off the server console, and types it into the device.
//! That out-of-band hop is the second factor's second device.
//!
//! This loop runs on its own task, reading user names from stdin; it is the
//! independent thread of control that makes the registry's internal lock
//! necessary.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::infrastructure::network::ServerState;

/// Reads user names from stdin until EOF or shutdown, printing each user's
/// current identifier (issuing one if needed) and authorization status.
pub async fn run_issuance_prompt(state: Arc<ServerState>, running: Arc<AtomicBool>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("Enter a user name for an identifier (Ctrl-D to stop prompting):");

    while running.load(Ordering::Relaxed) {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("stdin closed; issuance prompt stopped");
                break;
            }
            Err(e) => {
                debug!("stdin read failed: {e}");
                break;
            }
        };

        let user = line.trim();
        if user.is_empty() {
            continue;
        }
        match state.issue_identifier(user) {
            Some(identifier) => {
                // Identifiers are values in [0, 999999]; always show six
                // digits so a leading-zero value is typed correctly.
                println!("Identifier for {user}: {identifier:06}");
                if state.is_authorized(user) {
                    println!("{user} is currently authorized");
                }
            }
            None => println!("User {user} not found"),
        }
    }
}
