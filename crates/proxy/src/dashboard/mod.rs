//! Status and admin dashboard.
//!
//! Everything here reads shared state without waiting on sessions: player
//! counts are atomics and the session list is a registry snapshot.

pub mod metrics;
pub mod server;

use serde::Serialize;
use uuid::Uuid;

use crate::state::ProxyState;

pub use metrics::{Metrics, MetricsSnapshot};

// ── Snapshot types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub metrics: MetricsSnapshot,
    pub servers: Vec<ServerStatus>,
    pub sessions: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    pub name: String,
    pub address: String,
    pub players: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub uuid: Uuid,
    pub name: String,
    pub server: Option<String>,
    pub transferring: bool,
}

// ── Snapshot builders ────────────────────────────────────────────────────

pub fn status(state: &ProxyState) -> StatusSnapshot {
    StatusSnapshot {
        metrics: state.metrics.snapshot(),
        servers: state
            .servers
            .iter()
            .map(|s| ServerStatus {
                name: s.name().to_string(),
                address: s.address().to_string(),
                players: s.player_count(),
            })
            .collect(),
        sessions: state.registry.len(),
    }
}

/// Registered sessions, sorted by display name.
pub fn sessions(state: &ProxyState) -> Vec<SessionSummary> {
    let mut sessions: Vec<_> = state
        .registry
        .all()
        .into_iter()
        .map(|s| SessionSummary {
            uuid: s.uuid(),
            name: s.display_name().to_string(),
            server: s.current_server().map(|server| server.name().to_string()),
            transferring: s.is_transferring(),
        })
        .collect();
    sessions.sort_by(|a, b| a.name.cmp(&b.name));
    sessions
}
