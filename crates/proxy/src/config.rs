//! Proxy configuration: a JSON file with command-line overrides.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use ultimate_session::SessionConfig;

/// A backend entry in the configuration file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerEntry {
    pub name: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub bind: String,
    pub dashboard_port: u16,
    pub login_timeout_secs: u64,
    pub transfer_timeout_secs: u64,
    /// Bound on reading the client's login frame after accept.
    pub handshake_timeout_secs: u64,
    /// Bound on each connection close while a session tears down.
    pub close_timeout_secs: u64,
    pub rewind_history_size: i32,
    pub servers: Vec<ServerEntry>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:19132".into(),
            dashboard_port: 8000,
            login_timeout_secs: 60,
            transfer_timeout_secs: 60,
            handshake_timeout_secs: 10,
            close_timeout_secs: 5,
            rewind_history_size: ultimate_session::session::DEFAULT_REWIND_HISTORY_SIZE,
            servers: vec![ServerEntry {
                name: "lobby".into(),
                address: "127.0.0.1:19133".into(),
            }],
        }
    }
}

impl ProxyConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).context("invalid proxy config")?;
        if config.servers.is_empty() {
            anyhow::bail!("proxy config lists no servers");
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Build the configuration from the process arguments: `--config` names
    /// the file, `--bind` and `--dashboard-port` override it.
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut config = match flag(args, "--config") {
            Some(path) => Self::load(Path::new(path))?,
            None => Self::default(),
        };
        if let Some(bind) = flag(args, "--bind") {
            config.bind = bind.to_string();
        }
        if let Some(port) = flag(args, "--dashboard-port") {
            config.dashboard_port = port
                .parse()
                .with_context(|| format!("invalid dashboard port {port:?}"))?;
        }
        Ok(config)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            login_timeout: Duration::from_secs(self.login_timeout_secs),
            transfer_timeout: Duration::from_secs(self.transfer_timeout_secs),
            rewind_history_size: self.rewind_history_size,
            close_timeout: Duration::from_secs(self.close_timeout_secs),
        }
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

/// The value following `name` on the command line.
fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .skip_while(|a| *a != name)
        .nth(1)
        .map(String::as_str)
}
