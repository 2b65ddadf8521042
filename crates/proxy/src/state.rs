//! State shared by the accept loop, the dashboard and shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use ultimate_session::{
    BackendServer, Dialer, Session, SessionConfig, SessionRegistry, TransferError,
};

use crate::balancer::{LeastLoaded, ServerList};
use crate::config::ProxyConfig;
use crate::dashboard::Metrics;

pub struct ProxyState {
    pub registry: Arc<SessionRegistry>,
    pub servers: Arc<ServerList>,
    pub balancer: LeastLoaded,
    pub dialer: Arc<dyn Dialer>,
    pub metrics: Metrics,
    pub session_config: SessionConfig,
    pub handshake_timeout: Duration,
}

impl ProxyState {
    pub fn new(config: &ProxyConfig, dialer: Arc<dyn Dialer>) -> Self {
        let servers = Arc::new(ServerList::new(&config.servers));
        Self {
            registry: Arc::new(SessionRegistry::new()),
            balancer: LeastLoaded::new(Arc::clone(&servers)),
            servers,
            dialer,
            metrics: Metrics::new(),
            session_config: config.session_config(),
            handshake_timeout: config.handshake_timeout(),
        }
    }

    /// Transfer `session` to `server`, recording the outcome.
    pub async fn transfer(
        &self,
        session: &Arc<Session>,
        server: Arc<BackendServer>,
    ) -> Result<(), TransferError> {
        let result = session.transfer(server).await;
        match &result {
            Ok(()) => self.metrics.transfer_completed(),
            // Rejected before any work was done.
            Err(TransferError::AlreadyTransferring | TransferError::Cancelled) => {}
            Err(_) => self.metrics.transfer_failed(),
        }
        result
    }

    /// Disconnect every registered session with `message`.
    pub async fn disconnect_all(&self, message: &str) {
        let mut tasks = JoinSet::new();
        for session in self.registry.all() {
            let message = message.to_string();
            tasks.spawn(async move { session.disconnect(message).await });
        }
        let count = tasks.len();
        while tasks.join_next().await.is_some() {}
        tracing::info!("Disconnected {} sessions", count);
    }
}
