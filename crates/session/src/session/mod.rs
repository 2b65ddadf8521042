//! The per-player session: owns the client connection and the current
//! backend connection, and drives login, relay and transfer.
//!
//! Lifecycle:
//!
//! ```text
//! new ──► login (Pending) ──► Ready ──► relay ◄──► transfer
//!              │                          │
//!              └──► Failed                └──► close (exactly once)
//! ```
//!
//! Locking: `backend` is a `std::sync::RwLock` holding the current server,
//! backend connection, in-flight transfer connection and translator as one
//! record. Every critical section is short and never spans an `.await`, so
//! readers always see either the fully old or the fully new backend.

mod illusion;
mod login;
mod relay;
mod transfer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;
use uuid::Uuid;

use crate::balancer::LoadBalancer;
use crate::conn::{Connection, Dialer};
use crate::error::{ConnError, SessionError};
use crate::event::{Handler, NopHandler};
use crate::packet::{Dimension, Packet, Vec3};
use crate::registry::SessionRegistry;
use crate::server::BackendServer;
use crate::state::ClientStateTracker;
use crate::translator::Translator;

pub use illusion::{empty_chunk, placeholder_dimension};

/// Default bound on the login and transfer handshakes.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(60);

/// Ticks of movement history the client keeps for server rewind.
pub const DEFAULT_REWIND_HISTORY_SIZE: i32 = 100;

/// Default bound on each best-effort write or close during teardown.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables for a session's handshakes.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Shared bound on the client game start and backend spawn at login.
    pub login_timeout: Duration,
    /// Bound on dialing and spawning the destination of a transfer.
    pub transfer_timeout: Duration,
    pub rewind_history_size: i32,
    /// Bound on each connection close, and on the disconnect message, so a
    /// stalled peer cannot hold up teardown.
    pub close_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            login_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            transfer_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            rewind_history_size: DEFAULT_REWIND_HISTORY_SIZE,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

/// Outcome of the initial login handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Pending,
    Ready,
    Failed,
}

/// Everything that changes together when the session switches backend.
#[derive(Default)]
struct Backend {
    server: Option<Arc<BackendServer>>,
    conn: Option<Arc<dyn Connection>>,
    /// Destination connection of an in-flight transfer.
    pending: Option<Arc<dyn Connection>>,
    translator: Option<Translator>,
}

/// Where the client currently is, as far as the proxy can tell.
#[derive(Debug, Clone, Copy)]
struct Location {
    dimension: Dimension,
    position: Vec3,
}

/// An active session on the proxy.
pub struct Session {
    uuid: Uuid,
    display_name: String,
    conn: Arc<dyn Connection>,
    registry: Arc<SessionRegistry>,
    dialer: Arc<dyn Dialer>,
    config: SessionConfig,

    handler: RwLock<Arc<dyn Handler>>,
    login: watch::Sender<LoginState>,
    backend: RwLock<Backend>,
    /// Bumped whenever a transfer attempt ends or the session closes, so the
    /// backend reader re-reads which connection is current.
    switched: watch::Sender<u64>,

    state: ClientStateTracker,
    location: Mutex<Location>,

    transferring: AtomicBool,
    closed: AtomicBool,
}

impl Session {
    /// Create a session for a freshly accepted client connection.
    ///
    /// The session is registered before the load balancer is consulted and
    /// unregistered again if no server is available. On success the chosen
    /// server's player count is incremented right away and the login
    /// handshake runs on its own task; this function does not wait for it.
    /// Must be called from within a Tokio runtime.
    pub fn new(
        conn: Arc<dyn Connection>,
        registry: Arc<SessionRegistry>,
        balancer: &dyn LoadBalancer,
        dialer: Arc<dyn Dialer>,
        config: SessionConfig,
    ) -> Result<Arc<Self>, SessionError> {
        let identity = conn.identity_data();
        let uuid = Uuid::parse_str(&identity.identity)
            .map_err(|_| SessionError::InvalidIdentity(identity.identity.clone()))?;

        let (login, _) = watch::channel(LoginState::Pending);
        let (switched, _) = watch::channel(0);
        let session = Arc::new(Self {
            uuid,
            display_name: identity.display_name,
            conn,
            registry: Arc::clone(&registry),
            dialer,
            config,
            handler: RwLock::new(Arc::new(NopHandler)),
            login,
            backend: RwLock::new(Backend::default()),
            switched,
            state: ClientStateTracker::new(),
            location: Mutex::new(Location {
                dimension: Dimension::Overworld,
                position: Vec3::default(),
            }),
            transferring: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        });

        registry.register(Arc::clone(&session));

        let Some(server) = balancer.find_server(&session) else {
            registry.unregister(&session);
            return Err(SessionError::NoServerAvailable);
        };
        server.increment_player_count();
        session.backend_mut().server = Some(Arc::clone(&server));

        tokio::spawn(Arc::clone(&session).login(server));
        Ok(session)
    }

    /// The client connection. Waits for the initial login to resolve.
    pub async fn conn(&self) -> Arc<dyn Connection> {
        self.wait_for_login().await;
        Arc::clone(&self.conn)
    }

    /// The server the session counts against. Waits for the initial login
    /// to resolve; `None` once the session has closed.
    pub async fn server(&self) -> Option<Arc<BackendServer>> {
        self.wait_for_login().await;
        self.backend().server.clone()
    }

    /// The server the session counts against right now, without waiting for
    /// login.
    pub fn current_server(&self) -> Option<Arc<BackendServer>> {
        self.backend().server.clone()
    }

    /// The connection to the current server. Waits for the initial login to
    /// resolve; `None` if login failed or the session has closed.
    pub async fn server_conn(&self) -> Option<Arc<dyn Connection>> {
        self.wait_for_login().await;
        self.backend().conn.clone()
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn client_state(&self) -> &ClientStateTracker {
        &self.state
    }

    /// Current login state, without waiting.
    pub fn login_state(&self) -> LoginState {
        *self.login.borrow()
    }

    /// Wait until the initial login has either succeeded or failed.
    pub async fn wait_for_login(&self) -> LoginState {
        let mut rx = self.login.subscribe();
        rx.wait_for(|state| *state != LoginState::Pending)
            .await
            .map(|state| *state)
            .unwrap_or(LoginState::Failed)
    }

    /// Replace the session's event handler.
    pub fn set_handler(&self, handler: Arc<dyn Handler>) {
        *self.handler.write().expect("session handler lock poisoned") = handler;
    }

    fn handler(&self) -> Arc<dyn Handler> {
        Arc::clone(&self.handler.read().expect("session handler lock poisoned"))
    }

    pub fn is_transferring(&self) -> bool {
        self.transferring.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the session and everything it holds. Only the first call does
    /// anything; it does not wait for a pending login.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.handler().handle_quit();
        self.set_handler(Arc::new(NopHandler));

        self.registry.unregister(self);

        // Bookkeeping first: nothing below may depend on a peer cooperating.
        let (conn, pending, server) = {
            let mut backend = self.backend_mut();
            backend.translator = None;
            (backend.conn.take(), backend.pending.take(), backend.server.take())
        };
        if let Some(server) = server {
            server.decrement_player_count();
        }
        self.switched.send_modify(|n| *n = n.wrapping_add(1));

        tokio::join!(
            self.close_quietly(self.conn.as_ref(), "client"),
            async {
                if let Some(conn) = &conn {
                    self.close_quietly(conn.as_ref(), "server").await;
                }
            },
            async {
                if let Some(pending) = &pending {
                    self.close_quietly(pending.as_ref(), "pending server").await;
                }
            },
        );
        tracing::info!("{} has left the proxy", self.display_name);
    }

    /// Show the client `message` and close the session. An empty message
    /// sends the client straight back to the server list.
    pub async fn disconnect(&self, message: impl Into<String>) {
        let message = message.into();
        let packet = Packet::Disconnect {
            hide_disconnection_screen: message.is_empty(),
            message,
        };
        match timeout(self.config.close_timeout, self.conn.write_packet(packet)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!("Failed to send disconnect to {}: {}", self.display_name, e)
            }
            Err(_) => tracing::debug!("Timed out sending disconnect to {}", self.display_name),
        }
        self.close().await;
    }

    fn backend(&self) -> RwLockReadGuard<'_, Backend> {
        self.backend.read().expect("session backend lock poisoned")
    }

    fn backend_mut(&self) -> RwLockWriteGuard<'_, Backend> {
        self.backend.write().expect("session backend lock poisoned")
    }

    /// The current backend connection and its translator, read together.
    fn current_backend(&self) -> Option<(Arc<dyn Connection>, Translator)> {
        let backend = self.backend();
        match (&backend.conn, backend.translator) {
            (Some(conn), Some(translator)) => Some((Arc::clone(conn), translator)),
            _ => None,
        }
    }

    fn is_current_backend(&self, conn: &Arc<dyn Connection>) -> bool {
        self.backend()
            .conn
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, conn))
    }

    fn location(&self) -> Location {
        *self.location.lock().expect("session location lock poisoned")
    }

    fn set_location(&self, dimension: Dimension, position: Vec3) {
        *self.location.lock().expect("session location lock poisoned") = Location {
            dimension,
            position,
        };
    }

    fn set_position(&self, position: Vec3) {
        self.location
            .lock()
            .expect("session location lock poisoned")
            .position = position;
    }

    async fn dial(&self, server: &BackendServer) -> Result<Arc<dyn Connection>, ConnError> {
        self.dialer
            .dial(
                server.address(),
                self.conn.identity_data().stripped(),
                self.conn.client_data(),
            )
            .await
    }

    /// Close a connection within the close timeout, logging instead of
    /// propagating failures so one bad connection never keeps the others
    /// open.
    async fn close_quietly(&self, conn: &dyn Connection, what: &str) {
        match timeout(self.config.close_timeout, conn.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!("Failed to close {} connection: {}", what, e),
            Err(_) => tracing::debug!(
                "Timed out closing {} connection of {}",
                what,
                self.display_name
            ),
        }
    }
}
