//! In-memory connections, dialer and handlers shared by the session tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, mpsc, watch};
use ultimate_session::balancer::LoadBalancer;
use ultimate_session::conn::{ClientData, Connection, Dialer, GameData, IdentityData};
use ultimate_session::error::ConnError;
use ultimate_session::event::{Context, Handler};
use ultimate_session::packet::{Dimension, Packet, Vec3};
use ultimate_session::registry::SessionRegistry;
use ultimate_session::server::BackendServer;
use ultimate_session::session::{Session, SessionConfig};
use uuid::Uuid;

pub const CLIENT_XUID: &str = "2535412345678901";

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// A connection whose inbound side is fed by the test and whose outbound side
/// is recorded for inspection.
pub struct MockConn {
    identity: IdentityData,
    client: ClientData,
    game: Mutex<GameData>,
    inbound_tx: mpsc::UnboundedSender<Packet>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Packet>>,
    sent: Mutex<Vec<Packet>>,
    started: Mutex<Option<GameData>>,
    closed: watch::Sender<bool>,
    close_calls: AtomicUsize,
    fail_spawn: AtomicBool,
    hang_spawn: AtomicBool,
    fail_close: AtomicBool,
    hang_close: AtomicBool,
    hang_write: AtomicBool,
}

impl MockConn {
    fn new(identity: IdentityData, game: GameData) -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);
        Arc::new(Self {
            identity,
            client: ClientData {
                game_version: "1.21.50".into(),
                device_model: "test".into(),
                ..ClientData::default()
            },
            game: Mutex::new(game),
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            sent: Mutex::new(Vec::new()),
            started: Mutex::new(None),
            closed,
            close_calls: AtomicUsize::new(0),
            fail_spawn: AtomicBool::new(false),
            hang_spawn: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
            hang_close: AtomicBool::new(false),
            hang_write: AtomicBool::new(false),
        })
    }

    /// A client connection with a fresh identity and an XUID.
    pub fn client(name: &str) -> Arc<Self> {
        Self::new(
            IdentityData {
                xuid: CLIENT_XUID.into(),
                identity: Uuid::new_v4().to_string(),
                display_name: name.into(),
                title_id: String::new(),
            },
            GameData::default(),
        )
    }

    /// A backend connection that reports `game` at game start.
    pub fn backend(game: GameData) -> Arc<Self> {
        Self::new(IdentityData::default(), game)
    }

    pub fn failing_spawn(self: Arc<Self>) -> Arc<Self> {
        self.fail_spawn.store(true, Ordering::SeqCst);
        self
    }

    pub fn hanging_spawn(self: Arc<Self>) -> Arc<Self> {
        self.hang_spawn.store(true, Ordering::SeqCst);
        self
    }

    /// Close reports an error after shutting the connection down.
    pub fn failing_close(self: Arc<Self>) -> Arc<Self> {
        self.fail_close.store(true, Ordering::SeqCst);
        self
    }

    /// Close never returns, like a socket whose peer stopped reading.
    pub fn hanging_close(self: Arc<Self>) -> Arc<Self> {
        self.hang_close.store(true, Ordering::SeqCst);
        self
    }

    /// Writes never complete.
    pub fn hanging_write(self: Arc<Self>) -> Arc<Self> {
        self.hang_write.store(true, Ordering::SeqCst);
        self
    }

    /// Deliver a packet as if the peer had sent it.
    pub fn push(&self, packet: Packet) {
        let _ = self.inbound_tx.send(packet);
    }

    pub fn sent(&self) -> Vec<Packet> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self, pred: impl Fn(&Packet) -> bool) -> usize {
        self.sent.lock().unwrap().iter().filter(|p| pred(p)).count()
    }

    pub fn started_with(&self) -> Option<GameData> {
        self.started.lock().unwrap().clone()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

async fn wait_closed(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|closed| *closed).await;
}

#[async_trait]
impl Connection for MockConn {
    fn identity_data(&self) -> IdentityData {
        self.identity.clone()
    }

    fn client_data(&self) -> ClientData {
        self.client.clone()
    }

    fn game_data(&self) -> GameData {
        self.game.lock().unwrap().clone()
    }

    async fn read_packet(&self) -> Result<Packet, ConnError> {
        let closed = self.closed.subscribe();
        let mut rx = self.inbound_rx.lock().await;
        tokio::select! {
            biased;
            _ = wait_closed(closed) => Err(ConnError::Closed),
            packet = rx.recv() => packet.ok_or(ConnError::Closed),
        }
    }

    async fn write_packet(&self, packet: Packet) -> Result<(), ConnError> {
        if self.is_closed() {
            return Err(ConnError::Closed);
        }
        if self.hang_write.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.sent.lock().unwrap().push(packet);
        Ok(())
    }

    async fn start_game(&self, data: GameData) -> Result<(), ConnError> {
        *self.started.lock().unwrap() = Some(data.clone());
        *self.game.lock().unwrap() = data;
        Ok(())
    }

    async fn do_spawn(&self) -> Result<(), ConnError> {
        if self.hang_spawn.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_spawn.load(Ordering::SeqCst) {
            return Err(ConnError::Protocol("spawn refused".into()));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), ConnError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_close.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.closed.send_replace(true);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(ConnError::Protocol("close refused".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Dialer
// ---------------------------------------------------------------------------

/// What the dialer does for the next dial of an address.
pub enum Plan {
    Connect(Arc<MockConn>),
    /// Wait for the gate to be opened, then connect.
    Gated(Arc<Notify>, Arc<MockConn>),
}

#[derive(Default)]
pub struct MockDialer {
    plans: Mutex<HashMap<String, VecDeque<Plan>>>,
    dials: Mutex<Vec<(String, IdentityData)>>,
}

impl MockDialer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue `plan` for the next dial of `address`. Dials with nothing
    /// queued fail.
    pub fn expect(&self, address: &str, plan: Plan) {
        self.plans
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_default()
            .push_back(plan);
    }

    pub fn dial_count(&self, address: &str) -> usize {
        self.dials
            .lock()
            .unwrap()
            .iter()
            .filter(|(a, _)| a == address)
            .count()
    }

    pub fn identities(&self) -> Vec<IdentityData> {
        self.dials.lock().unwrap().iter().map(|(_, i)| i.clone()).collect()
    }
}

#[async_trait]
impl Dialer for MockDialer {
    async fn dial(
        &self,
        address: &str,
        identity: IdentityData,
        _client: ClientData,
    ) -> Result<Arc<dyn Connection>, ConnError> {
        self.dials
            .lock()
            .unwrap()
            .push((address.to_string(), identity));
        let plan = self
            .plans
            .lock()
            .unwrap()
            .get_mut(address)
            .and_then(|queue| queue.pop_front());
        match plan {
            Some(Plan::Connect(conn)) => Ok(conn),
            Some(Plan::Gated(gate, conn)) => {
                gate.notified().await;
                Ok(conn)
            }
            None => Err(ConnError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("nothing listening on {address}"),
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Balancer and handlers
// ---------------------------------------------------------------------------

/// Always picks the same server (or none).
pub struct FixedBalancer(pub Option<Arc<BackendServer>>);

impl LoadBalancer for FixedBalancer {
    fn find_server(&self, _session: &Session) -> Option<Arc<BackendServer>> {
        self.0.clone()
    }
}

#[derive(Default)]
pub struct RecordingHandler {
    pub cancel_transfers: bool,
    pub quits: AtomicUsize,
    pub transfers: Mutex<Vec<String>>,
}

impl Handler for RecordingHandler {
    fn handle_transfer(&self, ctx: &mut Context, server: &Arc<BackendServer>) {
        self.transfers.lock().unwrap().push(server.name().to_string());
        if self.cancel_transfers {
            ctx.cancel();
        }
    }

    fn handle_quit(&self) {
        self.quits.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn game(dimension: Dimension, runtime_id: u64, position: Vec3) -> GameData {
    GameData {
        world_name: "test".into(),
        dimension,
        player_position: position,
        entity_unique_id: runtime_id as i64,
        entity_runtime_id: runtime_id,
        ..GameData::default()
    }
}

pub fn server(name: &str) -> Arc<BackendServer> {
    Arc::new(BackendServer::new(name, format!("{name}.test:19132")))
}

/// Everything a session test needs, with server `a` as the initial backend.
pub struct Fixture {
    pub registry: Arc<SessionRegistry>,
    pub dialer: Arc<MockDialer>,
    pub a: Arc<BackendServer>,
    pub backend_a: Arc<MockConn>,
    pub client: Arc<MockConn>,
}

impl Fixture {
    pub fn new() -> Self {
        let a = server("a");
        let backend_a = MockConn::backend(game(Dimension::Overworld, 1, Vec3::new(8.0, 64.0, 8.0)));
        let dialer = MockDialer::new();
        dialer.expect(a.address(), Plan::Connect(Arc::clone(&backend_a)));
        Self {
            registry: Arc::new(SessionRegistry::new()),
            dialer,
            a,
            backend_a,
            client: MockConn::client("Steve"),
        }
    }

    pub fn start(&self) -> Arc<Session> {
        self.start_with(SessionConfig::default())
    }

    pub fn start_with(&self, config: SessionConfig) -> Arc<Session> {
        Session::new(
            self.client.clone(),
            Arc::clone(&self.registry),
            &FixedBalancer(Some(Arc::clone(&self.a))),
            self.dialer.clone(),
            config,
        )
        .expect("session should start")
    }
}

/// Poll `cond` until it holds, failing the test after a few seconds.
pub async fn eventually(what: &str, cond: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
