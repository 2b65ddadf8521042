//! Connection contracts consumed by the session core.
//!
//! The byte-level transport (framing, encryption, compression, packet
//! codec) lives behind [`Connection`]. A session holds one client-facing
//! connection for its whole life and one backend-facing connection that is
//! replaced on every successful transfer.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ConnError;
use crate::packet::{Dimension, Packet, Vec3};

/// Identity claims a client presents at login.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityData {
    /// Xbox Live user ID. Only present on authenticated connections, and
    /// never forwarded to a backend.
    #[serde(default)]
    pub xuid: String,
    /// UUID string identifying the player.
    pub identity: String,
    pub display_name: String,
    #[serde(default)]
    pub title_id: String,
}

impl IdentityData {
    /// A copy safe to hand to a backend: the XUID, which only the proxy is
    /// trusted with, is removed.
    pub fn stripped(&self) -> Self {
        Self {
            xuid: String::new(),
            ..self.clone()
        }
    }
}

/// Appearance and device data a client presents at login.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientData {
    #[serde(default)]
    pub game_version: String,
    #[serde(default)]
    pub device_model: String,
    #[serde(default)]
    pub device_os: i32,
    #[serde(default)]
    pub language_code: String,
    #[serde(default)]
    pub skin_id: String,
    #[serde(default)]
    pub skin_data: Vec<u8>,
}

/// Who is authoritative over player movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    #[default]
    Client,
    Server,
    ServerWithRewind,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MovementSettings {
    pub movement_type: MovementType,
    /// Number of ticks of history kept for rewind-based reconciliation.
    pub rewind_history_size: i32,
    pub server_authoritative_block_breaking: bool,
}

/// World and player data exchanged at game start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameData {
    pub world_name: String,
    pub dimension: Dimension,
    pub player_position: Vec3,
    pub entity_unique_id: i64,
    pub entity_runtime_id: u64,
    #[serde(default)]
    pub player_movement_settings: MovementSettings,
}

impl Default for GameData {
    fn default() -> Self {
        Self {
            world_name: String::new(),
            dimension: Dimension::Overworld,
            player_position: Vec3::default(),
            entity_unique_id: 1,
            entity_runtime_id: 1,
            player_movement_settings: MovementSettings::default(),
        }
    }
}

/// An ordered, message-based, bidirectional channel to a single peer.
///
/// One reader and one writer may use a connection concurrently.
/// `read_packet` must be cancel safe: the relay races it against backend
/// switches and drops the future when the backend changes.
#[async_trait]
pub trait Connection: Send + Sync {
    fn identity_data(&self) -> IdentityData;

    fn client_data(&self) -> ClientData;

    /// Game data of this connection. For a backend connection this is what
    /// the backend sent at game start; for the client connection it is what
    /// the proxy sent in [`start_game`](Connection::start_game).
    fn game_data(&self) -> GameData;

    async fn read_packet(&self) -> Result<Packet, ConnError>;

    async fn write_packet(&self, packet: Packet) -> Result<(), ConnError>;

    /// Client side: send the game start sequence and wait until the client
    /// reports it has spawned.
    async fn start_game(&self, data: GameData) -> Result<(), ConnError>;

    /// Backend side: drive the spawn sequence until the backend considers
    /// the player spawned.
    async fn do_spawn(&self) -> Result<(), ConnError>;

    async fn close(&self) -> Result<(), ConnError>;
}

/// Opens backend connections on behalf of a client.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(
        &self,
        address: &str,
        identity: IdentityData,
        client: ClientData,
    ) -> Result<Arc<dyn Connection>, ConnError>;
}
