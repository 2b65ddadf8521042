//! The subset of game packets the session core inspects or emits.
//!
//! Everything the proxy only needs to pass through travels as
//! [`Packet::Raw`]. Field names follow the Bedrock protocol.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Player or entity position in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// The chunk column this position falls in.
    pub fn chunk(&self) -> ChunkPos {
        ChunkPos {
            x: (self.x.floor() as i32) >> 4,
            z: (self.z.floor() as i32) >> 4,
        }
    }
}

/// Chunk column position (each chunk is 16x16 blocks horizontally).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// This chunk and its eight horizontal neighbours.
    pub fn grid_3x3(self) -> impl Iterator<Item = ChunkPos> {
        (-1..=1).flat_map(move |dx| (-1..=1).map(move |dz| ChunkPos::new(self.x + dx, self.z + dz)))
    }
}

/// The three vanilla dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Overworld,
    Nether,
    End,
}

impl Dimension {
    /// Every dimension, in protocol ID order.
    pub const ALL: [Dimension; 3] = [Dimension::Overworld, Dimension::Nether, Dimension::End];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerListAction {
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerListEntry {
    pub uuid: Uuid,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub entity_unique_id: i64,
}

impl PlayerListEntry {
    /// An entry carrying only the UUID, which is all a removal needs.
    pub fn removal(uuid: Uuid) -> Self {
        Self {
            uuid,
            username: String::new(),
            entity_unique_id: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MobEffectOperation {
    Add,
    Modify,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BossEventType {
    Show,
    Hide,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerActionType {
    Respawn,
    Jump,
    DimensionChangeDone,
    Other(i32),
}

/// A decoded game packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Packet {
    AddActor {
        entity_unique_id: i64,
        entity_runtime_id: u64,
        entity_type: String,
        position: Vec3,
    },
    AddPlayer {
        uuid: Uuid,
        username: String,
        entity_unique_id: i64,
        entity_runtime_id: u64,
        position: Vec3,
    },
    AddItemActor {
        entity_unique_id: i64,
        entity_runtime_id: u64,
        position: Vec3,
    },
    AddPainting {
        entity_unique_id: i64,
        entity_runtime_id: u64,
        position: Vec3,
    },
    RemoveActor {
        entity_unique_id: i64,
    },
    MoveActor {
        entity_runtime_id: u64,
        position: Vec3,
    },
    MovePlayer {
        entity_runtime_id: u64,
        position: Vec3,
        on_ground: bool,
    },
    PlayerList {
        action: PlayerListAction,
        entries: Vec<PlayerListEntry>,
    },
    MobEffect {
        entity_runtime_id: u64,
        operation: MobEffectOperation,
        effect_type: i32,
        #[serde(default)]
        amplifier: i32,
        #[serde(default)]
        duration: i32,
    },
    BossEvent {
        boss_entity_unique_id: i64,
        event_type: BossEventType,
        #[serde(default)]
        title: String,
    },
    SetDisplayObjective {
        display_slot: String,
        objective_name: String,
        display_name: String,
    },
    RemoveObjective {
        objective_name: String,
    },
    ChangeDimension {
        dimension: Dimension,
        position: Vec3,
    },
    StopSound {
        sound_name: String,
        stop_all: bool,
    },
    PlayerAction {
        entity_runtime_id: u64,
        action: PlayerActionType,
    },
    LevelChunk {
        position: ChunkPos,
        sub_chunk_count: u32,
        raw_payload: Vec<u8>,
    },
    Text {
        message: String,
    },
    Disconnect {
        hide_disconnection_screen: bool,
        message: String,
    },
    /// Any packet the proxy forwards without looking inside.
    Raw {
        id: u32,
        payload: Vec<u8>,
    },
}
