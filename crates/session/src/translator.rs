//! Entity ID translation between the client's view and the current backend.
//!
//! The client learns its own runtime and unique entity IDs once, from the
//! first backend's game start. Every later backend assigns its own IDs, so
//! the proxy swaps the two pairs in every relayed packet. The swap is
//! symmetric, which means the same [`Translator::translate`] call serves both
//! relay directions and an entity on the backend that happens to own the
//! client's original ID is mapped onto the backend's player ID instead of
//! colliding with it.

use crate::conn::GameData;
use crate::packet::Packet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Translator {
    original_runtime_id: u64,
    original_unique_id: i64,
    current_runtime_id: u64,
    current_unique_id: i64,
}

impl Translator {
    /// `original` is the game data the client was started with, `current`
    /// the game data of the backend packets are exchanged with.
    pub fn new(original: &GameData, current: &GameData) -> Self {
        Self {
            original_runtime_id: original.entity_runtime_id,
            original_unique_id: original.entity_unique_id,
            current_runtime_id: current.entity_runtime_id,
            current_unique_id: current.entity_unique_id,
        }
    }

    /// Runtime ID of the player as the client knows it.
    pub fn original_runtime_id(&self) -> u64 {
        self.original_runtime_id
    }

    /// Rewrite every entity ID in `packet` in place.
    pub fn translate(&self, packet: &mut Packet) {
        match packet {
            Packet::AddActor {
                entity_unique_id,
                entity_runtime_id,
                ..
            }
            | Packet::AddPlayer {
                entity_unique_id,
                entity_runtime_id,
                ..
            }
            | Packet::AddItemActor {
                entity_unique_id,
                entity_runtime_id,
                ..
            }
            | Packet::AddPainting {
                entity_unique_id,
                entity_runtime_id,
                ..
            } => {
                *entity_unique_id = self.unique_id(*entity_unique_id);
                *entity_runtime_id = self.runtime_id(*entity_runtime_id);
            }
            Packet::RemoveActor { entity_unique_id } => {
                *entity_unique_id = self.unique_id(*entity_unique_id);
            }
            Packet::BossEvent {
                boss_entity_unique_id,
                ..
            } => {
                *boss_entity_unique_id = self.unique_id(*boss_entity_unique_id);
            }
            Packet::MoveActor {
                entity_runtime_id, ..
            }
            | Packet::MovePlayer {
                entity_runtime_id, ..
            }
            | Packet::MobEffect {
                entity_runtime_id, ..
            }
            | Packet::PlayerAction {
                entity_runtime_id, ..
            } => {
                *entity_runtime_id = self.runtime_id(*entity_runtime_id);
            }
            Packet::PlayerList { entries, .. } => {
                for entry in entries {
                    entry.entity_unique_id = self.unique_id(entry.entity_unique_id);
                }
            }
            _ => {}
        }
    }

    fn runtime_id(&self, id: u64) -> u64 {
        if id == self.original_runtime_id {
            self.current_runtime_id
        } else if id == self.current_runtime_id {
            self.original_runtime_id
        } else {
            id
        }
    }

    fn unique_id(&self, id: i64) -> i64 {
        if id == self.original_unique_id {
            self.current_unique_id
        } else if id == self.current_unique_id {
            self.original_unique_id
        } else {
            id
        }
    }
}
