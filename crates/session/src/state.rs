//! Tracking of everything the client currently has on screen.
//!
//! A transfer swaps the backend under a running client, so anything the old
//! backend made visible (entities, tab-list entries, effects on the player,
//! boss bars, scoreboard objectives) has to be removed by the proxy before
//! the new backend starts populating the client again.

use std::hash::Hash;

use dashmap::DashSet;
use uuid::Uuid;

use crate::conn::Connection;
use crate::packet::{
    BossEventType, MobEffectOperation, Packet, PlayerListAction, PlayerListEntry,
};

/// Number of tracked members per set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateCounts {
    pub entities: usize,
    pub player_list: usize,
    pub effects: usize,
    pub boss_bars: usize,
    pub scoreboards: usize,
}

impl StateCounts {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Per-session sets of client-visible state.
///
/// All operations take `&self`; the sets are lock-sharded so the relay can
/// keep adding while a clear is in progress.
#[derive(Debug, Default)]
pub struct ClientStateTracker {
    entities: DashSet<i64>,
    player_list: DashSet<Uuid>,
    effects: DashSet<i32>,
    boss_bars: DashSet<i64>,
    scoreboards: DashSet<String>,
}

impl ClientStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entity(&self, unique_id: i64) {
        self.entities.insert(unique_id);
    }

    pub fn remove_entity(&self, unique_id: i64) {
        self.entities.remove(&unique_id);
    }

    pub fn add_player(&self, uuid: Uuid) {
        self.player_list.insert(uuid);
    }

    pub fn remove_player(&self, uuid: &Uuid) {
        self.player_list.remove(uuid);
    }

    pub fn add_effect(&self, effect_type: i32) {
        self.effects.insert(effect_type);
    }

    pub fn remove_effect(&self, effect_type: i32) {
        self.effects.remove(&effect_type);
    }

    pub fn add_boss_bar(&self, unique_id: i64) {
        self.boss_bars.insert(unique_id);
    }

    pub fn remove_boss_bar(&self, unique_id: i64) {
        self.boss_bars.remove(&unique_id);
    }

    pub fn add_scoreboard(&self, objective: impl Into<String>) {
        self.scoreboards.insert(objective.into());
    }

    pub fn remove_scoreboard(&self, objective: &str) {
        self.scoreboards.remove(objective);
    }

    pub fn counts(&self) -> StateCounts {
        StateCounts {
            entities: self.entities.len(),
            player_list: self.player_list.len(),
            effects: self.effects.len(),
            boss_bars: self.boss_bars.len(),
            scoreboards: self.scoreboards.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts().is_empty()
    }

    /// Update the sets from a packet on its way to the client. IDs must
    /// already be in the client's ID space; `self_runtime_id` is the
    /// client's own runtime ID, the only entity whose effects are tracked.
    pub fn observe(&self, packet: &Packet, self_runtime_id: u64) {
        match packet {
            Packet::AddActor {
                entity_unique_id, ..
            }
            | Packet::AddPlayer {
                entity_unique_id, ..
            }
            | Packet::AddItemActor {
                entity_unique_id, ..
            }
            | Packet::AddPainting {
                entity_unique_id, ..
            } => self.add_entity(*entity_unique_id),
            Packet::RemoveActor { entity_unique_id } => self.remove_entity(*entity_unique_id),
            Packet::PlayerList { action, entries } => {
                for entry in entries {
                    match action {
                        PlayerListAction::Add => self.add_player(entry.uuid),
                        PlayerListAction::Remove => self.remove_player(&entry.uuid),
                    }
                }
            }
            Packet::MobEffect {
                entity_runtime_id,
                operation,
                effect_type,
                ..
            } if *entity_runtime_id == self_runtime_id => match operation {
                MobEffectOperation::Add | MobEffectOperation::Modify => {
                    self.add_effect(*effect_type)
                }
                MobEffectOperation::Remove => self.remove_effect(*effect_type),
            },
            Packet::BossEvent {
                boss_entity_unique_id,
                event_type,
                ..
            } => match event_type {
                BossEventType::Show => self.add_boss_bar(*boss_entity_unique_id),
                BossEventType::Hide => self.remove_boss_bar(*boss_entity_unique_id),
                BossEventType::Update => {}
            },
            Packet::SetDisplayObjective { objective_name, .. } => {
                self.add_scoreboard(objective_name.as_str())
            }
            Packet::RemoveObjective { objective_name } => self.remove_scoreboard(objective_name),
            _ => {}
        }
    }

    /// Despawn every tracked entity on the client and forget them.
    pub async fn clear_entities(&self, conn: &dyn Connection) {
        for id in drain(&self.entities) {
            send(conn, Packet::RemoveActor { entity_unique_id: id }).await;
        }
    }

    /// Remove every tracked player-list entry from the client, in one packet.
    pub async fn clear_player_list(&self, conn: &dyn Connection) {
        let entries: Vec<_> = drain(&self.player_list)
            .into_iter()
            .map(PlayerListEntry::removal)
            .collect();
        if entries.is_empty() {
            return;
        }
        send(
            conn,
            Packet::PlayerList {
                action: PlayerListAction::Remove,
                entries,
            },
        )
        .await;
    }

    /// Remove every tracked effect from the client's own player.
    pub async fn clear_effects(&self, conn: &dyn Connection, self_runtime_id: u64) {
        for effect_type in drain(&self.effects) {
            send(
                conn,
                Packet::MobEffect {
                    entity_runtime_id: self_runtime_id,
                    operation: MobEffectOperation::Remove,
                    effect_type,
                    amplifier: 0,
                    duration: 0,
                },
            )
            .await;
        }
    }

    pub async fn clear_boss_bars(&self, conn: &dyn Connection) {
        for id in drain(&self.boss_bars) {
            send(
                conn,
                Packet::BossEvent {
                    boss_entity_unique_id: id,
                    event_type: BossEventType::Hide,
                    title: String::new(),
                },
            )
            .await;
        }
    }

    pub async fn clear_scoreboards(&self, conn: &dyn Connection) {
        for objective_name in drain(&self.scoreboards) {
            send(conn, Packet::RemoveObjective { objective_name }).await;
        }
    }

    /// Clear all five sets, notifying the client of every removal.
    pub async fn clear_all(&self, conn: &dyn Connection, self_runtime_id: u64) {
        self.clear_entities(conn).await;
        self.clear_player_list(conn).await;
        self.clear_effects(conn, self_runtime_id).await;
        self.clear_boss_bars(conn).await;
        self.clear_scoreboards(conn).await;
    }
}

/// Remove every member present when the call starts and return the ones this
/// call actually removed. Collect first, then remove: removing while the
/// iterator holds shard locks would deadlock. A member removed concurrently
/// by someone else is not returned, so no member is ever reported twice.
fn drain<K>(set: &DashSet<K>) -> Vec<K>
where
    K: Eq + Hash + Clone,
{
    let members: Vec<K> = set.iter().map(|entry| entry.key().clone()).collect();
    members
        .into_iter()
        .filter_map(|member| set.remove(&member))
        .collect()
}

async fn send(conn: &dyn Connection, packet: Packet) {
    if let Err(e) = conn.write_packet(packet).await {
        tracing::debug!("Failed to send state removal to client: {}", e);
    }
}
