//! Packet relay between the client and whichever backend is current.

use std::sync::Arc;

use super::Session;
use crate::packet::Packet;

impl Session {
    /// Spawn one task per relay direction.
    pub(super) fn start_relay(self: &Arc<Self>) {
        tokio::spawn(Arc::clone(self).relay_client_to_server());
        tokio::spawn(Arc::clone(self).relay_server_to_client());
    }

    /// Forward client packets to the current backend. The client going away
    /// ends the session.
    async fn relay_client_to_server(self: Arc<Self>) {
        loop {
            let mut packet = match self.conn.read_packet().await {
                Ok(packet) => packet,
                Err(e) => {
                    if !self.is_closed() {
                        tracing::info!("{} disconnected: {}", self.display_name, e);
                        self.close().await;
                    }
                    return;
                }
            };

            if let Packet::MovePlayer { position, .. } = &packet {
                self.set_position(*position);
            }

            let Some((conn, translator)) = self.current_backend() else {
                return;
            };
            translator.translate(&mut packet);
            if let Err(e) = conn.write_packet(packet).await {
                tracing::debug!("Dropped packet from {} to server: {}", self.display_name, e);
            }
        }
    }

    /// Forward backend packets to the client, tracking the state they make
    /// visible. Switches to the new backend only once a transfer has fully
    /// finished, so nothing from the new backend reaches the client before
    /// the old backend's state has been cleared.
    async fn relay_server_to_client(self: Arc<Self>) {
        let mut switched = self.switched.subscribe();
        'backend: loop {
            let Some((conn, translator)) = self.current_backend() else {
                return;
            };

            loop {
                let result = tokio::select! {
                    changed = switched.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        continue 'backend;
                    }
                    result = conn.read_packet() => result,
                };

                match result {
                    Ok(mut packet) => {
                        // Swapped out mid-transfer: the old backend's view is
                        // being cleared and must not be repopulated.
                        if !self.is_current_backend(&conn) {
                            continue;
                        }
                        translator.translate(&mut packet);
                        self.observe(&packet, translator.original_runtime_id());
                        if let Err(e) = self.conn.write_packet(packet).await {
                            tracing::debug!("Dropped packet to {}: {}", self.display_name, e);
                        }
                    }
                    Err(e) => {
                        if self.is_closed() {
                            return;
                        }
                        if self.is_transferring() || !self.is_current_backend(&conn) {
                            if switched.changed().await.is_err() {
                                return;
                            }
                            continue 'backend;
                        }
                        tracing::warn!("{} lost connection to server: {}", self.display_name, e);
                        self.disconnect("Lost connection to the server").await;
                        return;
                    }
                }
            }
        }
    }

    fn observe(&self, packet: &Packet, self_runtime_id: u64) {
        match packet {
            Packet::ChangeDimension {
                dimension,
                position,
            } => self.set_location(*dimension, *position),
            Packet::MovePlayer {
                entity_runtime_id,
                position,
                ..
            } if *entity_runtime_id == self_runtime_id => self.set_position(*position),
            _ => {}
        }
        self.state.observe(packet, self_runtime_id);
    }
}
