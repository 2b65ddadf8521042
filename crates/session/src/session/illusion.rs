//! Client-side cover for a backend switch.
//!
//! While the destination backend takes over, the client is parked in a
//! dimension that neither backend is using. The dimension change forces the
//! client onto a loading screen instead of showing the stale world, and a
//! few empty chunks around the player keep it from asking the old backend
//! for terrain.

use super::Session;
use crate::packet::{ChunkPos, Dimension, Packet, PlayerActionType, Vec3};

/// Sub-chunk format version written by [`empty_chunk`].
const SUB_CHUNK_VERSION: u8 = 9;

/// Pick a dimension different from both `old` and `new`.
///
/// Scans the three vanilla dimensions in order. With only three candidates
/// and two exclusions there is always a match.
pub fn placeholder_dimension(old: Dimension, new: Dimension) -> Dimension {
    Dimension::ALL
        .into_iter()
        .find(|dimension| *dimension != old && *dimension != new)
        .unwrap_or(Dimension::Overworld)
}

/// Level chunk payload with a single empty sub-chunk and uniform biomes for
/// `dimension`.
pub fn empty_chunk(dimension: Dimension) -> Vec<u8> {
    // (biome sections, lowest sub-chunk index, biome id)
    let (sections, lowest, biome): (usize, i8, i32) = match dimension {
        Dimension::Overworld => (24, -4, 1),
        Dimension::Nether => (8, 0, 8),
        Dimension::End => (16, 0, 9),
    };

    let mut buf = Vec::with_capacity(4 + sections * 2);
    // Sub-chunk header: version, zero block storages, Y index.
    buf.push(SUB_CHUNK_VERSION);
    buf.push(0);
    buf.push(lowest as u8);
    // One single-value biome palette per section.
    for _ in 0..sections {
        buf.push(1);
        write_var_i32(&mut buf, biome);
    }
    // No border blocks.
    buf.push(0);
    buf
}

fn write_var_i32(buf: &mut Vec<u8>, value: i32) {
    let mut v = ((value << 1) ^ (value >> 31)) as u32;
    while v >= 0x80 {
        buf.push((v as u8) | 0x80);
        v >>= 7;
    }
    buf.push(v as u8);
}

impl Session {
    /// Move the client into `dimension` at `position`.
    pub(super) async fn change_dimension(
        &self,
        dimension: Dimension,
        position: Vec3,
        runtime_id: u64,
    ) {
        let packets = [
            Packet::ChangeDimension {
                dimension,
                position,
            },
            Packet::StopSound {
                sound_name: String::new(),
                stop_all: true,
            },
            Packet::PlayerAction {
                entity_runtime_id: runtime_id,
                action: PlayerActionType::DimensionChangeDone,
            },
        ];
        for packet in packets {
            if let Err(e) = self.conn.write_packet(packet).await {
                tracing::debug!("Failed to change dimension of {}: {}", self.display_name, e);
            }
        }
    }

    /// Send empty chunks for the 3x3 grid around `center`.
    pub(super) async fn send_empty_chunks(&self, dimension: Dimension, center: ChunkPos) {
        let payload = empty_chunk(dimension);
        for position in center.grid_3x3() {
            let packet = Packet::LevelChunk {
                position,
                sub_chunk_count: 1,
                raw_payload: payload.clone(),
            };
            if let Err(e) = self.conn.write_packet(packet).await {
                tracing::debug!("Failed to send placeholder chunk to {}: {}", self.display_name, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_avoids_both_dimensions() {
        for old in Dimension::ALL {
            for new in Dimension::ALL {
                let placeholder = placeholder_dimension(old, new);
                assert_ne!(placeholder, old);
                assert_ne!(placeholder, new);
            }
        }
    }

    #[test]
    fn placeholder_prefers_first_free() {
        assert_eq!(
            placeholder_dimension(Dimension::Overworld, Dimension::Overworld),
            Dimension::Nether
        );
        assert_eq!(
            placeholder_dimension(Dimension::Nether, Dimension::Nether),
            Dimension::Overworld
        );
        assert_eq!(
            placeholder_dimension(Dimension::Overworld, Dimension::Nether),
            Dimension::End
        );
    }

    #[test]
    fn empty_chunk_layout() {
        let overworld = empty_chunk(Dimension::Overworld);
        // header (3) + 24 sections of (palette header, 1-byte biome) + border
        assert_eq!(overworld.len(), 3 + 24 * 2 + 1);
        assert_eq!(overworld[0], SUB_CHUNK_VERSION);
        assert_eq!(overworld[2], (-4i8) as u8);
        assert_eq!(overworld[3..5], [1, 2]);
        assert_eq!(*overworld.last().unwrap(), 0);

        let nether = empty_chunk(Dimension::Nether);
        assert_eq!(nether.len(), 3 + 8 * 2 + 1);
        assert_eq!(nether[3..5], [1, 16]);
    }

    #[test]
    fn var_i32_zigzag() {
        let mut buf = Vec::new();
        write_var_i32(&mut buf, -1);
        assert_eq!(buf, [1]);
        buf.clear();
        write_var_i32(&mut buf, 64);
        assert_eq!(buf, [0x80, 0x01]);
    }
}
