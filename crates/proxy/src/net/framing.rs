//! Length-prefixed JSON frames.
//!
//! Each frame is a 4-byte big-endian length followed by that many bytes of
//! JSON. A connection opens with `Login` from the joining side, answered by
//! `StartGame`; the server side then sends `Spawn` and waits for
//! `Initialised`. Everything after that is `Packet` frames.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use ultimate_session::packet::Packet;
use ultimate_session::{ClientData, ConnError, GameData, IdentityData};

/// Largest frame body accepted or sent.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum Frame {
    Login {
        identity: IdentityData,
        client: ClientData,
    },
    StartGame {
        data: GameData,
    },
    Spawn,
    Initialised,
    Packet {
        packet: Packet,
    },
}

pub async fn write_frame<W>(write: &mut W, frame: &Frame) -> Result<(), ConnError>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(frame).map_err(|e| ConnError::Protocol(e.to_string()))?;
    if body.len() > MAX_FRAME_LEN {
        return Err(ConnError::Protocol(format!(
            "frame of {} bytes exceeds limit",
            body.len()
        )));
    }
    write.write_u32(body.len() as u32).await?;
    write.write_all(&body).await?;
    write.flush().await?;
    Ok(())
}

/// Read one frame. A clean end of stream before the length prefix is
/// reported as [`ConnError::Closed`].
pub async fn read_frame<R>(read: &mut R) -> Result<Frame, ConnError>
where
    R: AsyncRead + Unpin,
{
    let len = match read.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(ConnError::Closed),
        Err(e) => return Err(e.into()),
    };
    if len > MAX_FRAME_LEN {
        return Err(ConnError::Protocol(format!(
            "frame of {len} bytes exceeds limit"
        )));
    }
    let mut body = vec![0u8; len];
    read.read_exact(&mut body).await?;
    serde_json::from_slice(&body).map_err(|e| ConnError::Protocol(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ultimate_session::packet::Vec3;

    #[tokio::test]
    async fn frames_cross_a_stream_in_order() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        let frames = [
            Frame::Login {
                identity: IdentityData {
                    identity: "b5a1b2a4-5b0e-4e8f-9d0f-5f2a7d0c1e11".into(),
                    display_name: "Steve".into(),
                    ..IdentityData::default()
                },
                client: ClientData::default(),
            },
            Frame::Spawn,
            Frame::Packet {
                packet: Packet::MovePlayer {
                    entity_runtime_id: 1,
                    position: Vec3::new(0.5, 64.0, -3.25),
                    on_ground: true,
                },
            },
        ];

        let writer = async {
            for frame in &frames {
                write_frame(&mut a, frame).await.unwrap();
            }
            drop(a);
        };
        let reader = async {
            let mut got = Vec::new();
            loop {
                match read_frame(&mut b).await {
                    Ok(frame) => got.push(frame),
                    Err(ConnError::Closed) => break,
                    Err(e) => panic!("unexpected error {e}"),
                }
            }
            got
        };
        let ((), got) = tokio::join!(writer, reader);
        assert_eq!(got, frames);
    }

    #[tokio::test]
    async fn oversized_length_is_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_u32(MAX_FRAME_LEN as u32 + 1).await.unwrap();
        assert!(matches!(
            read_frame(&mut b).await,
            Err(ConnError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn garbage_body_is_a_protocol_error() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_u32(3).await.unwrap();
        a.write_all(b"{x}").await.unwrap();
        assert!(matches!(
            read_frame(&mut b).await,
            Err(ConnError::Protocol(_))
        ));
    }

    #[test]
    fn unit_frames_are_tagged() {
        let json = serde_json::to_string(&Frame::Initialised).unwrap();
        assert_eq!(json, r#"{"frame":"initialised"}"#);
    }
}
