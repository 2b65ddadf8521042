//! TCP implementation of the session core's connection contract.
//!
//! A reader task decodes frames off the socket as they arrive. Game packets
//! go to one channel, handshake frames to another, so `read_packet` is a
//! plain channel receive and stays cancel safe.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex as AsyncMutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use ultimate_session::packet::Packet;
use ultimate_session::{ClientData, ConnError, Connection, GameData, IdentityData};

use super::framing::{Frame, read_frame, write_frame};

/// Packets buffered ahead of the relay before the reader applies
/// backpressure to the socket.
const PACKET_BUFFER: usize = 256;

pub struct TcpConnection {
    peer: SocketAddr,
    identity: IdentityData,
    client: ClientData,
    game: Mutex<GameData>,
    writer: AsyncMutex<Option<OwnedWriteHalf>>,
    packets: AsyncMutex<mpsc::Receiver<Packet>>,
    control: AsyncMutex<mpsc::Receiver<Frame>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    /// Set by `close`; aborts any write in flight so the writer lock frees up.
    closed: watch::Sender<bool>,
}

impl TcpConnection {
    /// Accept a joining client: wait for its `Login` frame.
    pub async fn accept(stream: TcpStream, handshake_timeout: Duration) -> Result<Arc<Self>, ConnError> {
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let (read, write) = stream.into_split();
        let (packets, mut control, reader) = spawn_reader(read, peer);

        let login = match timeout(handshake_timeout, control.recv()).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                reader.abort();
                return Err(ConnError::Closed);
            }
            Err(_) => {
                reader.abort();
                return Err(ConnError::Timeout);
            }
        };
        let Frame::Login { identity, client } = login else {
            reader.abort();
            return Err(ConnError::Protocol(format!("expected login from {peer}")));
        };

        Ok(Self::assemble(peer, identity, client, GameData::default(), write, packets, control, reader))
    }

    /// Join a backend as `identity`: send `Login` and wait for its game data.
    pub async fn connect(
        address: &str,
        identity: IdentityData,
        client: ClientData,
    ) -> Result<Arc<Self>, ConnError> {
        let stream = TcpStream::connect(address).await?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let (read, mut write) = stream.into_split();

        write_frame(
            &mut write,
            &Frame::Login {
                identity: identity.clone(),
                client: client.clone(),
            },
        )
        .await?;

        let (packets, mut control, reader) = spawn_reader(read, peer);
        let data = match control.recv().await {
            Some(Frame::StartGame { data }) => data,
            Some(other) => {
                reader.abort();
                return Err(ConnError::Protocol(format!(
                    "expected game start from {peer}, got {other:?}"
                )));
            }
            None => {
                reader.abort();
                return Err(ConnError::Closed);
            }
        };

        Ok(Self::assemble(peer, identity, client, data, write, packets, control, reader))
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        peer: SocketAddr,
        identity: IdentityData,
        client: ClientData,
        game: GameData,
        write: OwnedWriteHalf,
        packets: mpsc::Receiver<Packet>,
        control: mpsc::Receiver<Frame>,
        reader: JoinHandle<()>,
    ) -> Arc<Self> {
        Arc::new(Self {
            peer,
            identity,
            client,
            game: Mutex::new(game),
            writer: AsyncMutex::new(Some(write)),
            packets: AsyncMutex::new(packets),
            control: AsyncMutex::new(control),
            reader: Mutex::new(Some(reader)),
            closed: watch::channel(false).0,
        })
    }

    /// Write one frame. A peer that stops reading can stall this forever, so
    /// it gives up as soon as the connection is closed.
    async fn send(&self, frame: &Frame) -> Result<(), ConnError> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(ConnError::Closed);
        }
        tokio::select! {
            () = wait_closed(closed) => Err(ConnError::Closed),
            result = async {
                let mut writer = self.writer.lock().await;
                let write = writer.as_mut().ok_or(ConnError::Closed)?;
                write_frame(write, frame).await
            } => result,
        }
    }

    async fn expect_control(&self, want: &str, is_expected: fn(&Frame) -> bool) -> Result<(), ConnError> {
        match self.control.lock().await.recv().await {
            Some(frame) if is_expected(&frame) => Ok(()),
            Some(frame) => Err(ConnError::Protocol(format!(
                "expected {want} from {}, got {frame:?}",
                self.peer
            ))),
            None => Err(ConnError::Closed),
        }
    }
}

async fn wait_closed(mut closed: watch::Receiver<bool>) {
    let _ = closed.wait_for(|closed| *closed).await;
}

/// Spawn the task that owns the read half for the connection's lifetime.
fn spawn_reader(
    mut read: OwnedReadHalf,
    peer: SocketAddr,
) -> (mpsc::Receiver<Packet>, mpsc::Receiver<Frame>, JoinHandle<()>) {
    let (packet_tx, packet_rx) = mpsc::channel(PACKET_BUFFER);
    let (control_tx, control_rx) = mpsc::channel(4);

    let handle = tokio::spawn(async move {
        loop {
            let frame = match read_frame(&mut read).await {
                Ok(frame) => frame,
                Err(ConnError::Closed) => break,
                Err(e) => {
                    tracing::debug!("Stopped reading from {}: {}", peer, e);
                    break;
                }
            };
            let delivered = match frame {
                Frame::Packet { packet } => packet_tx.send(packet).await.is_ok(),
                other => control_tx.send(other).await.is_ok(),
            };
            if !delivered {
                break;
            }
        }
    });

    (packet_rx, control_rx, handle)
}

#[async_trait]
impl Connection for TcpConnection {
    fn identity_data(&self) -> IdentityData {
        self.identity.clone()
    }

    fn client_data(&self) -> ClientData {
        self.client.clone()
    }

    fn game_data(&self) -> GameData {
        self.game.lock().expect("connection game data lock poisoned").clone()
    }

    async fn read_packet(&self) -> Result<Packet, ConnError> {
        self.packets.lock().await.recv().await.ok_or(ConnError::Closed)
    }

    async fn write_packet(&self, packet: Packet) -> Result<(), ConnError> {
        self.send(&Frame::Packet { packet }).await
    }

    async fn start_game(&self, data: GameData) -> Result<(), ConnError> {
        *self.game.lock().expect("connection game data lock poisoned") = data.clone();
        self.send(&Frame::StartGame { data }).await?;
        self.send(&Frame::Spawn).await?;
        self.expect_control("initialised", |f| matches!(f, Frame::Initialised))
            .await
    }

    async fn do_spawn(&self) -> Result<(), ConnError> {
        self.expect_control("spawn", |f| matches!(f, Frame::Spawn)).await?;
        self.send(&Frame::Initialised).await
    }

    async fn close(&self) -> Result<(), ConnError> {
        self.closed.send_replace(true);
        let reader = self.reader.lock().expect("connection reader lock poisoned").take();
        if let Some(reader) = reader {
            reader.abort();
        }
        let writer = self.writer.lock().await.take();
        if let Some(mut write) = writer {
            write.shutdown().await?;
        }
        Ok(())
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get_mut().ok().and_then(Option::take) {
            reader.abort();
        }
    }
}
