//! Error taxonomy for connections, session construction, login and transfer.

use thiserror::Error;

/// Failure reported by a [`Connection`](crate::conn::Connection) or
/// [`Dialer`](crate::conn::Dialer).
#[derive(Debug, Error)]
pub enum ConnError {
    #[error("connection closed")]
    Closed,
    #[error("timed out")]
    Timeout,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Errors returned by [`Session::new`](crate::session::Session::new).
#[derive(Debug, Error)]
pub enum SessionError {
    /// The client's identity claim is not a valid UUID.
    #[error("invalid identity {0:?}")]
    InvalidIdentity(String),
    #[error("load balancer did not return a server for the player to join")]
    NoServerAvailable,
}

/// Why the initial login handshake failed.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("failed to dial server {server}: {source}")]
    Dial { server: String, source: ConnError },
    #[error("spawn sequence with {server} did not complete in time")]
    SpawnTimeout { server: String },
    #[error("spawn sequence with {server} failed: {source}")]
    Spawn { server: String, source: ConnError },
    #[error("session closed during login")]
    Closed,
}

/// Errors returned by [`Session::transfer`](crate::session::Session::transfer).
///
/// None of these are fatal to the session: it stays on its previous backend.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("already being transferred")]
    AlreadyTransferring,
    #[error("transfer cancelled by handler")]
    Cancelled,
    /// The session never finished logging in, or has no backend anymore.
    #[error("session is not connected to a server")]
    NotConnected,
    #[error("failed to dial server {server}: {source}")]
    Dial { server: String, source: ConnError },
    #[error("spawn sequence with {server} did not complete in time")]
    SpawnTimeout { server: String },
    #[error("spawn sequence with {server} failed: {source}")]
    Spawn { server: String, source: ConnError },
    #[error("session closed during transfer")]
    Closed,
}
