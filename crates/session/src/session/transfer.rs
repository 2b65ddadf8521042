//! Live transfer of a session to another backend.
//!
//! ```text
//! stable ──CAS──► transferring ──► handler ──► dial + spawn ──► illusion
//!    ▲                 │              │            │               │
//!    │                 └──────────────┴── abort ───┘               ▼
//!    └──────────── clear client state ◄── swap server/conn/translator
//! ```

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::time::{Instant, timeout_at};

use super::{LoginState, Session};
use crate::conn::Connection;
use crate::error::{ConnError, TransferError};
use crate::event::Context;
use crate::server::BackendServer;
use crate::translator::Translator;

/// Resets the transferring flag and wakes the backend reader when the
/// attempt ends, whichever way it ends.
struct TransferGuard(Arc<Session>);

impl Drop for TransferGuard {
    fn drop(&mut self) {
        self.0.transferring.store(false, Ordering::Release);
        self.0.switched.send_modify(|n| *n = n.wrapping_add(1));
    }
}

impl Session {
    /// Move the session to `server`.
    ///
    /// Waits for the initial login first. A second call while a transfer is
    /// in flight fails immediately with [`TransferError::AlreadyTransferring`].
    /// Failures leave the session on its current backend.
    ///
    /// The attempt runs on its own task, so dropping the returned future
    /// does not abandon a half-finished transfer.
    pub async fn transfer(self: &Arc<Self>, server: Arc<BackendServer>) -> Result<(), TransferError> {
        if self.wait_for_login().await != LoginState::Ready {
            return Err(TransferError::NotConnected);
        }
        if self.is_closed() {
            return Err(TransferError::Closed);
        }
        if self
            .transferring
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(TransferError::AlreadyTransferring);
        }

        let guard = TransferGuard(Arc::clone(self));
        let session = Arc::clone(self);
        let attempt = tokio::spawn(async move {
            let _guard = guard;
            session.run_transfer(server).await
        });

        match attempt.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Transfer task of {} failed: {}", self.display_name, e);
                Err(TransferError::Closed)
            }
        }
    }

    async fn run_transfer(&self, server: Arc<BackendServer>) -> Result<(), TransferError> {
        let from = self
            .backend()
            .server
            .as_ref()
            .map(|s| s.name().to_string())
            .unwrap_or_default();
        tracing::info!(
            "{} is being transferred from {} to {}",
            self.display_name,
            from,
            server.name()
        );

        let mut ctx = Context::new();
        self.handler().handle_transfer(&mut ctx, &server);
        if ctx.cancelled() {
            tracing::info!("Transfer of {} to {} was cancelled", self.display_name, server.name());
            return Err(TransferError::Cancelled);
        }

        let conn = match self.connect_pending(&server).await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(
                    "Transfer of {} to {} failed: {}",
                    self.display_name,
                    server.name(),
                    e
                );
                return Err(e);
            }
        };

        let runtime_id = self.conn.game_data().entity_runtime_id;
        let new_data = conn.game_data();
        let location = self.location();

        let placeholder = super::placeholder_dimension(location.dimension, new_data.dimension);
        self.change_dimension(placeholder, location.position, runtime_id).await;
        self.send_empty_chunks(placeholder, location.position.chunk()).await;

        let translator = Translator::new(&self.conn.game_data(), &new_data);
        let old_conn = {
            let mut backend = self.backend_mut();
            let Some(pending) = backend.pending.take() else {
                // Close took the pending connection and owns its teardown.
                return Err(TransferError::Closed);
            };
            if let Some(old) = backend.server.replace(Arc::clone(&server)) {
                old.decrement_player_count();
            }
            server.increment_player_count();
            backend.translator = Some(translator);
            backend.conn.replace(pending)
        };

        self.state.clear_all(self.conn.as_ref(), runtime_id).await;

        self.change_dimension(new_data.dimension, new_data.player_position, runtime_id)
            .await;
        self.set_location(new_data.dimension, new_data.player_position);

        if let Some(old_conn) = old_conn {
            self.close_quietly(old_conn.as_ref(), "previous server").await;
        }
        tracing::info!("{} has been transferred to {}", self.display_name, server.name());
        Ok(())
    }

    /// Dial `server` and drive its spawn sequence, all within one transfer
    /// timeout. The connection is parked in `pending` while spawning so a
    /// concurrent close can reach it.
    async fn connect_pending(
        &self,
        server: &BackendServer,
    ) -> Result<Arc<dyn Connection>, TransferError> {
        let deadline = Instant::now() + self.config.transfer_timeout;

        let conn = match timeout_at(deadline, self.dial(server)).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(source)) => {
                return Err(TransferError::Dial {
                    server: server.address().to_string(),
                    source,
                });
            }
            Err(_) => {
                return Err(TransferError::Dial {
                    server: server.address().to_string(),
                    source: ConnError::Timeout,
                });
            }
        };

        let parked = {
            let mut backend = self.backend_mut();
            if self.is_closed() {
                false
            } else {
                backend.pending = Some(Arc::clone(&conn));
                true
            }
        };
        if !parked {
            self.close_quietly(conn.as_ref(), "pending server").await;
            return Err(TransferError::Closed);
        }

        let spawned = match timeout_at(deadline, conn.do_spawn()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(TransferError::Spawn {
                server: server.address().to_string(),
                source,
            }),
            Err(_) => Err(TransferError::SpawnTimeout {
                server: server.address().to_string(),
            }),
        };
        if let Err(e) = spawned {
            self.discard_pending(&conn).await;
            return Err(e);
        }
        Ok(conn)
    }

    async fn discard_pending(&self, conn: &Arc<dyn Connection>) {
        let taken = {
            let mut backend = self.backend_mut();
            if backend.pending.as_ref().is_some_and(|c| Arc::ptr_eq(c, conn)) {
                backend.pending.take()
            } else {
                None
            }
        };
        if let Some(conn) = taken {
            self.close_quietly(conn.as_ref(), "pending server").await;
        }
    }
}
