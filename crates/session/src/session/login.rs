//! Initial login: dial the chosen backend, then start the game on the client
//! and spawn on the backend concurrently.

use std::sync::Arc;

use tokio::time::timeout;

use super::{LoginState, Session};
use crate::conn::{Connection, MovementType};
use crate::error::{ConnError, LoginError};
use crate::server::BackendServer;
use crate::translator::Translator;

impl Session {
    /// Runs on its own task, right after construction. The login gate stays
    /// `Pending` until this resolves.
    pub(super) async fn login(self: Arc<Self>, server: Arc<BackendServer>) {
        match self.establish(&server).await {
            Ok(()) => {
                tracing::info!(
                    "{} has been connected to server {}",
                    self.display_name,
                    server.name()
                );
                self.login.send_replace(LoginState::Ready);
                self.start_relay();
            }
            Err(e) => {
                tracing::error!("Login of {} failed: {}", self.display_name, e);
                self.login.send_replace(LoginState::Failed);
            }
        }
    }

    async fn establish(&self, server: &BackendServer) -> Result<(), LoginError> {
        let conn = match timeout(self.config.login_timeout, self.dial(server)).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(source)) => {
                return Err(LoginError::Dial {
                    server: server.address().to_string(),
                    source,
                });
            }
            Err(_) => {
                return Err(LoginError::Dial {
                    server: server.address().to_string(),
                    source: ConnError::Timeout,
                });
            }
        };

        // Close may have started while dialing; it only closes what it can see.
        let installed = {
            let mut backend = self.backend_mut();
            if self.is_closed() {
                false
            } else {
                backend.conn = Some(Arc::clone(&conn));
                true
            }
        };
        if !installed {
            self.close_quietly(conn.as_ref(), "server").await;
            return Err(LoginError::Closed);
        }

        // The backend stays authoritative over movement; the client keeps a
        // short history so the backend can rewind and correct it.
        let mut data = conn.game_data();
        data.player_movement_settings.movement_type = MovementType::ServerWithRewind;
        data.player_movement_settings.rewind_history_size = self.config.rewind_history_size;

        let handshake = async { tokio::try_join!(self.conn.start_game(data), conn.do_spawn()) };
        let result = match timeout(self.config.login_timeout, handshake).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(source)) => Err(LoginError::Spawn {
                server: server.address().to_string(),
                source,
            }),
            Err(_) => Err(LoginError::SpawnTimeout {
                server: server.address().to_string(),
            }),
        };
        if let Err(e) = result {
            self.discard_backend_conn(&conn).await;
            return Err(e);
        }

        let backend_data = conn.game_data();
        let translator = Translator::new(&self.conn.game_data(), &backend_data);
        {
            let mut backend = self.backend_mut();
            if backend.conn.is_none() {
                // Close already took and closed the connection.
                return Err(LoginError::Closed);
            }
            backend.translator = Some(translator);
        }
        self.set_location(backend_data.dimension, backend_data.player_position);
        Ok(())
    }

    /// Take `conn` back out of the session, if it is still installed, and
    /// close it.
    async fn discard_backend_conn(&self, conn: &Arc<dyn Connection>) {
        let taken = {
            let mut backend = self.backend_mut();
            if backend.conn.as_ref().is_some_and(|c| Arc::ptr_eq(c, conn)) {
                backend.conn.take()
            } else {
                None
            }
        };
        if let Some(conn) = taken {
            self.close_quietly(conn.as_ref(), "server").await;
        }
    }
}
