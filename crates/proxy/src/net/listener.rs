use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use ultimate_session::packet::Packet;
use ultimate_session::{Connection, LoginState, Session};

use super::connection::TcpConnection;
use crate::state::ProxyState;

/// Accept client connections and start a session for each.
pub async fn run(state: Arc<ProxyState>, bind_addr: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!("Listening on {}", bind_addr);
    serve(listener, state).await
}

/// Run the accept loop on an already bound listener.
pub async fn serve(listener: TcpListener, state: Arc<ProxyState>) -> anyhow::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        tracing::info!("Connection from {}", addr);

        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle(stream, addr, state).await {
                tracing::warn!("Connection from {} closed: {:#}", addr, e);
            }
        });
    }
}

async fn handle(stream: TcpStream, addr: SocketAddr, state: Arc<ProxyState>) -> anyhow::Result<()> {
    let conn = TcpConnection::accept(stream, state.handshake_timeout)
        .await
        .context("login handshake failed")?;

    let session = match Session::new(
        conn.clone(),
        Arc::clone(&state.registry),
        &state.balancer,
        Arc::clone(&state.dialer),
        state.session_config.clone(),
    ) {
        Ok(session) => session,
        Err(e) => {
            state.metrics.session_rejected();
            let notice = Packet::Disconnect {
                hide_disconnection_screen: false,
                message: e.to_string(),
            };
            let close_timeout = state.session_config.close_timeout;
            match timeout(close_timeout, conn.write_packet(notice)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => tracing::debug!("Failed to tell {} it was rejected: {}", addr, err),
                Err(_) => tracing::debug!("Timed out telling {} it was rejected", addr),
            }
            if let Err(err) = conn.close().await {
                tracing::debug!("Failed to close rejected connection {}: {}", addr, err);
            }
            return Err(e).with_context(|| format!("rejected {}", addr));
        }
    };
    state.metrics.session_accepted();
    tracing::info!("{} ({}) joined from {}", session.display_name(), session.uuid(), addr);

    if session.wait_for_login().await == LoginState::Failed {
        state.metrics.login_failed();
        session
            .disconnect("Unable to connect you to a server. Please try again later.")
            .await;
    }
    Ok(())
}
