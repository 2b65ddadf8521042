use std::sync::Arc;

use ultimate_proxy::config::ProxyConfig;
use ultimate_proxy::dashboard;
use ultimate_proxy::net::dialer::TcpDialer;
use ultimate_proxy::state::ProxyState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config = ProxyConfig::from_args(&args)?;

    let state = Arc::new(ProxyState::new(&config, Arc::new(TcpDialer)));

    tracing::info!("Ultimate proxy -- {} backend servers", state.servers.len());
    for server in state.servers.iter() {
        tracing::info!("  {} at {}", server.name(), server.address());
    }

    // Dashboard runs on its own tasks.
    let dash = Arc::clone(&state);
    let dashboard_port = config.dashboard_port;
    tokio::spawn(async move {
        dashboard::server::start(dash, dashboard_port).await;
    });

    // ── Accept loop with graceful shutdown ──────────────────────────────
    tokio::select! {
        result = ultimate_proxy::net::listener::run(Arc::clone(&state), &config.bind) => {
            if let Err(e) = result {
                tracing::error!("Proxy error: {:#}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received, shutting down...");
        }
    }

    state.disconnect_all("Proxy is shutting down").await;
    Ok(())
}
