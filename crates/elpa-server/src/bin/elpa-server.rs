//! Standalone server binary for the adaptive learning orchestrator:
//! loads configuration, wires the in-memory persistence/AI stand-ins,
//! and serves the execute/stream/control API.

use std::net::SocketAddr;
use std::sync::Arc;

use elpa_server::{ai::StubAiClient, api::routes::create_router, config::ServerConfig, persistence::InMemoryPersistence, state::AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(rust_log).init();

    tracing::info!("loading server configuration");
    let config = match std::env::var("ELPA_CONFIG_PATH") {
        Ok(path) => {
            let source = std::fs::read_to_string(&path)?;
            ServerConfig::from_yaml(&source)?.apply_env_overrides()
        }
        Err(_) => {
            tracing::info!("ELPA_CONFIG_PATH not set; using defaults with env overrides");
            ServerConfig::default().apply_env_overrides()
        }
    };

    let bind_addr: SocketAddr = config.bind_addr.parse()?;
    tracing::info!(%bind_addr, "starting elpa-server");

    let state = AppState::new(config, Arc::new(StubAiClient), InMemoryPersistence::shared());
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("elpa-server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install CTRL-C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received CTRL-C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
