// src/main.rs
use anyhow::Context;
use axum::serve;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use pong_relay::{config::Config, routes::build_app, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("failed to load config")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pong_relay=info,tower_http=info"));
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let addr = config.listen_addr();
    tracing::info!(
        port = config.port,
        version = env!("CARGO_PKG_VERSION"),
        static_dir = %config.static_dir.display(),
        canvas_height = config.canvas_height,
        side_policy = ?config.side_policy,
        "Server configuration"
    );

    let app_state = Arc::new(AppState::new(config));
    let app = build_app(app_state);

    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "Server failed to start");
            return Err(e).with_context(|| format!("failed to bind {addr}"));
        }
    };
    tracing::info!(addr = %addr, "Server listening");

    serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("server error")?;
    Ok(())
}
