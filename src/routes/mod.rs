// src/routes/mod.rs
pub mod game;

use axum::{routing::get, Extension, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::state::AppState;

/// `/ws` upgrades to the relay socket; everything else is served from the
/// static client bundle. Any origin may connect.
pub fn build_app(app_state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&app_state.config.static_dir);

    Router::new()
        .route("/ws", get(game::websocket_handler))
        .fallback_service(static_files)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state))
}
