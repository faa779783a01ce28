// src/state.rs
use crate::config::Config;
use crate::models::game::GameState;
use crate::services::registry::ConnectionRegistry;

/// Shared application state, handed to every session through an
/// `Extension<Arc<AppState>>`.
pub struct AppState {
    pub config: Config,
    pub registry: ConnectionRegistry,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let registry = ConnectionRegistry::new(
            GameState::new(config.initial_paddle_y),
            config.canvas_height,
        );
        AppState { config, registry }
    }
}
