//! Router and shared state, used by `main` and by the integration tests.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::clients::engine::MoveGenerator;
use crate::config::Config;
use crate::live::{MoveProcessor, SessionRegistry};
use crate::lobby::Lobby;
use crate::routes;
use crate::store::{Directory, Logs};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub registry: Arc<SessionRegistry>,
    pub processor: Arc<MoveProcessor>,
    pub lobby: Arc<Lobby>,
}

impl AppState {
    pub fn new(
        config: Config,
        directory: Directory,
        logs: Logs,
        engine: Option<Arc<dyn MoveGenerator>>,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new(directory.clone(), config.store_timeout));
        let engine_player_id = engine.as_ref().map(|_| config.engine_player_id.clone());
        let processor = Arc::new(MoveProcessor::new(
            logs.clone(),
            engine,
            config.engine_player_id.clone(),
            config.store_timeout,
        ));
        let lobby = Arc::new(Lobby::new(
            directory,
            logs,
            registry.clone(),
            config.store_timeout,
            engine_player_id,
        ));
        Self {
            config,
            registry,
            processor,
            lobby,
        }
    }
}

pub fn router(state: &AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(routes::health::health_check))
        // Lobby: /join and /leave before the parameterized route
        .route("/api/games", post(routes::games::create_game))
        .route("/api/games/join", post(routes::games::join_game))
        .route("/api/games/leave", post(routes::games::leave_game))
        .route("/api/games/{public_key}", get(routes::games::get_game))
        // Live play
        .route("/ws/games/{key}", get(routes::play_ws::play))
        // Shared state
        .layer(Extension(state.config.clone()))
        .layer(Extension(state.registry.clone()))
        .layer(Extension(state.processor.clone()))
        .layer(Extension(state.lobby.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
