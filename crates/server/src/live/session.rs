use sgf_core::Game;
use tokio::sync::{Mutex, MutexGuard, RwLock};

use super::connection::ConnectionManager;

/// In-memory state of one game that is being played.
#[derive(Debug)]
pub struct Session {
    secret_key: String,
    game: RwLock<Game>,
    connections: ConnectionManager,
    // Serializes fetch -> append -> persist -> deliver for this game.
    appends: Mutex<()>,
}

impl Session {
    pub fn new(game: Game) -> Self {
        Self {
            secret_key: game.secret_key.clone(),
            game: RwLock::new(game),
            connections: ConnectionManager::new(),
            appends: Mutex::new(()),
        }
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    /// Snapshot of the directory record this session was seeded from.
    pub async fn game(&self) -> Game {
        self.game.read().await.clone()
    }

    pub async fn replace_game(&self, game: Game) {
        *self.game.write().await = game;
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub(crate) async fn lock_appends(&self) -> MutexGuard<'_, ()> {
        self.appends.lock().await
    }
}
