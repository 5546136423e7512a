//! Collaborator boundaries consumed by the live core: the game directory and
//! the move-log store, plus an in-process implementation of both.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sgf_core::{Game, GameStatus};
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("store did not answer within {0:?}")]
    Timeout(Duration),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Backend(String),
}

/// Durable game metadata.
#[async_trait]
pub trait GameDirectory: Send + Sync {
    async fn insert_game(&self, game: &Game) -> Result<(), StoreError>;

    async fn public_key_exists(&self, public_key: &str) -> Result<bool, StoreError>;

    async fn find_by_public_key(&self, public_key: &str) -> Result<Game, StoreError>;

    async fn find_by_secret_key(&self, secret_key: &str) -> Result<Game, StoreError>;

    /// Put `user_id` into the free seat (black first) and return the updated game.
    async fn assign_seat(&self, secret_key: &str, user_id: &str) -> Result<Game, StoreError>;

    /// Take `user_id` out of the game: a lone player frees the seat, leaving
    /// a started game completes it. Returns the updated game.
    async fn leave_game(&self, secret_key: &str, user_id: &str) -> Result<Game, StoreError>;

    /// Whether the user sits in any game that is not completed.
    async fn has_active_game(&self, user_id: &str) -> Result<bool, StoreError>;
}

/// Record text keyed by game secret key.
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn get(&self, game_key: &str) -> Result<String, StoreError>;

    async fn set(&self, game_key: &str, text: &str) -> Result<(), StoreError>;
}

pub type Directory = Arc<dyn GameDirectory>;
pub type Logs = Arc<dyn LogStore>;

/// Bound a store call so an outage turns into an error instead of a stall.
pub async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
}

/// Map-backed directory and log store for development and tests.
#[derive(Default)]
pub struct MemoryStore {
    games: RwLock<HashMap<String, Game>>,
    logs: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GameDirectory for MemoryStore {
    async fn insert_game(&self, game: &Game) -> Result<(), StoreError> {
        let mut games = self.games.write().await;
        if games.contains_key(&game.secret_key) {
            return Err(StoreError::Conflict("game key already taken".into()));
        }
        games.insert(game.secret_key.clone(), game.clone());
        Ok(())
    }

    async fn public_key_exists(&self, public_key: &str) -> Result<bool, StoreError> {
        let games = self.games.read().await;
        Ok(games.values().any(|g| g.public_key == public_key))
    }

    async fn find_by_public_key(&self, public_key: &str) -> Result<Game, StoreError> {
        let games = self.games.read().await;
        games
            .values()
            .find(|g| g.public_key == public_key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("game {public_key}")))
    }

    async fn find_by_secret_key(&self, secret_key: &str) -> Result<Game, StoreError> {
        let games = self.games.read().await;
        games
            .get(secret_key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("game".into()))
    }

    async fn assign_seat(&self, secret_key: &str, user_id: &str) -> Result<Game, StoreError> {
        let mut games = self.games.write().await;
        let game = games
            .get_mut(secret_key)
            .ok_or_else(|| StoreError::NotFound("game".into()))?;
        if game.is_completed() {
            return Err(StoreError::Conflict("game is already completed".into()));
        }
        if game.seat_of(user_id).is_some() {
            return Err(StoreError::Conflict("user already sits in this game".into()));
        }
        game.fill_seat(user_id)
            .ok_or_else(|| StoreError::Conflict("game is full".into()))?;
        Ok(game.clone())
    }

    async fn leave_game(&self, secret_key: &str, user_id: &str) -> Result<Game, StoreError> {
        let mut games = self.games.write().await;
        let game = games
            .get_mut(secret_key)
            .ok_or_else(|| StoreError::NotFound("game".into()))?;
        if game.is_completed() {
            return Err(StoreError::Conflict("game is already completed".into()));
        }
        game.leave(user_id)
            .ok_or_else(|| StoreError::Conflict("user does not sit in this game".into()))?;
        Ok(game.clone())
    }

    async fn has_active_game(&self, user_id: &str) -> Result<bool, StoreError> {
        let games = self.games.read().await;
        Ok(games
            .values()
            .any(|g| g.status != GameStatus::Completed && g.seat_of(user_id).is_some()))
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn get(&self, game_key: &str) -> Result<String, StoreError> {
        let logs = self.logs.read().await;
        logs.get(game_key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("game log".into()))
    }

    async fn set(&self, game_key: &str, text: &str) -> Result<(), StoreError> {
        let mut logs = self.logs.write().await;
        logs.insert(game_key.to_string(), text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sgf_core::Color;

    fn game(secret: &str, public: &str, white: &str) -> Game {
        Game {
            secret_key: secret.into(),
            public_key: public.into(),
            board_size: 9,
            komi: 7.5,
            status: GameStatus::WaitingForOpponent,
            created_at: Utc::now(),
            started_at: None,
            black_id: None,
            white_id: Some(white.into()),
        }
    }

    #[tokio::test]
    async fn test_assign_seat_fills_free_seat() {
        let store = MemoryStore::new();
        store.insert_game(&game("s1", "11111", "alice")).await.unwrap();
        assert!(store.has_active_game("alice").await.unwrap());
        assert!(!store.has_active_game("bob").await.unwrap());

        let updated = store.assign_seat("s1", "bob").await.unwrap();
        assert_eq!(updated.seat_of("bob"), Some(Color::Black));
        assert_eq!(updated.status, GameStatus::InProgress);

        let err = store.assign_seat("s1", "carol").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_leave_game() {
        let store = MemoryStore::new();
        store.insert_game(&game("s1", "11111", "alice")).await.unwrap();
        store.insert_game(&game("s2", "22222", "carol")).await.unwrap();
        store.assign_seat("s2", "dave").await.unwrap();

        // Alone: the seat is freed and the game keeps waiting.
        let left = store.leave_game("s1", "alice").await.unwrap();
        assert_eq!(left.white_id, None);
        assert_eq!(left.status, GameStatus::WaitingForOpponent);
        assert!(!store.has_active_game("alice").await.unwrap());

        // Started: the game is over for both players.
        let left = store.leave_game("s2", "dave").await.unwrap();
        assert_eq!(left.status, GameStatus::Completed);
        assert!(!store.has_active_game("carol").await.unwrap());

        assert!(matches!(
            store.leave_game("s2", "carol").await,
            Err(StoreError::Conflict(_))
        ));
        assert!(matches!(
            store.leave_game("s1", "mallory").await,
            Err(StoreError::Conflict(_))
        ));
        assert!(matches!(
            store.leave_game("nope", "alice").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_lookups_report_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.find_by_public_key("00000").await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(store.get("nope").await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, StoreError>(())
        };
        let err = bounded(Duration::from_millis(10), slow).await.unwrap_err();
        assert!(matches!(err, StoreError::Timeout(_)));
    }
}
