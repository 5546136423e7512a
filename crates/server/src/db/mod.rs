pub mod games;
pub mod logs;
pub mod pool;

use async_trait::async_trait;
use sgf_core::Game;
use sqlx::PgPool;

use crate::store::{GameDirectory, LogStore, StoreError};

/// Postgres-backed directory and log store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GameDirectory for PgStore {
    async fn insert_game(&self, game: &Game) -> Result<(), StoreError> {
        games::insert_game(&self.pool, game).await
    }

    async fn public_key_exists(&self, public_key: &str) -> Result<bool, StoreError> {
        games::public_key_exists(&self.pool, public_key).await
    }

    async fn find_by_public_key(&self, public_key: &str) -> Result<Game, StoreError> {
        games::get_game_by_public_key(&self.pool, public_key)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("game {public_key}")))
    }

    async fn find_by_secret_key(&self, secret_key: &str) -> Result<Game, StoreError> {
        games::get_game_by_secret_key(&self.pool, secret_key)
            .await?
            .ok_or_else(|| StoreError::NotFound("game".into()))
    }

    async fn assign_seat(&self, secret_key: &str, user_id: &str) -> Result<Game, StoreError> {
        if let Some(game) = games::assign_seat(&self.pool, secret_key, user_id).await? {
            return Ok(game);
        }
        // Nothing updated: tell a missing game apart from a refused seat.
        let game = self.find_by_secret_key(secret_key).await?;
        if game.is_completed() {
            Err(StoreError::Conflict("game is already completed".into()))
        } else if game.seat_of(user_id).is_some() {
            Err(StoreError::Conflict("user already sits in this game".into()))
        } else {
            Err(StoreError::Conflict("game is full".into()))
        }
    }

    async fn leave_game(&self, secret_key: &str, user_id: &str) -> Result<Game, StoreError> {
        if let Some(game) = games::leave_game(&self.pool, secret_key, user_id).await? {
            return Ok(game);
        }
        let game = self.find_by_secret_key(secret_key).await?;
        if game.is_completed() {
            Err(StoreError::Conflict("game is already completed".into()))
        } else {
            Err(StoreError::Conflict("user does not sit in this game".into()))
        }
    }

    async fn has_active_game(&self, user_id: &str) -> Result<bool, StoreError> {
        games::has_active_game(&self.pool, user_id).await
    }
}

#[async_trait]
impl LogStore for PgStore {
    async fn get(&self, game_key: &str) -> Result<String, StoreError> {
        logs::get_log(&self.pool, game_key)
            .await?
            .ok_or_else(|| StoreError::NotFound("game log".into()))
    }

    async fn set(&self, game_key: &str, text: &str) -> Result<(), StoreError> {
        logs::set_log(&self.pool, game_key, text).await
    }
}
