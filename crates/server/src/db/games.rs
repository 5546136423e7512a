use chrono::{DateTime, Utc};
use sgf_core::{Game, GameStatus};
use sqlx::PgPool;

use crate::store::StoreError;

const GAME_COLUMNS: &str = "secret_key, public_key, board_size, komi, status, \
                            black_id, white_id, created_at, started_at";

#[derive(Debug, sqlx::FromRow)]
struct GameRow {
    secret_key: String,
    public_key: String,
    board_size: i32,
    komi: f64,
    status: String,
    black_id: Option<String>,
    white_id: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
}

impl TryFrom<GameRow> for Game {
    type Error = StoreError;

    fn try_from(row: GameRow) -> Result<Self, Self::Error> {
        let status: GameStatus = row.status.parse().map_err(StoreError::Backend)?;
        Ok(Game {
            secret_key: row.secret_key,
            public_key: row.public_key,
            board_size: u32::try_from(row.board_size)
                .map_err(|_| StoreError::Backend(format!("bad board size {}", row.board_size)))?,
            komi: row.komi,
            status,
            created_at: row.created_at,
            started_at: row.started_at,
            black_id: row.black_id,
            white_id: row.white_id,
        })
    }
}

pub async fn insert_game(pool: &PgPool, game: &Game) -> Result<(), StoreError> {
    sqlx::query(
        r#"INSERT INTO games (
            secret_key, public_key, board_size, komi, status,
            black_id, white_id, created_at, started_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
    )
    .bind(&game.secret_key)
    .bind(&game.public_key)
    .bind(game.board_size as i32)
    .bind(game.komi)
    .bind(game.status.as_str())
    .bind(&game.black_id)
    .bind(&game.white_id)
    .bind(game.created_at)
    .bind(game.started_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn public_key_exists(pool: &PgPool, public_key: &str) -> Result<bool, StoreError> {
    let row: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM games WHERE public_key = $1)")
        .bind(public_key)
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

pub async fn get_game_by_public_key(
    pool: &PgPool,
    public_key: &str,
) -> Result<Option<Game>, StoreError> {
    let query = format!("SELECT {GAME_COLUMNS} FROM games WHERE public_key = $1");
    let row: Option<GameRow> = sqlx::query_as(&query)
        .bind(public_key)
        .fetch_optional(pool)
        .await?;
    row.map(Game::try_from).transpose()
}

pub async fn get_game_by_secret_key(
    pool: &PgPool,
    secret_key: &str,
) -> Result<Option<Game>, StoreError> {
    let query = format!("SELECT {GAME_COLUMNS} FROM games WHERE secret_key = $1");
    let row: Option<GameRow> = sqlx::query_as(&query)
        .bind(secret_key)
        .fetch_optional(pool)
        .await?;
    row.map(Game::try_from).transpose()
}

/// Fill the free seat in one statement. SET expressions see the old row, so
/// the status flips exactly when this call fills the last seat.
pub async fn assign_seat(
    pool: &PgPool,
    secret_key: &str,
    user_id: &str,
) -> Result<Option<Game>, StoreError> {
    let query = format!(
        r#"UPDATE games SET
            black_id = CASE WHEN black_id IS NULL THEN $2 ELSE black_id END,
            white_id = CASE WHEN black_id IS NOT NULL AND white_id IS NULL THEN $2 ELSE white_id END,
            status = CASE WHEN (black_id IS NULL) <> (white_id IS NULL) THEN 'in_progress' ELSE status END,
            started_at = CASE WHEN (black_id IS NULL) <> (white_id IS NULL) THEN NOW() ELSE started_at END
        WHERE secret_key = $1
            AND status <> 'completed'
            AND (black_id IS NULL OR white_id IS NULL)
            AND black_id IS DISTINCT FROM $2
            AND white_id IS DISTINCT FROM $2
        RETURNING {GAME_COLUMNS}"#
    );
    let row: Option<GameRow> = sqlx::query_as(&query)
        .bind(secret_key)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    row.map(Game::try_from).transpose()
}

/// Leave in one statement: with both seats filled the game completes and the
/// seats stay as they were, otherwise the caller's seat is cleared.
pub async fn leave_game(
    pool: &PgPool,
    secret_key: &str,
    user_id: &str,
) -> Result<Option<Game>, StoreError> {
    let query = format!(
        r#"UPDATE games SET
            status = CASE WHEN black_id IS NOT NULL AND white_id IS NOT NULL THEN 'completed' ELSE status END,
            black_id = CASE WHEN white_id IS NULL AND black_id = $2 THEN NULL ELSE black_id END,
            white_id = CASE WHEN black_id IS NULL AND white_id = $2 THEN NULL ELSE white_id END
        WHERE secret_key = $1
            AND status <> 'completed'
            AND (black_id = $2 OR white_id = $2)
        RETURNING {GAME_COLUMNS}"#
    );
    let row: Option<GameRow> = sqlx::query_as(&query)
        .bind(secret_key)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    row.map(Game::try_from).transpose()
}

pub async fn has_active_game(pool: &PgPool, user_id: &str) -> Result<bool, StoreError> {
    let row: (bool,) = sqlx::query_as(
        r#"SELECT EXISTS(
            SELECT 1 FROM games
            WHERE (black_id = $1 OR white_id = $1) AND status <> 'completed'
        )"#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}
