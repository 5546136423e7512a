use sqlx::postgres::{PgPool, PgPoolOptions};

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Run the full Postgres schema migration inline.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Game directory
CREATE TABLE IF NOT EXISTS games (
    secret_key  TEXT PRIMARY KEY,
    public_key  TEXT UNIQUE NOT NULL,
    board_size  INTEGER NOT NULL,
    komi        DOUBLE PRECISION NOT NULL,
    status      TEXT NOT NULL DEFAULT 'waiting_for_opponent',
    black_id    TEXT,
    white_id    TEXT,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    started_at  TIMESTAMPTZ
);

CREATE INDEX IF NOT EXISTS idx_games_black_id ON games (black_id);
CREATE INDEX IF NOT EXISTS idx_games_white_id ON games (white_id);
CREATE INDEX IF NOT EXISTS idx_games_status   ON games (status);

-- Move logs (record text per game)
CREATE TABLE IF NOT EXISTS game_logs (
    game_key    TEXT PRIMARY KEY,
    log         TEXT NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#;
