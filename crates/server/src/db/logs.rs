use sqlx::PgPool;

use crate::store::StoreError;

pub async fn get_log(pool: &PgPool, game_key: &str) -> Result<Option<String>, StoreError> {
    let row: Option<(String,)> = sqlx::query_as("SELECT log FROM game_logs WHERE game_key = $1")
        .bind(game_key)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.0))
}

pub async fn set_log(pool: &PgPool, game_key: &str, log: &str) -> Result<(), StoreError> {
    sqlx::query(
        r#"INSERT INTO game_logs (game_key, log) VALUES ($1, $2)
        ON CONFLICT (game_key) DO UPDATE SET
            log = EXCLUDED.log,
            updated_at = NOW()"#,
    )
    .bind(game_key)
    .bind(log)
    .execute(pool)
    .await?;
    Ok(())
}
