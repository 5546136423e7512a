use std::sync::Arc;

use axum::{extract::Path, Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use sgf_core::record::extract_property;
use sgf_core::GameStatus;

use crate::auth::middleware::AuthUser;
use crate::error::AppError;
use crate::lobby::{Lobby, NewGame};

#[derive(Deserialize)]
pub struct CreateGameRequest {
    pub board_size: u32,
    pub komi: Option<f64>,
    #[serde(default)]
    pub is_creator_black: bool,
    #[serde(default)]
    pub vs_engine: bool,
}

#[derive(Deserialize)]
pub struct GameKeyRequest {
    pub public_key: String,
}

/// What anyone holding the public key may see. Never carries the secret key.
#[derive(Serialize)]
pub struct GameView {
    pub public_key: String,
    pub board_size: u32,
    pub komi: f64,
    pub status: GameStatus,
    pub black_id: Option<String>,
    pub white_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub result: Option<String>,
    pub log: String,
}

/// POST /api/games
pub async fn create_game(
    Extension(lobby): Extension<Arc<Lobby>>,
    user: AuthUser,
    Json(body): Json<CreateGameRequest>,
) -> Result<Json<JsonValue>, AppError> {
    let game = lobby
        .create_game(
            &user.id,
            NewGame {
                board_size: body.board_size,
                komi: body.komi,
                is_creator_black: body.is_creator_black,
                vs_engine: body.vs_engine,
            },
        )
        .await?;

    Ok(Json(json!({ "public_key": game.public_key })))
}

/// POST /api/games/join
pub async fn join_game(
    Extension(lobby): Extension<Arc<Lobby>>,
    user: AuthUser,
    Json(body): Json<GameKeyRequest>,
) -> Result<Json<JsonValue>, AppError> {
    let public_key = body.public_key.trim();
    if public_key.is_empty() {
        return Err(AppError::BadRequest("public_key is required".into()));
    }
    let (_, record) = lobby.join_game(&user.id, public_key).await?;
    Ok(Json(json!({ "text": record })))
}

/// POST /api/games/leave
pub async fn leave_game(
    Extension(lobby): Extension<Arc<Lobby>>,
    user: AuthUser,
    Json(body): Json<GameKeyRequest>,
) -> Result<Json<JsonValue>, AppError> {
    let public_key = body.public_key.trim();
    if public_key.is_empty() {
        return Err(AppError::BadRequest("public_key is required".into()));
    }
    let game = lobby.leave_game(&user.id, public_key).await?;
    Ok(Json(json!({ "status": game.status })))
}

/// GET /api/games/{public_key}
pub async fn get_game(
    Extension(lobby): Extension<Arc<Lobby>>,
    Path(public_key): Path<String>,
) -> Result<Json<GameView>, AppError> {
    let (game, log) = lobby.lookup(&public_key).await?;
    let result = extract_property(&log, "RE").filter(|r| !r.is_empty());

    Ok(Json(GameView {
        public_key: game.public_key,
        board_size: game.board_size,
        komi: game.komi,
        status: game.status,
        black_id: game.black_id,
        white_id: game.white_id,
        created_at: game.created_at,
        started_at: game.started_at,
        result,
        log,
    }))
}
