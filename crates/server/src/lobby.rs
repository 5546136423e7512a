//! Minimal lobby: create, join, leave and look up games.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sgf_core::record::{initial_record, resignation_result, set_result};
use sgf_core::{Color, Game, GameStatus};
use uuid::Uuid;

use crate::error::AppError;
use crate::live::connection::OPPONENT_RESIGNED_NOTICE;
use crate::live::SessionRegistry;
use crate::store::{bounded, Directory, Logs, StoreError};

const MIN_BOARD_SIZE: u32 = 2;
const MAX_BOARD_SIZE: u32 = 25;
const PUBLIC_KEY_ATTEMPTS: usize = 16;

#[derive(Debug, Clone)]
pub struct NewGame {
    pub board_size: u32,
    pub komi: Option<f64>,
    pub is_creator_black: bool,
    pub vs_engine: bool,
}

pub struct Lobby {
    directory: Directory,
    logs: Logs,
    registry: Arc<SessionRegistry>,
    timeout: Duration,
    /// Seat id of the engine; `None` when no engine is configured.
    engine_player_id: Option<String>,
}

impl Lobby {
    pub fn new(
        directory: Directory,
        logs: Logs,
        registry: Arc<SessionRegistry>,
        timeout: Duration,
        engine_player_id: Option<String>,
    ) -> Self {
        Self {
            directory,
            logs,
            registry,
            timeout,
            engine_player_id,
        }
    }

    pub async fn create_game(&self, user_id: &str, req: NewGame) -> Result<Game, AppError> {
        if !(MIN_BOARD_SIZE..=MAX_BOARD_SIZE).contains(&req.board_size) {
            return Err(AppError::BadRequest(format!(
                "board_size must be between {MIN_BOARD_SIZE} and {MAX_BOARD_SIZE}"
            )));
        }
        let komi = req
            .komi
            .filter(|k| k.is_finite())
            .ok_or_else(|| AppError::BadRequest("komi is required".into()))?;

        let engine = if req.vs_engine {
            let id = self
                .engine_player_id
                .as_deref()
                .ok_or_else(|| AppError::BadRequest("engine games are not available".into()))?;
            Some(id)
        } else {
            None
        };

        if bounded(self.timeout, self.directory.has_active_game(user_id)).await? {
            return Err(AppError::Conflict("user already has an active game".into()));
        }

        let (secret_key, public_key) = self.generate_keys().await?;
        let creator_seat = if req.is_creator_black { Color::Black } else { Color::White };

        let mut game = Game {
            secret_key,
            public_key,
            board_size: req.board_size,
            komi,
            status: GameStatus::WaitingForOpponent,
            created_at: Utc::now(),
            started_at: None,
            black_id: None,
            white_id: None,
        };
        match creator_seat {
            Color::Black => game.black_id = Some(user_id.to_string()),
            Color::White => game.white_id = Some(user_id.to_string()),
        }
        if let Some(engine) = engine {
            game.fill_seat(engine);
        }

        bounded(self.timeout, self.directory.insert_game(&game)).await?;
        if game.is_full() {
            bounded(self.timeout, self.logs.set(&game.secret_key, &initial_record(&game))).await?;
        }

        tracing::info!(
            public = %game.public_key,
            size = game.board_size,
            vs_engine = req.vs_engine,
            "Game created by {user_id}"
        );
        Ok(game)
    }

    /// Seat `user_id` in the game behind `public_key` and write the initial
    /// record. Returns the updated game and the record text.
    pub async fn join_game(&self, user_id: &str, public_key: &str) -> Result<(Game, String), AppError> {
        if bounded(self.timeout, self.directory.has_active_game(user_id)).await? {
            return Err(AppError::Conflict("user already has an active game".into()));
        }

        let game = bounded(self.timeout, self.directory.find_by_public_key(public_key)).await?;
        let game = bounded(
            self.timeout,
            self.directory.assign_seat(&game.secret_key, user_id),
        )
        .await?;

        let record = initial_record(&game);
        bounded(self.timeout, self.logs.set(&game.secret_key, &record)).await?;
        self.registry.refresh_game(&game).await;

        tracing::info!(public = %game.public_key, "{user_id} joined game");
        Ok((game, record))
    }

    /// Take `user_id` out of the game behind `public_key`. A player waiting
    /// alone gets the seat back; leaving a started game forfeits it, writes
    /// the result into the record and tells the opponent.
    pub async fn leave_game(&self, user_id: &str, public_key: &str) -> Result<Game, AppError> {
        let game = bounded(self.timeout, self.directory.find_by_public_key(public_key)).await?;
        if game.is_completed() {
            return Err(AppError::Conflict("game is already completed".into()));
        }
        let seat = game
            .seat_of(user_id)
            .ok_or_else(|| AppError::Forbidden("user does not sit in this game".into()))?;

        // Moves and the result must not interleave in the record.
        let session = if game.is_full() {
            Some(self.registry.resolve(&game.secret_key).await?)
        } else {
            None
        };
        let appending = match &session {
            Some(session) => Some(session.lock_appends().await),
            None => None,
        };

        let game = bounded(
            self.timeout,
            self.directory.leave_game(&game.secret_key, user_id),
        )
        .await?;
        if game.is_completed() {
            let record = match bounded(self.timeout, self.logs.get(&game.secret_key)).await {
                Ok(text) => text,
                Err(StoreError::NotFound(_)) => initial_record(&game),
                Err(e) => return Err(e.into()),
            };
            let record = set_result(&record, &resignation_result(seat)).map_err(|e| {
                tracing::error!(game = %game.secret_key, "Cannot record result: {e}");
                AppError::Internal("stored record is corrupt".into())
            })?;
            bounded(self.timeout, self.logs.set(&game.secret_key, &record)).await?;
        }
        self.registry.refresh_game(&game).await;
        drop(appending);

        if let (Some(session), true) = (&session, game.is_completed()) {
            session
                .connections()
                .deliver(seat, OPPONENT_RESIGNED_NOTICE.to_string())
                .await;
        }

        tracing::info!(public = %game.public_key, status = game.status.as_str(), "{user_id} left game");
        Ok(game)
    }

    /// Game metadata plus the current record text (empty before the game starts).
    pub async fn lookup(&self, public_key: &str) -> Result<(Game, String), AppError> {
        let game = bounded(self.timeout, self.directory.find_by_public_key(public_key)).await?;
        let record = match bounded(self.timeout, self.logs.get(&game.secret_key)).await {
            Ok(text) => text,
            Err(StoreError::NotFound(_)) => String::new(),
            Err(e) => return Err(e.into()),
        };
        Ok((game, record))
    }

    async fn generate_keys(&self) -> Result<(String, String), AppError> {
        let secret_key = Uuid::new_v4().to_string();
        for _ in 0..PUBLIC_KEY_ATTEMPTS {
            let candidate = public_code(Uuid::new_v4());
            if !bounded(self.timeout, self.directory.public_key_exists(&candidate)).await? {
                return Ok((secret_key, candidate));
            }
        }
        Err(AppError::Internal("could not allocate a public game key".into()))
    }
}

/// Five-digit shareable code taken from fresh randomness.
fn public_code(seed: Uuid) -> String {
    let bytes = seed.as_bytes();
    let n = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    format!("{:05}", n % 100_000)
}
