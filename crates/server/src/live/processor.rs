//! The per-move pipeline: decode, append, persist, deliver.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use sgf_core::record::{append_move, move_history};
use sgf_core::{Color, GameStatus, Move};

use super::{Delivery, LiveError, Session};
use crate::clients::engine::MoveGenerator;
use crate::store::{bounded, Logs, StoreError};

#[derive(Deserialize)]
struct InboundFrame {
    color: Option<String>,
    coordinates: Option<String>,
}

/// What happened after the move was persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum Followup {
    Delivered,
    OpponentOffline,
    /// The engine answered; its move was recorded and sent to the mover.
    Engine(Move),
    EngineFailed(String),
}

#[derive(Debug, Clone)]
pub struct Accepted {
    pub mv: Move,
    pub log: String,
    pub followup: Followup,
}

/// `{"move": ..., "log": ...}` as pushed to the other seat.
pub fn update_frame(mv: &Move, log: &str) -> String {
    json!({ "move": mv, "log": log }).to_string()
}

/// Decode an inbound frame submitted from `seat`.
pub fn parse_frame(raw: &str, seat: Color) -> Result<Move, LiveError> {
    let frame: InboundFrame =
        serde_json::from_str(raw).map_err(|e| LiveError::Malformed(format!("invalid JSON: {e}")))?;

    let color = frame
        .color
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| LiveError::Malformed("missing color".into()))?;
    let coordinates = frame
        .coordinates
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| LiveError::Malformed("missing coordinates".into()))?;

    let color: Color = color
        .parse()
        .map_err(|_| LiveError::Malformed(format!("unknown color {color:?}")))?;
    if color != seat {
        return Err(LiveError::Malformed(format!(
            "{color} cannot move from the {seat} seat"
        )));
    }
    Ok(Move::new(color, coordinates))
}

pub struct MoveProcessor {
    logs: Logs,
    engine: Option<Arc<dyn MoveGenerator>>,
    engine_player_id: String,
    timeout: Duration,
}

impl MoveProcessor {
    pub fn new(
        logs: Logs,
        engine: Option<Arc<dyn MoveGenerator>>,
        engine_player_id: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            logs,
            engine,
            engine_player_id: engine_player_id.into(),
            timeout,
        }
    }

    /// Accept one frame from `seat`. Only games in progress take moves, and
    /// nothing is delivered unless the new record was persisted first.
    pub async fn process_inbound_move(
        &self,
        session: &Session,
        seat: Color,
        raw: &str,
    ) -> Result<Accepted, LiveError> {
        let mv = parse_frame(raw, seat)?;

        let _appending = session.lock_appends().await;
        let game = session.game().await;
        match game.status {
            GameStatus::InProgress => {}
            GameStatus::WaitingForOpponent => return Err(LiveError::NotStarted),
            GameStatus::Completed => return Err(LiveError::GameCompleted),
        }

        let log = self.apply(session, &mv).await?;
        tracing::info!(
            game = %session.secret_key(),
            seat = %seat,
            coordinates = %mv.coordinates,
            "Move accepted"
        );

        let followup = if game.participant(seat.opponent()) == Some(self.engine_player_id.as_str()) {
            self.engine_reply(session, &log, seat).await
        } else {
            match session.connections().deliver(seat, update_frame(&mv, &log)).await {
                Delivery::Delivered => Followup::Delivered,
                Delivery::Offline => Followup::OpponentOffline,
            }
        };

        Ok(Accepted { mv, log, followup })
    }

    /// Fetch, append and persist. Returns the persisted record.
    ///
    /// The record is written when the game starts, so a missing one is a
    /// storage failure like any other read error.
    async fn apply(&self, session: &Session, mv: &Move) -> Result<String, LiveError> {
        let key = session.secret_key();
        let current = match bounded(self.timeout, self.logs.get(key)).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(game = %key, "Failed to read game log: {e}");
                return Err(e.into());
            }
        };

        let updated = append_move(&current, mv).map_err(|e| {
            tracing::error!(game = %key, "Stored game log is corrupt: {e}");
            LiveError::Storage(StoreError::Backend(format!("stored record is corrupt: {e}")))
        })?;

        if let Err(e) = bounded(self.timeout, self.logs.set(key, &updated)).await {
            tracing::error!(game = %key, "Failed to persist game log: {e}");
            return Err(e.into());
        }
        Ok(updated)
    }

    async fn engine_reply(&self, session: &Session, log: &str, human: Color) -> Followup {
        let Some(engine) = &self.engine else {
            return Followup::EngineFailed("no engine configured".into());
        };
        let history = match move_history(log) {
            Ok(history) => history,
            Err(e) => return Followup::EngineFailed(format!("unreadable record: {e}")),
        };

        let reply = match engine.generate(&history, human.opponent()).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(game = %session.secret_key(), "Engine failed: {e}");
                return Followup::EngineFailed(e.to_string());
            }
        };

        let updated = match self.apply(session, &reply).await {
            Ok(updated) => updated,
            Err(e) => return Followup::EngineFailed(format!("could not record engine move: {e}")),
        };
        session
            .connections()
            .send_to(human, update_frame(&reply, &updated))
            .await;
        Followup::Engine(reply)
    }
}
