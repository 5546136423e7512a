//! Move-generation boundary: given the ordered history, the engine answers
//! with one move for the side to play.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sgf_core::{Color, Move};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("engine returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("engine returned no move")]
    NoMove,
}

#[async_trait]
pub trait MoveGenerator: Send + Sync {
    async fn generate(&self, history: &[Move], to_play: Color) -> Result<Move, EngineError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    moves: &'a [Move],
}

#[derive(Deserialize)]
struct GenerateResponse {
    bot_move: Option<String>,
}

/// HTTP client for an external engine exposing `POST /generate`.
pub struct EngineClient {
    client: Client,
    base_url: String,
}

impl EngineClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EngineError> {
        let client = Client::builder()
            .user_agent("GobanLive/1.0")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MoveGenerator for EngineClient {
    async fn generate(&self, history: &[Move], to_play: Color) -> Result<Move, EngineError> {
        let url = format!("{}/generate", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&GenerateRequest { moves: history })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(EngineError::Status(resp.status()));
        }

        let body: GenerateResponse = resp.json().await?;
        match body.bot_move {
            Some(coords) if !coords.trim().is_empty() => Ok(Move::new(to_play, coords.trim())),
            _ => Err(EngineError::NoMove),
        }
    }
}
