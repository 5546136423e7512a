use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One of the two playing seats. Serialized with its record key (`B`/`W`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    #[serde(rename = "B", alias = "b", alias = "black", alias = "Black")]
    Black,
    #[serde(rename = "W", alias = "w", alias = "white", alias = "White")]
    White,
}

impl Color {
    pub fn opponent(self) -> Color {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }

    /// Property key used for a move of this color in the record.
    pub fn record_key(self) -> &'static str {
        match self {
            Color::Black => "B",
            Color::White => "W",
        }
    }

    pub fn from_record_key(key: &str) -> Option<Color> {
        match key {
            "B" => Some(Color::Black),
            "W" => Some(Color::White),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Black => f.write_str("black"),
            Color::White => f.write_str("white"),
        }
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "b" | "black" => Ok(Color::Black),
            "w" | "white" => Ok(Color::White),
            other => Err(format!("unknown color '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub color: Color,
    pub coordinates: String, // record-native, e.g. "dp"
}

impl Move {
    pub fn new(color: Color, coordinates: impl Into<String>) -> Self {
        Self {
            color,
            coordinates: coordinates.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    WaitingForOpponent,
    InProgress,
    Completed,
}

impl GameStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GameStatus::WaitingForOpponent => "waiting_for_opponent",
            GameStatus::InProgress => "in_progress",
            GameStatus::Completed => "completed",
        }
    }
}

impl FromStr for GameStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting_for_opponent" => Ok(GameStatus::WaitingForOpponent),
            "in_progress" => Ok(GameStatus::InProgress),
            "completed" => Ok(GameStatus::Completed),
            other => Err(format!("unknown game status '{other}'")),
        }
    }
}

/// Directory record of one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub secret_key: String,
    pub public_key: String,
    pub board_size: u32,
    pub komi: f64,
    pub status: GameStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub black_id: Option<String>,
    pub white_id: Option<String>,
}

impl Game {
    pub fn participant(&self, color: Color) -> Option<&str> {
        match color {
            Color::Black => self.black_id.as_deref(),
            Color::White => self.white_id.as_deref(),
        }
    }

    /// Seat held by `user_id`, if any. Black wins when one id holds both seats.
    pub fn seat_of(&self, user_id: &str) -> Option<Color> {
        if self.black_id.as_deref() == Some(user_id) {
            Some(Color::Black)
        } else if self.white_id.as_deref() == Some(user_id) {
            Some(Color::White)
        } else {
            None
        }
    }

    pub fn is_full(&self) -> bool {
        self.black_id.is_some() && self.white_id.is_some()
    }

    pub fn is_completed(&self) -> bool {
        self.status == GameStatus::Completed
    }

    /// Put `user_id` into the first empty seat (black first).
    /// Both seats filled moves the game out of the waiting state.
    pub fn fill_seat(&mut self, user_id: &str) -> Option<Color> {
        let seat = if self.black_id.is_none() {
            self.black_id = Some(user_id.to_string());
            Color::Black
        } else if self.white_id.is_none() {
            self.white_id = Some(user_id.to_string());
            Color::White
        } else {
            return None;
        };
        if self.is_full() && self.status == GameStatus::WaitingForOpponent {
            self.status = GameStatus::InProgress;
            self.started_at = Some(Utc::now());
        }
        Some(seat)
    }

    /// Take `user_id` out of the game. A player sitting alone frees the
    /// seat; leaving a started game forfeits it and completes the game.
    /// Returns the seat that was left.
    pub fn leave(&mut self, user_id: &str) -> Option<Color> {
        let seat = self.seat_of(user_id)?;
        if self.is_full() {
            self.status = GameStatus::Completed;
        } else {
            match seat {
                Color::Black => self.black_id = None,
                Color::White => self.white_id = None,
            }
        }
        Some(seat)
    }
}
