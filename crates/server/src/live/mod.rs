//! Real-time core: live sessions, seat bindings and the move pipeline.

pub mod connection;
pub mod processor;
pub mod registry;
pub mod session;

pub use connection::{ConnectionHandle, ConnectionManager, Delivery, Mailbox, Outbound};
pub use processor::{Accepted, Followup, MoveProcessor};
pub use registry::SessionRegistry;
pub use session::Session;

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum LiveError {
    #[error("game not found")]
    NotFound,

    #[error("game has not started yet")]
    NotStarted,

    #[error("game is already completed")]
    GameCompleted,

    #[error("user does not hold a seat in this game")]
    SeatConflict,

    #[error("malformed move: {0}")]
    Malformed(String),

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    #[error("session was retired")]
    Retired,
}
