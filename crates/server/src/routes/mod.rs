pub mod games;
pub mod health;
pub mod play_ws;
