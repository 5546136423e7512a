pub mod game_data;
pub mod record;
pub mod sgf;

pub use game_data::{Color, Game, GameStatus, Move};
pub use sgf::SgfError;
