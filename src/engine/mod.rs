pub mod attacks;
pub mod board;
pub mod check;
pub mod fen;
pub mod game;
pub mod pieces;
pub mod types;

pub use board::{Move, Piece, Position, STARTING_FEN};
pub use game::{Game, GameEvent, commit, legal_moves, status_of};
pub use types::*;
