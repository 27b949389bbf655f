//! AI Engine: trait definition and RandomAi.
//!
//! The `AiEngine` trait is the move-choosing collaborator the game
//! controller talks to: it receives a FEN and a difficulty and answers with
//! a coordinate move string. The controller treats the answer as untrusted.

use std::future::{Future, ready};

use rand::seq::SliceRandom;

use crate::engine::board::Position;
use crate::engine::game::legal_moves;
use crate::engine::types::{ChessError, Difficulty};

// =========================================================================
// AiEngine trait
// =========================================================================

/// The AI engine interface.
pub trait AiEngine: Send + Sync {
    /// Choose a move for the side to move in `fen`, as `<from><to>[qrnb]`.
    fn best_move(
        &self,
        difficulty: Difficulty,
        fen: &str,
    ) -> impl Future<Output = Result<String, ChessError>> + Send;

    /// Human-readable name for this engine.
    fn name(&self) -> &str;
}

// =========================================================================
// RandomAi
// =========================================================================

/// Picks a uniformly random legal move. Difficulty is ignored.
pub struct RandomAi;

impl RandomAi {
    fn choose(fen: &str) -> Result<String, ChessError> {
        let pos = Position::from_fen(fen)?;
        let moves = legal_moves(&pos);
        let mut rng = rand::thread_rng();
        moves
            .choose(&mut rng)
            .map(|mv| mv.to_coordinate())
            .ok_or_else(|| ChessError::GameOver("no legal moves".to_string()))
    }
}

impl AiEngine for RandomAi {
    fn best_move(
        &self,
        _difficulty: Difficulty,
        fen: &str,
    ) -> impl Future<Output = Result<String, ChessError>> + Send {
        ready(Self::choose(fen))
    }

    fn name(&self) -> &str {
        "RandomAi"
    }
}

// =========================================================================
// Tests
// =========================================================================
