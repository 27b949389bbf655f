//! Stateful game controller wrapping Position.
//!
//! `Game` sequences turns between the player and the engine: validate a
//! candidate move against the last analysis, apply it, re-analyse, check for
//! the end of the game, then (on the engine's turn) render the FEN, query the
//! engine and feed its reply through the same path.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ai::AiEngine;
use crate::engine::board::{Capture, Move, PieceId, Position};
use crate::engine::check::{self, Analysis};
use crate::engine::fen::parse_coordinate_move;
use crate::engine::types::{ChessError, Color, Difficulty, GameStatus, Outcome, PieceKind, Square};

// =========================================================================
// Events
// =========================================================================

/// A piece removed by a move.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturedPiece {
    pub kind: PieceKind,
    pub color: Color,
    pub square: Square,
}

/// Everything a presentation layer needs to animate one applied move.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveApplied {
    pub color: Color,
    pub kind: PieceKind,
    pub from: Square,
    pub to: Square,
    pub captured: Option<CapturedPiece>,
    pub promotion: Option<PieceKind>,
    /// Rook origin and destination when the move castled.
    pub castle_rook: Option<(Square, Square)>,
    /// Coordinate notation of the move.
    pub notation: String,
}

/// Notifications emitted by the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameEvent {
    MoveApplied(MoveApplied),
    /// `loser` is `None` for a stalemate.
    GameEnded {
        outcome: Outcome,
        loser: Option<Color>,
    },
}

// =========================================================================
// Free functions over Position
// =========================================================================

/// Apply a resolved move and bring the position up to date: counters, side
/// to move and a full re-analysis.
pub fn commit(pos: &mut Position, mv: &Move) -> Analysis {
    let mover = pos.piece(mv.piece);
    let mover_color = mover.color;
    let pawn_move = mover.kind == PieceKind::Pawn;

    pos.apply_move(mv);

    if pawn_move || mv.capture.is_some() {
        pos.halfmove_clock = 0;
    } else {
        pos.halfmove_clock = pos.halfmove_clock.saturating_add(1);
    }
    if mover_color == Color::Black {
        pos.fullmove_number = pos.fullmove_number.saturating_add(1);
    }
    pos.side_to_move = !mover_color;

    let analysis = check::refresh(pos);

    #[cfg(debug_assertions)]
    pos.assert_consistent();

    analysis
}

/// All legal moves of the side to move, promotions expanded to each kind.
pub fn legal_moves(pos: &Position) -> Vec<Move> {
    let mut moves = Vec::with_capacity(48);
    for &id in pos.active(pos.side_to_move) {
        moves.extend(legal_moves_of(pos, id));
    }
    moves
}

fn legal_moves_of(pos: &Position, id: PieceId) -> Vec<Move> {
    let piece = pos.piece(id);
    let mut moves = Vec::new();
    for to in piece.legal.iter() {
        if is_promotion_square(pos, id, to) {
            for kind in PieceKind::PROMOTIONS {
                if let Ok(mv) = pos.resolve_move(piece.square, to, Some(kind)) {
                    moves.push(mv);
                }
            }
        } else if let Ok(mv) = pos.resolve_move(piece.square, to, None) {
            moves.push(mv);
        }
    }
    moves
}

fn is_promotion_square(pos: &Position, id: PieceId, to: Square) -> bool {
    let piece = pos.piece(id);
    piece.kind == PieceKind::Pawn && to.rank() == (!piece.color).home_rank()
}

/// Status of the side to move, read from the last analysis.
pub fn status_of(pos: &Position) -> GameStatus {
    let king = pos.king(pos.side_to_move);
    if king.checkmated {
        GameStatus::Checkmate
    } else if !check::has_legal_move(pos, pos.side_to_move) {
        GameStatus::Stalemate
    } else if king.in_check {
        GameStatus::Check
    } else {
        GameStatus::Active
    }
}

// =========================================================================
// Game
// =========================================================================

/// A chess game between a player and an engine.
#[derive(Clone, Debug)]
pub struct Game {
    position: Position,
    status: GameStatus,

    // Metadata
    pub id: String,
    pub player_color: Color,
    pub difficulty: Difficulty,
    pub created_at: DateTime<Utc>,
}

impl Game {
    // -----------------------------------------------------------------
    // Constructors
    // -----------------------------------------------------------------

    /// Create a new game from the standard starting position.
    pub fn new(player_color: Color, difficulty: Difficulty) -> Self {
        Self::with_position(Position::starting(), player_color, difficulty)
    }

    /// Create a game from a FEN string.
    pub fn from_fen(fen: &str, player_color: Color, difficulty: Difficulty) -> Result<Self, ChessError> {
        Ok(Self::with_position(Position::from_fen(fen)?, player_color, difficulty))
    }

    fn with_position(position: Position, player_color: Color, difficulty: Difficulty) -> Self {
        let status = status_of(&position);
        Self {
            position,
            status,
            id: Uuid::new_v4().to_string(),
            player_color,
            difficulty,
            created_at: Utc::now(),
        }
    }

    // -----------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------

    /// Current board position.
    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Current game status.
    pub fn status(&self) -> GameStatus {
        self.status
    }

    /// Side to move.
    pub fn side_to_move(&self) -> Color {
        self.position.side_to_move
    }

    pub fn engine_color(&self) -> Color {
        !self.player_color
    }

    /// Whether the engine should move next.
    pub fn is_engine_turn(&self) -> bool {
        !self.is_game_over() && self.side_to_move() == self.engine_color()
    }

    /// Whether the game is over.
    pub fn is_game_over(&self) -> bool {
        self.status.is_game_over()
    }

    /// Current position as FEN.
    pub fn to_fen(&self) -> String {
        self.position.to_fen()
    }

    /// All legal moves in the current position.
    pub fn legal_moves(&self) -> Vec<Move> {
        legal_moves(&self.position)
    }

    /// Legal moves of the piece on `sq`, if it belongs to the side to move.
    pub fn legal_moves_from(&self, sq: Square) -> Vec<Move> {
        match self.position.piece_at(sq) {
            Some(p) if p.color == self.side_to_move() => legal_moves_of(&self.position, p.id),
            _ => Vec::new(),
        }
    }

    // -----------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------

    /// Resolve and validate a candidate move for the side to move.
    ///
    /// A pawn reaching the last rank needs a promotion kind; any other move
    /// must not carry one.
    pub fn validate(&self, from: Square, to: Square, promotion: Option<PieceKind>) -> Result<Move, ChessError> {
        let mv = self.check_destination(from, to)?;
        let promotes = is_promotion_square(&self.position, mv.piece, to);
        match (promotes, promotion) {
            (true, None) => Err(ChessError::InvalidPromotion(
                "a promotion piece is required".to_string(),
            )),
            (false, Some(kind)) => Err(ChessError::InvalidPromotion(format!(
                "{from}{to} cannot promote to {kind}"
            ))),
            _ => Ok(Move { promotion, ..mv }),
        }
    }

    /// Shared checks: game still running, a piece of the side to move on
    /// `from`, and `to` in its legal set.
    fn check_destination(&self, from: Square, to: Square) -> Result<Move, ChessError> {
        if self.is_game_over() {
            return Err(ChessError::GameOver(self.status.to_string()));
        }
        let illegal = |reason: &str| ChessError::IllegalMove {
            from: from.to_algebraic(),
            to: to.to_algebraic(),
            reason: reason.to_string(),
        };
        let piece = self
            .position
            .piece_at(from)
            .ok_or_else(|| illegal("no piece on origin square"))?;
        if piece.color != self.side_to_move() {
            return Err(illegal("piece belongs to the side not on move"));
        }
        if !piece.legal.is_set(to) {
            return Err(illegal("destination is not a legal move"));
        }
        self.position.resolve_move(from, to, None)
    }

    /// Validate an engine reply. Shape problems, including a missing or
    /// spurious promotion letter, are protocol errors.
    fn validate_reply(&self, reply: &str) -> Result<Move, ChessError> {
        let parsed = parse_coordinate_move(&self.position, reply)?;
        let mv = self.check_destination(parsed.from, parsed.to)?;
        let promotes = is_promotion_square(&self.position, mv.piece, mv.to);
        if promotes != parsed.promotion.is_some() {
            return Err(ChessError::Protocol(format!(
                "engine reply '{reply}' has a wrong promotion suffix"
            )));
        }
        Ok(Move {
            promotion: parsed.promotion,
            ..mv
        })
    }

    // -----------------------------------------------------------------
    // Playing moves
    // -----------------------------------------------------------------

    /// Play the player's move.
    pub fn submit_move(
        &mut self,
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
    ) -> Result<Vec<GameEvent>, ChessError> {
        if !self.is_game_over() && self.side_to_move() != self.player_color {
            return Err(ChessError::WrongSide {
                color: self.player_color,
            });
        }
        let mv = self.validate(from, to, promotion).inspect_err(|e| {
            debug!(game_id = %self.id, %from, %to, error = %e, "rejected player move");
        })?;
        Ok(self.play(&mv))
    }

    /// Ask the engine for its move and play it. On any failure the position
    /// is left untouched and the engine's turn can be retried.
    pub async fn engine_move<E: AiEngine>(&mut self, engine: &E) -> Result<Vec<GameEvent>, ChessError> {
        if self.is_game_over() {
            return Err(ChessError::GameOver(self.status.to_string()));
        }
        if self.side_to_move() != self.engine_color() {
            return Err(ChessError::WrongSide {
                color: self.engine_color(),
            });
        }

        let fen = self.to_fen();
        debug!(game_id = %self.id, engine = engine.name(), %fen, "querying engine");
        let reply = engine
            .best_move(self.difficulty, &fen)
            .await
            .inspect_err(|e| warn!(game_id = %self.id, error = %e, "engine query failed"))?;

        let mv = self
            .validate_reply(reply.trim_end_matches(['\r', '\n']))
            .inspect_err(|e| warn!(game_id = %self.id, %reply, error = %e, "engine reply rejected"))?;
        Ok(self.play(&mv))
    }

    /// Play the engine's opening move if it has the first turn.
    pub async fn begin<E: AiEngine>(&mut self, engine: &E) -> Result<Vec<GameEvent>, ChessError> {
        if self.is_engine_turn() {
            self.engine_move(engine).await
        } else {
            Ok(Vec::new())
        }
    }

    /// A full turn: the player's move, then the engine's reply.
    ///
    /// An engine failure does not undo the player's move; it is returned
    /// alongside the events of that move.
    pub async fn play_turn<E: AiEngine>(
        &mut self,
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
        engine: &E,
    ) -> Result<Turn, ChessError> {
        let mut events = self.submit_move(from, to, promotion)?;
        let mut engine_error = None;
        if self.is_engine_turn() {
            match self.engine_move(engine).await {
                Ok(reply) => events.extend(reply),
                Err(e) => engine_error = Some(e),
            }
        }
        Ok(Turn {
            events,
            engine_error,
        })
    }

    /// Apply an already validated move.
    fn play(&mut self, mv: &Move) -> Vec<GameEvent> {
        let applied = self.describe(mv);
        commit(&mut self.position, mv);
        self.status = status_of(&self.position);

        info!(
            game_id = %self.id,
            color = %applied.color,
            mv = %applied.notation,
            status = %self.status,
            "move applied"
        );

        let mut events = vec![GameEvent::MoveApplied(applied)];
        let ended = match self.status {
            GameStatus::Checkmate => Some((Outcome::Checkmate, Some(self.side_to_move()))),
            GameStatus::Stalemate => Some((Outcome::Stalemate, None)),
            _ => None,
        };
        if let Some((outcome, loser)) = ended {
            info!(game_id = %self.id, outcome = outcome.as_str(), "game ended");
            events.push(GameEvent::GameEnded { outcome, loser });
        }
        events
    }

    fn describe(&self, mv: &Move) -> MoveApplied {
        let mover = self.position.piece(mv.piece);
        let captured = mv.capture.map(|capture| {
            let id = match capture {
                Capture::Piece(id) => id,
                Capture::EnPassant { pawn, .. } => pawn,
            };
            let victim = self.position.piece(id);
            CapturedPiece {
                kind: victim.kind,
                color: victim.color,
                square: victim.square,
            }
        });
        MoveApplied {
            color: mover.color,
            kind: mover.kind,
            from: mv.from,
            to: mv.to,
            captured,
            promotion: mv.promotion,
            castle_rook: mv.castle.map(|c| (c.from, c.to)),
            notation: mv.to_coordinate(),
        }
    }
}

/// Result of `Game::play_turn`.
#[derive(Debug)]
pub struct Turn {
    pub events: Vec<GameEvent>,
    pub engine_error: Option<ChessError>,
}

// =========================================================================
// Tests
// =========================================================================
