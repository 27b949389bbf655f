use serde::{Deserialize, Serialize};

use crate::engine::board::Move;
use crate::engine::game::{Game, GameEvent, MoveApplied};
use crate::engine::types::{ChessError, Color, Difficulty, GameStatus, PieceKind, Square};

use super::errors::{ApiError, ErrorDetail};

// ---------------------------------------------------------------------------
// Request models
// ---------------------------------------------------------------------------

/// Difficulty as clients send it: a number or a numeric string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DifficultyInput {
    Level(i64),
    Text(String),
}

impl DifficultyInput {
    pub fn resolve(&self) -> Result<Difficulty, ApiError> {
        let invalid = |raw: String| ApiError::from(ChessError::InvalidDifficulty(raw));
        match self {
            DifficultyInput::Level(n) => u8::try_from(*n)
                .ok()
                .and_then(|l| Difficulty::new(l).ok())
                .ok_or_else(|| invalid(n.to_string())),
            DifficultyInput::Text(s) => Difficulty::from_str_loose(s).ok_or_else(|| invalid(s.clone())),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    pub player_color: Option<String>,
    pub difficulty: Option<DifficultyInput>,
    pub fen: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub from: String,
    pub to: String,
    pub promotion: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGamesQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalMovesQuery {
    pub from: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GetMoveRequest {
    pub difficulty: DifficultyInput,
    pub fen: String,
}

// ---------------------------------------------------------------------------
// Response models
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub engine: String,
    pub games: usize,
    pub uptime: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResponse {
    pub id: String,
    pub board: Vec<Vec<Option<String>>>,
    pub fen: String,
    pub status: String,
    pub current_player: String,
    pub player_color: String,
    pub engine_color: String,
    pub difficulty: u8,
    pub check: bool,
    pub captured_pieces: CapturedPieces,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedPieces {
    pub white: Vec<String>,
    pub black: Vec<String>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PieceInfo {
    #[serde(rename = "type")]
    pub piece_type: String,
    pub color: String,
}

/// One controller notification, tagged by `type`.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EventResponse {
    #[serde(rename_all = "camelCase")]
    MoveApplied {
        color: String,
        piece: String,
        from: String,
        to: String,
        notation: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        captured: Option<CapturedEntry>,
        #[serde(skip_serializing_if = "Option::is_none")]
        promotion: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        castle_rook: Option<RookMove>,
    },
    #[serde(rename_all = "camelCase")]
    GameEnded {
        outcome: String,
        loser: Option<String>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedEntry {
    #[serde(flatten)]
    pub piece: PieceInfo,
    pub square: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RookMove {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameResponse {
    #[serde(flatten)]
    pub game: GameResponse,
    pub events: Vec<EventResponse>,
    /// Set when the engine had the first move and failed to play it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_error: Option<ErrorDetail>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveResponse {
    pub game: GameResponse,
    pub events: Vec<EventResponse>,
    /// Set when the player's move was played but the engine's reply failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_error: Option<ErrorDetail>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGamesResponse {
    pub games: Vec<GameResponse>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalMoveEntry {
    pub from: String,
    pub to: String,
    pub notation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalMovesResponse {
    pub moves: Vec<LegalMoveEntry>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct GetMoveResponse {
    pub nextmove: String,
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

/// Parse an algebraic square from a request field.
pub fn parse_square(s: &str) -> Result<Square, ApiError> {
    Square::from_algebraic(s.trim()).ok_or_else(|| ChessError::InvalidSquare(s.to_string()).into())
}

/// Parse a promotion field like "queen" or "q".
pub fn parse_promotion(s: &str) -> Result<PieceKind, ApiError> {
    PieceKind::from_promotion_str(s.trim()).ok_or_else(|| ChessError::InvalidPromotion(s.to_string()).into())
}

/// Parse a color field like "white" or "b".
pub fn parse_color(s: &str) -> Result<Color, ApiError> {
    Color::from_str_loose(s.trim())
        .ok_or_else(|| ApiError::InvalidRequest(format!("invalid color: {s}")))
}

/// Build the 8x8 board array for the API response.
/// Row 0 = rank 8 (top), row 7 = rank 1 (bottom).
/// Pieces: uppercase for White ("R"), lowercase for Black ("r").
/// Empty = None.
pub fn board_to_api(game: &Game) -> Vec<Vec<Option<String>>> {
    let pos = game.position();
    (0..8u8)
        .rev()
        .map(|rank| {
            (0..8u8)
                .map(|file| {
                    pos.piece_at(Square::from_file_rank(file, rank))
                        .map(|p| p.kind.to_char(p.color).to_string())
                })
                .collect()
        })
        .collect()
}

/// Pieces lost by each side, as FEN letters. Promoted pawns are not
/// captures and do not appear.
pub fn captured_pieces(game: &Game) -> CapturedPieces {
    let mut captured = CapturedPieces {
        white: Vec::new(),
        black: Vec::new(),
    };
    for piece in game.position().captured() {
        let letter = piece.kind.to_char(piece.color).to_string();
        match piece.color {
            Color::White => captured.white.push(letter),
            Color::Black => captured.black.push(letter),
        }
    }
    captured
}

/// Convert internal Game to full API GameResponse.
pub fn game_to_response(game: &Game) -> GameResponse {
    let status = game.status();
    GameResponse {
        id: game.id.clone(),
        board: board_to_api(game),
        fen: game.to_fen(),
        status: status.as_str().to_string(),
        current_player: game.side_to_move().to_string(),
        player_color: game.player_color.to_string(),
        engine_color: game.engine_color().to_string(),
        difficulty: game.difficulty.level(),
        check: matches!(status, GameStatus::Check | GameStatus::Checkmate),
        captured_pieces: captured_pieces(game),
        created_at: game.created_at.to_rfc3339(),
    }
}

fn applied_to_response(applied: &MoveApplied) -> EventResponse {
    EventResponse::MoveApplied {
        color: applied.color.to_string(),
        piece: applied.kind.to_string(),
        from: applied.from.to_algebraic(),
        to: applied.to.to_algebraic(),
        notation: applied.notation.clone(),
        captured: applied.captured.as_ref().map(|c| CapturedEntry {
            piece: PieceInfo {
                piece_type: c.kind.to_string(),
                color: c.color.to_string(),
            },
            square: c.square.to_algebraic(),
        }),
        promotion: applied.promotion.map(|k| k.to_string()),
        castle_rook: applied.castle_rook.map(|(from, to)| RookMove {
            from: from.to_algebraic(),
            to: to.to_algebraic(),
        }),
    }
}

impl From<&GameEvent> for EventResponse {
    fn from(event: &GameEvent) -> Self {
        match event {
            GameEvent::MoveApplied(applied) => applied_to_response(applied),
            GameEvent::GameEnded { outcome, loser } => EventResponse::GameEnded {
                outcome: outcome.as_str().to_string(),
                loser: loser.map(|c| c.to_string()),
            },
        }
    }
}

pub fn events_to_response(events: &[GameEvent]) -> Vec<EventResponse> {
    events.iter().map(EventResponse::from).collect()
}

pub fn legal_move_entry(mv: &Move) -> LegalMoveEntry {
    LegalMoveEntry {
        from: mv.from.to_algebraic(),
        to: mv.to.to_algebraic(),
        notation: mv.to_coordinate(),
        promotion: mv.promotion.map(|k| k.to_string()),
    }
}
