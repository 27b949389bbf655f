//! FEN import/export and coordinate move parsing.

use crate::engine::board::{EnPassantMarker, Move, Position};
use crate::engine::check;
use crate::engine::types::{CastlingRights, ChessError, Color, PieceKind, Square};

impl Position {
    /// Parse a FEN string into an analysed `Position`.
    ///
    /// Validates all 6 fields (piece placement, side to move, castling,
    /// en passant, halfmove clock, fullmove number) and ensures exactly one
    /// king per side.
    pub fn from_fen(fen: &str) -> Result<Self, ChessError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(ChessError::InvalidFen(format!(
                "expected 6 fields, got {}",
                fields.len()
            )));
        }

        let mut pos = Position::empty();

        // ----- Field 1: Piece placement -----
        let ranks: Vec<&str> = fields[0].split('/').collect();
        if ranks.len() != 8 {
            return Err(ChessError::InvalidFen(format!(
                "expected 8 ranks, got {}",
                ranks.len()
            )));
        }

        let mut king_count = [0u8; 2];
        for (rank_idx, rank_str) in ranks.iter().enumerate() {
            let rank = 7 - rank_idx as u8;
            let mut file: u8 = 0;
            for ch in rank_str.chars() {
                if file > 7 {
                    return Err(ChessError::InvalidFen(format!(
                        "too many squares in rank {}",
                        rank + 1
                    )));
                }
                if let Some(digit) = ch.to_digit(10) {
                    if !(1..=8).contains(&digit) {
                        return Err(ChessError::InvalidFen(format!(
                            "invalid empty count '{ch}' in rank {}",
                            rank + 1
                        )));
                    }
                    file += digit as u8;
                } else if let Some((color, kind)) = PieceKind::from_char(ch) {
                    let sq = Square::from_file_rank(file, rank);
                    let id = pos.spawn(kind, color, sq);
                    if kind == PieceKind::Pawn {
                        if rank == 0 || rank == 7 {
                            return Err(ChessError::InvalidFen(format!(
                                "pawn on back rank at {sq}"
                            )));
                        }
                        let start_rank = (color.home_rank() as i8 + color.forward()) as u8;
                        pos.piece_mut(id).first_move = rank == start_rank;
                    }
                    if kind == PieceKind::King {
                        king_count[color.index()] += 1;
                    }
                    file += 1;
                } else {
                    return Err(ChessError::InvalidFen(format!(
                        "invalid character '{ch}' in piece placement"
                    )));
                }
            }
            if file != 8 {
                return Err(ChessError::InvalidFen(format!(
                    "rank {} has {} squares instead of 8",
                    rank + 1,
                    file
                )));
            }
        }

        for color in Color::BOTH {
            let count = king_count[color.index()];
            if count != 1 {
                return Err(ChessError::InvalidFen(format!(
                    "{color} has {count} kings (expected 1)"
                )));
            }
        }

        // ----- Field 2: Side to move -----
        pos.side_to_move = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => {
                return Err(ChessError::InvalidFen(format!(
                    "invalid side to move: '{other}'"
                )));
            }
        };

        // ----- Field 3: Castling availability -----
        let rights = CastlingRights::from_fen(fields[2]).ok_or_else(|| {
            ChessError::InvalidFen(format!("invalid castling string: '{}'", fields[2]))
        })?;
        apply_castling_rights(&mut pos, rights);

        // ----- Field 4: En passant target square -----
        if fields[3] != "-" {
            let ep_sq = Square::from_algebraic(fields[3]).ok_or_else(|| {
                ChessError::InvalidFen(format!("invalid en passant square: '{}'", fields[3]))
            })?;
            place_en_passant_marker(&mut pos, ep_sq)?;
        }

        // ----- Field 5: Halfmove clock -----
        pos.halfmove_clock = fields[4].parse::<u16>().map_err(|_| {
            ChessError::InvalidFen(format!("invalid halfmove clock: '{}'", fields[4]))
        })?;

        // ----- Field 6: Fullmove number -----
        pos.fullmove_number = fields[5].parse::<u16>().map_err(|_| {
            ChessError::InvalidFen(format!("invalid fullmove number: '{}'", fields[5]))
        })?;
        if pos.fullmove_number == 0 {
            return Err(ChessError::InvalidFen(
                "fullmove number must be >= 1".to_string(),
            ));
        }

        check::refresh(&mut pos);
        if pos.king(!pos.side_to_move).in_check {
            return Err(ChessError::InvalidFen(
                "side not to move is in check".to_string(),
            ));
        }

        #[cfg(debug_assertions)]
        pos.assert_consistent();

        Ok(pos)
    }

    /// Castling availability derived from the kings' and rooks' flags.
    pub fn castling_rights(&self) -> CastlingRights {
        let mut rights = CastlingRights::NONE;
        for color in Color::BOTH {
            let king = self.king(color);
            if !king.castle_eligible {
                continue;
            }
            for kingside in [true, false] {
                let corner =
                    Square::from_file_rank(if kingside { 7 } else { 0 }, color.home_rank());
                let rook_ok = self.piece_at(corner).is_some_and(|r| {
                    r.kind == PieceKind::Rook && r.color == color && r.castle_eligible
                });
                if rook_ok {
                    rights.insert(CastlingRights::flag(color, kingside));
                }
            }
        }
        rights
    }

    /// Export the position as a FEN string.
    pub fn to_fen(&self) -> String {
        let mut fen = String::with_capacity(80);

        // ----- Field 1: Piece placement -----
        for rank in (0..8).rev() {
            let mut empty_count = 0u8;
            for file in 0..8 {
                let sq = Square::from_file_rank(file, rank);
                match self.piece_at(sq) {
                    Some(piece) => {
                        if empty_count > 0 {
                            fen.push((b'0' + empty_count) as char);
                            empty_count = 0;
                        }
                        fen.push(piece.kind.to_char(piece.color));
                    }
                    None => empty_count += 1,
                }
            }
            if empty_count > 0 {
                fen.push((b'0' + empty_count) as char);
            }
            if rank > 0 {
                fen.push('/');
            }
        }

        // ----- Field 2: Side to move -----
        fen.push(' ');
        fen.push(self.side_to_move.fen_char());

        // ----- Field 3: Castling -----
        fen.push(' ');
        fen.push_str(&self.castling_rights().to_fen());

        // ----- Field 4: En passant -----
        fen.push(' ');
        match self.markers().first() {
            Some((sq, _)) => fen.push_str(&sq.to_algebraic()),
            None => fen.push('-'),
        }

        // ----- Field 5: Halfmove clock -----
        fen.push(' ');
        fen.push_str(&self.halfmove_clock.to_string());

        // ----- Field 6: Fullmove number -----
        fen.push(' ');
        fen.push_str(&self.fullmove_number.to_string());

        fen
    }
}

/// A king keeps eligibility only on its home square with some right left;
/// a rook only on a corner named by the rights.
fn apply_castling_rights(pos: &mut Position, rights: CastlingRights) {
    for color in Color::BOTH {
        let home = Square::from_file_rank(4, color.home_rank());
        let king = pos.king_id(color);
        let mut any = false;
        for kingside in [true, false] {
            if !rights.has(CastlingRights::flag(color, kingside)) {
                continue;
            }
            let corner = Square::from_file_rank(if kingside { 7 } else { 0 }, color.home_rank());
            let rook = pos
                .piece_at(corner)
                .filter(|r| r.kind == PieceKind::Rook && r.color == color)
                .map(|r| r.id);
            if let Some(rook) = rook {
                pos.piece_mut(rook).castle_eligible = true;
                any = true;
            }
        }
        if any && pos.piece(king).square == home {
            pos.piece_mut(king).castle_eligible = true;
        }
    }
}

/// Turn the FEN en passant square into a marker linked to the pawn that
/// just advanced past it.
fn place_en_passant_marker(pos: &mut Position, ep_sq: Square) -> Result<(), ChessError> {
    let advanced = !pos.side_to_move;
    let expected_rank = (advanced.home_rank() as i8 + 2 * advanced.forward()) as u8;
    if ep_sq.rank() != expected_rank {
        return Err(ChessError::InvalidFen(format!(
            "en passant square {ep_sq} does not match side to move"
        )));
    }
    if pos.occupant(ep_sq).is_some() {
        return Err(ChessError::InvalidFen(format!(
            "en passant square {ep_sq} is occupied"
        )));
    }
    let pawn = ep_sq
        .offset(0, advanced.forward())
        .and_then(|sq| pos.piece_at(sq))
        .filter(|p| p.kind == PieceKind::Pawn && p.color == advanced)
        .map(|p| p.id)
        .ok_or_else(|| {
            ChessError::InvalidFen(format!("no pawn in front of en passant square {ep_sq}"))
        })?;
    pos.place_marker(
        ep_sq,
        EnPassantMarker {
            color: advanced,
            pawn,
        },
    );
    Ok(())
}

/// Parse a coordinate move (`e2e4`, `e7e8q`) against the live position.
///
/// Anything other than two squares and an optional `q`/`r`/`n`/`b` suffix is
/// a protocol error.
pub fn parse_coordinate_move(pos: &Position, s: &str) -> Result<Move, ChessError> {
    let protocol = || ChessError::Protocol(format!("malformed move string '{s}'"));
    if !s.is_ascii() || !(s.len() == 4 || s.len() == 5) {
        return Err(protocol());
    }
    let from = Square::from_algebraic(&s[0..2]).ok_or_else(protocol)?;
    let to = Square::from_algebraic(&s[2..4]).ok_or_else(protocol)?;
    let promotion = match s[4..].chars().next() {
        Some(c) => Some(PieceKind::from_promotion_char(c).ok_or_else(protocol)?),
        None => None,
    };
    pos.resolve_move(from, to, promotion)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
