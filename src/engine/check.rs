//! Check analysis: pins, king safety, check resolution and mate detection.
//!
//! `refresh` recomputes every piece's derived state from scratch and writes
//! it into the position. It is called after every applied move and after a
//! position is parsed.

use crate::engine::attacks;
use crate::engine::board::{Cell, PieceId, Position};
use crate::engine::pieces;
use crate::engine::types::{Bitboard, Color, PieceKind, Square};

/// Summary of one refresh, per colour (indexed by `Color::index`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Analysis {
    pub checkers: [Vec<PieceId>; 2],
    pub checkmated: [bool; 2],
}

impl Analysis {
    pub fn in_check(&self, color: Color) -> bool {
        !self.checkers[color.index()].is_empty()
    }
}

/// Recompute all derived state of the position.
pub fn refresh(pos: &mut Position) -> Analysis {
    let ids = pos.all_active();

    // 1. Raw generation from a consistent snapshot.
    let generated: Vec<_> = ids.iter().map(|&id| pieces::generate(pos, id)).collect();
    for (&id, g) in ids.iter().zip(generated) {
        let piece = pos.piece_mut(id);
        piece.clear_derived();
        piece.legal = g.legal;
        piece.attacking = g.attacking;
        piece.sight = g.sight;
    }

    // 2. Pins.
    apply_pins(pos, &ids);

    let mut analysis = Analysis::default();
    for color in Color::BOTH {
        // 3. King safety.
        let king = pos.king_id(color);
        let king_sq = pos.piece(king).square;
        let enemy_attacks = pos.attacks_of(!color);
        let beyond = beyond_king(pos, !color);
        let in_check = enemy_attacks.is_set(king_sq);
        let castles = pieces::castle_targets(pos, king, enemy_attacks, in_check);
        {
            let k = pos.piece_mut(king);
            k.legal &= !(enemy_attacks | beyond);
            k.legal |= castles;
            k.in_check = in_check;
        }

        // 4. Check resolution.
        let checkers: Vec<PieceId> = pos
            .active(!color)
            .iter()
            .copied()
            .filter(|&id| pos.piece(id).attacking.is_set(king_sq))
            .collect();
        for &id in &checkers {
            pos.piece_mut(id).checking = true;
        }
        restrict_to_safe_squares(pos, color, &checkers);

        analysis.checkers[color.index()] = checkers;
    }

    // 5. En passant guard.
    guard_en_passant(pos);

    // 6. Checkmate.
    for color in Color::BOTH {
        let checkers = &analysis.checkers[color.index()];
        let king = pos.king_id(color);
        let king_stuck = pos.piece(king).legal.is_empty();
        let allies_stuck = pos
            .active_pieces(color)
            .filter(|p| p.id != king)
            .all(|p| p.legal.is_empty());
        let mate = king_stuck && ((checkers.len() == 1 && allies_stuck) || checkers.len() > 1);
        pos.piece_mut(king).checkmated = mate;
        analysis.checkmated[color.index()] = mate;
    }

    analysis
}

/// Whether `color` has at least one legal move.
pub fn has_legal_move(pos: &Position, color: Color) -> bool {
    pos.active_pieces(color).any(|p| p.legal.is_not_empty())
}

fn apply_pins(pos: &mut Position, ids: &[PieceId]) {
    let mut pins: Vec<(PieceId, Bitboard)> = Vec::new();
    for &id in ids {
        let slider = pos.piece(id);
        let Some(line) = slider.sight.as_ref().and_then(|s| s.check_line.as_ref()) else {
            continue;
        };
        let occupants: Vec<PieceId> = line
            .squares
            .iter()
            .filter_map(|&sq| pos.occupant(sq))
            .collect();
        if let [pinned] = occupants[..] {
            if pos.piece(pinned).color != slider.color {
                let mut allowed = line.blocking();
                allowed.set(slider.square);
                pins.push((pinned, allowed));
            }
        }
    }
    for (id, allowed) in pins {
        let piece = pos.piece_mut(id);
        piece.pinned = true;
        piece.legal &= allowed;
    }
}

/// Squares past the king on direct check lines of `attacker`'s sliders.
fn beyond_king(pos: &Position, attacker: Color) -> Bitboard {
    pos.active_pieces(attacker)
        .filter_map(|p| p.sight.as_ref()?.check_line.as_ref())
        .filter(|line| line.direct)
        .fold(Bitboard::EMPTY, |acc, line| acc | line.beyond_king)
}

fn restrict_to_safe_squares(pos: &mut Position, color: Color, checkers: &[PieceId]) {
    if checkers.is_empty() {
        return;
    }
    let king = pos.king_id(color);
    let allies: Vec<PieceId> = pos
        .active(color)
        .iter()
        .copied()
        .filter(|&id| id != king)
        .collect();

    if checkers.len() > 1 {
        for id in allies {
            pos.piece_mut(id).legal = Bitboard::EMPTY;
        }
        return;
    }

    let checker = pos.piece(checkers[0]);
    let mut safe = checker.check_blocking();
    safe.set(checker.square);

    // A checking pawn that just double-advanced can also be taken en passant.
    let mut pawn_safe = safe;
    if checker.kind == PieceKind::Pawn {
        for (sq, marker) in pos.markers() {
            if marker.pawn == checker.id {
                pawn_safe.set(sq);
            }
        }
    }

    for id in allies {
        let piece = pos.piece_mut(id);
        if piece.kind == PieceKind::Pawn {
            piece.legal &= pawn_safe;
        } else {
            piece.legal &= safe;
        }
    }
}

fn guard_en_passant(pos: &mut Position) {
    let mut exposed: Vec<(PieceId, Square)> = Vec::new();
    for (marker_sq, marker) in pos.markers() {
        for &id in pos.active(!marker.color) {
            let pawn = pos.piece(id);
            if pawn.kind != PieceKind::Pawn || !pawn.legal.is_set(marker_sq) {
                continue;
            }
            let vacated = [pawn.square, pos.piece(marker.pawn).square];
            if exposes_king(pos, pawn.color, &vacated, marker_sq) {
                exposed.push((id, marker_sq));
            }
        }
    }
    for (id, sq) in exposed {
        pos.piece_mut(id).legal.clear(sq);
    }
}

/// Would `color`'s king be hit by an enemy slider once `vacated` are emptied
/// and `filled` is occupied?
fn exposes_king(pos: &Position, color: Color, vacated: &[Square], filled: Square) -> bool {
    let king_sq = pos.king(color).square;
    let tables = attacks::tables();

    attacks::directions(PieceKind::Queen).iter().any(|&dir| {
        for &sq in tables.ray(king_sq, dir) {
            if sq == filled {
                return false;
            }
            if vacated.contains(&sq) {
                continue;
            }
            if let Cell::Occupied(id) = pos.cell(sq) {
                let p = pos.piece(id);
                return p.color != color && attacks::slides_along(p.kind, dir);
            }
        }
        false
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
