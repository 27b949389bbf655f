//! Per-kind move and attack generation.
//!
//! Everything here reads a `&Position` and returns sets; nothing is written
//! back. The check analyzer combines the results into the final legal sets.

use crate::engine::attacks;
use crate::engine::board::{Cell, CheckLine, PieceId, Position, SightLines};
use crate::engine::types::{Bitboard, Color, PieceKind, Square};

/// Raw generation result for one piece, before pins and check are applied.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Generated {
    pub legal: Bitboard,
    pub attacking: Bitboard,
    pub sight: Option<SightLines>,
}

/// Generate the pseudo-legal move and attack sets of a piece.
pub fn generate(pos: &Position, id: PieceId) -> Generated {
    let piece = pos.piece(id);
    match piece.kind {
        kind if kind.is_slider() => slider(pos, id),
        PieceKind::Knight => leaper(pos, piece.color, attacks::tables().knight_attacks(piece.square)),
        PieceKind::King => leaper(pos, piece.color, attacks::tables().king_attacks(piece.square)),
        _ => pawn(pos, id),
    }
}

/// Shared occupancy rule for one candidate square. Returns false when the
/// square ends the line.
fn visit(pos: &Position, color: Color, sq: Square, out: &mut Generated) -> bool {
    out.attacking.set(sq);
    match pos.piece_at(sq) {
        None => {
            out.legal.set(sq);
            true
        }
        Some(occupant) => {
            if occupant.color != color {
                out.legal.set(sq);
            }
            false
        }
    }
}

fn leaper(pos: &Position, color: Color, targets: Bitboard) -> Generated {
    let mut out = Generated::default();
    for sq in targets.iter() {
        visit(pos, color, sq, &mut out);
    }
    out
}

fn slider(pos: &Position, id: PieceId) -> Generated {
    let piece = pos.piece(id);
    let tables = attacks::tables();
    let mut out = Generated::default();
    let mut sight = SightLines::default();

    for &dir in attacks::directions(piece.kind) {
        let ray = tables.ray(piece.square, dir);
        for &sq in ray {
            if !visit(pos, piece.color, sq, &mut out) {
                break;
            }
        }
        if sight.check_line.is_none() {
            sight.check_line = check_line(pos, piece.color, ray);
        }
        sight.rays.push(ray.to_vec());
    }

    out.sight = Some(sight);
    out
}

/// The check line of a ray: either the enemy king is the first occupant
/// (direct), or exactly one piece stands before it.
fn check_line(pos: &Position, color: Color, ray: &[Square]) -> Option<CheckLine> {
    let is_enemy_king = |sq: Square| {
        pos.piece_at(sq)
            .is_some_and(|p| p.kind == PieceKind::King && p.color != color)
    };

    let mut occupants = ray
        .iter()
        .enumerate()
        .filter(|&(_, &sq)| pos.occupant(sq).is_some());

    let (first, &first_sq) = occupants.next()?;
    if is_enemy_king(first_sq) {
        return Some(CheckLine {
            squares: ray[..first].to_vec(),
            direct: true,
            beyond_king: ray[first + 1..].iter().copied().collect(),
        });
    }

    let (second, &second_sq) = occupants.next()?;
    if is_enemy_king(second_sq) {
        return Some(CheckLine {
            squares: ray[..second].to_vec(),
            direct: false,
            beyond_king: Bitboard::EMPTY,
        });
    }
    None
}

fn pawn(pos: &Position, id: PieceId) -> Generated {
    let piece = pos.piece(id);
    let forward = piece.color.forward();
    let mut out = Generated::default();

    if let Some(one) = piece.square.offset(0, forward) {
        if pos.occupant(one).is_none() {
            out.legal.set(one);
            if piece.first_move {
                if let Some(two) = piece.square.offset(0, 2 * forward) {
                    if pos.occupant(two).is_none() {
                        out.legal.set(two);
                    }
                }
            }
        }
    }

    for df in [-1, 1] {
        let Some(diag) = piece.square.offset(df, forward) else {
            continue;
        };
        out.attacking.set(diag);
        let capturable = match pos.cell(diag) {
            Cell::Occupied(target) => pos.piece(target).color != piece.color,
            Cell::Marker(m) => m.color != piece.color,
            Cell::Empty => false,
        };
        if capturable {
            out.legal.set(diag);
        }
    }

    out
}

/// Castling destinations for a king. Empty unless the king is eligible and
/// not in check.
pub fn castle_targets(pos: &Position, king: PieceId, enemy_attacks: Bitboard, in_check: bool) -> Bitboard {
    let k = pos.piece(king);
    let mut targets = Bitboard::EMPTY;
    if !k.castle_eligible || in_check {
        return targets;
    }

    for kingside in [true, false] {
        let corner = Square::from_file_rank(if kingside { 7 } else { 0 }, k.square.rank());
        let rook_ok = pos.piece_at(corner).is_some_and(|r| {
            r.kind == PieceKind::Rook && r.color == k.color && r.castle_eligible
        });
        if !rook_ok {
            continue;
        }

        let (lo, hi) = if kingside {
            (k.square.file() + 1, corner.file())
        } else {
            (corner.file() + 1, k.square.file())
        };
        let path_clear = (lo..hi)
            .all(|file| pos.occupant(Square::from_file_rank(file, k.square.rank())).is_none());
        if !path_clear {
            continue;
        }

        let step: i8 = if kingside { 1 } else { -1 };
        let transit = k.square.offset(step, 0);
        let dest = k.square.offset(2 * step, 0);
        if let (Some(transit), Some(dest)) = (transit, dest) {
            if !enemy_attacks.is_set(transit) && !enemy_attacks.is_set(dest) {
                targets.set(dest);
            }
        }
    }
    targets
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
