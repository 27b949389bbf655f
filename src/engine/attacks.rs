//! Pre-computed geometry tables for piece generation.
//!
//! Tables are initialised once (via `OnceLock`) and live for the lifetime of
//! the process. Leapers (knight, king) get a square set per origin; sliders
//! get the ordered square sequence of every ray, nearest square first, which
//! is exactly a sight-line on an empty board.

use crate::engine::types::{Bitboard, PieceKind, Square};
use std::sync::OnceLock;

/// Orthogonal ray directions as (file delta, rank delta).
pub const ORTHOGONAL: [(i8, i8); 4] = [(0, 1), (1, 0), (0, -1), (-1, 0)];

/// Diagonal ray directions as (file delta, rank delta).
pub const DIAGONAL: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, -1), (-1, 1)];

const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

const KING_OFFSETS: [(i8, i8); 8] = [
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
];

// =========================================================================
// Public API
// =========================================================================

/// Get a reference to the global geometry tables.
pub fn tables() -> &'static AttackTables {
    static TABLES: OnceLock<AttackTables> = OnceLock::new();
    TABLES.get_or_init(AttackTables::init)
}

/// Ray directions a slider of `kind` walks. Empty for non-sliders.
pub fn directions(kind: PieceKind) -> &'static [(i8, i8)] {
    static QUEEN: [(i8, i8); 8] = [
        (0, 1),
        (1, 0),
        (0, -1),
        (-1, 0),
        (1, 1),
        (1, -1),
        (-1, -1),
        (-1, 1),
    ];
    match kind {
        PieceKind::Rook => &ORTHOGONAL,
        PieceKind::Bishop => &DIAGONAL,
        PieceKind::Queen => &QUEEN,
        _ => &[],
    }
}

/// Whether a slider of `kind` moves along direction `dir`.
pub fn slides_along(kind: PieceKind, dir: (i8, i8)) -> bool {
    directions(kind).contains(&dir)
}

/// Pre-computed square sets and rays.
pub struct AttackTables {
    knight: [Bitboard; 64],
    king: [Bitboard; 64],
    /// `rays[square]` holds one (direction, squares) pair per queen direction.
    rays: Vec<Vec<((i8, i8), Vec<Square>)>>,
}

impl AttackTables {
    /// Squares a knight on `sq` reaches.
    #[inline]
    pub fn knight_attacks(&self, sq: Square) -> Bitboard {
        self.knight[sq.0 as usize]
    }

    /// Squares adjacent to `sq`.
    #[inline]
    pub fn king_attacks(&self, sq: Square) -> Bitboard {
        self.king[sq.0 as usize]
    }

    /// The squares from `sq` to the board edge along `dir`, nearest first.
    pub fn ray(&self, sq: Square, dir: (i8, i8)) -> &[Square] {
        self.rays[sq.0 as usize]
            .iter()
            .find(|(d, _)| *d == dir)
            .map(|(_, squares)| squares.as_slice())
            .unwrap_or(&[])
    }

    fn init() -> Self {
        let mut knight = [Bitboard::EMPTY; 64];
        let mut king = [Bitboard::EMPTY; 64];
        let mut rays = Vec::with_capacity(64);

        for idx in 0..64u8 {
            let sq = Square(idx);
            knight[idx as usize] = leaps(sq, &KNIGHT_OFFSETS);
            king[idx as usize] = leaps(sq, &KING_OFFSETS);
            rays.push(
                directions(PieceKind::Queen)
                    .iter()
                    .map(|&dir| (dir, walk(sq, dir)))
                    .collect(),
            );
        }

        AttackTables { knight, king, rays }
    }
}

fn leaps(sq: Square, offsets: &[(i8, i8)]) -> Bitboard {
    offsets
        .iter()
        .filter_map(|&(df, dr)| sq.offset(df, dr))
        .collect()
}

fn walk(sq: Square, (df, dr): (i8, i8)) -> Vec<Square> {
    let mut squares = Vec::with_capacity(7);
    let mut cur = sq;
    while let Some(next) = cur.offset(df, dr) {
        squares.push(next);
        cur = next;
    }
    squares
}

// =========================================================================
// Tests
// =========================================================================
