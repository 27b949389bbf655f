//! Piece-arena chess position representation.
//!
//! `Position` owns every piece that ever existed in the game (an arena indexed
//! by `PieceId`), an 8×8 grid of cells pointing into that arena, the active
//! set per colour, the captured record, and the move counters. It stores and
//! mutates; all rule knowledge lives in `pieces` and `check`.

use crate::engine::types::{Bitboard, ChessError, Color, PieceKind, Square};

/// Index of a piece in the position's arena. Ids are never reused.
pub type PieceId = usize;

// ---------------------------------------------------------------------------
// Cells & markers
// ---------------------------------------------------------------------------

/// Transient token left on the square a pawn skipped with a double advance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnPassantMarker {
    /// Colour of the pawn that advanced.
    pub color: Color,
    /// The pawn that advanced; removed when the marker is captured.
    pub pawn: PieceId,
}

/// Content of a single board square.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Cell {
    #[default]
    Empty,
    Occupied(PieceId),
    Marker(EnPassantMarker),
}

// ---------------------------------------------------------------------------
// Pieces
// ---------------------------------------------------------------------------

/// Lifecycle of a piece.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PieceState {
    Active,
    Captured,
    /// A pawn retired by promotion; its replacement is a new piece.
    Promoted,
}

/// The ray from a slider toward the enemy king.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckLine {
    /// Squares strictly between the slider and the king, nearest first.
    pub squares: Vec<Square>,
    /// True when nothing stands between the slider and the king.
    pub direct: bool,
    /// Ray squares past the king; only populated for a direct line.
    pub beyond_king: Bitboard,
}

impl CheckLine {
    /// Squares on which an interposed piece blocks the line.
    pub fn blocking(&self) -> Bitboard {
        self.squares.iter().copied().collect()
    }
}

/// Slider-only derived state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SightLines {
    /// One ordered square sequence per ray, nearest square first.
    pub rays: Vec<Vec<Square>>,
    pub check_line: Option<CheckLine>,
}

/// A piece and its derived move state.
#[derive(Clone, Debug)]
pub struct Piece {
    pub id: PieceId,
    pub kind: PieceKind,
    pub color: Color,
    pub square: Square,
    pub state: PieceState,
    /// Destinations the piece may move to this ply.
    pub legal: Bitboard,
    /// Squares the piece threatens, friendly-occupied ones included.
    pub attacking: Bitboard,
    pub pinned: bool,
    /// The piece attacks the enemy king.
    pub checking: bool,
    /// King only.
    pub in_check: bool,
    /// King only.
    pub checkmated: bool,
    /// King and rook only; once false, never true again.
    pub castle_eligible: bool,
    /// Pawn only; gates the double advance.
    pub first_move: bool,
    /// Populated for bishops, rooks and queens.
    pub sight: Option<SightLines>,
}

impl Piece {
    fn new(id: PieceId, kind: PieceKind, color: Color, square: Square) -> Self {
        Piece {
            id,
            kind,
            color,
            square,
            state: PieceState::Active,
            legal: Bitboard::EMPTY,
            attacking: Bitboard::EMPTY,
            pinned: false,
            checking: false,
            in_check: false,
            checkmated: false,
            castle_eligible: false,
            first_move: false,
            sight: None,
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == PieceState::Active
    }

    /// Check-blocking squares: the check line's squares when the check is direct.
    pub fn check_blocking(&self) -> Bitboard {
        self.sight
            .as_ref()
            .and_then(|s| s.check_line.as_ref())
            .filter(|line| line.direct)
            .map(CheckLine::blocking)
            .unwrap_or_default()
    }

    /// Reset everything recomputed each ply.
    pub(crate) fn clear_derived(&mut self) {
        self.legal = Bitboard::EMPTY;
        self.attacking = Bitboard::EMPTY;
        self.pinned = false;
        self.checking = false;
        self.in_check = false;
        self.checkmated = false;
        self.sight = None;
    }
}

// ---------------------------------------------------------------------------
// Moves
// ---------------------------------------------------------------------------

/// What a move removes from the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capture {
    Piece(PieceId),
    /// Capture of a marker, which removes its linked pawn.
    EnPassant { marker: Square, pawn: PieceId },
}

/// The rook half of a castle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CastleRookMove {
    pub rook: PieceId,
    pub from: Square,
    pub to: Square,
}

/// A move resolved against a live position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Move {
    pub piece: PieceId,
    pub from: Square,
    pub to: Square,
    pub capture: Option<Capture>,
    pub promotion: Option<PieceKind>,
    pub castle: Option<CastleRookMove>,
    pub double_push: bool,
}

impl Move {
    /// Coordinate notation, e.g. `e2e4` or `e7e8q`.
    pub fn to_coordinate(&self) -> String {
        let mut s = format!("{}{}", self.from, self.to);
        if let Some(kind) = self.promotion {
            s.push(kind.letter());
        }
        s
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_coordinate())
    }
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A complete chess position.
///
/// The grid is indexed `board[file][rank]`, both 0-based.
#[derive(Clone, Debug)]
pub struct Position {
    board: [[Cell; 8]; 8],
    pieces: Vec<Piece>,
    active: [Vec<PieceId>; 2],
    kings: [Option<PieceId>; 2],
    captured: Vec<PieceId>,

    /// Whose turn it is.
    pub side_to_move: Color,

    /// Plies since the last pawn move or capture.
    pub halfmove_clock: u16,

    /// Full-move number (starts at 1, incremented after Black moves).
    pub fullmove_number: u16,
}

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

impl Position {
    /// Create an empty board with no pieces.
    pub fn empty() -> Self {
        Position {
            board: [[Cell::Empty; 8]; 8],
            pieces: Vec::with_capacity(32),
            active: [Vec::with_capacity(16), Vec::with_capacity(16)],
            kings: [None, None],
            captured: Vec::new(),
            side_to_move: Color::White,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    /// Standard starting position, analysed and ready to play.
    pub fn starting() -> Self {
        Self::from_fen(STARTING_FEN).expect("starting FEN is always valid")
    }

    // -----------------------------------------------------------------------
    // Piece creation
    // -----------------------------------------------------------------------

    /// Create a new active piece on an empty square.
    pub fn spawn(&mut self, kind: PieceKind, color: Color, sq: Square) -> PieceId {
        debug_assert!(
            self.occupant(sq).is_none(),
            "spawn onto occupied square {sq}"
        );
        let id = self.pieces.len();
        self.pieces.push(Piece::new(id, kind, color, sq));
        self.active[color.index()].push(id);
        self.set_cell(sq, Cell::Occupied(id));
        if kind == PieceKind::King {
            self.kings[color.index()] = Some(id);
        }
        id
    }

    /// Place an en passant marker.
    pub fn place_marker(&mut self, sq: Square, marker: EnPassantMarker) {
        self.set_cell(sq, Cell::Marker(marker));
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    #[inline]
    pub fn cell(&self, sq: Square) -> Cell {
        self.board[sq.file() as usize][sq.rank() as usize]
    }

    #[inline]
    fn set_cell(&mut self, sq: Square, cell: Cell) {
        self.board[sq.file() as usize][sq.rank() as usize] = cell;
    }

    /// The piece standing on `sq`. Markers count as empty.
    #[inline]
    pub fn occupant(&self, sq: Square) -> Option<PieceId> {
        match self.cell(sq) {
            Cell::Occupied(id) => Some(id),
            _ => None,
        }
    }

    /// Like `occupant`, but returns the piece itself.
    pub fn piece_at(&self, sq: Square) -> Option<&Piece> {
        self.occupant(sq).map(|id| &self.pieces[id])
    }

    /// The en passant marker on `sq`, if any.
    pub fn marker(&self, sq: Square) -> Option<EnPassantMarker> {
        match self.cell(sq) {
            Cell::Marker(m) => Some(m),
            _ => None,
        }
    }

    /// All markers currently on the board.
    pub fn markers(&self) -> Vec<(Square, EnPassantMarker)> {
        let mut found = Vec::new();
        for (file, column) in self.board.iter().enumerate() {
            for (rank, cell) in column.iter().enumerate() {
                if let Cell::Marker(m) = cell {
                    found.push((Square::from_file_rank(file as u8, rank as u8), *m));
                }
            }
        }
        found
    }

    #[inline]
    pub fn piece(&self, id: PieceId) -> &Piece {
        &self.pieces[id]
    }

    #[inline]
    pub(crate) fn piece_mut(&mut self, id: PieceId) -> &mut Piece {
        &mut self.pieces[id]
    }

    /// Ids of the active pieces of one colour.
    #[inline]
    pub fn active(&self, color: Color) -> &[PieceId] {
        &self.active[color.index()]
    }

    /// Active pieces of one colour.
    pub fn active_pieces(&self, color: Color) -> impl Iterator<Item = &Piece> + '_ {
        self.active[color.index()].iter().map(|&id| &self.pieces[id])
    }

    /// Ids of both colours' active pieces, white first.
    pub fn all_active(&self) -> Vec<PieceId> {
        self.active[0]
            .iter()
            .chain(self.active[1].iter())
            .copied()
            .collect()
    }

    /// Pieces removed by capture, in capture order.
    pub fn captured(&self) -> impl Iterator<Item = &Piece> + '_ {
        self.captured.iter().map(|&id| &self.pieces[id])
    }

    /// Find the king id for the given colour.
    #[inline]
    pub fn king_id(&self, color: Color) -> PieceId {
        self.kings[color.index()].expect("king must exist")
    }

    #[inline]
    pub fn king(&self, color: Color) -> &Piece {
        &self.pieces[self.king_id(color)]
    }

    /// Union of the attacking sets of one colour's active pieces.
    pub fn attacks_of(&self, color: Color) -> Bitboard {
        self.active_pieces(color)
            .fold(Bitboard::EMPTY, |acc, p| acc | p.attacking)
    }

    // -----------------------------------------------------------------------
    // Move resolution
    // -----------------------------------------------------------------------

    /// Build a `Move` from two squares, inferring capture, en passant, castle
    /// and double advance from what stands on the board. Does not check
    /// legality.
    pub fn resolve_move(
        &self,
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
    ) -> Result<Move, ChessError> {
        let illegal = |reason: &str| ChessError::IllegalMove {
            from: from.to_algebraic(),
            to: to.to_algebraic(),
            reason: reason.to_string(),
        };

        let id = self
            .occupant(from)
            .ok_or_else(|| illegal("no piece on origin square"))?;
        let mover = &self.pieces[id];

        let capture = match self.cell(to) {
            Cell::Occupied(target) if self.pieces[target].color == mover.color => {
                return Err(illegal("destination holds a friendly piece"));
            }
            Cell::Occupied(target) => Some(Capture::Piece(target)),
            Cell::Marker(m)
                if mover.kind == PieceKind::Pawn
                    && m.color != mover.color
                    && from.file() != to.file() =>
            {
                Some(Capture::EnPassant {
                    marker: to,
                    pawn: m.pawn,
                })
            }
            _ => None,
        };

        let file_delta = to.file() as i8 - from.file() as i8;
        let castle = if mover.kind == PieceKind::King
            && from.rank() == to.rank()
            && file_delta.abs() == 2
        {
            let kingside = file_delta > 0;
            let corner = Square::from_file_rank(if kingside { 7 } else { 0 }, from.rank());
            let rook = self
                .occupant(corner)
                .filter(|&r| {
                    let p = &self.pieces[r];
                    p.kind == PieceKind::Rook && p.color == mover.color
                })
                .ok_or_else(|| illegal("no rook to castle with"))?;
            let rook_to = Square::from_file_rank(if kingside { 5 } else { 3 }, from.rank());
            Some(CastleRookMove {
                rook,
                from: corner,
                to: rook_to,
            })
        } else {
            None
        };

        let double_push = mover.kind == PieceKind::Pawn
            && from.file() == to.file()
            && (to.rank() as i8 - from.rank() as i8).abs() == 2;

        Ok(Move {
            piece: id,
            from,
            to,
            capture,
            promotion,
            castle,
            double_push,
        })
    }

    // -----------------------------------------------------------------------
    // Move application
    // -----------------------------------------------------------------------

    /// Apply a resolved move. Legality is the caller's concern; derived
    /// state is stale afterwards until re-analysed.
    ///
    /// Returns the id of the piece that now stands on the destination square
    /// (the promoted replacement if the move promoted).
    pub fn apply_move(&mut self, mv: &Move) -> PieceId {
        self.clear_markers();

        match mv.capture {
            Some(Capture::Piece(id)) => self.retire(id, PieceState::Captured),
            Some(Capture::EnPassant { pawn, .. }) => self.retire(pawn, PieceState::Captured),
            None => {}
        }

        self.relocate(mv.piece, mv.from, mv.to);

        if let Some(castle) = mv.castle {
            self.relocate(castle.rook, castle.from, castle.to);
            self.pieces[castle.rook].castle_eligible = false;
        }

        let mover = &mut self.pieces[mv.piece];
        mover.castle_eligible = false;
        mover.first_move = false;
        let color = mover.color;

        if mv.double_push {
            let skipped = Square::from_file_rank(mv.from.file(), (mv.from.rank() + mv.to.rank()) / 2);
            self.place_marker(
                skipped,
                EnPassantMarker {
                    color,
                    pawn: mv.piece,
                },
            );
        }

        match mv.promotion {
            Some(kind) => {
                self.retire(mv.piece, PieceState::Promoted);
                self.spawn(kind, color, mv.to)
            }
            None => mv.piece,
        }
    }

    fn relocate(&mut self, id: PieceId, from: Square, to: Square) {
        self.set_cell(from, Cell::Empty);
        self.set_cell(to, Cell::Occupied(id));
        self.pieces[id].square = to;
    }

    /// Remove a piece from the board and the active set.
    fn retire(&mut self, id: PieceId, state: PieceState) {
        let sq = self.pieces[id].square;
        if self.cell(sq) == Cell::Occupied(id) {
            self.set_cell(sq, Cell::Empty);
        }
        let piece = &mut self.pieces[id];
        piece.state = state;
        piece.castle_eligible = false;
        piece.clear_derived();
        let color = piece.color;
        self.active[color.index()].retain(|&a| a != id);
        if state == PieceState::Captured {
            self.captured.push(id);
        }
    }

    fn clear_markers(&mut self) {
        for column in self.board.iter_mut() {
            for cell in column.iter_mut() {
                if matches!(cell, Cell::Marker(_)) {
                    *cell = Cell::Empty;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Consistency check
    // -----------------------------------------------------------------------

    /// Panic if the board, the active sets and the pieces disagree.
    pub fn assert_consistent(&self) {
        for color in Color::BOTH {
            let king = self.kings[color.index()].expect("king must exist");
            assert!(self.pieces[king].is_active(), "{color} king is not active");
            for &id in self.active(color) {
                let p = &self.pieces[id];
                assert!(p.is_active(), "inactive piece {id} in active set");
                assert_eq!(p.color, color, "piece {id} in wrong active set");
                assert_eq!(
                    self.cell(p.square),
                    Cell::Occupied(id),
                    "board and piece {id} disagree on {}",
                    p.square
                );
            }
        }
        for &id in &self.captured {
            assert_eq!(self.pieces[id].state, PieceState::Captured);
        }
        let mut occupied = 0;
        for (file, column) in self.board.iter().enumerate() {
            for (rank, cell) in column.iter().enumerate() {
                match *cell {
                    Cell::Occupied(id) => {
                        occupied += 1;
                        let sq = Square::from_file_rank(file as u8, rank as u8);
                        assert_eq!(self.pieces[id].square, sq, "piece {id} misplaced");
                        assert!(self.pieces[id].is_active(), "retired piece {id} on board");
                    }
                    Cell::Marker(_) => {
                        assert!(rank == 2 || rank == 5, "marker off rank 3/6");
                    }
                    Cell::Empty => {}
                }
            }
        }
        assert_eq!(
            occupied,
            self.active[0].len() + self.active[1].len(),
            "occupied cells and active sets differ"
        );
    }

    // -----------------------------------------------------------------------
    // Board display (8×8 text grid)
    // -----------------------------------------------------------------------

    /// Render the board as an 8-line string (rank 8 at top), useful for debugging.
    pub fn board_string(&self) -> String {
        let mut s = String::with_capacity(200);
        for rank in (0..8).rev() {
            s.push((b'1' + rank) as char);
            s.push(' ');
            for file in 0..8 {
                let sq = Square::from_file_rank(file, rank);
                let ch = match self.piece_at(sq) {
                    Some(p) => p.kind.to_char(p.color),
                    None => '.',
                };
                s.push(ch);
                if file < 7 {
                    s.push(' ');
                }
            }
            s.push('\n');
        }
        s.push_str("  a b c d e f g h");
        s
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.board_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(name: &str) -> Square {
        Square::from_algebraic(name).unwrap()
    }

    fn kinds_on(pos: &Position, name: &str) -> Option<(Color, PieceKind)> {
        pos.piece_at(sq(name)).map(|p| (p.color, p.kind))
    }

    // ===================================================================
    // Starting position
    // ===================================================================

    #[test]
    fn starting_position_piece_count() {
        let pos = Position::starting();
        assert_eq!(pos.active(Color::White).len(), 16);
        assert_eq!(pos.active(Color::Black).len(), 16);
        assert_eq!(pos.captured().count(), 0);
    }

    #[test]
    fn starting_back_ranks() {
        let pos = Position::starting();
        let order = [
            PieceKind::Rook,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Queen,
            PieceKind::King,
            PieceKind::Bishop,
            PieceKind::Knight,
            PieceKind::Rook,
        ];
        for (file, kind) in order.iter().enumerate() {
            let white = Square::from_file_rank(file as u8, 0);
            let black = Square::from_file_rank(file as u8, 7);
            assert_eq!(pos.piece_at(white).map(|p| p.kind), Some(*kind));
            assert_eq!(pos.piece_at(black).map(|p| p.kind), Some(*kind));
        }
    }

    #[test]
    fn starting_flags() {
        let pos = Position::starting();
        assert!(pos.king(Color::White).castle_eligible);
        assert!(pos.piece_at(sq("h8")).unwrap().castle_eligible);
        assert!(!pos.piece_at(sq("b1")).unwrap().castle_eligible);
        assert!(pos.piece_at(sq("e2")).unwrap().first_move);
        assert_eq!(pos.king(Color::Black).square, sq("e8"));
    }

    #[test]
    fn empty_position() {
        let pos = Position::empty();
        assert!(pos.all_active().is_empty());
        assert_eq!(pos.side_to_move, Color::White);
        assert_eq!(pos.fullmove_number, 1);
        assert!(pos.markers().is_empty());
    }

    // ===================================================================
    // Move resolution
    // ===================================================================

    #[test]
    fn resolve_quiet_and_double_push() {
        let pos = Position::starting();
        let mv = pos.resolve_move(sq("e2"), sq("e4"), None).unwrap();
        assert!(mv.double_push);
        assert_eq!(mv.capture, None);
        assert_eq!(mv.to_coordinate(), "e2e4");

        let mv = pos.resolve_move(sq("g1"), sq("f3"), None).unwrap();
        assert!(!mv.double_push);
    }

    #[test]
    fn resolve_rejects_empty_origin_and_friendly_target() {
        let pos = Position::starting();
        assert!(matches!(
            pos.resolve_move(sq("e4"), sq("e5"), None),
            Err(ChessError::IllegalMove { .. })
        ));
        assert!(matches!(
            pos.resolve_move(sq("d1"), sq("d2"), None),
            Err(ChessError::IllegalMove { .. })
        ));
    }

    #[test]
    fn resolve_castle() {
        let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let mv = pos.resolve_move(sq("e1"), sq("g1"), None).unwrap();
        let castle = mv.castle.unwrap();
        assert_eq!(castle.from, sq("h1"));
        assert_eq!(castle.to, sq("f1"));

        let mv = pos.resolve_move(sq("e8"), sq("c8"), None).unwrap();
        let castle = mv.castle.unwrap();
        assert_eq!(castle.from, sq("a8"));
        assert_eq!(castle.to, sq("d8"));
    }

    #[test]
    fn resolve_en_passant() {
        let pos =
            Position::from_fen("rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3")
                .unwrap();
        let mv = pos.resolve_move(sq("e5"), sq("f6"), None).unwrap();
        let pawn = pos.occupant(sq("f5")).unwrap();
        assert_eq!(
            mv.capture,
            Some(Capture::EnPassant {
                marker: sq("f6"),
                pawn
            })
        );
        // A straight push onto a marker is not a capture.
        let mv = pos.resolve_move(sq("f2"), sq("f3"), None).unwrap();
        assert_eq!(mv.capture, None);
    }

    // ===================================================================
    // Move application
    // ===================================================================

    #[test]
    fn apply_double_push_places_marker() {
        let mut pos = Position::starting();
        let mv = pos.resolve_move(sq("e2"), sq("e4"), None).unwrap();
        pos.apply_move(&mv);
        let marker = pos.marker(sq("e3")).unwrap();
        assert_eq!(marker.color, Color::White);
        assert_eq!(marker.pawn, mv.piece);
        assert!(!pos.piece(mv.piece).first_move);
        assert_eq!(pos.occupant(sq("e3")), None);
        pos.assert_consistent();

        let mv = pos.resolve_move(sq("g8"), sq("f6"), None).unwrap();
        pos.apply_move(&mv);
        assert!(pos.markers().is_empty(), "markers live one ply");
    }

    #[test]
    fn apply_capture_records_piece() {
        let mut pos = Position::from_fen("4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1").unwrap();
        let victim = pos.occupant(sq("d5")).unwrap();
        let mv = pos.resolve_move(sq("e4"), sq("d5"), None).unwrap();
        pos.apply_move(&mv);
        assert_eq!(pos.active(Color::Black).len(), 1);
        assert_eq!(pos.piece(victim).state, PieceState::Captured);
        assert_eq!(pos.captured().map(|p| p.id).collect::<Vec<_>>(), vec![victim]);
        assert_eq!(kinds_on(&pos, "d5"), Some((Color::White, PieceKind::Pawn)));
        pos.assert_consistent();
    }

    #[test]
    fn apply_en_passant_removes_linked_pawn() {
        let mut pos =
            Position::from_fen("rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3")
                .unwrap();
        let mv = pos.resolve_move(sq("e5"), sq("f6"), None).unwrap();
        pos.apply_move(&mv);
        assert_eq!(pos.occupant(sq("f5")), None);
        assert_eq!(kinds_on(&pos, "f6"), Some((Color::White, PieceKind::Pawn)));
        assert_eq!(pos.active(Color::Black).len(), 15);
        assert_eq!(pos.captured().count(), 1);
        assert!(pos.markers().is_empty());
        pos.assert_consistent();
    }

    #[test]
    fn apply_castle_moves_rook_and_clears_flags() {
        let mut pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let mv = pos.resolve_move(sq("e1"), sq("c1"), None).unwrap();
        pos.apply_move(&mv);
        assert_eq!(kinds_on(&pos, "c1"), Some((Color::White, PieceKind::King)));
        assert_eq!(kinds_on(&pos, "d1"), Some((Color::White, PieceKind::Rook)));
        assert_eq!(pos.occupant(sq("a1")), None);
        assert!(!pos.king(Color::White).castle_eligible);
        assert!(!pos.piece_at(sq("d1")).unwrap().castle_eligible);
        assert!(pos.piece_at(sq("h1")).unwrap().castle_eligible);
        pos.assert_consistent();
    }

    #[test]
    fn apply_promotion_swaps_piece() {
        let mut pos = Position::from_fen("1r2k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let pawn = pos.occupant(sq("a7")).unwrap();
        let rook = pos.occupant(sq("b8")).unwrap();
        let mv = pos
            .resolve_move(sq("a7"), sq("b8"), Some(PieceKind::Knight))
            .unwrap();
        let new_id = pos.apply_move(&mv);
        assert_ne!(new_id, pawn);
        assert_eq!(pos.piece(pawn).state, PieceState::Promoted);
        assert_eq!(pos.piece(rook).state, PieceState::Captured);
        assert_eq!(kinds_on(&pos, "b8"), Some((Color::White, PieceKind::Knight)));
        assert!(!pos.active(Color::White).contains(&pawn));
        // Promotion retires the pawn without recording it as captured.
        assert_eq!(pos.captured().count(), 1);
        pos.assert_consistent();
    }

    #[test]
    fn capturing_a_rook_clears_its_castle_flag() {
        let mut pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K1NR b KQkq - 0 1").unwrap();
        let h1 = pos.occupant(sq("h1")).unwrap();
        let mv = pos.resolve_move(sq("h8"), sq("h1"), None).unwrap();
        pos.apply_move(&mv);
        assert!(!pos.piece(h1).castle_eligible);
        assert!(!pos.piece_at(sq("h1")).unwrap().castle_eligible);
    }

    #[test]
    fn board_string_starting() {
        let s = Position::starting().board_string();
        assert!(s.starts_with("8 r n b q k b n r"));
        assert!(s.ends_with("a b c d e f g h"));
    }
}
