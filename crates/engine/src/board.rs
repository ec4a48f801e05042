/// A board square, 0=a1 .. 63=h8, little-endian rank-file mapping.
pub type Square = u8;

pub trait SquareExt {
    fn file_rank(sq: Square) -> (u8, u8);
    fn from_file_rank(file: u8, rank: u8) -> Square;
}

impl SquareExt for Square {
    fn file_rank(sq: Square) -> (u8, u8) {
        (sq % 8, sq / 8)
    }

    fn from_file_rank(file: u8, rank: u8) -> Square {
        rank * 8 + file
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opposite(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::White => 0,
            Self::Black => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    pub const ALL: [PieceKind; 6] = [
        Self::Pawn,
        Self::Knight,
        Self::Bishop,
        Self::Rook,
        Self::Queen,
        Self::King,
    ];

    pub fn index(self) -> usize {
        match self {
            Self::Pawn => 0,
            Self::Knight => 1,
            Self::Bishop => 2,
            Self::Rook => 3,
            Self::Queen => 4,
            Self::King => 5,
        }
    }

    pub fn to_fen_char(self, color: Color) -> char {
        let c = match self {
            Self::Pawn => 'p',
            Self::Knight => 'n',
            Self::Bishop => 'b',
            Self::Rook => 'r',
            Self::Queen => 'q',
            Self::King => 'k',
        };
        if color == Color::White {
            c.to_ascii_uppercase()
        } else {
            c
        }
    }

    pub fn from_fen_char(c: char) -> Option<(PieceKind, Color)> {
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        let kind = match c.to_ascii_lowercase() {
            'p' => Self::Pawn,
            'n' => Self::Knight,
            'b' => Self::Bishop,
            'r' => Self::Rook,
            'q' => Self::Queen,
            'k' => Self::King,
            _ => return None,
        };
        Some((kind, color))
    }
}

/// A 4-bit mask replacing the source's string-based castling rights, per the
/// redesign: `KQkq` becomes four named bits rather than a string edited in
/// place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CastlingRights(u8);

impl CastlingRights {
    pub const WHITE_KINGSIDE: u8 = 0b0001;
    pub const WHITE_QUEENSIDE: u8 = 0b0010;
    pub const BLACK_KINGSIDE: u8 = 0b0100;
    pub const BLACK_QUEENSIDE: u8 = 0b1000;
    pub const ALL: u8 = 0b1111;

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn has(self, right: u8) -> bool {
        self.0 & right != 0
    }

    pub fn remove(&mut self, right: u8) {
        self.0 &= !right;
    }

    pub fn to_fen(self) -> String {
        if self.0 == 0 {
            return "-".to_string();
        }
        let mut s = String::with_capacity(4);
        if self.has(Self::WHITE_KINGSIDE) {
            s.push('K');
        }
        if self.has(Self::WHITE_QUEENSIDE) {
            s.push('Q');
        }
        if self.has(Self::BLACK_KINGSIDE) {
            s.push('k');
        }
        if self.has(Self::BLACK_QUEENSIDE) {
            s.push('q');
        }
        s
    }

    pub fn from_fen(field: &str) -> Self {
        let mut bits = 0u8;
        if field == "-" {
            return Self(0);
        }
        for c in field.chars() {
            bits |= match c {
                'K' => Self::WHITE_KINGSIDE,
                'Q' => Self::WHITE_QUEENSIDE,
                'k' => Self::BLACK_KINGSIDE,
                'q' => Self::BLACK_QUEENSIDE,
                _ => 0,
            };
        }
        Self(bits)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    InProgress,
    WhiteWins,
    BlackWins,
    Draw,
}

/// Full chess position: 12 piece bitboards (6 kinds × 2 colors), side to
/// move, castling rights, en-passant target, and the two FIDE counters. The
/// textual FEN is cached alongside rather than recomputed on every read.
#[derive(Debug, Clone)]
pub struct Board {
    /// `pieces[color.index()][kind.index()]`.
    pub pieces: [[u64; 6]; 2],
    pub turn: Color,
    pub castling: CastlingRights,
    pub en_passant: Option<Square>,
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
    pub result: GameResult,
    pub fen_cache: String,
}

impl Board {
    pub const STARTING_FEN: &'static str =
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    pub fn starting_position() -> Self {
        crate::fen::parse_fen(Self::STARTING_FEN).expect("starting FEN is well-formed")
    }

    pub fn occupancy(&self, color: Color) -> u64 {
        self.pieces[color.index()].iter().fold(0, |acc, bb| acc | bb)
    }

    pub fn combined_occupancy(&self) -> u64 {
        self.occupancy(Color::White) | self.occupancy(Color::Black)
    }

    pub fn piece_at(&self, sq: Square) -> Option<(PieceKind, Color)> {
        let mask = 1u64 << sq;
        for color in [Color::White, Color::Black] {
            for kind in PieceKind::ALL {
                if self.pieces[color.index()][kind.index()] & mask != 0 {
                    return Some((kind, color));
                }
            }
        }
        None
    }

    pub fn king_square(&self, color: Color) -> Square {
        self.pieces[color.index()][PieceKind::King.index()].trailing_zeros() as Square
    }
}
