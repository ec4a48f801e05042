use crate::attacks::{bishop_attacks, pawn_attacks, queen_attacks, rook_attacks, KING_ATTACKS, KNIGHT_ATTACKS};
use crate::board::{Board, CastlingRights, Color, GameResult, PieceKind, Square, SquareExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
}

/// Everything [`unmake_move`] needs to restore a board to its exact prior
/// state after a trial [`make_move`].
#[derive(Debug, Clone)]
pub struct MoveInfo {
    mv: Move,
    mover: PieceKind,
    mover_color: Color,
    /// Captured piece and the square it occupied — for en-passant this is
    /// not `mv.to`.
    captured: Option<(PieceKind, Square)>,
    castle_rook: Option<(Square, Square)>,
    prev_castling: CastlingRights,
    prev_en_passant: Option<Square>,
    prev_halfmove_clock: u32,
    prev_fullmove_number: u32,
}

fn own_occupancy(board: &Board, color: Color) -> u64 {
    board.occupancy(color)
}

fn is_square_attacked(board: &Board, sq: Square, by: Color) -> bool {
    let occ = board.combined_occupancy();
    let enemy = &board.pieces[by.index()];

    let pawn_from = match by {
        Color::White => pawn_attacks(sq, false),
        Color::Black => pawn_attacks(sq, true),
    };
    if pawn_from & enemy[PieceKind::Pawn.index()] != 0 {
        return true;
    }
    if KNIGHT_ATTACKS[sq as usize] & enemy[PieceKind::Knight.index()] != 0 {
        return true;
    }
    if KING_ATTACKS[sq as usize] & enemy[PieceKind::King.index()] != 0 {
        return true;
    }
    let diagonal_sliders = enemy[PieceKind::Bishop.index()] | enemy[PieceKind::Queen.index()];
    if bishop_attacks(sq, occ) & diagonal_sliders != 0 {
        return true;
    }
    let orthogonal_sliders = enemy[PieceKind::Rook.index()] | enemy[PieceKind::Queen.index()];
    if rook_attacks(sq, occ) & orthogonal_sliders != 0 {
        return true;
    }
    false
}

pub fn is_in_check(board: &Board, color: Color) -> bool {
    is_square_attacked(board, board.king_square(color), color.opposite())
}

fn pseudo_legal_moves(board: &Board, color: Color) -> Vec<Move> {
    let mut moves = Vec::new();
    let own = own_occupancy(board, color);
    let enemy = own_occupancy(board, color.opposite());
    let occ = own | enemy;

    for kind in PieceKind::ALL {
        let mut bb = board.pieces[color.index()][kind.index()];
        while bb != 0 {
            let from = bb.trailing_zeros() as Square;
            bb &= bb - 1;
            match kind {
                PieceKind::Pawn => push_pawn_moves(board, color, from, &mut moves),
                PieceKind::Knight => push_targets(from, KNIGHT_ATTACKS[from as usize] & !own, &mut moves),
                PieceKind::King => push_targets(from, KING_ATTACKS[from as usize] & !own, &mut moves),
                PieceKind::Bishop => push_targets(from, bishop_attacks(from, occ) & !own, &mut moves),
                PieceKind::Rook => push_targets(from, rook_attacks(from, occ) & !own, &mut moves),
                PieceKind::Queen => push_targets(from, queen_attacks(from, occ) & !own, &mut moves),
            }
        }
    }

    push_castling_moves(board, color, occ, &mut moves);
    moves
}

fn push_targets(from: Square, targets: u64, out: &mut Vec<Move>) {
    let mut bb = targets;
    while bb != 0 {
        let to = bb.trailing_zeros() as Square;
        bb &= bb - 1;
        out.push(Move {
            from,
            to,
            promotion: None,
        });
    }
}

const PROMOTION_KINDS: [PieceKind; 4] = [
    PieceKind::Queen,
    PieceKind::Rook,
    PieceKind::Bishop,
    PieceKind::Knight,
];

fn push_pawn_moves(board: &Board, color: Color, from: Square, out: &mut Vec<Move>) {
    let occ = board.combined_occupancy();
    let enemy = own_occupancy(board, color.opposite());
    let (file, rank) = Square::file_rank(from);
    let (dir, start_rank, promo_rank): (i8, u8, u8) = match color {
        Color::White => (1, 1, 7),
        Color::Black => (-1, 6, 0),
    };

    let mut emit = |to: Square, out: &mut Vec<Move>| {
        let (_, to_rank) = Square::file_rank(to);
        if to_rank == promo_rank {
            for kind in PROMOTION_KINDS {
                out.push(Move {
                    from,
                    to,
                    promotion: Some(kind),
                });
            }
        } else {
            out.push(Move {
                from,
                to,
                promotion: None,
            });
        }
    };

    let single_rank = rank as i8 + dir;
    if (0..8).contains(&single_rank) {
        let single = Square::from_file_rank(file, single_rank as u8);
        if occ & (1u64 << single) == 0 {
            emit(single, out);
            let double_rank = rank as i8 + 2 * dir;
            if rank == start_rank && (0..8).contains(&double_rank) {
                let double = Square::from_file_rank(file, double_rank as u8);
                if occ & (1u64 << double) == 0 {
                    out.push(Move {
                        from,
                        to: double,
                        promotion: None,
                    });
                }
            }
        }
    }

    for df in [-1i8, 1] {
        let nf = file as i8 + df;
        if !(0..8).contains(&nf) || !(0..8).contains(&single_rank) {
            continue;
        }
        let target = Square::from_file_rank(nf as u8, single_rank as u8);
        let target_bit = 1u64 << target;
        if enemy & target_bit != 0 {
            emit(target, out);
        } else if board.en_passant == Some(target) {
            out.push(Move {
                from,
                to: target,
                promotion: None,
            });
        }
    }
}

fn push_castling_moves(board: &Board, color: Color, occ: u64, out: &mut Vec<Move>) {
    let (king_start, kingside_right, queenside_right, kingside_path, queenside_path, kingside_to, queenside_to, transit_kingside, transit_queenside) =
        match color {
            Color::White => (
                4u8,
                CastlingRights::WHITE_KINGSIDE,
                CastlingRights::WHITE_QUEENSIDE,
                [5u8, 6],
                [1u8, 2, 3],
                6u8,
                2u8,
                5u8,
                3u8,
            ),
            Color::Black => (
                60u8,
                CastlingRights::BLACK_KINGSIDE,
                CastlingRights::BLACK_QUEENSIDE,
                [61u8, 62],
                [57u8, 58, 59],
                62u8,
                58u8,
                61u8,
                59u8,
            ),
        };

    if board.king_square(color) != king_start {
        return;
    }
    let enemy = color.opposite();

    if board.castling.has(kingside_right)
        && kingside_path.iter().all(|sq| occ & (1u64 << sq) == 0)
        && !is_square_attacked(board, king_start, enemy)
        && !is_square_attacked(board, transit_kingside, enemy)
        && !is_square_attacked(board, kingside_to, enemy)
    {
        out.push(Move {
            from: king_start,
            to: kingside_to,
            promotion: None,
        });
    }

    if board.castling.has(queenside_right)
        && queenside_path.iter().all(|sq| occ & (1u64 << sq) == 0)
        && !is_square_attacked(board, king_start, enemy)
        && !is_square_attacked(board, transit_queenside, enemy)
        && !is_square_attacked(board, queenside_to, enemy)
    {
        out.push(Move {
            from: king_start,
            to: queenside_to,
            promotion: None,
        });
    }
}

/// Generates every fully legal move for the side to move: pseudo-legal moves
/// are trial-applied and rejected if they leave the mover's own king in
/// check.
pub fn generate_legal_moves(board: &Board) -> Vec<Move> {
    let color = board.turn;
    pseudo_legal_moves(board, color)
        .into_iter()
        .filter(|m| {
            let mut trial = board.clone();
            let info = make_move(&mut trial, m);
            let left_in_check = is_in_check(&trial, color);
            unmake_move(&mut trial, &info);
            !left_in_check
        })
        .collect()
}

fn home_rook_square(color: Color, kingside: bool) -> Square {
    match (color, kingside) {
        (Color::White, true) => 7,
        (Color::White, false) => 0,
        (Color::Black, true) => 63,
        (Color::Black, false) => 56,
    }
}

/// Applies `mv` to `board` in place, returning the bookkeeping
/// [`unmake_move`] needs to reverse it exactly.
pub fn make_move(board: &mut Board, mv: &Move) -> MoveInfo {
    let color = board.turn;
    let (mover, _) = board
        .piece_at(mv.from)
        .expect("make_move called with no piece on from-square");

    let prev_castling = board.castling;
    let prev_en_passant = board.en_passant;
    let prev_halfmove_clock = board.halfmove_clock;
    let prev_fullmove_number = board.fullmove_number;

    let is_en_passant_capture =
        mover == PieceKind::Pawn && Some(mv.to) == board.en_passant && board.piece_at(mv.to).is_none();
    let captured_square = if is_en_passant_capture {
        let (_, to_rank) = Square::file_rank(mv.to);
        let capture_rank = if color == Color::White {
            to_rank - 1
        } else {
            to_rank + 1
        };
        Square::from_file_rank(Square::file_rank(mv.to).0, capture_rank)
    } else {
        mv.to
    };
    let captured = board
        .piece_at(captured_square)
        .map(|(kind, _)| (kind, captured_square));

    // Remove mover from source.
    board.pieces[color.index()][mover.index()] &= !(1u64 << mv.from);

    // Remove captured piece, if any.
    if let Some((kind, sq)) = captured {
        board.pieces[color.opposite().index()][kind.index()] &= !(1u64 << sq);
    }

    // Place mover (or promoted piece) on destination.
    let placed_kind = mv.promotion.unwrap_or(mover);
    board.pieces[color.index()][placed_kind.index()] |= 1u64 << mv.to;

    // Castling rook slide.
    let is_castle = mover == PieceKind::King
        && (mv.from as i16 - mv.to as i16).abs() == 2;
    let castle_rook = if is_castle {
        let kingside = mv.to > mv.from;
        let rook_from = home_rook_square(color, kingside);
        let rook_to = if kingside { mv.to - 1 } else { mv.to + 1 };
        board.pieces[color.index()][PieceKind::Rook.index()] &= !(1u64 << rook_from);
        board.pieces[color.index()][PieceKind::Rook.index()] |= 1u64 << rook_to;
        Some((rook_from, rook_to))
    } else {
        None
    };

    // Castling rights updates: king move revokes both; rook move or capture
    // on a home square revokes that side's right.
    if mover == PieceKind::King {
        let (ks, qs) = match color {
            Color::White => (CastlingRights::WHITE_KINGSIDE, CastlingRights::WHITE_QUEENSIDE),
            Color::Black => (CastlingRights::BLACK_KINGSIDE, CastlingRights::BLACK_QUEENSIDE),
        };
        board.castling.remove(ks);
        board.castling.remove(qs);
    }
    revoke_castling_on_square(board, mv.from);
    revoke_castling_on_square(board, captured_square);

    // En-passant target: set only on a pawn double push.
    board.en_passant = if mover == PieceKind::Pawn && (mv.from as i16 - mv.to as i16).abs() == 16 {
        let (file, from_rank) = Square::file_rank(mv.from);
        let mid_rank = if color == Color::White {
            from_rank + 1
        } else {
            from_rank - 1
        };
        Some(Square::from_file_rank(file, mid_rank))
    } else {
        None
    };

    // Halfmove clock resets on pawn move or capture.
    board.halfmove_clock = if mover == PieceKind::Pawn || captured.is_some() {
        0
    } else {
        board.halfmove_clock + 1
    };

    if color == Color::Black {
        board.fullmove_number += 1;
    }

    board.turn = color.opposite();

    MoveInfo {
        mv: *mv,
        mover,
        mover_color: color,
        captured,
        castle_rook,
        prev_castling,
        prev_en_passant,
        prev_halfmove_clock,
        prev_fullmove_number,
    }
}

fn revoke_castling_on_square(board: &mut Board, sq: Square) {
    let right = match sq {
        0 => CastlingRights::WHITE_QUEENSIDE,
        7 => CastlingRights::WHITE_KINGSIDE,
        56 => CastlingRights::BLACK_QUEENSIDE,
        63 => CastlingRights::BLACK_KINGSIDE,
        _ => return,
    };
    board.castling.remove(right);
}

/// Restores `board` to its state immediately before the [`make_move`] call
/// that produced `info`.
pub fn unmake_move(board: &mut Board, info: &MoveInfo) {
    let color = info.mover_color;
    board.turn = color;

    let placed_kind = info.mv.promotion.unwrap_or(info.mover);
    board.pieces[color.index()][placed_kind.index()] &= !(1u64 << info.mv.to);
    board.pieces[color.index()][info.mover.index()] |= 1u64 << info.mv.from;

    if let Some((kind, sq)) = info.captured {
        board.pieces[color.opposite().index()][kind.index()] |= 1u64 << sq;
    }

    if let Some((rook_from, rook_to)) = info.castle_rook {
        board.pieces[color.index()][PieceKind::Rook.index()] &= !(1u64 << rook_to);
        board.pieces[color.index()][PieceKind::Rook.index()] |= 1u64 << rook_from;
    }

    board.castling = info.prev_castling;
    board.en_passant = info.prev_en_passant;
    board.halfmove_clock = info.prev_halfmove_clock;
    board.fullmove_number = info.prev_fullmove_number;
}

/// Determines the game result after a move has just been applied: checkmate
/// for the side that just moved, stalemate, fifty-move draw, or in-progress.
pub fn detect_termination(board: &Board) -> GameResult {
    let to_move = board.turn;
    if generate_legal_moves(board).is_empty() {
        return if is_in_check(board, to_move) {
            match to_move {
                Color::White => GameResult::BlackWins,
                Color::Black => GameResult::WhiteWins,
            }
        } else {
            GameResult::Draw
        };
    }
    if board.halfmove_clock >= 100 {
        return GameResult::Draw;
    }
    GameResult::InProgress
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fen::{parse_fen, to_fen};

    #[test]
    fn legal_pawn_push() {
        let mut board = Board::starting_position();
        let mv = Move {
            from: 12, // e2
            to: 28,   // e4
            promotion: None,
        };
        assert!(generate_legal_moves(&board).contains(&mv));
        make_move(&mut board, &mv);
        assert_eq!(
            to_fen(&board),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"
        );
        assert_eq!(detect_termination(&board), GameResult::InProgress);
    }

    #[test]
    fn fools_mate() {
        let mut board =
            parse_fen("rnbqkbnr/pppp1ppp/8/4p3/6P1/5P2/PPPPP2P/RNBQKBNR b KQkq - 0 1").unwrap();
        let mv = Move {
            from: 59, // d8
            to: 31,   // h4
            promotion: None,
        };
        assert!(generate_legal_moves(&board).contains(&mv));
        make_move(&mut board, &mv);
        assert_eq!(detect_termination(&board), GameResult::BlackWins);
    }

    #[test]
    fn stalemate_by_queen() {
        let mut board = parse_fen("k7/8/8/8/8/8/1Q6/K7 w - - 0 1").unwrap();
        let mv = Move {
            from: 9,  // b2
            to: 41,   // b6
            promotion: None,
        };
        make_move(&mut board, &mv);
        assert_eq!(detect_termination(&board), GameResult::Draw);
    }

    #[test]
    fn fifty_move_rule() {
        let mut board = parse_fen("k7/8/8/8/8/8/8/K7 w - - 99 50").unwrap();
        let mv = Move {
            from: 0, // a1
            to: 1,   // b1
            promotion: None,
        };
        make_move(&mut board, &mv);
        assert_eq!(detect_termination(&board), GameResult::Draw);
    }

    #[test]
    fn en_passant_capture() {
        let mut board = parse_fen(
            "rnbqkbnr/pppppppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 3",
        )
        .unwrap();
        let mv = Move {
            from: 27, // d4
            to: 20,   // e3
            promotion: None,
        };
        make_move(&mut board, &mv);
        assert_eq!(board.piece_at(20), Some((PieceKind::Pawn, Color::Black)));
        assert_eq!(board.piece_at(28), None); // white e-pawn gone
    }

    #[test]
    fn castling_right_revoked_on_rook_capture() {
        let mut board = parse_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let mv = Move {
            from: 0,  // a1
            to: 56,   // a8
            promotion: None,
        };
        make_move(&mut board, &mv);
        assert_eq!(board.castling.to_fen(), "Kk");
    }

    #[test]
    fn make_then_unmake_restores_bit_identical_state() {
        let mut board = Board::starting_position();
        let before = to_fen(&board);
        let mv = Move {
            from: 12,
            to: 28,
            promotion: None,
        };
        let info = make_move(&mut board, &mv);
        unmake_move(&mut board, &info);
        assert_eq!(to_fen(&board), before);
    }
}
