//! ## Move engine
//!
//! Full chess rules over a bitboard representation: move generation,
//! legality (check, pin, castling, en-passant, promotion), and
//! game-termination detection. This crate has no knowledge of the network
//! protocol or board lifecycle state machine above it; its only inputs are a
//! [`Board`] and a UCI string.

pub mod attacks;
pub mod board;
pub mod error;
pub mod fen;
pub mod moves;
pub mod uci;

pub use board::{Board, CastlingRights, Color, GameResult, PieceKind, Square, SquareExt};
pub use error::MoveError;
pub use moves::Move;

/// Validates and applies a single UCI move submitted by a player who holds
/// the reservation on `reserved_color`.
///
/// Mirrors the `validate_and_apply` contract: parse failures are
/// [`MoveError::BadUci`], moves outside the legal set are
/// [`MoveError::Illegal`], and a caller whose reserved side does not match
/// `board.turn` gets [`MoveError::NotTurn`]. Reservation existence itself
/// (NOT_RESERVED) is the board-lifecycle layer's concern, not this crate's;
/// callers check that before calling in.
pub fn validate_and_apply(
    board: &mut Board,
    reserved_color: Color,
    uci: &str,
) -> Result<GameResult, MoveError> {
    if board.turn != reserved_color {
        return Err(MoveError::NotTurn);
    }

    let candidate = uci::parse_uci(uci).ok_or(MoveError::BadUci)?;
    let legal = moves::generate_legal_moves(board);
    let chosen = legal
        .into_iter()
        .find(|m| m.from == candidate.from && m.to == candidate.to && m.promotion == candidate.promotion)
        .ok_or(MoveError::Illegal)?;

    moves::make_move(board, &chosen);
    board.fen_cache = fen::to_fen(board);
    board.result = moves::detect_termination(board);
    Ok(board.result)
}
