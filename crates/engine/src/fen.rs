use crate::board::{Board, CastlingRights, Color, GameResult, PieceKind, Square, SquareExt};

pub fn parse_fen(fen: &str) -> Option<Board> {
    let mut fields = fen.split_whitespace();
    let placement = fields.next()?;
    let active = fields.next()?;
    let castling = fields.next()?;
    let ep = fields.next()?;
    let halfmove = fields.next().unwrap_or("0");
    let fullmove = fields.next().unwrap_or("1");

    let mut pieces = [[0u64; 6]; 2];
    let ranks: Vec<&str> = placement.split('/').collect();
    if ranks.len() != 8 {
        return None;
    }
    for (rank_from_top, rank_str) in ranks.iter().enumerate() {
        let rank = 7 - rank_from_top as u8;
        let mut file = 0u8;
        for c in rank_str.chars() {
            if let Some(skip) = c.to_digit(10) {
                file += skip as u8;
            } else {
                let (kind, color) = PieceKind::from_fen_char(c)?;
                let sq = Square::from_file_rank(file, rank);
                pieces[color.index()][kind.index()] |= 1u64 << sq;
                file += 1;
            }
        }
        if file != 8 {
            return None;
        }
    }

    let turn = match active {
        "w" => Color::White,
        "b" => Color::Black,
        _ => return None,
    };

    let castling = CastlingRights::from_fen(castling);

    let en_passant = if ep == "-" {
        None
    } else {
        let bytes = ep.as_bytes();
        if bytes.len() != 2 {
            return None;
        }
        let file = bytes[0].checked_sub(b'a')?;
        let rank = bytes[1].checked_sub(b'1')?;
        if file > 7 || rank > 7 {
            return None;
        }
        Some(Square::from_file_rank(file, rank))
    };

    let halfmove_clock = halfmove.parse().ok()?;
    let fullmove_number = fullmove.parse().ok()?;

    let mut board = Board {
        pieces,
        turn,
        castling,
        en_passant,
        halfmove_clock,
        fullmove_number,
        result: GameResult::InProgress,
        fen_cache: String::new(),
    };
    board.fen_cache = to_fen(&board);
    Some(board)
}

pub fn to_fen(board: &Board) -> String {
    let mut placement = String::new();
    for rank_from_top in 0..8u8 {
        let rank = 7 - rank_from_top;
        let mut empty_run = 0u8;
        for file in 0..8u8 {
            let sq = Square::from_file_rank(file, rank);
            match board.piece_at(sq) {
                Some((kind, color)) => {
                    if empty_run > 0 {
                        placement.push_str(&empty_run.to_string());
                        empty_run = 0;
                    }
                    placement.push(kind.to_fen_char(color));
                }
                None => empty_run += 1,
            }
        }
        if empty_run > 0 {
            placement.push_str(&empty_run.to_string());
        }
        if rank_from_top != 7 {
            placement.push('/');
        }
    }

    let active = if board.turn == Color::White { "w" } else { "b" };
    let castling = board.castling.to_fen();
    let ep = match board.en_passant {
        Some(sq) => {
            let (file, rank) = Square::file_rank(sq);
            format!("{}{}", (b'a' + file) as char, rank + 1)
        }
        None => "-".to_string(),
    };

    format!(
        "{placement} {active} {castling} {ep} {} {}",
        board.halfmove_clock, board.fullmove_number
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_position_round_trips() {
        let board = parse_fen(Board::STARTING_FEN).unwrap();
        assert_eq!(to_fen(&board), Board::STARTING_FEN);
    }

    #[test]
    fn rejects_malformed_placement() {
        assert!(parse_fen("not-a-fen w - - 0 1").is_none());
    }
}
