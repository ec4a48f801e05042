use crate::board::{PieceKind, Square, SquareExt};
use crate::moves::Move;

/// Parses `<from><to>[promo]`, e.g. `e2e4` or `e7e8q`. Rejects any other
/// shape; does not check legality against a position.
pub fn parse_uci(s: &str) -> Option<Move> {
    let bytes = s.as_bytes();
    if bytes.len() != 4 && bytes.len() != 5 {
        return None;
    }
    let from = parse_square(&bytes[0..2])?;
    let to = parse_square(&bytes[2..4])?;
    let promotion = if bytes.len() == 5 {
        Some(match bytes[4] {
            b'q' => PieceKind::Queen,
            b'r' => PieceKind::Rook,
            b'b' => PieceKind::Bishop,
            b'n' => PieceKind::Knight,
            _ => return None,
        })
    } else {
        None
    };
    Some(Move {
        from,
        to,
        promotion,
    })
}

fn parse_square(bytes: &[u8]) -> Option<Square> {
    let file = bytes[0];
    let rank = bytes[1];
    if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
        return None;
    }
    Some(Square::from_file_rank(file - b'a', rank - b'1'))
}

pub fn move_to_uci(m: &Move) -> String {
    let (ff, fr) = Square::file_rank(m.from);
    let (tf, tr) = Square::file_rank(m.to);
    let mut s = format!(
        "{}{}{}{}",
        (b'a' + ff) as char,
        fr + 1,
        (b'a' + tf) as char,
        tr + 1
    );
    if let Some(promo) = m.promotion {
        s.push(promo.to_fen_char(crate::board::Color::Black));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_move() {
        let m = parse_uci("e2e4").unwrap();
        assert_eq!(move_to_uci(&m), "e2e4");
    }

    #[test]
    fn parses_promotion() {
        let m = parse_uci("e7e8q").unwrap();
        assert_eq!(m.promotion, Some(PieceKind::Queen));
    }

    #[test]
    fn rejects_bad_shape() {
        assert!(parse_uci("e2e4qq").is_none());
        assert!(parse_uci("e2").is_none());
        assert!(parse_uci("i2e4").is_none());
    }
}
