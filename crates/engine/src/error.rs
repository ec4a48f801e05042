#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
    /// The reserving player's side is not the side to move.
    NotTurn,
    /// The UCI string did not match `<from><to>[promo]`.
    BadUci,
    /// The move is syntactically well-formed but not in the legal-move set.
    Illegal,
}

impl std::error::Error for MoveError {}

impl std::fmt::Display for MoveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotTurn => write!(f, "not this side's turn"),
            Self::BadUci => write!(f, "malformed uci move"),
            Self::Illegal => write!(f, "move is not legal in this position"),
        }
    }
}
