#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Token did not decode to exactly 16 bytes, or wasn't known to any
    /// table it was looked up in.
    UnknownToken,
    /// A board lookup by id found nothing.
    UnknownBoard,
    /// The caller does not hold the reservation on this board/side.
    NotReserved,
    /// No side-to-move slot could be matched for this player right now.
    PoolExhausted,
    /// `max_players` has been reached.
    PlayerCapacityReached,
    /// Spectator admission was refused.
    Visibility,
    Full,
    FocusDisabled,
    NotAvailable,
}

impl std::error::Error for RegistryError {}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownToken => write!(f, "unknown session token"),
            Self::UnknownBoard => write!(f, "unknown board id"),
            Self::NotReserved => write!(f, "caller does not hold this reservation"),
            Self::PoolExhausted => write!(f, "board pool exhausted"),
            Self::PlayerCapacityReached => write!(f, "player capacity reached"),
            Self::Visibility => write!(f, "trust tier below required visibility"),
            Self::Full => write!(f, "spectator capacity reached"),
            Self::FocusDisabled => write!(f, "focus spectating disabled"),
            Self::NotAvailable => write!(f, "board is not eligible for spectating"),
        }
    }
}
