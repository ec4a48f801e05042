use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Control byte at offset 0 of every frame.
///
/// Values are stable across protocol versions: new codes are appended, never
/// renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Control {
    ClientHello = 0,
    ServerHello = 1,
    PlayerMove = 2,
    BoardUpdate = 3,
    Ack = 4,
    Error = 5,
    ListProfiles = 6,
    ProfilesList = 7,
    GetProfileInfo = 8,
    ProfileInfo = 9,
    LoginRequest = 10,
    LoginSuccess = 11,
    LoginFailed = 12,
    SpectateGame = 13,
    SpectateStop = 14,
    SpectateUpdate = 15,
    ServerNotification = 16,
    GetPlayerStats = 17,
    PlayerStatsData = 18,
    GetLeaderboard = 19,
    LeaderboardData = 20,
    GetLegalMoves = 21,
    LegalMoves = 22,
}

impl Control {
    /// Frames carrying this control code are always sent fire-and-forget
    /// (seq_num=0, no retransmission), regardless of the caller-supplied
    /// UNRELIABLE flag.
    pub fn is_always_unreliable(self) -> bool {
        matches!(self, Self::SpectateUpdate | Self::ServerNotification)
    }

    /// ACK frames carry no token requirement and are exempt from the
    /// empty-token rejection rule.
    pub fn is_ack(self) -> bool {
        matches!(self, Self::Ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_u8() {
        for raw in 0..=22u8 {
            let ctrl = Control::try_from_primitive(raw).unwrap();
            let back: u8 = ctrl.into();
            assert_eq!(back, raw);
        }
    }

    #[test]
    fn rejects_unknown_byte() {
        assert!(Control::try_from_primitive(23).is_err());
    }
}
