/// Whether a player is new or experienced, per `games_played` vs `n_new`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerClass {
    New,
    Experienced,
}

pub fn player_class(games_played: u32, n_new: u32) -> PlayerClass {
    if games_played < n_new {
        PlayerClass::New
    } else {
        PlayerClass::Experienced
    }
}

/// Coarse game phase derived from `fullmove_number`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Early,
    Mid,
    Endgame,
}

pub fn phase_from_fullmove(fullmove_number: u32, early_threshold: u32, mid_threshold: u32) -> Phase {
    if fullmove_number < early_threshold {
        Phase::Early
    } else if fullmove_number < mid_threshold {
        Phase::Mid
    } else {
        Phase::Endgame
    }
}

/// The 2x3 table of phase multipliers from configuration:
/// `{new,experienced}_player_{early,mid,end}_phase_mult`.
#[derive(Debug, Clone, Copy)]
pub struct PhaseMultipliers {
    pub new_early: f64,
    pub new_mid: f64,
    pub new_end: f64,
    pub experienced_early: f64,
    pub experienced_mid: f64,
    pub experienced_end: f64,
}

impl PhaseMultipliers {
    pub fn for_class_and_phase(&self, class: PlayerClass, phase: Phase) -> f64 {
        match (class, phase) {
            (PlayerClass::New, Phase::Early) => self.new_early,
            (PlayerClass::New, Phase::Mid) => self.new_mid,
            (PlayerClass::New, Phase::Endgame) => self.new_end,
            (PlayerClass::Experienced, Phase::Early) => self.experienced_early,
            (PlayerClass::Experienced, Phase::Mid) => self.experienced_mid,
            (PlayerClass::Experienced, Phase::Endgame) => self.experienced_end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_player_prefers_earlier_board() {
        let mults = PhaseMultipliers {
            new_early: 2.0,
            new_mid: 1.0,
            new_end: 0.5,
            experienced_early: 1.0,
            experienced_mid: 1.0,
            experienced_end: 1.0,
        };
        let class = player_class(5, 10);
        assert_eq!(class, PlayerClass::New);

        let early = phase_from_fullmove(2, 20, 60);
        let end = phase_from_fullmove(80, 20, 60);
        let early_score = mults.for_class_and_phase(class, early);
        let end_score = mults.for_class_and_phase(class, end);
        assert!(early_score > end_score);
    }
}
