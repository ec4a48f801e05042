use std::collections::HashMap;

use engine::{Color, GameResult};
use registry::Token;

/// One contributor's move count on one side of a finished board.
#[derive(Debug, Clone, Copy)]
pub struct Contribution {
    pub token: Token,
    pub side: Color,
    pub moves: u32,
}

/// Distributes `max_pot` proportionally to the winning side's contributors.
/// For a draw, the pot is split in half per side and a contributor who
/// played both sides has their two shares summed.
///
/// Grounded on the scoring scenario in §8: WHITE_WINS with 18 white moves by
/// A, 2 by B, 20 black moves by C, `max_pot=20` → A=18, B=2, C=0.
pub fn distribute_payout(
    result: GameResult,
    contributions: &[Contribution],
    max_pot: u64,
) -> HashMap<Token, u64> {
    let mut payouts: HashMap<Token, u64> = HashMap::new();
    if result == GameResult::InProgress {
        return payouts;
    }

    let side_total = |side: Color| -> u64 {
        contributions
            .iter()
            .filter(|c| c.side == side)
            .map(|c| c.moves as u64)
            .sum()
    };

    let mut credit_side = |side: Color, pot: u64| {
        let total = side_total(side);
        if total == 0 {
            return;
        }
        for c in contributions.iter().filter(|c| c.side == side) {
            let share = pot * c.moves as u64 / total;
            *payouts.entry(c.token).or_insert(0) += share;
        }
    };

    match result {
        GameResult::WhiteWins => credit_side(Color::White, max_pot),
        GameResult::BlackWins => credit_side(Color::Black, max_pot),
        GameResult::Draw => {
            let half = max_pot / 2;
            credit_side(Color::White, half);
            credit_side(Color::Black, half);
        }
        GameResult::InProgress => unreachable!(),
    }

    payouts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proportional_split_on_a_win() {
        let contributions = vec![
            Contribution {
                token: [1u8; 16],
                side: Color::White,
                moves: 18,
            },
            Contribution {
                token: [2u8; 16],
                side: Color::White,
                moves: 2,
            },
            Contribution {
                token: [3u8; 16],
                side: Color::Black,
                moves: 20,
            },
        ];
        let payouts = distribute_payout(GameResult::WhiteWins, &contributions, 20);
        assert_eq!(payouts.get(&[1u8; 16]), Some(&18));
        assert_eq!(payouts.get(&[2u8; 16]), Some(&2));
        assert_eq!(payouts.get(&[3u8; 16]), None);
    }

    #[test]
    fn draw_splits_pot_in_half_per_side() {
        let contributions = vec![
            Contribution {
                token: [1u8; 16],
                side: Color::White,
                moves: 10,
            },
            Contribution {
                token: [1u8; 16],
                side: Color::Black,
                moves: 10,
            },
        ];
        let payouts = distribute_payout(GameResult::Draw, &contributions, 20);
        assert_eq!(payouts.get(&[1u8; 16]), Some(&20));
    }
}
