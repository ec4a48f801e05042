use std::time::{Duration, Instant};

use ahash::AHashMap;
use engine::{Board as Position, Color, GameResult};
use parking_lot::Mutex;

use crate::assignment::{self, PhaseMultipliers, PlayerClass};
use crate::error::RegistryError;
use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardState {
    Dormant,
    Reserved,
    Active,
    Archived,
}

#[derive(Debug, Clone, Copy)]
pub struct Reservation {
    pub token: Token,
    pub side: Color,
    reserved_at: Instant,
}

/// One board slot in the pool. Growable `Vec` plus an id→slot index, per the
/// "arena or growable vector indexed by slot" strategy — never hand out a
/// reference across a call that might grow the vector, only the slot index.
pub struct BoardEntry {
    pub id: u64,
    pub position: Position,
    pub state: BoardState,
    pub reservation: Option<Reservation>,
    pub last_move_time: Instant,
    pub last_assignment_time: Instant,
}

impl BoardEntry {
    fn fresh(id: u64) -> Self {
        Self {
            id,
            position: Position::starting_position(),
            state: BoardState::Dormant,
            reservation: None,
            last_move_time: Instant::now(),
            last_assignment_time: Instant::now(),
        }
    }
}

pub struct PoolLimits {
    pub min_boards: usize,
    pub max_boards: usize,
    pub reservation_timeout: Duration,
    pub inactivity_timeout: Duration,
}

struct Inner {
    boards: Vec<BoardEntry>,
    index: AHashMap<u64, usize>,
    next_id: u64,
}

/// The board pool for one profile: a single mutex guards all state-mutating
/// operations, per the "one mutex per subsystem" strategy carried forward
/// unsplit for this first implementation.
pub struct BoardPool {
    inner: Mutex<Inner>,
    limits: PoolLimits,
}

/// A board that just transitioned to ARCHIVED this tick, returned so the
/// caller can run payout before the entry is dropped from future queries.
pub struct ArchivedBoard {
    pub id: u64,
    pub result: GameResult,
}

impl BoardPool {
    pub fn new(limits: PoolLimits) -> Self {
        Self {
            inner: Mutex::new(Inner {
                boards: Vec::new(),
                index: AHashMap::new(),
                next_id: 1,
            }),
            limits,
        }
    }

    fn create_board_locked(inner: &mut Inner) -> usize {
        let id = inner.next_id;
        inner.next_id += 1;
        let slot = inner.boards.len();
        inner.boards.push(BoardEntry::fresh(id));
        inner.index.insert(id, slot);
        slot
    }

    pub fn len(&self) -> usize {
        self.inner.lock().boards.len()
    }

    /// The id that will be assigned to the next freshly created board.
    pub fn next_id(&self) -> u64 {
        self.inner.lock().next_id
    }

    /// Target pool size per §4.2: `max(min_boards, longest_game_moves *
    /// num_active_players)`, clamped to `max_boards`.
    pub fn target_size(&self, longest_game_moves: usize, num_active_players: usize) -> usize {
        let wanted = self.limits.min_boards.max(longest_game_moves * num_active_players);
        wanted.min(self.limits.max_boards)
    }

    pub fn with_board<R>(&self, id: u64, f: impl FnOnce(&BoardEntry) -> R) -> Option<R> {
        let inner = self.inner.lock();
        let slot = *inner.index.get(&id)?;
        Some(f(&inner.boards[slot]))
    }

    /// Finds a board to reserve for a player, following the fairness
    /// assignment algorithm: among boards not already reserved (DORMANT or
    /// ACTIVE), sort candidates by (phase multiplier desc, last_assignment_time
    /// asc) and reserve the top. Grows the pool if nothing is eligible and the
    /// pool is below `target_size`.
    pub fn find_board_for_player(
        &self,
        token: Token,
        games_played: u32,
        n_new: u32,
        early_threshold: u32,
        mid_threshold: u32,
        multipliers: &PhaseMultipliers,
        longest_game_moves: usize,
        num_active_players: usize,
    ) -> Result<(u64, Color), RegistryError> {
        let mut inner = self.inner.lock();
        let class = assignment::player_class(games_played, n_new);

        let mut best: Option<(usize, f64, Instant)> = None;
        for (slot, entry) in inner.boards.iter().enumerate() {
            if !matches!(entry.state, BoardState::Dormant | BoardState::Active) {
                continue;
            }
            let phase = assignment::phase_from_fullmove(
                entry.position.fullmove_number,
                early_threshold,
                mid_threshold,
            );
            let mult = multipliers.for_class_and_phase(class, phase);
            let better = match &best {
                None => true,
                Some((_, best_mult, best_time)) => {
                    mult > *best_mult || (mult == *best_mult && entry.last_assignment_time < *best_time)
                }
            };
            if better {
                best = Some((slot, mult, entry.last_assignment_time));
            }
        }

        let slot = match best {
            Some((slot, _, _)) => slot,
            None => {
                let target = self
                    .limits
                    .min_boards
                    .max(longest_game_moves * num_active_players)
                    .min(self.limits.max_boards);
                if inner.boards.len() >= target || inner.boards.len() >= self.limits.max_boards {
                    return Err(RegistryError::PoolExhausted);
                }
                Self::create_board_locked(&mut inner)
            }
        };

        let entry = &mut inner.boards[slot];
        let side = entry.position.turn;
        entry.state = BoardState::Reserved;
        entry.reservation = Some(Reservation {
            token,
            side,
            reserved_at: Instant::now(),
        });
        entry.last_assignment_time = Instant::now();
        Ok((entry.id, side))
    }

    fn reserved_for(inner: &Inner, id: u64, token: &Token) -> Result<usize, RegistryError> {
        let slot = *inner.index.get(&id).ok_or(RegistryError::UnknownBoard)?;
        match &inner.boards[slot].reservation {
            Some(r) if &r.token == token => Ok(slot),
            _ => Err(RegistryError::NotReserved),
        }
    }

    /// RESERVED → ACTIVE: a move was just applied. Clears the reservation
    /// and stamps `last_move_time`.
    pub fn release_after_move(&self, id: u64, token: &Token) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        let slot = Self::reserved_for(&inner, id, token)?;
        let entry = &mut inner.boards[slot];
        entry.reservation = None;
        entry.last_move_time = Instant::now();
        entry.state = if entry.position.result == GameResult::InProgress {
            BoardState::Active
        } else {
            BoardState::Archived
        };
        Ok(())
    }

    /// RESERVED → DORMANT: the reservation is abandoned without a move.
    pub fn cancel_reservation(&self, id: u64, token: &Token) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        let slot = Self::reserved_for(&inner, id, token)?;
        let entry = &mut inner.boards[slot];
        entry.reservation = None;
        entry.state = BoardState::Dormant;
        Ok(())
    }

    pub fn mutate_position<R>(
        &self,
        id: u64,
        token: &Token,
        f: impl FnOnce(&mut Position) -> R,
    ) -> Result<R, RegistryError> {
        let mut inner = self.inner.lock();
        let slot = Self::reserved_for(&inner, id, token)?;
        Ok(f(&mut inner.boards[slot].position))
    }

    /// Applies the time-based transitions from §4.2 to every board, and
    /// archives any board whose result is no longer IN_PROGRESS.
    pub fn tick(&self) -> Vec<ArchivedBoard> {
        let mut inner = self.inner.lock();
        let mut archived = Vec::new();
        let now = Instant::now();
        for entry in &mut inner.boards {
            match entry.state {
                BoardState::Reserved => {
                    if let Some(reservation) = &entry.reservation {
                        if now.duration_since(reservation.reserved_at) > self.limits.reservation_timeout {
                            entry.reservation = None;
                            entry.state = BoardState::Dormant;
                        }
                    }
                }
                BoardState::Active => {
                    if now.duration_since(entry.last_move_time) > self.limits.inactivity_timeout {
                        entry.state = BoardState::Dormant;
                    }
                }
                _ => {}
            }
            if entry.state != BoardState::Archived && entry.position.result != GameResult::InProgress {
                entry.state = BoardState::Archived;
                archived.push(ArchivedBoard {
                    id: entry.id,
                    result: entry.position.result,
                });
            }
        }
        archived
    }

    /// Board id, lifecycle state, and cached FEN for every live board, for
    /// writing a state snapshot.
    pub fn snapshot_records(&self) -> Vec<(u64, BoardState, String)> {
        let inner = self.inner.lock();
        inner
            .boards
            .iter()
            .map(|e| (e.id, e.state, e.position.fen_cache.clone()))
            .collect()
    }

    /// Repopulates the pool from a previously captured snapshot, overwriting
    /// any existing boards. Used only at hot-reload startup.
    pub fn restore_from_snapshot(&self, next_id: u64, boards: Vec<(u64, BoardState, Position)>) {
        let mut inner = self.inner.lock();
        inner.boards.clear();
        inner.index.clear();
        inner.next_id = next_id;
        for (id, state, position) in boards {
            let slot = inner.boards.len();
            inner.boards.push(BoardEntry {
                id,
                position,
                state,
                reservation: None,
                last_move_time: Instant::now(),
                last_assignment_time: Instant::now(),
            });
            inner.index.insert(id, slot);
        }
    }

    pub fn eligible_for_spectating(&self) -> Vec<(u64, Instant)> {
        let inner = self.inner.lock();
        inner
            .boards
            .iter()
            .filter(|e| matches!(e.state, BoardState::Active | BoardState::Reserved))
            .map(|e| (e.id, e.last_move_time))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multipliers() -> PhaseMultipliers {
        PhaseMultipliers {
            new_early: 2.0,
            new_mid: 1.0,
            new_end: 0.5,
            experienced_early: 1.0,
            experienced_mid: 1.0,
            experienced_end: 1.0,
        }
    }

    #[test]
    fn creates_a_board_on_demand_when_pool_is_empty() {
        let pool = BoardPool::new(PoolLimits {
            min_boards: 4,
            max_boards: 100,
            reservation_timeout: Duration::from_secs(30),
            inactivity_timeout: Duration::from_secs(600),
        });
        let token = [1u8; 16];
        let (id, side) = pool
            .find_board_for_player(token, 0, 10, 20, 60, &multipliers(), 40, 1)
            .unwrap();
        assert_eq!(side, Color::White);
        assert!(pool.with_board(id, |e| e.state == BoardState::Reserved).unwrap());
    }

    #[test]
    fn release_after_move_transitions_to_active() {
        let pool = BoardPool::new(PoolLimits {
            min_boards: 1,
            max_boards: 100,
            reservation_timeout: Duration::from_secs(30),
            inactivity_timeout: Duration::from_secs(600),
        });
        let token = [2u8; 16];
        let (id, _) = pool
            .find_board_for_player(token, 0, 10, 20, 60, &multipliers(), 40, 1)
            .unwrap();
        pool.release_after_move(id, &token).unwrap();
        assert!(pool.with_board(id, |e| e.state == BoardState::Active).unwrap());
    }

    #[test]
    fn cancel_reservation_transitions_to_dormant() {
        let pool = BoardPool::new(PoolLimits {
            min_boards: 1,
            max_boards: 100,
            reservation_timeout: Duration::from_secs(30),
            inactivity_timeout: Duration::from_secs(600),
        });
        let token = [3u8; 16];
        let (id, _) = pool
            .find_board_for_player(token, 0, 10, 20, 60, &multipliers(), 40, 1)
            .unwrap();
        pool.cancel_reservation(id, &token).unwrap();
        assert!(pool.with_board(id, |e| e.state == BoardState::Dormant).unwrap());
    }

    #[test]
    fn new_player_prefers_earlier_phase_board() {
        let pool = BoardPool::new(PoolLimits {
            min_boards: 2,
            max_boards: 100,
            reservation_timeout: Duration::from_secs(30),
            inactivity_timeout: Duration::from_secs(600),
        });
        {
            let mut inner = pool.inner.lock();
            BoardPool::create_board_locked(&mut inner);
            BoardPool::create_board_locked(&mut inner);
            inner.boards[0].position.fullmove_number = 2;
            inner.boards[0].state = BoardState::Dormant;
            inner.boards[1].position.fullmove_number = 80;
            inner.boards[1].state = BoardState::Dormant;
        }
        let token = [4u8; 16];
        let (id, _) = pool
            .find_board_for_player(token, 5, 10, 20, 60, &multipliers(), 40, 1)
            .unwrap();
        let chosen_fullmove = pool.with_board(id, |e| e.position.fullmove_number).unwrap();
        assert_eq!(chosen_fullmove, 2);
    }
}
