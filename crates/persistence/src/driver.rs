use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::DriverError;
use crate::intent::{Intent, Token};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub player_id: u64,
    pub persistent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardRecord {
    pub board_id: u64,
    pub fen: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    pub uci: String,
    pub move_number: u32,
}

/// The interface the core consumes but does not define the backing store
/// for — queries return `Ok(Some(_))`/`Ok(None)`/`Err(_)` in place of the
/// source's `{status, data}` tuple, collapsing `NOT_FOUND` into `None` and
/// reserving [`DriverError`] for genuine backend failures.
pub trait StorageDriver: Send + Sync {
    fn get_session_by_token(&self, token: Token) -> Result<Option<SessionRecord>, DriverError>;
    fn get_persistent_session_by_token(
        &self,
        token: Token,
    ) -> Result<Option<SessionRecord>, DriverError>;
    fn get_board(&self, board_id: u64) -> Result<Option<BoardRecord>, DriverError>;
    fn list_boards_by_status(&self, status: &str) -> Result<Vec<BoardRecord>, DriverError>;
    fn get_max_board_id(&self) -> Result<Option<u64>, DriverError>;
    fn get_moves_for_board(&self, board_id: u64) -> Result<Vec<MoveRecord>, DriverError>;
    fn get_longest_game_moves(&self) -> Result<Option<u32>, DriverError>;
    fn get_active_session_count(&self) -> Result<u64, DriverError>;
    fn get_player_total_score(&self, token: Token) -> Result<Option<u64>, DriverError>;
    fn get_player_rating(&self, token: Token) -> Result<Option<f64>, DriverError>;
    fn get_session_games_played(&self, token: Token) -> Result<Option<u32>, DriverError>;
    fn get_trust_tier_by_token(&self, token: Token) -> Result<Option<u8>, DriverError>;

    fn apply_intent(&self, intent: &Intent) -> Result<(), DriverError>;
}

/// A driver that answers every query with `NotFound`/empty and accepts every
/// command as a no-op. Useful when persistence is configured off.
pub struct NullDriver;

impl StorageDriver for NullDriver {
    fn get_session_by_token(&self, _token: Token) -> Result<Option<SessionRecord>, DriverError> {
        Ok(None)
    }

    fn get_persistent_session_by_token(
        &self,
        _token: Token,
    ) -> Result<Option<SessionRecord>, DriverError> {
        Ok(None)
    }

    fn get_board(&self, _board_id: u64) -> Result<Option<BoardRecord>, DriverError> {
        Ok(None)
    }

    fn list_boards_by_status(&self, _status: &str) -> Result<Vec<BoardRecord>, DriverError> {
        Ok(Vec::new())
    }

    fn get_max_board_id(&self) -> Result<Option<u64>, DriverError> {
        Ok(None)
    }

    fn get_moves_for_board(&self, _board_id: u64) -> Result<Vec<MoveRecord>, DriverError> {
        Ok(Vec::new())
    }

    fn get_longest_game_moves(&self) -> Result<Option<u32>, DriverError> {
        Ok(None)
    }

    fn get_active_session_count(&self) -> Result<u64, DriverError> {
        Ok(0)
    }

    fn get_player_total_score(&self, _token: Token) -> Result<Option<u64>, DriverError> {
        Ok(None)
    }

    fn get_player_rating(&self, _token: Token) -> Result<Option<f64>, DriverError> {
        Ok(None)
    }

    fn get_session_games_played(&self, _token: Token) -> Result<Option<u32>, DriverError> {
        Ok(None)
    }

    fn get_trust_tier_by_token(&self, _token: Token) -> Result<Option<u8>, DriverError> {
        Ok(None)
    }

    fn apply_intent(&self, _intent: &Intent) -> Result<(), DriverError> {
        Ok(())
    }
}

#[derive(Default)]
struct MemoryState {
    sessions: HashMap<Token, SessionRecord>,
    boards: HashMap<u64, BoardRecord>,
    moves: HashMap<u64, Vec<MoveRecord>>,
}

/// An in-memory driver used by tests and by small single-process
/// deployments that don't need a real database.
pub struct MemoryDriver {
    state: Mutex<MemoryState>,
    fail_applies: bool,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            fail_applies: false,
        }
    }

    /// Returns a driver whose `apply_intent` always fails, for exercising
    /// the retry path.
    pub fn failing(mut self) -> Self {
        self.fail_applies = true;
        self
    }

    pub fn seed_session(&self, token: Token, record: SessionRecord) {
        self.state.lock().sessions.insert(token, record);
    }
}

impl Default for MemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageDriver for MemoryDriver {
    fn get_session_by_token(&self, token: Token) -> Result<Option<SessionRecord>, DriverError> {
        Ok(self.state.lock().sessions.get(&token).cloned())
    }

    fn get_persistent_session_by_token(
        &self,
        token: Token,
    ) -> Result<Option<SessionRecord>, DriverError> {
        Ok(self
            .state
            .lock()
            .sessions
            .get(&token)
            .filter(|s| s.persistent)
            .cloned())
    }

    fn get_board(&self, board_id: u64) -> Result<Option<BoardRecord>, DriverError> {
        Ok(self.state.lock().boards.get(&board_id).cloned())
    }

    fn list_boards_by_status(&self, status: &str) -> Result<Vec<BoardRecord>, DriverError> {
        Ok(self
            .state
            .lock()
            .boards
            .values()
            .filter(|b| b.status == status)
            .cloned()
            .collect())
    }

    fn get_max_board_id(&self) -> Result<Option<u64>, DriverError> {
        Ok(self.state.lock().boards.keys().copied().max())
    }

    fn get_moves_for_board(&self, board_id: u64) -> Result<Vec<MoveRecord>, DriverError> {
        Ok(self
            .state
            .lock()
            .moves
            .get(&board_id)
            .cloned()
            .unwrap_or_default())
    }

    fn get_longest_game_moves(&self) -> Result<Option<u32>, DriverError> {
        Ok(self
            .state
            .lock()
            .moves
            .values()
            .map(|moves| moves.len() as u32)
            .max())
    }

    fn get_active_session_count(&self) -> Result<u64, DriverError> {
        Ok(self.state.lock().sessions.len() as u64)
    }

    fn get_player_total_score(&self, _token: Token) -> Result<Option<u64>, DriverError> {
        Ok(None)
    }

    fn get_player_rating(&self, _token: Token) -> Result<Option<f64>, DriverError> {
        Ok(None)
    }

    fn get_session_games_played(&self, _token: Token) -> Result<Option<u32>, DriverError> {
        Ok(None)
    }

    fn get_trust_tier_by_token(&self, _token: Token) -> Result<Option<u8>, DriverError> {
        Ok(None)
    }

    fn apply_intent(&self, intent: &Intent) -> Result<(), DriverError> {
        if self.fail_applies {
            return Err(DriverError::Backend("forced failure".to_string()));
        }
        let mut state = self.state.lock();
        match intent {
            Intent::CreateBoard {
                board_id,
                fen,
                status,
            }
            | Intent::UpdateBoard {
                board_id,
                fen,
                status,
            } => {
                state.boards.insert(
                    *board_id,
                    BoardRecord {
                        board_id: *board_id,
                        fen: fen.clone(),
                        status: status.clone(),
                    },
                );
            }
            Intent::RecordMove {
                board_id,
                uci,
                move_number,
                ..
            } => {
                state.moves.entry(*board_id).or_default().push(MoveRecord {
                    uci: uci.clone(),
                    move_number: *move_number,
                });
            }
            Intent::CreateSession { token, player_id } => {
                state.sessions.insert(
                    *token,
                    SessionRecord {
                        player_id: *player_id,
                        persistent: false,
                    },
                );
            }
            Intent::LinkSessionToPubkey { token, .. } => {
                if let Some(session) = state.sessions.get_mut(token) {
                    session.persistent = true;
                }
            }
            _ => {}
        }
        Ok(())
    }
}
