use std::net::SocketAddr;
use std::time::{Duration, Instant};

use ahash::AHashMap;
use parking_lot::Mutex;

use crate::board::BoardPool;
use crate::error::RegistryError;
use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectatorState {
    Idle,
    Summary,
    Focus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpectatorKey {
    pub addr: SocketAddr,
    pub token: Token,
}

struct SpectatorEntry {
    trust_tier: u8,
    state: SpectatorState,
    focused_board: Option<u64>,
    last_summary_wall: Instant,
    last_focus_sent: Instant,
    pending_notice: Option<u64>,
    last_seen: Instant,
}

impl SpectatorEntry {
    fn new(trust_tier: u8) -> Self {
        let now = Instant::now();
        Self {
            trust_tier,
            state: SpectatorState::Idle,
            focused_board: None,
            last_summary_wall: now,
            last_focus_sent: now,
            pending_notice: None,
            last_seen: now,
        }
    }
}

pub struct SpectatorLimits {
    pub visibility: u8,
    pub max_spectators: usize,
    pub max_focus_per_session: i32,
    pub session_timeout: Duration,
    pub summary_hz: f64,
    pub focus_hz: f64,
    /// "changes" mode: only boards whose `last_move_time` is newer than the
    /// spectator's own `last_summary_wall` are included.
    pub summary_changes_only: bool,
}

/// One item the listener loop sends as a SPECTATE_UPDATE frame.
pub struct SpectatorUpdate {
    pub key: SpectatorKey,
    pub board_id: u64,
}

/// One item the listener loop sends as a SERVER_NOTIFICATION frame: the
/// spectator's focused board left the eligible set.
pub struct SpectatorNotice {
    pub key: SpectatorKey,
    pub board_id: u64,
}

pub struct SpectatorManager {
    entries: Mutex<AHashMap<SpectatorKey, SpectatorEntry>>,
    limits: SpectatorLimits,
}

impl SpectatorManager {
    pub fn new(limits: SpectatorLimits) -> Self {
        Self {
            entries: Mutex::new(AHashMap::new()),
            limits,
        }
    }

    fn focused_count(entries: &AHashMap<SpectatorKey, SpectatorEntry>) -> usize {
        entries
            .values()
            .filter(|e| e.state == SpectatorState::Focus)
            .count()
    }

    /// Admits a SPECTATE_GAME request. `is_admin` bypasses the `max_spectators`
    /// cap.
    pub fn spectate_game(
        &self,
        key: SpectatorKey,
        trust_tier: u8,
        board_id: u64,
        is_admin: bool,
        pool: &BoardPool,
    ) -> Result<(), RegistryError> {
        if trust_tier < self.limits.visibility {
            return Err(RegistryError::Visibility);
        }

        let mut entries = self.entries.lock();
        if !is_admin && Self::focused_count(&entries) >= self.limits.max_spectators && !entries.contains_key(&key) {
            return Err(RegistryError::Full);
        }

        if self.limits.max_focus_per_session <= 0 {
            return Err(RegistryError::FocusDisabled);
        }
        let eligible = pool
            .eligible_for_spectating()
            .into_iter()
            .any(|(id, _)| id == board_id);
        if !eligible {
            return Err(RegistryError::NotAvailable);
        }

        let entry = entries
            .entry(key)
            .or_insert_with(|| SpectatorEntry::new(trust_tier));
        entry.state = SpectatorState::Focus;
        entry.focused_board = Some(board_id);
        entry.last_seen = Instant::now();
        Ok(())
    }

    pub fn spectate_stop(&self, key: &SpectatorKey) {
        if let Some(entry) = self.entries.lock().get_mut(key) {
            entry.state = SpectatorState::Idle;
            entry.focused_board = None;
        }
    }

    /// Collects FOCUS updates and downgrades any spectator whose board left
    /// the eligible set to SUMMARY with a one-shot notice queued.
    pub fn collect_focus_updates(&self, pool: &BoardPool) -> Vec<SpectatorUpdate> {
        let eligible: std::collections::HashSet<u64> =
            pool.eligible_for_spectating().into_iter().map(|(id, _)| id).collect();
        let mut out = Vec::new();
        let now = Instant::now();
        let period = Duration::from_secs_f64(1.0 / self.limits.focus_hz.max(0.001));

        let mut entries = self.entries.lock();
        for (key, entry) in entries.iter_mut() {
            if entry.state != SpectatorState::Focus {
                continue;
            }
            let Some(board_id) = entry.focused_board else {
                continue;
            };
            if !eligible.contains(&board_id) {
                entry.pending_notice = Some(board_id);
                entry.state = SpectatorState::Summary;
                entry.focused_board = None;
                continue;
            }
            if now.duration_since(entry.last_focus_sent) >= period {
                entry.last_focus_sent = now;
                out.push(SpectatorUpdate {
                    key: *key,
                    board_id,
                });
            }
        }
        out
    }

    pub fn drain_notices(&self) -> Vec<SpectatorNotice> {
        let mut out = Vec::new();
        for (key, entry) in self.entries.lock().iter_mut() {
            if let Some(board_id) = entry.pending_notice.take() {
                out.push(SpectatorNotice {
                    key: *key,
                    board_id,
                });
            }
        }
        out
    }

    /// Collects SUMMARY batches: at most `spectator_summary_hz` times per
    /// second, one update per eligible board, sorted by `last_move_time` desc.
    /// In "changes" mode only boards newer than the spectator's own
    /// `last_summary_wall` are included.
    pub fn collect_summary_updates(&self, pool: &BoardPool) -> Vec<SpectatorUpdate> {
        let mut eligible = pool.eligible_for_spectating();
        eligible.sort_by(|a, b| b.1.cmp(&a.1));

        let now = Instant::now();
        let period = Duration::from_secs_f64(1.0 / self.limits.summary_hz.max(0.001));
        let mut out = Vec::new();

        let mut entries = self.entries.lock();
        for (key, entry) in entries.iter_mut() {
            if entry.state != SpectatorState::Summary {
                continue;
            }
            if now.duration_since(entry.last_summary_wall) < period {
                continue;
            }
            for &(board_id, last_move_time) in &eligible {
                if self.limits.summary_changes_only && last_move_time <= entry.last_summary_wall {
                    continue;
                }
                out.push(SpectatorUpdate {
                    key: *key,
                    board_id,
                });
            }
            entry.last_summary_wall = now;
        }
        out
    }

    /// Drops spectators inactive beyond `session_timeout`.
    pub fn evict_stale(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        let timeout = self.limits.session_timeout;
        entries.retain(|_, e| e.last_seen.elapsed() < timeout);
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::PoolLimits;

    fn key(port: u16) -> SpectatorKey {
        SpectatorKey {
            addr: format!("127.0.0.1:{port}").parse().unwrap(),
            token: [1u8; 16],
        }
    }

    fn limits() -> SpectatorLimits {
        SpectatorLimits {
            visibility: 0,
            max_spectators: 10,
            max_focus_per_session: 1,
            session_timeout: Duration::from_secs(60),
            summary_hz: 1.0,
            focus_hz: 4.0,
            summary_changes_only: false,
        }
    }

    #[test]
    fn low_trust_tier_is_rejected() {
        let pool = BoardPool::new(PoolLimits {
            min_boards: 1,
            max_boards: 10,
            reservation_timeout: Duration::from_secs(30),
            inactivity_timeout: Duration::from_secs(600),
        });
        let manager = SpectatorManager::new(SpectatorLimits {
            visibility: 5,
            ..limits()
        });
        let result = manager.spectate_game(key(1), 1, 1, false, &pool);
        assert_eq!(result, Err(RegistryError::Visibility));
    }

    #[test]
    fn unavailable_board_is_rejected() {
        let pool = BoardPool::new(PoolLimits {
            min_boards: 1,
            max_boards: 10,
            reservation_timeout: Duration::from_secs(30),
            inactivity_timeout: Duration::from_secs(600),
        });
        let manager = SpectatorManager::new(limits());
        let result = manager.spectate_game(key(2), 5, 999, false, &pool);
        assert_eq!(result, Err(RegistryError::NotAvailable));
    }
}
