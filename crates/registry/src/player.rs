use std::time::{Duration, Instant};

use ahash::AHashMap;
use parking_lot::Mutex;

use crate::error::RegistryError;
use crate::token::{self, Token};

/// A player: the entity behind a token, independent of any single network
/// session. Created on first client-hello, optionally promoted to a
/// persistent identity via a public-key login.
#[derive(Debug, Clone)]
pub struct Player {
    pub token: Token,
    pub public_key: Option<[u8; 32]>,
    pub persistent: bool,
    pub score: u64,
    pub games_played: u32,
    last_seen: Instant,
}

impl Player {
    fn new(token: Token) -> Self {
        Self {
            token,
            public_key: None,
            persistent: false,
            score: 0,
            games_played: 0,
            last_seen: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    fn is_idle(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() >= timeout
    }
}

struct Inner {
    players: AHashMap<Token, Player>,
}

/// All known players for one profile, keyed by token.
pub struct PlayerRegistry {
    inner: Mutex<Inner>,
    max_players: usize,
    token_expiration: Duration,
}

impl PlayerRegistry {
    pub fn new(max_players: usize, token_expiration: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                players: AHashMap::new(),
            }),
            max_players,
            token_expiration,
        }
    }

    /// Returns the player for `token`, creating a fresh one if absent. Fails
    /// with [`RegistryError::PlayerCapacityReached`] only when creation would
    /// exceed `max_players`.
    pub fn get_or_create(&self, token: Option<Token>) -> Result<Token, RegistryError> {
        let mut inner = self.inner.lock();
        if let Some(t) = token {
            if let Some(player) = inner.players.get_mut(&t) {
                player.touch();
                return Ok(t);
            }
        }
        if inner.players.len() >= self.max_players {
            return Err(RegistryError::PlayerCapacityReached);
        }
        let fresh = token::generate();
        inner.players.insert(fresh, Player::new(fresh));
        Ok(fresh)
    }

    pub fn touch(&self, token: &Token) {
        if let Some(player) = self.inner.lock().players.get_mut(token) {
            player.touch();
        }
    }

    pub fn get(&self, token: &Token) -> Option<Player> {
        self.inner.lock().players.get(token).cloned()
    }

    pub fn record_game(&self, token: &Token, points: u64) {
        if let Some(player) = self.inner.lock().players.get_mut(token) {
            player.score += points;
            player.games_played += 1;
        }
    }

    /// Links an existing session to a persistent identity carrying a public
    /// key, per a LOGIN_REQUEST.
    pub fn promote_to_persistent(&self, token: &Token, public_key: [u8; 32]) -> bool {
        if let Some(player) = self.inner.lock().players.get_mut(token) {
            player.public_key = Some(public_key);
            player.persistent = true;
            true
        } else {
            false
        }
    }

    /// Evicts players idle beyond `token_expiration`. Returns the number
    /// removed.
    pub fn sweep_expired(&self) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.players.len();
        let timeout = self.token_expiration;
        inner.players.retain(|_, p| !p.is_idle(timeout));
        before - inner.players.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().players.len()
    }

    /// The `n` highest-scoring players, descending by score.
    pub fn top_n(&self, n: usize) -> Vec<Player> {
        let inner = self.inner.lock();
        let mut players: Vec<Player> = inner.players.values().cloned().collect();
        players.sort_by(|a, b| b.score.cmp(&a.score));
        players.truncate(n);
        players
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_a_fresh_token_when_none_supplied() {
        let registry = PlayerRegistry::new(10, Duration::from_secs(60));
        let token = registry.get_or_create(None).unwrap();
        assert!(registry.get(&token).is_some());
    }

    #[test]
    fn capacity_limit_is_enforced() {
        let registry = PlayerRegistry::new(1, Duration::from_secs(60));
        registry.get_or_create(None).unwrap();
        assert_eq!(
            registry.get_or_create(None),
            Err(RegistryError::PlayerCapacityReached)
        );
    }

    #[test]
    fn idle_sweep_evicts_only_expired_players() {
        let registry = PlayerRegistry::new(10, Duration::from_millis(0));
        registry.get_or_create(None).unwrap();
        assert_eq!(registry.sweep_expired(), 1);
        assert_eq!(registry.len(), 0);
    }
}
