use std::net::SocketAddr;
use std::time::{Duration, Instant};

use ahash::AHashMap;
use parking_lot::RwLock;

/// Identifies a peer's session: the pair of socket address and opaque
/// session token carried in every frame after CLIENT_HELLO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerKey {
    pub addr: SocketAddr,
    pub token: [u8; 16],
}

/// Mutable per-peer bookkeeping the reliability layer needs: the sequence
/// number the peer expects us to send next, the last inbound sequence number
/// we accepted (for duplicate suppression), and a liveness timestamp driving
/// eviction.
#[derive(Debug, Clone)]
pub struct PeerSession {
    pub next_outbound_seq_num: u32,
    pub last_accepted_seq_num: Option<u32>,
    last_seen: Instant,
}

impl PeerSession {
    fn new() -> Self {
        Self {
            next_outbound_seq_num: 1,
            last_accepted_seq_num: None,
            last_seen: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    fn is_stale(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() >= timeout
    }

    /// Allocates the next sequence number for a reliable outbound frame to
    /// this peer.
    pub fn next_seq(&mut self) -> u32 {
        let seq = self.next_outbound_seq_num;
        self.next_outbound_seq_num = self.next_outbound_seq_num.wrapping_add(1);
        seq
    }

    /// Returns `true` if `seq_num` is new (i.e. should be processed rather
    /// than treated as a retransmission duplicate), and records it as seen.
    pub fn accept_inbound(&mut self, seq_num: u32) -> bool {
        self.touch();
        match self.last_accepted_seq_num {
            Some(last) if seq_num <= last => false,
            _ => {
                self.last_accepted_seq_num = Some(seq_num);
                true
            }
        }
    }
}

/// Table of all live peer sessions, keyed by [`PeerKey`].
///
/// One instance is shared by a profile's listener thread and its background
/// eviction tick; both hold only an `Arc` to this table, never to each other,
/// following the weak-self pattern the rest of the runtime uses for its
/// background loops.
pub struct PeerSessionTable {
    sessions: RwLock<AHashMap<PeerKey, PeerSession>>,
    session_timeout: Duration,
}

impl PeerSessionTable {
    pub fn new(session_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(AHashMap::new()),
            session_timeout,
        }
    }

    /// Runs `f` against the session for `key`, creating one if this is the
    /// peer's first frame.
    pub fn with_session<R>(&self, key: PeerKey, f: impl FnOnce(&mut PeerSession) -> R) -> R {
        let mut sessions = self.sessions.write();
        let session = sessions.entry(key).or_insert_with(PeerSession::new);
        f(session)
    }

    pub fn contains(&self, key: &PeerKey) -> bool {
        self.sessions.read().contains_key(key)
    }

    pub fn remove(&self, key: &PeerKey) {
        self.sessions.write().remove(key);
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every session that hasn't been touched within `session_timeout`.
    /// Intended to be called periodically from a background tick thread.
    pub fn evict_stale(&self) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_stale(self.session_timeout));
        before - sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(port: u16) -> PeerKey {
        PeerKey {
            addr: format!("127.0.0.1:{port}").parse().unwrap(),
            token: [1u8; 16],
        }
    }

    #[test]
    fn first_contact_creates_a_session() {
        let table = PeerSessionTable::new(Duration::from_secs(60));
        let k = key(9000);
        assert!(!table.contains(&k));
        table.with_session(k, |s| s.next_seq());
        assert!(table.contains(&k));
    }

    #[test]
    fn outbound_seq_numbers_are_monotonic() {
        let table = PeerSessionTable::new(Duration::from_secs(60));
        let k = key(9001);
        let first = table.with_session(k, |s| s.next_seq());
        let second = table.with_session(k, |s| s.next_seq());
        assert!(second > first);
    }

    #[test]
    fn duplicate_inbound_seq_is_rejected() {
        let table = PeerSessionTable::new(Duration::from_secs(60));
        let k = key(9002);
        assert!(table.with_session(k, |s| s.accept_inbound(5)));
        assert!(!table.with_session(k, |s| s.accept_inbound(5)));
        assert!(!table.with_session(k, |s| s.accept_inbound(3)));
        assert!(table.with_session(k, |s| s.accept_inbound(6)));
    }

    #[test]
    fn eviction_removes_only_stale_sessions() {
        let table = PeerSessionTable::new(Duration::from_millis(0));
        let k = key(9003);
        table.with_session(k, |s| s.next_seq());
        let removed = table.evict_stale();
        assert_eq!(removed, 1);
        assert!(table.is_empty());
    }
}
