pub type Token = [u8; 16];

/// One durable side effect, emitted by a handler and applied out of band.
/// Replaces the source's union-in-struct tagged variant with a proper sum
/// type.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    UpdateBoard {
        board_id: u64,
        fen: String,
        status: String,
    },
    CreateBoard {
        board_id: u64,
        fen: String,
        status: String,
    },
    UpdateBoardAssignmentTime {
        board_id: u64,
    },
    CreateReservation {
        board_id: u64,
        token: Token,
        timeout_seconds: u32,
    },
    RemoveReservation {
        board_id: u64,
    },
    RecordGameResult {
        board_id: u64,
        winning_side: Option<bool>,
    },
    UpdateSessionLastSeen {
        token: Token,
    },
    CreateSession {
        token: Token,
        player_id: u64,
    },
    LinkSessionToPubkey {
        token: Token,
        public_key: [u8; 32],
    },
    RecordPayout {
        board_id: u64,
        token: Token,
        points: u64,
    },
    RecordMove {
        board_id: u64,
        token: Token,
        uci: String,
        move_number: u32,
    },
}

impl Intent {
    /// Intents keyed on a session token: if the driver can't resolve that
    /// token to a session id, the intent is considered already satisfied
    /// (silently dropped) rather than failed, per §4.4.
    pub fn requires_session_lookup(&self) -> Option<Token> {
        match self {
            Self::CreateReservation { token, .. }
            | Self::UpdateSessionLastSeen { token }
            | Self::RecordPayout { token, .. }
            | Self::RecordMove { token, .. } => Some(*token),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Empty,
    NoBuffer,
    AllocFail,
    ApplyFail,
}

/// Append-only vector of pending intents. Growth doubles capacity; an
/// allocation failure sets a sticky [`Status::AllocFail`] that persists
/// until [`IntentBuffer::clear_sticky`] is called.
pub struct IntentBuffer {
    items: Vec<Intent>,
    sticky: Option<Status>,
}

impl IntentBuffer {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            sticky: None,
        }
    }

    pub fn emit(&mut self, intent: Intent) -> Status {
        if self.items.len() == self.items.capacity() {
            let additional = self.items.capacity().max(1);
            if self.items.try_reserve(additional).is_err() {
                self.sticky = Some(Status::AllocFail);
                return Status::AllocFail;
            }
        }
        self.items.push(intent);
        self.sticky.unwrap_or(Status::Ok)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn sticky_status(&self) -> Option<Status> {
        self.sticky
    }

    pub fn clear_sticky(&mut self) {
        self.sticky = None;
    }
}

impl Default for IntentBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies up to `max_batch` items from the front of `buf` against `driver`.
/// Successful items are dropped; failed items are compacted back to the
/// head for a later retry; items beyond `max_batch` are left untouched.
pub fn apply_intents(
    buf: &mut IntentBuffer,
    driver: &dyn crate::driver::StorageDriver,
    max_batch: usize,
) -> Status {
    if buf.items.is_empty() {
        return Status::Empty;
    }

    let batch_len = max_batch.min(buf.items.len());
    let mut retained = Vec::with_capacity(batch_len);
    let mut any_failed = false;

    for intent in buf.items.drain(..batch_len) {
        if let Some(token) = intent.requires_session_lookup() {
            match driver.get_session_by_token(token) {
                Ok(None) => continue, // satisfied: nothing to apply against
                Ok(Some(_)) => {}
                Err(_) => {
                    any_failed = true;
                    retained.push(intent);
                    continue;
                }
            }
        }
        match driver.apply_intent(&intent) {
            Ok(()) => {}
            Err(_) => {
                any_failed = true;
                retained.push(intent);
            }
        }
    }

    let tail: Vec<Intent> = buf.items.drain(..).collect();
    buf.items = retained.into_iter().chain(tail).collect();

    if any_failed {
        buf.sticky = Some(Status::ApplyFail);
        Status::ApplyFail
    } else {
        Status::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MemoryDriver;

    #[test]
    fn empty_buffer_reports_empty_status() {
        let mut buf = IntentBuffer::new();
        let driver = MemoryDriver::new();
        assert_eq!(apply_intents(&mut buf, &driver, 10), Status::Empty);
    }

    #[test]
    fn successful_intents_are_removed() {
        let mut buf = IntentBuffer::new();
        buf.emit(Intent::CreateBoard {
            board_id: 1,
            fen: "startpos".to_string(),
            status: "dormant".to_string(),
        });
        let driver = MemoryDriver::new();
        assert_eq!(apply_intents(&mut buf, &driver, 10), Status::Ok);
        assert!(buf.is_empty());
    }

    #[test]
    fn failed_intents_are_retained_for_retry() {
        let mut buf = IntentBuffer::new();
        buf.emit(Intent::CreateBoard {
            board_id: 1,
            fen: "startpos".to_string(),
            status: "dormant".to_string(),
        });
        let driver = MemoryDriver::new().failing();
        assert_eq!(apply_intents(&mut buf, &driver, 10), Status::ApplyFail);
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.sticky_status(), Some(Status::ApplyFail));
    }

    #[test]
    fn tail_beyond_max_batch_is_preserved() {
        let mut buf = IntentBuffer::new();
        for id in 0..5u64 {
            buf.emit(Intent::UpdateBoardAssignmentTime { board_id: id });
        }
        let driver = MemoryDriver::new();
        apply_intents(&mut buf, &driver, 2);
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn session_lookup_miss_drops_the_intent_as_satisfied() {
        let mut buf = IntentBuffer::new();
        buf.emit(Intent::UpdateSessionLastSeen { token: [9u8; 16] });
        let driver = MemoryDriver::new(); // no sessions registered
        assert_eq!(apply_intents(&mut buf, &driver, 10), Status::Ok);
        assert!(buf.is_empty());
    }
}
