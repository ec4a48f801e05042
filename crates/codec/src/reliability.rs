use std::collections::HashMap;
use std::sync::mpsc;
use std::time::Duration;

use parking_lot::Mutex;

/// Tuning knobs for the retransmit loop a reliable sender drives around a
/// single outbound frame.
#[derive(Debug, Clone, Copy)]
pub struct ReliabilityConfig {
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(250),
            max_retries: 4,
        }
    }
}

/// Registry of senders blocked waiting for an ACK, keyed by the `seq_num`
/// they're expecting to see echoed back.
///
/// A sender registers before putting its frame on the wire, then blocks on
/// the returned receiver with the configured timeout. The socket read loop
/// calls [`AckWaiters::notify`] when it sees an ACK frame come in, waking
/// whichever send is waiting on that sequence number.
pub struct AckWaiters {
    pending: Mutex<HashMap<u32, mpsc::Sender<()>>>,
}

impl AckWaiters {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Registers interest in `seq_num`'s ACK, returning the receiver half to
    /// block on.
    pub fn register(&self, seq_num: u32) -> mpsc::Receiver<()> {
        let (tx, rx) = mpsc::channel();
        self.pending.lock().insert(seq_num, tx);
        rx
    }

    /// Called from the inbound read loop when an ACK for `seq_num` arrives.
    /// No-op if nobody is waiting (the send may have already timed out and
    /// been cancelled, or retried under a fresh seq_num).
    pub fn notify(&self, seq_num: u32) {
        if let Some(tx) = self.pending.lock().remove(&seq_num) {
            let _ = tx.send(());
        }
    }

    /// Drops interest in `seq_num` without waiting further, e.g. after the
    /// retry budget is exhausted.
    pub fn cancel(&self, seq_num: u32) {
        self.pending.lock().remove(&seq_num);
    }
}

impl Default for AckWaiters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_wakes_the_matching_waiter() {
        let waiters = AckWaiters::new();
        let rx = waiters.register(5);
        waiters.notify(5);
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_ok());
    }

    #[test]
    fn notify_on_unknown_seq_is_a_no_op() {
        let waiters = AckWaiters::new();
        waiters.notify(99);
    }

    #[test]
    fn cancel_stops_a_waiter_from_being_notified() {
        let waiters = AckWaiters::new();
        let rx = waiters.register(5);
        waiters.cancel(5);
        waiters.notify(5);
        assert!(rx.recv_timeout(Duration::from_millis(20)).is_err());
    }
}
