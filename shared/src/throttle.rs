//! Outbound snapshot throttling
//!
//! A board snapshot goes out only when the minimum interval has passed since
//! the previous transmission and the board or falling piece differs from what
//! was last sent. Anything suppressed is simply superseded by a later
//! snapshot, so no meaningful state change is lost.

use crate::protocol::BoardSnapshot;
use crate::SNAPSHOT_INTERVAL;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct SnapshotThrottle {
    min_interval: Duration,
    last_sent_at: Option<Instant>,
    last_sent: Option<BoardSnapshot>,
}

impl SnapshotThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_sent_at: None,
            last_sent: None,
        }
    }

    /// Returns true and records the snapshot if it should be transmitted now.
    pub fn should_send(&mut self, now: Instant, snapshot: &BoardSnapshot) -> bool {
        let interval_elapsed = self
            .last_sent_at
            .map_or(true, |at| now.saturating_duration_since(at) >= self.min_interval);
        if !interval_elapsed {
            return false;
        }
        if self.last_sent.as_ref() == Some(snapshot) {
            return false;
        }
        self.last_sent_at = Some(now);
        self.last_sent = Some(snapshot.clone());
        true
    }

    /// Forgets the last transmission, e.g. when a new match starts.
    pub fn reset(&mut self) {
        self.last_sent_at = None;
        self.last_sent = None;
    }
}

impl Default for SnapshotThrottle {
    fn default() -> Self {
        Self::new(SNAPSHOT_INTERVAL)
    }
}
