//! Lobby display ordering
//!
//! Peers are listed not-ready first, then ready, each group sorted by name.
//! With at most a handful of entries this is a plain list sorted on read;
//! it orders a display, it does not schedule anything.

/// `(rank, username)` where rank is 1 for ready peers and 0 otherwise.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReadinessQueueEntry {
    pub rank: u8,
    pub username: String,
}

impl ReadinessQueueEntry {
    pub fn new(username: &str, ready: bool) -> Self {
        Self {
            rank: u8::from(ready),
            username: username.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ReadinessQueue {
    entries: Vec<ReadinessQueueEntry>,
}

impl ReadinessQueue {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Replaces any existing entry for the user with one at the new rank.
    pub fn upsert(&mut self, username: &str, ready: bool) {
        self.remove(username);
        self.entries.push(ReadinessQueueEntry::new(username, ready));
    }

    pub fn remove(&mut self, username: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.username != username);
        self.entries.len() != before
    }

    /// Entries in display order: `(rank, username)` ascending.
    pub fn ordered(&self) -> Vec<ReadinessQueueEntry> {
        let mut entries = self.entries.clone();
        entries.sort();
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
