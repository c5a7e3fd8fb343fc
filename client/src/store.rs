//! Local score-history persistence
//!
//! The score book maps each username to its history, newest first. The
//! client only appends finished sessions and reads the book back for the
//! leaderboard; how the book is stored is up to the [`ScoreStore`].

use log::debug;
use shared::ScoreHistoryEntry;
use std::collections::HashMap;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub type ScoreBook = HashMap<String, Vec<ScoreHistoryEntry>>;

pub trait ScoreStore {
    fn load(&self) -> Result<ScoreBook, Box<dyn Error>>;
    fn save(&self, book: &ScoreBook) -> Result<(), Box<dyn Error>>;
}

/// Score book kept in a single bincode file. A missing file is an empty book.
pub struct FileScoreStore {
    path: PathBuf,
}

impl FileScoreStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScoreStore for FileScoreStore {
    fn load(&self) -> Result<ScoreBook, Box<dyn Error>> {
        if !self.path.exists() {
            return Ok(ScoreBook::new());
        }
        let bytes = std::fs::read(&self.path)?;
        let book = bincode::deserialize(&bytes)?;
        Ok(book)
    }

    fn save(&self, book: &ScoreBook) -> Result<(), Box<dyn Error>> {
        let bytes = bincode::serialize(book)?;
        std::fs::write(&self.path, bytes)?;
        debug!("Saved score book to {}", self.path.display());
        Ok(())
    }
}

/// In-process store, handy when nothing should touch the disk.
#[derive(Default)]
pub struct MemoryScoreStore {
    book: Mutex<ScoreBook>,
}

impl ScoreStore for MemoryScoreStore {
    fn load(&self) -> Result<ScoreBook, Box<dyn Error>> {
        let book = self.book.lock().map_err(|e| e.to_string())?;
        Ok(book.clone())
    }

    fn save(&self, book: &ScoreBook) -> Result<(), Box<dyn Error>> {
        let mut stored = self.book.lock().map_err(|e| e.to_string())?;
        *stored = book.clone();
        Ok(())
    }
}

/// Puts `entries` (newest first) in front of the user's stored history.
pub fn record_history(
    store: &dyn ScoreStore,
    username: &str,
    entries: Vec<ScoreHistoryEntry>,
) -> Result<(), Box<dyn Error>> {
    if entries.is_empty() {
        return Ok(());
    }
    let mut book = store.load()?;
    let history = book.entry(username.to_string()).or_default();
    let older = std::mem::replace(history, entries);
    history.extend(older);
    store.save(&book)
}

/// Best score per player, highest first, ties by name.
pub fn leaderboard(book: &ScoreBook) -> Vec<(String, u64)> {
    let mut best: Vec<(String, u64)> = book
        .iter()
        .filter_map(|(name, history)| {
            history
                .iter()
                .map(|entry| entry.score)
                .max()
                .map(|score| (name.clone(), score))
        })
        .collect();
    best.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(score: u64, timestamp: u64) -> ScoreHistoryEntry {
        ScoreHistoryEntry { score, timestamp }
    }

    #[test]
    fn test_record_history_prepends_newest() {
        let store = MemoryScoreStore::default();
        record_history(&store, "alice", vec![entry(10, 1)]).unwrap();
        record_history(&store, "alice", vec![entry(30, 3), entry(20, 2)]).unwrap();

        let book = store.load().unwrap();
        let scores: Vec<u64> = book["alice"].iter().map(|e| e.score).collect();
        assert_eq!(scores, vec![30, 20, 10]);
    }

    #[test]
    fn test_record_empty_history_is_noop() {
        let store = MemoryScoreStore::default();
        record_history(&store, "alice", Vec::new()).unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_leaderboard_orders_best_scores() {
        let mut book = ScoreBook::new();
        book.insert("bob".to_string(), vec![entry(50, 2), entry(90, 1)]);
        book.insert("alice".to_string(), vec![entry(90, 3)]);
        book.insert("carol".to_string(), Vec::new());

        assert_eq!(
            leaderboard(&book),
            vec![("alice".to_string(), 90), ("bob".to_string(), 90)]
        );
    }

    #[test]
    fn test_file_store_round_trip() {
        let path = std::env::temp_dir().join(format!(
            "score-store-test-{}-{}.bin",
            std::process::id(),
            shared::ScoreHistoryEntry::now(0).timestamp
        ));
        let store = FileScoreStore::new(&path);
        assert!(store.load().unwrap().is_empty());

        record_history(&store, "alice", vec![entry(42, 7)]).unwrap();
        let book = store.load().unwrap();
        assert_eq!(book["alice"], vec![entry(42, 7)]);

        std::fs::remove_file(store.path()).unwrap();
    }
}
