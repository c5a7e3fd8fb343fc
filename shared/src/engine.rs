//! Per-player simulation
//!
//! `BoardEngine` owns one player's board, falling piece, next-queue, hold slot
//! and scoring counters. It never touches the network: callers drive it with
//! player actions and gravity ticks, then drain the [`EngineEvent`]s it
//! produces (score changes, top-out) and forward them however they like.
//!
//! ## Scoring
//!
//! Every freeze runs the line-clear step with
//! `multiplier = 1 + (level - 1) * 0.1`:
//! - a 4-line clear directly after another 4-line clear earns `400 * multiplier`
//! - any clear while a combo is running earns `50 * combo * multiplier`
//! - pending soft-drop and hard-drop points are added scaled by the multiplier
//!
//! Clears of one to three lines earn nothing on their own; only the
//! back-to-back, combo and drop paths contribute to the score.

use crate::board::Board;
use crate::piece::{collides, rotate, Piece};
use crate::protocol::BoardSnapshot;
use crate::{gravity_delay, NEXT_QUEUE_LEN, ROWS};
use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};
use std::time::Duration;

const LINES_PER_LEVEL: u32 = 10;
const BACK_TO_BACK_BONUS: f64 = 400.0;
const COMBO_BONUS: f64 = 50.0;
const HARD_DROP_POINTS_PER_CELL: u64 = 2;

/// One score-history record: the running score after a freeze.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreHistoryEntry {
    pub score: u64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl ScoreHistoryEntry {
    /// Stamps `score` with the current wall-clock time.
    pub fn now(score: u64) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as u64);
        Self { score, timestamp }
    }
}

/// Things the caller has to react to after driving the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Emitted after every freeze with the post-freeze totals.
    ScoreChanged { score: u64, level: u32 },
    /// The freshly spawned piece collided: this player has lost.
    Lost,
}

/// Result of committing a piece to the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreezeOutcome {
    pub lines_cleared: usize,
    pub score_gained: u64,
    pub topped_out: bool,
}

pub struct BoardEngine {
    board: Board,
    current: Piece,
    next_queue: VecDeque<Piece>,
    hold: Option<Piece>,
    hold_used: bool,

    score: u64,
    level: u32,
    total_lines_cleared: u32,
    combo: u32,
    last_clear_was_tetris: bool,
    soft_drop_points: u64,
    hard_drop_points: u64,
    history: VecDeque<ScoreHistoryEntry>,

    lost: bool,
    events: Vec<EngineEvent>,
    rng: StdRng,
}

impl BoardEngine {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic piece sequence, used by tests and replays.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(mut rng: StdRng) -> Self {
        let (current, next_queue) = Self::deal(&mut rng);
        Self {
            board: Board::new(),
            current,
            next_queue,
            hold: None,
            hold_used: false,
            score: 0,
            level: 1,
            total_lines_cleared: 0,
            combo: 0,
            last_clear_was_tetris: false,
            soft_drop_points: 0,
            hard_drop_points: 0,
            history: VecDeque::new(),
            lost: false,
            events: Vec::new(),
            rng,
        }
    }

    fn deal(rng: &mut StdRng) -> (Piece, VecDeque<Piece>) {
        let mut queue: VecDeque<Piece> = (0..NEXT_QUEUE_LEN).map(|_| Piece::random(rng)).collect();
        let current = queue.pop_front().unwrap_or_else(|| Piece::random(rng));
        queue.push_back(Piece::random(rng));
        (current, queue)
    }

    /// Returns every counter, the board, queue and hold slot to their
    /// initial values. Score history survives so it can still be persisted.
    pub fn reset(&mut self) {
        let (current, next_queue) = Self::deal(&mut self.rng);
        self.board = Board::new();
        self.current = current;
        self.next_queue = next_queue;
        self.hold = None;
        self.hold_used = false;
        self.score = 0;
        self.level = 1;
        self.total_lines_cleared = 0;
        self.combo = 0;
        self.last_clear_was_tetris = false;
        self.soft_drop_points = 0;
        self.hard_drop_points = 0;
        self.lost = false;
        self.events.clear();
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn current_piece(&self) -> &Piece {
        &self.current
    }

    pub fn next_queue(&self) -> &VecDeque<Piece> {
        &self.next_queue
    }

    pub fn held_piece(&self) -> Option<&Piece> {
        self.hold.as_ref()
    }

    pub fn hold_used(&self) -> bool {
        self.hold_used
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn total_lines_cleared(&self) -> u32 {
        self.total_lines_cleared
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn back_to_back(&self) -> bool {
        self.last_clear_was_tetris
    }

    pub fn pending_soft_drop_points(&self) -> u64 {
        self.soft_drop_points
    }

    pub fn pending_hard_drop_points(&self) -> u64 {
        self.hard_drop_points
    }

    /// Score history, newest first.
    pub fn history(&self) -> &VecDeque<ScoreHistoryEntry> {
        &self.history
    }

    /// Hands over the recorded history, newest first, leaving it empty.
    pub fn take_history(&mut self) -> Vec<ScoreHistoryEntry> {
        self.history.drain(..).collect()
    }

    pub fn is_lost(&self) -> bool {
        self.lost
    }

    pub fn multiplier(&self) -> f64 {
        1.0 + f64::from(self.level - 1) * 0.1
    }

    pub fn gravity_delay(&self) -> Duration {
        gravity_delay(self.level)
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    /// The render state shipped to the opponent.
    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            board: self.board.clone(),
            current_piece: self.current.clone(),
        }
    }

    /// Translates the current piece; reverts and returns false on collision.
    pub fn move_piece(&mut self, dx: i32, dy: i32) -> bool {
        if self.lost {
            return false;
        }
        self.current.x += dx;
        self.current.y += dy;
        if collides(&self.board, &self.current) {
            self.current.x -= dx;
            self.current.y -= dy;
            return false;
        }
        true
    }

    /// Player-initiated one-row descent worth one pending point.
    pub fn soft_drop(&mut self) -> bool {
        if self.move_piece(0, 1) {
            self.soft_drop_points += 1;
            true
        } else {
            false
        }
    }

    /// Rotates clockwise, rejecting the rotation wholesale on collision.
    pub fn rotate(&mut self) -> bool {
        if self.lost {
            return false;
        }
        let rotated = rotate(&self.current.shape);
        let previous = std::mem::replace(&mut self.current.shape, rotated);
        if collides(&self.board, &self.current) {
            self.current.shape = previous;
            return false;
        }
        true
    }

    /// Drops to the first collision, then freezes. Each cell is a player
    /// soft drop, so it banks one soft point plus two hard-drop points.
    pub fn hard_drop(&mut self) -> Option<FreezeOutcome> {
        if self.lost {
            return None;
        }
        let mut distance = 0;
        while self.soft_drop() {
            distance += 1;
        }
        self.hard_drop_points += distance * HARD_DROP_POINTS_PER_CELL;
        Some(self.freeze())
    }

    /// Sets the current piece aside, once per placement. The first hold draws
    /// the replacement from the next-queue, later holds swap with the slot.
    pub fn hold(&mut self) -> bool {
        if self.lost || self.hold_used {
            return false;
        }
        self.hold_used = true;
        let replacement = match self.hold.take() {
            Some(held) => held,
            None => self.pop_next(),
        };
        self.hold = Some(std::mem::replace(&mut self.current, replacement));
        self.current.reset_position();
        if let Some(held) = self.hold.as_mut() {
            held.reset_position();
        }
        true
    }

    /// One gravity step. Freezes when the piece can't move down.
    pub fn tick(&mut self) -> Option<FreezeOutcome> {
        if self.lost || self.move_piece(0, 1) {
            return None;
        }
        Some(self.freeze())
    }

    /// Commits the current piece, clears lines and spawns the next piece.
    pub fn freeze(&mut self) -> FreezeOutcome {
        let color = self.current.color;
        let cells: Vec<(i32, i32)> = self.current.cells().collect();
        for (x, y) in cells {
            if (0..ROWS as i32).contains(&y) {
                self.board.set(x as usize, y as usize, Some(color));
            }
        }

        let score_before = self.score;
        let lines_cleared = self.clear_lines();

        self.current = self.pop_next();
        self.hold_used = false;

        let topped_out = collides(&self.board, &self.current);
        if topped_out {
            debug!("Spawned piece collides, game lost at score {}", self.score);
            self.lost = true;
            self.events.push(EngineEvent::Lost);
        }

        FreezeOutcome {
            lines_cleared,
            score_gained: self.score - score_before,
            topped_out,
        }
    }

    /// Removes full rows and applies the scoring rules. Returns the number of
    /// rows removed.
    pub fn clear_lines(&mut self) -> usize {
        let lines_cleared = self.board.clear_full_rows();

        self.total_lines_cleared += lines_cleared as u32;
        self.level = self.total_lines_cleared / LINES_PER_LEVEL + 1;
        let multiplier = self.multiplier();

        if lines_cleared > 0 {
            let mut score_gained = 0.0;
            if lines_cleared == 4 {
                if self.last_clear_was_tetris {
                    score_gained += BACK_TO_BACK_BONUS * multiplier;
                }
                self.last_clear_was_tetris = true;
            } else {
                self.last_clear_was_tetris = false;
            }

            if self.combo > 0 {
                score_gained += COMBO_BONUS * f64::from(self.combo) * multiplier;
            }
            self.combo += 1;

            self.score += score_gained as u64;
        } else {
            self.combo = 0;
            self.last_clear_was_tetris = false;
        }

        self.score += (self.soft_drop_points as f64 * multiplier) as u64;
        self.score += (self.hard_drop_points as f64 * multiplier) as u64;
        self.soft_drop_points = 0;
        self.hard_drop_points = 0;

        self.history.push_front(ScoreHistoryEntry::now(self.score));
        self.events.push(EngineEvent::ScoreChanged {
            score: self.score,
            level: self.level,
        });

        lines_cleared
    }

    /// Pops the head of the next-queue at spawn position and refills the tail.
    fn pop_next(&mut self) -> Piece {
        let mut piece = self
            .next_queue
            .pop_front()
            .unwrap_or_else(|| Piece::random(&mut self.rng));
        piece.reset_position();
        self.next_queue.push_back(Piece::random(&mut self.rng));
        piece
    }
}

impl Default for BoardEngine {
    fn default() -> Self {
        Self::new()
    }
}
