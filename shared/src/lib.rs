//! # Shared Game Library
//!
//! Simulation and wire-protocol code used by both the match server and the
//! player client. Everything in here is transport agnostic: the server and
//! client crates own their sockets and tasks, this crate owns the rules.
//!
//! ## Module Organization
//!
//! - `piece`: piece shapes, clockwise rotation and collision testing
//! - `board`: the fixed ROWS x COLUMNS grid and full-row removal
//! - `engine`: per-player simulation (gravity, freeze, scoring, hold, queue)
//! - `error`: decode-time validation failures for boards and pieces
//! - `protocol`: the tagged message catalog exchanged over the stream
//! - `framing`: newline framing and the buffered inbound line decoder
//! - `throttle`: outbound board snapshot throttling
//!
//! The server never runs the simulation. It trusts whatever board and score
//! each peer reports and only relays it to the opponent.

pub mod board;
pub mod engine;
pub mod error;
pub mod framing;
pub mod piece;
pub mod protocol;
pub mod throttle;

use std::time::Duration;

pub use board::{Board, Cell};
pub use engine::{BoardEngine, EngineEvent, FreezeOutcome, ScoreHistoryEntry};
pub use error::SnapshotError;
pub use framing::{encode_line, encode_username, LineDecoder};
pub use piece::{Piece, PieceColor, Shape};
pub use protocol::{BoardSnapshot, ClientMessage, GameResult, LobbyPlayer, ServerMessage};
pub use throttle::SnapshotThrottle;

/// Board height in rows.
pub const ROWS: usize = 20;
/// Board width in columns.
pub const COLUMNS: usize = 10;
/// Number of upcoming pieces kept in the next-queue.
pub const NEXT_QUEUE_LEN: usize = 3;
/// Spawn column for every new, held or swapped piece.
pub const SPAWN_X: i32 = COLUMNS as i32 / 2 - 1;

/// Minimum spacing between two outbound board snapshots.
pub const SNAPSHOT_INTERVAL: Duration = Duration::from_millis(100);

pub const BASE_GRAVITY_MS: u64 = 500;
pub const MIN_GRAVITY_MS: u64 = 50;
pub const GRAVITY_STEP_MS: u64 = 50;

/// Default TCP port used by both binaries.
pub const DEFAULT_PORT: u16 = 5555;

/// Gravity delay for a level: `max(50ms, 500ms - (level - 1) * 50ms)`.
pub fn gravity_delay(level: u32) -> Duration {
    let reduction = u64::from(level.saturating_sub(1)) * GRAVITY_STEP_MS;
    Duration::from_millis(BASE_GRAVITY_MS.saturating_sub(reduction).max(MIN_GRAVITY_MS))
}
