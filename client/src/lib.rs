//! # Match Client Library
//!
//! Headless terminal client for two-player falling-block matches. Each
//! client runs its own board simulation from `shared::BoardEngine` and keeps
//! the server informed: a board snapshot whenever the throttle allows, the
//! score after every freeze, and `lose` when its stack tops out. The server
//! relays the same information back about the opponent.
//!
//! ## Architecture Overview
//!
//! ### Single Owner of Game State
//! The server connection is read by a dedicated receiver task that only
//! decodes lines and queues them. The main loop owns the [`game::ClientGame`]
//! and drains that queue once per frame, so rendering and gravity never see
//! a half-applied update.
//!
//! ### Gravity
//! The falling piece drops one row every `max(50ms, 500ms - (level - 1) * 50ms)`.
//! Gravity never awards points; only player soft drops and hard drops do.
//!
//! ### Snapshot Throttling
//! Board snapshots go out at most every 100 ms and only when the board or
//! falling piece actually changed since the last one sent.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Lobby, playing and game-over phases, the opponent view, chat log and
//! rematch status. Translates engine events into protocol messages.
//!
//! ### Input Module (`input`)
//! Parses terminal lines into player actions and lobby commands.
//!
//! ### Network Module (`network`)
//! Connection setup, the receiver task and the main `select!` loop.
//!
//! ### Rendering Module (`rendering`)
//! The `Renderer` trait and a plain text implementation.
//!
//! ### Store Module (`store`)
//! Per-user score history persisted through a `ScoreStore`, file-backed with
//! bincode by default.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//! use client::rendering::TextRenderer;
//! use client::store::FileScoreStore;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::connect(
//!         "127.0.0.1:5555",
//!         "alice",
//!         Box::new(TextRenderer::stdout()),
//!         Box::new(FileScoreStore::new("playerscore.bin")),
//!     )
//!     .await?;
//!
//!     let (tx, rx) = mpsc::unbounded_channel();
//!     client::input::spawn_stdin_reader(tx);
//!     client.run(rx).await
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
pub mod store;
