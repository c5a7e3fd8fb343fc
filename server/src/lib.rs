//! # Match Server Library
//!
//! Relay server for two-player falling-block matches. The server holds no
//! board state of its own: each client simulates its own board and the
//! server forwards snapshots, scores and chat between the two peers while
//! deciding when a match starts, who won and whether a rematch happens.
//!
//! ## Connection Lifecycle
//!
//! A peer opens a TCP stream and sends its username as the first line.
//! After admission every line is one JSON message (see `shared::protocol`).
//! A closed or failed read is the only disconnect signal; there is no
//! heartbeat and no timeout.
//!
//! ## Module Organization
//!
//! ### Readiness Module (`readiness`)
//! Display ordering for the lobby list: not-ready peers first, then by name.
//!
//! ### Session Module (`session`)
//! The registry of connected peers with their readiness, outbound channels
//! and pending rematch requests. Rejects empty or duplicate usernames and
//! peers beyond the configured capacity.
//!
//! ### Orchestrator Module (`orchestrator`)
//! The match state machine (`Lobby -> Playing -> GameOver -> RematchPending`)
//! and the single lock that serialises every registry access across
//! connection handlers.
//!
//! ### Network Module (`network`)
//! Accept loop plus one reader task and one writer task per connection.
//! Sends go through an unbounded channel per peer, so a slow or dead peer
//! never stalls delivery to the other one.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind("127.0.0.1:5555", 2).await?;
//!     server.run().await.map_err(|e| e.to_string())?;
//!     Ok(())
//! }
//! ```

pub mod network;
pub mod orchestrator;
pub mod readiness;
pub mod session;
