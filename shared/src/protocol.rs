//! Message catalog
//!
//! Every message after the initial username line is a JSON object whose
//! `type` field names the variant, e.g. `{"type":"ready","ready":true}`.
//! `score`, `board`, `chat` and the rematch kinds exist in both directions
//! with slightly different fields, so each direction gets its own enum.

use crate::board::Board;
use crate::piece::Piece;
use serde::{Deserialize, Serialize};

/// Board plus falling piece: what the opponent needs to draw us.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub board: Board,
    pub current_piece: Piece,
}

/// One row of the lobby list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyPlayer {
    pub name: String,
    pub ready: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    Win,
    Lose,
}

/// Messages sent by a player to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    RequestLobby,
    Ready {
        ready: bool,
    },
    Score {
        value: u64,
        #[serde(default)]
        level: u32,
    },
    Board(BoardSnapshot),
    Chat {
        /// Ignored by the server, which stamps the registered username.
        #[serde(default)]
        from: String,
        message: String,
    },
    Lose,
    RematchRequest,
    RematchAccepted,
}

impl ClientMessage {
    /// Wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::RequestLobby => "request_lobby",
            ClientMessage::Ready { .. } => "ready",
            ClientMessage::Score { .. } => "score",
            ClientMessage::Board(_) => "board",
            ClientMessage::Chat { .. } => "chat",
            ClientMessage::Lose => "lose",
            ClientMessage::RematchRequest => "rematch_request",
            ClientMessage::RematchAccepted => "rematch_accepted",
        }
    }
}

/// Messages sent by the server to a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Lobby {
        players: Vec<LobbyPlayer>,
    },
    Start,
    Score {
        value: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        level: Option<u32>,
    },
    Board(BoardSnapshot),
    Chat {
        from: String,
        message: String,
    },
    System {
        message: String,
    },
    GameOver {
        result: GameResult,
        winner: Option<String>,
    },
    RematchRequest {
        from: String,
    },
    RematchAccepted,
}

impl ServerMessage {
    pub fn system(message: impl Into<String>) -> Self {
        ServerMessage::System {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Lobby { .. } => "lobby",
            ServerMessage::Start => "start",
            ServerMessage::Score { .. } => "score",
            ServerMessage::Board(_) => "board",
            ServerMessage::Chat { .. } => "chat",
            ServerMessage::System { .. } => "system",
            ServerMessage::GameOver { .. } => "game_over",
            ServerMessage::RematchRequest { .. } => "rematch_request",
            ServerMessage::RematchAccepted => "rematch_accepted",
        }
    }
}
