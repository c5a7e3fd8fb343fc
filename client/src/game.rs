//! Client-side match state
//!
//! `ClientGame` is owned by the client's main loop and is the only place
//! that mutates the local engine, the opponent view, the lobby list and the
//! chat log. Server messages reach it through the loop's inbound queue;
//! every method returns the messages that should go back to the server.

use crate::input::PlayerAction;
use log::{debug, info};
use shared::{
    BoardEngine, BoardSnapshot, ClientMessage, EngineEvent, GameResult, LobbyPlayer,
    ScoreHistoryEntry, ServerMessage, SnapshotThrottle,
};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Chat lines kept for display.
pub const CHAT_HISTORY_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    Lobby,
    Playing,
    GameOver(GameResult),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RematchStatus {
    Idle,
    /// We asked and are waiting for the opponent.
    Requested,
    /// The opponent asked us.
    Incoming { from: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub from: String,
    pub message: String,
}

/// Latest relayed state of the other player.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpponentView {
    pub name: Option<String>,
    pub snapshot: Option<BoardSnapshot>,
    pub score: u64,
    pub level: Option<u32>,
}

pub struct ClientGame {
    username: String,
    engine: BoardEngine,
    phase: ClientPhase,
    ready: bool,
    lobby: Vec<LobbyPlayer>,
    opponent: OpponentView,
    chat_log: VecDeque<ChatLine>,
    system_message: Option<String>,
    rematch: RematchStatus,
    throttle: SnapshotThrottle,
}

impl ClientGame {
    pub fn new(username: &str) -> Self {
        Self::with_engine(username, BoardEngine::new())
    }

    pub fn with_engine(username: &str, engine: BoardEngine) -> Self {
        Self {
            username: username.trim().to_string(),
            engine,
            phase: ClientPhase::Lobby,
            ready: false,
            lobby: Vec::new(),
            opponent: OpponentView::default(),
            chat_log: VecDeque::new(),
            system_message: None,
            rematch: RematchStatus::Idle,
            throttle: SnapshotThrottle::default(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn engine(&self) -> &BoardEngine {
        &self.engine
    }

    pub fn phase(&self) -> ClientPhase {
        self.phase
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn lobby(&self) -> &[LobbyPlayer] {
        &self.lobby
    }

    pub fn opponent(&self) -> &OpponentView {
        &self.opponent
    }

    pub fn chat_log(&self) -> &VecDeque<ChatLine> {
        &self.chat_log
    }

    pub fn system_message(&self) -> Option<&str> {
        self.system_message.as_deref()
    }

    pub fn rematch_status(&self) -> &RematchStatus {
        &self.rematch
    }

    pub fn is_game_over(&self) -> bool {
        matches!(self.phase, ClientPhase::GameOver(_))
    }

    pub fn gravity_delay(&self) -> Duration {
        self.engine.gravity_delay()
    }

    /// Applies one inbound message and returns any replies.
    pub fn apply_server_message(&mut self, message: ServerMessage) -> Vec<ClientMessage> {
        debug!("Applying {}", message.kind());
        match message {
            ServerMessage::Lobby { players } => {
                if let Some(other) = players.iter().find(|p| p.name != self.username) {
                    self.opponent.name = Some(other.name.clone());
                }
                if let Some(me) = players.iter().find(|p| p.name == self.username) {
                    self.ready = me.ready;
                }
                self.lobby = players;
            }
            ServerMessage::Start => self.start_match(),
            ServerMessage::Score { value, level } => {
                self.opponent.score = value;
                self.opponent.level = level;
            }
            ServerMessage::Board(snapshot) => self.opponent.snapshot = Some(snapshot),
            ServerMessage::Chat { from, message } => self.push_chat(from, message),
            ServerMessage::System { message } => {
                info!("System: {}", message);
                self.system_message = Some(message);
            }
            ServerMessage::GameOver { result, winner } => {
                info!(
                    "Game over: {:?} (winner {})",
                    result,
                    winner.as_deref().unwrap_or("unknown")
                );
                self.phase = ClientPhase::GameOver(result);
                self.rematch = RematchStatus::Idle;
            }
            ServerMessage::RematchRequest { from } => {
                self.rematch = RematchStatus::Incoming { from };
            }
            ServerMessage::RematchAccepted => {
                self.engine.reset();
                self.throttle.reset();
                self.phase = ClientPhase::Lobby;
                self.rematch = RematchStatus::Idle;
                return vec![ClientMessage::RequestLobby];
            }
        }
        Vec::new()
    }

    fn start_match(&mut self) {
        self.engine.reset();
        self.throttle.reset();
        self.opponent.snapshot = None;
        self.opponent.score = 0;
        self.opponent.level = None;
        self.rematch = RematchStatus::Idle;
        self.phase = ClientPhase::Playing;
        info!("Match started");
    }

    fn push_chat(&mut self, from: String, message: String) {
        if self.chat_log.len() == CHAT_HISTORY_LEN {
            self.chat_log.pop_front();
        }
        self.chat_log.push_back(ChatLine { from, message });
    }

    /// Applies a player action while a match is running.
    pub fn handle_action(&mut self, action: PlayerAction, now: Instant) -> Vec<ClientMessage> {
        if self.phase != ClientPhase::Playing {
            return Vec::new();
        }
        match action {
            PlayerAction::MoveLeft => {
                self.engine.move_piece(-1, 0);
            }
            PlayerAction::MoveRight => {
                self.engine.move_piece(1, 0);
            }
            PlayerAction::SoftDrop => {
                self.engine.soft_drop();
            }
            PlayerAction::Rotate => {
                self.engine.rotate();
            }
            PlayerAction::HardDrop => {
                self.engine.hard_drop();
            }
            PlayerAction::Hold => {
                self.engine.hold();
            }
        }
        self.collect_outbound(now)
    }

    /// One gravity step.
    pub fn tick(&mut self, now: Instant) -> Vec<ClientMessage> {
        if self.phase != ClientPhase::Playing {
            return Vec::new();
        }
        self.engine.tick();
        self.collect_outbound(now)
    }

    /// Turns engine events into protocol messages, then appends a board
    /// snapshot if the throttle lets one through.
    fn collect_outbound(&mut self, now: Instant) -> Vec<ClientMessage> {
        let mut outbound = Vec::new();
        for event in self.engine.drain_events() {
            match event {
                EngineEvent::ScoreChanged { score, level } => {
                    outbound.push(ClientMessage::Score { value: score, level });
                }
                EngineEvent::Lost => {
                    info!("Topped out at {}", self.engine.score());
                    self.phase = ClientPhase::GameOver(GameResult::Lose);
                    outbound.push(ClientMessage::Lose);
                }
            }
        }

        let snapshot = self.engine.snapshot();
        if self.throttle.should_send(now, &snapshot) {
            outbound.insert(0, ClientMessage::Board(snapshot));
        }
        outbound
    }

    pub fn toggle_ready(&mut self) -> ClientMessage {
        self.ready = !self.ready;
        ClientMessage::Ready { ready: self.ready }
    }

    pub fn chat(&mut self, message: &str) -> Option<ClientMessage> {
        let message = message.trim();
        if message.is_empty() {
            return None;
        }
        self.push_chat(self.username.clone(), message.to_string());
        Some(ClientMessage::Chat {
            from: self.username.clone(),
            message: message.to_string(),
        })
    }

    pub fn request_rematch(&mut self) -> Option<ClientMessage> {
        if !self.is_game_over() || self.rematch != RematchStatus::Idle {
            return None;
        }
        self.rematch = RematchStatus::Requested;
        Some(ClientMessage::RematchRequest)
    }

    pub fn accept_rematch(&mut self) -> Option<ClientMessage> {
        match self.rematch {
            RematchStatus::Incoming { .. } => {
                self.rematch = RematchStatus::Idle;
                Some(ClientMessage::RematchAccepted)
            }
            _ => None,
        }
    }

    /// Declining is local only: the request is dismissed without telling the
    /// server.
    pub fn decline_rematch(&mut self) {
        if matches!(self.rematch, RematchStatus::Incoming { .. }) {
            self.rematch = RematchStatus::Idle;
        }
    }

    /// Score history recorded since the last call, newest first.
    pub fn take_history(&mut self) -> Vec<ScoreHistoryEntry> {
        self.engine.take_history()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Board, Piece, PieceColor, Shape};

    fn playing_game() -> ClientGame {
        let mut game = ClientGame::with_engine("alice", BoardEngine::with_seed(3));
        game.apply_server_message(ServerMessage::Start);
        game
    }

    fn lobby(entries: &[(&str, bool)]) -> ServerMessage {
        ServerMessage::Lobby {
            players: entries
                .iter()
                .map(|(name, ready)| LobbyPlayer {
                    name: name.to_string(),
                    ready: *ready,
                })
                .collect(),
        }
    }

    #[test]
    fn test_lobby_sets_opponent_and_ready_flag() {
        let mut game = ClientGame::with_engine("alice", BoardEngine::with_seed(1));
        game.apply_server_message(lobby(&[("bob", false), ("alice", true)]));
        assert_eq!(game.opponent().name.as_deref(), Some("bob"));
        assert!(game.is_ready());
        assert_eq!(game.lobby().len(), 2);
    }

    #[test]
    fn test_start_enters_playing() {
        let game = playing_game();
        assert_eq!(game.phase(), ClientPhase::Playing);
    }

    #[test]
    fn test_actions_ignored_outside_play() {
        let mut game = ClientGame::with_engine("alice", BoardEngine::with_seed(1));
        let x = game.engine().current_piece().x;
        assert!(game
            .handle_action(PlayerAction::MoveLeft, Instant::now())
            .is_empty());
        assert_eq!(game.engine().current_piece().x, x);
    }

    #[test]
    fn test_first_action_sends_board_then_throttles() {
        let mut game = playing_game();
        let start = Instant::now();

        let first = game.handle_action(PlayerAction::MoveLeft, start);
        assert!(matches!(first.as_slice(), [ClientMessage::Board(_)]));

        let second = game.handle_action(PlayerAction::MoveRight, start + Duration::from_millis(50));
        assert!(second.is_empty());
    }

    #[test]
    fn test_hard_drop_reports_score() {
        let mut game = playing_game();
        let outbound = game.handle_action(PlayerAction::HardDrop, Instant::now());
        let score = game.engine().score();
        assert!(score > 0);
        assert!(outbound.contains(&ClientMessage::Score {
            value: score,
            level: 1
        }));
    }

    #[test]
    fn test_top_out_sends_lose() {
        let mut game = playing_game();
        let mut outbound = Vec::new();
        for _ in 0..200 {
            if game.is_game_over() {
                break;
            }
            outbound.extend(game.handle_action(PlayerAction::HardDrop, Instant::now()));
        }
        assert_eq!(game.phase(), ClientPhase::GameOver(GameResult::Lose));
        assert_eq!(
            outbound.iter().filter(|m| **m == ClientMessage::Lose).count(),
            1
        );
        assert!(game
            .handle_action(PlayerAction::HardDrop, Instant::now())
            .is_empty());
    }

    #[test]
    fn test_opponent_updates() {
        let mut game = playing_game();
        let snapshot = BoardSnapshot {
            board: Board::new(),
            current_piece: Piece::new(Shape::from_bits(&[&[1, 1], &[1, 1]]), PieceColor::Yellow),
        };
        game.apply_server_message(ServerMessage::Board(snapshot.clone()));
        game.apply_server_message(ServerMessage::Score {
            value: 120,
            level: Some(2),
        });
        assert_eq!(game.opponent().snapshot, Some(snapshot));
        assert_eq!(game.opponent().score, 120);
        assert_eq!(game.opponent().level, Some(2));
    }

    #[test]
    fn test_chat_log_is_bounded() {
        let mut game = playing_game();
        for i in 0..(CHAT_HISTORY_LEN + 5) {
            game.apply_server_message(ServerMessage::Chat {
                from: "bob".to_string(),
                message: format!("line {}", i),
            });
        }
        assert_eq!(game.chat_log().len(), CHAT_HISTORY_LEN);
        assert_eq!(game.chat_log().front().map(|l| l.message.as_str()), Some("line 5"));
    }

    #[test]
    fn test_outgoing_chat_echoes_locally() {
        let mut game = playing_game();
        let message = game.chat(" gg ").unwrap();
        assert_eq!(
            message,
            ClientMessage::Chat {
                from: "alice".to_string(),
                message: "gg".to_string()
            }
        );
        assert_eq!(game.chat_log().len(), 1);
        assert!(game.chat("   ").is_none());
    }

    #[test]
    fn test_rematch_flow() {
        let mut game = playing_game();
        assert!(game.request_rematch().is_none());

        game.apply_server_message(ServerMessage::GameOver {
            result: GameResult::Win,
            winner: Some("alice".to_string()),
        });
        assert_eq!(game.phase(), ClientPhase::GameOver(GameResult::Win));
        assert_eq!(game.request_rematch(), Some(ClientMessage::RematchRequest));
        assert_eq!(game.rematch_status(), &RematchStatus::Requested);

        let replies = game.apply_server_message(ServerMessage::RematchAccepted);
        assert_eq!(replies, vec![ClientMessage::RequestLobby]);
        assert_eq!(game.phase(), ClientPhase::Lobby);
        assert_eq!(game.engine().score(), 0);

        game.apply_server_message(ServerMessage::Start);
        assert_eq!(game.phase(), ClientPhase::Playing);
    }

    #[test]
    fn test_incoming_rematch_accept_and_decline() {
        let mut game = playing_game();
        game.apply_server_message(ServerMessage::GameOver {
            result: GameResult::Lose,
            winner: Some("bob".to_string()),
        });
        assert!(game.accept_rematch().is_none());

        game.apply_server_message(ServerMessage::RematchRequest {
            from: "bob".to_string(),
        });
        game.decline_rematch();
        assert_eq!(game.rematch_status(), &RematchStatus::Idle);

        game.apply_server_message(ServerMessage::RematchRequest {
            from: "bob".to_string(),
        });
        assert_eq!(game.accept_rematch(), Some(ClientMessage::RematchAccepted));
    }

    #[test]
    fn test_toggle_ready() {
        let mut game = ClientGame::new("alice");
        assert_eq!(game.toggle_ready(), ClientMessage::Ready { ready: true });
        assert_eq!(game.toggle_ready(), ClientMessage::Ready { ready: false });
    }

    #[test]
    fn test_system_message_kept() {
        let mut game = playing_game();
        game.apply_server_message(ServerMessage::system("Opponent bob has left the game."));
        assert_eq!(game.system_message(), Some("Opponent bob has left the game."));
    }
}
