//! Match state machine shared by every connection handler
//!
//! All registry access, the match phase and the current pairing sit behind a
//! single `tokio::sync::Mutex`. Handlers take the lock once per inbound
//! message, so a transition such as "both ready -> start" is evaluated and
//! announced without another connection interleaving. Sends only enqueue onto
//! per-peer channels, so holding the lock while sending never blocks on a
//! socket.

use crate::session::{PeerId, PeerSender, RegistryError, SessionRegistry};
use log::{debug, info, warn};
use shared::{ClientMessage, GameResult, LobbyPlayer, ServerMessage};
use std::net::SocketAddr;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Lobby,
    Playing,
    GameOver,
    RematchPending,
}

/// The two peers of the current match, fixed when the match starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pairing {
    players: [PeerId; 2],
}

impl Pairing {
    pub fn new(a: PeerId, b: PeerId) -> Self {
        Self { players: [a, b] }
    }

    pub fn players(&self) -> [PeerId; 2] {
        self.players
    }

    pub fn contains(&self, id: PeerId) -> bool {
        self.players.contains(&id)
    }

    /// The opponent of `id`, or None if `id` is not in this pairing.
    pub fn other(&self, id: PeerId) -> Option<PeerId> {
        match self.players {
            [a, b] if a == id => Some(b),
            [a, b] if b == id => Some(a),
            _ => None,
        }
    }
}

struct Room {
    registry: SessionRegistry,
    phase: MatchPhase,
    pairing: Option<Pairing>,
}

impl Room {
    fn broadcast_lobby(&self) {
        let players = self.registry.snapshot_lobby();
        self.registry
            .broadcast(&ServerMessage::Lobby { players }, None);
    }

    /// Starts a match when exactly two peers are connected and both are ready.
    fn try_start(&mut self) {
        if self.phase != MatchPhase::Lobby || self.registry.len() != 2 || !self.registry.all_ready()
        {
            return;
        }
        let ids = self.registry.peer_ids();
        let pairing = Pairing::new(ids[0], ids[1]);
        self.start(pairing);
    }

    fn start(&mut self, pairing: Pairing) {
        self.pairing = Some(pairing);
        self.phase = MatchPhase::Playing;
        for id in pairing.players() {
            self.registry.send_to(id, ServerMessage::Start);
        }
        info!(
            "Match started: {} vs {}",
            self.display_name(pairing.players[0]),
            self.display_name(pairing.players[1])
        );
    }

    /// Opponent of `id` in the current pairing, if still connected.
    fn opponent(&self, id: PeerId) -> Option<PeerId> {
        self.pairing
            .and_then(|pairing| pairing.other(id))
            .filter(|other| self.registry.peer(*other).is_some())
    }

    fn relay_to_opponent(&self, from: PeerId, message: ServerMessage) {
        match self.opponent(from) {
            Some(other) => {
                self.registry.send_to(other, message);
            }
            None => debug!(
                "No opponent to relay {} from {}",
                message.kind(),
                self.display_name(from)
            ),
        }
    }

    fn display_name(&self, id: PeerId) -> String {
        self.registry
            .username(id)
            .map_or_else(|| format!("peer {}", id), str::to_string)
    }

    fn handle_lose(&mut self, loser: PeerId) {
        if self.phase != MatchPhase::Playing {
            debug!(
                "Ignoring lose from {} in phase {:?}",
                self.display_name(loser),
                self.phase
            );
            return;
        }

        match self.opponent(loser) {
            Some(winner) => {
                let winner_name = self.display_name(winner);
                self.registry.send_to(
                    loser,
                    ServerMessage::GameOver {
                        result: GameResult::Lose,
                        winner: Some(winner_name.clone()),
                    },
                );
                self.registry.send_to(
                    winner,
                    ServerMessage::GameOver {
                        result: GameResult::Win,
                        winner: Some(winner_name.clone()),
                    },
                );
                info!("Game over: {} beat {}", winner_name, self.display_name(loser));
            }
            None => {
                warn!(
                    "Game over for {} without a connected opponent",
                    self.display_name(loser)
                );
                self.registry.send_to(
                    loser,
                    ServerMessage::GameOver {
                        result: GameResult::Lose,
                        winner: None,
                    },
                );
            }
        }
        self.phase = MatchPhase::GameOver;
    }

    fn handle_rematch_request(&mut self, requester: PeerId) {
        if !matches!(self.phase, MatchPhase::GameOver | MatchPhase::RematchPending) {
            debug!(
                "Ignoring rematch request from {} in phase {:?}",
                self.display_name(requester),
                self.phase
            );
            return;
        }

        let Some(opponent) = self.opponent(requester) else {
            self.registry.send_to(
                requester,
                ServerMessage::system("No opponent available for a rematch."),
            );
            return;
        };

        let from = self.display_name(requester);
        self.registry
            .send_to(opponent, ServerMessage::RematchRequest { from: from.clone() });
        self.registry.record_rematch_request(requester, opponent);
        self.phase = MatchPhase::RematchPending;
        info!("{} requested a rematch", from);
    }

    fn handle_rematch_accepted(&mut self, accepter: PeerId) {
        if self.phase != MatchPhase::RematchPending {
            debug!(
                "Ignoring rematch acceptance from {} in phase {:?}",
                self.display_name(accepter),
                self.phase
            );
            return;
        }
        let Some(opponent) = self.opponent(accepter) else {
            return;
        };
        let pending = self.registry.pending_rematch(opponent) == Some(accepter)
            || self.registry.pending_rematch(accepter) == Some(opponent);
        if !pending {
            debug!("No pending rematch for {}", self.display_name(accepter));
            return;
        }

        self.registry.clear_rematch_requests(accepter, opponent);
        for id in [accepter, opponent] {
            self.registry.send_to(id, ServerMessage::RematchAccepted);
        }
        self.phase = MatchPhase::Lobby;
        info!("Rematch accepted by {}", self.display_name(accepter));
        self.start(Pairing::new(accepter, opponent));
    }
}

/// Owns the room and applies every inbound event to it.
pub struct MatchOrchestrator {
    room: Mutex<Room>,
}

impl MatchOrchestrator {
    pub fn new(max_peers: usize) -> Self {
        Self {
            room: Mutex::new(Room {
                registry: SessionRegistry::new(max_peers),
                phase: MatchPhase::Lobby,
                pairing: None,
            }),
        }
    }

    /// Admits a peer and rebroadcasts the lobby. A refused peer is told why
    /// through `sender` before the error is returned.
    pub async fn connect(
        &self,
        addr: SocketAddr,
        username: &str,
        sender: PeerSender,
    ) -> Result<PeerId, RegistryError> {
        let mut room = self.room.lock().await;
        match room.registry.add_peer(addr, username, sender.clone()) {
            Ok(id) => {
                info!("[{}] Connected from {}", username.trim(), addr);
                room.broadcast_lobby();
                Ok(id)
            }
            Err(e) => {
                warn!("Rejected {} ({:?}): {}", addr, username, e);
                if sender.send(ServerMessage::system(e.to_string())).is_err() {
                    warn!("Could not notify {}: connection closed", addr);
                }
                Err(e)
            }
        }
    }

    pub async fn handle_message(&self, id: PeerId, message: ClientMessage) {
        let mut room = self.room.lock().await;
        if room.registry.peer(id).is_none() {
            warn!("Message {} from unregistered peer {}", message.kind(), id);
            return;
        }
        debug!("[{}] Received {}", room.display_name(id), message.kind());

        match message {
            ClientMessage::RequestLobby => room.broadcast_lobby(),
            ClientMessage::Ready { ready } => {
                room.registry.set_ready(id, ready);
                room.broadcast_lobby();
                room.try_start();
            }
            ClientMessage::Score { value, level } => {
                if room.phase == MatchPhase::Playing {
                    room.relay_to_opponent(
                        id,
                        ServerMessage::Score {
                            value,
                            level: Some(level),
                        },
                    );
                }
            }
            ClientMessage::Board(snapshot) => {
                if room.phase == MatchPhase::Playing {
                    room.relay_to_opponent(id, ServerMessage::Board(snapshot));
                }
            }
            ClientMessage::Chat { message, .. } => {
                let from = room.display_name(id);
                room.registry
                    .broadcast(&ServerMessage::Chat { from, message }, Some(id));
            }
            ClientMessage::Lose => room.handle_lose(id),
            ClientMessage::RematchRequest => room.handle_rematch_request(id),
            ClientMessage::RematchAccepted => room.handle_rematch_accepted(id),
        }
    }

    /// Removes the peer, notifies everyone left and rebroadcasts the lobby.
    /// A match involving the peer is abandoned.
    pub async fn disconnect(&self, id: PeerId) {
        let mut room = self.room.lock().await;
        let Some(peer) = room.registry.remove_peer(id) else {
            return;
        };
        info!("[{}] Disconnected ({})", peer.username, peer.addr);

        room.registry.broadcast(
            &ServerMessage::system(format!("Opponent {} has left the game.", peer.username)),
            None,
        );
        room.broadcast_lobby();

        if room.pairing.is_some_and(|pairing| pairing.contains(id)) {
            room.pairing = None;
            room.phase = MatchPhase::Lobby;
            info!("Match abandoned, back to lobby");
        }
    }

    pub async fn phase(&self) -> MatchPhase {
        self.room.lock().await.phase
    }

    pub async fn pairing(&self) -> Option<Pairing> {
        self.room.lock().await.pairing
    }

    pub async fn lobby(&self) -> Vec<LobbyPlayer> {
        self.room.lock().await.registry.snapshot_lobby()
    }

    pub async fn peer_count(&self) -> usize {
        self.room.lock().await.registry.len()
    }
}
