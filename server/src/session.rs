//! Connected-peer bookkeeping for the match server
//!
//! The registry holds every connected peer together with its readiness, the
//! lobby display ordering and pending rematch requests. These pieces refer to
//! each other (a lobby snapshot reads both the ordering and readiness, a
//! disconnect has to purge all three), so the registry is a single value that
//! callers guard with one lock. None of the raw containers are exposed.

use crate::readiness::ReadinessQueue;
use log::{info, warn};
use shared::{LobbyPlayer, ServerMessage};
use std::collections::HashMap;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::sync::mpsc;

pub type PeerId = u32;

/// Outbound half of a peer connection. Messages queued here are written to
/// the socket by that peer's writer task.
pub type PeerSender = mpsc::UnboundedSender<ServerMessage>;

#[derive(Debug)]
pub struct PeerRecord {
    pub id: PeerId,
    pub addr: SocketAddr,
    pub username: String,
    pub ready: bool,
    sender: PeerSender,
}

impl PeerRecord {
    /// Queues a message for this peer. A closed connection is logged and
    /// reported as false; it never affects delivery to anyone else.
    pub fn send(&self, message: ServerMessage) -> bool {
        let kind = message.kind();
        match self.sender.send(message) {
            Ok(()) => true,
            Err(_) => {
                warn!("Dropping {} for {}: connection closed", kind, self.username);
                false
            }
        }
    }
}

/// Reasons a peer is refused admission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Username must not be empty")]
    EmptyUsername,
    #[error("Username {0} is already taken")]
    DuplicateUsername(String),
    #[error("Server full ({0} players)")]
    Full(usize),
}

pub struct SessionRegistry {
    /// Connected peers in join order
    peers: Vec<PeerRecord>,
    readiness: ReadinessQueue,
    /// Requester -> opponent
    rematch_requests: HashMap<PeerId, PeerId>,
    next_peer_id: PeerId,
    max_peers: usize,
}

impl SessionRegistry {
    pub fn new(max_peers: usize) -> Self {
        Self {
            peers: Vec::new(),
            readiness: ReadinessQueue::new(),
            rematch_requests: HashMap::new(),
            next_peer_id: 1,
            max_peers,
        }
    }

    /// Registers a peer as not ready. Usernames must be non-empty and unique.
    pub fn add_peer(
        &mut self,
        addr: SocketAddr,
        username: &str,
        sender: PeerSender,
    ) -> Result<PeerId, RegistryError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(RegistryError::EmptyUsername);
        }
        if self.peers.iter().any(|peer| peer.username == username) {
            return Err(RegistryError::DuplicateUsername(username.to_string()));
        }
        if self.peers.len() >= self.max_peers {
            return Err(RegistryError::Full(self.max_peers));
        }

        let id = self.next_peer_id;
        self.next_peer_id += 1;

        info!("[{}] Registered from {} as peer {}", username, addr, id);
        self.peers.push(PeerRecord {
            id,
            addr,
            username: username.to_string(),
            ready: false,
            sender,
        });
        self.readiness.upsert(username, false);
        Ok(id)
    }

    /// Removes the peer, its lobby entry and every rematch request that
    /// mentions it.
    pub fn remove_peer(&mut self, id: PeerId) -> Option<PeerRecord> {
        let index = self.peers.iter().position(|peer| peer.id == id)?;
        let peer = self.peers.remove(index);
        self.readiness.remove(&peer.username);
        self.rematch_requests
            .retain(|requester, opponent| *requester != id && *opponent != id);
        info!("[{}] Removed from registry", peer.username);
        Some(peer)
    }

    /// Updates readiness and re-ranks the lobby entry. Returns false for an
    /// unknown peer.
    pub fn set_ready(&mut self, id: PeerId, ready: bool) -> bool {
        let Some(peer) = self.peers.iter_mut().find(|peer| peer.id == id) else {
            return false;
        };
        peer.ready = ready;
        self.readiness.upsert(&peer.username, ready);
        true
    }

    /// Lobby list in display order.
    pub fn snapshot_lobby(&self) -> Vec<LobbyPlayer> {
        self.readiness
            .ordered()
            .into_iter()
            .map(|entry| LobbyPlayer {
                ready: self
                    .peers
                    .iter()
                    .find(|peer| peer.username == entry.username)
                    .is_some_and(|peer| peer.ready),
                name: entry.username,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn all_ready(&self) -> bool {
        !self.peers.is_empty() && self.peers.iter().all(|peer| peer.ready)
    }

    pub fn peer(&self, id: PeerId) -> Option<&PeerRecord> {
        self.peers.iter().find(|peer| peer.id == id)
    }

    pub fn username(&self, id: PeerId) -> Option<&str> {
        self.peer(id).map(|peer| peer.username.as_str())
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.peers.iter().map(|peer| peer.id).collect()
    }

    /// Every connected peer except `id`.
    pub fn others(&self, id: PeerId) -> impl Iterator<Item = &PeerRecord> {
        self.peers.iter().filter(move |peer| peer.id != id)
    }

    pub fn send_to(&self, id: PeerId, message: ServerMessage) -> bool {
        match self.peer(id) {
            Some(peer) => peer.send(message),
            None => false,
        }
    }

    /// Sends to every peer except `exclude`. Returns how many accepted it.
    pub fn broadcast(&self, message: &ServerMessage, exclude: Option<PeerId>) -> usize {
        self.peers
            .iter()
            .filter(|peer| Some(peer.id) != exclude)
            .filter(|peer| peer.send(message.clone()))
            .count()
    }

    pub fn record_rematch_request(&mut self, requester: PeerId, opponent: PeerId) {
        self.rematch_requests.insert(requester, opponent);
    }

    pub fn pending_rematch(&self, requester: PeerId) -> Option<PeerId> {
        self.rematch_requests.get(&requester).copied()
    }

    /// Drops pending requests made by either member of the pair.
    pub fn clear_rematch_requests(&mut self, a: PeerId, b: PeerId) {
        self.rematch_requests.remove(&a);
        self.rematch_requests.remove(&b);
    }

    pub fn has_pending_rematch(&self) -> bool {
        !self.rematch_requests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:5555".parse().unwrap()
    }

    fn channel() -> (PeerSender, mpsc::UnboundedReceiver<ServerMessage>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn test_add_peer_assigns_increasing_ids() {
        let mut registry = SessionRegistry::new(2);
        let a = registry.add_peer(test_addr(), "A", channel().0).unwrap();
        let b = registry.add_peer(test_addr(), "B", channel().0).unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_add_peer_rejects_duplicate_username() {
        let mut registry = SessionRegistry::new(4);
        registry.add_peer(test_addr(), "A", channel().0).unwrap();
        let err = registry.add_peer(test_addr(), "A", channel().0).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateUsername("A".to_string()));
        assert_eq!(err.to_string(), "Username A is already taken");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_add_peer_rejects_empty_username() {
        let mut registry = SessionRegistry::new(2);
        let err = registry.add_peer(test_addr(), "   ", channel().0).unwrap_err();
        assert_eq!(err, RegistryError::EmptyUsername);
        assert_eq!(err.to_string(), "Username must not be empty");
    }

    #[test]
    fn test_add_peer_enforces_capacity() {
        let mut registry = SessionRegistry::new(1);
        registry.add_peer(test_addr(), "A", channel().0).unwrap();
        let err = registry.add_peer(test_addr(), "B", channel().0).unwrap_err();
        assert_eq!(err, RegistryError::Full(1));
        assert_eq!(err.to_string(), "Server full (1 players)");
    }

    #[test]
    fn test_lobby_snapshot_tracks_readiness() {
        let mut registry = SessionRegistry::new(2);
        let a = registry.add_peer(test_addr(), "A", channel().0).unwrap();
        let b = registry.add_peer(test_addr(), "B", channel().0).unwrap();

        registry.set_ready(a, true);
        let lobby = registry.snapshot_lobby();
        assert_eq!(
            lobby,
            vec![
                LobbyPlayer { name: "B".to_string(), ready: false },
                LobbyPlayer { name: "A".to_string(), ready: true },
            ]
        );

        registry.set_ready(b, true);
        registry.set_ready(a, false);
        let lobby = registry.snapshot_lobby();
        assert_eq!(lobby[0], LobbyPlayer { name: "A".to_string(), ready: false });
        assert_eq!(lobby[1], LobbyPlayer { name: "B".to_string(), ready: true });
    }

    #[test]
    fn test_set_ready_unknown_peer() {
        let mut registry = SessionRegistry::new(2);
        assert!(!registry.set_ready(42, true));
    }

    #[test]
    fn test_all_ready() {
        let mut registry = SessionRegistry::new(2);
        assert!(!registry.all_ready());
        let a = registry.add_peer(test_addr(), "A", channel().0).unwrap();
        let b = registry.add_peer(test_addr(), "B", channel().0).unwrap();
        registry.set_ready(a, true);
        assert!(!registry.all_ready());
        registry.set_ready(b, true);
        assert!(registry.all_ready());
    }

    #[test]
    fn test_remove_peer_purges_lobby_and_rematch_entries() {
        let mut registry = SessionRegistry::new(2);
        let a = registry.add_peer(test_addr(), "A", channel().0).unwrap();
        let b = registry.add_peer(test_addr(), "B", channel().0).unwrap();
        registry.record_rematch_request(b, a);

        let removed = registry.remove_peer(a).unwrap();
        assert_eq!(removed.username, "A");
        assert_eq!(registry.len(), 1);
        assert!(!registry.has_pending_rematch());
        assert_eq!(registry.snapshot_lobby().len(), 1);
        assert_eq!(registry.snapshot_lobby()[0].name, "B");
        assert!(registry.remove_peer(a).is_none());
    }

    #[test]
    fn test_broadcast_skips_excluded_peer() {
        let mut registry = SessionRegistry::new(3);
        let (tx_a, mut rx_a) = channel();
        let (tx_b, mut rx_b) = channel();
        let a = registry.add_peer(test_addr(), "A", tx_a).unwrap();
        registry.add_peer(test_addr(), "B", tx_b).unwrap();

        let delivered = registry.broadcast(&ServerMessage::Start, Some(a));
        assert_eq!(delivered, 1);
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), ServerMessage::Start);
    }

    #[test]
    fn test_broadcast_survives_closed_connection() {
        let mut registry = SessionRegistry::new(3);
        let (tx_a, rx_a) = channel();
        let (tx_b, mut rx_b) = channel();
        registry.add_peer(test_addr(), "A", tx_a).unwrap();
        registry.add_peer(test_addr(), "B", tx_b).unwrap();
        drop(rx_a);

        let delivered = registry.broadcast(&ServerMessage::Start, None);
        assert_eq!(delivered, 1);
        assert_eq!(rx_b.try_recv().unwrap(), ServerMessage::Start);
    }

    #[test]
    fn test_rematch_requests() {
        let mut registry = SessionRegistry::new(2);
        let a = registry.add_peer(test_addr(), "A", channel().0).unwrap();
        let b = registry.add_peer(test_addr(), "B", channel().0).unwrap();

        registry.record_rematch_request(a, b);
        assert_eq!(registry.pending_rematch(a), Some(b));
        registry.clear_rematch_requests(b, a);
        assert_eq!(registry.pending_rematch(a), None);
    }

    #[test]
    fn test_others_excludes_self() {
        let mut registry = SessionRegistry::new(2);
        let a = registry.add_peer(test_addr(), "A", channel().0).unwrap();
        registry.add_peer(test_addr(), "B", channel().0).unwrap();
        let others: Vec<&str> = registry.others(a).map(|p| p.username.as_str()).collect();
        assert_eq!(others, vec!["B"]);
    }
}
