//! Roster of connected clients
//!
//! This module tracks every open connection on the server:
//! - Player id assignment and the connection's peer address
//! - The outbound channel feeding each connection's writer task
//! - Which game, if any, the client currently plays in
//!
//! The roster also enforces the server's connection limit.

use log::{debug, info};
use shared::{GameId, Packet, PlayerId};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// A connected client
///
/// Packets pushed into `sender` are written to the socket by the
/// connection's writer task, so sending never blocks the caller.
#[derive(Debug)]
pub struct Client {
    pub id: PlayerId,
    pub addr: SocketAddr,
    /// Game the client has been seated in
    pub game: Option<GameId>,
    sender: mpsc::UnboundedSender<Packet>,
}

impl Client {
    pub fn new(id: PlayerId, addr: SocketAddr, sender: mpsc::UnboundedSender<Packet>) -> Self {
        Self {
            id,
            addr,
            game: None,
            sender,
        }
    }

    /// Queues a packet for this client
    ///
    /// Returns false once the connection's writer has gone away.
    pub fn send(&self, packet: Packet) -> bool {
        self.sender.send(packet).is_ok()
    }
}

/// All connected clients, keyed by their player id
pub struct ClientManager {
    clients: HashMap<PlayerId, Client>,
    next_client_id: u32,
    max_clients: usize,
}

impl ClientManager {
    /// Creates an empty roster; ids are handed out from 1 upwards
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a new connection
    ///
    /// Returns `None` if the server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr, sender: mpsc::UnboundedSender<Packet>) -> Option<PlayerId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let id = PlayerId(self.next_client_id);
        self.next_client_id += 1;

        info!("Client {} connected from {}", id, addr);
        self.clients.insert(id, Client::new(id, addr, sender));
        Some(id)
    }

    /// Drops a client and hands back its record
    pub fn remove_client(&mut self, id: PlayerId) -> Option<Client> {
        let client = self.clients.remove(&id)?;
        info!("Client {} disconnected", client.id);
        Some(client)
    }

    pub fn assign_game(&mut self, id: PlayerId, game: GameId) -> bool {
        match self.clients.get_mut(&id) {
            Some(client) => {
                client.game = Some(game);
                true
            }
            None => false,
        }
    }

    pub fn game_of(&self, id: PlayerId) -> Option<GameId> {
        self.clients.get(&id).and_then(|client| client.game)
    }

    /// Detaches every client from a game that has finished
    pub fn leave_game(&mut self, game: GameId) -> Vec<PlayerId> {
        let mut left = Vec::new();
        for client in self.clients.values_mut() {
            if client.game == Some(game) {
                client.game = None;
                left.push(client.id);
            }
        }
        left.sort_unstable();
        left
    }

    /// Sends a packet to one client; false if it is gone
    pub fn send_to(&self, id: PlayerId, packet: Packet) -> bool {
        match self.clients.get(&id) {
            Some(client) => client.send(packet),
            None => {
                debug!("Dropping packet for unknown client {}", id);
                false
            }
        }
    }

    /// Sends a packet to every client seated in a game
    pub fn broadcast_to_game(&self, game: GameId, packet: &Packet) -> usize {
        self.clients
            .values()
            .filter(|client| client.game == Some(game))
            .filter(|client| client.send(packet.clone()))
            .count()
    }

    /// Clients seated in a game, in id order
    pub fn members_of(&self, game: GameId) -> Vec<PlayerId> {
        let mut members: Vec<PlayerId> = self
            .clients
            .values()
            .filter(|client| client.game == Some(game))
            .map(|client| client.id)
            .collect();
        members.sort_unstable();
        members
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn channel() -> (mpsc::UnboundedSender<Packet>, mpsc::UnboundedReceiver<Packet>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn test_client_manager_creation() {
        let manager = ClientManager::new(5);
        assert_eq!(manager.max_clients, 5);
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_add_multiple_clients() {
        let mut manager = ClientManager::new(3);
        let (tx, _rx) = channel();

        let first = manager.add_client(test_addr(), tx.clone()).unwrap();
        let second = manager.add_client(test_addr2(), tx).unwrap();

        assert_eq!(first, PlayerId(1));
        assert_eq!(second, PlayerId(2));
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);
        let (tx, _rx) = channel();

        assert!(manager.add_client(test_addr(), tx.clone()).is_some());
        assert!(manager.add_client(test_addr2(), tx).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_client() {
        let mut manager = ClientManager::new(2);
        let (tx, _rx) = channel();
        let id = manager.add_client(test_addr(), tx).unwrap();
        manager.assign_game(id, GameId(4));

        let removed = manager.remove_client(id).unwrap();
        assert_eq!(removed.game, Some(GameId(4)));
        assert!(manager.is_empty());
        assert!(manager.remove_client(id).is_none());
    }

    #[test]
    fn test_game_membership() {
        let mut manager = ClientManager::new(3);
        let (tx, _rx) = channel();
        let a = manager.add_client(test_addr(), tx.clone()).unwrap();
        let b = manager.add_client(test_addr2(), tx.clone()).unwrap();
        let c = manager.add_client(test_addr(), tx).unwrap();

        assert!(manager.assign_game(a, GameId(1)));
        assert!(manager.assign_game(b, GameId(1)));
        assert!(manager.assign_game(c, GameId(2)));
        assert!(!manager.assign_game(PlayerId(99), GameId(1)));

        assert_eq!(manager.game_of(a), Some(GameId(1)));
        assert_eq!(manager.members_of(GameId(1)), vec![a, b]);

        assert_eq!(manager.leave_game(GameId(1)), vec![a, b]);
        assert_eq!(manager.game_of(a), None);
        assert_eq!(manager.members_of(GameId(2)), vec![c]);
    }

    #[test]
    fn test_broadcast_reaches_only_game_members() {
        let mut manager = ClientManager::new(2);
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();
        let a = manager.add_client(test_addr(), tx1).unwrap();
        manager.add_client(test_addr2(), tx2).unwrap();
        manager.assign_game(a, GameId(1));

        let sent = manager.broadcast_to_game(GameId(1), &Packet::GameStarted { turn: 0 });

        assert_eq!(sent, 1);
        assert_eq!(rx1.try_recv().unwrap(), Packet::GameStarted { turn: 0 });
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn test_send_to_closed_channel() {
        let mut manager = ClientManager::new(1);
        let (tx, rx) = channel();
        let id = manager.add_client(test_addr(), tx).unwrap();
        drop(rx);

        assert!(!manager.send_to(id, Packet::StartGame));
        assert!(!manager.send_to(PlayerId(42), Packet::StartGame));
    }
}
