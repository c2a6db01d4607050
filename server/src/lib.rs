//! # Conquest Game Server
//!
//! This library provides the authoritative server for the turn-based strategy
//! game. It owns every game's canonical state, validates the orders players
//! submit, and resolves turns on a fixed schedule.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Turn Resolution
//! Clients never change state directly. They submit a batch of orders, the
//! server validates it against the player's current state, and the orders are
//! executed when the turn resolves. Combat results, eliminations and the end of
//! the game are all decided here.
//!
//! ### Client Management
//! Handles the lifecycle of client connections:
//! - Connection establishment and player id assignment
//! - Seating players in a waiting game
//! - Disconnection handling and cleanup
//!
//! ### Result Delivery
//! After every turn each participant receives the turn report and their own
//! refreshed state. Players only ever see their own buildings and units.
//!
//! ## Turn Structure
//!
//! A turn runs in two phases for one game:
//!
//! 1. **Execution** - every player collects production and runs their pending
//!    orders in submission order. Attack orders do not fight yet; they only
//!    register the committed units with the turn's attack context.
//! 2. **Combat** - every player that was attacked is resolved once against the
//!    combined strength of all attackers, in ascending player id order.
//!
//! Unit availability for attacks is snapshotted before execution starts, so
//! the result of a turn never depends on the order players are iterated in.
//!
//! ## Module Organization
//!
//! ### Combat Module (`combat`)
//! The attack context and the combat resolver: army strength, damage split,
//! proportional losses and elimination.
//!
//! ### Orders Module (`orders`)
//! Turn-time order execution and submit-time batch validation.
//!
//! ### Game Module (`game`)
//! The per-game state machine (`Waiting`, `Running`, `Ended`) and turn driver.
//!
//! ### Game Manager Module (`game_manager`)
//! Registry of all games, each behind its own lock.
//!
//! ### Client Manager Module (`client_manager`)
//! Connected clients, their outbound channels and game membership.
//!
//! ### Network Module (`network`)
//! TCP listener, per-connection tasks and the turn ticker.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use server::ServerConfig;
//! use shared::Catalog;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         bind_addr: "127.0.0.1:8080".to_string(),
//!         turn_duration: Duration::from_secs(30),
//!         ..ServerConfig::default()
//!     };
//!
//!     let server = Server::new(config, Catalog::standard()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency
//!
//! Each game sits behind its own `tokio::sync::Mutex`. Order submission and
//! turn resolution both take that lock, so a batch is either fully stored
//! before a turn starts or waits for the next one. Locks are always taken in
//! the same order (game registry, then a game, then the client roster) so
//! tasks never deadlock.

pub mod client_manager;
pub mod combat;
pub mod error;
pub mod game;
pub mod game_manager;
pub mod network;
pub mod orders;

pub use error::{GameError, OrderRejection, Result};

use serde::{Deserialize, Serialize};
use shared::{BuildingTypeId, CountMap};
use std::time::Duration;

/// Per-game rules shared by every game the server hosts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRules {
    pub starting_gold: f64,
    pub starting_intelligence: f64,
    /// Buildings every player owns when the game starts
    pub starting_buildings: CountMap<BuildingTypeId>,
    /// Most buildings a player may order in a single turn
    pub max_buildings_per_turn: u32,
    pub min_players: usize,
    pub max_players: usize,
}

impl Default for GameRules {
    fn default() -> Self {
        let mut starting_buildings = CountMap::new();
        starting_buildings.add(BuildingTypeId(0), 1); // mine
        starting_buildings.add(BuildingTypeId(2), 1); // barracks

        Self {
            starting_gold: 200.0,
            starting_intelligence: 0.0,
            starting_buildings,
            max_buildings_per_turn: 5,
            min_players: 2,
            max_players: 8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Time between two resolved turns
    pub turn_duration: Duration,
    pub max_clients: usize,
    pub rules: GameRules,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            turn_duration: Duration::from_secs(30),
            max_clients: 64,
            rules: GameRules::default(),
        }
    }
}
