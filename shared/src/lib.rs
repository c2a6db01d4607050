//! # Shared Game Model
//!
//! Types used on both sides of the wire: the static catalog, player state,
//! orders, turn reports and the packet protocol itself.
//!
//! ## Module Organization
//!
//! - [`catalog`] - races, unit types and building types, read-only for a game
//! - [`counts`] - the counted map used for every unit and building pool
//! - [`ledger`] - gold and intelligence balances
//! - [`player`] - a participant's full state
//! - [`order`] - purchase and attack orders
//!
//! ## Framing
//!
//! Packets travel over a stream as a big-endian `u32` length followed by the
//! bincode-encoded [`Packet`]. Frames larger than [`MAX_FRAME_LEN`] are refused
//! on both encode and decode.

pub mod catalog;
pub mod counts;
pub mod ledger;
pub mod order;
pub mod player;

pub use catalog::{BuildingType, BuildingTypeId, Catalog, CatalogError, Race, RaceId, UnitType, UnitTypeId};
pub use counts::CountMap;
pub use ledger::{LedgerError, ResourceLedger};
pub use order::{AttackRegistry, Order};
pub use player::{Player, PlayerId};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_FRAME_LEN: usize = 64 * 1024;
pub const FRAME_HEADER_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GameId(pub u32);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect {
        client_version: u32,
        name: String,
        race: RaceId,
    },
    /// Replaces the sender's pending orders for the next turn
    SubmitOrders {
        orders: Vec<Order>,
    },
    StartGame,
    Disconnect,

    Connected {
        player_id: PlayerId,
        game_id: GameId,
    },
    OrdersAccepted {
        turn: u32,
    },
    OrdersRejected {
        reason: String,
    },
    GameStarted {
        turn: u32,
    },
    PlayerState {
        turn: u32,
        player: Player,
    },
    TurnResults {
        report: TurnReport,
    },
    GameEnded {
        winner: Option<PlayerId>,
    },
    Error {
        reason: String,
    },
    Disconnected {
        reason: String,
    },
}

/// Outcome of one attacker against one defender in a turn
///
/// Destroyed counts describe the defender's total losses that turn, shared by
/// every attacker that hit the same defender. Lost units are this attacker's
/// own casualties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatReport {
    pub attacker: PlayerId,
    pub defender: PlayerId,
    pub destroyed_buildings: CountMap<BuildingTypeId>,
    pub destroyed_units: CountMap<UnitTypeId>,
    pub lost_units: CountMap<UnitTypeId>,
}

/// Everything that happened while resolving one turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnReport {
    /// The turn that was resolved
    pub turn: u32,
    pub combats: Vec<CombatReport>,
    /// Players eliminated during this turn, in resolution order
    pub eliminated: Vec<PlayerId>,
    /// Set when the game ended as a result of this turn
    pub winner: Option<PlayerId>,
}

impl TurnReport {
    /// Combat reports grouped by defender
    pub fn by_defender(&self) -> BTreeMap<PlayerId, Vec<&CombatReport>> {
        let mut grouped: BTreeMap<PlayerId, Vec<&CombatReport>> = BTreeMap::new();
        for combat in &self.combats {
            grouped.entry(combat.defender).or_default().push(combat);
        }
        grouped
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("frame of {0} bytes exceeds the size limit")]
    FrameTooLarge(usize),
}

/// Serializes a packet into a length-prefixed frame
pub fn encode_frame(packet: &Packet) -> Result<Vec<u8>, ProtocolError> {
    let body = bincode::serialize(packet)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(body.len()));
    }

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Reads the body length announced by a frame header
pub fn frame_len(header: [u8; FRAME_HEADER_LEN]) -> Result<usize, ProtocolError> {
    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    Ok(len)
}

pub fn decode_body(body: &[u8]) -> Result<Packet, ProtocolError> {
    Ok(bincode::deserialize(body)?)
}
