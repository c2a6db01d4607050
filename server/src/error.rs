//! Error types for game management and turn resolution.

use crate::game::GameStatus;
use shared::{BuildingTypeId, GameId, PlayerId, RaceId, UnitTypeId};
use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Errors raised by game operations
///
/// Every variant is raised before any state is touched, so a failed call
/// leaves the game exactly as it was.
#[derive(Debug, Error, PartialEq)]
pub enum GameError {
    #[error("cannot {operation} while the game is {status:?}")]
    InvalidState {
        operation: &'static str,
        status: GameStatus,
    },

    #[error("player {0} is not part of this game")]
    UnknownPlayer(PlayerId),

    #[error("game {0} does not exist")]
    UnknownGame(GameId),

    #[error("unknown race {0:?}")]
    UnknownRace(RaceId),

    #[error("game is full ({0} players)")]
    GameFull(usize),

    #[error("need at least {required} players to start, have {present}")]
    NotEnoughPlayers { required: usize, present: usize },

    #[error("orders rejected: {0}")]
    OrdersRejected(#[from] OrderRejection),
}

/// Why a whole order batch was refused
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrderRejection {
    #[error("insufficient gold: batch costs {required}, have {available}")]
    InsufficientGold { required: f64, available: f64 },

    #[error("unit capacity exceeded: {requested} units requested, room for {available}")]
    UnitCapacityExceeded { requested: u64, available: u64 },

    #[error("building limit exceeded: {requested} buildings requested, limit is {limit}")]
    BuildingLimitExceeded { requested: u64, limit: u32 },

    #[error("order needs {required} intelligence, have {available}")]
    InsufficientIntelligence { required: f64, available: f64 },

    #[error("unknown unit type {0:?}")]
    UnknownUnitType(UnitTypeId),

    #[error("unknown building type {0:?}")]
    UnknownBuildingType(BuildingTypeId),

    #[error("{0} is not available to this race")]
    RaceRestricted(String),

    #[error("order count must be positive")]
    EmptyOrder,

    #[error("player {0} cannot be attacked")]
    InvalidTarget(PlayerId),

    #[error("attack commits {requested} units of {unit_type:?}, only {available} owned")]
    NotEnoughUnits {
        unit_type: UnitTypeId,
        requested: u64,
        available: u32,
    },

    #[error("eliminated players cannot issue orders")]
    PlayerEliminated,
}
