//! Player orders and their effects
//!
//! An order has a price, an intelligence requirement and an effect. Purchase
//! orders mutate the issuing player directly. Attack orders cost nothing and do
//! not touch the player at all: their effect is registered with the turn's
//! [`AttackRegistry`] and resolved later, once every player's orders have run.

use crate::catalog::{BuildingTypeId, Catalog, UnitTypeId};
use crate::counts::CountMap;
use crate::player::{Player, PlayerId};
use serde::{Deserialize, Serialize};

/// Collects attack orders during a turn for simultaneous resolution
pub trait AttackRegistry {
    fn add_attack(&mut self, attacker: PlayerId, defender: PlayerId, units: &CountMap<UnitTypeId>);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Order {
    CreateUnit {
        unit_type: UnitTypeId,
        count: u32,
    },
    CreateBuilding {
        building_type: BuildingTypeId,
        count: u32,
    },
    AttackPlayer {
        target: PlayerId,
        units: CountMap<UnitTypeId>,
    },
}

impl Order {
    /// Gold cost of the order, or `None` if it names an unknown catalog entry
    pub fn price(&self, catalog: &Catalog) -> Option<f64> {
        match self {
            Order::CreateUnit { unit_type, count } => catalog
                .unit(*unit_type)
                .map(|unit| unit.price * f64::from(*count)),
            Order::CreateBuilding {
                building_type,
                count,
            } => catalog
                .building(*building_type)
                .map(|building| building.price * f64::from(*count)),
            Order::AttackPlayer { .. } => Some(0.0),
        }
    }

    /// Intelligence the player must hold for the order to be accepted
    pub fn required_intelligence(&self, catalog: &Catalog) -> Option<f64> {
        match self {
            Order::CreateUnit { unit_type, .. } => {
                catalog.unit(*unit_type).map(|unit| unit.required_intelligence)
            }
            Order::CreateBuilding { building_type, .. } => catalog
                .building(*building_type)
                .map(|building| building.required_intelligence),
            Order::AttackPlayer { .. } => Some(0.0),
        }
    }

    /// Carries out the order's effect on behalf of `player`
    ///
    /// Does not charge the price; the caller settles payment.
    pub fn apply(&self, player: &mut Player, attacks: &mut impl AttackRegistry) {
        match self {
            Order::CreateUnit { unit_type, count } => player.units.add(*unit_type, *count),
            Order::CreateBuilding {
                building_type,
                count,
            } => player.buildings.add(*building_type, *count),
            Order::AttackPlayer { target, units } => attacks.add_attack(player.id, *target, units),
        }
    }
}
