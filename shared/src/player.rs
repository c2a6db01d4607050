use crate::catalog::{BuildingTypeId, Catalog, RaceId, UnitTypeId};
use crate::counts::CountMap;
use crate::ledger::ResourceLedger;
use crate::order::Order;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A participant in a game and everything they own
///
/// This is also the per-player state delivered to clients after each turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub race: RaceId,
    pub buildings: CountMap<BuildingTypeId>,
    pub units: CountMap<UnitTypeId>,
    pub ledger: ResourceLedger,
    /// Orders accepted for the next turn, executed in insertion order
    pub pending_orders: Vec<Order>,
    /// Turn in which the player was eliminated
    pub elimination_turn: Option<u32>,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, race: RaceId) -> Self {
        Self {
            id,
            name: name.into(),
            race,
            buildings: CountMap::new(),
            units: CountMap::new(),
            ledger: ResourceLedger::default(),
            pending_orders: Vec::new(),
            elimination_turn: None,
        }
    }

    pub fn is_eliminated(&self) -> bool {
        self.elimination_turn.is_some()
    }

    /// Credits one turn of production from the player's buildings
    pub fn apply_production(&mut self, catalog: &Catalog) {
        self.ledger.apply_production(&self.buildings, catalog);
    }

    /// Wipes every building and unit and records the elimination turn
    ///
    /// Has no effect on a player that is already eliminated.
    pub fn eliminate(&mut self, turn: u32) {
        if self.is_eliminated() {
            return;
        }
        self.buildings.clear();
        self.units.clear();
        self.elimination_turn = Some(turn);
    }

    /// Number of units the player's buildings can house
    ///
    /// The race's capacity bonus is applied on top of the hosted total and the
    /// result is rounded down.
    pub fn unit_capacity(&self, catalog: &Catalog) -> u64 {
        let hosted: u64 = self
            .buildings
            .iter()
            .filter_map(|(id, count)| {
                catalog
                    .building(id)
                    .map(|building| u64::from(count) * u64::from(building.max_units_hosted))
            })
            .sum();

        let bonus = catalog
            .race(self.race)
            .map_or(0.0, |race| race.unit_capacity_bonus);

        (hosted as f64 * (1.0 + bonus)).floor() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_creation() {
        let player = Player::new(PlayerId(3), "alice", RaceId(1));
        assert_eq!(player.id, PlayerId(3));
        assert_eq!(player.name, "alice");
        assert!(player.units.is_empty());
        assert!(player.buildings.is_empty());
        assert!(player.pending_orders.is_empty());
        assert!(!player.is_eliminated());
    }

    #[test]
    fn test_eliminate_wipes_once() {
        let mut player = Player::new(PlayerId(1), "bob", RaceId(0));
        player.units.add(UnitTypeId(0), 4);
        player.buildings.add(BuildingTypeId(2), 1);

        player.eliminate(7);
        assert!(player.units.is_empty());
        assert!(player.buildings.is_empty());
        assert_eq!(player.elimination_turn, Some(7));

        player.eliminate(9);
        assert_eq!(player.elimination_turn, Some(7));
    }

    #[test]
    fn test_unit_capacity_with_race_bonus() {
        let catalog = Catalog::standard();

        // barracks hosts 20, mine hosts 5
        let mut human = Player::new(PlayerId(1), "h", RaceId(0));
        human.buildings.add(BuildingTypeId(2), 1);
        human.buildings.add(BuildingTypeId(0), 1);
        assert_eq!(human.unit_capacity(&catalog), 30);

        let mut orc = Player::new(PlayerId(2), "o", RaceId(1));
        orc.buildings = human.buildings.clone();
        assert_eq!(orc.unit_capacity(&catalog), 25);
    }

    #[test]
    fn test_unit_capacity_rounds_down() {
        let catalog = Catalog::standard();
        let mut human = Player::new(PlayerId(1), "h", RaceId(0));
        human.buildings.add(BuildingTypeId(1), 1); // library hosts 2
        assert_eq!(human.unit_capacity(&catalog), 2);
    }
}
