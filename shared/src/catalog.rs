//! Static game data: races, unit types and building types
//!
//! The catalog is loaded once when the server starts and is never mutated
//! afterwards. Every other structure refers to catalog entries by id, and an
//! id is the entry's position in its list, so lookups are plain indexing.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Identifies a race by its position in [`Catalog::races`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RaceId(pub u16);

/// Identifies a unit type by its position in [`Catalog::unit_types`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitTypeId(pub u16);

/// Identifies a building type by its position in [`Catalog::building_types`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildingTypeId(pub u16);

/// Errors raised while loading or checking a catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse catalog: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{kind} '{name}' has id {id} but sits at position {position}")]
    IdMismatch {
        kind: &'static str,
        name: String,
        id: u16,
        position: usize,
    },

    #[error("{kind} '{name}' is restricted to unknown race {race}")]
    UnknownRace {
        kind: &'static str,
        name: String,
        race: u16,
    },

    #[error("{kind} '{name}' has invalid {field} {value}: must be finite and not negative")]
    InvalidStat {
        kind: &'static str,
        name: String,
        field: &'static str,
        value: f64,
    },
}

/// A playable race
///
/// Only the damage and health multipliers take part in combat. The gold and
/// intelligence multipliers are carried as data but building production is
/// deliberately left unscaled by them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Race {
    pub id: RaceId,
    pub name: String,
    pub damage_multiplier: f64,
    pub health_multiplier: f64,
    pub gold_multiplier: f64,
    pub intelligence_multiplier: f64,
    /// Extra share of unit capacity granted on top of what buildings host
    #[serde(default)]
    pub unit_capacity_bonus: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitType {
    pub id: UnitTypeId,
    pub name: String,
    pub price: f64,
    pub required_intelligence: f64,
    pub health: f64,
    pub damage: f64,
    /// Only players of this race may train the unit
    #[serde(default)]
    pub race: Option<RaceId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingType {
    pub id: BuildingTypeId,
    pub name: String,
    pub price: f64,
    pub required_intelligence: f64,
    pub gold_production: f64,
    pub intelligence_production: f64,
    pub resistance: f64,
    /// Number of units each building of this type can house
    pub max_units_hosted: u32,
    /// Only players of this race may construct the building
    #[serde(default)]
    pub race: Option<RaceId>,
}

/// Read-only registry of every race, unit type and building type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub races: Vec<Race>,
    pub unit_types: Vec<UnitType>,
    pub building_types: Vec<BuildingType>,
}

impl Catalog {
    /// Parses a catalog from JSON and checks its consistency
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Loads a catalog from a JSON file on disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Checks that ids match positions, race restrictions point at real races
    /// and every numeric stat is finite and not negative
    pub fn validate(&self) -> Result<(), CatalogError> {
        for (position, race) in self.races.iter().enumerate() {
            check_position("race", &race.name, race.id.0, position)?;
            check_stats(
                "race",
                &race.name,
                &[
                    ("damage multiplier", race.damage_multiplier),
                    ("health multiplier", race.health_multiplier),
                    ("gold multiplier", race.gold_multiplier),
                    ("intelligence multiplier", race.intelligence_multiplier),
                    ("unit capacity bonus", race.unit_capacity_bonus),
                ],
            )?;
        }
        for (position, unit) in self.unit_types.iter().enumerate() {
            check_position("unit type", &unit.name, unit.id.0, position)?;
            self.check_race("unit type", &unit.name, unit.race)?;
            check_stats(
                "unit type",
                &unit.name,
                &[
                    ("price", unit.price),
                    ("required intelligence", unit.required_intelligence),
                    ("health", unit.health),
                    ("damage", unit.damage),
                ],
            )?;
        }
        for (position, building) in self.building_types.iter().enumerate() {
            check_position("building type", &building.name, building.id.0, position)?;
            self.check_race("building type", &building.name, building.race)?;
            check_stats(
                "building type",
                &building.name,
                &[
                    ("price", building.price),
                    ("required intelligence", building.required_intelligence),
                    ("gold production", building.gold_production),
                    ("intelligence production", building.intelligence_production),
                    ("resistance", building.resistance),
                ],
            )?;
        }
        Ok(())
    }

    fn check_race(
        &self,
        kind: &'static str,
        name: &str,
        race: Option<RaceId>,
    ) -> Result<(), CatalogError> {
        match race {
            Some(id) if self.race(id).is_none() => Err(CatalogError::UnknownRace {
                kind,
                name: name.to_string(),
                race: id.0,
            }),
            _ => Ok(()),
        }
    }

    pub fn race(&self, id: RaceId) -> Option<&Race> {
        self.races.get(usize::from(id.0))
    }

    pub fn unit(&self, id: UnitTypeId) -> Option<&UnitType> {
        self.unit_types.get(usize::from(id.0))
    }

    pub fn building(&self, id: BuildingTypeId) -> Option<&BuildingType> {
        self.building_types.get(usize::from(id.0))
    }

    pub fn race_by_name(&self, name: &str) -> Option<&Race> {
        self.races.iter().find(|race| race.name == name)
    }

    /// The catalog shipped with the server
    pub fn standard() -> Self {
        let human = RaceId(0);
        let orc = RaceId(1);
        let elf = RaceId(2);

        Self {
            races: vec![
                race(human, "human", 1.0, 1.0, 1.1, 1.0, 0.2),
                race(orc, "orc", 1.2, 1.1, 0.9, 0.8, 0.0),
                race(elf, "elf", 1.0, 0.9, 1.0, 1.3, 0.0),
            ],
            unit_types: vec![
                unit(0, "soldier", 10.0, 0.0, 10.0, 5.0, None),
                unit(1, "archer", 15.0, 5.0, 6.0, 8.0, None),
                unit(2, "knight", 40.0, 20.0, 30.0, 12.0, None),
                unit(3, "berserker", 25.0, 10.0, 15.0, 14.0, Some(orc)),
                unit(4, "ranger", 30.0, 15.0, 12.0, 15.0, Some(elf)),
                unit(5, "paladin", 60.0, 30.0, 40.0, 16.0, Some(human)),
            ],
            building_types: vec![
                building(0, "mine", 50.0, 0.0, 20.0, 0.0, 40.0, 5, None),
                building(1, "library", 60.0, 0.0, 0.0, 10.0, 30.0, 2, None),
                building(2, "barracks", 80.0, 0.0, 0.0, 0.0, 60.0, 20, None),
                building(3, "fortress", 200.0, 30.0, 5.0, 0.0, 250.0, 10, None),
                building(4, "war camp", 70.0, 10.0, 0.0, 0.0, 40.0, 25, Some(orc)),
            ],
        }
    }
}

fn check_position(
    kind: &'static str,
    name: &str,
    id: u16,
    position: usize,
) -> Result<(), CatalogError> {
    if usize::from(id) == position {
        Ok(())
    } else {
        Err(CatalogError::IdMismatch {
            kind,
            name: name.to_string(),
            id,
            position,
        })
    }
}

fn check_stats(kind: &'static str, name: &str, stats: &[(&'static str, f64)]) -> Result<(), CatalogError> {
    match stats.iter().find(|(_, value)| !value.is_finite() || *value < 0.0) {
        Some(&(field, value)) => Err(CatalogError::InvalidStat {
            kind,
            name: name.to_string(),
            field,
            value,
        }),
        None => Ok(()),
    }
}

fn race(
    id: RaceId,
    name: &str,
    damage: f64,
    health: f64,
    gold: f64,
    intelligence: f64,
    capacity_bonus: f64,
) -> Race {
    Race {
        id,
        name: name.to_string(),
        damage_multiplier: damage,
        health_multiplier: health,
        gold_multiplier: gold,
        intelligence_multiplier: intelligence,
        unit_capacity_bonus: capacity_bonus,
    }
}

fn unit(
    id: u16,
    name: &str,
    price: f64,
    required_intelligence: f64,
    health: f64,
    damage: f64,
    race: Option<RaceId>,
) -> UnitType {
    UnitType {
        id: UnitTypeId(id),
        name: name.to_string(),
        price,
        required_intelligence,
        health,
        damage,
        race,
    }
}

#[allow(clippy::too_many_arguments)]
fn building(
    id: u16,
    name: &str,
    price: f64,
    required_intelligence: f64,
    gold_production: f64,
    intelligence_production: f64,
    resistance: f64,
    max_units_hosted: u32,
    race: Option<RaceId>,
) -> BuildingType {
    BuildingType {
        id: BuildingTypeId(id),
        name: name.to_string(),
        price,
        required_intelligence,
        gold_production,
        intelligence_production,
        resistance,
        max_units_hosted,
        race,
    }
}
