//! Simultaneous combat resolution
//!
//! Attacks are not fought as they are ordered. During the first phase of a turn
//! every attack order registers with an [`AttackContext`], which snapshots each
//! player's units before any order runs and tracks which of them have been sent
//! away. Once every player's orders have executed, each attacked player is
//! resolved exactly once against all of its attackers combined:
//!
//! 1. Attacker damage and health are summed per attacker, scaled by race.
//! 2. The defender's units still at home absorb damage first; whatever is left
//!    over hits buildings, and damage beyond unit health plus building
//!    resistance eliminates the defender.
//! 3. Destroyed counts are spread over every unit and building type in
//!    proportion to its count, rounded up per type.
//! 4. The defender's home units strike back, and each attacker loses units in
//!    proportion to its share of the attacking health.

use log::{debug, info, warn};
use shared::{
    AttackRegistry, BuildingTypeId, Catalog, CombatReport, CountMap, Player, PlayerId, Race,
    UnitTypeId,
};
use std::collections::BTreeMap;

/// Turn-scoped record of unit availability and incoming attacks
#[derive(Debug, Clone, Default)]
pub struct AttackContext {
    /// Units each player still has at home, taken before any order executed
    available: BTreeMap<PlayerId, CountMap<UnitTypeId>>,
    /// defender -> attacker -> committed units
    attacks: BTreeMap<PlayerId, BTreeMap<PlayerId, CountMap<UnitTypeId>>>,
}

impl AttackContext {
    /// Snapshots the unit pools of every player
    pub fn snapshot<'a>(players: impl IntoIterator<Item = &'a Player>) -> Self {
        let available = players
            .into_iter()
            .map(|player| (player.id, player.units.clone()))
            .collect();

        Self {
            available,
            attacks: BTreeMap::new(),
        }
    }

    /// Units still available to defend `player`
    pub fn available_units(&self, player: PlayerId) -> Option<&CountMap<UnitTypeId>> {
        self.available.get(&player)
    }

    /// Attackers targeting `defender` and the units each committed
    pub fn attacks_on(&self, defender: PlayerId) -> Option<&BTreeMap<PlayerId, CountMap<UnitTypeId>>> {
        self.attacks.get(&defender)
    }

    /// Every player that received at least one attack, in ascending id order
    pub fn defenders(&self) -> Vec<PlayerId> {
        self.attacks.keys().copied().collect()
    }

    /// True once any attack has been registered this turn
    pub fn has_attacks(&self) -> bool {
        !self.attacks.is_empty()
    }
}

impl AttackRegistry for AttackContext {
    /// Moves units out of the attacker's home pool and towards `defender`
    ///
    /// Requests beyond what the attacker still has at home are clamped, so
    /// the same unit can never be sent twice.
    fn add_attack(&mut self, attacker: PlayerId, defender: PlayerId, units: &CountMap<UnitTypeId>) {
        let home = self.available.entry(attacker).or_default();

        let mut committed = CountMap::new();
        for (unit_type, requested) in units.iter() {
            let taken = home.remove(unit_type, requested);
            if taken < requested {
                warn!(
                    "Player {} committed {} of {:?} but only {} were available",
                    attacker, requested, unit_type, taken
                );
            }
            committed.add(unit_type, taken);
        }

        if committed.is_empty() {
            warn!("Ignoring attack from {} on {} with no units", attacker, defender);
            return;
        }

        self.attacks
            .entry(defender)
            .or_default()
            .entry(attacker)
            .or_default()
            .merge(&committed);
    }
}

/// Combined damage and health of an army
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Strength {
    pub damage: f64,
    pub health: f64,
}

/// Sums damage and health over a unit pool, scaled by the owner's race
pub fn army_strength(units: &CountMap<UnitTypeId>, race: Option<&Race>, catalog: &Catalog) -> Strength {
    let damage_multiplier = race.map_or(1.0, |race| race.damage_multiplier);
    let health_multiplier = race.map_or(1.0, |race| race.health_multiplier);

    units
        .iter()
        .filter_map(|(id, count)| catalog.unit(id).map(|unit| (unit, f64::from(count))))
        .fold(Strength::default(), |total, (unit, count)| Strength {
            damage: total.damage + unit.damage * count * damage_multiplier,
            health: total.health + unit.health * count * health_multiplier,
        })
}

/// Total resistance of a building pool
pub fn building_resistance(buildings: &CountMap<BuildingTypeId>, catalog: &Catalog) -> f64 {
    buildings
        .iter()
        .filter_map(|(id, count)| {
            catalog
                .building(id)
                .map(|building| building.resistance * f64::from(count))
        })
        .sum()
}

/// How incoming damage is divided between a defender's units and buildings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageSplit {
    pub to_units: f64,
    pub to_buildings: f64,
    pub eliminated: bool,
}

/// Splits `attack_damage` over unit health first, then building resistance
///
/// The defender is eliminated only when the damage strictly exceeds unit
/// health plus building resistance. Damage that exactly matches both pools
/// destroys everything but leaves the player in the game.
pub fn split_damage(attack_damage: f64, units_health: f64, resistance: f64) -> DamageSplit {
    let health_after = units_health - attack_damage;
    if health_after >= 0.0 {
        return DamageSplit {
            to_units: attack_damage,
            to_buildings: 0.0,
            eliminated: false,
        };
    }

    let overflow = -health_after;
    if overflow > resistance {
        DamageSplit {
            to_units: units_health,
            to_buildings: resistance,
            eliminated: true,
        }
    } else {
        DamageSplit {
            to_units: units_health,
            to_buildings: overflow,
            eliminated: false,
        }
    }
}

/// Destroyed count per entry when `damage` is dealt to a pool worth `pool_total`
///
/// Every entry loses the same fraction of its count, rounded up and capped at
/// the count itself. An empty or worthless pool loses nothing.
pub fn proportional_losses<K: Ord + Copy>(pool: &CountMap<K>, damage: f64, pool_total: f64) -> CountMap<K> {
    if pool_total <= 0.0 || damage <= 0.0 {
        return CountMap::new();
    }

    let fraction = (damage / pool_total).min(1.0);
    pool.iter()
        .map(|(key, count)| {
            let destroyed = (fraction * f64::from(count)).ceil() as u32;
            (key, destroyed.min(count))
        })
        .collect()
}

/// Result of resolving every attack against one defender
#[derive(Debug, Clone, PartialEq)]
pub struct CombatOutcome {
    pub defender: PlayerId,
    pub destroyed_buildings: CountMap<BuildingTypeId>,
    pub destroyed_units: CountMap<UnitTypeId>,
    /// Casualties per attacker; every attacker has an entry, even when empty
    pub lost_units: BTreeMap<PlayerId, CountMap<UnitTypeId>>,
    pub eliminated: bool,
}

impl CombatOutcome {
    /// One report per attacker, all sharing the defender's losses
    pub fn reports(&self) -> Vec<CombatReport> {
        self.lost_units
            .iter()
            .map(|(attacker, lost)| CombatReport {
                attacker: *attacker,
                defender: self.defender,
                destroyed_buildings: self.destroyed_buildings.clone(),
                destroyed_units: self.destroyed_units.clone(),
                lost_units: lost.clone(),
            })
            .collect()
    }
}

struct AttackerForce<'a> {
    id: PlayerId,
    committed: &'a CountMap<UnitTypeId>,
    strength: Strength,
}

/// Resolves every attack aimed at `defender_id` and applies the losses
///
/// Returns `None` when nobody attacked the player, or when the defender is
/// unknown or was already eliminated in an earlier turn. Attackers eliminated
/// before this resolution take no part in it.
pub fn resolve_defender(
    defender_id: PlayerId,
    players: &mut BTreeMap<PlayerId, Player>,
    context: &AttackContext,
    catalog: &Catalog,
    turn: u32,
) -> Option<CombatOutcome> {
    let attacks = context.attacks_on(defender_id)?;

    let forces: Vec<AttackerForce> = attacks
        .iter()
        .filter_map(|(attacker, committed)| {
            let player = players.get(attacker);
            // An army whose owner fell earlier this turn was destroyed with it
            if player.is_some_and(Player::is_eliminated) {
                debug!("Dropping attack by eliminated player {} on player {}", attacker, defender_id);
                return None;
            }
            let race = player.and_then(|player| catalog.race(player.race));
            Some(AttackerForce {
                id: *attacker,
                committed,
                strength: army_strength(committed, race, catalog),
            })
        })
        .collect();

    if forces.is_empty() {
        return None;
    }

    let total_attack_damage: f64 = forces.iter().map(|force| force.strength.damage).sum();
    let total_attacker_health: f64 = forces.iter().map(|force| force.strength.health).sum();

    let empty_pool = CountMap::new();
    let home_units = context.available_units(defender_id).unwrap_or(&empty_pool);

    let defender = match players.get_mut(&defender_id) {
        Some(defender) if !defender.is_eliminated() => defender,
        Some(_) => {
            warn!("Skipping attacks on already eliminated player {}", defender_id);
            return None;
        }
        None => {
            warn!("Skipping attacks on unknown player {}", defender_id);
            return None;
        }
    };

    let defense = army_strength(home_units, catalog.race(defender.race), catalog);
    let resistance = building_resistance(&defender.buildings, catalog);
    let split = split_damage(total_attack_damage, defense.health, resistance);

    debug!(
        "Resolving {} attacker(s) on player {}: damage {:.1} vs health {:.1} + resistance {:.1}",
        forces.len(),
        defender_id,
        total_attack_damage,
        defense.health,
        resistance
    );

    let (destroyed_units, destroyed_buildings) = if split.eliminated {
        let wiped = (defender.units.clone(), defender.buildings.clone());
        defender.eliminate(turn);
        info!("Player {} eliminated on turn {}", defender_id, turn);
        wiped
    } else {
        let units: CountMap<UnitTypeId> = proportional_losses(home_units, split.to_units, defense.health)
            .iter()
            .map(|(id, count)| (id, defender.units.remove(id, count)))
            .collect();
        let buildings: CountMap<BuildingTypeId> = proportional_losses(&defender.buildings, split.to_buildings, resistance)
            .iter()
            .map(|(id, count)| (id, defender.buildings.remove(id, count)))
            .collect();
        (units, buildings)
    };

    let mut lost_units = BTreeMap::new();
    for force in &forces {
        let share = if defense.damage > 0.0 && total_attacker_health > 0.0 {
            let proportional = force.strength.health / total_attacker_health * defense.damage;
            proportional.min(force.strength.health)
        } else {
            0.0
        };

        let losses = proportional_losses(force.committed, share, force.strength.health);
        let lost: CountMap<UnitTypeId> = match players.get_mut(&force.id) {
            Some(attacker) => losses
                .iter()
                .map(|(id, count)| (id, attacker.units.remove(id, count)))
                .collect(),
            None => CountMap::new(),
        };
        lost_units.insert(force.id, lost);
    }

    Some(CombatOutcome {
        defender: defender_id,
        destroyed_buildings,
        destroyed_units,
        lost_units,
        eliminated: split.eliminated,
    })
}
