//! Order batch validation and per-turn order execution
//!
//! Validation is the authoritative gate: a batch is checked as a whole against
//! server-held state when it is submitted, and either every order is stored or
//! none is. Execution at turn time is lenient and silently skips anything the
//! player can no longer pay for.

use crate::error::OrderRejection;
use crate::GameRules;
use log::{debug, warn};
use shared::{AttackRegistry, Catalog, CountMap, Order, Player, PlayerId, RaceId, UnitTypeId};
use std::collections::BTreeMap;

/// Runs one turn of production and order execution for `player`
///
/// Production is credited first. Pending orders then execute in the order they
/// were submitted; each one is paid for first and applied only if that charge
/// succeeds. The pending list is always left empty.
///
/// Returns the number of orders that executed.
pub fn execute_orders(
    player: &mut Player,
    catalog: &Catalog,
    attacks: &mut impl AttackRegistry,
) -> usize {
    player.apply_production(catalog);

    let orders = std::mem::take(&mut player.pending_orders);
    let mut executed = 0;

    for order in orders {
        let Some(price) = order.price(catalog) else {
            warn!("Dropping order with unknown catalog entry from player {}", player.id);
            continue;
        };

        if let Err(e) = player.ledger.spend(price) {
            warn!("Dropping order from player {}: {}", player.id, e);
            continue;
        }

        order.apply(player, attacks);
        executed += 1;
    }

    debug!("Player {} executed {} order(s)", player.id, executed);
    executed
}

/// Checks a full order batch against the player's current state
///
/// The batch is refused if any single order is malformed or needs more
/// intelligence than the player holds, or if the batch as a whole overspends
/// gold, unit capacity, the per-turn building limit or the units available for
/// attacks. Nothing is mutated either way.
pub fn validate_batch(
    player: &Player,
    orders: &[Order],
    players: &BTreeMap<PlayerId, Player>,
    catalog: &Catalog,
    rules: &GameRules,
) -> Result<(), OrderRejection> {
    if player.is_eliminated() {
        return Err(OrderRejection::PlayerEliminated);
    }

    let mut gold_needed = 0.0;
    let mut new_units: u64 = 0;
    let mut new_buildings: u64 = 0;
    let mut committed: CountMap<UnitTypeId> = CountMap::new();

    for order in orders {
        match order {
            Order::CreateUnit { unit_type, count } => {
                let unit = catalog
                    .unit(*unit_type)
                    .ok_or(OrderRejection::UnknownUnitType(*unit_type))?;
                check_count(*count)?;
                check_race(unit.race, player.race, &unit.name)?;
                check_intelligence(unit.required_intelligence, player)?;
                new_units += u64::from(*count);
            }
            Order::CreateBuilding {
                building_type,
                count,
            } => {
                let building = catalog
                    .building(*building_type)
                    .ok_or(OrderRejection::UnknownBuildingType(*building_type))?;
                check_count(*count)?;
                check_race(building.race, player.race, &building.name)?;
                check_intelligence(building.required_intelligence, player)?;
                new_buildings += u64::from(*count);
            }
            Order::AttackPlayer { target, units } => {
                let valid_target = *target != player.id
                    && players
                        .get(target)
                        .is_some_and(|defender| !defender.is_eliminated());
                if !valid_target {
                    return Err(OrderRejection::InvalidTarget(*target));
                }
                if units.is_empty() {
                    return Err(OrderRejection::EmptyOrder);
                }
                for (unit_type, _) in units.iter() {
                    if catalog.unit(unit_type).is_none() {
                        return Err(OrderRejection::UnknownUnitType(unit_type));
                    }
                }
                committed.merge(units);
            }
        }
        gold_needed += order.price(catalog).unwrap_or(0.0);
    }

    if gold_needed > player.ledger.gold {
        return Err(OrderRejection::InsufficientGold {
            required: gold_needed,
            available: player.ledger.gold,
        });
    }

    let capacity = player.unit_capacity(catalog);
    let room = capacity.saturating_sub(player.units.total());
    if new_units > room {
        return Err(OrderRejection::UnitCapacityExceeded {
            requested: new_units,
            available: room,
        });
    }

    if new_buildings > u64::from(rules.max_buildings_per_turn) {
        return Err(OrderRejection::BuildingLimitExceeded {
            requested: new_buildings,
            limit: rules.max_buildings_per_turn,
        });
    }

    for (unit_type, requested) in committed.iter() {
        let owned = player.units.get(unit_type);
        if requested > owned {
            return Err(OrderRejection::NotEnoughUnits {
                unit_type,
                requested: u64::from(requested),
                available: owned,
            });
        }
    }

    Ok(())
}

fn check_count(count: u32) -> Result<(), OrderRejection> {
    if count == 0 {
        Err(OrderRejection::EmptyOrder)
    } else {
        Ok(())
    }
}

fn check_race(restriction: Option<RaceId>, race: RaceId, name: &str) -> Result<(), OrderRejection> {
    match restriction {
        Some(required) if required != race => Err(OrderRejection::RaceRestricted(name.to_string())),
        _ => Ok(()),
    }
}

fn check_intelligence(required: f64, player: &Player) -> Result<(), OrderRejection> {
    if required > player.ledger.intelligence {
        Err(OrderRejection::InsufficientIntelligence {
            required,
            available: player.ledger.intelligence,
        })
    } else {
        Ok(())
    }
}
