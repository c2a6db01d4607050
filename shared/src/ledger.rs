//! Per-player gold and intelligence counters

use crate::catalog::{BuildingTypeId, Catalog};
use crate::counts::CountMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum LedgerError {
    #[error("insufficient gold: need {required}, have {available}")]
    InsufficientGold { required: f64, available: f64 },

    #[error("invalid amount: {0}")]
    InvalidAmount(f64),
}

/// Gold and intelligence held by one player
///
/// Balances only change through [`credit`](Self::credit),
/// [`spend`](Self::spend) and [`apply_production`](Self::apply_production),
/// none of which can leave a negative balance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLedger {
    pub gold: f64,
    pub intelligence: f64,
}

impl ResourceLedger {
    pub fn new(gold: f64, intelligence: f64) -> Self {
        Self { gold, intelligence }
    }

    pub fn can_afford(&self, price: f64) -> bool {
        self.gold >= price
    }

    /// Removes `price` gold, failing without change if the balance is short
    pub fn spend(&mut self, price: f64) -> Result<(), LedgerError> {
        check_amount(price)?;
        if !self.can_afford(price) {
            return Err(LedgerError::InsufficientGold {
                required: price,
                available: self.gold,
            });
        }
        self.gold -= price;
        Ok(())
    }

    pub fn credit(&mut self, amount: f64) -> Result<(), LedgerError> {
        check_amount(amount)?;
        self.gold += amount;
        Ok(())
    }

    /// Adds one turn of building output
    ///
    /// Output is the raw per-building production times the building count.
    /// Race gold and intelligence multipliers are not applied here.
    pub fn apply_production(&mut self, buildings: &CountMap<BuildingTypeId>, catalog: &Catalog) {
        for (building_id, count) in buildings.iter() {
            if let Some(building) = catalog.building(building_id) {
                self.gold += f64::from(count) * building.gold_production;
                self.intelligence += f64::from(count) * building.intelligence_production;
            }
        }
    }
}

fn check_amount(amount: f64) -> Result<(), LedgerError> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(())
    } else {
        Err(LedgerError::InvalidAmount(amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_spend_within_balance() {
        let mut ledger = ResourceLedger::new(100.0, 0.0);
        assert!(ledger.spend(40.0).is_ok());
        assert_approx_eq!(ledger.gold, 60.0);
    }

    #[test]
    fn test_spend_exact_balance() {
        let mut ledger = ResourceLedger::new(25.0, 0.0);
        assert!(ledger.can_afford(25.0));
        assert!(ledger.spend(25.0).is_ok());
        assert_eq!(ledger.gold, 0.0);
    }

    #[test]
    fn test_overspend_leaves_balance_untouched() {
        let mut ledger = ResourceLedger::new(10.0, 3.0);
        let result = ledger.spend(11.0);

        assert_eq!(
            result,
            Err(LedgerError::InsufficientGold {
                required: 11.0,
                available: 10.0
            })
        );
        assert_eq!(ledger, ResourceLedger::new(10.0, 3.0));
    }

    #[test]
    fn test_negative_amounts_are_refused() {
        let mut ledger = ResourceLedger::new(10.0, 0.0);
        assert!(ledger.spend(-5.0).is_err());
        assert!(ledger.credit(-5.0).is_err());
        assert!(ledger.credit(f64::NAN).is_err());
        assert_eq!(ledger.gold, 10.0);
    }

    #[test]
    fn test_credit() {
        let mut ledger = ResourceLedger::default();
        ledger.credit(12.5).unwrap();
        assert_approx_eq!(ledger.gold, 12.5);
    }

    #[test]
    fn test_production_ignores_race_multipliers() {
        let catalog = Catalog::standard();
        let mut buildings = CountMap::new();
        buildings.add(BuildingTypeId(0), 2); // mine: 20 gold
        buildings.add(BuildingTypeId(1), 3); // library: 10 intelligence

        let mut ledger = ResourceLedger::new(5.0, 1.0);
        ledger.apply_production(&buildings, &catalog);

        assert_approx_eq!(ledger.gold, 45.0);
        assert_approx_eq!(ledger.intelligence, 31.0);
    }

    #[test]
    fn test_production_without_buildings() {
        let catalog = Catalog::standard();
        let mut ledger = ResourceLedger::new(7.0, 2.0);
        ledger.apply_production(&CountMap::new(), &catalog);
        assert_eq!(ledger, ResourceLedger::new(7.0, 2.0));
    }
}
