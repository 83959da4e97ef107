//! # Simulation
//!
//! **One economy, one owner.** The context object that holds the effect
//! registry, the ledger, the catalog and the accumulator, and the only
//! place that sequences them.
//!
//! ## The tick
//!
//! ```text
//! tick(dt) ──> validate dt
//!                 │
//!                 ▼
//!          publish effects + production   (providers re-read every tick)
//!                 │
//!                 ▼
//!          accumulator.tick ──> ledger gains, resource generators
//!                 │
//!                 ▼
//!          grant purchasable generator output
//!                 │
//!                 ▼
//!          TickReport
//! ```
//!
//! Nothing here is global: several simulations can live side by side.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::accumulator::{ProductionAccumulator, TickReport};
use crate::amount::Amount;
use crate::catalog::{Catalog, Purchase};
use crate::config::{EconomyConfig, PurchasableDefinition};
use crate::effects::EffectRegistry;
use crate::error::{EconomyError, EconomyResult};
use crate::ledger::{LedgerSnapshot, Redefine, ResourceDefinition, ResourceLedger};

/// Everything a save file needs, with every number as a decimal string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomySnapshot {
    /// Resource balances and flags.
    #[serde(default)]
    pub resources: LedgerSnapshot,
    /// Owned count per purchasable.
    #[serde(default)]
    pub owned: BTreeMap<String, Amount>,
}

/// The economy context.
#[derive(Debug, Default)]
pub struct Simulation {
    effects: EffectRegistry,
    ledger: ResourceLedger,
    catalog: Catalog,
    accumulator: ProductionAccumulator,
}

impl Simulation {
    /// Creates an empty simulation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a simulation populated from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a purchasable definition cannot be resolved.
    pub fn from_config(config: &EconomyConfig) -> EconomyResult<Self> {
        let mut sim = Self::new();
        sim.load(config)?;
        Ok(sim)
    }

    /// Adds every definition of `config`, keeping existing live state.
    ///
    /// # Errors
    ///
    /// Returns an error if a purchasable definition cannot be resolved.
    pub fn load(&mut self, config: &EconomyConfig) -> EconomyResult<()> {
        for def in &config.resources {
            self.ledger.define_resource(def, Redefine::Keep);
        }
        for def in &config.purchasables {
            self.catalog.define(def.clone())?;
        }
        self.refresh();
        Ok(())
    }

    /// Declares a resource.
    pub fn define_resource(&mut self, def: &ResourceDefinition, redefine: Redefine) -> bool {
        self.ledger.define_resource(def, redefine)
    }

    /// Declares a purchasable.
    ///
    /// # Errors
    ///
    /// Returns an error if the definition is malformed.
    pub fn define_purchasable(&mut self, def: PurchasableDefinition) -> EconomyResult<()> {
        self.catalog.define(def)?;
        self.refresh();
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Read access to the ledger.
    #[must_use]
    pub const fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    /// Write access to the ledger, for features that grant or spend
    /// resources directly.
    pub fn ledger_mut(&mut self) -> &mut ResourceLedger {
        &mut self.ledger
    }

    /// Read access to the catalog.
    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Read access to the effect registry.
    #[must_use]
    pub const fn effects(&self) -> &EffectRegistry {
        &self.effects
    }

    /// Write access to the effect registry.
    ///
    /// Production rates pick up changes on the next tick or after
    /// [`Simulation::refresh`].
    pub fn effects_mut(&mut self) -> &mut EffectRegistry {
        &mut self.effects
    }

    /// Read access to the accumulator.
    #[must_use]
    pub const fn accumulator(&self) -> &ProductionAccumulator {
        &self.accumulator
    }

    /// Re-publishes catalog effects and production and recomputes rates.
    pub fn refresh(&mut self) {
        self.catalog
            .publish_all(&mut self.ledger, &mut self.effects, &mut self.accumulator);
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Balance of a resource.
    #[must_use]
    pub fn amount(&self, resource: &str) -> Amount {
        self.ledger.amount(resource)
    }

    /// Price of the next `quantity` units of a purchasable.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::UnknownPurchasable` for unknown ids.
    pub fn cost_of(&self, id: &str, quantity: Amount) -> EconomyResult<Amount> {
        self.catalog.cost_of(id, quantity, &self.effects)
    }

    /// Largest quantity of a purchasable the balance pays for.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::UnknownPurchasable` for unknown ids.
    pub fn max_affordable(&self, id: &str) -> EconomyResult<Amount> {
        self.catalog.max_affordable(id, &self.ledger, &self.effects)
    }

    /// Whether `quantity` units of a purchasable are affordable right now.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::UnknownPurchasable` for unknown ids.
    pub fn can_afford(&self, id: &str, quantity: Amount) -> EconomyResult<bool> {
        let cost = self.cost_of(id, quantity)?;
        let resource = self
            .catalog
            .definition(id)
            .map(|def| def.cost_resource.as_str())
            .ok_or_else(|| EconomyError::UnknownPurchasable(id.to_string()))?;
        Ok(self.ledger.can_afford(resource, cost))
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Buys `quantity` units of a purchasable.
    ///
    /// # Errors
    ///
    /// See [`Catalog::purchase`].
    pub fn purchase(&mut self, id: &str, quantity: Amount) -> EconomyResult<Purchase> {
        self.catalog.purchase(
            id,
            quantity,
            &mut self.ledger,
            &mut self.effects,
            &mut self.accumulator,
        )
    }

    /// Buys as many units of a purchasable as the balance allows.
    ///
    /// # Errors
    ///
    /// See [`Catalog::buy_max`].
    pub fn buy_max(&mut self, id: &str) -> EconomyResult<Purchase> {
        self.catalog
            .buy_max(id, &mut self.ledger, &mut self.effects, &mut self.accumulator)
    }

    /// Adds units of a purchasable for free.
    ///
    /// # Errors
    ///
    /// See [`Catalog::grant`].
    pub fn grant(&mut self, id: &str, quantity: Amount) -> EconomyResult<Purchase> {
        self.catalog
            .grant(id, quantity, &mut self.ledger, &mut self.effects, &mut self.accumulator)
    }

    /// Advances the economy by `dt` seconds.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::InvalidDelta` for a negative or non-finite
    /// `dt`, leaving everything untouched.
    pub fn tick(&mut self, dt: f64) -> EconomyResult<TickReport> {
        if !dt.is_finite() || dt < 0.0 {
            tracing::warn!(dt, "tick rejected");
            return Err(EconomyError::InvalidDelta(dt.to_string()));
        }
        self.refresh();
        let report = self.accumulator.tick(dt, &mut self.ledger)?;
        let grants: Vec<(String, Amount)> = report
            .purchasable_grants()
            .map(|(id, units)| (id.to_string(), units))
            .collect();
        for (id, units) in grants {
            if let Err(err) = self.grant(&id, units) {
                tracing::warn!(purchasable = %id, %err, "generated units dropped");
            }
        }
        Ok(report)
    }

    // ========================================================================
    // Persistence and resets
    // ========================================================================

    /// Captures the persisted state.
    #[must_use]
    pub fn snapshot(&self) -> EconomySnapshot {
        EconomySnapshot {
            resources: self.ledger.snapshot(),
            owned: self.catalog.snapshot(),
        }
    }

    /// Rehydrates from a snapshot and re-publishes effects and production.
    ///
    /// Entries for unknown resources or purchasables are skipped.
    pub fn restore(&mut self, snapshot: &EconomySnapshot) {
        self.ledger.restore(&snapshot.resources);
        self.catalog.restore(&snapshot.owned);
        self.accumulator.clear();
        self.refresh();
    }

    /// Prestige: resets what is flagged to reset, keeps the rest.
    pub fn prestige_reset(&mut self) {
        self.ledger.perform_prestige_reset();
        self.catalog.prestige_reset();
        self.accumulator.clear();
        self.refresh();
        tracing::debug!("prestige reset");
    }

    /// Returns every resource and purchasable to its definition defaults
    /// and withdraws every catalog effect.
    pub fn hard_reset(&mut self) {
        self.catalog.hard_reset(&mut self.effects);
        self.ledger.perform_hard_reset();
        self.accumulator.clear();
        self.refresh();
        tracing::debug!("hard reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{ConstantEffect, EffectKind, TargetId, TargetKey, TargetSystem};

    const ECONOMY: &str = r#"
[[resources]]
id = "studies"
initial_amount = "1000"

[[resources]]
id = "insight"
resets_on_prestige = false

[[purchasables]]
id = "lab"
cost_resource = "studies"
base_cost = "100"
growth = "1.05"

[[purchasables.production]]
resource = "insight"
rate = "1"

[[purchasables]]
id = "relic"
cost_resource = "insight"
base_cost = "1"
resets_on_prestige = false

[[purchasables.production]]
purchasable = "lab"
rate = "0.5"
mode = "whole_units"
"#;

    fn sim() -> Simulation {
        Simulation::from_config(&EconomyConfig::from_toml_str(ECONOMY).unwrap()).unwrap()
    }

    #[test]
    fn test_buy_and_tick() {
        let mut sim = sim();
        sim.purchase("lab", Amount::from(2)).unwrap();
        let report = sim.tick(1.5).unwrap();
        assert_eq!(sim.amount("insight"), Amount::from(3));
        assert_eq!(report.continuous.len(), 1);
    }

    #[test]
    fn test_bad_tick_changes_nothing() {
        let mut sim = sim();
        sim.purchase("lab", Amount::ONE).unwrap();
        let before = sim.snapshot();
        assert!(sim.tick(-0.1).is_err());
        assert!(sim.tick(f64::NAN).is_err());
        assert_eq!(sim.snapshot(), before);
    }

    #[test]
    fn test_generator_grants_purchasables() {
        let mut sim = sim();
        sim.grant("relic", Amount::from(2)).unwrap();
        sim.tick(1.0).unwrap();
        assert_eq!(sim.catalog().owned("lab"), Amount::ONE);
    }

    #[test]
    fn test_cost_reduction_through_effects_mut() {
        let mut sim = sim();
        let target = TargetKey::new(TargetSystem::purchasable_cost(), TargetId::specific("lab"));
        sim.effects_mut()
            .register("market", "discount", target, EffectKind::CostReductionMultiplier, ConstantEffect(Amount::from_f64(0.5)))
            .unwrap();
        assert_eq!(sim.cost_of("lab", Amount::ONE).unwrap(), Amount::from(50));
        assert!(sim.can_afford("lab", Amount::from(10)).unwrap());
        assert!(matches!(
            sim.can_afford("ghost", Amount::ONE),
            Err(EconomyError::UnknownPurchasable(_))
        ));
    }

    #[test]
    fn test_prestige_and_hard_reset() {
        let mut sim = sim();
        sim.purchase("lab", Amount::ONE).unwrap();
        sim.grant("relic", Amount::ONE).unwrap();
        sim.tick(2.0).unwrap();

        sim.prestige_reset();
        assert_eq!(sim.amount("studies"), Amount::from(1000));
        assert!(sim.amount("insight").is_positive());
        assert_eq!(sim.catalog().owned("relic"), Amount::ONE);
        assert_eq!(sim.catalog().owned("lab"), Amount::ZERO);

        sim.hard_reset();
        assert_eq!(sim.amount("insight"), Amount::ZERO);
        assert_eq!(sim.catalog().owned("relic"), Amount::ZERO);
        assert!(sim.effects().is_empty());
        assert_eq!(sim.accumulator().generator_count(), 0);
    }

    #[test]
    fn test_snapshot_restore_republishes() {
        let mut sim = sim();
        sim.purchase("lab", Amount::from(3)).unwrap();
        let snapshot = sim.snapshot();

        let mut other = self::sim();
        other.restore(&snapshot);
        assert_eq!(other.snapshot(), snapshot);
        assert_eq!(other.ledger().production_per_second("insight"), Amount::from(3));
    }
}
