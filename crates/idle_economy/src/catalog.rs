//! # Purchasable Catalog
//!
//! Owned counts of every purchasable, and the transactions that change them.
//!
//! ## Transaction flow
//!
//! ```text
//! purchase(id, k)
//!   -> reduction = effects(purchasable_cost, id) * effects(purchasable_cost, *)
//!   -> price     = cost_of(base * reduction, growth, owned, k)
//!   -> ledger.spend(cost_resource, price)          (refused: nothing changes)
//!   -> owned += k
//!   -> publish effects + production
//! ```
//!
//! Buy Max solves for `k` first and then runs the same flow.
//!
//! ## Publishing
//!
//! Each owned purchasable contributes its effect specs as
//! [`LeveledEffect`] sources owned by `purchasable:<id>`, and its production
//! either as a continuous ledger source under the same key or as a
//! whole-unit generator. Output per unit is
//!
//! ```text
//! (rate + additive) * multiplier * (1 + percentage / 100)
//! ```
//!
//! with the modifiers read from the purchasable's `effect_system`.

use std::collections::BTreeMap;

use crate::accumulator::{GeneratorKey, GeneratorTarget, ProductionAccumulator};
use crate::amount::Amount;
use crate::config::{ProductionMode, PurchasableDefinition};
use crate::cost::ScalingCost;
use crate::effects::{
    EffectCurve, EffectKind, EffectRegistry, LeveledEffect, TargetId, TargetKey, TargetSystem,
};
use crate::error::{EconomyError, EconomyResult};
use crate::ledger::ResourceLedger;

/// Outcome of a purchase, grant or Buy Max.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Purchase {
    /// Purchasable bought.
    pub purchasable: String,
    /// Units added.
    pub quantity: Amount,
    /// Total paid (zero for grants).
    pub cost: Amount,
    /// Owned count afterwards.
    pub owned: Amount,
}

#[derive(Clone, Debug)]
struct ResolvedEffect {
    target: TargetKey,
    kind: EffectKind,
    per_level: Amount,
    curve: EffectCurve,
}

#[derive(Clone, Debug)]
struct Entry {
    def: PurchasableDefinition,
    schedule: ScalingCost,
    system: Option<TargetSystem>,
    effects: Vec<ResolvedEffect>,
    production: Vec<(GeneratorTarget, Amount, ProductionMode)>,
    owned: Amount,
}

impl Entry {
    fn resolve(def: PurchasableDefinition) -> EconomyResult<Self> {
        if def.id.trim().is_empty() {
            return Err(EconomyError::InvalidConfig(
                "purchasable id must not be empty".to_string(),
            ));
        }
        let system = def
            .effect_system
            .as_ref()
            .map(|s| TargetSystem::new(s.clone()))
            .transpose()?;

        let mut effects = Vec::with_capacity(def.effects.len());
        for spec in &def.effects {
            let kind = match spec.kind() {
                Ok(kind) => kind,
                Err(err) => {
                    tracing::warn!(purchasable = %def.id, %err, "effect spec skipped");
                    continue;
                }
            };
            effects.push(ResolvedEffect {
                target: spec.target_key()?,
                kind,
                per_level: spec.per_level,
                curve: spec.curve,
            });
        }

        let production = def
            .production
            .iter()
            .map(|spec| spec.target().map(|target| (target, spec.rate, spec.mode)))
            .collect::<EconomyResult<Vec<_>>>()?;

        Ok(Self {
            schedule: ScalingCost::new(def.base_cost, def.growth),
            system,
            effects,
            production,
            owned: Amount::ZERO,
            def,
        })
    }

    /// Namespaced key used as ledger source and effect owner.
    fn owner_key(&self) -> String {
        format!("purchasable:{}", self.def.id)
    }
}

/// Definitions and owned counts of every purchasable.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    entries: BTreeMap<String, Entry>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a definition. A replaced entry keeps its owned count.
    ///
    /// # Errors
    ///
    /// Returns an error if the id, effect system or a target is malformed.
    pub fn define(&mut self, def: PurchasableDefinition) -> EconomyResult<()> {
        let mut entry = Entry::resolve(def)?;
        if let Some(previous) = self.entries.get(&entry.def.id) {
            entry.owned = previous.owned;
        }
        self.entries.insert(entry.def.id.clone(), entry);
        Ok(())
    }

    /// Whether `id` is defined.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Defined ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Static definition of `id`.
    #[must_use]
    pub fn definition(&self, id: &str) -> Option<&PurchasableDefinition> {
        self.entries.get(id).map(|e| &e.def)
    }

    /// Owned count of `id`, zero if unknown.
    #[must_use]
    pub fn owned(&self, id: &str) -> Amount {
        self.entries.get(id).map_or(Amount::ZERO, |e| e.owned)
    }

    fn entry(&self, id: &str) -> EconomyResult<&Entry> {
        self.entries
            .get(id)
            .ok_or_else(|| EconomyError::UnknownPurchasable(id.to_string()))
    }

    /// Aggregated cost reduction for `id`, specific and global combined.
    #[must_use]
    pub fn cost_reduction(&self, id: &str, effects: &EffectRegistry) -> Amount {
        let target = TargetKey::new(TargetSystem::purchasable_cost(), TargetId::specific(id));
        effects.combined(&target, EffectKind::CostReductionMultiplier)
    }

    /// Price of the next `quantity` units of `id`.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::UnknownPurchasable` for unknown ids.
    pub fn cost_of(&self, id: &str, quantity: Amount, effects: &EffectRegistry) -> EconomyResult<Amount> {
        let entry = self.entry(id)?;
        Ok(entry
            .schedule
            .cost_of(entry.owned, quantity, self.cost_reduction(id, effects)))
    }

    /// Largest quantity of `id` the current balance pays for.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::UnknownPurchasable` for unknown ids.
    pub fn max_affordable(
        &self,
        id: &str,
        ledger: &ResourceLedger,
        effects: &EffectRegistry,
    ) -> EconomyResult<Amount> {
        let entry = self.entry(id)?;
        let funds = ledger.amount(&entry.def.cost_resource);
        Ok(entry
            .schedule
            .max_affordable(entry.owned, funds, self.cost_reduction(id, effects)))
    }

    /// Buys `quantity` units of `id`.
    ///
    /// # Errors
    ///
    /// * `EconomyError::UnknownPurchasable` - `id` is not defined
    /// * `EconomyError::InvalidQuantity` - `quantity` is not a positive whole number
    /// * `EconomyError::UnknownResource` - the cost resource is not in the ledger
    /// * `EconomyError::InsufficientFunds` - the balance does not cover the price
    pub fn purchase(
        &mut self,
        id: &str,
        quantity: Amount,
        ledger: &mut ResourceLedger,
        effects: &mut EffectRegistry,
        accumulator: &mut ProductionAccumulator,
    ) -> EconomyResult<Purchase> {
        self.entry(id)?;
        if !quantity.is_positive() || !quantity.is_integer() {
            return Err(EconomyError::InvalidQuantity(quantity.to_decimal_string()));
        }
        let cost = self.cost_of(id, quantity, effects)?;
        self.commit(id, quantity, cost, ledger, effects, accumulator)
    }

    /// Buys as many units of `id` as the balance allows.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::NothingAffordable` when not even one unit can
    /// be paid for, otherwise as [`Catalog::purchase`].
    pub fn buy_max(
        &mut self,
        id: &str,
        ledger: &mut ResourceLedger,
        effects: &mut EffectRegistry,
        accumulator: &mut ProductionAccumulator,
    ) -> EconomyResult<Purchase> {
        let quantity = self.max_affordable(id, ledger, effects)?;
        if !quantity.is_positive() {
            return Err(EconomyError::NothingAffordable {
                purchasable: id.to_string(),
            });
        }
        let cost = self.cost_of(id, quantity, effects)?;
        self.commit(id, quantity, cost, ledger, effects, accumulator)
    }

    fn commit(
        &mut self,
        id: &str,
        quantity: Amount,
        cost: Amount,
        ledger: &mut ResourceLedger,
        effects: &mut EffectRegistry,
        accumulator: &mut ProductionAccumulator,
    ) -> EconomyResult<Purchase> {
        let resource = self.entry(id)?.def.cost_resource.clone();
        if !ledger.contains(&resource) {
            return Err(EconomyError::UnknownResource(resource));
        }
        if !ledger.spend_amount(&resource, cost) {
            return Err(EconomyError::InsufficientFunds {
                required: cost.to_decimal_string(),
                available: ledger.amount(&resource).to_decimal_string(),
                resource,
            });
        }
        let owned = self.add_owned(id, quantity)?;
        self.publish_all(ledger, effects, accumulator);
        tracing::debug!(purchasable = id, %quantity, %cost, %owned, "purchased");
        Ok(Purchase {
            purchasable: id.to_string(),
            quantity,
            cost,
            owned,
        })
    }

    /// Adds units of `id` for free.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::UnknownPurchasable` or
    /// `EconomyError::InvalidQuantity`.
    pub fn grant(
        &mut self,
        id: &str,
        quantity: Amount,
        ledger: &mut ResourceLedger,
        effects: &mut EffectRegistry,
        accumulator: &mut ProductionAccumulator,
    ) -> EconomyResult<Purchase> {
        if !quantity.is_positive() || !quantity.is_integer() {
            return Err(EconomyError::InvalidQuantity(quantity.to_decimal_string()));
        }
        let owned = self.add_owned(id, quantity)?;
        self.publish_all(ledger, effects, accumulator);
        Ok(Purchase {
            purchasable: id.to_string(),
            quantity,
            cost: Amount::ZERO,
            owned,
        })
    }

    fn add_owned(&mut self, id: &str, quantity: Amount) -> EconomyResult<Amount> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| EconomyError::UnknownPurchasable(id.to_string()))?;
        entry.owned += quantity;
        Ok(entry.owned)
    }

    /// Re-publishes every purchasable's effects and production.
    ///
    /// Effects go first so production sees the modifiers they contribute.
    pub fn publish_all(
        &self,
        ledger: &mut ResourceLedger,
        effects: &mut EffectRegistry,
        accumulator: &mut ProductionAccumulator,
    ) {
        for entry in self.entries.values() {
            publish_effects(entry, effects);
        }
        for entry in self.entries.values() {
            publish_production(entry, ledger, effects, accumulator);
        }
        ledger.refresh_production(effects);
    }

    /// Zeroes owned counts of purchasables that reset on prestige.
    pub fn prestige_reset(&mut self) {
        for entry in self.entries.values_mut() {
            if entry.def.resets_on_prestige {
                entry.owned = Amount::ZERO;
            }
        }
    }

    /// Zeroes every owned count and withdraws every published effect.
    pub fn hard_reset(&mut self, effects: &mut EffectRegistry) {
        for entry in self.entries.values_mut() {
            entry.owned = Amount::ZERO;
            effects.unregister_owner(&entry.owner_key());
        }
    }

    /// Owned counts by id.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Amount> {
        self.entries
            .iter()
            .map(|(id, e)| (id.clone(), e.owned))
            .collect()
    }

    /// Applies owned counts. Unknown ids are skipped; counts are floored
    /// and clamped at zero.
    pub fn restore(&mut self, owned: &BTreeMap<String, Amount>) {
        for (id, count) in owned {
            let Some(entry) = self.entries.get_mut(id) else {
                tracing::warn!(purchasable = %id, "snapshot entry for unknown purchasable skipped");
                continue;
            };
            entry.owned = if count.is_positive() {
                count.floor()
            } else {
                Amount::ZERO
            };
        }
    }
}

fn effect_source(index: usize) -> String {
    format!("effect{index}")
}

fn publish_effects(entry: &Entry, effects: &mut EffectRegistry) {
    let owner = entry.owner_key();
    for (index, effect) in entry.effects.iter().enumerate() {
        let source = effect_source(index);
        if !entry.owned.is_positive() {
            effects.unregister(&owner, &source, &effect.target, effect.kind);
            continue;
        }
        let provider = LeveledEffect::new(entry.owned, effect.per_level, effect.curve, effect.kind);
        if let Err(err) = effects.register(&owner, &source, effect.target.clone(), effect.kind, provider) {
            tracing::warn!(purchasable = %entry.def.id, %err, "effect not published");
        }
    }
}

fn per_unit_scale(entry: &Entry, effects: &EffectRegistry) -> (Amount, Amount) {
    let Some(system) = &entry.system else {
        return (Amount::ZERO, Amount::ONE);
    };
    let target = TargetKey::new(system.clone(), TargetId::specific(entry.def.id.as_str()));
    let additive = effects.combined(&target, EffectKind::AdditiveBonus);
    let percentage = effects.combined(&target, EffectKind::PercentageBonus);
    let multiplier = effects.combined(&target, EffectKind::Multiplier)
        * (Amount::ONE + percentage / Amount::from(100));
    (additive, multiplier)
}

fn publish_production(
    entry: &Entry,
    ledger: &mut ResourceLedger,
    effects: &EffectRegistry,
    accumulator: &mut ProductionAccumulator,
) {
    let (additive, multiplier) = per_unit_scale(entry, effects);
    let source = entry.owner_key();

    let mut continuous: BTreeMap<&str, Amount> = BTreeMap::new();
    let mut whole: BTreeMap<&GeneratorTarget, Amount> = BTreeMap::new();
    for (target, rate, mode) in &entry.production {
        let total = (*rate + additive) * multiplier * entry.owned;
        match (mode, target) {
            (ProductionMode::Continuous, GeneratorTarget::Resource(id)) => {
                *continuous.entry(id.as_str()).or_default() += total;
            }
            _ => *whole.entry(target).or_default() += total,
        }
    }
    for (resource, rate) in continuous {
        ledger.set_production_per_second(resource, &source, rate, effects);
    }
    for (target, rate) in whole {
        let key = GeneratorKey {
            source: source.clone(),
            target: target.clone(),
        };
        accumulator.set_generator(key, rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EffectSpec, ProductionSpec};
    use crate::effects::ConstantEffect;
    use crate::ledger::{Redefine, ResourceDefinition};

    struct World {
        catalog: Catalog,
        ledger: ResourceLedger,
        effects: EffectRegistry,
        accumulator: ProductionAccumulator,
    }

    impl World {
        fn new(funds: i64) -> Self {
            let mut ledger = ResourceLedger::new();
            ledger.define_resource(&ResourceDefinition::new("studies", Amount::from(funds)), Redefine::Keep);
            let mut catalog = Catalog::new();
            catalog
                .define(
                    PurchasableDefinition::new("lab", "studies", Amount::from(100), Amount::from_f64(1.05))
                        .in_system(TargetSystem::STUDIES_PRODUCERS)
                        .producing(ProductionSpec {
                            resource: Some("studies".to_string()),
                            purchasable: None,
                            rate: Amount::from(2),
                            mode: ProductionMode::Continuous,
                        })
                        .with_effect(EffectSpec {
                            system: TargetSystem::GLOBAL_RESOURCE_PRODUCTION.to_string(),
                            target: Some("studies".to_string()),
                            kind: "MULTIPLIER".to_string(),
                            per_level: Amount::from_f64(0.1),
                            curve: EffectCurve::Linear,
                        }),
                )
                .unwrap();
            Self {
                catalog,
                ledger,
                effects: EffectRegistry::new(),
                accumulator: ProductionAccumulator::new(),
            }
        }

        fn purchase(&mut self, quantity: i64) -> EconomyResult<Purchase> {
            self.catalog.purchase(
                "lab",
                Amount::from(quantity),
                &mut self.ledger,
                &mut self.effects,
                &mut self.accumulator,
            )
        }

        fn buy_max(&mut self) -> EconomyResult<Purchase> {
            self.catalog
                .buy_max("lab", &mut self.ledger, &mut self.effects, &mut self.accumulator)
        }
    }

    #[test]
    fn test_purchase_spends_and_counts() {
        let mut world = World::new(1000);
        let purchase = world.purchase(2).unwrap();
        assert_eq!(purchase.owned, Amount::from(2));
        assert!((purchase.cost.to_f64() - 205.0).abs() < 1e-9);
        assert!((world.ledger.amount("studies").to_f64() - 795.0).abs() < 1e-9);
    }

    #[test]
    fn test_purchase_rejections_leave_state() {
        let mut world = World::new(150);
        assert!(matches!(world.purchase(2), Err(EconomyError::InsufficientFunds { .. })));
        assert!(matches!(world.purchase(0), Err(EconomyError::InvalidQuantity(_))));
        assert!(matches!(
            world.catalog.purchase(
                "nope",
                Amount::ONE,
                &mut world.ledger,
                &mut world.effects,
                &mut world.accumulator
            ),
            Err(EconomyError::UnknownPurchasable(_))
        ));
        assert_eq!(world.ledger.amount("studies"), Amount::from(150));
        assert_eq!(world.catalog.owned("lab"), Amount::ZERO);
    }

    #[test]
    fn test_buy_max() {
        let mut world = World::new(1000);
        let purchase = world.buy_max().unwrap();
        assert_eq!(purchase.quantity, Amount::from(8));
        assert!(world.ledger.amount("studies") < world.catalog.cost_of("lab", Amount::ONE, &world.effects).unwrap());
    }

    #[test]
    fn test_buy_max_nothing_affordable() {
        let mut world = World::new(50);
        assert_eq!(
            world.buy_max(),
            Err(EconomyError::NothingAffordable {
                purchasable: "lab".to_string()
            })
        );
    }

    #[test]
    fn test_cost_reduction_applies() {
        let mut world = World::new(1000);
        let all = TargetKey::new(TargetSystem::purchasable_cost(), TargetId::All);
        world
            .effects
            .register("market", "sale", all, EffectKind::CostReductionMultiplier, ConstantEffect(Amount::from_f64(0.5)))
            .unwrap();
        assert_eq!(world.catalog.cost_of("lab", Amount::ONE, &world.effects).unwrap(), Amount::from(50));
    }

    #[test]
    fn test_publishes_effects_and_production() {
        let mut world = World::new(1000);
        world.purchase(3).unwrap();
        // 3 labs * 2/s, times the labs' own 1 + 0.1 * 3 global multiplier.
        let rate = world.ledger.production_per_second("studies").to_f64();
        assert!((rate - 7.8).abs() < 1e-9);

        let lab_boost = TargetKey::new(
            TargetSystem::new(TargetSystem::STUDIES_PRODUCERS).unwrap(),
            TargetId::specific("lab"),
        );
        world
            .effects
            .register("skills", "x2", lab_boost, EffectKind::Multiplier, ConstantEffect(Amount::from(2)))
            .unwrap();
        world
            .catalog
            .publish_all(&mut world.ledger, &mut world.effects, &mut world.accumulator);
        let rate = world.ledger.production_per_second("studies").to_f64();
        assert!((rate - 15.6).abs() < 1e-9);
    }

    #[test]
    fn test_hard_reset_withdraws_effects() {
        let mut world = World::new(1000);
        world.purchase(1).unwrap();
        assert!(!world.effects.is_empty());
        world.catalog.hard_reset(&mut world.effects);
        assert!(world.effects.is_empty());
        assert_eq!(world.catalog.owned("lab"), Amount::ZERO);
    }

    #[test]
    fn test_hard_reset_keeps_foreign_owner_with_same_name() {
        let mut world = World::new(1000);
        world.purchase(1).unwrap();
        let target = TargetKey::new(TargetSystem::resource_production(), TargetId::All);
        world
            .effects
            .register("lab", "tenure", target.clone(), EffectKind::Multiplier, ConstantEffect(Amount::from(2)))
            .unwrap();

        world.catalog.hard_reset(&mut world.effects);
        assert_eq!(world.effects.source_count(&target, EffectKind::Multiplier), 1);
        assert_eq!(world.effects.aggregate(&target, EffectKind::Multiplier), Amount::from(2));
    }

    #[test]
    fn test_snapshot_restore_owned() {
        let mut world = World::new(1000);
        world.purchase(2).unwrap();
        let snapshot = world.catalog.snapshot();

        let mut fresh = World::new(0);
        let mut noisy = snapshot.clone();
        noisy.insert("retired".to_string(), Amount::ONE);
        fresh.catalog.restore(&noisy);
        assert_eq!(fresh.catalog.snapshot(), snapshot);
    }
}
