//! # Resource Ledger
//!
//! Named balances with unlock/visibility flags and per-source production.
//!
//! Every resource is declared once from a [`ResourceDefinition`]. After
//! that its balance only moves through [`ResourceLedger::add_amount`] and
//! [`ResourceLedger::spend_amount`], and a spend never drives it below
//! zero.
//!
//! ## Production
//!
//! Producers publish a rate under their own source key. The resource's
//! per-second rate is the sum of those rates times the production
//! multiplier the effect registry reports for the resource:
//!
//! ```text
//! per_second = sum(source rates) * effects(global_resource_production, id)
//! ```
//!
//! Effect changes do not push into the ledger; callers follow them with
//! [`ResourceLedger::refresh_production`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::effects::{EffectKind, EffectRegistry, TargetId, TargetKey, TargetSystem};

// ============================================================================
// Definitions
// ============================================================================

/// Static description of a resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDefinition {
    /// Unique key.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Balance on creation and after resets.
    #[serde(default)]
    pub initial_amount: Amount,
    /// Shown to the player from the start.
    #[serde(default = "enabled")]
    pub visible: bool,
    /// Usable from the start.
    #[serde(default = "enabled")]
    pub unlocked: bool,
    /// Whether a per-second rate is displayed for it.
    #[serde(default)]
    pub has_production_rate: bool,
    /// Cleared by a prestige reset.
    #[serde(default = "enabled")]
    pub resets_on_prestige: bool,
}

const fn enabled() -> bool {
    true
}

impl ResourceDefinition {
    /// Creates a visible, unlocked definition that resets on prestige.
    #[must_use]
    pub fn new(id: impl Into<String>, initial_amount: Amount) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            initial_amount,
            visible: true,
            unlocked: true,
            has_production_rate: false,
            resets_on_prestige: true,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Marks the resource as having a displayed production rate.
    #[must_use]
    pub const fn with_production_rate(mut self) -> Self {
        self.has_production_rate = true;
        self
    }

    /// Keeps the resource across prestige resets.
    #[must_use]
    pub const fn persistent(mut self) -> Self {
        self.resets_on_prestige = false;
        self
    }

    /// Starts hidden and locked.
    #[must_use]
    pub const fn locked(mut self) -> Self {
        self.visible = false;
        self.unlocked = false;
        self
    }
}

/// What to do when a resource id is declared a second time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Redefine {
    /// Keep the live state, only refresh the stored definition.
    #[default]
    Keep,
    /// Reset the balance to the definition's initial amount.
    Reset,
}

// ============================================================================
// Live state
// ============================================================================

/// Live state of one resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resource {
    amount: Amount,
    unlocked: bool,
    visible: bool,
    sources: BTreeMap<String, Amount>,
    per_second: Amount,
    total_earned: Amount,
}

impl Resource {
    fn from_definition(def: &ResourceDefinition) -> Self {
        Self {
            amount: def.initial_amount,
            unlocked: def.unlocked,
            visible: def.visible,
            sources: BTreeMap::new(),
            per_second: Amount::ZERO,
            total_earned: Amount::ZERO,
        }
    }

    /// Current balance.
    #[must_use]
    pub const fn amount(&self) -> Amount {
        self.amount
    }

    /// Whether the resource is usable.
    #[must_use]
    pub const fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    /// Whether the resource is shown.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    /// Effective per-second rate.
    #[must_use]
    pub const fn per_second(&self) -> Amount {
        self.per_second
    }

    /// Lifetime sum of positive additions.
    #[must_use]
    pub const fn total_earned(&self) -> Amount {
        self.total_earned
    }

    /// Raw rate published by one source, before multipliers.
    #[must_use]
    pub fn source_rate(&self, source: &str) -> Option<Amount> {
        self.sources.get(source).copied()
    }

    /// Raw rates of every source.
    pub fn sources(&self) -> impl Iterator<Item = (&str, Amount)> {
        self.sources.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Persisted state of one resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    /// Balance.
    pub amount: Amount,
    /// Unlock flag.
    pub unlocked: bool,
    /// Visibility flag.
    pub visible: bool,
    /// Lifetime earnings.
    #[serde(default)]
    pub total_earned: Amount,
}

/// Persisted ledger, keyed by resource id.
pub type LedgerSnapshot = BTreeMap<String, ResourceSnapshot>;

// ============================================================================
// Ledger
// ============================================================================

/// Owner of every resource balance.
#[derive(Clone, Debug, Default)]
pub struct ResourceLedger {
    definitions: BTreeMap<String, ResourceDefinition>,
    resources: BTreeMap<String, Resource>,
}

impl ResourceLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a resource.
    ///
    /// Declaring an existing id keeps its live state unless `redefine` is
    /// [`Redefine::Reset`]. Returns true if the resource is new.
    pub fn define_resource(&mut self, def: &ResourceDefinition, redefine: Redefine) -> bool {
        self.definitions.insert(def.id.clone(), def.clone());
        match self.resources.get_mut(&def.id) {
            Some(resource) => {
                if redefine == Redefine::Reset {
                    resource.amount = def.initial_amount;
                }
                false
            }
            None => {
                self.resources
                    .insert(def.id.clone(), Resource::from_definition(def));
                true
            }
        }
    }

    /// Shorthand for [`ResourceLedger::define_resource`] with [`Redefine::Keep`].
    pub fn define(
        &mut self,
        id: &str,
        name: &str,
        initial_amount: Amount,
        visible: bool,
        unlocked: bool,
        has_production_rate: bool,
    ) -> bool {
        let def = ResourceDefinition {
            id: id.to_string(),
            name: name.to_string(),
            initial_amount,
            visible,
            unlocked,
            has_production_rate,
            resets_on_prestige: true,
        };
        self.define_resource(&def, Redefine::Keep)
    }

    /// Whether `id` is declared.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.resources.contains_key(id)
    }

    /// Balance of `id`, zero if unknown.
    #[must_use]
    pub fn amount(&self, id: &str) -> Amount {
        self.resources.get(id).map_or(Amount::ZERO, Resource::amount)
    }

    /// Live state of `id`.
    #[must_use]
    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.get(id)
    }

    /// Static definition of `id`.
    #[must_use]
    pub fn definition(&self, id: &str) -> Option<&ResourceDefinition> {
        self.definitions.get(id)
    }

    /// Declared ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    /// Adds to a balance.
    ///
    /// Returns false for unknown ids and negative amounts.
    pub fn add_amount(&mut self, id: &str, amount: Amount) -> bool {
        if amount.is_negative() {
            tracing::warn!(resource = id, %amount, "negative add rejected");
            return false;
        }
        let Some(resource) = self.resources.get_mut(id) else {
            tracing::warn!(resource = id, "add to unknown resource");
            return false;
        };
        resource.amount += amount;
        resource.total_earned += amount;
        true
    }

    /// Removes from a balance if it covers `amount`.
    ///
    /// Returns false without mutating for unknown ids, negative amounts and
    /// insufficient balances.
    pub fn spend_amount(&mut self, id: &str, amount: Amount) -> bool {
        if amount.is_negative() {
            tracing::warn!(resource = id, %amount, "negative spend rejected");
            return false;
        }
        match self.resources.get_mut(id) {
            Some(resource) if resource.amount >= amount => {
                resource.amount -= amount;
                true
            }
            Some(_) => false,
            None => {
                tracing::warn!(resource = id, "spend from unknown resource");
                false
            }
        }
    }

    /// Whether the balance of `id` covers `amount`.
    #[must_use]
    pub fn can_afford(&self, id: &str, amount: Amount) -> bool {
        self.resources.get(id).is_some_and(|r| r.amount >= amount)
    }

    /// Unlocks (and reveals) a resource.
    pub fn unlock_resource(&mut self, id: &str) -> bool {
        let Some(resource) = self.resources.get_mut(id) else {
            return false;
        };
        resource.unlocked = true;
        resource.visible = true;
        true
    }

    /// Shows or hides a resource.
    pub fn set_resource_visibility(&mut self, id: &str, visible: bool) -> bool {
        let Some(resource) = self.resources.get_mut(id) else {
            return false;
        };
        resource.visible = visible;
        true
    }

    /// Publishes the raw rate of one production source.
    ///
    /// A zero rate removes the source. The resource's effective rate is
    /// recomputed against `effects`.
    pub fn set_production_per_second(
        &mut self,
        id: &str,
        source: &str,
        rate: Amount,
        effects: &EffectRegistry,
    ) -> bool {
        let Some(resource) = self.resources.get_mut(id) else {
            tracing::warn!(resource = id, source, "production for unknown resource");
            return false;
        };
        if rate.is_zero() {
            resource.sources.remove(source);
        } else {
            resource.sources.insert(source.to_string(), rate);
        }
        resource.per_second = effective_rate(id, resource, effects);
        true
    }

    /// Effective per-second rate of `id`, zero if unknown.
    #[must_use]
    pub fn production_per_second(&self, id: &str) -> Amount {
        self.resources.get(id).map_or(Amount::ZERO, Resource::per_second)
    }

    /// Recomputes every effective rate after effect changes.
    pub fn refresh_production(&mut self, effects: &EffectRegistry) {
        for (id, resource) in &mut self.resources {
            resource.per_second = effective_rate(id, resource, effects);
        }
    }

    /// Lifetime earnings of `id`, zero if unknown.
    #[must_use]
    pub fn total_earned(&self, id: &str) -> Amount {
        self.resources.get(id).map_or(Amount::ZERO, Resource::total_earned)
    }

    /// Resets every resource flagged `resets_on_prestige`.
    ///
    /// Balances return to their initial amount and production sources are
    /// dropped. Flags and lifetime earnings survive.
    pub fn perform_prestige_reset(&mut self) {
        for (id, resource) in &mut self.resources {
            let Some(def) = self.definitions.get(id) else {
                continue;
            };
            if def.resets_on_prestige {
                resource.amount = def.initial_amount;
                resource.sources.clear();
                resource.per_second = Amount::ZERO;
            }
        }
    }

    /// Returns every resource to its definition defaults.
    pub fn perform_hard_reset(&mut self) {
        for (id, resource) in &mut self.resources {
            if let Some(def) = self.definitions.get(id) {
                *resource = Resource::from_definition(def);
            }
        }
    }

    /// Captures balances and flags.
    #[must_use]
    pub fn snapshot(&self) -> LedgerSnapshot {
        self.resources
            .iter()
            .map(|(id, r)| {
                let snap = ResourceSnapshot {
                    amount: r.amount,
                    unlocked: r.unlocked,
                    visible: r.visible,
                    total_earned: r.total_earned,
                };
                (id.clone(), snap)
            })
            .collect()
    }

    /// Applies a snapshot. Unknown ids are skipped.
    pub fn restore(&mut self, snapshot: &LedgerSnapshot) {
        for (id, snap) in snapshot {
            let Some(resource) = self.resources.get_mut(id) else {
                tracing::warn!(resource = %id, "snapshot entry for unknown resource skipped");
                continue;
            };
            resource.amount = snap.amount;
            resource.unlocked = snap.unlocked;
            resource.visible = snap.visible;
            resource.total_earned = snap.total_earned;
        }
    }
}

fn effective_rate(id: &str, resource: &Resource, effects: &EffectRegistry) -> Amount {
    if resource.sources.is_empty() {
        return Amount::ZERO;
    }
    let raw: Amount = resource.sources.values().copied().sum();
    let target = TargetKey::new(TargetSystem::resource_production(), TargetId::specific(id));
    raw * effects.combined(&target, EffectKind::Multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::ConstantEffect;

    fn ledger() -> ResourceLedger {
        let mut ledger = ResourceLedger::new();
        ledger.define_resource(
            &ResourceDefinition::new("studies", Amount::from(10)).with_production_rate(),
            Redefine::Keep,
        );
        ledger.define_resource(
            &ResourceDefinition::new("insight", Amount::ZERO).persistent(),
            Redefine::Keep,
        );
        ledger
    }

    #[test]
    fn test_define_is_idempotent() {
        let mut ledger = ledger();
        assert!(ledger.add_amount("studies", Amount::from(5)));
        let def = ResourceDefinition::new("studies", Amount::from(10));
        assert!(!ledger.define_resource(&def, Redefine::Keep));
        assert_eq!(ledger.amount("studies"), Amount::from(15));
        assert!(!ledger.define_resource(&def, Redefine::Reset));
        assert_eq!(ledger.amount("studies"), Amount::from(10));
        assert!(ledger.define("gold", "Gold", Amount::ONE, true, true, false));
        assert_eq!(ledger.ids().collect::<Vec<_>>(), vec!["gold", "insight", "studies"]);
    }

    #[test]
    fn test_add_tracks_total_earned() {
        let mut ledger = ledger();
        assert!(ledger.add_amount("studies", Amount::from(5)));
        assert!(ledger.spend_amount("studies", Amount::from(12)));
        assert!(ledger.add_amount("studies", Amount::from(1)));
        assert_eq!(ledger.amount("studies"), Amount::from(4));
        assert_eq!(ledger.total_earned("studies"), Amount::from(6));
    }

    #[test]
    fn test_rejected_mutations() {
        let mut ledger = ledger();
        assert!(!ledger.add_amount("studies", Amount::from(-1)));
        assert!(!ledger.add_amount("missing", Amount::ONE));
        assert!(!ledger.spend_amount("studies", Amount::from(11)));
        assert!(!ledger.spend_amount("studies", Amount::from(-1)));
        assert!(!ledger.spend_amount("missing", Amount::ONE));
        assert_eq!(ledger.amount("studies"), Amount::from(10));
    }

    #[test]
    fn test_spend_to_exactly_zero() {
        let mut ledger = ledger();
        assert!(ledger.can_afford("studies", Amount::from(10)));
        assert!(ledger.spend_amount("studies", Amount::from(10)));
        assert_eq!(ledger.amount("studies"), Amount::ZERO);
        assert!(!ledger.can_afford("studies", Amount::ONE));
        assert!(!ledger.can_afford("missing", Amount::ZERO));
    }

    #[test]
    fn test_exact_remainder_after_spend() {
        let mut ledger = ResourceLedger::new();
        ledger.define_resource(&ResourceDefinition::new("gold", Amount::from(903)), Redefine::Keep);
        assert!(ledger.spend_amount("gold", Amount::from(900)));
        assert!(ledger.can_afford("gold", Amount::from(3)));
        assert!(ledger.spend_amount("gold", Amount::from(3)));
        assert_eq!(ledger.amount("gold"), Amount::ZERO);

        ledger.add_amount("gold", Amount::parse("1000.25").unwrap());
        assert!(ledger.spend_amount("gold", Amount::parse("999.5").unwrap()));
        assert!(ledger.can_afford("gold", Amount::parse("0.75").unwrap()));
        assert!(!ledger.can_afford("gold", Amount::parse("0.76").unwrap()));
    }

    #[test]
    fn test_unlock_and_visibility() {
        let mut ledger = ResourceLedger::new();
        ledger.define_resource(&ResourceDefinition::new("gems", Amount::ZERO).locked(), Redefine::Keep);
        let gems = ledger.resource("gems").unwrap();
        assert!(!gems.is_unlocked() && !gems.is_visible());

        assert!(ledger.unlock_resource("gems"));
        assert!(ledger.resource("gems").unwrap().is_unlocked());
        assert!(ledger.set_resource_visibility("gems", false));
        assert!(!ledger.resource("gems").unwrap().is_visible());
        assert!(!ledger.unlock_resource("missing"));
    }

    #[test]
    fn test_production_sources_and_multiplier() {
        let mut ledger = ledger();
        let mut effects = EffectRegistry::new();
        assert!(ledger.set_production_per_second("studies", "lab", Amount::from(3), &effects));
        assert!(ledger.set_production_per_second("studies", "library", Amount::from(2), &effects));
        assert_eq!(ledger.production_per_second("studies"), Amount::from(5));

        let target = TargetKey::new(TargetSystem::resource_production(), TargetId::specific("studies"));
        effects
            .register("skills", "focus", target, EffectKind::Multiplier, ConstantEffect(Amount::from(2)))
            .unwrap();
        ledger.refresh_production(&effects);
        assert_eq!(ledger.production_per_second("studies"), Amount::from(10));

        assert!(ledger.set_production_per_second("studies", "lab", Amount::ZERO, &effects));
        assert_eq!(ledger.production_per_second("studies"), Amount::from(4));
        assert!(ledger.resource("studies").unwrap().source_rate("lab").is_none());
        assert!(!ledger.set_production_per_second("missing", "lab", Amount::ONE, &effects));
    }

    #[test]
    fn test_prestige_reset_respects_flags() {
        let mut ledger = ledger();
        let effects = EffectRegistry::new();
        ledger.add_amount("studies", Amount::from(90));
        ledger.add_amount("insight", Amount::from(3));
        ledger.set_production_per_second("studies", "lab", Amount::ONE, &effects);

        ledger.perform_prestige_reset();
        assert_eq!(ledger.amount("studies"), Amount::from(10));
        assert_eq!(ledger.production_per_second("studies"), Amount::ZERO);
        assert_eq!(ledger.total_earned("studies"), Amount::from(90));
        assert_eq!(ledger.amount("insight"), Amount::from(3));
    }

    #[test]
    fn test_hard_reset_clears_everything() {
        let mut ledger = ledger();
        ledger.add_amount("insight", Amount::from(3));
        ledger.set_resource_visibility("studies", false);
        ledger.perform_hard_reset();
        assert_eq!(ledger.amount("insight"), Amount::ZERO);
        assert_eq!(ledger.total_earned("insight"), Amount::ZERO);
        assert!(ledger.resource("studies").unwrap().is_visible());
    }

    #[test]
    fn test_snapshot_restore() {
        let mut ledger = ledger();
        ledger.add_amount("studies", Amount::parse("1e100").unwrap());
        let snapshot = ledger.snapshot();

        let mut fresh = self::ledger();
        let mut with_extra = snapshot.clone();
        with_extra.insert(
            "retired".to_string(),
            ResourceSnapshot {
                amount: Amount::ONE,
                unlocked: true,
                visible: true,
                total_earned: Amount::ONE,
            },
        );
        fresh.restore(&with_extra);
        assert_eq!(fresh.snapshot(), snapshot);
        assert!(!fresh.contains("retired"));
    }
}
