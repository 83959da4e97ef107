//! # Effect Registry
//!
//! **Many features, one modifier per target.**
//!
//! Skills, market upgrades, prestige producers and achievements all want to
//! boost the same handful of numbers. Each of them registers an effect
//! source against a `(target, kind)` bucket; consumers ask the registry for
//! the aggregate and never learn who contributed.
//!
//! ## Combination rules
//!
//! | kind                        | identity | combine  |
//! |-----------------------------|----------|----------|
//! | `Multiplier`                | 1        | product  |
//! | `AdditiveBonus`             | 0        | sum      |
//! | `PercentageBonus`           | 0        | sum      |
//! | `CostReductionMultiplier`   | 1        | product  |
//!
//! Cost reductions are scaling factors below 1 and compound
//! multiplicatively: two independent 10% reductions give `0.9 * 0.9 = 0.81`,
//! not `0.8`.
//!
//! ## Providers
//!
//! Values are never cached. Every aggregation asks every live provider for
//! its current value, so a provider that errors only drops out of that one
//! call (with a warning) and cannot poison the others.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::error::{EconomyError, EconomyResult};

/// Namespace of an effect target, e.g. `"studies_producers"`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetSystem(String);

impl TargetSystem {
    /// Producers bought with the study resource.
    pub const STUDIES_PRODUCERS: &'static str = "studies_producers";
    /// Per-resource passive production.
    pub const GLOBAL_RESOURCE_PRODUCTION: &'static str = "global_resource_production";
    /// Producers bought with the prestige resource.
    pub const PRESTIGE_PRODUCERS: &'static str = "prestige_producers";
    /// Purchase prices of catalog entries.
    pub const PURCHASABLE_COST: &'static str = "purchasable_cost";

    /// Creates a validated target system.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::InvalidEffectSource` if the name is blank.
    pub fn new(name: impl Into<String>) -> EconomyResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(EconomyError::InvalidEffectSource(
                "target system must not be empty".to_string(),
            ));
        }
        Ok(Self(name))
    }

    /// The `global_resource_production` system.
    #[must_use]
    pub fn resource_production() -> Self {
        Self(Self::GLOBAL_RESOURCE_PRODUCTION.to_string())
    }

    /// The `purchasable_cost` system.
    #[must_use]
    pub fn purchasable_cost() -> Self {
        Self(Self::PURCHASABLE_COST.to_string())
    }

    /// The system name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TargetSystem {
    type Error = EconomyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TargetSystem> for String {
    fn from(value: TargetSystem) -> Self {
        value.0
    }
}

impl fmt::Display for TargetSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Member of a target system: one specific id, or every member at once.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TargetId {
    /// Applies to every member of the system.
    All,
    /// Applies to one producer/resource id.
    Specific(String),
}

impl TargetId {
    /// Shorthand for `TargetId::Specific`.
    #[must_use]
    pub fn specific(id: impl Into<String>) -> Self {
        Self::Specific(id.into())
    }

    /// Maps an optional id to `Specific`, or `All` when absent.
    #[must_use]
    pub fn from_option(id: Option<&str>) -> Self {
        id.map_or(Self::All, Self::specific)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("*"),
            Self::Specific(id) => f.write_str(id),
        }
    }
}

/// Fully-qualified effect target.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetKey {
    /// Namespace.
    pub system: TargetSystem,
    /// Member within the namespace.
    pub id: TargetId,
}

impl TargetKey {
    /// Creates a target key.
    #[must_use]
    pub const fn new(system: TargetSystem, id: TargetId) -> Self {
        Self { system, id }
    }

    /// The same system with the `All` sentinel.
    #[must_use]
    pub fn with_all(&self) -> Self {
        Self::new(self.system.clone(), TargetId::All)
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.system, self.id)
    }
}

/// How values of one bucket combine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EffectKind {
    /// Ready-made multiplier (`1.1` for +10%); product, identity 1.
    Multiplier,
    /// Flat bonus; sum, identity 0.
    AdditiveBonus,
    /// Percentage points; sum, identity 0.
    PercentageBonus,
    /// Cost scaling factor below 1; product, identity 1.
    CostReductionMultiplier,
}

impl EffectKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::Multiplier,
        Self::AdditiveBonus,
        Self::PercentageBonus,
        Self::CostReductionMultiplier,
    ];

    /// True for kinds that combine by product.
    #[inline]
    #[must_use]
    pub const fn is_multiplicative(self) -> bool {
        matches!(self, Self::Multiplier | Self::CostReductionMultiplier)
    }

    /// Neutral value returned for an empty bucket.
    #[inline]
    #[must_use]
    pub const fn identity(self) -> Amount {
        if self.is_multiplicative() {
            Amount::ONE
        } else {
            Amount::ZERO
        }
    }

    /// Folds one more value into an accumulator.
    #[inline]
    #[must_use]
    pub fn combine(self, acc: Amount, value: Amount) -> Amount {
        if self.is_multiplicative() {
            acc * value
        } else {
            acc + value
        }
    }

    /// Canonical name as used in configuration files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Multiplier => "MULTIPLIER",
            Self::AdditiveBonus => "ADDITIVE_BONUS",
            Self::PercentageBonus => "PERCENTAGE_BONUS",
            Self::CostReductionMultiplier => "COST_REDUCTION_MULTIPLIER",
        }
    }
}

impl FromStr for EffectKind {
    type Err = EconomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EconomyError::UnknownEffectKind(s.to_string()))
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one source inside a bucket: `owner:source`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceKey {
    /// Feature that owns the source (skill tree, market, ...).
    pub owner: String,
    /// Key unique within the owner.
    pub source: String,
}

impl SourceKey {
    /// Creates a validated source key.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::InvalidEffectSource` if either part is blank.
    pub fn new(owner: impl Into<String>, source: impl Into<String>) -> EconomyResult<Self> {
        let (owner, source) = (owner.into(), source.into());
        if owner.trim().is_empty() || source.trim().is_empty() {
            return Err(EconomyError::InvalidEffectSource(format!(
                "owner and source must not be empty (got {owner:?}:{source:?})"
            )));
        }
        Ok(Self { owner, source })
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner, self.source)
    }
}

/// Something that can report its current modifier value.
pub trait EffectProvider: Send + Sync {
    /// Current contribution, already in the form its kind expects
    /// (e.g. `1.1` for a +10% multiplier).
    ///
    /// # Errors
    ///
    /// Any error makes the registry skip this provider for one aggregation.
    fn current_value(&self) -> EconomyResult<Amount>;
}

impl<F> EffectProvider for F
where
    F: Fn() -> EconomyResult<Amount> + Send + Sync,
{
    fn current_value(&self) -> EconomyResult<Amount> {
        self()
    }
}

/// A provider with a fixed value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConstantEffect(pub Amount);

impl EffectProvider for ConstantEffect {
    fn current_value(&self) -> EconomyResult<Amount> {
        Ok(self.0)
    }
}

/// How a per-level value turns into a contribution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectCurve {
    /// `identity + level * per_level` (e.g. `1 + 0.1 * level`).
    #[default]
    Linear,
    /// `per_level ^ level` (e.g. `0.95 ^ level` for cost reductions).
    Compound,
}

/// "Level × per-level bonus" provider, re-registered on every level change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeveledEffect {
    /// Current level / owned count.
    pub level: Amount,
    /// Contribution per level.
    pub per_level: Amount,
    /// Level-to-value curve.
    pub curve: EffectCurve,
    /// Kind the value is shaped for.
    pub kind: EffectKind,
}

impl LeveledEffect {
    /// Creates a leveled effect.
    #[must_use]
    pub const fn new(level: Amount, per_level: Amount, curve: EffectCurve, kind: EffectKind) -> Self {
        Self {
            level,
            per_level,
            curve,
            kind,
        }
    }
}

impl EffectProvider for LeveledEffect {
    fn current_value(&self) -> EconomyResult<Amount> {
        if self.level.is_negative() {
            return Err(EconomyError::ProviderFailed(format!(
                "negative level {}",
                self.level
            )));
        }
        Ok(match self.curve {
            EffectCurve::Linear => self.kind.identity() + self.level * self.per_level,
            EffectCurve::Compound => self.per_level.pow(self.level.to_f64()),
        })
    }
}

type Bucket = BTreeMap<SourceKey, Box<dyn EffectProvider>>;

/// Keyed multimap of effect sources.
#[derive(Default)]
pub struct EffectRegistry {
    buckets: HashMap<(TargetKey, EffectKind), Bucket>,
}

impl fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for ((target, kind), bucket) in &self.buckets {
            let keys: Vec<String> = bucket.keys().map(ToString::to_string).collect();
            map.entry(&format!("{target} {kind}"), &keys);
        }
        map.finish()
    }
}

impl EffectRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the source `owner:source` on a bucket.
    ///
    /// Re-registering the same composite key swaps the provider, so owners
    /// can call this on every level-up without leaking duplicates.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::InvalidEffectSource` for blank keys.
    pub fn register<P>(
        &mut self,
        owner: &str,
        source: &str,
        target: TargetKey,
        kind: EffectKind,
        provider: P,
    ) -> EconomyResult<()>
    where
        P: EffectProvider + 'static,
    {
        let key = SourceKey::new(owner, source)?;
        self.buckets
            .entry((target, kind))
            .or_default()
            .insert(key, Box::new(provider));
        Ok(())
    }

    /// Removes one source. Returns whether it existed.
    pub fn unregister(&mut self, owner: &str, source: &str, target: &TargetKey, kind: EffectKind) -> bool {
        let bucket_key = (target.clone(), kind);
        let Some(bucket) = self.buckets.get_mut(&bucket_key) else {
            return false;
        };
        let removed = bucket
            .remove(&SourceKey {
                owner: owner.to_string(),
                source: source.to_string(),
            })
            .is_some();
        if bucket.is_empty() {
            self.buckets.remove(&bucket_key);
        }
        removed
    }

    /// Removes every source belonging to `owner`. Returns how many went.
    pub fn unregister_owner(&mut self, owner: &str) -> usize {
        let mut removed = 0;
        self.buckets.retain(|_, bucket| {
            let before = bucket.len();
            bucket.retain(|key, _| key.owner != owner);
            removed += before - bucket.len();
            !bucket.is_empty()
        });
        removed
    }

    /// Combines every live provider of one bucket.
    ///
    /// Failing providers are skipped and logged.
    #[must_use]
    pub fn aggregate(&self, target: &TargetKey, kind: EffectKind) -> Amount {
        let Some(bucket) = self.buckets.get(&(target.clone(), kind)) else {
            return kind.identity();
        };
        bucket
            .iter()
            .filter_map(|(key, provider)| match provider.current_value() {
                Ok(value) => Some(value),
                Err(err) => {
                    tracing::warn!(source = %key, %target, %kind, %err, "effect provider skipped");
                    None
                }
            })
            .fold(kind.identity(), |acc, value| kind.combine(acc, value))
    }

    /// The specific-id aggregate combined with the system-wide `All` one.
    #[must_use]
    pub fn combined(&self, target: &TargetKey, kind: EffectKind) -> Amount {
        let all = self.aggregate(&target.with_all(), kind);
        if target.id == TargetId::All {
            return all;
        }
        kind.combine(self.aggregate(target, kind), all)
    }

    /// [`EffectRegistry::combined`] addressed by `system/id`.
    #[must_use]
    pub fn combined_multiplier(&self, system: &TargetSystem, id: &TargetId, kind: EffectKind) -> Amount {
        self.combined(&TargetKey::new(system.clone(), id.clone()), kind)
    }

    /// `aggregate(.., Multiplier)` for `system/id`.
    #[must_use]
    pub fn production_multiplier(&self, system: &TargetSystem, id: &TargetId) -> Amount {
        self.aggregate(&TargetKey::new(system.clone(), id.clone()), EffectKind::Multiplier)
    }

    /// `aggregate(.., CostReductionMultiplier)` for `system/id`.
    #[must_use]
    pub fn cost_reduction_multiplier(&self, system: &TargetSystem, id: &TargetId) -> Amount {
        self.aggregate(
            &TargetKey::new(system.clone(), id.clone()),
            EffectKind::CostReductionMultiplier,
        )
    }

    /// Number of sources registered on a bucket.
    #[must_use]
    pub fn source_count(&self, target: &TargetKey, kind: EffectKind) -> usize {
        self.buckets.get(&(target.clone(), kind)).map_or(0, BTreeMap::len)
    }

    /// Returns true when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Per-source values of a bucket; `None` marks a failing provider.
    #[must_use]
    pub fn breakdown(&self, target: &TargetKey, kind: EffectKind) -> Vec<(SourceKey, Option<Amount>)> {
        self.buckets
            .get(&(target.clone(), kind))
            .map(|bucket| {
                bucket
                    .iter()
                    .map(|(key, provider)| (key.clone(), provider.current_value().ok()))
                    .collect()
            })
            .unwrap_or_default()
    }
}
