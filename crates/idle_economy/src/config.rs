//! # Static Configuration
//!
//! Resource and purchasable definitions, loaded once from TOML.
//!
//! ```toml
//! [[resources]]
//! id = "studies"
//! name = "Studies"
//! initial_amount = "10"
//! has_production_rate = true
//!
//! [[purchasables]]
//! id = "lab"
//! cost_resource = "studies"
//! base_cost = "10"
//! growth = "1.15"
//! effect_system = "studies_producers"
//!
//! [[purchasables.production]]
//! resource = "studies"
//! rate = "0.5"
//!
//! [[purchasables.effects]]
//! system = "purchasable_cost"
//! kind = "COST_REDUCTION_MULTIPLIER"
//! per_level = "0.98"
//! curve = "compound"
//! ```
//!
//! Amounts may be written as strings (exact) or plain numbers. Loading
//! validates cross references; effect specs with an unknown kind are
//! dropped with a warning rather than failing the whole file.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::accumulator::GeneratorTarget;
use crate::amount::Amount;
use crate::effects::{EffectCurve, EffectKind, TargetId, TargetKey, TargetSystem};
use crate::error::{EconomyError, EconomyResult};
use crate::ledger::ResourceDefinition;

/// How a producer delivers its output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionMode {
    /// Fractional per-second rate on the target resource.
    #[default]
    Continuous,
    /// Whole units only, remainder carried between ticks.
    WholeUnits,
}

/// Output of one owned unit of a purchasable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionSpec {
    /// Target resource id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Target purchasable id (whole units only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchasable: Option<String>,
    /// Per-second output of a single owned unit.
    pub rate: Amount,
    /// Delivery mode.
    #[serde(default)]
    pub mode: ProductionMode,
}

impl ProductionSpec {
    /// Resolves the single target of this spec.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::InvalidConfig` unless exactly one of
    /// `resource` and `purchasable` is set.
    pub fn target(&self) -> EconomyResult<GeneratorTarget> {
        match (&self.resource, &self.purchasable) {
            (Some(id), None) => Ok(GeneratorTarget::Resource(id.clone())),
            (None, Some(id)) => Ok(GeneratorTarget::Purchasable(id.clone())),
            _ => Err(EconomyError::InvalidConfig(
                "production needs exactly one of `resource` or `purchasable`".to_string(),
            )),
        }
    }
}

/// Modifier contributed by every owned unit of a purchasable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectSpec {
    /// Target system.
    pub system: String,
    /// Target id; absent means every member of the system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Kind name, e.g. `"MULTIPLIER"`.
    pub kind: String,
    /// Contribution per owned unit.
    pub per_level: Amount,
    /// Level-to-value curve.
    #[serde(default)]
    pub curve: EffectCurve,
}

impl EffectSpec {
    /// Parsed effect kind.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::UnknownEffectKind` for unrecognised names.
    pub fn kind(&self) -> EconomyResult<EffectKind> {
        self.kind.parse()
    }

    /// Parsed target key.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::InvalidEffectSource` for a blank system.
    pub fn target_key(&self) -> EconomyResult<TargetKey> {
        let system = TargetSystem::new(self.system.clone())?;
        Ok(TargetKey::new(
            system,
            TargetId::from_option(self.target.as_deref()),
        ))
    }
}

/// Static description of a purchasable/producer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchasableDefinition {
    /// Unique key.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Resource paid with.
    pub cost_resource: String,
    /// Price of the first unit.
    pub base_cost: Amount,
    /// Per-unit price growth.
    #[serde(default = "unit_growth")]
    pub growth: Amount,
    /// Owned count is cleared by a prestige reset.
    #[serde(default = "enabled")]
    pub resets_on_prestige: bool,
    /// System whose modifiers scale this producer's output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect_system: Option<String>,
    /// What each owned unit produces.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub production: Vec<ProductionSpec>,
    /// What each owned unit contributes to the effect registry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<EffectSpec>,
}

const fn unit_growth() -> Amount {
    Amount::ONE
}

const fn enabled() -> bool {
    true
}

impl PurchasableDefinition {
    /// Creates a definition with no production or effects.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        cost_resource: impl Into<String>,
        base_cost: Amount,
        growth: Amount,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            cost_resource: cost_resource.into(),
            base_cost,
            growth,
            resets_on_prestige: true,
            effect_system: None,
            production: Vec::new(),
            effects: Vec::new(),
        }
    }

    /// Adds a production spec.
    #[must_use]
    pub fn producing(mut self, spec: ProductionSpec) -> Self {
        self.production.push(spec);
        self
    }

    /// Adds an effect spec.
    #[must_use]
    pub fn with_effect(mut self, spec: EffectSpec) -> Self {
        self.effects.push(spec);
        self
    }

    /// Sets the system whose modifiers scale this producer.
    #[must_use]
    pub fn in_system(mut self, system: impl Into<String>) -> Self {
        self.effect_system = Some(system.into());
        self
    }
}

/// Every static definition of one economy.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomyConfig {
    /// Resource definitions.
    #[serde(default)]
    pub resources: Vec<ResourceDefinition>,
    /// Purchasable definitions.
    #[serde(default)]
    pub purchasables: Vec<PurchasableDefinition>,
}

impl EconomyConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::InvalidConfig` on syntax or validation errors.
    pub fn from_toml_str(text: &str) -> EconomyResult<Self> {
        let mut config: Self = toml::from_str(text)?;
        config.drop_unknown_effect_kinds();
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::Io` if the file cannot be read, otherwise as
    /// [`EconomyConfig::from_toml_str`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> EconomyResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Looks up a purchasable definition.
    #[must_use]
    pub fn purchasable(&self, id: &str) -> Option<&PurchasableDefinition> {
        self.purchasables.iter().find(|p| p.id == id)
    }

    fn drop_unknown_effect_kinds(&mut self) {
        for purchasable in &mut self.purchasables {
            let owner = purchasable.id.as_str();
            purchasable.effects.retain(|spec| match spec.kind() {
                Ok(_) => true,
                Err(err) => {
                    tracing::warn!(purchasable = owner, %err, "effect spec skipped");
                    false
                }
            });
        }
    }

    /// Checks ids and cross references.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::InvalidConfig` describing the first problem:
    /// duplicate ids, unknown resources or purchasables, non-positive base
    /// costs or growth factors, negative rates, or malformed targets.
    pub fn validate(&self) -> EconomyResult<()> {
        let invalid = |msg: String| -> EconomyResult<()> { Err(EconomyError::InvalidConfig(msg)) };

        let mut resources = HashSet::new();
        for resource in &self.resources {
            if resource.id.trim().is_empty() {
                return invalid("resource id must not be empty".to_string());
            }
            if !resources.insert(resource.id.as_str()) {
                return invalid(format!("duplicate resource id {:?}", resource.id));
            }
            if resource.initial_amount.is_negative() {
                return invalid(format!("resource {:?} starts negative", resource.id));
            }
        }

        let mut purchasables = HashSet::new();
        for p in &self.purchasables {
            if p.id.trim().is_empty() {
                return invalid("purchasable id must not be empty".to_string());
            }
            if !purchasables.insert(p.id.as_str()) {
                return invalid(format!("duplicate purchasable id {:?}", p.id));
            }
        }

        for p in &self.purchasables {
            if !resources.contains(p.cost_resource.as_str()) {
                return invalid(format!(
                    "purchasable {:?} costs unknown resource {:?}",
                    p.id, p.cost_resource
                ));
            }
            if !p.base_cost.is_positive() {
                return invalid(format!("purchasable {:?} needs a positive base cost", p.id));
            }
            if !p.growth.is_positive() {
                return invalid(format!("purchasable {:?} needs a positive growth factor", p.id));
            }
            if let Some(system) = &p.effect_system {
                TargetSystem::new(system.clone())
                    .map_err(|err| EconomyError::InvalidConfig(format!("{}: {err}", p.id)))?;
            }
            for spec in &p.production {
                if spec.rate.is_negative() {
                    return invalid(format!("purchasable {:?} has a negative rate", p.id));
                }
                let target = spec
                    .target()
                    .map_err(|err| EconomyError::InvalidConfig(format!("{}: {err}", p.id)))?;
                match target {
                    GeneratorTarget::Resource(id) if !resources.contains(id.as_str()) => {
                        return invalid(format!("purchasable {:?} produces unknown resource {id:?}", p.id));
                    }
                    GeneratorTarget::Purchasable(id) if !purchasables.contains(id.as_str()) => {
                        return invalid(format!("purchasable {:?} produces unknown purchasable {id:?}", p.id));
                    }
                    GeneratorTarget::Purchasable(id) if spec.mode != ProductionMode::WholeUnits => {
                        return invalid(format!(
                            "purchasable {:?} must produce {id:?} in whole units",
                            p.id
                        ));
                    }
                    _ => {}
                }
            }
            for spec in &p.effects {
                spec.target_key()
                    .map_err(|err| EconomyError::InvalidConfig(format!("{}: {err}", p.id)))?;
            }
        }
        Ok(())
    }
}
