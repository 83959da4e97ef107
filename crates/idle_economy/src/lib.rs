//! # Idle Economy
//!
//! Economic simulation core for incremental ("idle") games.
//!
//! ## Design Principles
//!
//! 1. **One number type** - Every economy value is an [`Amount`], a
//!    mantissa/exponent decimal that stays exact enough for affordability
//!    checks far beyond `10^300`
//! 2. **Closed-form costs** - Buying one unit or a million costs the same
//!    work: geometric series and logarithmic inversion, no per-unit loops
//! 3. **Anonymous modifiers** - Features publish effect sources into a
//!    registry; consumers only ever see the aggregate
//! 4. **External configuration** - Resources and purchasables live in TOML
//!
//! ## Thread Safety
//!
//! A [`Simulation`] is a plain owned value driven from one thread. Hosts
//! with more threads wrap it in a [`SharedSimulation`].
//!
//! ## Example
//!
//! ```rust
//! use idle_economy::{Amount, EconomyConfig, Simulation};
//!
//! let config = EconomyConfig::from_toml_str(r#"
//! [[resources]]
//! id = "studies"
//! initial_amount = "1000"
//!
//! [[purchasables]]
//! id = "lab"
//! cost_resource = "studies"
//! base_cost = "100"
//! growth = "1.05"
//!
//! [[purchasables.production]]
//! resource = "studies"
//! rate = "2"
//! "#)?;
//!
//! let mut sim = Simulation::from_config(&config)?;
//! let bought = sim.buy_max("lab")?;
//! assert_eq!(bought.quantity, Amount::from(8));
//!
//! sim.tick(1.0)?;
//! println!("{} studies", sim.amount("studies").format());
//! # Ok::<(), idle_economy::EconomyError>(())
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod accumulator;
pub mod amount;
pub mod catalog;
pub mod config;
pub mod cost;
pub mod effects;
pub mod error;
pub mod ledger;
pub mod shared;
pub mod simulation;

pub use accumulator::{GeneratorKey, GeneratorTarget, ProductionAccumulator, TickReport};
pub use amount::Amount;
pub use catalog::{Catalog, Purchase};
pub use config::{
    EconomyConfig, EffectSpec, ProductionMode, ProductionSpec, PurchasableDefinition,
};
pub use cost::{cost_of, effective_base_cost, max_affordable, ScalingCost};
pub use effects::{
    ConstantEffect, EffectCurve, EffectKind, EffectProvider, EffectRegistry, LeveledEffect,
    SourceKey, TargetId, TargetKey, TargetSystem,
};
pub use error::{EconomyError, EconomyResult};
pub use ledger::{
    LedgerSnapshot, Redefine, Resource, ResourceDefinition, ResourceLedger, ResourceSnapshot,
};
pub use shared::SharedSimulation;
pub use simulation::{EconomySnapshot, Simulation};
