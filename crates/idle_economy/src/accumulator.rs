//! # Production Accumulator
//!
//! Turns elapsed time into ledger mutations, once per tick.
//!
//! Two modes exist:
//!
//! - **Continuous**: every resource with a non-zero effective rate gains
//!   `rate * dt` directly, fractions included.
//! - **Whole-unit generators**: a generator builds up fractional progress
//!   and only emits whole units, carrying the remainder into the next tick.
//!   Emitting into a resource happens here; emitting into a purchasable is
//!   reported back so the owner of the catalog can grant it.
//!
//! Splitting a span of time across many ticks emits the same total as one
//! big tick, `floor(rate * T)`, however long the span. Progress is an
//! [`Amount`], so `0.1 * 10` is exactly 1 and no extra snapping is needed.

use std::collections::BTreeMap;
use std::fmt;

use crate::amount::Amount;
use crate::error::{EconomyError, EconomyResult};
use crate::ledger::ResourceLedger;

/// What a whole-unit generator emits into.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GeneratorTarget {
    /// Units of a ledger resource.
    Resource(String),
    /// Owned units of a purchasable.
    Purchasable(String),
}

/// Identity of one whole-unit generator.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GeneratorKey {
    /// Producer responsible for the generator.
    pub source: String,
    /// Receiver of the emitted units.
    pub target: GeneratorTarget,
}

impl GeneratorKey {
    /// Generator emitting into a resource.
    #[must_use]
    pub fn resource(source: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: GeneratorTarget::Resource(resource.into()),
        }
    }

    /// Generator emitting into a purchasable.
    #[must_use]
    pub fn purchasable(source: impl Into<String>, purchasable: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: GeneratorTarget::Purchasable(purchasable.into()),
        }
    }
}

impl fmt::Display for GeneratorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            GeneratorTarget::Resource(id) => write!(f, "{} -> resource {id}", self.source),
            GeneratorTarget::Purchasable(id) => write!(f, "{} -> purchasable {id}", self.source),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Generator {
    rate: Amount,
    progress: Amount,
}

/// What one tick changed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    /// Elapsed seconds.
    pub dt: f64,
    /// Continuous gains per resource.
    pub continuous: Vec<(String, Amount)>,
    /// Whole units emitted per generator.
    pub emitted: Vec<(GeneratorKey, Amount)>,
}

impl TickReport {
    /// Whole units emitted into purchasables, for the catalog to grant.
    pub fn purchasable_grants(&self) -> impl Iterator<Item = (&str, Amount)> {
        self.emitted.iter().filter_map(|(key, units)| match &key.target {
            GeneratorTarget::Purchasable(id) => Some((id.as_str(), *units)),
            GeneratorTarget::Resource(_) => None,
        })
    }

    /// Returns true if the tick changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.continuous.is_empty() && self.emitted.is_empty()
    }
}

/// Per-tick production driver.
#[derive(Clone, Debug, Default)]
pub struct ProductionAccumulator {
    generators: BTreeMap<GeneratorKey, Generator>,
}

impl ProductionAccumulator {
    /// Creates an accumulator with no generators.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a generator's per-second rate, keeping its progress.
    ///
    /// A zero or negative rate removes the generator.
    pub fn set_generator(&mut self, key: GeneratorKey, rate: Amount) {
        if !rate.is_positive() {
            self.generators.remove(&key);
            return;
        }
        self.generators
            .entry(key)
            .and_modify(|g| g.rate = rate)
            .or_insert(Generator {
                rate,
                progress: Amount::ZERO,
            });
    }

    /// Drops a generator and its progress.
    pub fn remove_generator(&mut self, key: &GeneratorKey) -> bool {
        self.generators.remove(key).is_some()
    }

    /// Fractional progress carried by a generator.
    #[must_use]
    pub fn progress(&self, key: &GeneratorKey) -> Option<Amount> {
        self.generators.get(key).map(|g| g.progress)
    }

    /// Per-second rate of a generator.
    #[must_use]
    pub fn rate(&self, key: &GeneratorKey) -> Option<Amount> {
        self.generators.get(key).map(|g| g.rate)
    }

    /// Number of generators.
    #[must_use]
    pub fn generator_count(&self) -> usize {
        self.generators.len()
    }

    /// Drops every generator.
    pub fn clear(&mut self) {
        self.generators.clear();
    }

    /// Advances production by `dt` seconds.
    ///
    /// Continuous rates and resource-targeted generators are applied to
    /// `ledger`. Purchasable-targeted units are only reported.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::InvalidDelta` for a negative or non-finite
    /// `dt`; nothing is changed in that case.
    pub fn tick(&mut self, dt: f64, ledger: &mut ResourceLedger) -> EconomyResult<TickReport> {
        if !dt.is_finite() || dt < 0.0 {
            tracing::warn!(dt, "tick rejected");
            return Err(EconomyError::InvalidDelta(dt.to_string()));
        }
        let mut report = TickReport {
            dt,
            ..TickReport::default()
        };
        if dt == 0.0 {
            return Ok(report);
        }
        let elapsed = Amount::from_f64(dt);

        let rates: Vec<(String, Amount)> = ledger
            .ids()
            .map(|id| (id.to_string(), ledger.production_per_second(id)))
            .filter(|(_, rate)| rate.is_positive())
            .collect();
        for (id, rate) in rates {
            let gain = rate * elapsed;
            if ledger.add_amount(&id, gain) {
                report.continuous.push((id, gain));
            }
        }

        for (key, generator) in &mut self.generators {
            generator.progress += generator.rate * elapsed;
            let units = generator.progress.floor();
            if !units.is_positive() {
                continue;
            }
            // Undeliverable units stay in progress.
            if let GeneratorTarget::Resource(id) = &key.target {
                if !ledger.add_amount(id, units) {
                    continue;
                }
            }
            generator.progress -= units;
            report.emitted.push((key.clone(), units));
        }

        tracing::trace!(
            dt,
            continuous = report.continuous.len(),
            emitted = report.emitted.len(),
            "tick"
        );
        Ok(report)
    }
}
