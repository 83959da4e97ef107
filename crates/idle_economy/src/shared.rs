//! # Shared Simulation
//!
//! Thread-safe handle for hosts that drive one economy from several OS
//! threads (a UI thread issuing purchases, a timer thread issuing ticks).
//!
//! ## Thread Safety
//!
//! Every call through [`SharedSimulation::with`] holds one
//! `parking_lot::Mutex` for its whole closure, so a cost lookup followed by
//! the spend it justifies cannot interleave with another thread's purchase.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::accumulator::TickReport;
use crate::amount::Amount;
use crate::catalog::Purchase;
use crate::error::EconomyResult;
use crate::simulation::{EconomySnapshot, Simulation};

/// Cloneable, lock-guarded [`Simulation`].
#[derive(Clone, Debug, Default)]
pub struct SharedSimulation {
    inner: Arc<Mutex<Simulation>>,
}

impl SharedSimulation {
    /// Wraps a simulation.
    #[must_use]
    pub fn new(simulation: Simulation) -> Self {
        Self {
            inner: Arc::new(Mutex::new(simulation)),
        }
    }

    /// Runs `f` as one critical section.
    pub fn with<R>(&self, f: impl FnOnce(&mut Simulation) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }

    /// Buys units under the lock.
    ///
    /// # Errors
    ///
    /// See [`Simulation::purchase`].
    pub fn purchase(&self, id: &str, quantity: Amount) -> EconomyResult<Purchase> {
        self.with(|sim| sim.purchase(id, quantity))
    }

    /// Buy Max under the lock.
    ///
    /// # Errors
    ///
    /// See [`Simulation::buy_max`].
    pub fn buy_max(&self, id: &str) -> EconomyResult<Purchase> {
        self.with(|sim| sim.buy_max(id))
    }

    /// Ticks under the lock.
    ///
    /// # Errors
    ///
    /// See [`Simulation::tick`].
    pub fn tick(&self, dt: f64) -> EconomyResult<TickReport> {
        self.with(|sim| sim.tick(dt))
    }

    /// Snapshot under the lock.
    #[must_use]
    pub fn snapshot(&self) -> EconomySnapshot {
        self.with(|sim| sim.snapshot())
    }

    /// Unwraps the simulation if this is the last handle.
    ///
    /// # Errors
    ///
    /// Returns the handle back if other clones are still alive.
    pub fn try_into_inner(self) -> Result<Simulation, Self> {
        Arc::try_unwrap(self.inner)
            .map(Mutex::into_inner)
            .map_err(|inner| Self { inner })
    }
}

impl From<Simulation> for SharedSimulation {
    fn from(simulation: Simulation) -> Self {
        Self::new(simulation)
    }
}
