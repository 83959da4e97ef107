//! # Scaling Costs
//!
//! Closed-form prices for purchasables whose price grows geometrically.
//!
//! ## Formulas
//!
//! With effective base cost `B'`, growth `R` and `n` already owned, the
//! next `k` units cost
//!
//! ```text
//! cost(k) = B' * R^n * (R^k - 1) / (R - 1)        (R != 1)
//! cost(k) = B' * k                                 (R == 1)
//! ```
//!
//! and the largest affordable `k` for funds `A` inverts that series:
//!
//! ```text
//! k = floor( log(1 + A(R - 1) / (B' R^n)) / log(R) )
//! ```
//!
//! The logarithms run in `f64`, so the result is corrected by at most one
//! step so that `cost(k) <= A < cost(k + 1)` always holds. Nothing here
//! loops per unit: buying a million units costs the same as buying one.

use serde::{Deserialize, Serialize};

use crate::amount::Amount;

/// Base cost scaled by the aggregated cost-reduction multiplier.
///
/// A negative reduction is clamped to zero.
#[inline]
#[must_use]
pub fn effective_base_cost(base: Amount, reduction: Amount) -> Amount {
    if reduction.is_negative() {
        return Amount::ZERO;
    }
    base * reduction
}

/// Price of the next `quantity` units when `owned` are already held.
///
/// # Arguments
///
/// * `base` - Effective base cost `B'` (reductions already applied)
/// * `growth` - Per-unit growth factor `R`
/// * `owned` - Units already owned `n`
/// * `quantity` - Units to buy `k`; zero or negative costs nothing
#[must_use]
pub fn cost_of(base: Amount, growth: Amount, owned: Amount, quantity: Amount) -> Amount {
    if !quantity.is_positive() {
        return Amount::ZERO;
    }
    if growth == Amount::ONE {
        return base * quantity;
    }
    let first = base * growth.pow(owned.to_f64());
    first * ((growth.pow(quantity.to_f64()) - Amount::ONE) / (growth - Amount::ONE))
}

/// Largest whole quantity whose [`cost_of`] fits within `funds`.
///
/// Always satisfies `cost_of(k) <= funds < cost_of(k + 1)` for growth
/// factors of one and above. Returns zero when nothing is affordable or
/// the inputs are degenerate.
#[must_use]
pub fn max_affordable(base: Amount, growth: Amount, owned: Amount, funds: Amount) -> Amount {
    if !funds.is_positive() {
        return Amount::ZERO;
    }
    if owned.is_zero() && base > funds {
        return Amount::ZERO;
    }
    if !base.is_positive() || !growth.is_positive() {
        return Amount::ZERO;
    }

    let estimate = if growth == Amount::ONE {
        (funds / base).floor()
    } else {
        let next = base * growth.pow(owned.to_f64());
        if next > funds {
            return Amount::ZERO;
        }
        let argument = Amount::ONE + funds * (growth - Amount::ONE) / next;
        if !argument.is_positive() || (growth > Amount::ONE && argument <= Amount::ONE) {
            return Amount::ZERO;
        }
        let k = (argument.ln() / growth.ln()).floor();
        if !k.is_finite() || k < 0.0 {
            return Amount::ZERO;
        }
        Amount::from_f64(k)
    };
    settle(base, growth, owned, funds, estimate)
}

/// Moves `k` at most one step so that `cost(k) <= funds < cost(k + 1)`.
fn settle(base: Amount, growth: Amount, owned: Amount, funds: Amount, k: Amount) -> Amount {
    if k.is_positive() && cost_of(base, growth, owned, k) > funds {
        return k - Amount::ONE;
    }
    let up = k + Amount::ONE;
    if cost_of(base, growth, owned, up) <= funds {
        return up;
    }
    k
}

/// Geometric price schedule of one purchasable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingCost {
    /// Price of the first unit before reductions.
    pub base: Amount,
    /// Per-unit growth factor.
    pub growth: Amount,
}

impl ScalingCost {
    /// Creates a schedule.
    #[must_use]
    pub const fn new(base: Amount, growth: Amount) -> Self {
        Self { base, growth }
    }

    /// Price of the next `quantity` units under a cost reduction.
    #[must_use]
    pub fn cost_of(&self, owned: Amount, quantity: Amount, reduction: Amount) -> Amount {
        cost_of(effective_base_cost(self.base, reduction), self.growth, owned, quantity)
    }

    /// Price of exactly one more unit.
    #[must_use]
    pub fn next_cost(&self, owned: Amount, reduction: Amount) -> Amount {
        self.cost_of(owned, Amount::ONE, reduction)
    }

    /// Largest quantity `funds` can pay for under a cost reduction.
    #[must_use]
    pub fn max_affordable(&self, owned: Amount, funds: Amount, reduction: Amount) -> Amount {
        max_affordable(effective_base_cost(self.base, reduction), self.growth, owned, funds)
    }
}
