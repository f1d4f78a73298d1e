// Tropical (min, +) semiring over costs.

use std::fmt;

use crate::semiring::{DivisibleSemiring, FloatWeight, ProbabilityWeight, Semiring, clamp_bucket};

/// Tropical weight: the stored value is a cost (`-ln p`).
///
/// `⊕` keeps the cheaper of two costs, `⊗` adds them. `zero` is `+inf`,
/// `one` is `0.0`. Summing over paths therefore yields the best single path
/// rather than the total probability mass.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TropicalWeight(f64);

impl TropicalWeight {
    pub const fn new(cost: f64) -> Self {
        Self(cost)
    }

    pub const fn value(&self) -> f64 {
        self.0
    }
}

impl Semiring for TropicalWeight {
    fn zero() -> Self {
        Self(f64::INFINITY)
    }

    fn one() -> Self {
        Self(0.0)
    }

    fn plus(&self, rhs: &Self) -> Self {
        Self(self.0.min(rhs.0))
    }

    fn times(&self, rhs: &Self) -> Self {
        if self.is_zero() || rhs.is_zero() {
            return Self::zero();
        }
        Self(self.0 + rhs.0)
    }

    fn approx_eq(&self, other: &Self, delta: f64) -> bool {
        if self.is_zero() || other.is_zero() {
            return self.is_zero() && other.is_zero();
        }
        (self.0 - other.0).abs() <= delta
    }

    fn quantize(&self, delta: f64) -> i64 {
        if self.is_zero() {
            return i64::MAX;
        }
        clamp_bucket(self.0, delta)
    }
}

impl DivisibleSemiring for TropicalWeight {
    fn divide(&self, rhs: &Self) -> Self {
        if rhs.is_zero() || self.is_zero() {
            return Self::zero();
        }
        Self(self.0 - rhs.0)
    }
}

impl ProbabilityWeight for TropicalWeight {
    fn from_probability(p: f64) -> Self {
        Self(-p.ln())
    }

    fn to_probability(&self) -> f64 {
        (-self.0).exp()
    }
}

impl FloatWeight for TropicalWeight {
    fn value(&self) -> f64 {
        self.0
    }

    fn from_value(value: f64) -> Self {
        Self(value)
    }
}

impl fmt::Display for TropicalWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plus_keeps_cheaper_cost() {
        let a = TropicalWeight::new(2.0);
        let b = TropicalWeight::new(0.5);
        assert_eq!(a.plus(&b), b);
        assert_eq!(a.plus(&TropicalWeight::zero()), a);
    }

    #[test]
    fn times_adds_costs_and_zero_absorbs() {
        let a = TropicalWeight::new(2.0);
        assert_eq!(a.times(&TropicalWeight::new(1.0)).value(), 3.0);
        assert!(a.times(&TropicalWeight::zero()).is_zero());
    }

    #[test]
    fn probability_round_trip() {
        let w = TropicalWeight::from_probability(0.25);
        assert!((w.to_probability() - 0.25).abs() < 1e-12);
        assert!(TropicalWeight::from_probability(0.0).is_zero());
    }

    #[test]
    fn divide_by_zero_is_zero() {
        assert!(TropicalWeight::new(1.0).divide(&TropicalWeight::zero()).is_zero());
    }
}
