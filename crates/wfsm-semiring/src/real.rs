// Real (probability) semiring.

use std::fmt;

use crate::semiring::{DivisibleSemiring, FloatWeight, ProbabilityWeight, Semiring, clamp_bucket};

/// Linear probability weight under ordinary `+` and `×`.
///
/// Useful for small graphs and for checking log-domain results; long paths
/// underflow where [`LogWeight`](crate::LogWeight) would not.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RealWeight(f64);

impl RealWeight {
    pub const fn new(p: f64) -> Self {
        Self(p)
    }

    pub const fn value(&self) -> f64 {
        self.0
    }
}

impl Semiring for RealWeight {
    fn zero() -> Self {
        Self(0.0)
    }

    fn one() -> Self {
        Self(1.0)
    }

    fn plus(&self, rhs: &Self) -> Self {
        Self(self.0 + rhs.0)
    }

    fn times(&self, rhs: &Self) -> Self {
        Self(self.0 * rhs.0)
    }

    fn approx_eq(&self, other: &Self, delta: f64) -> bool {
        (self.0 - other.0).abs() <= delta
    }

    fn quantize(&self, delta: f64) -> i64 {
        if self.0 <= 0.0 {
            return i64::MIN;
        }
        // bucket on the log scale so the clamp range matches LogWeight
        clamp_bucket(self.0.ln(), delta)
    }
}

impl DivisibleSemiring for RealWeight {
    fn divide(&self, rhs: &Self) -> Self {
        if rhs.is_zero() {
            return Self::zero();
        }
        Self(self.0 / rhs.0)
    }
}

impl ProbabilityWeight for RealWeight {
    fn from_probability(p: f64) -> Self {
        Self(p)
    }

    fn to_probability(&self) -> f64 {
        self.0
    }
}

impl FloatWeight for RealWeight {
    fn value(&self) -> f64 {
        self.0
    }

    fn from_value(value: f64) -> Self {
        Self(value)
    }
}

impl fmt::Display for RealWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic() {
        let a = RealWeight::new(0.25);
        let b = RealWeight::new(0.5);
        assert_eq!(a.plus(&b).value(), 0.75);
        assert_eq!(a.times(&b).value(), 0.125);
        assert_eq!(a.divide(&b).value(), 0.5);
        assert!(a.divide(&RealWeight::zero()).is_zero());
    }

    #[test]
    fn sum_of_empty_is_zero() {
        assert!(RealWeight::sum(std::iter::empty::<&RealWeight>()).is_zero());
        let ws = [RealWeight::new(0.1), RealWeight::new(0.2)];
        assert!(RealWeight::sum(&ws).approx_eq(&RealWeight::new(0.3), 1e-12));
    }
}
