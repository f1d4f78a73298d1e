// Log semiring: values are natural logarithms of probabilities.

use std::fmt;

use crate::semiring::{
    DivisibleSemiring, FloatWeight, ProbabilityWeight, Semiring, clamp_bucket, logaddexp,
};

/// Log-domain weight: `⊕` is `logaddexp`, `⊗` is real addition.
///
/// `zero` is `-inf` (probability 0) and `one` is `0.0` (probability 1).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogWeight(f64);

impl LogWeight {
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> f64 {
        self.0
    }
}

impl Semiring for LogWeight {
    fn zero() -> Self {
        Self(f64::NEG_INFINITY)
    }

    fn one() -> Self {
        Self(0.0)
    }

    fn plus(&self, rhs: &Self) -> Self {
        Self(logaddexp(self.0, rhs.0))
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
            return i64::MIN;
        }
        clamp_bucket(self.0, delta)
    }
}

impl DivisibleSemiring for LogWeight {
    fn divide(&self, rhs: &Self) -> Self {
        if rhs.is_zero() || self.is_zero() {
            return Self::zero();
        }
        Self(self.0 - rhs.0)
    }
}

impl ProbabilityWeight for LogWeight {
    fn from_probability(p: f64) -> Self {
        Self(p.ln())
    }

    fn to_probability(&self) -> f64 {
        self.0.exp()
    }

    fn complement(&self) -> Self {
        // ln(1 - e^v) without cancellation near v = 0
        Self((-self.0.exp_m1()).ln())
    }
}

impl FloatWeight for LogWeight {
    fn value(&self) -> f64 {
        self.0
    }

    fn from_value(value: f64) -> Self {
        Self(value)
    }
}

impl fmt::Display for LogWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn identities() {
        let w = LogWeight::new(-1.5);
        assert_eq!(w.plus(&LogWeight::zero()), w);
        assert_eq!(w.times(&LogWeight::one()), w);
        assert!(w.times(&LogWeight::zero()).is_zero());
    }

    #[test]
    fn plus_adds_probabilities() {
        let a = LogWeight::from_probability(0.25);
        let b = LogWeight::from_probability(0.5);
        assert!((a.plus(&b).to_probability() - 0.75).abs() < EPS);
    }

    #[test]
    fn divide_by_zero_is_zero() {
        let w = LogWeight::new(-0.3);
        assert!(w.divide(&LogWeight::zero()).is_zero());
        assert!(LogWeight::zero().divide(&LogWeight::zero()).is_zero());
        assert!(w.divide(&w).approx_eq(&LogWeight::one(), EPS));
    }

    #[test]
    fn complement_of_half_is_half() {
        let half = LogWeight::from_probability(0.5);
        assert!(half.complement().approx_eq(&half, EPS));
        assert!(LogWeight::one().complement().is_zero());
    }

    #[test]
    fn quantize_separates_zero() {
        let delta = 1.0 / 1024.0;
        assert_eq!(LogWeight::zero().quantize(delta), i64::MIN);
        assert_eq!(LogWeight::one().quantize(delta), 0);
        assert_eq!(
            LogWeight::new(-1.0).quantize(delta),
            LogWeight::new(-1.0 - 1e-9).quantize(delta)
        );
    }

    proptest! {
        #[test]
        fn plus_is_commutative(a in -50.0f64..50.0, b in -50.0f64..50.0) {
            let (x, y) = (LogWeight::new(a), LogWeight::new(b));
            prop_assert!(x.plus(&y).approx_eq(&y.plus(&x), EPS));
        }

        #[test]
        fn plus_is_associative(a in -50.0f64..50.0, b in -50.0f64..50.0, c in -50.0f64..50.0) {
            let (x, y, z) = (LogWeight::new(a), LogWeight::new(b), LogWeight::new(c));
            let left = x.plus(&y).plus(&z);
            let right = x.plus(&y.plus(&z));
            prop_assert!(left.approx_eq(&right, 1e-9));
        }

        #[test]
        fn times_distributes_over_plus(a in -20.0f64..20.0, b in -20.0f64..20.0, c in -20.0f64..20.0) {
            let (x, y, z) = (LogWeight::new(a), LogWeight::new(b), LogWeight::new(c));
            let left = x.times(&y.plus(&z));
            let right = x.times(&y).plus(&x.times(&z));
            prop_assert!(left.approx_eq(&right, 1e-9));
        }

        #[test]
        fn plus_matches_naive_log_sum_exp(a in -30.0f64..30.0, b in -30.0f64..30.0) {
            let naive = (a.exp() + b.exp()).ln();
            prop_assert!((LogWeight::new(a).plus(&LogWeight::new(b)).value() - naive).abs() < 1e-9);
        }
    }
}
