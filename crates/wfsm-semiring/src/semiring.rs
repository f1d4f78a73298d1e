// Semiring capability traits shared by every weight type.

use std::fmt::Debug;

/// Half-width, in natural-log units, of the range that [`Semiring::quantize`]
/// buckets are clamped to.
///
/// A residual share smaller than `e^-64` of its class total lands in the
/// outermost bucket. This bounds the number of distinct keys a weighted
/// subset construction can produce.
pub const QUANTIZE_RANGE: f64 = 64.0;

/// Algebraic weight type `(values, ⊕, ⊗, zero, one)`.
///
/// Implementations must satisfy:
/// - `plus` is commutative and associative with identity `zero`
/// - `times` is associative with identity `one`
/// - `times` distributes over `plus`
/// - `zero` is absorbing under `times`
pub trait Semiring: Copy + PartialEq + PartialOrd + Debug + 'static {
    /// Additive identity. Marks "no weight": not initial, not final, no path.
    fn zero() -> Self;

    /// Multiplicative identity.
    fn one() -> Self;

    /// Semiring addition (⊕).
    fn plus(&self, rhs: &Self) -> Self;

    /// Semiring multiplication (⊗).
    fn times(&self, rhs: &Self) -> Self;

    fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    fn is_one(&self) -> bool {
        *self == Self::one()
    }

    /// Equality within `delta`, measured in the weight's own representation.
    fn approx_eq(&self, other: &Self, delta: f64) -> bool;

    /// Map a weight onto a bucket index of width `delta`.
    ///
    /// Used as a hashable identity for residual weights. Buckets are clamped
    /// to `±QUANTIZE_RANGE / delta`; `zero` has its own dedicated bucket.
    fn quantize(&self, delta: f64) -> i64;

    /// ⊕-sum of all weights yielded by `iter` (`zero` when empty).
    fn sum<'a, I>(iter: I) -> Self
    where
        I: IntoIterator<Item = &'a Self>,
    {
        iter.into_iter().fold(Self::zero(), |acc, w| acc.plus(w))
    }
}

/// A semiring whose `times` has an inverse on non-zero values (a semifield).
pub trait DivisibleSemiring: Semiring {
    /// `self ⊗ rhs⁻¹`.
    ///
    /// Dividing by `zero` returns `zero`. This is the single policy for the
    /// otherwise undefined case; renormalization and weight pushing rely on
    /// it to leave dead states at `zero` instead of producing NaN.
    fn divide(&self, rhs: &Self) -> Self;
}

/// Weights that can be converted from and to a linear probability.
pub trait ProbabilityWeight: Semiring {
    fn from_probability(p: f64) -> Self;

    fn to_probability(&self) -> f64;

    /// The weight of `1 - p`.
    fn complement(&self) -> Self {
        Self::from_probability(1.0 - self.to_probability())
    }
}

/// Weights backed by a single `f64`, exposing the raw stored value.
///
/// The packed arc table stores weights through this view.
pub trait FloatWeight: Semiring {
    fn value(&self) -> f64;

    fn from_value(value: f64) -> Self;
}

/// Numerically stable `ln(e^a + e^b)`.
///
/// `logaddexp(x, -inf) == x` for every `x`, including `-inf` itself.
pub fn logaddexp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    hi + (lo - hi).exp().ln_1p()
}

/// Clamp a real-valued bucket coordinate into the finite quantization range.
pub(crate) fn clamp_bucket(value: f64, delta: f64) -> i64 {
    let limit = (QUANTIZE_RANGE / delta).round();
    (value / delta).round().clamp(-limit, limit) as i64
}
