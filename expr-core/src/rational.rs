//! Canonical arbitrary-precision rational arithmetic.
//!
//! A `Rational` is always stored with a positive denominator and
//! `gcd(|numerator|, denominator) == 1` (spec.md §3.2). Every constructor
//! and every arithmetic method re-normalizes, so a `Rational` obtained from
//! anywhere in the crate is guaranteed canonical.

use std::cmp::Ordering;
use std::fmt;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive, Zero};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rational {
    numerator: BigInt,
    denominator: BigInt,
}

impl Rational {
    /// Builds a canonical rational from a numerator and denominator.
    ///
    /// Returns `None` if `denominator` is zero; callers at the evaluation
    /// boundary turn that into a `DomainError` (spec.md §7, §9 Open Question).
    pub fn new(numerator: BigInt, denominator: BigInt) -> Option<Self> {
        if denominator.is_zero() {
            return None;
        }
        Some(Self::normalize(numerator, denominator))
    }

    fn normalize(mut numerator: BigInt, mut denominator: BigInt) -> Self {
        if denominator.is_negative() {
            numerator = -numerator;
            denominator = -denominator;
        }
        let g = numerator.gcd(&denominator);
        if !g.is_zero() && g != BigInt::from(1) {
            numerator /= &g;
            denominator /= &g;
        }
        Self {
            numerator,
            denominator,
        }
    }

    pub fn from_i64(n: i64) -> Self {
        Self {
            numerator: BigInt::from(n),
            denominator: BigInt::from(1),
        }
    }

    pub fn from_bigint(n: BigInt) -> Self {
        Self {
            numerator: n,
            denominator: BigInt::from(1),
        }
    }

    pub fn zero() -> Self {
        Self::from_i64(0)
    }

    pub fn one() -> Self {
        Self::from_i64(1)
    }

    pub fn numerator(&self) -> &BigInt {
        &self.numerator
    }

    pub fn denominator(&self) -> &BigInt {
        &self.denominator
    }

    pub fn is_zero(&self) -> bool {
        self.numerator.is_zero()
    }

    pub fn is_integer(&self) -> bool {
        self.denominator == BigInt::from(1)
    }

    /// `Some(n)` when the value is an exact integer representable as `i64`.
    pub fn to_i64(&self) -> Option<i64> {
        if self.is_integer() {
            self.numerator.to_i64()
        } else {
            None
        }
    }

    pub fn to_f64(&self) -> f64 {
        // BigInt::to_f64 never returns None in num-bigint; this is a
        // defensive fallback for the (currently unreachable) failure case.
        let n = self.numerator.to_f64().unwrap_or(f64::NAN);
        let d = self.denominator.to_f64().unwrap_or(f64::NAN);
        n / d
    }

    pub fn add(&self, other: &Rational) -> Rational {
        let n = &self.numerator * &other.denominator + &other.numerator * &self.denominator;
        let d = &self.denominator * &other.denominator;
        Self::normalize(n, d)
    }

    pub fn sub(&self, other: &Rational) -> Rational {
        let n = &self.numerator * &other.denominator - &other.numerator * &self.denominator;
        let d = &self.denominator * &other.denominator;
        Self::normalize(n, d)
    }

    pub fn mul(&self, other: &Rational) -> Rational {
        Self::normalize(
            &self.numerator * &other.numerator,
            &self.denominator * &other.denominator,
        )
    }

    /// `None` when `other` is zero — the evaluator turns that into a
    /// `DomainError` rather than panicking.
    pub fn div(&self, other: &Rational) -> Option<Rational> {
        if other.is_zero() {
            return None;
        }
        Some(Self::normalize(
            &self.numerator * &other.denominator,
            &self.denominator * &other.numerator,
        ))
    }

    pub fn neg(&self) -> Rational {
        Self {
            numerator: -&self.numerator,
            denominator: self.denominator.clone(),
        }
    }

    pub fn abs(&self) -> Rational {
        Self {
            numerator: self.numerator.abs(),
            denominator: self.denominator.clone(),
        }
    }

    /// Exact integer power. `exp` must be non-negative (callers handle
    /// negative exponents by inverting beforehand); `0^0 = 1` per spec.md §4.7.
    pub fn pow(&self, exp: u32) -> Rational {
        Self::normalize(self.numerator.pow(exp), self.denominator.pow(exp))
    }

    pub fn floor_to_bigint(&self) -> BigInt {
        self.numerator.div_floor(&self.denominator)
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        // Denominators are always positive, so cross-multiplying preserves order.
        (&self.numerator * &other.denominator).cmp(&(&other.numerator * &self.denominator))
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_integer() {
            write!(f, "{}", self.numerator)
        } else {
            write!(f, "{}/{}", self.numerator, self.denominator)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(n: i64, d: i64) -> Rational {
        Rational::new(BigInt::from(n), BigInt::from(d)).unwrap()
    }

    #[test]
    fn canonical_form_has_positive_denominator_and_coprime_parts() {
        let v = r(4, -8);
        assert_eq!(*v.numerator(), BigInt::from(-1));
        assert_eq!(*v.denominator(), BigInt::from(2));
    }

    #[test]
    fn addition_matches_exact_arithmetic() {
        // 1/2 + 1/3 = 5/6
        let sum = r(1, 2).add(&r(1, 3));
        assert_eq!(sum, r(5, 6));
    }

    #[test]
    fn division_by_zero_denominator_is_rejected_at_construction() {
        assert!(Rational::new(BigInt::from(1), BigInt::from(0)).is_none());
    }

    #[test]
    fn division_by_zero_value_returns_none() {
        assert!(r(1, 2).div(&r(0, 1)).is_none());
    }

    #[test]
    fn ordering_is_exact_across_denominators() {
        assert!(r(1, 3) < r(1, 2));
        assert!(r(-1, 2) < r(0, 1));
    }

    #[test]
    fn zero_to_the_zero_is_handled_by_caller_convention() {
        // Rational::pow itself just does integer exponentiation; the 0^0=1
        // convention is applied by the power operator, not here.
        assert_eq!(r(2, 1).pow(3), r(8, 1));
        assert_eq!(r(0, 1).pow(0), r(1, 1));
    }
}
