//! Numeric tower: machine integers promote to big integers, big integers to
//! rationals, and anything mixed with a float becomes a float.
//!
//! Results are normalised on the way back to terms, so a big integer that
//! fits in `i64` comes back as `Term::Integer` and a rational with
//! denominator one comes back as an integer.

use std::cmp::Ordering;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{ToPrimitive, Zero};

use super::term::Term;

/// Relative tolerance for float equality
pub const FLOAT_EPSILON: f64 = 1e-12;

/// Float equality with a relative epsilon.
///
/// Exactly equal values (including both infinities of one sign) are equal;
/// NaN is never equal to anything.
pub fn float_eq(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    if !a.is_finite() || !b.is_finite() {
        return false;
    }
    let scale = a.abs().max(b.abs()).max(f64::MIN_POSITIVE);
    (a - b).abs() <= FLOAT_EPSILON * scale
}

/// A number lifted out of a term for arithmetic
#[derive(Debug, Clone)]
pub enum Number {
    Int(i64),
    Big(BigInt),
    Rational(BigRational),
    Float(f64),
}

impl Number {
    /// Read a numeric term. Non-numbers and unbound variables give `None`.
    pub fn from_term(term: &Term) -> Option<Number> {
        match term.deref() {
            Term::Integer(n) => Some(Number::Int(n)),
            Term::BigInt(n) => Some(Number::Big((*n).clone())),
            Term::Rational(r) => Some(Number::Rational((*r).clone())),
            Term::Float(f) => Some(Number::Float(f)),
            _ => None,
        }
    }

    /// Back to a normalised term
    pub fn into_term(self) -> Term {
        match self {
            Number::Int(n) => Term::Integer(n),
            Number::Big(n) => Term::big_integer(n),
            Number::Rational(r) => Term::rational(r),
            Number::Float(f) => Term::Float(f),
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Number::Float(_))
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Number::Int(n) => *n == 0,
            Number::Big(n) => n.is_zero(),
            Number::Rational(r) => r.is_zero(),
            Number::Float(f) => *f == 0.0,
        }
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            Number::Int(n) => *n as f64,
            Number::Big(n) => n.to_f64().unwrap_or(f64::NAN),
            Number::Rational(r) => r.to_f64().unwrap_or(f64::NAN),
            Number::Float(f) => *f,
        }
    }

    fn to_big(&self) -> Option<BigInt> {
        match self {
            Number::Int(n) => Some(BigInt::from(*n)),
            Number::Big(n) => Some(n.clone()),
            _ => None,
        }
    }

    fn to_rational(&self) -> Option<BigRational> {
        match self {
            Number::Int(n) => Some(BigRational::from_integer(BigInt::from(*n))),
            Number::Big(n) => Some(BigRational::from_integer(n.clone())),
            Number::Rational(r) => Some(r.clone()),
            Number::Float(_) => None,
        }
    }

    fn combine(
        &self,
        other: &Number,
        small: fn(i64, i64) -> Option<i64>,
        big: fn(BigInt, BigInt) -> BigInt,
        ratio: fn(BigRational, BigRational) -> BigRational,
        float: fn(f64, f64) -> f64,
    ) -> Number {
        if let (Number::Int(a), Number::Int(b)) = (self, other) {
            if let Some(n) = small(*a, *b) {
                return Number::Int(n);
            }
        }
        if self.is_float() || other.is_float() {
            return Number::Float(float(self.to_f64(), other.to_f64()));
        }
        if let (Some(a), Some(b)) = (self.to_big(), other.to_big()) {
            return Number::Big(big(a, b));
        }
        match (self.to_rational(), other.to_rational()) {
            (Some(a), Some(b)) => Number::Rational(ratio(a, b)),
            _ => Number::Float(float(self.to_f64(), other.to_f64())),
        }
    }

    pub fn add(&self, other: &Number) -> Number {
        self.combine(other, i64::checked_add, |a, b| a + b, |a, b| a + b, |a, b| a + b)
    }

    pub fn sub(&self, other: &Number) -> Number {
        self.combine(other, i64::checked_sub, |a, b| a - b, |a, b| a - b, |a, b| a - b)
    }

    pub fn mul(&self, other: &Number) -> Number {
        self.combine(other, i64::checked_mul, |a, b| a * b, |a, b| a * b, |a, b| a * b)
    }

    pub fn neg(&self) -> Number {
        match self {
            Number::Int(n) => match n.checked_neg() {
                Some(m) => Number::Int(m),
                None => Number::Big(-BigInt::from(*n)),
            },
            Number::Big(n) => Number::Big(-n.clone()),
            Number::Rational(r) => Number::Rational(-r.clone()),
            Number::Float(f) => Number::Float(-f),
        }
    }

    /// Numeric comparison across the tower.
    ///
    /// Comparisons involving a float go through `f64`, with NaN ordered by
    /// `f64::total_cmp`; everything else is compared exactly.
    pub fn compare(&self, other: &Number) -> Ordering {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a.cmp(b),
            _ if self.is_float() || other.is_float() => self.to_f64().total_cmp(&other.to_f64()),
            _ => match (self.to_rational(), other.to_rational()) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => Ordering::Equal,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_promotes_to_big() {
        let sum = Number::Int(i64::MAX).add(&Number::Int(1));
        let term = sum.into_term();
        assert!(matches!(term, Term::BigInt(_)));

        let back = Number::from_term(&term)
            .expect("numeric")
            .sub(&Number::Int(1))
            .into_term();
        assert_eq!(back.as_integer(), Some(i64::MAX));
    }

    #[test]
    fn test_negating_min_promotes() {
        assert!(matches!(Number::Int(i64::MIN).neg(), Number::Big(_)));
    }

    #[test]
    fn test_rational_normalises_to_integer() {
        let half = BigRational::new(BigInt::from(1), BigInt::from(2));
        let sum = Number::Rational(half.clone()).add(&Number::Rational(half));
        assert_eq!(sum.into_term().as_integer(), Some(1));
    }

    #[test]
    fn test_float_contaminates() {
        let n = Number::Int(2).mul(&Number::Float(1.5));
        assert!(matches!(n, Number::Float(f) if f == 3.0));
    }

    #[test]
    fn test_compare_across_tower() {
        let third = Number::Rational(BigRational::new(BigInt::from(1), BigInt::from(3)));
        assert_eq!(third.compare(&Number::Int(0)), Ordering::Greater);
        assert_eq!(third.compare(&Number::Int(1)), Ordering::Less);
        assert_eq!(Number::Int(2).compare(&Number::Float(2.0)), Ordering::Equal);
    }

    #[test]
    fn test_float_eq_is_relative() {
        assert!(float_eq(0.1 + 0.2, 0.3));
        assert!(float_eq(1e20, 1e20 + 1.0));
        assert!(!float_eq(1.0, 1.0001));
        assert!(!float_eq(f64::NAN, f64::NAN));
        assert!(float_eq(f64::INFINITY, f64::INFINITY));
    }
}
