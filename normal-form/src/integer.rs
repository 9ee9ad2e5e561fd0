//! Exact integer arithmetic primitives.
//!
//! Everything here works on [`BigInt`]s so that none of the normal form
//! algorithms have to worry about overflow. The division routines use the
//! euclidean convention, i.e. the remainder is always in `[0, |b|)`. For a
//! positive divisor this is the same as flooring the quotient, which is the
//! only case the normal form algorithms need.

use num_bigint::BigInt;
use num_traits::{Euclid, One, Signed, Zero};

use crate::error::{MatrixError, Result};

/// The quotient of `a` and `b`, rounded such that [`modulo`] is non-negative.
pub fn floor_division(a: &BigInt, b: &BigInt) -> Result<BigInt> {
    if b.is_zero() {
        return Err(MatrixError::DivisionByZero);
    }
    Ok(a.div_euclid(b))
}

/// The remainder of `a` divided by `b`, in `[0, |b|)`.
pub fn modulo(a: &BigInt, b: &BigInt) -> Result<BigInt> {
    if b.is_zero() {
        return Err(MatrixError::DivisionByZero);
    }
    Ok(a.rem_euclid(b))
}

/// Computes [`floor_division`] and [`modulo`] at once.
pub fn division_modulo(a: &BigInt, b: &BigInt) -> Result<(BigInt, BigInt)> {
    if b.is_zero() {
        return Err(MatrixError::DivisionByZero);
    }
    Ok((a.div_euclid(b), a.rem_euclid(b)))
}

/// The non-negative greatest common divisor. `gcd(0, 0) = 0`.
pub fn greatest_common_divisor(a: &BigInt, b: &BigInt) -> BigInt {
    let mut a = a.clone();
    let mut b = b.clone();
    while !b.is_zero() {
        // `b` is non-zero, so this can't fail.
        let r = a.rem_euclid(&b);
        a = std::mem::replace(&mut b, r);
    }
    a.abs()
}

/// Returns `(g, x, y)` such that `a * x + b * y = g = gcd(a, b)` and `g >= 0`.
pub fn extended_greatest_common_divisor(
    a: &BigInt,
    b: &BigInt,
) -> (BigInt, BigInt, BigInt) {
    let (mut old_r, mut r) = (a.clone(), b.clone());
    let (mut old_x, mut x) = (BigInt::one(), BigInt::zero());
    let (mut old_y, mut y) = (BigInt::zero(), BigInt::one());

    while !r.is_zero() {
        let (q, rem) = (old_r.div_euclid(&r), old_r.rem_euclid(&r));
        old_r = std::mem::replace(&mut r, rem);

        let next_x = &old_x - &q * &x;
        old_x = std::mem::replace(&mut x, next_x);

        let next_y = &old_y - &q * &y;
        old_y = std::mem::replace(&mut y, next_y);
    }

    // Make sure the gcd is non-negative.
    if old_r.is_negative() {
        old_r = -old_r;
        old_x = -old_x;
        old_y = -old_y;
    }

    (old_r, old_x, old_y)
}

/// The gcd of all the values. Zero for an empty iterator.
pub fn content<'a, I: IntoIterator<Item = &'a BigInt>>(values: I) -> BigInt {
    values
        .into_iter()
        .fold(BigInt::zero(), |acc, e| greatest_common_divisor(&acc, e))
}
