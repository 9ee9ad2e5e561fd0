//! Column reduction, the elimination step of the Hermite normal form.
//!
//! A step works on two pivot rows `r` and `r + 1` and two columns
//! `col1 < col2`. Every row below `r + 1` already has a zero in every column
//! left of `col1` (the caller guarantees that). First a combination of the
//! rows below is folded into row `r + 1` so that the gcd of the two entries
//! in `col1` is the gcd of the whole column from `r` down. Then an extended
//! gcd transform moves that gcd into row `r`, and all other rows are reduced
//! against the two new pivots.

use log::trace;
use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};

use crate::config::SieveConfig;
use crate::error::Result;
use crate::integer::{
    extended_greatest_common_divisor, floor_division, greatest_common_divisor, modulo,
};
use crate::matrix::IntegerMatrix;
use crate::sieve::unit_coefficient;

/// The result of a single column reduction step.
///
/// `reduced = q * c * a` where `a` is the input.
#[derive(Clone, Debug)]
pub struct ColumnReduction {
    /// Unimodular transform that combines rows `r` and `r + 1` and reduces
    /// every other row against them.
    pub q: IntegerMatrix,

    /// Identity except for row `r + 1`, which contains the multiples of the
    /// later rows added to it.
    pub c: IntegerMatrix,

    /// The reduced matrix.
    pub reduced: IntegerMatrix,
}

/// Computes the multiples of rows `row + 2..` that are added to `row + 1`.
///
/// Afterwards the 2x2 minor at rows `row`, `row + 1` and columns `col1`,
/// `col2` is non-singular (if any of the rows allow that), and the gcd of
/// `a[row, col1]` and the new `a[row + 1, col1]` is the gcd of the column
/// from `row` down.
pub fn condition(
    a: &IntegerMatrix,
    col1: usize,
    col2: usize,
    row: usize,
    config: &SieveConfig,
) -> Result<Vec<BigInt>> {
    let first = row + 2;
    let mut coefficients = vec![BigInt::zero(); a.num_rows().saturating_sub(first)];

    let d11 = &a[(row, col1)];
    let d12 = &a[(row, col2)];
    let mut d21 = a[(row + 1, col1)].clone();
    let mut d22 = a[(row + 1, col2)].clone();

    if d11 * &d22 == d12 * &d21 {
        let breaks_degeneracy =
            (first..a.num_rows()).find(|&s| d11 * &a[(s, col2)] != d12 * &a[(s, col1)]);
        if let Some(s) = breaks_degeneracy {
            coefficients[s - first] = BigInt::one();
            d21 += &a[(s, col1)];
            d22 += &a[(s, col2)];
        }
    }

    if !(d11 > &BigInt::one()) {
        return Ok(coefficients);
    }

    let mut factors = vec![d11.clone()];
    let mut ahat = d21.clone();
    for (i, s) in (first..a.num_rows()).enumerate() {
        let b = &a[(s, col1)];
        let bp = &a[(s, col2)];
        let g = greatest_common_divisor(&ahat, b);
        if g.is_zero() {
            continue;
        }

        let a_prime = modulo(&(&ahat / &g), d11)?;
        let mut b_prime = modulo(&(b / &g), d11)?;

        // Subtract instead of add if adding would shrink the minor.
        let det = d11 * &d22 - d12 * &d21;
        let step = d11 * bp - d12 * b;
        let negate = det.sign() != step.sign();
        if negate {
            b_prime = -b_prime;
        }

        let mut c = unit_coefficient(&a_prime, &b_prime, d11, &mut factors, config)?;
        if negate {
            c = -c;
        }

        d21 += &c * b;
        d22 += &c * bp;
        ahat = modulo(&(&ahat + &c * b), d11)?;
        coefficients[i] += c;
    }

    Ok(coefficients)
}

/// Reduces column `col1` at rows `row`, `row + 1` to a single pivot and
/// reduces all other rows against the pivots in `col1` and `col2`.
///
/// The 2x2 minor at rows `row`, `row + 1` and columns `col1`, `col2` has to
/// be non-singular after conditioning. `a[row, col1]` has to be positive.
pub fn column_reduction(
    a: &IntegerMatrix,
    col1: usize,
    col2: usize,
    row: usize,
    config: &SieveConfig,
) -> Result<ColumnReduction> {
    let n = a.num_rows();
    let coefficients = condition(a, col1, col2, row, config)?;

    let mut c = IntegerMatrix::identity(n);
    let mut reduced = a.clone();
    for (i, ci) in coefficients.iter().enumerate() {
        if !ci.is_zero() {
            c[(row + 1, row + 2 + i)] = ci.clone();
            reduced.row_multiply_add(row + 1, row + 2 + i, ci);
        }
    }

    let (g, m1, m2) =
        extended_greatest_common_divisor(&reduced[(row, col1)], &reduced[(row + 1, col1)]);
    let det = &reduced[(row, col1)] * &reduced[(row + 1, col2)]
        - &reduced[(row, col2)] * &reduced[(row + 1, col1)];
    let s = det.signum();
    let q1 = -&s * &reduced[(row + 1, col1)] / &g;
    let q2 = &s * &reduced[(row, col1)] / &g;

    let t = [[m1, m2], [q1, q2]];
    let mut q = IntegerMatrix::identity(n);
    reduced.row_transform_2x2(row, row + 1, &t);
    q.row_transform_2x2(row, row + 1, &t);

    let t1 = reduced[(row, col1)].clone();
    let t2 = reduced[(row + 1, col2)].clone();
    trace!(
        "Column reduction at row {row}: pivots {t1} in column {col1}, {t2} in column {col2}"
    );

    for i in (0..n).filter(|&i| i != row && i != row + 1) {
        let s1 = -floor_division(&reduced[(i, col1)], &t1)?;
        reduced.row_multiply_add(i, row, &s1);
        q.row_multiply_add(i, row, &s1);

        let s2 = -floor_division(&reduced[(i, col2)], &t2)?;
        reduced.row_multiply_add(i, row + 1, &s2);
        q.row_multiply_add(i, row + 1, &s2);
    }

    debug_assert!(reduced[(row + 1, col1)].is_zero());
    debug_assert!(t2.is_positive());

    Ok(ColumnReduction { q, c, reduced })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn conditioning_fixes_singular_minor() {
        // The top 2x2 minor is singular, the third row breaks that.
        let a = IntegerMatrix::from_rows(&[[1, 2], [2, 4], [0, 1]]);
        let c = condition(&a, 0, 1, 0, &SieveConfig::default()).unwrap();
        assert_eq!(c, vec![BigInt::one()]);
    }

    #[test]
    fn conditioning_captures_column_gcd() {
        // gcd(6, 4) = 2 but the whole column has gcd 1.
        let a = IntegerMatrix::from_rows(&[[6, 0], [4, 1], [3, 5], [9, 2]]);
        let c = condition(&a, 0, 1, 0, &SieveConfig::default()).unwrap();
        let d21 = (0..2).fold(a[(1, 0)].clone(), |acc, i| acc + &c[i] * &a[(i + 2, 0)]);
        assert!(greatest_common_divisor(&a[(0, 0)], &d21).is_one(), "{c:?}");
    }

    #[test]
    fn reduction_produces_pivots() {
        let a = IntegerMatrix::from_rows(&[
            [1, 0, 0, 0],
            [0, 2, 4, 0],
            [0, 6, 8, 0],
            [0, 0, 0, 1],
        ]);
        let r = column_reduction(&a, 0, 1, 0, &SieveConfig::default()).unwrap();
        assert_eq!(&r.q * &(&r.c * &a), r.reduced);
        assert!(r.q.is_unimodular());
        assert_eq!(r.reduced[(0, 0)], BigInt::one());
        assert!(r.reduced[(1, 0)].is_zero());
        assert!(r.reduced[(1, 1)].is_positive());
        for i in 2..4 {
            assert!(r.reduced[(i, 0)].is_zero());
        }

        let r = column_reduction(&r.reduced, 1, 2, 1, &SieveConfig::default()).unwrap();
        assert_eq!(r.reduced[(1, 1)], BigInt::from(2));
        assert_eq!(r.reduced[(2, 2)], BigInt::from(4));
        assert!(r.reduced[(2, 1)].is_zero());
        assert!(r.reduced[(3, 1)].is_zero());
        assert!(r.q.is_unimodular());
    }
}
