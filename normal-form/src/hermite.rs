//! Hermite normal form with a unimodular transform.
//!
//! The matrix is padded with a unit row and column on either end. The leading
//! unit gives the first column reduction a pivot to work against, the
//! trailing one guarantees a final rank increase after the last real column,
//! which reduces the entries above the last real pivot. Both are stripped
//! afterwards.

use log::debug;
use num_traits::{One, Signed, Zero};

use crate::config::{Config, SieveConfig};
use crate::error::{MatrixError, Result};
use crate::integer::{extended_greatest_common_divisor, floor_division};
use crate::matrix::IntegerMatrix;
use crate::reduce::column_reduction;

/// `reduced = transform * a` in row-style Hermite normal form.
#[derive(Clone, Debug)]
pub struct HermiteDecomposition {
    /// Unimodular n×n transform.
    pub transform: IntegerMatrix,

    /// The Hermite normal form. It keeps the denominator of the input.
    pub reduced: IntegerMatrix,

    /// The pivot column of each non-zero row. The length is the rank.
    pub pivot_columns: Vec<usize>,
}

impl HermiteDecomposition {
    pub fn rank(&self) -> usize {
        self.pivot_columns.len()
    }
}

/// Computes the Hermite normal form with the default configuration.
pub fn hermite_normal_form(a: &IntegerMatrix) -> Result<HermiteDecomposition> {
    hermite_normal_form_with(a, &Config::default())
}

/// Computes the Hermite normal form of `a`.
///
/// The denominator of `a` is ignored during the computation and copied to
/// the result, so `transform * a = reduced` holds for the rational matrices.
pub fn hermite_normal_form_with(
    a: &IntegerMatrix,
    config: &Config,
) -> Result<HermiteDecomposition> {
    let n = a.num_rows();
    let m = a.num_cols();

    let mut padded = IntegerMatrix::zero(n + 2, m + 2);
    padded[(0, 0)] = 1.into();
    padded[(n + 1, m + 1)] = 1.into();
    padded.assign_submatrix(1, 1, a);

    let (padded, transform, profile) = reduce_padded(padded, &config.sieve)?;
    let mut r = strip_sentinels(padded, transform, profile, n, m)?;
    r.reduced.set_denominator(a.denominator().clone())?;
    validate(a, &r)?;

    debug!("Hermite normal form of a {n}×{m} matrix has rank {}", r.rank());
    Ok(r)
}

/// Scans the columns of the padded matrix and reduces at every rank increase.
/// Returns the reduced matrix, the accumulated transform and the pivot
/// columns, including both sentinels.
fn reduce_padded(
    mut padded: IntegerMatrix,
    config: &SieveConfig,
) -> Result<(IntegerMatrix, IntegerMatrix, Vec<usize>)> {
    let rows = padded.num_rows();
    let mut transform = IntegerMatrix::identity(rows);
    let mut profile = vec![0];
    let mut r = 0;

    for j in 1..padded.num_cols() {
        let p = profile[r];
        let increases_rank = (r + 1..rows).any(|k| {
            &padded[(r, p)] * &padded[(k, j)] != &padded[(r, j)] * &padded[(k, p)]
        });
        if !increases_rank {
            continue;
        }

        profile.push(j);
        r += 1;

        let step = column_reduction(&padded, profile[r - 1], j, r - 1, config)?;
        transform = &step.q * &(&step.c * &transform);
        padded = step.reduced;
    }

    Ok((padded, transform, profile))
}

/// Clears the trailing sentinel column and removes the sentinel rows and
/// columns.
///
/// The last reduction leaves residues of the sentinel column in the rows
/// below its pivot. Those rows are zero everywhere else, so gcd transforms
/// against the pivot row clear them and leave a unit pivot.
fn strip_sentinels(
    mut padded: IntegerMatrix,
    mut transform: IntegerMatrix,
    profile: Vec<usize>,
    n: usize,
    m: usize,
) -> Result<HermiteDecomposition> {
    // The trailing sentinel is always the last pivot.
    let p = profile.len() - 1;
    for i in p + 1..n + 2 {
        let b = padded[(i, m + 1)].clone();
        if b.is_zero() {
            continue;
        }
        let a = padded[(p, m + 1)].clone();
        let (g, x, y) = extended_greatest_common_divisor(&a, &b);
        let t = [[x, y], [-(&b / &g), &a / &g]];
        padded.row_transform_2x2(p, i, &t);
        transform.row_transform_2x2(p, i, &t);
    }

    if padded[(p, m + 1)].is_negative() {
        padded.negate_row(p);
        transform.negate_row(p);
    }
    if !padded[(p, m + 1)].is_one() {
        return Err(MatrixError::InvariantViolation("sentinel pivot is not one"));
    }

    for i in (0..n + 2).filter(|&i| i != p) {
        if padded[(i, m + 1)].is_zero() {
            continue;
        }
        let q = -floor_division(&padded[(i, m + 1)], &padded[(p, m + 1)])?;
        padded.row_multiply_add(i, p, &q);
        transform.row_multiply_add(i, p, &q);
    }

    let kept: Vec<usize> = (1..=n + 1).filter(|&i| i != p).collect();
    let mut reduced = IntegerMatrix::zero(n, m);
    let mut t = IntegerMatrix::identity(n);
    for (dst, &src) in kept.iter().enumerate() {
        reduced.assign_submatrix(dst, 0, &padded.submatrix(src, 1, 1, m));
        t.assign_submatrix(dst, 0, &transform.submatrix(src, 1, 1, n));
    }

    let pivot_columns = profile[1..p].iter().map(|c| c - 1).collect();
    Ok(HermiteDecomposition { transform: t, reduced, pivot_columns })
}

/// Checks the shape of the result. The product and the determinant are only
/// checked in debug builds.
fn validate(a: &IntegerMatrix, r: &HermiteDecomposition) -> Result<()> {
    if !is_hermite(&r.reduced, &r.pivot_columns) {
        return Err(MatrixError::InvariantViolation("not in Hermite normal form"));
    }
    if cfg!(debug_assertions) {
        if &r.transform * a != r.reduced {
            return Err(MatrixError::InvariantViolation("transform * a != reduced"));
        }
        if !r.transform.is_unimodular() {
            return Err(MatrixError::InvariantViolation("transform is not unimodular"));
        }
    }
    Ok(())
}

/// Is `h` in row-style Hermite normal form with the given pivots?
pub fn is_hermite(h: &IntegerMatrix, pivot_columns: &[usize]) -> bool {
    let mut prev = None;
    for (row, &col) in pivot_columns.iter().enumerate() {
        if prev.is_some_and(|p| p >= col) {
            return false;
        }
        prev = Some(col);

        let pivot = &h[(row, col)];
        if !pivot.is_positive() {
            return false;
        }
        if (0..col).any(|c| !h[(row, c)].is_zero()) {
            return false;
        }
        let reduced = |above: usize| {
            !h[(above, col)].is_negative() && &h[(above, col)] < pivot
        };
        if !(0..row).all(reduced) {
            return false;
        }
        if (row + 1..h.num_rows()).any(|below| !h[(below, col)].is_zero()) {
            return false;
        }
    }

    (pivot_columns.len()..h.num_rows()).all(|r| h.is_zero_row(r))
}

#[cfg(test)]
mod test {
    use super::*;
    use num_bigint::BigInt;
    use rand::Rng as _;
    use rand::SeedableRng as _;
    use rand::rngs::StdRng;

    fn check(a: &IntegerMatrix) -> HermiteDecomposition {
        let r = hermite_normal_form(a).unwrap();
        assert_eq!(&r.transform * a, r.reduced, "{a:?}");
        assert!(r.transform.is_unimodular(), "{:?}", r.transform);
        assert!(is_hermite(&r.reduced, &r.pivot_columns), "{:?}", r.reduced);
        r
    }

    #[test]
    fn small_test() {
        let a = IntegerMatrix::from_rows(&[[2, 4], [6, 8]]);
        let r = check(&a);
        assert_eq!(r.reduced, IntegerMatrix::from_rows(&[[2, 0], [0, 4]]));
        assert_eq!(r.transform, IntegerMatrix::from_rows(&[[-2, 1], [3, -1]]));
        assert_eq!(r.pivot_columns, vec![0, 1]);
    }

    #[test]
    fn identity() {
        let a = IntegerMatrix::identity(5);
        let r = check(&a);
        assert_eq!(r.reduced, a);
        assert_eq!(r.transform, a);
        assert_eq!(r.pivot_columns, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn zero_matrix() {
        let r = check(&IntegerMatrix::zero(3, 3));
        assert!(r.pivot_columns.is_empty());
        assert_eq!(r.reduced, IntegerMatrix::zero(3, 3));
    }

    #[test]
    fn rank_deficient() {
        let a = IntegerMatrix::from_rows(&[[1, 2, 3], [2, 4, 6], [0, 0, 5]]);
        let r = check(&a);
        assert_eq!(r.pivot_columns, vec![0, 2]);
        assert_eq!(r.reduced, IntegerMatrix::from_rows(&[[1, 2, 3], [0, 0, 5], [0, 0, 0]]));
    }

    #[test]
    fn keeps_denominator() {
        let a = IntegerMatrix::from_rows(&[[3, 1], [0, 2]]).with_denominator(4).unwrap();
        let r = hermite_normal_form(&a).unwrap();
        assert_eq!(r.reduced.denominator(), &BigInt::from(4));
        assert_eq!(r.reduced.fraction(1, 1), a.fraction(1, 1));
    }

    #[test]
    fn sentinel_column_residues() {
        // The last reduction leaves residues below the sentinel pivot.
        let a = IntegerMatrix::from_rows(&[[-12], [-22], [3]]);
        let r = check(&a);
        assert_eq!(r.reduced, IntegerMatrix::from_rows(&[[1], [0], [0]]));
        assert_eq!(r.pivot_columns, vec![0]);
    }

    #[test]
    fn rejects_broken_result() {
        let a = IntegerMatrix::from_rows(&[[2, 3], [0, 2]]);
        let r = HermiteDecomposition {
            transform: IntegerMatrix::identity(2),
            reduced: a.clone(),
            pivot_columns: vec![0, 1],
        };
        assert!(matches!(validate(&a, &r), Err(MatrixError::InvariantViolation(_))));
    }

    #[test]
    fn random_test() {
        let rng = &mut StdRng::seed_from_u64(0);
        for _ in 0..200 {
            let rows = rng.random_range(1..7);
            let cols = rng.random_range(1..7);
            let a = IntegerMatrix::random(rows, cols, 30, rng);
            check(&a);
        }
    }

    #[test]
    fn random_tall() {
        let rng = &mut StdRng::seed_from_u64(2);
        for _ in 0..100 {
            let a = IntegerMatrix::random(6, 2, 30, rng);
            let r = check(&a);
            assert!(r.rank() <= 2);
        }
    }

    #[test]
    fn unimodular_input_gives_identity() {
        let rng = &mut StdRng::seed_from_u64(1);
        for n in 1..6 {
            let a = IntegerMatrix::random_invertible(n, n, rng);
            let r = check(&a);
            assert_eq!(r.reduced, IntegerMatrix::identity(n));
        }
    }
}
