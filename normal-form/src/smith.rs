//! Smith normal form with unimodular transforms on both sides.
//!
//! The computation starts from the Hermite normal form. After permuting the
//! pivot columns to the front, the leading block is upper triangular with a
//! positive diagonal. Phase one walks through the pivot columns and folds
//! each into the diagonal with extended gcd column transforms. Phase two
//! moves the non-pivot columns of the rows whose diagonal entry isn't one
//! into the diagonal and repeats phase one on the transposed block.
//!
//! Every step is applied as a full row or column operation to the matrix and
//! the matching transform, so `left * a * right` holds after any step. A
//! final elimination sweep and the gcd/lcm pass produce the canonical
//! diagonal.

use log::{debug, trace};
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, Zero};

use crate::config::{Config, SieveConfig};
use crate::error::{MatrixError, Result};
use crate::hermite::hermite_normal_form_with;
use crate::integer::{division_modulo, extended_greatest_common_divisor, floor_division};
use crate::matrix::IntegerMatrix;
use crate::sieve::combination_coefficients;

/// `diagonal = left * a * right`.
#[derive(Clone, Debug)]
pub struct SmithDecomposition {
    /// Unimodular n×n transform of the rows.
    pub left: IntegerMatrix,

    /// Unimodular m×m transform of the columns.
    pub right: IntegerMatrix,

    /// The Smith normal form. It keeps the denominator of the input.
    pub diagonal: IntegerMatrix,
}

impl SmithDecomposition {
    /// The number of non-zero invariant factors.
    pub fn rank(&self) -> usize {
        self.diagonal
            .diagonal_entries()
            .iter()
            .take_while(|d| !d.is_zero())
            .count()
    }
}

/// The matrix being diagonalized together with both transforms.
struct Work {
    a: IntegerMatrix,
    u: IntegerMatrix,
    v: IntegerMatrix,
}

impl Work {
    fn new(a: IntegerMatrix) -> Self {
        let u = IntegerMatrix::identity(a.num_rows());
        let v = IntegerMatrix::identity(a.num_cols());
        Self { a, u, v }
    }

    /// row_n += row_m * c
    fn row_add(&mut self, n: usize, m: usize, c: &BigInt) {
        self.a.row_multiply_add(n, m, c);
        self.u.row_multiply_add(n, m, c);
    }

    /// col_n += col_m * c
    fn col_add(&mut self, n: usize, m: usize, c: &BigInt) {
        self.a.col_multiply_add(n, m, c);
        self.v.col_multiply_add(n, m, c);
    }

    fn negate_row(&mut self, r: usize) {
        self.a.negate_row(r);
        self.u.negate_row(r);
    }

    fn swap_rows(&mut self, i: usize, j: usize) {
        self.a.swap_rows(i, j);
        self.u.swap_rows(i, j);
    }

    fn swap_columns(&mut self, i: usize, j: usize) {
        self.a.swap_columns(i, j);
        self.v.swap_columns(i, j);
    }

    fn col_transform(&mut self, i: usize, j: usize, t: &[[BigInt; 2]; 2]) {
        self.a.col_transform_2x2(i, j, t);
        self.v.col_transform_2x2(i, j, t);
    }

    /// Reduces the entries of row `r` right of the diagonal modulo `a[r, r]`
    /// with column operations.
    fn reduce_row(&mut self, r: usize) -> Result<()> {
        let pivot = self.a[(r, r)].clone();
        if !pivot.is_positive() {
            return Ok(());
        }
        for j in r + 1..self.a.num_cols() {
            let (d, _) = division_modulo(&self.a[(r, j)], &pivot)?;
            if !d.is_zero() {
                self.col_add(j, r, &-d);
            }
        }
        Ok(())
    }

    /// Replaces columns `i` and `j` such that `a[i, i]` becomes the gcd of
    /// `a[i, i]` and `a[i, j]` and `a[i, j]` becomes zero.
    /// Returns false if both entries are zero.
    fn gcd_columns(&mut self, i: usize, j: usize) -> bool {
        let (g, s, t) = extended_greatest_common_divisor(&self.a[(i, i)], &self.a[(i, j)]);
        if g.is_zero() {
            return false;
        }
        let ss = -&self.a[(i, j)] / &g;
        let tt = &self.a[(i, i)] / &g;
        self.col_transform(i, j, &[[s, t], [ss, tt]]);
        true
    }

    /// Clears column `c` below row `c`, using floor division by `a[c, c]`.
    fn reduce_below(&mut self, c: usize) -> Result<()> {
        let pivot = self.a[(c, c)].clone();
        if pivot.is_zero() {
            return Ok(());
        }
        for i in c + 1..self.a.num_rows() {
            let d = floor_division(&self.a[(i, c)], &pivot)?;
            if !d.is_zero() {
                self.row_add(i, c, &-d);
            }
        }
        Ok(())
    }

    /// Folds column `col` into the diagonal of the leading `col`×`col` block.
    fn fold_column(&mut self, col: usize, config: &SieveConfig) -> Result<()> {
        // Make the gcd of each diagonal entry with the column capture the
        // entries below it.
        for i in (0..col).rev() {
            let n = self.a[(i, i)].clone();
            if !n.is_positive() {
                continue;
            }
            let below = [self.a[(i + 1, col)].clone()];
            let c = combination_coefficients(&self.a[(i, col)], &below, &n, config)?;
            self.row_add(i, i + 1, &c[0]);
            self.reduce_row(i)?;
        }

        for j in 0..col {
            if !self.gcd_columns(j, col) {
                continue;
            }
            self.reduce_below(j)?;
            self.reduce_row(j)?;
        }

        if self.a[(col, col)].is_negative() {
            self.negate_row(col);
        }
        self.reduce_row(col)
    }

    /// Moves the entries of `row` in the non-pivot columns `r..` into the
    /// diagonal.
    fn fold_row_tail(&mut self, row: usize, r: usize) -> Result<()> {
        for j in r..self.a.num_cols() {
            if self.a[(row, j)].is_zero() {
                continue;
            }
            self.gcd_columns(row, j);
            self.reduce_below(row)?;
        }
        Ok(())
    }

    /// Eliminates every remaining off-diagonal entry.
    fn eliminate_off_diagonal(&mut self) -> Result<()> {
        let rows = self.a.num_rows();
        let cols = self.a.num_cols();
        for i in 0..self.a.min_dim() {
            loop {
                if (i + 1..rows).any(|k| !self.a[(k, i)].is_zero()) {
                    // Smallest non-zero entry of the column becomes the pivot.
                    let pivot = (i..rows)
                        .filter(|&k| !self.a[(k, i)].is_zero())
                        .min_by_key(|&k| self.a[(k, i)].magnitude().clone());
                    let Some(pivot) = pivot else { break };
                    self.swap_rows(i, pivot);

                    let p = self.a[(i, i)].clone();
                    for k in i + 1..rows {
                        if !self.a[(k, i)].is_zero() {
                            let m = -floor_division(&self.a[(k, i)], &p)?;
                            self.row_add(k, i, &m);
                        }
                    }
                    continue;
                }

                if (i + 1..cols).all(|k| self.a[(i, k)].is_zero()) {
                    break;
                }

                let pivot = (i..cols)
                    .filter(|&k| !self.a[(i, k)].is_zero())
                    .min_by_key(|&k| self.a[(i, k)].magnitude().clone());
                let Some(pivot) = pivot else { break };
                self.swap_columns(i, pivot);

                let p = self.a[(i, i)].clone();
                for k in i + 1..cols {
                    if !self.a[(i, k)].is_zero() {
                        let m = -floor_division(&self.a[(i, k)], &p)?;
                        self.col_add(k, i, &m);
                    }
                }
            }
        }
        Ok(())
    }

    /// Makes the diagonal non-negative with `d[i] | d[i + 1]` and zeros last.
    fn canonical_diagonal(&mut self) {
        let k = self.a.min_dim();
        for i in 0..k {
            if self.a[(i, i)].is_negative() {
                self.negate_row(i);
            }
        }

        for i in 0..k {
            for j in i + 1..k {
                let a = self.a[(i, i)].clone();
                let b = self.a[(j, j)].clone();
                if a.is_zero() {
                    if !b.is_zero() {
                        self.swap_rows(i, j);
                        self.swap_columns(i, j);
                    }
                    continue;
                }
                if b.is_multiple_of(&a) {
                    continue;
                }

                // diag(a, b) -> diag(gcd, lcm)
                let (g, x, y) = extended_greatest_common_divisor(&a, &b);
                self.row_add(i, j, &BigInt::one());
                self.col_transform(i, j, &[[x, y.clone()], [-(&b / &g), &a / &g]]);
                let m = -(&y * &b / &g);
                self.row_add(j, i, &m);
                trace!("Replaced diagonal pair ({a}, {b}) by ({g}, {})", &self.a[(j, j)]);
            }
        }
    }
}

/// Computes the Smith normal form with the default configuration.
pub fn smith_normal_form(a: &IntegerMatrix) -> Result<SmithDecomposition> {
    smith_normal_form_with(a, &Config::default())
}

/// Computes the Smith normal form of `a`.
pub fn smith_normal_form_with(
    a: &IntegerMatrix,
    config: &Config,
) -> Result<SmithDecomposition> {
    let m = a.num_cols();
    let hnf = hermite_normal_form_with(a, config)?;
    let r = hnf.rank();

    let mut w = Work {
        a: hnf.reduced,
        u: hnf.transform,
        v: IntegerMatrix::identity(m),
    };

    // Move the pivot columns to the front.
    for (i, &p) in hnf.pivot_columns.iter().enumerate() {
        if p > i {
            w.swap_columns(i, p);
        }
    }

    for col in 0..r {
        w.fold_column(col, &config.sieve)?;
    }

    let beg = (0..r).find(|&i| !w.a[(i, i)].is_one()).unwrap_or(r);
    if beg < r && r < m {
        for row in beg..r {
            w.fold_row_tail(row, r)?;
        }
        fold_transposed_block(&mut w, beg, r, &config.sieve)?;
    }

    w.eliminate_off_diagonal()?;
    w.canonical_diagonal();

    let result = SmithDecomposition { left: w.u, right: w.v, diagonal: w.a };
    validate(a, &result)?;

    debug!(
        "Smith normal form of a {}×{m} matrix: {:?}",
        a.num_rows(),
        result.diagonal.diagonal_entries()
    );
    Ok(result)
}

/// Runs phase one on the transpose of the block `beg..r` and applies the
/// resulting transforms to the whole matrix.
fn fold_transposed_block(
    w: &mut Work,
    beg: usize,
    r: usize,
    config: &SieveConfig,
) -> Result<()> {
    let k = r - beg;
    let mut block = Work::new(w.a.submatrix(beg, beg, k, k).transposed());
    for col in 0..k {
        block.fold_column(col, config)?;
    }

    // uu * bᵀ * vv = d, so vvᵀ * b * uuᵀ = dᵀ.
    let rows = w.a.num_rows();
    let cols = w.a.num_cols();
    let mut left = IntegerMatrix::identity(rows);
    left.assign_submatrix(beg, beg, &block.v.transposed());
    let mut right = IntegerMatrix::identity(cols);
    right.assign_submatrix(beg, beg, &block.u.transposed());

    w.a = &(&left * &w.a) * &right;
    w.u = &left * &w.u;
    w.v = &w.v * &right;
    Ok(())
}

/// Does every non-zero entry divide the next one, with zeros at the end?
pub fn is_divisibility_chain(d: &[BigInt]) -> bool {
    d.windows(2).all(|w| {
        if w[0].is_zero() {
            w[1].is_zero()
        } else {
            w[1].is_multiple_of(&w[0])
        }
    })
}

/// Checks the shape of the result. The product and the determinants are only
/// checked in debug builds.
fn validate(a: &IntegerMatrix, r: &SmithDecomposition) -> Result<()> {
    if !r.diagonal.is_diagonal() {
        return Err(MatrixError::InvariantViolation("not diagonal"));
    }
    let d = r.diagonal.diagonal_entries();
    if d.iter().any(|e| e.is_negative()) {
        return Err(MatrixError::InvariantViolation("negative invariant factor"));
    }
    if !is_divisibility_chain(&d) {
        return Err(MatrixError::InvariantViolation("not a divisibility chain"));
    }

    if cfg!(debug_assertions) {
        if &(&r.left * a) * &r.right != r.diagonal {
            return Err(MatrixError::InvariantViolation("left * a * right != diagonal"));
        }
        if !r.left.is_unimodular() || !r.right.is_unimodular() {
            return Err(MatrixError::InvariantViolation("transform is not unimodular"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::Rng as _;
    use rand::SeedableRng as _;
    use rand::rngs::StdRng;

    fn ints(v: &[i64]) -> Vec<BigInt> {
        v.iter().map(|&e| e.into()).collect()
    }

    fn check(a: &IntegerMatrix) -> SmithDecomposition {
        let r = smith_normal_form(a).unwrap();
        assert_eq!(&(&r.left * a) * &r.right, r.diagonal, "{a:?}");
        assert!(r.left.is_unimodular(), "{:?}", r.left);
        assert!(r.right.is_unimodular(), "{:?}", r.right);
        assert!(r.diagonal.is_diagonal(), "{:?}", r.diagonal);
        let d = r.diagonal.diagonal_entries();
        assert!(d.iter().all(|e| !e.is_negative()), "{d:?}");
        assert!(is_divisibility_chain(&d), "{d:?}");
        r
    }

    #[test]
    fn small_test() {
        let a = IntegerMatrix::from_rows(&[[2, 4], [6, 8]]);
        let r = check(&a);
        assert_eq!(r.diagonal, IntegerMatrix::from_rows(&[[2, 0], [0, 4]]));
        assert_eq!(r.rank(), 2);
    }

    #[test]
    fn identity() {
        let a = IntegerMatrix::identity(5);
        let r = check(&a);
        assert_eq!(r.diagonal, a);
        assert_eq!(r.left, a);
        assert_eq!(r.right, a);
    }

    #[test]
    fn zero_matrix() {
        let r = check(&IntegerMatrix::zero(3, 3));
        assert_eq!(r.diagonal, IntegerMatrix::zero(3, 3));
        assert_eq!(r.rank(), 0);
    }

    #[test]
    fn known_invariant_factors() {
        let a = IntegerMatrix::from_rows(&[[2, 4, 4], [-6, 6, 12], [10, -4, -16]]);
        let r = check(&a);
        assert_eq!(r.diagonal.diagonal_entries(), ints(&[2, 6, 12]));

        let r = check(&IntegerMatrix::from_rows(&[[6, 0], [0, 4]]));
        assert_eq!(r.diagonal.diagonal_entries(), ints(&[2, 12]));
    }

    #[test]
    fn non_square() {
        let a = IntegerMatrix::from_rows(&[[2, 0, 4, 6], [0, 3, 0, 9]]);
        let r = check(&a);
        assert_eq!(r.diagonal.diagonal_entries(), ints(&[1, 6]));

        let t = check(&a.transposed());
        assert_eq!(t.diagonal.diagonal_entries(), ints(&[1, 6]));
    }

    #[test]
    fn keeps_denominator() {
        let a = IntegerMatrix::from_rows(&[[2, 4], [6, 8]]).with_denominator(3).unwrap();
        let r = smith_normal_form(&a).unwrap();
        assert_eq!(r.diagonal.denominator(), &BigInt::from(3));
        assert_eq!(r.diagonal.diagonal_entries(), ints(&[2, 4]));
    }

    #[test]
    fn same_as_hermite_form() {
        let rng = &mut StdRng::seed_from_u64(0);
        for _ in 0..20 {
            let rows = rng.random_range(1..5);
            let cols = rng.random_range(1..5);
            let a = IntegerMatrix::random(rows, cols, 20, rng);
            let h = hermite_normal_form_with(&a, &Config::default()).unwrap();
            assert_eq!(
                check(&a).diagonal.diagonal_entries(),
                check(&h.reduced).diagonal.diagonal_entries(),
                "{a:?}"
            );
        }
    }

    #[test]
    fn random_test() {
        let rng = &mut StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let rows = rng.random_range(1..6);
            let cols = rng.random_range(1..6);
            let a = IntegerMatrix::random(rows, cols, 10, rng);
            check(&a);
        }
    }

    #[test]
    fn left_transform_through_sentinel_residues() {
        let a = IntegerMatrix::from_rows(&[[-12], [-22], [3]]);
        let r = check(&a);
        assert_eq!(r.diagonal.diagonal_entries(), ints(&[1]));
    }

    #[test]
    fn random_tall() {
        let rng = &mut StdRng::seed_from_u64(2);
        for _ in 0..50 {
            let a = IntegerMatrix::random(6, 2, 30, rng);
            check(&a);
        }
    }

    #[test]
    fn rejects_broken_result() {
        let a = IntegerMatrix::from_rows(&[[2, 0], [0, 3]]);
        let r = SmithDecomposition {
            left: IntegerMatrix::identity(2),
            right: IntegerMatrix::identity(2),
            diagonal: a.clone(),
        };
        assert!(matches!(validate(&a, &r), Err(MatrixError::InvariantViolation(_))));
    }

    #[test]
    fn divisibility_chain() {
        assert!(is_divisibility_chain(&ints(&[1, 2, 6, 0, 0])));
        assert!(!is_divisibility_chain(&ints(&[2, 3])));
        assert!(!is_divisibility_chain(&ints(&[0, 3])));
        assert!(is_divisibility_chain(&[]));
    }
}
