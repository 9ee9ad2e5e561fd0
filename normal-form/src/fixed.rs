//! Small fixed-size integer matrices over `i64`.
//!
//! These are used for 3x3 cell matrices and the 3x9/9x3 stacks of them. The
//! Smith normal form here doesn't go through the Hermite normal form, it
//! alternates between the row echelon forms of the matrix and its transpose
//! until the matrix is diagonal. All arithmetic is checked.

use std::ops::{Index, IndexMut};

use log::{debug, trace};
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::config::Config;
use crate::error::{MatrixError, Result};
use crate::integer::extended_greatest_common_divisor;
use crate::matrix::IntegerMatrix;

/// An R×C matrix of `i64`s.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FixedMatrix<const R: usize, const C: usize> {
    entries: [[i64; C]; R],
}

pub type Int3x3 = FixedMatrix<3, 3>;
pub type Int3x9 = FixedMatrix<3, 9>;
pub type Int9x3 = FixedMatrix<9, 3>;
pub type Int9x9 = FixedMatrix<9, 9>;

/// `diagonal = left * m * right`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedSmithDecomposition<const R: usize, const C: usize> {
    pub left: FixedMatrix<R, R>,
    pub diagonal: FixedMatrix<R, C>,
    pub right: FixedMatrix<C, C>,
}

fn checked(v: Option<i64>) -> Result<i64> {
    v.ok_or(MatrixError::Overflow)
}

/// `a * x + b * y`
fn combine(a: i64, x: i64, b: i64, y: i64) -> Result<i64> {
    checked(a.checked_mul(x).and_then(|l| b.checked_mul(y).and_then(|r| l.checked_add(r))))
}

/// Extended gcd of two `i64`s. The gcd is non-negative.
fn extended_gcd(a: i64, b: i64) -> Result<(i64, i64, i64)> {
    let (g, x, y) = extended_greatest_common_divisor(&a.into(), &b.into());
    let to_i64 = |v: BigInt| checked(v.to_i64());
    Ok((to_i64(g)?, to_i64(x)?, to_i64(y)?))
}

impl<const R: usize, const C: usize> FixedMatrix<R, C> {
    pub fn zero() -> Self {
        Self { entries: [[0; C]; R] }
    }

    /// Ones on the main diagonal.
    pub fn identity() -> Self {
        let mut m = Self::zero();
        for i in 0..R.min(C) {
            m.entries[i][i] = 1;
        }
        m
    }

    pub fn from_rows(entries: [[i64; C]; R]) -> Self {
        Self { entries }
    }

    pub fn rows(&self) -> &[[i64; C]; R] {
        &self.entries
    }

    pub fn transposed(&self) -> FixedMatrix<C, R> {
        let mut t = FixedMatrix::<C, R>::zero();
        for (r, row) in self.entries.iter().enumerate() {
            for (c, e) in row.iter().enumerate() {
                t.entries[c][r] = *e;
            }
        }
        t
    }

    /// Matrix product with overflow checks.
    pub fn checked_mul<const K: usize>(
        &self,
        rhs: &FixedMatrix<C, K>,
    ) -> Result<FixedMatrix<R, K>> {
        let mut m = FixedMatrix::<R, K>::zero();
        for r in 0..R {
            for c in 0..K {
                let mut acc = 0i64;
                for k in 0..C {
                    acc = checked(
                        self.entries[r][k]
                            .checked_mul(rhs.entries[k][c])
                            .and_then(|p| acc.checked_add(p)),
                    )?;
                }
                m.entries[r][c] = acc;
            }
        }
        Ok(m)
    }

    pub fn is_diagonal(&self) -> bool {
        self.entries
            .iter()
            .enumerate()
            .all(|(r, row)| row.iter().enumerate().all(|(c, e)| r == c || *e == 0))
    }

    pub fn diagonal_entries(&self) -> Vec<i64> {
        (0..R.min(C)).map(|i| self.entries[i][i]).collect()
    }

    fn swap_rows(&mut self, i: usize, j: usize) {
        self.entries.swap(i, j);
    }

    fn swap_columns(&mut self, i: usize, j: usize) {
        for row in &mut self.entries {
            row.swap(i, j);
        }
    }

    fn negate_row(&mut self, r: usize) -> Result<()> {
        for e in &mut self.entries[r] {
            *e = checked(e.checked_neg())?;
        }
        Ok(())
    }

    /// Replaces rows `i` and `j` by `t[0][0] * i + t[0][1] * j` and
    /// `t[1][0] * i + t[1][1] * j`.
    fn row_transform(&mut self, i: usize, j: usize, t: [[i64; 2]; 2]) -> Result<()> {
        for c in 0..C {
            let (x, y) = (self.entries[i][c], self.entries[j][c]);
            self.entries[i][c] = combine(t[0][0], x, t[0][1], y)?;
            self.entries[j][c] = combine(t[1][0], x, t[1][1], y)?;
        }
        Ok(())
    }

    /// Same as [`Self::row_transform`] for columns.
    fn col_transform(&mut self, i: usize, j: usize, t: [[i64; 2]; 2]) -> Result<()> {
        for row in &mut self.entries {
            let (x, y) = (row[i], row[j]);
            row[i] = combine(t[0][0], x, t[0][1], y)?;
            row[j] = combine(t[1][0], x, t[1][1], y)?;
        }
        Ok(())
    }

    /// Smith normal form with the default configuration.
    pub fn smith_normal_form(&self) -> Result<FixedSmithDecomposition<R, C>> {
        self.smith_normal_form_with(&Config::default())
    }

    /// Smith normal form by alternating row echelon forms.
    ///
    /// The matrix has to be of full rank, otherwise some pivot search comes up
    /// empty and [`MatrixError::PivotFailure`] is returned.
    pub fn smith_normal_form_with(
        &self,
        config: &Config,
    ) -> Result<FixedSmithDecomposition<R, C>> {
        let mut m = *self;
        let mut left = FixedMatrix::<R, R>::identity();

        // Row operations on the transpose, i.e. the transpose of the right
        // transform.
        let mut t = FixedMatrix::<C, C>::identity();

        let mut diagonal = false;
        for round in 0..config.max_alternations {
            let mut mt = m.transposed();
            row_echelon(&mut mt, &mut t)?;
            m = mt.transposed();
            if m.is_diagonal() {
                diagonal = true;
                trace!("Diagonal after {} echelon forms", 2 * round + 1);
                break;
            }

            row_echelon(&mut m, &mut left)?;
            if m.is_diagonal() {
                diagonal = true;
                trace!("Diagonal after {} echelon forms", 2 * round + 2);
                break;
            }
        }

        if !diagonal {
            return Err(MatrixError::AlternationExhausted {
                rounds: config.max_alternations,
            });
        }

        let mut r = FixedSmithDecomposition { left, diagonal: m, right: t.transposed() };
        r.canonical_diagonal()?;
        r.validate(self)?;

        debug!(
            "Fixed-size Smith normal form of a {}×{} matrix: {:?}",
            R,
            C,
            r.diagonal.diagonal_entries()
        );
        Ok(r)
    }
}

impl<const R: usize, const C: usize> FixedSmithDecomposition<R, C> {
    /// Checks the shape of the result. The product is only checked in debug
    /// builds.
    fn validate(&self, m: &FixedMatrix<R, C>) -> Result<()> {
        if !self.diagonal.is_diagonal() {
            return Err(MatrixError::InvariantViolation("not diagonal"));
        }
        let d = self.diagonal.diagonal_entries();
        let chain = d.windows(2).all(|w| match w {
            [0, b] => *b == 0,
            [a, b] => *a > 0 && b % a == 0,
            _ => true,
        });
        if d.iter().any(|&e| e < 0) || !chain {
            return Err(MatrixError::InvariantViolation("not a divisibility chain"));
        }

        if cfg!(debug_assertions) {
            let product = &(&IntegerMatrix::from(&self.left) * &IntegerMatrix::from(m))
                * &IntegerMatrix::from(&self.right);
            if product != IntegerMatrix::from(&self.diagonal) {
                return Err(MatrixError::InvariantViolation("left * m * right != diagonal"));
            }
        }
        Ok(())
    }

    /// Makes the diagonal non-negative with `d[i] | d[i + 1]` and zeros last.
    fn canonical_diagonal(&mut self) -> Result<()> {
        let k = R.min(C);
        for i in 0..k {
            if self.diagonal[(i, i)] < 0 {
                self.diagonal.negate_row(i)?;
                self.left.negate_row(i)?;
            }
        }

        for i in 0..k {
            for j in i + 1..k {
                let a = self.diagonal[(i, i)];
                let b = self.diagonal[(j, j)];
                if a == 0 {
                    if b != 0 {
                        self.diagonal.swap_rows(i, j);
                        self.left.swap_rows(i, j);
                        self.diagonal.swap_columns(i, j);
                        self.right.swap_columns(i, j);
                    }
                    continue;
                }
                if b % a == 0 {
                    continue;
                }

                // diag(a, b) -> diag(gcd, lcm)
                let (g, x, y) = extended_gcd(a, b)?;
                let add = [[1, 1], [0, 1]];
                self.diagonal.row_transform(i, j, add)?;
                self.left.row_transform(i, j, add)?;

                let t = [[x, y], [checked((b / g).checked_neg())?, a / g]];
                self.diagonal.col_transform(i, j, t)?;
                self.right.col_transform(i, j, t)?;

                let m = checked(y.checked_mul(b / g).and_then(i64::checked_neg))?;
                let sub = [[1, 0], [m, 1]];
                self.diagonal.row_transform(i, j, sub)?;
                self.left.row_transform(i, j, sub)?;
            }
        }
        Ok(())
    }
}

/// Brings `m` into reduced row echelon form with unimodular row operations,
/// which are also applied to `p`. Pivots are positive and the entries above
/// them are in `[0, pivot)`.
fn row_echelon<const R: usize, const C: usize, const K: usize>(
    m: &mut FixedMatrix<R, C>,
    p: &mut FixedMatrix<R, K>,
) -> Result<()> {
    let mut row = 0;
    for col in 0..C {
        if row == R {
            break;
        }

        let Some(pivot) = (row..R).find(|&i| m[(i, col)] != 0) else {
            // A column can be skipped as long as enough columns remain to
            // fill the remaining rows.
            if C - col > R - row {
                continue;
            }
            return Err(MatrixError::PivotFailure { column: col });
        };
        m.swap_rows(row, pivot);
        p.swap_rows(row, pivot);

        for i in row + 1..R {
            let b = m[(i, col)];
            if b == 0 {
                continue;
            }
            let a = m[(row, col)];
            let t = if b.checked_rem(a) == Some(0) {
                // Plain subtraction keeps the pivot row as it is.
                [[1, 0], [checked(b.checked_div(a).and_then(i64::checked_neg))?, 1]]
            } else {
                let (g, x, y) = extended_gcd(a, b)?;
                [[x, y], [checked((b / g).checked_neg())?, a / g]]
            };
            m.row_transform(row, i, t)?;
            p.row_transform(row, i, t)?;
        }

        if m[(row, col)] < 0 {
            m.negate_row(row)?;
            p.negate_row(row)?;
        }

        let pivot = m[(row, col)];
        for k in 0..row {
            let q = m[(k, col)].div_euclid(pivot);
            if q == 0 {
                continue;
            }
            let t = [[1, checked(q.checked_neg())?], [0, 1]];
            m.row_transform(k, row, t)?;
            p.row_transform(k, row, t)?;
        }
        row += 1;
    }
    Ok(())
}

impl<const R: usize, const C: usize> Default for FixedMatrix<R, C> {
    fn default() -> Self {
        Self::zero()
    }
}

impl<const R: usize, const C: usize> Index<(usize, usize)> for FixedMatrix<R, C> {
    type Output = i64;

    fn index(&self, (r, c): (usize, usize)) -> &Self::Output {
        &self.entries[r][c]
    }
}

impl<const R: usize, const C: usize> IndexMut<(usize, usize)> for FixedMatrix<R, C> {
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut Self::Output {
        &mut self.entries[r][c]
    }
}

impl<const R: usize, const C: usize> From<&FixedMatrix<R, C>> for IntegerMatrix {
    fn from(m: &FixedMatrix<R, C>) -> Self {
        IntegerMatrix::from_iter(R, C, m.entries.iter().flatten().map(|&e| BigInt::from(e)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hermite::hermite_normal_form;
    use crate::smith::{is_divisibility_chain, smith_normal_form};
    use rand::SeedableRng as _;
    use rand::distr::{Distribution as _, Uniform};
    use rand::rngs::StdRng;

    fn random_full_rank<const R: usize, const C: usize>(
        rng: &mut StdRng,
    ) -> FixedMatrix<R, C> {
        let dist = Uniform::new_inclusive(-4i64, 4).unwrap();
        loop {
            let mut m = FixedMatrix::<R, C>::zero();
            for r in 0..R {
                for c in 0..C {
                    m[(r, c)] = dist.sample(rng);
                }
            }
            let rank = hermite_normal_form(&IntegerMatrix::from(&m)).unwrap().rank();
            if rank == R.min(C) {
                return m;
            }
        }
    }

    fn check<const R: usize, const C: usize>(m: &FixedMatrix<R, C>) {
        let r = m.smith_normal_form().unwrap();
        let product = r.left.checked_mul(m).unwrap().checked_mul(&r.right).unwrap();
        assert_eq!(product, r.diagonal, "{m:?}");
        assert!(IntegerMatrix::from(&r.left).is_unimodular(), "{:?}", r.left);
        assert!(IntegerMatrix::from(&r.right).is_unimodular(), "{:?}", r.right);
        assert!(r.diagonal.is_diagonal());

        let d = r.diagonal.diagonal_entries();
        let big: Vec<BigInt> = d.iter().map(|&e| e.into()).collect();
        assert!(d.iter().all(|&e| e > 0), "{d:?}");
        assert!(is_divisibility_chain(&big), "{d:?}");

        // The diagonal is unique, so it has to agree with the general version.
        let general = smith_normal_form(&IntegerMatrix::from(m)).unwrap();
        assert_eq!(general.diagonal.diagonal_entries(), big);
    }

    #[test]
    fn diagonal_input() {
        let m = Int3x3::from_rows([[6, 0, 0], [0, 4, 0], [0, 0, 1]]);
        let r = m.smith_normal_form().unwrap();
        assert_eq!(r.diagonal.diagonal_entries(), vec![1, 2, 12]);
    }

    #[test]
    fn random_9x3() {
        let rng = &mut StdRng::seed_from_u64(0);
        for _ in 0..20 {
            check(&random_full_rank::<9, 3>(rng));
        }
    }

    #[test]
    fn random_3x9() {
        let rng = &mut StdRng::seed_from_u64(1);
        for _ in 0..200 {
            check(&random_full_rank::<3, 9>(rng));
        }
    }

    #[test]
    fn random_3x3() {
        let rng = &mut StdRng::seed_from_u64(2);
        for _ in 0..20 {
            check(&random_full_rank::<3, 3>(rng));
        }
    }

    #[test]
    fn divisible_entries_do_not_cycle() {
        // Swapping rows instead of subtracting moved an off-diagonal entry
        // back and forth between the two orientations.
        let m = Int3x9::from_rows([
            [0, -3, 1, -4, -1, 3, -1, 0, -2],
            [0, 1, -3, 3, 2, 4, 3, -1, 1],
            [-4, -2, -1, 0, 2, 0, 0, 1, 3],
        ]);
        check(&m);

        let m = Int3x3::from_rows([[1, 0, 0], [0, 1, -1], [0, 0, 1]]);
        let r = m.smith_normal_form().unwrap();
        assert_eq!(r.diagonal, Int3x3::identity());
    }

    #[test]
    fn reduced_echelon_form() {
        let mut m = Int3x3::from_rows([[2, 5, 7], [0, 3, 4], [0, 0, 5]]);
        let mut p = Int3x3::identity();
        row_echelon(&mut m, &mut p).unwrap();
        assert_eq!(m, Int3x3::from_rows([[2, 2, 3], [0, 3, 4], [0, 0, 5]]));
        for c in 0..3 {
            for r in 0..c {
                assert!((0..m[(c, c)]).contains(&m[(r, c)]), "{m:?}");
            }
        }
    }

    #[test]
    fn rejects_broken_result() {
        let m = Int3x3::from_rows([[2, 0, 0], [0, 3, 0], [0, 0, 1]]);
        let r = FixedSmithDecomposition {
            left: Int3x3::identity(),
            diagonal: m,
            right: Int3x3::identity(),
        };
        let err = MatrixError::InvariantViolation("not a divisibility chain");
        assert_eq!(r.validate(&m), Err(err));
    }

    #[test]
    fn rank_deficient() {
        let m = Int9x3::zero();
        assert!(matches!(m.smith_normal_form(), Err(MatrixError::PivotFailure { .. })));

        let mut m = Int3x9::identity();
        m[(2, 2)] = 0;
        assert!(matches!(m.smith_normal_form(), Err(MatrixError::PivotFailure { .. })));
    }

    #[test]
    fn alternation_cap() {
        let m = Int3x3::identity();
        let r = m.smith_normal_form_with(&Config::default().with_max_alternations(0));
        assert_eq!(r, Err(MatrixError::AlternationExhausted { rounds: 0 }));
    }

    #[test]
    fn overflow() {
        let m = Int3x3::from_rows([[i64::MAX, 0, 0], [i64::MAX - 1, 1, 0], [0, 0, 1]]);
        assert_eq!(m.smith_normal_form(), Err(MatrixError::Overflow));
    }

    #[test]
    fn stacked_conversion() {
        let m = Int9x3::identity();
        let big = IntegerMatrix::from(&m);
        assert_eq!(big.num_rows(), 9);
        assert_eq!(big.num_cols(), 3);
        assert_eq!(big, IntegerMatrix::from(&m.transposed()).transposed());
    }
}
