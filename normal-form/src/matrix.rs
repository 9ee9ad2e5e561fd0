//! Dense integer matrices with a shared denominator.
//!
//! An [`IntegerMatrix`] stores its entries in row-major order together with a
//! positive denominator `D`, so the matrix it represents is `entries / D`.
//! The denominator is never reduced automatically, call
//! [`IntegerMatrix::clean_up`] when coefficient growth matters.
//!
//! All the elementary operations (row/column swaps, adding multiples of rows,
//! 2x2 transforms) work on the stored integers directly and leave the
//! denominator alone.

use std::{
    fmt::{Debug, Display},
    ops::{Index, IndexMut, Mul},
};

use itertools::iproduct;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use rand::Rng;

use crate::error::{MatrixError, Result};
use crate::fixed::Int3x3;
use crate::integer::{content, greatest_common_divisor};

/// A dense matrix of [`BigInt`]s with a shared denominator.
#[derive(Clone)]
pub struct IntegerMatrix {
    /// Memory that holds the entries in row-major order.
    entries: Vec<BigInt>,

    /// The number of rows.
    rows: usize,

    /// The number of columns.
    cols: usize,

    /// The denominator shared by all entries. Always positive.
    denominator: BigInt,
}

impl IntegerMatrix {
    /// Returns an r×c zero matrix.
    pub fn zero(r: usize, c: usize) -> Self {
        Self {
            entries: vec![BigInt::zero(); r * c],
            rows: r,
            cols: c,
            denominator: BigInt::one(),
        }
    }

    /// Returns an n×n identity matrix.
    pub fn identity(n: usize) -> Self {
        Self::diagonal(n, 1)
    }

    /// Returns an n×n matrix with `value` on the diagonal.
    pub fn diagonal<T: Into<BigInt>>(n: usize, value: T) -> Self {
        let value = value.into();
        let mut m = Self::zero(n, n);
        for i in 0..n {
            m[(i, i)] = value.clone();
        }
        m
    }

    /// Creates a matrix from an iterator in row-major order.
    ///
    /// Panics if the iterator returns less than `r * c` items.
    pub fn from_iter<I: Iterator<Item = BigInt>>(r: usize, c: usize, iter: I) -> Self {
        let entries: Vec<_> = iter.take(r * c).collect();
        assert_eq!(
            entries.len(),
            r * c,
            "The iterator needs to return at least r * c items."
        );
        Self { entries, rows: r, cols: c, denominator: BigInt::one() }
    }

    /// Creates a matrix from an array of rows.
    pub fn from_array<U: Into<BigInt>, const RS: usize, const CS: usize>(
        a: [[U; CS]; RS],
    ) -> Self {
        Self::from_iter(RS, CS, a.into_iter().flatten().map(Into::into))
    }

    /// Creates a matrix from a slice of rows.
    ///
    /// The rows don't need to have the same length, shorter rows are padded
    /// with zeros to the length of the longest one.
    pub fn from_rows<U, V>(rows: &[U]) -> Self
    where
        U: AsRef<[V]>,
        V: Into<BigInt> + Clone,
    {
        let r = rows.len();
        let c = rows.iter().map(|r| r.as_ref().len()).max().unwrap_or(0);
        let mut m = Self::zero(r, c);
        for (i, row) in rows.iter().enumerate() {
            for (j, e) in row.as_ref().iter().enumerate() {
                m[(i, j)] = e.clone().into();
            }
        }
        m
    }

    /// Stacks 3x3 blocks with their own denominators on top of each other.
    ///
    /// The result uses the product of all denominators and is cleaned up
    /// afterwards.
    pub fn from_stacked_blocks(blocks: &[(Int3x3, i64)]) -> Result<Self> {
        let mut multiplier = BigInt::one();
        for (_, d) in blocks {
            if *d <= 0 {
                return Err(MatrixError::InvalidDenominator((*d).into()));
            }
            multiplier *= *d;
        }

        let mut m = Self::zero(3 * blocks.len(), 3);
        for (i, (block, d)) in blocks.iter().enumerate() {
            let scale = &multiplier / *d;
            for (r, c) in iproduct!(0..3, 0..3) {
                m[(r + 3 * i, c)] = &scale * block[(r, c)];
            }
        }
        m.denominator = multiplier;
        m.clean_up();
        Ok(m)
    }

    /// Creates a random matrix with entries in `[-bound, bound]`.
    pub fn random<Rand: Rng>(r: usize, c: usize, bound: i64, rng: &mut Rand) -> Self {
        let bound = bound.abs();
        Self::from_iter(
            r,
            c,
            std::iter::repeat_with(|| BigInt::from(rng.random_range(-bound..=bound))),
        )
    }

    /// Creates a random matrix that starts out with ones on the diagonal and
    /// is then scrambled by random row operations.
    ///
    /// For square matrices the result is unimodular.
    pub fn random_invertible<Rand: Rng>(r: usize, c: usize, rng: &mut Rand) -> Self {
        let mut m = Self::zero(r, c);
        for i in 0..m.min_dim() {
            m[(i, i)] = BigInt::one();
        }

        if r < 2 {
            return m;
        }

        for _ in 0..100 {
            let r1 = rng.random_range(0..r);
            let r2 = rng.random_range(0..r);
            if r1 != r2 {
                let v = BigInt::from(rng.random_range(-2i64..=2));
                m.row_multiply_add(r1, r2, &v);
            }
        }
        m
    }

    /// Sets the denominator. It has to be positive.
    pub fn with_denominator<T: Into<BigInt>>(mut self, denominator: T) -> Result<Self> {
        self.set_denominator(denominator)?;
        Ok(self)
    }

    /// Sets the denominator. It has to be positive.
    pub fn set_denominator<T: Into<BigInt>>(&mut self, denominator: T) -> Result<()> {
        let denominator = denominator.into();
        if !denominator.is_positive() {
            return Err(MatrixError::InvalidDenominator(denominator));
        }
        self.denominator = denominator;
        Ok(())
    }

    /// The shared denominator.
    pub fn denominator(&self) -> &BigInt {
        &self.denominator
    }

    /// The number of rows of the matrix.
    pub fn num_rows(&self) -> usize {
        self.rows
    }

    /// The number of columns of the matrix.
    pub fn num_cols(&self) -> usize {
        self.cols
    }

    /// Returns the smaller of the two dimensions.
    pub fn min_dim(&self) -> usize {
        std::cmp::min(self.rows, self.cols)
    }

    /// Is the matrix empty, i.e. has it zero rows or columns?
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Is the matrix square?
    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Returns the number of entries.
    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    /// Returns a slice containing all entries in row-major order.
    pub fn as_slice(&self) -> &[BigInt] {
        &self.entries
    }

    /// Returns a mutable slice containing all entries in row-major order.
    pub fn as_slice_mut(&mut self) -> &mut [BigInt] {
        &mut self.entries
    }

    /// Returns a reference to the entry at row `r` and column `c`.
    pub fn entry(&self, r: usize, c: usize) -> &BigInt {
        debug_assert!(r < self.rows && c < self.cols);
        &self.entries[r * self.cols + c]
    }

    /// Returns a mutable reference to the entry at row `r` and column `c`.
    pub fn entry_mut(&mut self, r: usize, c: usize) -> &mut BigInt {
        debug_assert!(r < self.rows && c < self.cols);
        &mut self.entries[r * self.cols + c]
    }

    /// The entry at row `r` and column `c` divided by the denominator.
    pub fn fraction(&self, r: usize, c: usize) -> BigRational {
        BigRational::new(self.entry(r, c).clone(), self.denominator.clone())
    }

    /// Returns the row `r`.
    pub fn row(&self, r: usize) -> &[BigInt] {
        &self.entries[r * self.cols..(r + 1) * self.cols]
    }

    /// Returns the row `r`.
    pub fn row_mut(&mut self, r: usize) -> &mut [BigInt] {
        &mut self.entries[r * self.cols..(r + 1) * self.cols]
    }

    /// Returns an iterator over the entries of column `c`.
    pub fn col(&self, c: usize) -> impl Iterator<Item = &BigInt> {
        assert!(c < self.cols);
        self.entries.iter().skip(c).step_by(self.cols)
    }

    /// Returns an iterator over the rows.
    pub fn rows(&self) -> impl Iterator<Item = &[BigInt]> {
        (0..self.rows).map(move |r| self.row(r))
    }

    /// Returns mutable references to two different rows.
    fn rows_pair_mut(&mut self, i: usize, j: usize) -> (&mut [BigInt], &mut [BigInt]) {
        assert_ne!(i, j, "Tried to mutably borrow the same row twice.");
        let c = self.cols;
        if i < j {
            let (top, bottom) = self.entries.split_at_mut(j * c);
            (&mut top[i * c..(i + 1) * c], &mut bottom[..c])
        } else {
            let (top, bottom) = self.entries.split_at_mut(i * c);
            let (rj, ri) = (&mut top[j * c..(j + 1) * c], &mut bottom[..c]);
            (ri, rj)
        }
    }

    /// Copies the `rows`×`cols` block starting at (`start_row`, `start_col`).
    /// The copy keeps the denominator.
    pub fn submatrix(
        &self,
        start_row: usize,
        start_col: usize,
        rows: usize,
        cols: usize,
    ) -> Self {
        assert!(start_row + rows <= self.rows && start_col + cols <= self.cols);
        let mut m = Self::from_iter(
            rows,
            cols,
            iproduct!(0..rows, 0..cols)
                .map(|(r, c)| self[(start_row + r, start_col + c)].clone()),
        );
        m.denominator = self.denominator.clone();
        m
    }

    /// Overwrites the block starting at (`start_row`, `start_col`) with the
    /// entries of `m`. The denominator of `m` is ignored.
    pub fn assign_submatrix(&mut self, start_row: usize, start_col: usize, m: &Self) {
        assert!(
            start_row + m.rows <= self.rows && start_col + m.cols <= self.cols,
            "A {}×{} block does not fit at ({start_row}, {start_col}) of a {}×{} matrix.",
            m.rows,
            m.cols,
            self.rows,
            self.cols,
        );
        for (r, c) in iproduct!(0..m.rows, 0..m.cols) {
            self[(start_row + r, start_col + c)] = m[(r, c)].clone();
        }
    }

    /// Creates the transpose of the matrix.
    pub fn transposed(&self) -> Self {
        let mut m = Self::from_iter(
            self.cols,
            self.rows,
            iproduct!(0..self.cols, 0..self.rows).map(|(c, r)| self[(r, c)].clone()),
        );
        m.denominator = self.denominator.clone();
        m
    }

    /// Swap two rows.
    pub fn swap_rows(&mut self, i: usize, j: usize) {
        if i == j {
            return;
        }
        let (ri, rj) = self.rows_pair_mut(i, j);
        ri.swap_with_slice(rj);
    }

    /// Swap two columns.
    pub fn swap_columns(&mut self, i: usize, j: usize) {
        if i == j {
            return;
        }
        for k in 0..self.rows {
            self.entries.swap(k * self.cols + i, k * self.cols + j);
        }
    }

    /// Negates all elements of a row.
    pub fn negate_row(&mut self, row: usize) {
        for e in self.row_mut(row) {
            *e = -std::mem::take(e);
        }
    }

    /// Negates all elements of a column.
    pub fn negate_col(&mut self, col: usize) {
        for k in 0..self.rows {
            let e = &mut self.entries[k * self.cols + col];
            *e = -std::mem::take(e);
        }
    }

    /// Add a scaled row to another row. N += M * c.
    /// `m` and `n` can not be equal.
    pub fn row_multiply_add(&mut self, n: usize, m: usize, c: &BigInt) {
        if c.is_zero() {
            return;
        }
        let (rn, rm) = self.rows_pair_mut(n, m);
        for (e, f) in rn.iter_mut().zip(rm.iter()) {
            *e += f * c;
        }
    }

    /// Add a scaled column to another column. N += M * c.
    /// `m` and `n` can not be equal.
    pub fn col_multiply_add(&mut self, n: usize, m: usize, c: &BigInt) {
        assert_ne!(m, n);
        if c.is_zero() {
            return;
        }
        for k in 0..self.rows {
            let add = &self.entries[k * self.cols + m] * c;
            self.entries[k * self.cols + n] += add;
        }
    }

    /// Replaces rows `i` and `j` by `t[0][0] * i + t[0][1] * j` and
    /// `t[1][0] * i + t[1][1] * j`.
    ///
    /// This is left multiplication by a matrix that is the identity except for
    /// the 2x2 block `t` at rows/columns `i` and `j`.
    pub fn row_transform_2x2(&mut self, i: usize, j: usize, t: &[[BigInt; 2]; 2]) {
        let (ri, rj) = self.rows_pair_mut(i, j);
        for (x, y) in ri.iter_mut().zip(rj.iter_mut()) {
            let nx = &t[0][0] * &*x + &t[0][1] * &*y;
            let ny = &t[1][0] * &*x + &t[1][1] * &*y;
            *x = nx;
            *y = ny;
        }
    }

    /// Replaces columns `i` and `j` by `t[0][0] * i + t[0][1] * j` and
    /// `t[1][0] * i + t[1][1] * j`.
    ///
    /// This is right multiplication by the transpose of `t` embedded at
    /// rows/columns `i` and `j`, so the determinant of the operation is the
    /// determinant of `t`.
    pub fn col_transform_2x2(&mut self, i: usize, j: usize, t: &[[BigInt; 2]; 2]) {
        assert_ne!(i, j);
        for k in 0..self.rows {
            let x = &self.entries[k * self.cols + i];
            let y = &self.entries[k * self.cols + j];
            let nx = &t[0][0] * x + &t[0][1] * y;
            let ny = &t[1][0] * x + &t[1][1] * y;
            self.entries[k * self.cols + i] = nx;
            self.entries[k * self.cols + j] = ny;
        }
    }

    /// Multiply two matrices. The denominators are multiplied as well.
    pub fn mul(&self, rhs: &Self) -> Self {
        assert_eq!(
            self.cols, rhs.rows,
            "Can't multiply a {}×{} matrix by a {}×{} matrix.",
            self.rows, self.cols, rhs.rows, rhs.cols,
        );
        let iter = iproduct!(0..self.rows, 0..rhs.cols).map(|(r, c)| {
            self.row(r)
                .iter()
                .zip(rhs.col(c))
                .fold(BigInt::zero(), |acc, (a, b)| acc + a * b)
        });
        let mut m = Self::from_iter(self.rows, rhs.cols, iter);
        m.denominator = &self.denominator * &rhs.denominator;
        m
    }

    /// Multiply the matrix with a column vector of integers.
    /// The denominator is not applied to the result.
    pub fn mul_vec(&self, v: &[BigInt]) -> Vec<BigInt> {
        assert_eq!(self.cols, v.len());
        self.rows()
            .map(|r| r.iter().zip(v).fold(BigInt::zero(), |acc, (a, b)| acc + a * b))
            .collect()
    }

    /// The inverse of the diagonal part of the matrix, scaled by the product
    /// of the non-zero diagonal entries. Off-diagonal entries are copied and
    /// zeros on the diagonal stay zero.
    pub fn diagonal_inverted(&self) -> Self {
        let mut m = self.clone();
        for i in 0..self.min_dim() {
            if !self[(i, i)].is_zero() {
                m.denominator *= &self[(i, i)];
            }
        }
        for i in 0..self.min_dim() {
            if !self[(i, i)].is_zero() {
                m[(i, i)] = &m.denominator / &self[(i, i)];
            }
        }
        m
    }

    /// The gcd of all stored entries.
    pub fn content(&self) -> BigInt {
        content(&self.entries)
    }

    /// Divides the entries and the denominator by their common divisor.
    pub fn clean_up(&mut self) {
        if !(self.denominator > BigInt::one()) {
            return;
        }

        let g = greatest_common_divisor(&self.content(), &self.denominator);
        if g.is_one() {
            return;
        }

        self.denominator /= &g;
        for e in &mut self.entries {
            *e /= &g;
        }
    }

    /// The determinant of the stored integers, ignoring the denominator.
    ///
    /// Uses fraction-free (Bareiss) elimination so every division is exact.
    pub fn integer_determinant(&self) -> BigInt {
        assert!(self.is_square(), "Determinant of a non-square matrix.");
        let n = self.rows;
        if n == 0 {
            return BigInt::one();
        }

        let mut m = self.clone();
        let mut negate = false;
        let mut prev = BigInt::one();
        for k in 0..n - 1 {
            if m[(k, k)].is_zero() {
                let Some(pivot) = (k + 1..n).find(|&i| !m[(i, k)].is_zero()) else {
                    return BigInt::zero();
                };
                m.swap_rows(k, pivot);
                negate = !negate;
            }

            for (i, j) in iproduct!(k + 1..n, k + 1..n) {
                let e = &m[(i, j)] * &m[(k, k)] - &m[(i, k)] * &m[(k, j)];
                m[(i, j)] = e / &prev;
            }
            prev = m[(k, k)].clone();
        }

        let det = m[(n - 1, n - 1)].clone();
        if negate { -det } else { det }
    }

    /// The determinant of the matrix the entries represent.
    pub fn determinant(&self) -> BigRational {
        let scale = num_traits::pow(self.denominator.clone(), self.rows);
        BigRational::new(self.integer_determinant(), scale)
    }

    /// Is this a square integer matrix with determinant ±1?
    pub fn is_unimodular(&self) -> bool {
        self.is_square()
            && self.denominator.is_one()
            && self.integer_determinant().abs().is_one()
    }

    /// Are all entries off the main diagonal zero?
    pub fn is_diagonal(&self) -> bool {
        iproduct!(0..self.rows, 0..self.cols)
            .all(|(r, c)| r == c || self[(r, c)].is_zero())
    }

    /// The stored entries of the main diagonal.
    pub fn diagonal_entries(&self) -> Vec<BigInt> {
        (0..self.min_dim()).map(|i| self[(i, i)].clone()).collect()
    }

    /// Is every entry in the row zero?
    pub fn is_zero_row(&self, r: usize) -> bool {
        self.row(r).iter().all(Zero::is_zero)
    }
}

impl Index<usize> for IntegerMatrix {
    type Output = BigInt;

    fn index(&self, index: usize) -> &Self::Output {
        &self.entries[index]
    }
}

impl IndexMut<usize> for IntegerMatrix {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.entries[index]
    }
}

impl Index<(usize, usize)> for IntegerMatrix {
    type Output = BigInt;

    fn index(&self, (r, c): (usize, usize)) -> &Self::Output {
        self.entry(r, c)
    }
}

impl IndexMut<(usize, usize)> for IntegerMatrix {
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut Self::Output {
        self.entry_mut(r, c)
    }
}

impl Mul<&IntegerMatrix> for &IntegerMatrix {
    type Output = IntegerMatrix;

    fn mul(self, rhs: &IntegerMatrix) -> IntegerMatrix {
        IntegerMatrix::mul(self, rhs)
    }
}

/// Two matrices are equal if they represent the same rational matrix,
/// regardless of their denominators.
impl PartialEq for IntegerMatrix {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows
            && self.cols == other.cols
            && self.entries.iter().zip(&other.entries).all(|(a, b)| {
                a * &other.denominator == b * &self.denominator
            })
    }
}

impl Eq for IntegerMatrix {}

impl Debug for IntegerMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.rows()).finish()?;
        if !self.denominator.is_one() {
            write!(f, " / {}", self.denominator)?;
        }
        Ok(())
    }
}

impl Display for IntegerMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for r in 0..self.rows {
            write!(f, "[")?;
            for c in 0..self.cols {
                if c != 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", self.fraction(r, c))?;
            }
            writeln!(f, "]")?;
        }
        Ok(())
    }
}
