//! Errors that can occur while computing normal forms.

use num_bigint::BigInt;
use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, MatrixError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MatrixError {
    /// Floor division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// The fixed-size Smith normal form found no non-zero pivot in a column.
    /// This happens when the matrix is rank deficient.
    #[error("no pivot found in column {column}, the matrix is not of full rank")]
    PivotFailure { column: usize },

    /// The factor refinement sieve gave up before finding a coefficient.
    #[error("factor refinement for modulus {modulus} exceeded the sieve bound {bound}")]
    RefinementExhausted { modulus: BigInt, bound: usize },

    /// The fixed-size Smith normal form did not become diagonal.
    #[error("matrix did not become diagonal after {rounds} echelon rounds")]
    AlternationExhausted { rounds: usize },

    /// Checked arithmetic on fixed-size matrices overflowed.
    #[error("integer overflow in fixed-size matrix arithmetic")]
    Overflow,

    /// A computed normal form failed its final check.
    #[error("invalid result: {0}")]
    InvariantViolation(&'static str),

    /// Denominators have to be positive.
    #[error("invalid denominator {0}, denominators have to be positive")]
    InvalidDenominator(BigInt),
}
