//! Hermite and Smith normal forms of integer matrices.
//!
//! All computations use exact integer arithmetic. Matrices carry a shared
//! denominator so that rational matrices with a common scale (e.g. cell
//! matrices in fractional coordinates) can be reduced as well.

pub mod config;
pub mod error;
pub mod fixed;
pub mod hermite;
pub mod integer;
pub mod matrix;
pub mod reduce;
pub mod sieve;
pub mod smith;

pub use config::{Config, SieveConfig};
pub use error::{MatrixError, Result};
pub use fixed::{FixedMatrix, FixedSmithDecomposition, Int3x3, Int3x9, Int9x3, Int9x9};
pub use hermite::{HermiteDecomposition, hermite_normal_form, hermite_normal_form_with};
pub use matrix::IntegerMatrix;
pub use smith::{SmithDecomposition, smith_normal_form, smith_normal_form_with};
