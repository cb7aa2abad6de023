//! Numeric helpers for white point handling
//!
//! - 3x3 matrix operations for `chad`/`arts` matrices
//! - Chromatic adaptation (Bradford, von Kries, XYZ scaling)

pub mod chromatic_adaptation;
pub mod matrix;

pub use chromatic_adaptation::{AdaptationMethod, adapt_xyz, adaptation_matrix, adaptation_with_cone};
pub use matrix::Matrix3x3;
