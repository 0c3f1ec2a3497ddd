//! Fixed-point affine transforms.

/// 2x3 fixed-point matrix with exact kind classification.
pub mod affine;
