//! Leaf building blocks shared by every other module.

/// Engine options and environment overrides.
pub mod config;
/// Integer rectangles, packed colors and the pixel convention.
pub mod core;
/// Error taxonomy.
pub mod error;
/// 16.16 fixed-point arithmetic.
pub mod fixed;
/// Channel math and hashing helpers.
pub mod math;
