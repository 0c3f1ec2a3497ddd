//! Software rendering into [`buffer::RasterBuffer`]s.

/// Shared ARGB pixel buffers.
pub mod buffer;
/// Blend kernels and the image blitter.
pub mod composite;
/// Blur, drop shadow and glow for back buffers.
pub mod filter;
/// Transform-aware drawing of rectangles, lines, images and text.
pub mod rasterizer;
/// Reusable back buffers for group rendering.
pub mod surface_pool;
