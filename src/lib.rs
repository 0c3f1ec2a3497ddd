//! fixpaint is a fixed-point 2D software rasterizer with dirty-rectangle damage tracking.
//!
//! The pieces stack bottom-up:
//!
//! - [`foundation`]: 16.16 fixed-point math, packed ARGB colors, rectangles, errors, options
//! - [`transform`]: a fixed-point affine matrix that classifies itself for fast paths
//! - [`render`]: pixel buffers, compositing kernels and the [`Rasterizer`]
//! - [`text`]: bitmap fonts drawn through the rasterizer
//! - [`scene`]: a node tree, the [`DamageTracker`] and the [`Stage`] frame driver
//!
//! A typical frame: mutate the [`SceneTree`], call [`Stage::frame`], then present the
//! rectangles it reports (or the whole surface).
#![forbid(unsafe_code)]

pub mod foundation;
pub mod render;
pub mod scene;
pub mod text;
pub mod transform;

pub use crate::foundation::config::EngineOpts;
pub use crate::foundation::core::{Argb, IntRect, colors};
pub use crate::foundation::error::{PaintError, PaintResult};
pub use crate::foundation::fixed::Fixed;
pub use crate::render::buffer::RasterBuffer;
pub use crate::render::composite::CompositeOp;
pub use crate::render::filter::Filter;
pub use crate::render::rasterizer::Rasterizer;
pub use crate::render::surface_pool::{SurfacePool, SurfacePoolOpts};
pub use crate::scene::damage::{DamageTracker, DirtyRectSet};
pub use crate::scene::desc::SceneDesc;
pub use crate::scene::node::{DirtyState, LeafContent, Node, NodeId, SceneTree};
pub use crate::scene::stage::{Presented, Stage, StageHandle};
pub use crate::text::font::{BitmapFont, FontRegistry, GlyphSource};
pub use crate::transform::affine::AffineTransform;
