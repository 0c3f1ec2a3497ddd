//! Scene graph, damage tracking and the frame driver.

/// Node arena: geometry, dirty flags, transforms and hit testing.
pub mod node;
/// Non-overlapping dirty-rectangle accumulation.
pub mod damage;
/// Rendering a subtree through a rasterizer.
pub mod draw;
/// Frame driver tying the tree, the damage pass and the surface together.
pub mod stage;
/// JSON scene files.
pub mod desc;
