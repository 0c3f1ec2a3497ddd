use std::sync::mpsc;

use crate::foundation::config::EngineOpts;
use crate::foundation::core::{Argb, IntRect, colors};
use crate::foundation::error::{PaintError, PaintResult};
use crate::render::buffer::RasterBuffer;
use crate::render::composite::CompositeOp;
use crate::render::rasterizer::Rasterizer;
use crate::render::surface_pool::{SurfacePool, SurfacePoolOpts};
use crate::scene::damage::DamageTracker;
use crate::scene::draw::{DrawContext, render_node};
use crate::scene::node::{NodeId, SceneTree};
use crate::text::font::FontRegistry;

const OVERLAY_FILL: Argb = 0x7f00_ff00;

type Mutation = Box<dyn FnOnce(&mut SceneTree) + Send>;

/// What a render pass wrote to the surface.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Presented {
    /// The whole surface was redrawn.
    Full,
    /// Only these non-overlapping rectangles were redrawn. May be empty.
    Rects(Vec<IntRect>),
}

/// Cloneable, thread-safe handle that queues tree mutations for the next [`Stage::tick`].
#[derive(Clone, Debug)]
pub struct StageHandle {
    tx: mpsc::Sender<Mutation>,
}

impl StageHandle {
    /// Queues `f`. Fails once the stage has been dropped.
    pub fn queue(&self, f: impl FnOnce(&mut SceneTree) + Send + 'static) -> PaintResult<()> {
        self.tx
            .send(Box::new(f))
            .map_err(|_| PaintError::render("stage is gone, mutation dropped"))
    }
}

/// Frame driver: owns the surface, the scene tree and the damage tracker.
///
/// One frame is [`Stage::tick`] (apply queued mutations, compute damage) followed by
/// [`Stage::render`]. The stage itself is single-threaded; other threads talk to it through a
/// [`StageHandle`].
pub struct Stage {
    opts: EngineOpts,
    surface: RasterBuffer,
    tree: SceneTree,
    tracker: DamageTracker,
    pool: SurfacePool,
    fonts: FontRegistry,
    needs_full_redraw: bool,
    tx: mpsc::Sender<Mutation>,
    rx: mpsc::Receiver<Mutation>,
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("width", &self.surface.width())
            .field("height", &self.surface.height())
            .field("nodes", &self.tree.len())
            .field("needs_full_redraw", &self.needs_full_redraw)
            .finish_non_exhaustive()
    }
}

impl Stage {
    pub fn new(width: u32, height: u32, opts: EngineOpts) -> PaintResult<Self> {
        Self::with_fonts(width, height, opts, FontRegistry::new())
    }

    pub fn with_fonts(
        width: u32,
        height: u32,
        opts: EngineOpts,
        fonts: FontRegistry,
    ) -> PaintResult<Self> {
        opts.validate()?;
        if width == 0 || height == 0 {
            return Err(PaintError::validation(format!(
                "stage size must be non-zero, got {width}x{height}"
            )));
        }
        let surface = RasterBuffer::new(width, height);
        let bounds = IntRect::new(0, 0, surface.width(), surface.height());
        let (tx, rx) = mpsc::channel();
        Ok(Self {
            tracker: DamageTracker::new(bounds, &opts),
            pool: SurfacePool::new(SurfacePoolOpts::from_engine(&opts)),
            tree: SceneTree::new(width, height),
            surface,
            fonts,
            needs_full_redraw: true,
            tx,
            rx,
            opts,
        })
    }

    pub fn opts(&self) -> &EngineOpts {
        &self.opts
    }

    pub fn surface(&self) -> &RasterBuffer {
        &self.surface
    }

    pub fn tree(&self) -> &SceneTree {
        &self.tree
    }

    /// Direct access to the tree. Edits are picked up by the next [`Stage::tick`].
    pub fn tree_mut(&mut self) -> &mut SceneTree {
        &mut self.tree
    }

    pub fn fonts(&self) -> &FontRegistry {
        &self.fonts
    }

    pub fn fonts_mut(&mut self) -> &mut FontRegistry {
        &mut self.fonts
    }

    pub fn pool(&self) -> &SurfacePool {
        &self.pool
    }

    pub fn handle(&self) -> StageHandle {
        StageHandle {
            tx: self.tx.clone(),
        }
    }

    /// Dirty rectangles accumulated by the last tick.
    pub fn dirty_rects(&self) -> &[IntRect] {
        self.tracker.rects().as_slice()
    }

    pub fn is_overflowed(&self) -> bool {
        self.tracker.is_overflowed()
    }

    pub fn dirty_rects_enabled(&self) -> bool {
        self.opts.dirty_rects_enabled
    }

    /// Switching damage tracking forgets pending rectangles and forces a full redraw.
    pub fn set_dirty_rects_enabled(&mut self, on: bool) {
        if self.opts.dirty_rects_enabled != on {
            self.opts.dirty_rects_enabled = on;
            self.tracker.clear();
            self.needs_full_redraw = true;
        }
    }

    pub fn set_debug_overlay(&mut self, on: bool) {
        self.opts.debug_overlay = on;
    }

    /// Forces the next render to redraw the whole surface.
    pub fn redraw_all(&mut self) {
        self.needs_full_redraw = true;
    }

    /// Applies queued mutations, then runs the damage pass.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn tick(&mut self) {
        let mut applied = 0usize;
        while let Ok(f) = self.rx.try_recv() {
            f(&mut self.tree);
            applied += 1;
        }
        if applied > 0 {
            tracing::debug!(applied, "applied queued mutations");
        }

        if self.opts.dirty_rects_enabled {
            self.tracker.compute(&mut self.tree, self.needs_full_redraw);
        } else {
            self.tree.update_transforms();
        }
    }

    /// Draws the damage computed by the last tick.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn render(&mut self) -> Presented {
        let full = !self.opts.dirty_rects_enabled
            || self.needs_full_redraw
            || self.tracker.is_overflowed();
        let rects: Vec<IntRect> = self.tracker.rects().as_slice().to_vec();
        let bounds = self.tracker.draw_bounds();
        let root = self.tree.root();

        if full || self.opts.debug_overlay {
            clear_region(&mut self.surface, &bounds);
        } else {
            for rect in &rects {
                clear_region(&mut self.surface, rect);
            }
        }

        let mut r = Rasterizer::new(&mut self.surface);
        r.set_bilinear(self.opts.bilinear);
        r.set_fractional_metrics(self.opts.fractional_metrics);
        let mut cx = DrawContext {
            pool: &mut self.pool,
            fonts: &self.fonts,
        };

        let presented = if full || self.opts.debug_overlay {
            redraw(&mut r, &self.tree, root, &bounds, &mut cx);
            if !full {
                draw_overlay(&mut r, &rects);
            }
            Presented::Full
        } else {
            for rect in &rects {
                redraw(&mut r, &self.tree, root, rect, &mut cx);
            }
            Presented::Rects(rects)
        };

        if full {
            self.needs_full_redraw = false;
        }
        self.tracker.clear();
        presented
    }

    /// One complete frame.
    pub fn frame(&mut self) -> Presented {
        self.tick();
        self.render()
    }

    /// Topmost node under the surface point `(x, y)`.
    pub fn pick(&mut self, x: f64, y: f64) -> Option<NodeId> {
        self.tree.update_transforms();
        self.tree.pick(x, y)
    }
}

/// Renders the tree clipped to `region`.
fn redraw(
    r: &mut Rasterizer<'_>,
    tree: &SceneTree,
    root: NodeId,
    region: &IntRect,
    cx: &mut DrawContext<'_>,
) {
    r.set_clip(region);
    if r.clip().is_empty() {
        return;
    }
    render_node(tree, root, r, cx);
}

/// Resets `region` to transparent so a partial redraw matches a full one.
fn clear_region(surface: &mut RasterBuffer, region: &IntRect) {
    let width = surface.width();
    let clip = region.intersection(&IntRect::new(0, 0, width, surface.height()));
    if clip.is_empty() {
        return;
    }
    let pixels = surface.pixels_mut();
    for y in clip.y..clip.bottom() {
        let start = (y * width + clip.x) as usize;
        pixels[start..start + clip.width as usize].fill(colors::TRANSPARENT);
    }
}

fn draw_overlay(r: &mut Rasterizer<'_>, rects: &[IntRect]) {
    r.reset();
    r.set_composite(CompositeOp::SrcOver);
    for rect in rects {
        r.set_clip(rect);
        r.set_color_argb(OVERLAY_FILL);
        r.fill();
        r.set_color(colors::GREEN);
        r.draw_rect(rect.x, rect.y, rect.width, rect.height);
    }
    r.remove_clip();
}

#[cfg(test)]
#[path = "../../tests/unit/scene/stage.rs"]
mod tests;
