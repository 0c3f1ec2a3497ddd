use crate::foundation::core::IntRect;
use crate::foundation::fixed;
use crate::render::rasterizer::Rasterizer;
use crate::render::surface_pool::SurfacePool;
use crate::scene::node::{LeafContent, Node, NodeId, NodeKind, SceneTree};
use crate::text::font::FontRegistry;
use crate::transform::affine::AffineTransform;

/// Shared resources for one render pass.
pub struct DrawContext<'a> {
    pub pool: &'a mut SurfacePool,
    pub fonts: &'a FontRegistry,
}

/// Renders `id` and its descendants through `r`, which must hold the caller's clip.
///
/// The node's opacity multiplies the rasterizer alpha, its compositing override replaces the
/// current rule, and its draw transform replaces the current transform. All three are
/// restored before returning.
pub fn render_node(tree: &SceneTree, id: NodeId, r: &mut Rasterizer<'_>, cx: &mut DrawContext<'_>) {
    let node = tree.node(id);
    if !node.is_visible() {
        return;
    }
    let old_alpha = r.alpha();
    let mut alpha = (node.opacity() * 255.0) as i32;
    if old_alpha != 0xff {
        alpha = (alpha * old_alpha) >> 8;
    }
    if alpha <= 0 {
        return;
    }
    let old_composite = r.composite();

    r.set_alpha(alpha);
    if let Some(op) = node.composite() {
        r.set_composite(op);
    }
    r.push_transform();
    r.set_transform(node.draw_transform());

    match node.kind() {
        NodeKind::Leaf(content) => {
            draw_background(node, r);
            draw_leaf(node, content, r, cx);
        }
        NodeKind::Group(g) => match g.backing() {
            None => {
                let old_clip = g.clip_to_bounds().then(|| {
                    let old = r.clip();
                    let (w, h) = node.fixed_size();
                    let bounds = r.transform().get_bounds(w, h);
                    r.clip_rect(&bounds);
                    old
                });
                draw_background(node, r);
                for child in g.children().iter() {
                    render_node(tree, *child, r, cx);
                }
                if let Some(old) = old_clip {
                    r.set_clip(&old);
                }
            }
            Some((bw, bh)) => render_backed_group(tree, node, (bw, bh), r, cx),
        },
    }

    r.pop_transform();
    r.set_composite(old_composite);
    r.set_alpha(old_alpha);
}

fn draw_background(node: &Node, r: &mut Rasterizer<'_>) {
    let bg = node.background();
    if bg >> 24 == 0 {
        return;
    }
    let (w, h) = node.fixed_size();
    let color = r.color();
    r.set_color_argb(bg);
    r.fill_rect_fixed(0, 0, w, h);
    r.set_color_argb(color);
}

fn draw_leaf(node: &Node, content: &LeafContent, r: &mut Rasterizer<'_>, cx: &mut DrawContext<'_>) {
    match content {
        LeafContent::Fill => {}
        LeafContent::Image(image) => {
            if image.width() == 0 || image.height() == 0 {
                return;
            }
            let (w, h) = node.fixed_size();
            let sx = fixed::div(w, fixed::to_fixed(image.width()));
            let sy = fixed::div(h, fixed::to_fixed(image.height()));
            if sx == fixed::ONE && sy == fixed::ONE {
                r.draw_image(image);
            } else {
                r.push_transform();
                r.transform_mut().scale(sx, sy);
                r.draw_image(image);
                r.pop_transform();
            }
        }
        LeafContent::Text { text, font } => {
            let old = r.font().cloned();
            r.set_font(Some(cx.fonts.resolve(font.as_deref())));
            r.draw_string(text);
            r.set_font(old);
        }
    }
}

/// Renders a group's children into a pooled buffer, filters it, then draws the buffer under
/// the group's transform. Only the part of the buffer under the current clip is painted.
fn render_backed_group(
    tree: &SceneTree,
    node: &Node,
    (bw, bh): (u32, u32),
    r: &mut Rasterizer<'_>,
    cx: &mut DrawContext<'_>,
) {
    let Some(group) = node.group() else {
        return;
    };
    let margin = group.filter_margin();
    let m = fixed::to_fixed(margin);
    r.push_transform();
    r.transform_mut().translate(-m, -m);

    match buffer_clip(r) {
        Some(clip) => {
            let mut buffer = cx.pool.borrow(bw, bh);
            {
                let mut sub = Rasterizer::new(&mut buffer);
                sub.set_bilinear(r.is_bilinear());
                sub.set_fractional_metrics(r.fractional_metrics());
                sub.set_composite(group.back_composite());
                // Filters read around each pixel, so draw that much past the visible part.
                sub.set_clip(&clip.inflate(margin));
                sub.set_transform(&AffineTransform::translation(m, m));
                let (w, h) = node.fixed_size();
                let group_box = sub.transform().get_bounds(w, h);
                sub.clip_rect(&group_box);
                draw_background(node, &mut sub);
                for child in group.children().iter() {
                    render_node(tree, *child, &mut sub, cx);
                }
            }
            if let Some(filter) = group.filter() {
                filter.apply(&mut buffer);
            }
            r.draw_image(&buffer);
            cx.pool.release(buffer);
        }
        None => tracing::trace!("group transform is not invertible, skipping back buffer"),
    }
    r.pop_transform();
}

/// Maps the rasterizer clip into the local space of its transform, padded for rounding.
fn buffer_clip(r: &Rasterizer<'_>) -> Option<IntRect> {
    let clip = r.clip();
    let t = r.transform();
    let (x1, y1) = (fixed::to_fixed(clip.x), fixed::to_fixed(clip.y));
    let (x2, y2) = (fixed::to_fixed(clip.right()), fixed::to_fixed(clip.bottom()));
    let mut min = (fixed::MAX_VALUE, fixed::MAX_VALUE);
    let mut max = (fixed::MIN_VALUE, fixed::MIN_VALUE);
    for (x, y) in [(x1, y1), (x2, y2), (x1, y2), (x2, y1)] {
        let (lx, ly) = t.inverse_transform_point(x, y)?;
        min = (min.0.min(lx), min.1.min(ly));
        max = (max.0.max(lx), max.1.max(ly));
    }
    let x = fixed::to_int_floor(min.0) - 1;
    let y = fixed::to_int_floor(min.1) - 1;
    Some(IntRect::new(
        x,
        y,
        fixed::to_int_ceil(max.0) - x + 2,
        fixed::to_int_ceil(max.1) - y + 2,
    ))
}

#[cfg(test)]
#[path = "../../tests/unit/scene/draw.rs"]
mod tests;
