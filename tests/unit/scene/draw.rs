use super::*;

use crate::foundation::core::{Argb, red_of};
use crate::render::buffer::RasterBuffer;
use crate::render::filter::Filter;
use crate::render::surface_pool::SurfacePoolOpts;

const RED: Argb = 0xffff_0000;
const BLUE: Argb = 0xff00_00ff;

fn render(tree: &mut SceneTree, w: u32, h: u32) -> RasterBuffer {
    tree.update_transforms();
    let mut buf = RasterBuffer::new(w, h);
    let mut pool = SurfacePool::new(SurfacePoolOpts::default());
    let fonts = FontRegistry::new();
    {
        let mut r = Rasterizer::new(&mut buf);
        r.set_bilinear(false);
        let mut cx = DrawContext {
            pool: &mut pool,
            fonts: &fonts,
        };
        render_node(tree, tree.root(), &mut r, &mut cx);
        assert_eq!(r.transform_depth(), 0);
        assert_eq!(r.alpha(), 0xff);
    }
    buf
}

#[test]
fn fill_leaf_paints_its_box() {
    let mut tree = SceneTree::new(10, 10);
    let root = tree.root();
    tree.add_fill(root, 2.0, 2.0, 3.0, 3.0, RED);
    let buf = render(&mut tree, 10, 10);
    assert_eq!(buf.get_pixel(2, 2), Some(RED));
    assert_eq!(buf.get_pixel(4, 4), Some(RED));
    assert_eq!(buf.get_pixel(5, 5), Some(0));
    assert_eq!(buf.get_pixel(1, 2), Some(0));
}

#[test]
fn opacity_scales_the_fill() {
    let mut tree = SceneTree::new(4, 4);
    let root = tree.root();
    let id = tree.add_fill(root, 0.0, 0.0, 4.0, 4.0, RED);
    tree.node_mut(id).set_opacity(0.5);
    let buf = render(&mut tree, 4, 4);
    let red = red_of(buf.get_pixel(1, 1).unwrap());
    assert!(red.abs_diff(126) <= 2, "red = {red}");
}

#[test]
fn hidden_and_transparent_nodes_draw_nothing() {
    let mut tree = SceneTree::new(4, 4);
    let root = tree.root();
    let a = tree.add_fill(root, 0.0, 0.0, 4.0, 4.0, RED);
    let b = tree.add_fill(root, 0.0, 0.0, 4.0, 4.0, BLUE);
    tree.node_mut(a).set_visible(false);
    tree.node_mut(b).set_opacity(0.0);
    let buf = render(&mut tree, 4, 4);
    assert!(buf.pixels().iter().all(|&p| p == 0));
}

#[test]
fn clipping_group_limits_children() {
    let mut tree = SceneTree::new(10, 10);
    let root = tree.root();
    let g = tree.create_group();
    tree.add_child(root, g);
    tree.node_mut(g).set_size(4.0, 4.0);
    tree.node_mut(g).set_clip_to_bounds(true);
    tree.add_fill(g, 2.0, 2.0, 6.0, 6.0, RED);
    let buf = render(&mut tree, 10, 10);
    assert_eq!(buf.get_pixel(3, 3), Some(RED));
    assert_eq!(buf.get_pixel(4, 4), Some(0));
    assert_eq!(buf.get_pixel(7, 2), Some(0));
}

#[test]
fn group_background_is_drawn_under_children() {
    let mut tree = SceneTree::new(6, 6);
    let root = tree.root();
    let g = tree.create_group();
    tree.add_child(root, g);
    tree.node_mut(g).set_size(6.0, 6.0);
    tree.node_mut(g).set_background(BLUE);
    tree.add_fill(g, 1.0, 1.0, 2.0, 2.0, RED);
    let buf = render(&mut tree, 6, 6);
    assert_eq!(buf.get_pixel(0, 0), Some(BLUE));
    assert_eq!(buf.get_pixel(1, 1), Some(RED));
}

#[cfg(not(feature = "straight-alpha"))]
#[test]
fn back_buffered_group_matches_direct_rendering() {
    fn build(back_buffered: bool) -> SceneTree {
        let mut tree = SceneTree::new(20, 20);
        let root = tree.root();
        tree.node_mut(root).set_background(BLUE);
        let g = tree.create_group();
        tree.add_child(root, g);
        tree.node_mut(g).set_location(3.0, 2.0);
        tree.node_mut(g).set_size(8.0, 8.0);
        tree.node_mut(g).set_back_buffered(back_buffered);
        tree.add_fill(g, 1.0, 1.0, 4.0, 4.0, RED);
        tree.add_fill(g, 6.0, 6.0, 5.0, 5.0, 0xff00_ff00);
        tree
    }
    let direct = render(&mut build(false), 20, 20);
    let mut backed_tree = build(true);
    let backed = render(&mut backed_tree, 20, 20);
    let g = backed_tree.children(backed_tree.root())[0];
    assert!(backed_tree.node(g).group().unwrap().backing().is_some());

    // The back buffer is clipped to the group box; everything else matches.
    for y in 0..20 {
        for x in 0..20 {
            let inside = (3..11).contains(&x) && (2..10).contains(&y);
            if inside || direct.get_pixel(x, y) == Some(BLUE) {
                assert_eq!(direct.get_pixel(x, y), backed.get_pixel(x, y), "({x}, {y})");
            }
        }
    }
    assert_eq!(backed.get_pixel(13, 12), Some(BLUE));
    assert_eq!(direct.get_pixel(13, 12), Some(0xff00_ff00));
}

#[test]
fn text_leaf_uses_the_default_font() {
    let mut tree = SceneTree::new(8, 8);
    let root = tree.root();
    let id = tree.create_leaf(LeafContent::Text {
        text: "I".to_owned(),
        font: None,
    });
    tree.node_mut(id).set_location(1.0, 1.0);
    tree.node_mut(id).set_size(3.0, 5.0);
    tree.add_child(root, id);
    let buf = render(&mut tree, 8, 8);
    for x in 1..4 {
        assert_eq!(buf.get_pixel(x, 1), Some(0xffff_ffff), "top bar at {x}");
    }
    assert_eq!(buf.get_pixel(1, 3), Some(0));
    assert_eq!(buf.get_pixel(2, 3), Some(0xffff_ffff));
}

#[test]
fn image_leaf_is_stretched_to_the_node_size() {
    let mut tree = SceneTree::new(6, 6);
    let root = tree.root();
    let image = RasterBuffer::new_opaque(1, 1, RED);
    let id = tree.create_leaf(LeafContent::Image(image));
    tree.node_mut(id).set_size(3.0, 3.0);
    tree.add_child(root, id);
    let buf = render(&mut tree, 6, 6);
    assert_eq!(buf.get_pixel(0, 0), Some(RED));
    assert_eq!(buf.get_pixel(2, 2), Some(RED));
    assert_eq!(buf.get_pixel(3, 0), Some(0));
    assert_eq!(buf.get_pixel(0, 3), Some(0));
}

#[test]
fn buffer_clip_maps_through_the_inverse_transform() {
    let mut buf = RasterBuffer::new(40, 40);
    let mut r = Rasterizer::new(&mut buf);
    r.set_clip(&IntRect::new(10, 10, 10, 10));
    r.transform_mut()
        .translate(fixed::to_fixed(5), fixed::to_fixed(5));
    r.transform_mut()
        .scale(fixed::to_fixed(2), fixed::to_fixed(2));
    // (10..20) maps back to (2.5..7.5), floored and padded.
    assert_eq!(buffer_clip(&r), Some(IntRect::new(1, 1, 9, 9)));

    r.transform_mut().scale(0, 0);
    assert_eq!(buffer_clip(&r), None);
}

#[test]
fn drop_shadow_paints_past_the_group_box() {
    let mut tree = SceneTree::new(30, 30);
    let root = tree.root();
    let g = tree.create_group();
    tree.add_child(root, g);
    tree.node_mut(g).set_location(10.0, 10.0);
    tree.node_mut(g).set_size(10.0, 10.0);
    tree.node_mut(g).set_filter(Some(Filter::DropShadow {
        radius: 0,
        offset_x: 3,
        offset_y: 3,
        color: 0xff00_0000,
    }));
    tree.add_fill(g, 0.0, 0.0, 10.0, 10.0, RED);
    let buf = render(&mut tree, 30, 30);

    assert_eq!(tree.node(g).group().unwrap().backing(), Some((16, 16)));
    assert_eq!(buf.get_pixel(10, 10), Some(RED));
    assert_eq!(buf.get_pixel(19, 19), Some(RED));
    assert_eq!(buf.get_pixel(22, 22), Some(0xff00_0000));
    assert_eq!(buf.get_pixel(20, 13), Some(0xff00_0000));
    assert_eq!(buf.get_pixel(23, 23), Some(0));
    assert_eq!(buf.get_pixel(11, 21), Some(0));
}

#[test]
fn blur_softens_the_group_edge() {
    let mut tree = SceneTree::new(30, 30);
    let root = tree.root();
    let g = tree.create_group();
    tree.add_child(root, g);
    tree.node_mut(g).set_location(10.0, 10.0);
    tree.node_mut(g).set_size(10.0, 10.0);
    tree.node_mut(g).set_filter(Some(Filter::Blur { radius: 2 }));
    tree.add_fill(g, 0.0, 0.0, 10.0, 10.0, BLUE);
    let buf = render(&mut tree, 30, 30);

    assert_eq!(buf.get_pixel(15, 15), Some(BLUE));
    let outside = buf.get_pixel(20, 15).unwrap();
    let edge = buf.get_pixel(19, 15).unwrap();
    assert!(outside >> 24 > 0, "{outside:#010x}");
    assert!(outside >> 24 < edge >> 24);
    assert!(edge >> 24 < 0xff);
    assert_eq!(buf.get_pixel(22, 15), Some(0));
}

#[test]
fn scaled_clip_group_stays_inside_its_buffer_box() {
    let mut tree = SceneTree::new(60, 60);
    let root = tree.root();
    let g = tree.create_group();
    tree.add_child(root, g);
    tree.node_mut(g).set_location(10.0, 10.0);
    tree.node_mut(g).set_size(10.3, 10.3);
    tree.node_mut(g).set_clip_to_bounds(true);
    tree.node_mut(g).set_scale(3.0, 3.0);
    tree.add_fill(g, 0.0, 0.0, 20.0, 20.0, RED);
    let buf = render(&mut tree, 60, 60);

    assert_eq!(tree.node(g).group().unwrap().backing(), Some((11, 11)));
    let bounds = IntRect::new(10, 10, 33, 33);
    for y in 0..60 {
        for x in 0..60 {
            if buf.get_pixel(x, y) != Some(0) {
                assert!(bounds.contains(x, y), "({x}, {y}) painted outside {bounds:?}");
            }
        }
    }
    assert_eq!(buf.get_pixel(10, 10), Some(RED));
    assert_eq!(buf.get_pixel(40, 40), Some(RED));
}
