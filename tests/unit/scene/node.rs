use super::*;

fn fill(tree: &mut SceneTree, x: f64, y: f64, w: f64, h: f64) -> NodeId {
    let root = tree.root();
    tree.add_fill(root, x, y, w, h, 0xffff_0000)
}

#[test]
fn new_tree_has_a_clean_root_covering_the_surface() {
    let tree = SceneTree::new(40, 30);
    let root = tree.node(tree.root());
    assert!(root.is_group());
    assert_eq!((root.width(), root.height()), (40.0, 30.0));
    assert_eq!(root.dirty_state(), DirtyState::Clean);
    assert!(root.parent().is_none());
}

#[test]
fn setters_mark_the_matching_dirty_state() {
    let mut tree = SceneTree::new(10, 10);
    let id = fill(&mut tree, 0.0, 0.0, 2.0, 2.0);
    tree.node_mut(id).clear_dirty();

    tree.node_mut(id).set_location(1.0, 1.0);
    assert_eq!(tree.node(id).dirty_state(), DirtyState::TransformDirty);

    tree.node_mut(id).set_opacity(0.5);
    assert_eq!(tree.node(id).dirty_state(), DirtyState::ContentDirty);

    tree.node_mut(id).clear_dirty();
    tree.node_mut(id).set_location(1.0, 1.0);
    assert_eq!(tree.node(id).dirty_state(), DirtyState::Clean);
}

#[test]
fn opacity_is_clamped() {
    let mut tree = SceneTree::new(10, 10);
    let id = fill(&mut tree, 0.0, 0.0, 1.0, 1.0);
    tree.node_mut(id).set_opacity(3.0);
    assert_eq!(tree.node(id).opacity(), 1.0);
    tree.node_mut(id).set_opacity(-1.0);
    assert_eq!(tree.node(id).opacity(), 0.0);
}

#[test]
fn world_transform_composes_parent_and_anchor() {
    let mut tree = SceneTree::new(100, 100);
    let root = tree.root();
    let group = tree.create_group();
    tree.node_mut(group).set_location(10.0, 20.0);
    tree.add_child(root, group);
    let leaf = tree.add_fill(group, 5.0, 5.0, 10.0, 4.0, 0xff00_00ff);
    tree.node_mut(leaf).set_anchor(0.5, 0.5);
    tree.update_transforms();

    let t = tree.node(leaf).world_transform();
    assert!(t.is_translate_only());
    assert_eq!(t.translate_x(), fixed::to_fixed(10));
    assert_eq!(t.translate_y(), fixed::to_fixed(23));
}

#[test]
fn children_snapshot_is_replaced_on_edit() {
    let mut tree = SceneTree::new(10, 10);
    let a = fill(&mut tree, 0.0, 0.0, 1.0, 1.0);
    let before = tree.children(tree.root());
    let b = fill(&mut tree, 1.0, 0.0, 1.0, 1.0);
    let after = tree.children(tree.root());
    assert_eq!(&before[..], &[a]);
    assert_eq!(&after[..], &[a, b]);
}

#[test]
fn insert_move_and_remove_children() {
    let mut tree = SceneTree::new(10, 10);
    let root = tree.root();
    let a = fill(&mut tree, 0.0, 0.0, 1.0, 1.0);
    let b = fill(&mut tree, 0.0, 0.0, 1.0, 1.0);
    let c = tree.create_leaf(LeafContent::Fill);
    assert!(tree.insert_child(root, 0, c));
    assert_eq!(&tree.children(root)[..], &[c, a, b]);

    assert!(tree.move_to_top(c));
    assert_eq!(&tree.children(root)[..], &[a, b, c]);
    assert!(tree.move_to_bottom(b));
    assert_eq!(&tree.children(root)[..], &[b, a, c]);

    assert!(tree.remove_child(a));
    assert_eq!(&tree.children(root)[..], &[b, c]);
    assert!(tree.node(a).parent().is_none());
    assert!(!tree.remove_child(a));
}

#[test]
fn adding_a_child_moves_it_between_groups() {
    let mut tree = SceneTree::new(10, 10);
    let root = tree.root();
    let g1 = tree.create_group();
    let g2 = tree.create_group();
    tree.add_child(root, g1);
    tree.add_child(root, g2);
    let leaf = tree.add_fill(g1, 0.0, 0.0, 1.0, 1.0, 0xffff_ffff);

    assert!(tree.add_child(g2, leaf));
    assert!(tree.children(g1).is_empty());
    assert_eq!(tree.node(leaf).parent(), Some(g2));
}

#[test]
fn cycles_and_leaf_parents_are_rejected() {
    let mut tree = SceneTree::new(10, 10);
    let root = tree.root();
    let outer = tree.create_group();
    let inner = tree.create_group();
    tree.add_child(root, outer);
    tree.add_child(outer, inner);
    assert!(!tree.add_child(inner, outer));
    assert!(!tree.add_child(inner, root));

    let leaf = tree.add_fill(root, 0.0, 0.0, 1.0, 1.0, 0xffff_ffff);
    let other = tree.create_leaf(LeafContent::Fill);
    assert!(!tree.add_child(leaf, other));
}

#[test]
fn rotated_bounds_are_padded() {
    let mut tree = SceneTree::new(100, 100);
    let id = fill(&mut tree, 50.0, 50.0, 10.0, 10.0);
    tree.update_transforms();
    assert!(tree.node_mut(id).update_dirty_rect(true, 1));
    assert_eq!(tree.node(id).dirty_rect(), Some(IntRect::new(50, 50, 10, 10)));

    tree.node_mut(id).set_angle(std::f64::consts::FRAC_PI_4);
    tree.update_transforms();
    tree.node_mut(id).update_dirty_rect(true, 1);
    let r = tree.node(id).dirty_rect().unwrap();
    // The antialiased fringe reaches one unit before the top-left edges, then the pad.
    assert_eq!((r.x, r.right()), (41, 59), "{r:?}");
    assert_eq!((r.y, r.bottom()), (47, 66), "{r:?}");
}

#[test]
fn flipped_bounds_cover_the_antialiased_fringe() {
    let mut tree = SceneTree::new(100, 100);
    let id = fill(&mut tree, 50.0, 50.0, 10.0, 10.0);
    tree.node_mut(id).set_scale(-1.0, 1.0);
    tree.update_transforms();
    tree.node_mut(id).update_dirty_rect(true, 1);
    let r = tree.node(id).dirty_rect().unwrap();
    assert!(r.contains_rect(&IntRect::new(40, 50, 11, 10)), "{r:?}");
}

#[test]
fn backed_group_bounds_cover_the_whole_buffer() {
    let mut tree = SceneTree::new(100, 100);
    let root = tree.root();
    let g = tree.create_group();
    tree.add_child(root, g);
    tree.node_mut(g).set_location(10.0, 10.0);
    tree.node_mut(g).set_size(10.3, 10.3);
    tree.node_mut(g).set_clip_to_bounds(true);
    tree.node_mut(g).set_scale(3.0, 3.0);
    tree.update_transforms();
    assert_eq!(tree.node(g).group().unwrap().backing(), Some((11, 11)));
    tree.node_mut(g).update_dirty_rect(true, 1);
    assert_eq!(tree.node(g).dirty_rect(), Some(IntRect::new(10, 10, 33, 33)));

    tree.node_mut(g).set_scale(1.0, 1.0);
    tree.node_mut(g).set_filter(Some(Filter::Blur { radius: 2 }));
    tree.update_transforms();
    assert_eq!(tree.node(g).group().unwrap().backing(), Some((15, 15)));
    tree.node_mut(g).update_dirty_rect(true, 1);
    assert_eq!(tree.node(g).dirty_rect(), Some(IntRect::new(8, 8, 15, 15)));
}

#[test]
fn invisible_nodes_lose_their_rect() {
    let mut tree = SceneTree::new(20, 20);
    let id = fill(&mut tree, 1.0, 1.0, 4.0, 4.0);
    tree.update_transforms();
    tree.node_mut(id).update_dirty_rect(true, 1);
    tree.node_mut(id).set_visible(false);
    assert!(tree.node_mut(id).update_dirty_rect(true, 1));
    assert_eq!(tree.node(id).dirty_rect(), None);
    assert!(!tree.node_mut(id).update_dirty_rect(true, 1));
}

#[test]
fn clipped_group_backs_itself_only_when_transformed() {
    let mut tree = SceneTree::new(50, 50);
    let root = tree.root();
    let g = tree.create_group();
    tree.add_child(root, g);
    tree.node_mut(g).set_size(10.0, 10.0);
    tree.node_mut(g).set_clip_to_bounds(true);
    tree.update_transforms();
    assert_eq!(tree.node(g).group().unwrap().backing(), None);

    tree.node_mut(g).set_scale(2.0, 2.0);
    tree.update_transforms();
    assert_eq!(tree.node(g).group().unwrap().backing(), Some((10, 10)));

    tree.node_mut(g).set_scale(1.0, 1.0);
    tree.node_mut(g).set_filter(Some(Filter::Glow { radius: 1 }));
    tree.update_transforms();
    assert_eq!(tree.node(g).group().unwrap().backing(), Some((12, 12)));
}

#[test]
fn removing_a_filter_is_reported_once() {
    let mut tree = SceneTree::new(50, 50);
    let root = tree.root();
    let g = tree.create_group();
    tree.add_child(root, g);
    tree.node_mut(g).set_filter(Some(Filter::DROP_SHADOW));
    assert!(!tree.node_mut(g).take_filter_removed());

    tree.node_mut(g).clear_dirty();
    tree.node_mut(g).set_filter(None);
    assert!(tree.node(g).contents_dirty());
    assert!(tree.node_mut(g).take_filter_removed());
    assert!(!tree.node_mut(g).take_filter_removed());
}

#[test]
fn children_of_a_filtered_group_draw_inside_the_margin() {
    let mut tree = SceneTree::new(50, 50);
    let root = tree.root();
    let g = tree.create_group();
    tree.add_child(root, g);
    tree.node_mut(g).set_size(10.0, 10.0);
    tree.node_mut(g).set_filter(Some(Filter::Blur { radius: 3 }));
    let leaf = tree.add_fill(g, 1.0, 2.0, 2.0, 2.0, 0xffff_ffff);
    tree.update_transforms();

    let draw = tree.node(leaf).draw_transform();
    assert_eq!(draw.translate_x(), fixed::to_fixed(4));
    assert_eq!(draw.translate_y(), fixed::to_fixed(5));
}

#[test]
fn children_of_a_backed_group_draw_in_buffer_space() {
    let mut tree = SceneTree::new(50, 50);
    let root = tree.root();
    let g = tree.create_group();
    tree.add_child(root, g);
    tree.node_mut(g).set_location(20.0, 20.0);
    tree.node_mut(g).set_size(10.0, 10.0);
    tree.node_mut(g).set_back_buffered(true);
    let leaf = tree.add_fill(g, 3.0, 4.0, 2.0, 2.0, 0xffff_ffff);
    tree.update_transforms();

    let draw = tree.node(leaf).draw_transform();
    assert_eq!(draw.translate_x(), fixed::to_fixed(3));
    let world = tree.node(leaf).world_transform();
    assert_eq!(world.translate_x(), fixed::to_fixed(23));
}

#[test]
fn pick_finds_the_topmost_node() {
    let mut tree = SceneTree::new(50, 50);
    let bottom = fill(&mut tree, 0.0, 0.0, 20.0, 20.0);
    let top = fill(&mut tree, 10.0, 10.0, 20.0, 20.0);
    tree.update_transforms();
    assert_eq!(tree.pick(15.0, 15.0), Some(top));
    assert_eq!(tree.pick(5.0, 5.0), Some(bottom));
    assert_eq!(tree.pick(45.0, 45.0), None);

    tree.node_mut(top).set_visible(false);
    assert_eq!(tree.pick(15.0, 15.0), Some(bottom));
}

#[test]
fn pick_respects_clipping_groups() {
    let mut tree = SceneTree::new(50, 50);
    let root = tree.root();
    let g = tree.create_group();
    tree.add_child(root, g);
    tree.node_mut(g).set_size(10.0, 10.0);
    let leaf = tree.add_fill(g, 5.0, 5.0, 20.0, 20.0, 0xffff_ffff);
    tree.update_transforms();
    assert_eq!(tree.pick(15.0, 15.0), Some(leaf));

    tree.node_mut(g).set_clip_to_bounds(true);
    tree.update_transforms();
    assert_eq!(tree.pick(15.0, 15.0), None);
    assert_eq!(tree.pick(6.0, 6.0), Some(leaf));
}

#[test]
fn pack_fits_the_group_to_its_children() {
    let mut tree = SceneTree::new(100, 100);
    let root = tree.root();
    let g = tree.create_group();
    tree.add_child(root, g);
    tree.node_mut(g).set_location(10.0, 10.0);
    let a = tree.add_fill(g, 5.0, 6.0, 4.0, 4.0, 0xffff_ffff);
    let b = tree.add_fill(g, 15.0, 8.0, 5.0, 10.0, 0xffff_ffff);

    tree.pack(g);
    let n = tree.node(g);
    assert_eq!((n.x(), n.y()), (15.0, 16.0));
    assert_eq!((n.width(), n.height()), (15.0, 12.0));
    assert_eq!((tree.node(a).x(), tree.node(a).y()), (0.0, 0.0));
    assert_eq!((tree.node(b).x(), tree.node(b).y()), (10.0, 2.0));
}

#[test]
fn find_looks_up_names() {
    let mut tree = SceneTree::new(10, 10);
    let id = fill(&mut tree, 0.0, 0.0, 1.0, 1.0);
    tree.node_mut(id).set_name("box");
    assert_eq!(tree.find("box"), Some(id));
    assert_eq!(tree.find("nope"), None);
}

#[test]
fn subviews_dirty_reaches_every_descendant() {
    let mut tree = SceneTree::new(10, 10);
    let root = tree.root();
    let g = tree.create_group();
    tree.add_child(root, g);
    let leaf = tree.add_fill(g, 0.0, 0.0, 1.0, 1.0, 0xffff_ffff);
    tree.node_mut(g).clear_dirty();
    tree.node_mut(leaf).clear_dirty();

    tree.set_subviews_dirty(root);
    assert!(tree.node(g).contents_dirty());
    assert!(tree.node(leaf).contents_dirty());
}
