use std::sync::Arc;

use crate::foundation::core::{Argb, IntRect};
use crate::foundation::fixed::{self, Fixed};
use crate::render::buffer::RasterBuffer;
use crate::render::composite::CompositeOp;
use crate::render::filter::Filter;
use crate::transform::affine::AffineTransform;

/// Index of a node in a [`SceneTree`]. Ids are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Dirty state reported for a node between two damage passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirtyState {
    Clean,
    /// Pixels changed: size, opacity, visibility, color or content.
    ContentDirty,
    /// Only the placement changed.
    TransformDirty,
}

/// What a leaf draws on top of its background.
#[derive(Debug)]
pub enum LeafContent {
    /// Background color only.
    Fill,
    /// An image stretched to the node size.
    Image(RasterBuffer),
    /// A single line of text; `font` names a registered font, `None` uses the default.
    Text { text: String, font: Option<String> },
}

#[derive(Debug)]
pub struct GroupState {
    children: Arc<[NodeId]>,
    previous_children: Arc<[NodeId]>,
    clip_to_bounds: bool,
    back_buffered: bool,
    filter: Option<Filter>,
    filter_removed: bool,
    backing: Option<(u32, u32)>,
    back_composite: CompositeOp,
}

impl GroupState {
    fn new() -> Self {
        Self {
            children: Arc::from(Vec::new()),
            previous_children: Arc::from(Vec::new()),
            clip_to_bounds: false,
            back_buffered: false,
            filter: None,
            filter_removed: false,
            backing: None,
            back_composite: CompositeOp::SrcOver,
        }
    }

    /// Current child list, bottom to top.
    pub fn children(&self) -> &Arc<[NodeId]> {
        &self.children
    }

    pub fn clip_to_bounds(&self) -> bool {
        self.clip_to_bounds
    }

    pub fn is_back_buffered(&self) -> bool {
        self.back_buffered
    }

    pub fn is_filtered(&self) -> bool {
        self.filter.is_some()
    }

    pub fn filter(&self) -> Option<Filter> {
        self.filter
    }

    /// Transparent border around the group's box in its back buffer, wide enough for the
    /// filter's spread.
    pub fn filter_margin(&self) -> i32 {
        self.filter.map_or(0, |f| f.extent())
    }

    /// Size of the back buffer this group renders through, when it has one.
    pub fn backing(&self) -> Option<(u32, u32)> {
        self.backing
    }

    pub fn back_composite(&self) -> CompositeOp {
        self.back_composite
    }

    /// Children seen by the previous damage pass.
    pub(crate) fn previous_children(&self) -> &Arc<[NodeId]> {
        &self.previous_children
    }

    /// Children clip their damage to this group's bounds.
    pub fn clips_children(&self) -> bool {
        self.clip_to_bounds || self.backing.is_some()
    }
}

#[derive(Debug)]
pub enum NodeKind {
    Leaf(LeafContent),
    Group(GroupState),
}

/// A positioned, sized node.
///
/// Geometry is kept in `f64` and converted to fixed point when transforms are rebuilt. The
/// node rotates and scales around its anchor, given as a fraction of its size.
#[derive(Debug)]
pub struct Node {
    parent: Option<NodeId>,
    name: Option<String>,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    anchor_x: f64,
    anchor_y: f64,
    scale_x: f64,
    scale_y: f64,
    angle: f64,
    opacity: f64,
    visible: bool,
    background: Argb,
    composite: Option<CompositeOp>,
    pixel_snapping: bool,
    contents_dirty: bool,
    transform_dirty: bool,
    world: AffineTransform,
    draw: AffineTransform,
    dirty_rect: Option<IntRect>,
    kind: NodeKind,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            parent: None,
            name: None,
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            anchor_x: 0.0,
            anchor_y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
            opacity: 1.0,
            visible: true,
            background: 0,
            composite: None,
            pixel_snapping: false,
            contents_dirty: true,
            transform_dirty: true,
            world: AffineTransform::IDENTITY,
            draw: AffineTransform::IDENTITY,
            dirty_rect: None,
            kind,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn anchor(&self) -> (f64, f64) {
        (self.anchor_x, self.anchor_y)
    }

    pub fn scale(&self) -> (f64, f64) {
        (self.scale_x, self.scale_y)
    }

    /// Rotation in radians around the anchor.
    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn background(&self) -> Argb {
        self.background
    }

    pub fn composite(&self) -> Option<CompositeOp> {
        self.composite
    }

    pub fn is_pixel_snapping(&self) -> bool {
        self.pixel_snapping
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Group(_))
    }

    pub fn group(&self) -> Option<&GroupState> {
        match &self.kind {
            NodeKind::Group(g) => Some(g),
            NodeKind::Leaf(_) => None,
        }
    }

    fn group_mut(&mut self) -> Option<&mut GroupState> {
        match &mut self.kind {
            NodeKind::Group(g) => Some(g),
            NodeKind::Leaf(_) => None,
        }
    }

    /// Transform from local space to the surface, as of the last transform update.
    pub fn world_transform(&self) -> &AffineTransform {
        &self.world
    }

    /// Transform used while drawing. Equal to the world transform unless an ancestor renders
    /// through a back buffer, in which case it maps into that buffer.
    pub fn draw_transform(&self) -> &AffineTransform {
        &self.draw
    }

    /// Surface-space bounds recorded by the last damage pass.
    pub fn dirty_rect(&self) -> Option<IntRect> {
        self.dirty_rect
    }

    pub fn is_dirty(&self) -> bool {
        self.contents_dirty || self.transform_dirty
    }

    pub fn contents_dirty(&self) -> bool {
        self.contents_dirty
    }

    pub fn dirty_state(&self) -> DirtyState {
        if self.contents_dirty {
            DirtyState::ContentDirty
        } else if self.transform_dirty {
            DirtyState::TransformDirty
        } else {
            DirtyState::Clean
        }
    }

    pub fn mark_contents_dirty(&mut self) {
        self.contents_dirty = true;
    }

    pub fn mark_transform_dirty(&mut self) {
        self.transform_dirty = true;
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.contents_dirty = false;
        self.transform_dirty = false;
    }

    pub fn set_location(&mut self, x: f64, y: f64) {
        if self.x != x || self.y != y {
            self.x = x;
            self.y = y;
            self.mark_transform_dirty();
        }
    }

    pub fn set_size(&mut self, width: f64, height: f64) {
        let (width, height) = (width.max(0.0), height.max(0.0));
        if self.width != width || self.height != height {
            self.width = width;
            self.height = height;
            self.mark_contents_dirty();
            self.mark_transform_dirty();
        }
    }

    pub fn set_anchor(&mut self, anchor_x: f64, anchor_y: f64) {
        if self.anchor_x != anchor_x || self.anchor_y != anchor_y {
            self.anchor_x = anchor_x;
            self.anchor_y = anchor_y;
            self.mark_transform_dirty();
        }
    }

    pub fn set_scale(&mut self, scale_x: f64, scale_y: f64) {
        if self.scale_x != scale_x || self.scale_y != scale_y {
            self.scale_x = scale_x;
            self.scale_y = scale_y;
            self.mark_transform_dirty();
        }
    }

    pub fn set_angle(&mut self, radians: f64) {
        if self.angle != radians {
            self.angle = radians;
            self.mark_transform_dirty();
        }
    }

    /// Clamped to `0.0..=1.0`.
    pub fn set_opacity(&mut self, opacity: f64) {
        let opacity = opacity.clamp(0.0, 1.0);
        if self.opacity != opacity {
            self.opacity = opacity;
            self.mark_contents_dirty();
        }
    }

    pub fn set_visible(&mut self, visible: bool) {
        if self.visible != visible {
            self.visible = visible;
            self.mark_contents_dirty();
        }
    }

    /// Straight-alpha ARGB fill drawn under the content. Fully transparent draws nothing.
    pub fn set_background(&mut self, argb: Argb) {
        if self.background != argb {
            self.background = argb;
            self.mark_contents_dirty();
        }
    }

    /// Compositing override for this node and its descendants.
    pub fn set_composite(&mut self, op: Option<CompositeOp>) {
        if self.composite != op {
            self.composite = op;
            self.mark_contents_dirty();
        }
    }

    pub fn set_pixel_snapping(&mut self, snapping: bool) {
        if self.pixel_snapping != snapping {
            self.pixel_snapping = snapping;
            self.mark_transform_dirty();
        }
    }

    /// Replaces the content of a leaf. Groups ignore the call and return `false`.
    pub fn set_content(&mut self, content: LeafContent) -> bool {
        match &mut self.kind {
            NodeKind::Leaf(c) => {
                *c = content;
                self.contents_dirty = true;
                true
            }
            NodeKind::Group(_) => false,
        }
    }

    pub fn set_clip_to_bounds(&mut self, clip: bool) {
        if let Some(g) = self.group_mut()
            && g.clip_to_bounds != clip
        {
            g.clip_to_bounds = clip;
            self.mark_contents_dirty();
        }
    }

    /// Requests a back buffer regardless of the transform.
    pub fn set_back_buffered(&mut self, on: bool) {
        if let Some(g) = self.group_mut()
            && g.back_buffered != on
        {
            g.back_buffered = on;
            self.mark_contents_dirty();
        }
    }

    /// A filtered group always renders through a back buffer. Removing the filter repaints
    /// the area it covered.
    pub fn set_filter(&mut self, filter: Option<Filter>) {
        if let Some(g) = self.group_mut()
            && g.filter != filter
        {
            if g.filter.is_some() && filter.is_none() {
                g.filter_removed = true;
            }
            g.filter = filter;
            self.mark_contents_dirty();
        }
    }

    /// Compositing rule used while rendering children into the back buffer.
    pub fn set_back_composite(&mut self, op: CompositeOp) {
        if let Some(g) = self.group_mut()
            && g.back_composite != op
        {
            g.back_composite = op;
            self.mark_contents_dirty();
        }
    }

    fn local_transform(&self, parent: &AffineTransform) -> AffineTransform {
        let mut t = *parent;
        t.translate(fixed::to_fixed_f64(self.x), fixed::to_fixed_f64(self.y));
        if self.angle != 0.0 {
            t.rotate(
                fixed::to_fixed_f64(self.angle.cos()),
                fixed::to_fixed_f64(self.angle.sin()),
            );
        }
        if self.scale_x != 1.0 || self.scale_y != 1.0 {
            t.scale(
                fixed::to_fixed_f64(self.scale_x),
                fixed::to_fixed_f64(self.scale_y),
            );
        }
        t.translate(
            fixed::to_fixed_f64(-self.anchor_x * self.width),
            fixed::to_fixed_f64(-self.anchor_y * self.height),
        );
        if self.pixel_snapping {
            t.round_translation();
        }
        t
    }

    /// Size in fixed point, as passed to bounds projection.
    pub fn fixed_size(&self) -> (Fixed, Fixed) {
        (
            fixed::to_fixed_f64(self.width),
            fixed::to_fixed_f64(self.height),
        )
    }

    /// Bounds relative to the parent's coordinate space.
    pub fn relative_bounds(&self) -> IntRect {
        let (w, h) = self.fixed_size();
        self.local_transform(&AffineTransform::IDENTITY)
            .get_bounds(w, h)
    }

    /// `true` when the surface point `(x, y)` falls inside this node's box.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let Some((lx, ly)) = self
            .world
            .inverse_transform_point(fixed::to_fixed_f64(x), fixed::to_fixed_f64(y))
        else {
            return false;
        };
        let (w, h) = self.fixed_size();
        lx >= 0 && ly >= 0 && lx < w && ly < h
    }

    fn needs_backing(&self) -> bool {
        match &self.kind {
            NodeKind::Group(g) => {
                g.back_buffered
                    || g.filter.is_some()
                    || (g.clip_to_bounds && !self.draw.is_translate_only())
            }
            NodeKind::Leaf(_) => false,
        }
    }

    /// `true` for groups that draw pixels of their own: a background or a filter.
    pub(crate) fn paints_self(&self) -> bool {
        self.background >> 24 != 0 || self.group().is_some_and(GroupState::is_filtered)
    }

    /// Box this node paints, as a transform to the surface and a size. A backed group paints
    /// its whole buffer, filter margin included.
    fn paint_box(&self) -> (AffineTransform, Fixed, Fixed) {
        let mut t = self.world;
        if let Some(g) = self.group()
            && let Some((bw, bh)) = g.backing
        {
            let m = fixed::to_fixed(-g.filter_margin());
            t.translate(m, m);
            return (t, to_fixed_u32(bw), to_fixed_u32(bh));
        }
        let (w, h) = self.fixed_size();
        (t, w, h)
    }

    /// Recomputes the bounds rectangle. Returns `true` when it changed.
    pub(crate) fn update_dirty_rect(&mut self, parent_visible: bool, pad: i32) -> bool {
        let group_changed = self.is_group() && self.contents_dirty;
        let old = self.dirty_rect;
        if parent_visible && (group_changed || (self.visible && self.opacity > 0.0)) {
            let (mut t, w, h) = self.paint_box();
            let bounds = if t.is_rotated() || t.scale_x() < 0 || t.scale_y() < 0 {
                // The rotated path antialiases one source unit before the leading edges.
                t.translate(-fixed::ONE, -fixed::ONE);
                t.get_bounds(w.saturating_add(fixed::ONE), h.saturating_add(fixed::ONE))
                    .inflate(pad)
            } else {
                t.get_bounds(w, h)
            };
            self.dirty_rect = (!bounds.is_empty()).then_some(bounds);
        } else {
            self.dirty_rect = None;
        }
        old != self.dirty_rect
    }

    pub(crate) fn take_filter_removed(&mut self) -> bool {
        match self.group_mut() {
            Some(g) => std::mem::take(&mut g.filter_removed),
            None => false,
        }
    }
}

fn to_fixed_u32(v: u32) -> Fixed {
    fixed::to_fixed(v.min(i32::MAX as u32) as i32)
}

/// Arena of scene nodes under a single root group.
///
/// Structural edits replace a group's child snapshot wholesale; the snapshot seen by the
/// previous damage pass is kept so removed children can still be repainted.
#[derive(Debug)]
pub struct SceneTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl SceneTree {
    /// Tree whose root group covers a `width` x `height` surface.
    pub fn new(width: u32, height: u32) -> Self {
        let mut root = Node::new(NodeKind::Group(GroupState::new()));
        root.width = f64::from(width);
        root.height = f64::from(height);
        root.clear_dirty();
        Self {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// # Panics
    /// If `id` does not belong to this tree.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// # Panics
    /// If `id` does not belong to this tree.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// First node carrying `name`, in creation order.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.name() == Some(name))
            .map(|i| NodeId(i as u32))
    }

    /// Creates a detached node. It draws nothing until added to a group.
    pub fn create(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(kind));
        id
    }

    pub fn create_group(&mut self) -> NodeId {
        self.create(NodeKind::Group(GroupState::new()))
    }

    pub fn create_leaf(&mut self, content: LeafContent) -> NodeId {
        self.create(NodeKind::Leaf(content))
    }

    /// Creates a filled rectangle and adds it on top of `parent`.
    pub fn add_fill(
        &mut self,
        parent: NodeId,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        argb: Argb,
    ) -> NodeId {
        let id = self.create_leaf(LeafContent::Fill);
        let node = self.node_mut(id);
        node.set_location(x, y);
        node.set_size(width, height);
        node.set_background(argb);
        self.add_child(parent, id);
        id
    }

    pub fn children(&self, id: NodeId) -> Arc<[NodeId]> {
        match self.node(id).group() {
            Some(g) => Arc::clone(&g.children),
            None => Arc::from(Vec::new()),
        }
    }

    /// `true` when `ancestor` is `id` or one of its parents.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            if c == ancestor {
                return true;
            }
            cur = self.node(c).parent;
        }
        false
    }

    /// Appends `child` on top of `group`'s children.
    pub fn add_child(&mut self, group: NodeId, child: NodeId) -> bool {
        let len = self.children(group).len();
        self.insert_child(group, len, child)
    }

    /// Inserts `child` at `index` (clamped). A child already attached elsewhere is moved.
    ///
    /// Returns `false` when `group` is not a group or the insert would create a cycle.
    pub fn insert_child(&mut self, group: NodeId, index: usize, child: NodeId) -> bool {
        if !self.node(group).is_group() || self.is_ancestor(child, group) {
            return false;
        }
        self.detach(child);
        let Some(g) = self.nodes[group.index()].group_mut() else {
            return false;
        };
        let mut list = g.children.to_vec();
        list.insert(index.min(list.len()), child);
        g.children = Arc::from(list);

        let node = self.node_mut(child);
        node.parent = Some(group);
        node.mark_contents_dirty();
        node.mark_transform_dirty();
        self.mark_subtree_dirty(child);
        true
    }

    /// Detaches `child` from its parent. The node keeps its id and may be re-added.
    pub fn remove_child(&mut self, child: NodeId) -> bool {
        self.detach(child)
    }

    pub fn remove_all(&mut self, group: NodeId) {
        for child in self.children(group).iter() {
            self.detach(*child);
        }
    }

    /// Moves `child` to `index` within its current parent.
    pub fn move_child(&mut self, child: NodeId, index: usize) -> bool {
        let Some(parent) = self.node(child).parent else {
            return false;
        };
        let Some(g) = self.nodes[parent.index()].group_mut() else {
            return false;
        };
        let mut list = g.children.to_vec();
        let Some(pos) = list.iter().position(|c| *c == child) else {
            return false;
        };
        list.remove(pos);
        list.insert(index.min(list.len()), child);
        g.children = Arc::from(list);
        self.node_mut(child).mark_contents_dirty();
        true
    }

    pub fn move_to_top(&mut self, child: NodeId) -> bool {
        self.move_child(child, usize::MAX)
    }

    pub fn move_to_bottom(&mut self, child: NodeId) -> bool {
        self.move_child(child, 0)
    }

    fn detach(&mut self, child: NodeId) -> bool {
        let Some(parent) = self.node(child).parent else {
            return false;
        };
        if let Some(g) = self.nodes[parent.index()].group_mut() {
            let list: Vec<NodeId> = g.children.iter().copied().filter(|c| *c != child).collect();
            g.children = Arc::from(list);
        }
        self.node_mut(child).parent = None;
        true
    }

    fn mark_subtree_dirty(&mut self, id: NodeId) {
        for child in self.children(id).iter() {
            self.node_mut(*child).mark_contents_dirty();
            self.mark_subtree_dirty(*child);
        }
    }

    /// Marks `group` and every descendant as content-dirty.
    pub fn set_subviews_dirty(&mut self, group: NodeId) {
        self.node_mut(group).mark_contents_dirty();
        self.mark_subtree_dirty(group);
    }

    /// Children of `group` seen by the previous damage pass that are no longer attached to it.
    pub(crate) fn removed_children(&self, group: NodeId) -> Vec<NodeId> {
        match self.node(group).group() {
            Some(g) => g
                .previous_children
                .iter()
                .copied()
                .filter(|c| self.node(*c).parent != Some(group))
                .collect(),
            None => Vec::new(),
        }
    }

    pub(crate) fn snapshot_children(&mut self, group: NodeId) {
        if let Some(g) = self.nodes[group.index()].group_mut() {
            g.previous_children = Arc::clone(&g.children);
        }
    }

    /// Rebuilds world and draw transforms for the whole tree, and back-buffer state for groups.
    pub fn update_transforms(&mut self) {
        let root = self.root;
        self.update_transform(root);
        self.update_subtree_transforms(root);
    }

    fn update_subtree_transforms(&mut self, group: NodeId) {
        for child in self.children(group).iter() {
            self.update_transform(*child);
            if self.node(*child).is_group() {
                self.update_subtree_transforms(*child);
            }
        }
    }

    /// Recomputes one node from its parent's current transforms.
    pub(crate) fn update_transform(&mut self, id: NodeId) {
        let (parent_world, parent_draw) = match self.node(id).parent {
            Some(p) => {
                let parent = self.node(p);
                let draw = match parent.group() {
                    Some(g) if g.backing.is_some() => {
                        let m = fixed::to_fixed(g.filter_margin());
                        AffineTransform::translation(m, m)
                    }
                    _ => parent.draw,
                };
                (parent.world, draw)
            }
            None => (AffineTransform::IDENTITY, AffineTransform::IDENTITY),
        };

        let node = self.node_mut(id);
        node.world = node.local_transform(&parent_world);
        node.draw = node.local_transform(&parent_draw);

        let backing = node.needs_backing().then(|| {
            let margin = node.group().map_or(0, GroupState::filter_margin) as u32 * 2;
            (
                (node.width.ceil() as u32).saturating_add(margin),
                (node.height.ceil() as u32).saturating_add(margin),
            )
        });
        if let Some(g) = node.group_mut()
            && g.backing != backing
        {
            g.backing = backing;
            node.mark_contents_dirty();
            node.mark_transform_dirty();
        }
    }

    /// Topmost visible node under the surface point `(x, y)`, searching groups before
    /// themselves. Clipping groups reject points outside their bounds. The root is never
    /// returned. Uses the transforms of the last update.
    pub fn pick(&self, x: f64, y: f64) -> Option<NodeId> {
        self.pick_in(self.root, x, y)
    }

    fn pick_in(&self, group: NodeId, x: f64, y: f64) -> Option<NodeId> {
        let node = self.node(group);
        if node.group().is_some_and(GroupState::clips_children) && !node.contains(x, y) {
            return None;
        }
        for child in self.children(group).iter().rev() {
            let c = self.node(*child);
            if !c.visible || c.opacity <= 0.0 {
                continue;
            }
            if c.is_group()
                && let Some(hit) = self.pick_in(*child, x, y)
            {
                return Some(hit);
            }
            if c.contains(x, y) {
                return Some(*child);
            }
        }
        None
    }

    /// Shrinks `group` to the bounding box of its children, recursively, moving the group so
    /// the children keep their surface position.
    pub fn pack(&mut self, group: NodeId) {
        let children = self.children(group);
        let mut size = (0.0, 0.0);
        if !children.is_empty() {
            let mut bounds = IntRect::default();
            for child in children.iter() {
                if self.node(*child).is_group() {
                    self.pack(*child);
                }
                let r = self.node(*child).relative_bounds();
                bounds = if bounds.is_empty() {
                    r
                } else {
                    bounds.union(&r)
                };
            }
            let (dx, dy) = (f64::from(bounds.x), f64::from(bounds.y));
            if bounds.x != 0 || bounds.y != 0 {
                for child in children.iter() {
                    let c = self.node_mut(*child);
                    c.set_location(c.x - dx, c.y - dy);
                }
                let g = self.node_mut(group);
                g.set_location(g.x + dx, g.y + dy);
            }
            size = (f64::from(bounds.width), f64::from(bounds.height));
        }
        let g = self.node_mut(group);
        g.set_size(size.0, size.1);
        g.mark_contents_dirty();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/node.rs"]
mod tests;
