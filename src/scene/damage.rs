use crate::foundation::config::EngineOpts;
use crate::foundation::core::IntRect;
use crate::scene::node::{GroupState, NodeId, SceneTree};

/// Fixed-capacity list of rectangles with an overflow state.
///
/// Once overflowed the set stays overflowed until [`DirtyRectSet::clear`].
#[derive(Clone, Debug)]
pub struct DirtyRectSet {
    rects: Vec<IntRect>,
    capacity: usize,
    overflowed: bool,
}

impl DirtyRectSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            rects: Vec::with_capacity(capacity),
            capacity,
            overflowed: false,
        }
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn overflow(&mut self) {
        self.overflowed = true;
        self.rects.clear();
    }

    pub fn clear(&mut self) {
        self.rects.clear();
        self.overflowed = false;
    }

    pub fn as_slice(&self) -> &[IntRect] {
        &self.rects
    }

    pub fn iter(&self) -> impl Iterator<Item = &IntRect> {
        self.rects.iter()
    }

    /// Total covered area. Rectangles never overlap, so this is the dirty pixel count.
    pub fn area(&self) -> i64 {
        self.rects.iter().map(IntRect::area).sum()
    }

    /// Removes entry `i`, moving the last entry into its slot.
    pub fn swap_remove(&mut self, i: usize) -> IntRect {
        self.rects.swap_remove(i)
    }

    /// Appends `r`. A full set overflows instead and returns `false`.
    pub fn push(&mut self, r: IntRect) -> bool {
        if self.overflowed || self.rects.len() == self.capacity {
            self.overflow();
            return false;
        }
        self.rects.push(r);
        true
    }
}

/// Computes the minimal non-overlapping set of surface rectangles to redraw each frame.
#[derive(Clone, Debug)]
pub struct DamageTracker {
    draw_bounds: IntRect,
    max_non_dirty_area: i64,
    pad: i32,
    rects: DirtyRectSet,
    sub_rects: DirtyRectSet,
    /// Count of non-empty submissions, used to spot changes under a back buffer.
    submitted: u64,
    /// Back-buffered groups that lost a descendant since the previous pass.
    lost_under: Vec<NodeId>,
}

impl DamageTracker {
    pub fn new(draw_bounds: IntRect, opts: &EngineOpts) -> Self {
        Self {
            draw_bounds,
            max_non_dirty_area: opts.max_non_dirty_area,
            pad: opts.dirty_rect_pad,
            rects: DirtyRectSet::new(opts.dirty_rect_capacity),
            sub_rects: DirtyRectSet::new(opts.dirty_rect_capacity),
            submitted: 0,
            lost_under: Vec::new(),
        }
    }

    pub fn draw_bounds(&self) -> IntRect {
        self.draw_bounds
    }

    pub fn rects(&self) -> &DirtyRectSet {
        &self.rects
    }

    pub fn is_overflowed(&self) -> bool {
        self.rects.is_overflowed()
    }

    /// Forgets the accumulated rectangles. Called once the frame has been presented.
    pub fn clear(&mut self) {
        self.rects.clear();
    }

    /// Walks the tree, accumulating damage since the previous pass, and clears every node's
    /// dirty flags. `force` treats the whole tree as dirty.
    #[tracing::instrument(level = "debug", skip_all, fields(force))]
    pub fn compute(&mut self, tree: &mut SceneTree, force: bool) {
        tree.update_transforms();
        let root = tree.root();
        let was_overflowed = self.rects.is_overflowed();
        self.lost_under.clear();
        self.collect_removed(tree, root, None);
        self.walk(tree, root, None, None, force, true);
        tree.node_mut(root).clear_dirty();
        if self.rects.is_overflowed() && !was_overflowed {
            tracing::debug!(
                capacity = self.rects.capacity(),
                "dirty rectangles overflowed, falling back to a full redraw"
            );
        }
    }

    /// Repaints the last bounds of everything that left a group since the previous pass.
    /// Runs before any bounds are updated, so a node moved into a group that the walk visits
    /// first still reports where it was. Returns `true` when anything under `group` left.
    fn collect_removed(
        &mut self,
        tree: &SceneTree,
        group: NodeId,
        mut old_clip: Option<IntRect>,
    ) -> bool {
        let node = tree.node(group);
        if node.group().is_some_and(GroupState::clips_children)
            && let Some(old) = node.dirty_rect()
        {
            old_clip = Some(chain(old_clip, old));
        }
        let mut lost = false;
        for removed in tree.removed_children(group) {
            self.notify_removed(tree, old_clip, removed);
            lost = true;
        }
        for child in tree.children(group).iter() {
            if tree.node(*child).is_group() {
                lost |= self.collect_removed(tree, *child, old_clip);
            }
        }
        if lost && node.group().is_some_and(|g| g.backing().is_some()) {
            self.lost_under.push(group);
        }
        lost
    }

    fn walk(
        &mut self,
        tree: &mut SceneTree,
        group: NodeId,
        old_parent_clip: Option<IntRect>,
        parent_clip: Option<IntRect>,
        mut parent_dirty: bool,
        mut parent_visible: bool,
    ) {
        let (dirty, contents_dirty, clips, paints_self, backed) = {
            let g = tree.node(group);
            let state = g.group();
            (
                g.is_dirty(),
                g.contents_dirty(),
                state.is_some_and(GroupState::clips_children),
                g.paints_self(),
                state.is_some_and(|s| s.backing().is_some()),
            )
        };
        // A background or filter moves with the group, so placement changes repaint it too.
        let submit_self = contents_dirty || (paints_self && (dirty || parent_dirty));
        parent_dirty |= dirty;

        let old = tree.node(group).dirty_rect();
        if submit_self && let Some(old) = old {
            self.add(old_parent_clip, old);
        }
        let mut bounds_changed = tree
            .node_mut(group)
            .update_dirty_rect(parent_visible, self.pad);
        let new = tree.node(group).dirty_rect();
        if submit_self && let Some(new) = new {
            self.add(parent_clip, new);
        }

        let (mut old_clip, mut clip) = (old_parent_clip, parent_clip);
        if clips {
            if let Some(old) = old {
                old_clip = Some(chain(old_clip, old));
            }
            if let Some(new) = new {
                clip = Some(chain(clip, new));
            }
        }
        if !bounds_changed {
            bounds_changed = old_clip != clip;
        }

        if tree.node_mut(group).take_filter_removed()
            && let Some(c) = old_clip
        {
            self.add(None, c);
        }
        let lost_descendants = self.lost_under.contains(&group);

        parent_dirty |= bounds_changed;
        {
            let g = tree.node(group);
            parent_visible &= g.is_visible() && g.opacity() > 0.0;
        }

        let submitted = self.submitted;
        let children = tree.children(group);
        for &child in children.iter() {
            if tree.node(child).is_group() {
                self.walk(tree, child, old_clip, clip, parent_dirty, parent_visible);
            } else if parent_dirty || tree.node(child).is_dirty() {
                if self.rects.is_overflowed() {
                    tree.node_mut(child)
                        .update_dirty_rect(parent_visible, self.pad);
                } else {
                    if let Some(old) = tree.node(child).dirty_rect() {
                        self.add(old_clip, old);
                    }
                    let changed = tree
                        .node_mut(child)
                        .update_dirty_rect(parent_visible, self.pad);
                    if (bounds_changed || changed)
                        && let Some(new) = tree.node(child).dirty_rect()
                    {
                        self.add(clip, new);
                    }
                }
            }
            tree.node_mut(child).clear_dirty();
        }

        // A back buffer is resampled and filtered as a whole, so any change inside it
        // repaints the whole buffer.
        if backed && (lost_descendants || self.submitted != submitted) {
            if let Some(old) = old {
                self.add(old_parent_clip, old);
            }
            if let Some(new) = new {
                self.add(parent_clip, new);
            }
        }
        tree.snapshot_children(group);
    }

    fn notify_removed(&mut self, tree: &SceneTree, clip: Option<IntRect>, id: NodeId) {
        if self.rects.is_overflowed() {
            return;
        }
        let node = tree.node(id);
        match node.group() {
            Some(g) => {
                if (node.paints_self() || g.backing().is_some())
                    && let Some(r) = node.dirty_rect()
                {
                    self.add(clip, r);
                }
                for child in g.previous_children().iter() {
                    self.notify_removed(tree, clip, *child);
                }
            }
            None => {
                if let Some(r) = node.dirty_rect() {
                    self.add(clip, r);
                }
            }
        }
    }

    /// Adds `r`, clipped to `parent_clip` and the draw bounds, keeping the set free of overlap.
    pub fn add(&mut self, parent_clip: Option<IntRect>, r: IntRect) {
        if r.is_empty() {
            return;
        }
        self.submitted = self.submitted.wrapping_add(1);
        self.sub_rects.clear();
        self.add_rect(parent_clip, r, self.max_non_dirty_area);

        // Pieces split off existing rectangles re-enter without a clip; second-generation
        // pieces may not merge with non-dirty area.
        let first_generation = self.sub_rects.len();
        let mut i = 0;
        while i < self.sub_rects.len() && !self.rects.is_overflowed() {
            let piece = self.sub_rects.as_slice()[i];
            let threshold = if i < first_generation {
                self.max_non_dirty_area
            } else {
                0
            };
            self.add_rect(None, piece, threshold);
            if self.sub_rects.is_overflowed() {
                self.rects.overflow();
            }
            i += 1;
        }
    }

    fn add_rect(&mut self, parent_clip: Option<IntRect>, r: IntRect, max_non_dirty_area: i64) {
        if r.is_empty() || self.rects.is_overflowed() {
            return;
        }
        let mut r = r.intersection(&self.draw_bounds);
        if let Some(clip) = parent_clip {
            r = r.intersection(&clip);
        }
        if r.is_empty() {
            return;
        }

        let mut i = 0;
        while i < self.rects.len() {
            let dirty = self.rects.as_slice()[i];
            let union = dirty.union(&r);
            if union == dirty {
                return;
            }
            let inter = dirty.intersection(&r);
            let non_dirty = union.area() + inter.area() - dirty.area() - r.area();
            if non_dirty < max_non_dirty_area {
                r = union;
                self.rects.swap_remove(i);
                if non_dirty > 0 {
                    // The union may now overlap rectangles already checked.
                    i = 0;
                }
                continue;
            }
            if dirty.intersects(&r) {
                let code = dirty.intersection_code(&r);
                match code.count_ones() {
                    0 => {
                        self.rects.swap_remove(i);
                        continue;
                    }
                    1 => {
                        let mut shrunk = dirty;
                        shrunk.set_outside_boundary(IntRect::opposite_side(code), r.boundary(code));
                        self.sub_rects.push(shrunk);
                        self.rects.swap_remove(i);
                        continue;
                    }
                    2 => {
                        let side1 = 1u8 << (7 - code.leading_zeros());
                        let side2 = code - side1;
                        let mut first = dirty;
                        first.set_outside_boundary(IntRect::opposite_side(side1), r.boundary(side1));
                        self.sub_rects.push(first);

                        let mut second = dirty;
                        second.set_outside_boundary(side1, first.boundary(IntRect::opposite_side(side1)));
                        second.set_outside_boundary(IntRect::opposite_side(side2), r.boundary(side2));
                        self.sub_rects.push(second);

                        self.rects.swap_remove(i);
                        continue;
                    }
                    3 => {
                        let side = code ^ 0xf;
                        r.set_outside_boundary(IntRect::opposite_side(side), dirty.boundary(side));
                        if r.is_empty() {
                            return;
                        }
                    }
                    _ => return,
                }
            }
            i += 1;
        }

        self.rects.push(r);
    }
}

fn chain(clip: Option<IntRect>, r: IntRect) -> IntRect {
    match clip {
        Some(c) => c.intersection(&r),
        None => r,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/damage.rs"]
mod tests;
