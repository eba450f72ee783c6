//! Dynamic AABB tree broad-phase, keyed by a generational `TreeNodeId` instead of a raw node
//! pointer/index pair (see DESIGN.md, §9 redesign).

use glam::Vec2;
use std::collections::VecDeque;

use crate::core::shapes::Aabb;

const NULL_NODE: usize = usize::MAX;

/// Stable handle to a leaf or internal node. Generation protects against stale handles after a
/// node slot is recycled, the same scheme `utils::allocator::Arena` uses for entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeNodeId {
    index: usize,
    generation: u32,
}

impl TreeNodeId {
    fn new(index: usize, generation: u32) -> Self {
        Self { index, generation }
    }

    /// A total order consistent with node identity, for callers that need to canonicalize a pair
    /// of ids without caring what the order means.
    pub fn sort_key(&self) -> (usize, u32) {
        (self.index, self.generation)
    }
}

impl Default for TreeNodeId {
    fn default() -> Self {
        Self {
            index: NULL_NODE,
            generation: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Allocated,
    Free,
}

#[derive(Debug, Clone)]
struct TreeNode<T> {
    aabb: Aabb,
    user_data: Option<T>,
    parent: usize,
    left: usize,
    right: usize,
    height: i32,
    state: NodeState,
}

impl<T> TreeNode<T> {
    fn is_leaf(&self) -> bool {
        self.left == NULL_NODE
    }
}

/// Dynamic bounding-volume hierarchy over fattened AABBs. Insertion picks the sibling minimizing
/// the SAH surface-area cost; `move_proxy` only re-inserts a proxy when its tight AABB has
/// escaped the fat AABB currently stored at its leaf.
pub struct DynamicTree<T> {
    nodes: Vec<TreeNode<T>>,
    generations: Vec<u32>,
    free_list: VecDeque<usize>,
    root: usize,
    aabb_extension: f32,
    aabb_multiplier: f32,
}

impl<T: Clone> DynamicTree<T> {
    pub fn new(aabb_extension: f32, aabb_multiplier: f32) -> Self {
        Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: VecDeque::new(),
            root: NULL_NODE,
            aabb_extension,
            aabb_multiplier,
        }
    }

    pub fn create_proxy(&mut self, tight_aabb: Aabb, user_data: T) -> TreeNodeId {
        let index = self.allocate_node();
        let fattened = tight_aabb.enlarged(self.aabb_extension);
        {
            let node = &mut self.nodes[index];
            node.aabb = fattened;
            node.user_data = Some(user_data);
            node.height = 0;
        }
        self.insert_leaf(index);
        TreeNodeId::new(index, self.generations[index])
    }

    pub fn destroy_proxy(&mut self, id: TreeNodeId) {
        if !self.is_valid(id) {
            return;
        }
        self.remove_leaf(id.index);
        self.free_node(id.index);
    }

    /// Re-inserts the proxy only if its tight AABB has escaped the stored fat AABB. `displacement`
    /// predictively widens the new fat AABB in the direction of travel so fast-moving but
    /// non-penetrating shapes don't thrash the tree every step.
    pub fn move_proxy(&mut self, id: TreeNodeId, tight_aabb: Aabb, displacement: Vec2) -> bool {
        if !self.is_valid(id) {
            return false;
        }
        let index = id.index;
        if self.nodes[index].aabb.contains(&tight_aabb) {
            return false;
        }

        self.remove_leaf(index);

        let mut fattened = tight_aabb.enlarged(self.aabb_extension);
        let predicted = displacement * self.aabb_multiplier;
        if predicted.x < 0.0 {
            fattened.lower.x += predicted.x;
        } else {
            fattened.upper.x += predicted.x;
        }
        if predicted.y < 0.0 {
            fattened.lower.y += predicted.y;
        } else {
            fattened.upper.y += predicted.y;
        }

        self.nodes[index].aabb = fattened;
        self.insert_leaf(index);
        true
    }

    pub fn fat_aabb(&self, id: TreeNodeId) -> Option<Aabb> {
        self.is_valid(id).then(|| self.nodes[id.index].aabb)
    }

    pub fn user_data(&self, id: TreeNodeId) -> Option<&T> {
        if !self.is_valid(id) {
            return None;
        }
        self.nodes[id.index].user_data.as_ref()
    }

    pub fn height(&self) -> i32 {
        if self.root == NULL_NODE {
            0
        } else {
            self.nodes[self.root].height
        }
    }

    /// Stack-based traversal reporting every leaf whose fat AABB overlaps `aabb`. `callback`
    /// returns `false` to stop the traversal early.
    pub fn query<F: FnMut(TreeNodeId) -> bool>(&self, aabb: &Aabb, mut callback: F) {
        if self.root == NULL_NODE {
            return;
        }
        let mut stack = vec![self.root];
        while let Some(node_index) = stack.pop() {
            let node = &self.nodes[node_index];
            if !node.aabb.overlaps(aabb) {
                continue;
            }
            if node.is_leaf() {
                let id = TreeNodeId::new(node_index, self.generations[node_index]);
                if !callback(id) {
                    return;
                }
            } else {
                stack.push(node.left);
                stack.push(node.right);
            }
        }
    }

    /// Ray cast that shrinks the query segment's AABB as `callback` reports tighter fractions,
    /// matching `collision::queries::Raycast::cast`'s early-out behavior.
    pub fn ray_cast<F: FnMut(TreeNodeId, Vec2, Vec2, f32) -> f32>(
        &self,
        origin: Vec2,
        end: Vec2,
        mut callback: F,
    ) {
        if self.root == NULL_NODE {
            return;
        }
        let mut p1 = origin;
        let mut p2 = end;
        let mut max_fraction = 1.0f32;

        let mut segment_aabb = Aabb::from_points(p1, p1 + (p2 - p1) * max_fraction);
        let mut stack = vec![self.root];
        while let Some(node_index) = stack.pop() {
            let node = &self.nodes[node_index];
            if !node.aabb.overlaps(&segment_aabb) {
                continue;
            }
            if node.is_leaf() {
                let id = TreeNodeId::new(node_index, self.generations[node_index]);
                let value = callback(id, p1, p2, max_fraction);
                if value == 0.0 {
                    return;
                }
                if value > 0.0 {
                    max_fraction = value;
                    p2 = p1 + (p2 - p1) * max_fraction;
                    segment_aabb = Aabb::from_points(p1, p2);
                }
            } else {
                stack.push(node.left);
                stack.push(node.right);
            }
        }
        let _ = p1;
    }

    #[cfg(debug_assertions)]
    pub fn validate(&self) {
        if self.root != NULL_NODE {
            self.validate_structure(self.root);
            self.validate_metrics(self.root);
        }
        let mut free_count = 0;
        let mut index = self.free_list.front().copied();
        while let Some(i) = index {
            free_count += 1;
            index = self.next_free(i);
        }
        debug_assert_eq!(free_count, self.free_list.len());
    }

    #[cfg(debug_assertions)]
    fn next_free(&self, _index: usize) -> Option<usize> {
        None
    }

    #[cfg(debug_assertions)]
    fn validate_structure(&self, index: usize) {
        let node = &self.nodes[index];
        if node.is_leaf() {
            debug_assert_eq!(node.left, NULL_NODE);
            debug_assert_eq!(node.right, NULL_NODE);
            debug_assert_eq!(node.height, 0);
            return;
        }
        let left = node.left;
        let right = node.right;
        debug_assert_eq!(self.nodes[left].parent, index);
        debug_assert_eq!(self.nodes[right].parent, index);
        self.validate_structure(left);
        self.validate_structure(right);
    }

    #[cfg(debug_assertions)]
    fn validate_metrics(&self, index: usize) {
        let node = &self.nodes[index];
        if node.is_leaf() {
            return;
        }
        let left = node.left;
        let right = node.right;
        let height = 1 + self.nodes[left].height.max(self.nodes[right].height);
        debug_assert_eq!(node.height, height);
        let merged = self.nodes[left].aabb.union(&self.nodes[right].aabb);
        debug_assert_eq!(merged.lower, node.aabb.lower);
        debug_assert_eq!(merged.upper, node.aabb.upper);
        self.validate_metrics(left);
        self.validate_metrics(right);
    }

    fn is_valid(&self, id: TreeNodeId) -> bool {
        self.generations
            .get(id.index)
            .map(|&g| g == id.generation)
            .unwrap_or(false)
    }

    fn allocate_node(&mut self) -> usize {
        if let Some(index) = self.free_list.pop_front() {
            self.nodes[index] = TreeNode {
                aabb: Aabb::default(),
                user_data: None,
                parent: NULL_NODE,
                left: NULL_NODE,
                right: NULL_NODE,
                height: 0,
                state: NodeState::Allocated,
            };
            index
        } else {
            let index = self.nodes.len();
            self.nodes.push(TreeNode {
                aabb: Aabb::default(),
                user_data: None,
                parent: NULL_NODE,
                left: NULL_NODE,
                right: NULL_NODE,
                height: 0,
                state: NodeState::Allocated,
            });
            self.generations.push(0);
            index
        }
    }

    fn free_node(&mut self, index: usize) {
        self.nodes[index].state = NodeState::Free;
        self.nodes[index].user_data = None;
        self.generations[index] = self.generations[index].wrapping_add(1);
        self.free_list.push_back(index);
    }

    /// Inserts `leaf` by descending from the root, at each step choosing the child whose subtree
    /// would grow least (SAH-style surface-area cost), then fixes up ancestor AABBs and heights
    /// while AVL-rebalancing nodes whose subtrees became unbalanced.
    fn insert_leaf(&mut self, leaf: usize) {
        if self.root == NULL_NODE {
            self.root = leaf;
            self.nodes[leaf].parent = NULL_NODE;
            return;
        }

        let leaf_aabb = self.nodes[leaf].aabb;
        let mut index = self.root;
        while !self.nodes[index].is_leaf() {
            let left = self.nodes[index].left;
            let right = self.nodes[index].right;

            let area = self.nodes[index].aabb.perimeter();
            let combined = self.nodes[index].aabb.union(&leaf_aabb);
            let combined_area = combined.perimeter();

            let cost = 2.0 * combined_area;
            let inheritance_cost = 2.0 * (combined_area - area);

            let cost_left = self.child_descent_cost(left, &leaf_aabb, inheritance_cost);
            let cost_right = self.child_descent_cost(right, &leaf_aabb, inheritance_cost);

            if cost < cost_left && cost < cost_right {
                break;
            }
            index = if cost_left < cost_right { left } else { right };
        }

        let sibling = index;
        let old_parent = self.nodes[sibling].parent;
        let new_parent = self.allocate_node();
        self.nodes[new_parent].parent = old_parent;
        self.nodes[new_parent].aabb = leaf_aabb.union(&self.nodes[sibling].aabb);
        self.nodes[new_parent].height = self.nodes[sibling].height + 1;

        if old_parent != NULL_NODE {
            if self.nodes[old_parent].left == sibling {
                self.nodes[old_parent].left = new_parent;
            } else {
                self.nodes[old_parent].right = new_parent;
            }
            self.nodes[new_parent].left = sibling;
            self.nodes[new_parent].right = leaf;
            self.nodes[sibling].parent = new_parent;
            self.nodes[leaf].parent = new_parent;
        } else {
            self.nodes[new_parent].left = sibling;
            self.nodes[new_parent].right = leaf;
            self.nodes[sibling].parent = new_parent;
            self.nodes[leaf].parent = new_parent;
            self.root = new_parent;
        }

        self.fix_upward(self.nodes[leaf].parent);
    }

    fn child_descent_cost(&self, child: usize, leaf_aabb: &Aabb, inheritance_cost: f32) -> f32 {
        let node = &self.nodes[child];
        if node.is_leaf() {
            node.aabb.union(leaf_aabb).perimeter() + inheritance_cost
        } else {
            let old_area = node.aabb.perimeter();
            let new_area = node.aabb.union(leaf_aabb).perimeter();
            (new_area - old_area) + inheritance_cost
        }
    }

    fn remove_leaf(&mut self, leaf: usize) {
        if self.root == leaf {
            self.root = NULL_NODE;
            return;
        }

        let parent = self.nodes[leaf].parent;
        let grandparent = self.nodes[parent].parent;
        let sibling = if self.nodes[parent].left == leaf {
            self.nodes[parent].right
        } else {
            self.nodes[parent].left
        };

        if grandparent != NULL_NODE {
            if self.nodes[grandparent].left == parent {
                self.nodes[grandparent].left = sibling;
            } else {
                self.nodes[grandparent].right = sibling;
            }
            self.nodes[sibling].parent = grandparent;
            self.free_node(parent);
            self.fix_upward(grandparent);
        } else {
            self.root = sibling;
            self.nodes[sibling].parent = NULL_NODE;
            self.free_node(parent);
        }
    }

    /// Walks from `start` to the root, rebalancing any node whose left/right height differs by
    /// more than one (single or double AVL rotation) and refreshing merged AABBs/heights.
    fn fix_upward(&mut self, start: usize) {
        let mut index = start;
        while index != NULL_NODE {
            index = self.balance(index);

            let left = self.nodes[index].left;
            let right = self.nodes[index].right;
            self.nodes[index].height = 1 + self.nodes[left].height.max(self.nodes[right].height);
            self.nodes[index].aabb = self.nodes[left].aabb.union(&self.nodes[right].aabb);

            index = self.nodes[index].parent;
        }
    }

    fn balance(&mut self, index: usize) -> usize {
        if self.nodes[index].is_leaf() || self.nodes[index].height < 2 {
            return index;
        }

        let left = self.nodes[index].left;
        let right = self.nodes[index].right;
        let balance = self.nodes[right].height - self.nodes[left].height;

        if balance > 1 {
            self.rotate_left(index, right)
        } else if balance < -1 {
            self.rotate_right(index, left)
        } else {
            index
        }
    }

    fn rotate_left(&mut self, index: usize, right: usize) -> usize {
        let right_left = self.nodes[right].left;
        let right_right = self.nodes[right].right;

        self.nodes[right].left = index;
        self.nodes[right].parent = self.nodes[index].parent;
        self.nodes[index].parent = right;

        let old_parent = self.nodes[right].parent;
        if old_parent != NULL_NODE {
            if self.nodes[old_parent].left == index {
                self.nodes[old_parent].left = right;
            } else {
                self.nodes[old_parent].right = right;
            }
        } else {
            self.root = right;
        }

        if self.nodes[right_left].height > self.nodes[right_right].height {
            self.nodes[right].right = right_left;
            self.nodes[index].right = right_right;
            self.nodes[right_right].parent = index;
        } else {
            self.nodes[right].right = right_right;
            self.nodes[index].right = right_left;
            self.nodes[right_left].parent = index;
        }

        let (il, ir) = (self.nodes[index].left, self.nodes[index].right);
        self.nodes[index].height = 1 + self.nodes[il].height.max(self.nodes[ir].height);
        self.nodes[index].aabb = self.nodes[il].aabb.union(&self.nodes[ir].aabb);

        let (rl, rr) = (self.nodes[right].left, self.nodes[right].right);
        self.nodes[right].height = 1 + self.nodes[rl].height.max(self.nodes[rr].height);
        self.nodes[right].aabb = self.nodes[rl].aabb.union(&self.nodes[rr].aabb);

        right
    }

    fn rotate_right(&mut self, index: usize, left: usize) -> usize {
        let left_left = self.nodes[left].left;
        let left_right = self.nodes[left].right;

        self.nodes[left].right = index;
        self.nodes[left].parent = self.nodes[index].parent;
        self.nodes[index].parent = left;

        let old_parent = self.nodes[left].parent;
        if old_parent != NULL_NODE {
            if self.nodes[old_parent].left == index {
                self.nodes[old_parent].left = left;
            } else {
                self.nodes[old_parent].right = left;
            }
        } else {
            self.root = left;
        }

        if self.nodes[left_left].height > self.nodes[left_right].height {
            self.nodes[left].left = left_left;
            self.nodes[index].left = left_right;
            self.nodes[left_right].parent = index;
        } else {
            self.nodes[left].left = left_right;
            self.nodes[index].left = left_left;
            self.nodes[left_left].parent = index;
        }

        let (il, ir) = (self.nodes[index].left, self.nodes[index].right);
        self.nodes[index].height = 1 + self.nodes[il].height.max(self.nodes[ir].height);
        self.nodes[index].aabb = self.nodes[il].aabb.union(&self.nodes[ir].aabb);

        let (ll, lr) = (self.nodes[left].left, self.nodes[left].right);
        self.nodes[left].height = 1 + self.nodes[ll].height.max(self.nodes[lr].height);
        self.nodes[left].aabb = self.nodes[ll].aabb.union(&self.nodes[lr].aabb);

        left
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aabb_at(x: f32, y: f32) -> Aabb {
        Aabb {
            lower: Vec2::new(x - 0.5, y - 0.5),
            upper: Vec2::new(x + 0.5, y + 0.5),
        }
    }

    #[test]
    fn query_finds_overlapping_proxy() {
        let mut tree: DynamicTree<u32> = DynamicTree::new(0.1, 2.0);
        let a = tree.create_proxy(aabb_at(0.0, 0.0), 1);
        let _b = tree.create_proxy(aabb_at(50.0, 50.0), 2);

        let mut found = Vec::new();
        tree.query(&aabb_at(0.0, 0.0), |id| {
            found.push(id);
            true
        });
        assert_eq!(found.len(), 1);
        assert_eq!(found[0], a);
    }

    #[test]
    fn move_proxy_returns_false_when_still_contained() {
        let mut tree: DynamicTree<u32> = DynamicTree::new(0.5, 2.0);
        let id = tree.create_proxy(aabb_at(0.0, 0.0), 7);
        let moved = tree.move_proxy(id, aabb_at(0.01, 0.0), Vec2::ZERO);
        assert!(!moved);
    }

    #[test]
    fn destroy_proxy_invalidates_handle() {
        let mut tree: DynamicTree<u32> = DynamicTree::new(0.1, 2.0);
        let id = tree.create_proxy(aabb_at(0.0, 0.0), 1);
        tree.destroy_proxy(id);
        assert!(tree.user_data(id).is_none());
    }

    #[test]
    fn many_insertions_keep_tree_balanced() {
        let mut tree: DynamicTree<u32> = DynamicTree::new(0.1, 2.0);
        for i in 0..64 {
            tree.create_proxy(aabb_at(i as f32 * 1.1, (i % 7) as f32), i);
        }
        tree.validate();
        assert!(tree.height() < 20);
    }
}
