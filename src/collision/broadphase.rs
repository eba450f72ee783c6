use std::collections::HashSet;

use glam::Vec2;

use super::tree::{DynamicTree, TreeNodeId};
use crate::core::fixture::CollisionFilter;
use crate::core::shapes::Aabb;
use crate::utils::allocator::EntityId;

/// One proxy handed to the broad-phase: the fixture/child-shape it represents, plus the filter
/// used when deciding whether two overlapping proxies form a pair.
#[derive(Debug, Clone, Copy)]
pub struct ProxyKey {
    pub fixture: EntityId,
    pub child_index: usize,
}

/// Dynamic-tree-backed broad phase. Proxies queue into `move_buffer` on `move_proxy` and are only
/// flushed (re-queried against the tree) once per `find_new_pairs` call, the same buffered-move
/// pattern box2d-style broad phases use to avoid re-querying on every sub-step.
pub struct BroadPhase {
    tree: DynamicTree<ProxyKey>,
    move_buffer: Vec<TreeNodeId>,
    pair_buffer: Vec<(TreeNodeId, TreeNodeId)>,
}

impl BroadPhase {
    pub fn new(aabb_extension: f32, aabb_multiplier: f32) -> Self {
        Self {
            tree: DynamicTree::new(aabb_extension, aabb_multiplier),
            move_buffer: Vec::new(),
            pair_buffer: Vec::new(),
        }
    }

    pub fn create_proxy(&mut self, aabb: Aabb, key: ProxyKey) -> TreeNodeId {
        let id = self.tree.create_proxy(aabb, key);
        self.move_buffer.push(id);
        id
    }

    pub fn destroy_proxy(&mut self, id: TreeNodeId) {
        self.move_buffer.retain(|&queued| queued != id);
        self.tree.destroy_proxy(id);
    }

    pub fn move_proxy(&mut self, id: TreeNodeId, aabb: Aabb, displacement: Vec2) {
        if self.tree.move_proxy(id, aabb, displacement) {
            self.move_buffer.push(id);
        }
    }

    pub fn fat_aabb(&self, id: TreeNodeId) -> Option<Aabb> {
        self.tree.fat_aabb(id)
    }

    pub fn proxy_key(&self, id: TreeNodeId) -> Option<ProxyKey> {
        self.tree.user_data(id).copied()
    }

    pub fn query(&self, aabb: &Aabb, mut callback: impl FnMut(TreeNodeId) -> bool) {
        self.tree.query(aabb, &mut callback);
    }

    pub fn ray_cast(&self, origin: Vec2, end: Vec2, callback: impl FnMut(TreeNodeId, Vec2, Vec2, f32) -> f32) {
        self.tree.ray_cast(origin, end, callback);
    }

    /// Queries the tree once per buffered move, canonically orders each pair, and dedupes by
    /// node-id pair. Does not itself apply collision filtering; that happens in
    /// `ContactManager::find_new_contacts` so it can consult both fixtures' `CollisionFilter`.
    pub fn find_new_pairs(&mut self) -> Vec<(TreeNodeId, TreeNodeId)> {
        self.pair_buffer.clear();
        let mut seen = HashSet::new();

        for &moved in &self.move_buffer {
            let Some(fat_aabb) = self.tree.fat_aabb(moved) else {
                continue;
            };
            let mut candidates = Vec::new();
            self.tree.query(&fat_aabb, |other| {
                candidates.push(other);
                true
            });

            for other in candidates {
                if other == moved {
                    continue;
                }
                let pair = canonical_pair(moved, other);
                if seen.insert(pair) {
                    self.pair_buffer.push(pair);
                }
            }
        }

        self.move_buffer.clear();
        self.pair_buffer.clone()
    }
}

fn canonical_pair(a: TreeNodeId, b: TreeNodeId) -> (TreeNodeId, TreeNodeId) {
    if a.sort_key() <= b.sort_key() {
        (a, b)
    } else {
        (b, a)
    }
}

pub fn should_collide(a: &CollisionFilter, b: &CollisionFilter) -> bool {
    CollisionFilter::should_collide(a, b)
}
