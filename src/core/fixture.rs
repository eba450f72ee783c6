use serde::{Deserialize, Serialize};

use super::shapes::Shape;
use super::types::{MaterialPairProperties, Transform};
use crate::utils::allocator::EntityId;

/// Collision filtering mask, checked symmetrically: two fixtures can collide only if each one's
/// mask includes the other's layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CollisionFilter {
    pub layer: u32,
    pub mask: u32,
    /// Fixtures sharing a nonzero group never collide with each other regardless of mask.
    pub group: i32,
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self {
            layer: 1,
            mask: u32::MAX,
            group: 0,
        }
    }
}

impl CollisionFilter {
    pub fn should_collide(a: &CollisionFilter, b: &CollisionFilter) -> bool {
        if a.group != 0 && a.group == b.group {
            return a.group > 0;
        }
        (a.mask & b.layer) != 0 && (b.mask & a.layer) != 0
    }
}

/// One proxy per child shape, registered with the broad-phase's dynamic tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureProxy {
    pub tree_id: Option<crate::collision::tree::TreeNodeId>,
    pub child_index: usize,
}

/// The binding of a shape to a body, carrying material properties, one or more proxies, and the
/// sensor/filter flags. Fixtures are owned by their body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub id: EntityId,
    pub body_id: EntityId,
    pub shape: Shape,
    pub offset: Transform,
    pub is_sensor: bool,
    pub filter: CollisionFilter,
    #[serde(skip)]
    pub proxies: Vec<FixtureProxy>,
}

impl Fixture {
    pub fn new(body_id: EntityId, shape: Shape) -> Self {
        let child_count = shape.child_count();
        Self {
            id: EntityId::default(),
            body_id,
            shape,
            offset: Transform::default(),
            is_sensor: false,
            filter: CollisionFilter::default(),
            proxies: vec![FixtureProxy::default(); child_count],
        }
    }

    pub fn world_transform(&self, body_transform: &Transform) -> Transform {
        body_transform.combine(&self.offset)
    }
}

/// Per-contact material mixture, re-settable after a contact is created.
#[derive(Debug, Clone, Copy)]
pub struct ContactMaterial {
    /// Coulomb friction coefficient once the contact point is slipping.
    pub friction: f32,
    /// Coefficient the solver clamps against instead of `friction` while the contact point's
    /// tangential speed is below the stiction threshold.
    pub static_friction: f32,
    pub restitution: f32,
}

impl ContactMaterial {
    pub fn mix(a: &super::types::Material, b: &super::types::Material) -> Self {
        let MaterialPairProperties {
            static_friction,
            dynamic_friction,
            restitution,
        } = super::types::Material::combine_pair(a, b);
        Self {
            friction: dynamic_friction,
            static_friction,
            restitution,
        }
    }
}
