//! World-level ray-cast and AABB-query entry points, dispatching through the broad phase's
//! `DynamicTree` instead of a linear scan over every fixture.

use glam::Vec2;

use super::broadphase::{BroadPhase, ProxyKey};
use crate::core::fixture::Fixture;
use crate::core::shapes::Aabb;
use crate::core::soa::BodiesSoA;
use crate::utils::allocator::{Arena, EntityId};

#[derive(Debug, Clone)]
pub struct RaycastHit {
    pub body_id: EntityId,
    pub fixture_id: EntityId,
    pub child_index: usize,
    pub point: Vec2,
    pub normal: Vec2,
    pub fraction: f32,
}

#[derive(Debug, Clone)]
pub struct RaycastQuery {
    pub origin: Vec2,
    pub translation: Vec2,
    pub layer_mask: u32,
    pub ignore_sensors: bool,
    pub closest_only: bool,
}

impl RaycastQuery {
    pub fn new(origin: Vec2, translation: Vec2) -> Self {
        Self {
            origin,
            translation,
            layer_mask: u32::MAX,
            ignore_sensors: false,
            closest_only: true,
        }
    }
}

pub struct Raycast;

impl Raycast {
    pub fn cast(
        query: &RaycastQuery,
        broadphase: &BroadPhase,
        fixtures: &Arena<Fixture>,
        bodies: &BodiesSoA,
    ) -> Vec<RaycastHit> {
        Self::cast_with_filter(query, broadphase, fixtures, bodies, |_| true)
    }

    pub fn cast_with_filter<F>(
        query: &RaycastQuery,
        broadphase: &BroadPhase,
        fixtures: &Arena<Fixture>,
        bodies: &BodiesSoA,
        mut filter: F,
    ) -> Vec<RaycastHit>
    where
        F: FnMut(&Fixture) -> bool,
    {
        let mut hits = Vec::new();
        let end = query.origin + query.translation;

        broadphase.ray_cast(query.origin, end, |node, p1, p2, max_fraction| {
            let Some(key) = broadphase.proxy_key(node) else {
                return max_fraction;
            };
            let Some(fixture) = fixtures.get(key.fixture) else {
                return max_fraction;
            };
            if query.ignore_sensors && fixture.is_sensor {
                return max_fraction;
            }
            if fixture.filter.layer & query.layer_mask == 0 {
                return max_fraction;
            }
            if !filter(fixture) {
                return max_fraction;
            }
            let Some(body) = bodies.get(fixture.body_id) else {
                return max_fraction;
            };

            let world_xf = fixture.world_transform(body.transform());
            if let Some((fraction, normal)) = fixture.shape.ray_cast(p1, p2, max_fraction, &world_xf, key.child_index) {
                hits.push(RaycastHit {
                    body_id: fixture.body_id,
                    fixture_id: fixture.id,
                    child_index: key.child_index,
                    point: p1 + (p2 - p1) * fraction,
                    normal,
                    fraction,
                });
                return fraction;
            }
            max_fraction
        });

        hits.sort_by(|a, b| a.fraction.partial_cmp(&b.fraction).unwrap());
        if query.closest_only {
            hits.into_iter().take(1).collect()
        } else {
            hits
        }
    }

    /// All fixtures whose fat AABB overlaps `aabb` (a superset of the true overlap set; callers
    /// that need exact overlap should follow up with `Shape::test_point`/`collision::distance`).
    pub fn query_aabb(broadphase: &BroadPhase, aabb: &Aabb, fixtures: &Arena<Fixture>) -> Vec<EntityId> {
        let mut found = Vec::new();
        broadphase.query(aabb, |node| {
            if let Some(key) = broadphase.proxy_key(node) {
                if fixtures.get(key.fixture).is_some() {
                    found.push(key.fixture);
                }
            }
            true
        });
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shapes::Shape;
    use crate::core::types::Transform;

    #[test]
    fn query_aabb_finds_overlapping_fixture() {
        let mut broadphase = BroadPhase::new(0.1, 2.0);
        let mut fixtures: Arena<Fixture> = Arena::new();
        let shape = Shape::Circle { radius: 1.0 };
        let fixture = Fixture::new(EntityId::from_index(0), shape.clone());
        let fixture_id = fixtures.insert(fixture);
        fixtures.get_mut(fixture_id).unwrap().id = fixture_id;

        let xf = Transform::default();
        let aabb = shape.compute_aabb(0, &xf);
        broadphase.create_proxy(aabb, ProxyKey { fixture: fixture_id, child_index: 0 });

        let hits = Raycast::query_aabb(&broadphase, &aabb, &fixtures);
        assert!(hits.contains(&fixture_id));
    }
}
