//! Island construction (DFS over the contact/joint graph, static bodies as non-propagating
//! boundaries) and accumulated-under-active-time sleep management.

use std::collections::{HashMap, HashSet};

use crate::collision::contact::Contact;
use crate::config::StepConf;
use crate::core::constraints::Joint;
use crate::core::soa::BodiesSoA;
use crate::utils::allocator::{Arena, EntityId};

/// A connected component of awake, collidable bodies, solved as an isolated subproblem. Static
/// bodies may appear in more than one island; each awake dynamic body belongs to exactly one.
#[derive(Debug, Default, Clone)]
pub struct Island {
    pub bodies: Vec<EntityId>,
    pub contacts: Vec<EntityId>,
    pub joints: Vec<usize>,
}

#[derive(Clone, Copy)]
enum Edge {
    Contact(EntityId),
    Joint(usize),
}

#[derive(Default)]
pub struct IslandManager {
    islands: Vec<Island>,
}

impl IslandManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn islands(&self) -> &[Island] {
        &self.islands
    }

    /// DFS seeded from each non-static, awake, unvisited body. Traverses contact edges where the
    /// contact is enabled, touching, and neither fixture is a sensor, and joint edges where the
    /// joint is enabled. Static bodies are included in the island they're reached from but never
    /// propagate traversal to their other edges.
    pub fn build_islands(&mut self, bodies: &BodiesSoA, contacts: &Arena<Contact>, joints: &[Joint]) {
        self.islands.clear();

        let mut adjacency: HashMap<EntityId, Vec<(EntityId, Edge)>> = HashMap::new();
        for id in contacts.ids() {
            let Some(contact) = contacts.get(id) else { continue };
            if !contact.enabled || !contact.touching || contact.is_sensor {
                continue;
            }
            adjacency.entry(contact.body_a).or_default().push((contact.body_b, Edge::Contact(id)));
            adjacency.entry(contact.body_b).or_default().push((contact.body_a, Edge::Contact(id)));
        }
        for (index, joint) in joints.iter().enumerate() {
            if !joint.is_enabled() {
                continue;
            }
            let (a, b) = (joint.body_a(), joint.body_b());
            adjacency.entry(a).or_default().push((b, Edge::Joint(index)));
            adjacency.entry(b).or_default().push((a, Edge::Joint(index)));
        }

        let mut visited: HashSet<EntityId> = HashSet::new();

        for body in bodies.iter() {
            if body.is_static() || !body.is_awake() || visited.contains(&body.id()) {
                continue;
            }

            let mut island = Island::default();
            let mut seen_contacts: HashSet<EntityId> = HashSet::new();
            let mut seen_joints: HashSet<usize> = HashSet::new();
            let mut stack = vec![body.id()];
            let mut in_island: HashSet<EntityId> = HashSet::new();

            while let Some(current) = stack.pop() {
                if !in_island.insert(current) {
                    continue;
                }
                island.bodies.push(current);

                let current_is_static = bodies.get(current).map(|b| b.is_static()).unwrap_or(true);
                if current_is_static {
                    continue;
                }
                visited.insert(current);

                if let Some(edges) = adjacency.get(&current) {
                    for &(neighbor, edge) in edges {
                        match edge {
                            Edge::Contact(id) => {
                                if seen_contacts.insert(id) {
                                    island.contacts.push(id);
                                }
                            }
                            Edge::Joint(idx) => {
                                if seen_joints.insert(idx) {
                                    island.joints.push(idx);
                                }
                            }
                        }
                        if !in_island.contains(&neighbor) {
                            stack.push(neighbor);
                        }
                    }
                }
            }

            self.islands.push(island);
        }
    }

    /// Accumulates `dt` into `under_active_time` for bodies below both sleep-velocity tolerances
    /// and resets it otherwise; puts an island to sleep only once every dynamic body in it has
    /// been under-active for at least `min_still_time_to_sleep`.
    pub fn update_sleeping(&self, bodies: &mut BodiesSoA, dt: f32, step: &StepConf) {
        let linear_tol_sq = step.linear_sleep_tolerance * step.linear_sleep_tolerance;
        let angular_tol_sq = step.angular_sleep_tolerance * step.angular_sleep_tolerance;

        for island in &self.islands {
            let mut min_under_active = f32::MAX;
            let mut any_dynamic = false;

            for &id in &island.bodies {
                let Some(mut body) = bodies.get_mut(id) else { continue };
                if !body.is_dynamic() {
                    continue;
                }
                any_dynamic = true;

                let lin_sq = body.velocity.linear.length_squared();
                let ang_sq = body.velocity.angular * body.velocity.angular;
                let allow_sleep = body.flags.allow_sleep;

                if !allow_sleep || lin_sq > linear_tol_sq || ang_sq > angular_tol_sq {
                    *body.under_active_time = 0.0;
                } else {
                    *body.under_active_time += dt;
                }
                min_under_active = min_under_active.min(*body.under_active_time);
            }

            if !any_dynamic {
                continue;
            }

            let should_sleep = min_under_active >= step.min_still_time_to_sleep;
            for &id in &island.bodies {
                let Some(mut body) = bodies.get_mut(id) else { continue };
                if !body.is_dynamic() {
                    continue;
                }
                body.set_awake(!should_sleep);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rigidbody::{BodyType, RigidBody};
    use crate::core::types::Transform;
    use glam::Vec2;

    fn body(body_type: BodyType) -> RigidBody {
        RigidBody::new(EntityId::default(), body_type)
    }

    #[test]
    fn static_body_does_not_merge_two_dynamic_islands() {
        let mut bodies = BodiesSoA::new();
        let ground = bodies.insert(body(BodyType::Static));
        let a = bodies.insert(body(BodyType::Dynamic));
        let b = bodies.insert(body(BodyType::Dynamic));

        let mut contacts: Arena<Contact> = Arena::new();
        let contact_a = make_touching_contact(ground, a);
        let contact_b = make_touching_contact(ground, b);
        contacts.insert(contact_a);
        contacts.insert(contact_b);

        let mut manager = IslandManager::new();
        manager.build_islands(&bodies, &contacts, &[]);

        assert_eq!(manager.islands().len(), 2, "static ground must not merge the two dynamic islands");
    }

    #[test]
    fn under_active_body_sleeps_after_threshold() {
        let mut bodies = BodiesSoA::new();
        let mut rb = body(BodyType::Dynamic);
        rb.transform = Transform::from_position(Vec2::ZERO);
        let id = bodies.insert(rb);

        let mut manager = IslandManager::new();
        let contacts: Arena<Contact> = Arena::new();
        manager.build_islands(&bodies, &contacts, &[]);

        let mut step = StepConf::default();
        step.min_still_time_to_sleep = 0.1;
        manager.update_sleeping(&mut bodies, 0.2, &step);

        assert!(!bodies.get(id).unwrap().is_awake());
    }

    fn make_touching_contact(body_a: EntityId, body_b: EntityId) -> Contact {
        use crate::collision::contact::Manifold;
        use crate::core::fixture::ContactMaterial;

        Contact {
            fixture_a: EntityId::from_index(0),
            fixture_b: EntityId::from_index(1),
            child_a: 0,
            child_b: 0,
            body_a,
            body_b,
            is_sensor: false,
            touching: true,
            enabled: true,
            filter_flag: false,
            material: ContactMaterial { friction: 0.5, static_friction: 0.6, restitution: 0.0 },
            manifold: Manifold::default(),
        }
    }
}
