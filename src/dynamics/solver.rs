//! Sequential-impulse velocity solver (warm-started, Coulomb friction clamp, two-point block
//! solve) and the non-linear Gauss-Seidel position corrector.

use glam::{Mat2, Vec2};
use log::{debug, trace};

use crate::collision::contact::Contact;
use crate::config::StepConf;
use crate::core::constraints::Joint;
use crate::core::rigidbody::{cross_scalar_vec, cross_vec_vec};
use crate::core::soa::{BodiesSoA, BodyMut};
use crate::utils::allocator::{Arena, EntityId};

/// Tangential speed below which a contact point is treated as stuck rather than slipping, and
/// clamped against `static_friction` instead of the sliding `friction` coefficient.
const STICTION_VELOCITY_THRESHOLD: f32 = 0.01;

#[derive(Debug, Default, Clone)]
pub struct SolverStepMetrics {
    pub islands_solved: usize,
    pub contacts_solved: usize,
    pub joints_solved: usize,
    pub normal_impulse_sum: f32,
    pub tangent_impulse_sum: f32,
}

impl SolverStepMetrics {
    pub fn record_island(&mut self, contact_count: usize, joint_count: usize, normal_sum: f32, tangent_sum: f32) {
        self.islands_solved += 1;
        self.contacts_solved += contact_count;
        self.joints_solved += joint_count;
        self.normal_impulse_sum += normal_sum;
        self.tangent_impulse_sum += tangent_sum;
        trace!(
            "island {}: {} contacts, {} joints, normal_sum={:.4} tangent_sum={:.4}",
            self.islands_solved,
            contact_count,
            joint_count,
            normal_sum,
            tangent_sum
        );
    }

    pub fn merge(&mut self, other: &Self) {
        self.islands_solved += other.islands_solved;
        self.contacts_solved += other.contacts_solved;
        self.joints_solved += other.joints_solved;
        self.normal_impulse_sum += other.normal_impulse_sum;
        self.tangent_impulse_sum += other.tangent_impulse_sum;
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct VelocityConstraintPoint {
    r_a: Vec2,
    r_b: Vec2,
    normal_mass: f32,
    tangent_mass: f32,
    velocity_bias: f32,
    normal_impulse: f32,
    tangent_impulse: f32,
}

/// Per-contact velocity constraint, built fresh each step from the contact's manifold. Carries up
/// to two points; two-point manifolds solve their normal impulses as a coupled 2x2 system rather
/// than independently, matching the coupling a real box-on-box corner stack has.
struct VelocityConstraint {
    body_a: EntityId,
    body_b: EntityId,
    normal: Vec2,
    friction: f32,
    static_friction: f32,
    restitution: f32,
    inv_mass_a: f32,
    inv_mass_b: f32,
    inv_i_a: f32,
    inv_i_b: f32,
    point_count: usize,
    points: [VelocityConstraintPoint; 2],
    k: Mat2,
}

/// Index of a contact inside the arena paired with the `BodiesSoA` slot indices its two bodies
/// currently occupy, resolved once up front so the hot loop never touches the arena.
pub struct ContactSolver {
    constraints: Vec<VelocityConstraint>,
    contact_refs: Vec<EntityId>,
}

impl ContactSolver {
    /// Builds velocity constraints for every touching, enabled, non-sensor contact in `contacts`.
    pub fn new(contact_ids: &[EntityId], contacts: &Arena<Contact>, bodies: &BodiesSoA) -> Self {
        let mut constraints = Vec::with_capacity(contact_ids.len());
        let mut contact_refs = Vec::with_capacity(contact_ids.len());

        for &id in contact_ids {
            let Some(contact) = contacts.get(id) else { continue };
            if !contact.touching || !contact.enabled || contact.is_sensor {
                continue;
            }
            let Some(body_a) = bodies.get(contact.body_a) else { continue };
            let Some(body_b) = bodies.get(contact.body_b) else { continue };
            let center_a = body_a.transform().transform_point(body_a.sweep().local_center);
            let center_b = body_b.transform().transform_point(body_b.sweep().local_center);

            let mut points = [VelocityConstraintPoint::default(); 2];
            let point_count = contact.manifold.points.len().min(2);
            for (i, p) in contact.manifold.points.iter().take(2).enumerate() {
                points[i] = VelocityConstraintPoint {
                    r_a: p.point_a - center_a,
                    r_b: p.point_b - center_b,
                    normal_impulse: p.normal_impulse,
                    tangent_impulse: p.tangent_impulse,
                    ..Default::default()
                };
            }

            constraints.push(VelocityConstraint {
                body_a: contact.body_a,
                body_b: contact.body_b,
                normal: contact.manifold.normal,
                friction: contact.material.friction,
                static_friction: contact.material.static_friction,
                restitution: contact.material.restitution,
                inv_mass_a: body_a.inverse_mass(),
                inv_mass_b: body_b.inverse_mass(),
                inv_i_a: body_a.inverse_inertia(),
                inv_i_b: body_b.inverse_inertia(),
                point_count,
                points,
                k: Mat2::IDENTITY,
            });
            contact_refs.push(id);
        }

        Self { constraints, contact_refs }
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Precomputes per-point normal/tangent mass and restitution bias, and the 2x2 block-solve
    /// matrix for two-point manifolds. Must run once per step before `warm_start`.
    pub fn init_velocity_constraints(&mut self, bodies: &BodiesSoA, step: &StepConf) {
        for vc in &mut self.constraints {
            let tangent = Vec2::new(vc.normal.y, -vc.normal.x);
            let v_a = bodies.get(vc.body_a).map(|b| *b.velocity()).unwrap_or_default();
            let v_b = bodies.get(vc.body_b).map(|b| *b.velocity()).unwrap_or_default();

            for i in 0..vc.point_count {
                let p = &mut vc.points[i];
                let rn_a = cross_vec_vec(p.r_a, vc.normal);
                let rn_b = cross_vec_vec(p.r_b, vc.normal);
                let k_normal = vc.inv_mass_a + vc.inv_mass_b + vc.inv_i_a * rn_a * rn_a + vc.inv_i_b * rn_b * rn_b;
                p.normal_mass = if k_normal > 0.0 { 1.0 / k_normal } else { 0.0 };

                let rt_a = cross_vec_vec(p.r_a, tangent);
                let rt_b = cross_vec_vec(p.r_b, tangent);
                let k_tangent = vc.inv_mass_a + vc.inv_mass_b + vc.inv_i_a * rt_a * rt_a + vc.inv_i_b * rt_b * rt_b;
                p.tangent_mass = if k_tangent > 0.0 { 1.0 / k_tangent } else { 0.0 };

                let rel_v_a = v_a.linear + cross_scalar_vec(v_a.angular, p.r_a);
                let rel_v_b = v_b.linear + cross_scalar_vec(v_b.angular, p.r_b);
                let closing_speed = vc.normal.dot(rel_v_b - rel_v_a);
                p.velocity_bias = if closing_speed < -step.velocity_threshold {
                    -vc.restitution * closing_speed
                } else {
                    0.0
                };
            }

            if vc.point_count == 2 && step.do_block_solve {
                let p0 = vc.points[0];
                let p1 = vc.points[1];
                let rn1a = cross_vec_vec(p0.r_a, vc.normal);
                let rn1b = cross_vec_vec(p0.r_b, vc.normal);
                let rn2a = cross_vec_vec(p1.r_a, vc.normal);
                let rn2b = cross_vec_vec(p1.r_b, vc.normal);

                let k11 = vc.inv_mass_a + vc.inv_mass_b + vc.inv_i_a * rn1a * rn1a + vc.inv_i_b * rn1b * rn1b;
                let k22 = vc.inv_mass_a + vc.inv_mass_b + vc.inv_i_a * rn2a * rn2a + vc.inv_i_b * rn2b * rn2b;
                let k12 = vc.inv_mass_a + vc.inv_mass_b + vc.inv_i_a * rn1a * rn2a + vc.inv_i_b * rn1b * rn2b;

                const MAX_CONDITION_NUMBER: f32 = 1000.0;
                if k11 * k11 < MAX_CONDITION_NUMBER * (k11 * k22 - k12 * k12) {
                    vc.k = Mat2::from_cols(Vec2::new(k11, k12), Vec2::new(k12, k22));
                } else {
                    trace!(
                        "contact {:?}-{:?}: two-point block ill-conditioned, falling back to sequential solve",
                        vc.body_a,
                        vc.body_b
                    );
                    vc.point_count = 1;
                }
            }
        }
    }

    pub fn warm_start(&self, bodies: &mut BodiesSoA) {
        for vc in &self.constraints {
            let Some((mut a, mut b)) = bodies.get2_mut(vc.body_a, vc.body_b) else { continue };
            let tangent = Vec2::new(vc.normal.y, -vc.normal.x);
            for i in 0..vc.point_count {
                let p = &vc.points[i];
                let impulse = vc.normal * p.normal_impulse + tangent * p.tangent_impulse;
                a.apply_impulse_at(-impulse, p.r_a);
                b.apply_impulse_at(impulse, p.r_b);
            }
        }
    }

    /// One pass of tangent-then-normal sequential impulses. Two-point manifolds solve their
    /// normal impulses with the coupled 2x2 system (four-case LCP enumeration), falling back to
    /// sequential per-point solve when the block is ill-conditioned.
    pub fn solve_velocity_constraints(&mut self, bodies: &mut BodiesSoA) {
        for vc in &mut self.constraints {
            let Some((mut a, mut b)) = bodies.get2_mut(vc.body_a, vc.body_b) else { continue };
            let tangent = Vec2::new(vc.normal.y, -vc.normal.x);

            for i in 0..vc.point_count {
                let p = &mut vc.points[i];
                let v_a = a.velocity.linear + cross_scalar_vec(a.velocity.angular, p.r_a);
                let v_b = b.velocity.linear + cross_scalar_vec(b.velocity.angular, p.r_b);
                let vt = (v_b - v_a).dot(tangent);

                let friction = if vt.abs() < STICTION_VELOCITY_THRESHOLD {
                    vc.static_friction
                } else {
                    vc.friction
                };
                let max_friction = friction * p.normal_impulse;
                let lambda = p.tangent_mass * -vt;
                let new_impulse = (p.tangent_impulse + lambda).clamp(-max_friction, max_friction);
                let delta = new_impulse - p.tangent_impulse;
                p.tangent_impulse = new_impulse;

                let impulse = tangent * delta;
                a.apply_impulse_at(-impulse, p.r_a);
                b.apply_impulse_at(impulse, p.r_b);
            }

            if vc.point_count == 1 {
                let p = &mut vc.points[0];
                let v_a = a.velocity.linear + cross_scalar_vec(a.velocity.angular, p.r_a);
                let v_b = b.velocity.linear + cross_scalar_vec(b.velocity.angular, p.r_b);
                let vn = (v_b - v_a).dot(vc.normal);

                let lambda = -p.normal_mass * (vn - p.velocity_bias);
                let new_impulse = (p.normal_impulse + lambda).max(0.0);
                let delta = new_impulse - p.normal_impulse;
                p.normal_impulse = new_impulse;

                let impulse = vc.normal * delta;
                a.apply_impulse_at(-impulse, p.r_a);
                b.apply_impulse_at(impulse, p.r_b);
            } else {
                Self::solve_block(vc, &mut a, &mut b);
            }
        }
    }

    /// Box2D's four-case block solver for two-point normal impulses: try both non-negative, then
    /// each point pinned to zero individually, then both pinned to zero, accepting the first case
    /// whose resulting velocities stay non-penetrating.
    fn solve_block(vc: &mut VelocityConstraint, a: &mut BodyMut<'_>, b: &mut BodyMut<'_>) {
        let p0 = vc.points[0];
        let p1 = vc.points[1];

        let v_a0 = a.velocity.linear + cross_scalar_vec(a.velocity.angular, p0.r_a);
        let v_b0 = b.velocity.linear + cross_scalar_vec(b.velocity.angular, p0.r_b);
        let v_a1 = a.velocity.linear + cross_scalar_vec(a.velocity.angular, p1.r_a);
        let v_b1 = b.velocity.linear + cross_scalar_vec(b.velocity.angular, p1.r_b);

        let vn1 = vc.normal.dot(v_b0 - v_a0);
        let vn2 = vc.normal.dot(v_b1 - v_a1);

        let a_impulse = Vec2::new(p0.normal_impulse, p1.normal_impulse);
        let b_rhs = Vec2::new(vn1 - p0.velocity_bias, vn2 - p1.velocity_bias);

        let mut x = vc.k.inverse() * -b_rhs;
        if x.x < 0.0 || x.y < 0.0 {
            x = solve_four_cases(vc.k, b_rhs);
        }

        let d = x - a_impulse;
        vc.points[0].normal_impulse = x.x;
        vc.points[1].normal_impulse = x.y;

        let p0_impulse = vc.normal * d.x;
        let p1_impulse = vc.normal * d.y;
        a.apply_impulse_at(-p0_impulse, p0.r_a);
        b.apply_impulse_at(p0_impulse, p0.r_b);
        a.apply_impulse_at(-p1_impulse, p1.r_a);
        b.apply_impulse_at(p1_impulse, p1.r_b);
    }

    /// Writes the converged impulses back into each contact's manifold so next step's `init`
    /// warm-starts from them (feature-id matching already carried them across regeneration).
    pub fn store_impulses(&self, contacts: &mut Arena<Contact>) {
        for (vc, &id) in self.constraints.iter().zip(&self.contact_refs) {
            let Some(contact) = contacts.get_mut(id) else { continue };
            for i in 0..vc.point_count {
                if let Some(mp) = contact.manifold.points.get_mut(i) {
                    mp.normal_impulse = vc.points[i].normal_impulse;
                    mp.tangent_impulse = vc.points[i].tangent_impulse;
                }
            }
        }
    }

    pub fn normal_impulse_sum(&self) -> f32 {
        self.constraints
            .iter()
            .flat_map(|vc| vc.points[..vc.point_count].iter())
            .map(|p| p.normal_impulse.abs())
            .sum()
    }

    pub fn tangent_impulse_sum(&self) -> f32 {
        self.constraints
            .iter()
            .flat_map(|vc| vc.points[..vc.point_count].iter())
            .map(|p| p.tangent_impulse.abs())
            .sum()
    }
}

/// Tries pinning each point to zero in turn when the unconstrained solution has a negative
/// component; returns the first combination that keeps both separating velocities non-negative.
fn solve_four_cases(k: Mat2, b_rhs: Vec2) -> Vec2 {
    // Case: x1 = 0, solve for x2.
    let x2_only = (-b_rhs.y / k.y_axis.y).max(0.0);
    let vn1 = k.x_axis.y * x2_only + b_rhs.x;
    if vn1 >= 0.0 {
        return Vec2::new(0.0, x2_only);
    }

    // Case: x2 = 0, solve for x1.
    let x1_only = (-b_rhs.x / k.x_axis.x).max(0.0);
    let vn2 = k.y_axis.x * x1_only + b_rhs.y;
    if vn2 >= 0.0 {
        return Vec2::new(x1_only, 0.0);
    }

    // Both clamped to zero.
    Vec2::ZERO
}

/// Joint solving is delegated entirely to each `Joint`'s `JointSolver` impl; this just drives the
/// three-phase call sequence over the island's joint list, resolving bodies fresh each call since
/// `BodiesSoA` doesn't allow holding two `BodyMut` borrows across a joint list iteration.
pub fn solve_joints_velocity(joints: &mut [Joint], bodies: &mut BodiesSoA, step: &StepConf, init: bool) {
    for joint in joints.iter_mut() {
        let Some((mut a, mut b)) = bodies.get2_mut(joint.body_a(), joint.body_b()) else { continue };
        if !joint.is_enabled() {
            continue;
        }
        if init {
            joint.init_velocity_constraints(&mut a, &mut b, step);
        } else {
            joint.solve_velocity_constraints(&mut a, &mut b, step);
        }
    }
}

pub fn solve_joints_position(joints: &mut [Joint], bodies: &mut BodiesSoA, step: &StepConf) -> bool {
    let mut all_solved = true;
    for joint in joints.iter_mut() {
        if !joint.is_enabled() {
            continue;
        }
        let Some((mut a, mut b)) = bodies.get2_mut(joint.body_a(), joint.body_b()) else { continue };
        if !joint.solve_position_constraints(&mut a, &mut b, step) {
            all_solved = false;
        }
    }
    all_solved
}

struct PositionPoint {
    body_a: EntityId,
    body_b: EntityId,
    normal: Vec2,
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    base_separation: f32,
}

/// Non-linear Gauss-Seidel position correction. Anchors are snapshotted into each body's local
/// frame once at entry so later points correctly see earlier points' corrections (including
/// rotation) when they re-derive the current world anchor from the body's now-updated transform.
pub fn solve_position_constraints(
    contact_ids: &[EntityId],
    contacts: &Arena<Contact>,
    bodies: &mut BodiesSoA,
    step: &StepConf,
    resolution_rate: f32,
    target_separation: f32,
) -> f32 {
    let mut min_separation: f32 = 0.0;
    let mut entries = Vec::new();

    for &id in contact_ids {
        let Some(contact) = contacts.get(id) else { continue };
        if !contact.touching || !contact.enabled || contact.is_sensor {
            continue;
        }
        let Some(body_a) = bodies.get(contact.body_a) else { continue };
        let Some(body_b) = bodies.get(contact.body_b) else { continue };

        for point in &contact.manifold.points {
            entries.push(PositionPoint {
                body_a: contact.body_a,
                body_b: contact.body_b,
                normal: contact.manifold.normal,
                local_anchor_a: body_a.transform().inverse_transform_point(point.point_a),
                local_anchor_b: body_b.transform().inverse_transform_point(point.point_b),
                base_separation: point.separation - contact.manifold.normal.dot(point.point_b - point.point_a),
            });
        }
    }

    for entry in &entries {
        let Some((mut a, mut b)) = bodies.get2_mut(entry.body_a, entry.body_b) else { continue };

        let world_a = a.transform.transform_point(entry.local_anchor_a);
        let world_b = b.transform.transform_point(entry.local_anchor_b);
        let separation = entry.base_separation + entry.normal.dot(world_b - world_a);
        min_separation = min_separation.min(separation);

        let r_a = world_a - a.world_center();
        let r_b = world_b - b.world_center();
        let rn_a = cross_vec_vec(r_a, entry.normal);
        let rn_b = cross_vec_vec(r_b, entry.normal);
        let k_normal = *a.inverse_mass + *b.inverse_mass + *a.inverse_inertia * rn_a * rn_a + *b.inverse_inertia * rn_b * rn_b;
        if k_normal <= 0.0 {
            continue;
        }

        let correction = (resolution_rate * (separation - target_separation).min(0.0)).clamp(-step.max_linear_correction, 0.0);
        let impulse = -correction / k_normal;
        let p = entry.normal * impulse;

        a.transform.position -= p * (*a.inverse_mass);
        b.transform.position += p * (*b.inverse_mass);
        a.transform.angle -= *a.inverse_inertia * cross_vec_vec(r_a, p);
        b.transform.angle += *b.inverse_inertia * cross_vec_vec(r_b, p);
    }

    if min_separation < -step.max_linear_correction {
        debug!(
            "position solve: {} contacts still at min_separation={:.5} after correction (rate={:.2}, target={:.4})",
            entries.len(),
            min_separation,
            resolution_rate,
            target_separation
        );
    }

    min_separation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rigidbody::{BodyType, RigidBody};
    use crate::core::shapes::Shape;
    use crate::core::types::{Material, Transform};

    fn dynamic_body(position: Vec2) -> RigidBody {
        let mut body = RigidBody::new(EntityId::default(), BodyType::Dynamic);
        body.transform = Transform::from_position(position);
        body.sweep.pos0 = position;
        body.sweep.pos1 = position;
        let md = Shape::Circle { radius: 0.5 }.compute_mass_data(1.0);
        body.set_mass_properties(md);
        body.material = Material::default();
        body
    }

    #[test]
    fn block_solve_falls_back_when_condition_number_exceeded() {
        let k = Mat2::from_cols(Vec2::new(1.0, 0.999), Vec2::new(0.999, 1.0));
        let result = solve_four_cases(k, Vec2::new(-1.0, -1.0));
        assert!(result.x >= 0.0 && result.y >= 0.0);
    }

    #[test]
    fn contact_solver_reduces_closing_velocity() {
        let mut bodies = BodiesSoA::new();
        let mut a = dynamic_body(Vec2::new(-0.45, 0.0));
        a.velocity.linear = Vec2::new(1.0, 0.0);
        let id_a = bodies.insert(a);
        let mut b = dynamic_body(Vec2::new(0.45, 0.0));
        b.velocity.linear = Vec2::new(-1.0, 0.0);
        let id_b = bodies.insert(b);

        let mut contacts: Arena<Contact> = Arena::new();
        let manifold = crate::collision::contact::collide_shapes(
            &Shape::Circle { radius: 0.5 },
            0,
            &Transform::from_position(Vec2::new(-0.45, 0.0)),
            &Shape::Circle { radius: 0.5 },
            0,
            &Transform::from_position(Vec2::new(0.45, 0.0)),
        );
        assert!(!manifold.points.is_empty());

        let fixture_a = EntityId::from_index(0);
        let fixture_b = EntityId::from_index(1);
        let contact_id = contacts.insert(Contact {
            fixture_a,
            fixture_b,
            child_a: 0,
            child_b: 0,
            body_a: id_a,
            body_b: id_b,
            is_sensor: false,
            touching: true,
            enabled: true,
            filter_flag: false,
            material: crate::core::fixture::ContactMaterial { friction: 0.3, static_friction: 0.4, restitution: 0.0 },
            manifold,
        });

        let mut solver = ContactSolver::new(&[contact_id], &contacts, &bodies);
        let step = StepConf::default();
        solver.init_velocity_constraints(&bodies, &step);
        solver.warm_start(&mut bodies);
        for _ in 0..step.reg_velocity_iterations {
            solver.solve_velocity_constraints(&mut bodies);
        }

        let rel_vel = bodies.get(id_b).unwrap().velocity().linear.x - bodies.get(id_a).unwrap().velocity().linear.x;
        assert!(rel_vel >= -1e-3, "bodies should no longer be closing, got {}", rel_vel);
    }
}
