//! Joint tagged union dispatched through a uniform three-method solver interface, rather than
//! the core switching on joint kind inline (see DESIGN.md, §9 redesign).

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::rigidbody::{cross_scalar_vec, cross_vec_vec};
use super::soa::BodyMut;
use crate::config::StepConf;
use crate::utils::allocator::EntityId;

/// A joint constraining two bodies. Each variant carries its own solver state (accumulated
/// impulses, cached Jacobian terms) alongside its static configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Joint {
    Revolute(RevoluteJoint),
    Distance(DistanceJoint),
    Weld(WeldJoint),
}

impl Joint {
    pub fn body_a(&self) -> EntityId {
        match self {
            Joint::Revolute(j) => j.body_a,
            Joint::Distance(j) => j.body_a,
            Joint::Weld(j) => j.body_a,
        }
    }

    pub fn body_b(&self) -> EntityId {
        match self {
            Joint::Revolute(j) => j.body_b,
            Joint::Distance(j) => j.body_b,
            Joint::Weld(j) => j.body_b,
        }
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            Joint::Revolute(j) => j.enabled,
            Joint::Distance(j) => j.enabled,
            Joint::Weld(j) => j.enabled,
        }
    }

    pub fn init_velocity_constraints(&mut self, a: &mut BodyMut<'_>, b: &mut BodyMut<'_>, step: &StepConf) {
        match self {
            Joint::Revolute(j) => j.init_velocity_constraints(a, b, step),
            Joint::Distance(j) => j.init_velocity_constraints(a, b, step),
            Joint::Weld(j) => j.init_velocity_constraints(a, b, step),
        }
    }

    pub fn solve_velocity_constraints(&mut self, a: &mut BodyMut<'_>, b: &mut BodyMut<'_>, step: &StepConf) -> bool {
        match self {
            Joint::Revolute(j) => j.solve_velocity_constraints(a, b, step),
            Joint::Distance(j) => j.solve_velocity_constraints(a, b, step),
            Joint::Weld(j) => j.solve_velocity_constraints(a, b, step),
        }
    }

    pub fn solve_position_constraints(&mut self, a: &mut BodyMut<'_>, b: &mut BodyMut<'_>, step: &StepConf) -> bool {
        match self {
            Joint::Revolute(j) => j.solve_position_constraints(a, b, step),
            Joint::Distance(j) => j.solve_position_constraints(a, b, step),
            Joint::Weld(j) => j.solve_position_constraints(a, b, step),
        }
    }
}

/// The contract every joint variant implements. The core never knows which kind it's driving.
pub trait JointSolver {
    fn init_velocity_constraints(&mut self, a: &mut BodyMut<'_>, b: &mut BodyMut<'_>, step: &StepConf);
    fn solve_velocity_constraints(&mut self, a: &mut BodyMut<'_>, b: &mut BodyMut<'_>, step: &StepConf) -> bool;
    fn solve_position_constraints(&mut self, a: &mut BodyMut<'_>, b: &mut BodyMut<'_>, step: &StepConf) -> bool;
}

fn effective_mass_2x2(im_a: f32, ii_a: f32, ra: Vec2, im_b: f32, ii_b: f32, rb: Vec2) -> glam::Mat2 {
    let k11 = im_a + im_b + ii_a * ra.y * ra.y + ii_b * rb.y * rb.y;
    let k12 = -ii_a * ra.x * ra.y - ii_b * rb.x * rb.y;
    let k22 = im_a + im_b + ii_a * ra.x * ra.x + ii_b * rb.x * rb.x;
    glam::Mat2::from_cols(Vec2::new(k11, k12), Vec2::new(k12, k22))
}

/// Pins two bodies' anchor points together, leaving relative rotation free. Solved as a 2x2
/// point-to-point constraint, the same structure a two-point contact block solve uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevoluteJoint {
    pub body_a: EntityId,
    pub body_b: EntityId,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub enabled: bool,

    #[serde(skip)]
    r_a: Vec2,
    #[serde(skip)]
    r_b: Vec2,
    #[serde(skip)]
    mass: glam::Mat2,
    #[serde(skip)]
    impulse: Vec2,
}

impl RevoluteJoint {
    pub fn new(body_a: EntityId, body_b: EntityId, world_pivot: Vec2, local_anchor_a: Vec2, local_anchor_b: Vec2) -> Self {
        let _ = world_pivot;
        Self {
            body_a,
            body_b,
            local_anchor_a,
            local_anchor_b,
            enabled: true,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: glam::Mat2::IDENTITY,
            impulse: Vec2::ZERO,
        }
    }
}

impl JointSolver for RevoluteJoint {
    fn init_velocity_constraints(&mut self, a: &mut BodyMut<'_>, b: &mut BodyMut<'_>, step: &StepConf) {
        self.r_a = a.transform.rotation_matrix() * self.local_anchor_a;
        self.r_b = b.transform.rotation_matrix() * self.local_anchor_b;

        let k = effective_mass_2x2(*a.inverse_mass, *a.inverse_inertia, self.r_a, *b.inverse_mass, *b.inverse_inertia, self.r_b);
        self.mass = k.inverse();

        if step.do_warm_start {
            a.apply_impulse_at(-self.impulse, self.r_a);
            b.apply_impulse_at(self.impulse, self.r_b);
        } else {
            self.impulse = Vec2::ZERO;
        }
    }

    fn solve_velocity_constraints(&mut self, a: &mut BodyMut<'_>, b: &mut BodyMut<'_>, _step: &StepConf) -> bool {
        let v_a = a.velocity.linear + cross_scalar_vec(a.velocity.angular, self.r_a);
        let v_b = b.velocity.linear + cross_scalar_vec(b.velocity.angular, self.r_b);
        let c_dot = v_b - v_a;

        let impulse = self.mass * -c_dot;
        self.impulse += impulse;

        a.apply_impulse_at(-impulse, self.r_a);
        b.apply_impulse_at(impulse, self.r_b);

        impulse.length_squared() < 1e-10
    }

    fn solve_position_constraints(&mut self, a: &mut BodyMut<'_>, b: &mut BodyMut<'_>, step: &StepConf) -> bool {
        let r_a = a.transform.rotation_matrix() * self.local_anchor_a;
        let r_b = b.transform.rotation_matrix() * self.local_anchor_b;
        let c = (b.world_center() + r_b) - (a.world_center() + r_a);

        let separation = c.length();
        if separation < step.linear_slop {
            return true;
        }

        let k = effective_mass_2x2(*a.inverse_mass, *a.inverse_inertia, r_a, *b.inverse_mass, *b.inverse_inertia, r_b);
        let correction = k.inverse() * (-c);

        let translation_a = correction * -(*a.inverse_mass);
        let translation_b = correction * (*b.inverse_mass);
        a.transform.position += translation_a;
        b.transform.position += translation_b;
        a.transform.angle += *a.inverse_inertia * cross_vec_vec(r_a, -correction);
        b.transform.angle += *b.inverse_inertia * cross_vec_vec(r_b, correction);
        a.sweep.pos0 = a.transform.position;
        a.sweep.pos1 = a.transform.position;
        a.sweep.angle0 = a.transform.angle;
        a.sweep.angle1 = a.transform.angle;
        b.sweep.pos0 = b.transform.position;
        b.sweep.pos1 = b.transform.position;
        b.sweep.angle0 = b.transform.angle;
        b.sweep.angle1 = b.transform.angle;

        separation < step.linear_slop * 4.0
    }
}

/// Holds two anchor points at a fixed distance, solved as a 1-D constraint along the current
/// separation axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceJoint {
    pub body_a: EntityId,
    pub body_b: EntityId,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub length: f32,
    pub enabled: bool,

    #[serde(skip)]
    u: Vec2,
    #[serde(skip)]
    r_a: Vec2,
    #[serde(skip)]
    r_b: Vec2,
    #[serde(skip)]
    mass: f32,
    #[serde(skip)]
    impulse: f32,
}

impl DistanceJoint {
    pub fn new(body_a: EntityId, body_b: EntityId, local_anchor_a: Vec2, local_anchor_b: Vec2, length: f32) -> Self {
        Self {
            body_a,
            body_b,
            local_anchor_a,
            local_anchor_b,
            length,
            enabled: true,
            u: Vec2::X,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: 0.0,
            impulse: 0.0,
        }
    }
}

impl JointSolver for DistanceJoint {
    fn init_velocity_constraints(&mut self, a: &mut BodyMut<'_>, b: &mut BodyMut<'_>, step: &StepConf) {
        self.r_a = a.transform.rotation_matrix() * self.local_anchor_a;
        self.r_b = b.transform.rotation_matrix() * self.local_anchor_b;
        self.u = (b.world_center() + self.r_b) - (a.world_center() + self.r_a);
        self.u = self.u.normalize_or_zero();

        let cr_a = cross_vec_vec(self.r_a, self.u);
        let cr_b = cross_vec_vec(self.r_b, self.u);
        let inv_mass = *a.inverse_mass + *a.inverse_inertia * cr_a * cr_a + *b.inverse_mass + *b.inverse_inertia * cr_b * cr_b;
        self.mass = if inv_mass > 0.0 { 1.0 / inv_mass } else { 0.0 };

        if step.do_warm_start {
            let p = self.u * self.impulse;
            a.apply_impulse_at(-p, self.r_a);
            b.apply_impulse_at(p, self.r_b);
        } else {
            self.impulse = 0.0;
        }
    }

    fn solve_velocity_constraints(&mut self, a: &mut BodyMut<'_>, b: &mut BodyMut<'_>, _step: &StepConf) -> bool {
        let v_a = a.velocity.linear + cross_scalar_vec(a.velocity.angular, self.r_a);
        let v_b = b.velocity.linear + cross_scalar_vec(b.velocity.angular, self.r_b);
        let cdot = self.u.dot(v_b - v_a);

        let impulse = -self.mass * cdot;
        self.impulse += impulse;

        let p = self.u * impulse;
        a.apply_impulse_at(-p, self.r_a);
        b.apply_impulse_at(p, self.r_b);

        impulse.abs() < 1e-8
    }

    fn solve_position_constraints(&mut self, a: &mut BodyMut<'_>, b: &mut BodyMut<'_>, step: &StepConf) -> bool {
        let r_a = a.transform.rotation_matrix() * self.local_anchor_a;
        let r_b = b.transform.rotation_matrix() * self.local_anchor_b;
        let d = (b.world_center() + r_b) - (a.world_center() + r_a);
        let length = d.length();
        let u = if length > 1e-9 { d / length } else { Vec2::X };
        let c = length - self.length;
        let c_clamped = c.clamp(-step.max_linear_correction, step.max_linear_correction);

        let cr_a = cross_vec_vec(r_a, u);
        let cr_b = cross_vec_vec(r_b, u);
        let inv_mass = *a.inverse_mass + *a.inverse_inertia * cr_a * cr_a + *b.inverse_mass + *b.inverse_inertia * cr_b * cr_b;
        if inv_mass <= 0.0 {
            return true;
        }
        let impulse = -c_clamped / inv_mass;
        let p = u * impulse;

        a.transform.position -= p * (*a.inverse_mass);
        b.transform.position += p * (*b.inverse_mass);
        a.transform.angle -= *a.inverse_inertia * cross_vec_vec(r_a, p);
        b.transform.angle += *b.inverse_inertia * cross_vec_vec(r_b, p);
        a.sweep.pos0 = a.transform.position;
        a.sweep.pos1 = a.transform.position;
        a.sweep.angle0 = a.transform.angle;
        a.sweep.angle1 = a.transform.angle;
        b.sweep.pos0 = b.transform.position;
        b.sweep.pos1 = b.transform.position;
        b.sweep.angle0 = b.transform.angle;
        b.sweep.angle1 = b.transform.angle;

        c.abs() < step.linear_slop
    }
}

/// Rigidly welds two bodies together: point-to-point anchor plus relative-angle lock. Solved as
/// a point constraint followed by an independent angular constraint, rather than a full 3x3
/// block (close enough for the stiff joints this engine targets).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeldJoint {
    pub body_a: EntityId,
    pub body_b: EntityId,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub reference_angle: f32,
    pub enabled: bool,

    #[serde(skip)]
    r_a: Vec2,
    #[serde(skip)]
    r_b: Vec2,
    #[serde(skip)]
    point_mass: glam::Mat2,
    #[serde(skip)]
    angular_mass: f32,
    #[serde(skip)]
    point_impulse: Vec2,
    #[serde(skip)]
    angular_impulse: f32,
}

impl WeldJoint {
    pub fn new(body_a: EntityId, body_b: EntityId, local_anchor_a: Vec2, local_anchor_b: Vec2, reference_angle: f32) -> Self {
        Self {
            body_a,
            body_b,
            local_anchor_a,
            local_anchor_b,
            reference_angle,
            enabled: true,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            point_mass: glam::Mat2::IDENTITY,
            angular_mass: 0.0,
            point_impulse: Vec2::ZERO,
            angular_impulse: 0.0,
        }
    }
}

impl JointSolver for WeldJoint {
    fn init_velocity_constraints(&mut self, a: &mut BodyMut<'_>, b: &mut BodyMut<'_>, step: &StepConf) {
        self.r_a = a.transform.rotation_matrix() * self.local_anchor_a;
        self.r_b = b.transform.rotation_matrix() * self.local_anchor_b;

        let k = effective_mass_2x2(*a.inverse_mass, *a.inverse_inertia, self.r_a, *b.inverse_mass, *b.inverse_inertia, self.r_b);
        self.point_mass = k.inverse();

        let ii_sum = *a.inverse_inertia + *b.inverse_inertia;
        self.angular_mass = if ii_sum > 0.0 { 1.0 / ii_sum } else { 0.0 };

        if step.do_warm_start {
            a.apply_impulse_at(-self.point_impulse, self.r_a);
            a.velocity.angular -= *a.inverse_inertia * self.angular_impulse;
            b.apply_impulse_at(self.point_impulse, self.r_b);
            b.velocity.angular += *b.inverse_inertia * self.angular_impulse;
        } else {
            self.point_impulse = Vec2::ZERO;
            self.angular_impulse = 0.0;
        }
    }

    fn solve_velocity_constraints(&mut self, a: &mut BodyMut<'_>, b: &mut BodyMut<'_>, _step: &StepConf) -> bool {
        let c_dot_angular = b.velocity.angular - a.velocity.angular;
        let angular_impulse = -self.angular_mass * c_dot_angular;
        self.angular_impulse += angular_impulse;
        a.velocity.angular -= *a.inverse_inertia * angular_impulse;
        b.velocity.angular += *b.inverse_inertia * angular_impulse;

        let v_a = a.velocity.linear + cross_scalar_vec(a.velocity.angular, self.r_a);
        let v_b = b.velocity.linear + cross_scalar_vec(b.velocity.angular, self.r_b);
        let c_dot = v_b - v_a;
        let impulse = self.point_mass * -c_dot;
        self.point_impulse += impulse;

        a.apply_impulse_at(-impulse, self.r_a);
        b.apply_impulse_at(impulse, self.r_b);

        impulse.length_squared() < 1e-10 && angular_impulse.abs() < 1e-8
    }

    fn solve_position_constraints(&mut self, a: &mut BodyMut<'_>, b: &mut BodyMut<'_>, step: &StepConf) -> bool {
        let angle_error = (b.transform.angle - a.transform.angle - self.reference_angle).abs();

        let r_a = a.transform.rotation_matrix() * self.local_anchor_a;
        let r_b = b.transform.rotation_matrix() * self.local_anchor_b;
        let c = (b.world_center() + r_b) - (a.world_center() + r_a);
        let separation = c.length();

        if separation > step.linear_slop {
            let k = effective_mass_2x2(*a.inverse_mass, *a.inverse_inertia, r_a, *b.inverse_mass, *b.inverse_inertia, r_b);
            let correction = k.inverse() * (-c);
            a.transform.position += correction * -(*a.inverse_mass);
            b.transform.position += correction * (*b.inverse_mass);
            a.transform.angle += *a.inverse_inertia * cross_vec_vec(r_a, -correction);
            b.transform.angle += *b.inverse_inertia * cross_vec_vec(r_b, correction);
        }

        if angle_error > step.angular_slop {
            let ii_sum = *a.inverse_inertia + *b.inverse_inertia;
            if ii_sum > 0.0 {
                let target = b.transform.angle - a.transform.angle - self.reference_angle;
                let correction = -target / ii_sum;
                a.transform.angle -= *a.inverse_inertia * correction;
                b.transform.angle += *b.inverse_inertia * correction;
            }
        }

        a.sweep.pos0 = a.transform.position;
        a.sweep.pos1 = a.transform.position;
        a.sweep.angle0 = a.transform.angle;
        a.sweep.angle1 = a.transform.angle;
        b.sweep.pos0 = b.transform.position;
        b.sweep.pos1 = b.transform.position;
        b.sweep.angle0 = b.transform.angle;
        b.sweep.angle1 = b.transform.angle;

        separation < step.linear_slop && angle_error < step.angular_slop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revolute_joint_starts_with_zero_impulse() {
        let joint = RevoluteJoint::new(
            EntityId::default(),
            EntityId::default(),
            Vec2::ZERO,
            Vec2::new(1.0, 0.0),
            Vec2::new(-1.0, 0.0),
        );
        assert_eq!(joint.impulse, Vec2::ZERO);
    }

    #[test]
    fn distance_joint_stores_configured_length() {
        let joint = DistanceJoint::new(EntityId::default(), EntityId::default(), Vec2::ZERO, Vec2::ZERO, 2.5);
        assert_eq!(joint.length, 2.5);
    }
}
