use glam::Vec2;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::StepConf;
use crate::core::rigidbody::BodyType;
use crate::core::soa::{BodiesSoA, BodyMut};

/// Semi-implicit (symplectic) Euler integrator: velocities are advanced from accumulated forces
/// first, then positions are advanced from the updated velocities. Translation and rotation per
/// step are clamped to `StepConf::max_translation`/`max_rotation` so a single explosive step can't
/// violate CCD's conservative advancement assumptions.
#[derive(Debug, Clone, Default)]
pub struct Integrator {
    parallel: bool,
}

impl Integrator {
    pub fn new() -> Self {
        Self { parallel: false }
    }

    pub fn set_parallel(&mut self, enabled: bool) {
        self.parallel = enabled;
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    pub fn integrate_velocity(&self, body: &mut BodyMut, dt: f32) {
        if !body.is_dynamic() {
            return;
        }

        body.velocity.linear += *body.acceleration * dt;

        body.velocity.linear *= (1.0 - *body.linear_damping * dt).max(0.0);
        body.velocity.angular *= (1.0 - *body.angular_damping * dt).max(0.0);

        *body.acceleration = Vec2::ZERO;
    }

    pub fn integrate_position(&self, body: &mut BodyMut, dt: f32, conf: &StepConf) {
        if !body.is_dynamic() {
            return;
        }

        let mut translation = body.velocity.linear * dt;
        let translation_len = translation.length();
        if translation_len > conf.max_translation {
            translation *= conf.max_translation / translation_len;
            body.velocity.linear = translation / dt;
        }

        let mut rotation = body.velocity.angular * dt;
        if rotation.abs() > conf.max_rotation {
            rotation = rotation.signum() * conf.max_rotation;
            body.velocity.angular = rotation / dt;
        }

        body.transform.position += translation;
        body.transform.angle += rotation;

        body.sweep.pos0 = body.sweep.pos1;
        body.sweep.angle0 = body.sweep.angle1;
        body.sweep.pos1 = body.transform.position;
        body.sweep.angle1 = body.transform.angle;
        body.sweep.alpha0 = 0.0;
    }

    /// Advances every dynamic, awake body one full step: integrate velocity from accumulated
    /// forces, then integrate position from the resulting velocity.
    pub fn step(&self, bodies: &mut BodiesSoA, conf: &StepConf) {
        self.integrate_velocities(bodies, conf.dt);

        #[cfg(feature = "parallel")]
        if self.parallel {
            self.integrate_positions_parallel(bodies, conf);
            return;
        }

        for mut body in bodies.iter_mut() {
            if !body.flags.awake {
                continue;
            }
            self.integrate_position(&mut body, conf.dt, conf);
        }
    }

    /// Bulk velocity integration over every body, data-parallel when `self.parallel` and the
    /// `parallel` feature are both enabled. `world::PhysicsWorld::step_once` calls this directly
    /// for its whole-body velocity pass, ahead of island construction.
    pub fn integrate_velocities(&self, bodies: &mut BodiesSoA, dt: f32) {
        #[cfg(feature = "parallel")]
        if self.parallel {
            self.integrate_velocities_parallel(bodies, dt);
            return;
        }

        for mut body in bodies.iter_mut() {
            if !body.flags.awake {
                continue;
            }
            self.integrate_velocity(&mut body, dt);
        }
    }

    /// Data-parallel velocity pass over the SoA's field arrays directly, skipping the per-body
    /// `BodyMut` borrow so each body's slots can be touched from a different rayon worker. Bodies
    /// are independent here (no shared contact/joint state yet), so splitting across workers
    /// changes nothing about the result.
    #[cfg(feature = "parallel")]
    fn integrate_velocities_parallel(&self, bodies: &mut BodiesSoA, dt: f32) {
        bodies
            .body_types
            .par_iter()
            .zip(bodies.flags.par_iter())
            .zip(bodies.velocities.par_iter_mut())
            .zip(bodies.accelerations.par_iter_mut())
            .zip(bodies.linear_dampings.par_iter())
            .zip(bodies.angular_dampings.par_iter())
            .for_each(|(((((body_type, flags), velocity), acceleration), linear_damping), angular_damping)| {
                if *body_type != BodyType::Dynamic || !flags.awake {
                    return;
                }
                velocity.linear += *acceleration * dt;
                velocity.linear *= (1.0 - linear_damping * dt).max(0.0);
                velocity.angular *= (1.0 - angular_damping * dt).max(0.0);
                *acceleration = Vec2::ZERO;
            });
    }

    /// Data-parallel counterpart to the sequential position loop in `step`. Only reachable from
    /// `step` itself (used directly by tests/benches on a flat body set with no islands);
    /// `world::PhysicsWorld`'s real pipeline integrates positions per-island instead, since
    /// island position correction shares mutable access to the same contact arrays and can't be
    /// split across workers the way this independent bulk pass can.
    #[cfg(feature = "parallel")]
    fn integrate_positions_parallel(&self, bodies: &mut BodiesSoA, conf: &StepConf) {
        let dt = conf.dt;

        bodies
            .body_types
            .par_iter()
            .zip(bodies.flags.par_iter())
            .zip(bodies.velocities.par_iter_mut())
            .zip(bodies.transforms.par_iter_mut())
            .zip(bodies.sweeps.par_iter_mut())
            .for_each(|((((body_type, flags), velocity), transform), sweep)| {
                if *body_type != BodyType::Dynamic || !flags.awake {
                    return;
                }

                let mut translation = velocity.linear * dt;
                let translation_len = translation.length();
                if translation_len > conf.max_translation {
                    translation *= conf.max_translation / translation_len;
                    velocity.linear = translation / dt;
                }

                let mut rotation = velocity.angular * dt;
                if rotation.abs() > conf.max_rotation {
                    rotation = rotation.signum() * conf.max_rotation;
                    velocity.angular = rotation / dt;
                }

                transform.position += translation;
                transform.angle += rotation;

                sweep.pos0 = sweep.pos1;
                sweep.angle0 = sweep.angle1;
                sweep.pos1 = transform.position;
                sweep.angle1 = transform.angle;
                sweep.alpha0 = 0.0;
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rigidbody::{BodyType, RigidBody};
    use crate::utils::allocator::EntityId;
    use glam::Vec2;

    #[test]
    fn free_body_drifts_at_constant_velocity() {
        let mut bodies = BodiesSoA::new();
        let mut rb = RigidBody::new(EntityId::default(), BodyType::Dynamic);
        rb.velocity.linear = Vec2::new(1.0, 0.0);
        let id = bodies.insert(rb);

        let integrator = Integrator::new();
        let conf = StepConf::default();
        integrator.step(&mut bodies, &conf);

        let body = bodies.get(id).unwrap();
        assert!(body.transform().position.x > 0.0);
    }

    #[test]
    fn translation_is_clamped_to_max_translation_per_step() {
        let mut bodies = BodiesSoA::new();
        let mut rb = RigidBody::new(EntityId::default(), BodyType::Dynamic);
        rb.velocity.linear = Vec2::new(1.0e6, 0.0);
        let id = bodies.insert(rb);

        let integrator = Integrator::new();
        let conf = StepConf::default();
        integrator.step(&mut bodies, &conf);

        let body = bodies.get(id).unwrap();
        assert!(body.transform().position.x <= conf.max_translation + 1e-4);
    }

    #[test]
    fn static_body_never_moves() {
        let mut bodies = BodiesSoA::new();
        let mut rb = RigidBody::new(EntityId::default(), BodyType::Static);
        rb.velocity.linear = Vec2::new(5.0, 0.0);
        let id = bodies.insert(rb);

        let integrator = Integrator::new();
        let conf = StepConf::default();
        integrator.step(&mut bodies, &conf);

        let body = bodies.get(id).unwrap();
        assert_eq!(body.transform().position, Vec2::ZERO);
    }
}
