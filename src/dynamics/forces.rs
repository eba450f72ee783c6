use crate::core::soa::{BodiesSoA, BodyMut};
use crate::utils::allocator::EntityId;
use glam::Vec2;

/// Trait describing an external force generator applied to rigid bodies.
pub trait ForceGenerator: Send + Sync {
    fn apply(&self, body: &mut BodyMut, dt: f32);
}

/// Constant gravity force scaled per body by `gravity_scale`.
pub struct GravityForce {
    pub gravity: Vec2,
}

impl GravityForce {
    pub fn new(gravity: Vec2) -> Self {
        Self { gravity }
    }
}

impl ForceGenerator for GravityForce {
    fn apply(&self, body: &mut BodyMut, _dt: f32) {
        if !body.is_dynamic() {
            return;
        }
        let force = self.gravity * body.mass_properties.mass * (*body.gravity_scale);
        body.apply_force(force);
    }
}

/// Quadratic drag resisting the direction of motion.
pub struct DragForce {
    pub drag_coefficient: f32,
}

impl ForceGenerator for DragForce {
    fn apply(&self, body: &mut BodyMut, _dt: f32) {
        if !body.is_dynamic() {
            return;
        }

        let speed = body.velocity.linear.length();
        if speed < 1e-6 {
            return;
        }

        let drag = -body.velocity.linear.normalize() * speed * speed * self.drag_coefficient;
        body.apply_force(drag);
    }
}

/// Hookean spring pulling the body's world center toward a fixed anchor point.
pub struct SpringForce {
    pub anchor: Vec2,
    pub rest_length: f32,
    pub spring_constant: f32,
    pub damping: f32,
}

impl ForceGenerator for SpringForce {
    fn apply(&self, body: &mut BodyMut, _dt: f32) {
        if !body.is_dynamic() {
            return;
        }

        let displacement = body.world_center() - self.anchor;
        let distance = displacement.length();
        if distance < 1e-6 {
            return;
        }

        let extension = distance - self.rest_length;
        let spring_force = -self.spring_constant * extension * (displacement / distance);
        let damping_force = -self.damping * body.velocity.linear;

        body.apply_force(spring_force + damping_force);
    }
}

/// Collection of forces applied to every awake body once per step, plus per-body one-off forces.
pub struct ForceRegistry {
    forces: Vec<Box<dyn ForceGenerator>>,
}

impl Default for ForceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ForceRegistry {
    pub fn new() -> Self {
        Self { forces: Vec::new() }
    }

    pub fn add_force<F: ForceGenerator + 'static>(&mut self, force: F) {
        self.forces.push(Box::new(force));
    }

    pub fn apply_all(&self, bodies: &mut BodiesSoA, dt: f32) {
        for force in &self.forces {
            for mut body in bodies.iter_mut() {
                if !body.flags.awake {
                    continue;
                }
                force.apply(&mut body, dt);
            }
        }
    }

    pub fn apply_force_to(&self, bodies: &mut BodiesSoA, id: EntityId, dt: f32) {
        if let Some(mut body) = bodies.get_mut(id) {
            for force in &self.forces {
                force.apply(&mut body, dt);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rigidbody::{BodyType, RigidBody};
    use crate::core::shapes::Shape;

    fn dynamic_body() -> RigidBody {
        let mut rb = RigidBody::new(EntityId::default(), BodyType::Dynamic);
        rb.set_mass_properties(Shape::Circle { radius: 0.5 }.compute_mass_data(1.0));
        rb
    }

    #[test]
    fn gravity_accumulates_acceleration_on_dynamic_body() {
        let mut bodies = BodiesSoA::new();
        let id = bodies.insert(dynamic_body());

        let mut registry = ForceRegistry::new();
        registry.add_force(GravityForce::new(Vec2::new(0.0, -9.8)));
        registry.apply_all(&mut bodies, 1.0 / 60.0);

        let body = bodies.get_mut(id).unwrap();
        assert!(body.acceleration.y < 0.0);
    }

    #[test]
    fn gravity_does_not_move_static_body() {
        let mut bodies = BodiesSoA::new();
        let id = bodies.insert(RigidBody::new(EntityId::default(), BodyType::Static));

        let mut registry = ForceRegistry::new();
        registry.add_force(GravityForce::new(Vec2::new(0.0, -9.8)));
        registry.apply_all(&mut bodies, 1.0 / 60.0);

        let body = bodies.get_mut(id).unwrap();
        assert_eq!(*body.acceleration, Vec2::ZERO);
    }

    #[test]
    fn drag_opposes_motion() {
        let mut bodies = BodiesSoA::new();
        let mut rb = dynamic_body();
        rb.velocity.linear = Vec2::new(2.0, 0.0);
        let id = bodies.insert(rb);

        let mut registry = ForceRegistry::new();
        registry.add_force(DragForce { drag_coefficient: 0.1 });
        registry.apply_all(&mut bodies, 1.0 / 60.0);

        let body = bodies.get_mut(id).unwrap();
        assert!(body.acceleration.x < 0.0);
    }
}
