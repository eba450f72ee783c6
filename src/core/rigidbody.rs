use glam::Vec2;

use super::types::{MassProperties, Sweep, Transform, Velocity};
use crate::utils::allocator::EntityId;

/// A body's role in the simulation. Static bodies never integrate and have zero inverse mass.
/// Kinematic bodies are user-driven (their velocity is authoritative) but also present zero
/// inverse mass to collision response. Dynamic bodies are integrated under forces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyType {
    Static,
    Kinematic,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyFlags {
    pub awake: bool,
    pub allow_sleep: bool,
    pub bullet: bool,
    pub fixed_rotation: bool,
    pub enabled: bool,
    /// Transient: set while this body belongs to the island currently being built.
    pub island: bool,
}

impl Default for BodyFlags {
    fn default() -> Self {
        Self {
            awake: true,
            allow_sleep: true,
            bullet: false,
            fixed_rotation: false,
            enabled: true,
            island: false,
        }
    }
}

/// Core rigid body description: identity plus full kinematic state. Fixtures, contacts, and
/// joints are referenced by generational handle, not by pointer (see DESIGN.md, §9 redesign).
#[derive(Debug, Clone)]
pub struct RigidBody {
    pub id: EntityId,
    pub body_type: BodyType,
    pub transform: Transform,
    pub sweep: Sweep,
    pub velocity: Velocity,
    pub acceleration: Vec2,
    pub mass_properties: MassProperties,
    pub material: super::types::Material,
    pub gravity_scale: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub inverse_mass: f32,
    pub inverse_inertia: f32,
    pub flags: BodyFlags,
    pub under_active_time: f32,
    pub fixtures: Vec<EntityId>,
    pub contact_edges: Vec<EntityId>,
    pub joint_edges: Vec<EntityId>,
}

impl Default for RigidBody {
    fn default() -> Self {
        let mut body = Self {
            id: EntityId::default(),
            body_type: BodyType::Dynamic,
            transform: Transform::default(),
            sweep: Sweep::default(),
            velocity: Velocity::default(),
            acceleration: Vec2::ZERO,
            mass_properties: MassProperties::default(),
            material: super::types::Material::default(),
            gravity_scale: 1.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            inverse_mass: 1.0,
            inverse_inertia: 1.0,
            flags: BodyFlags::default(),
            under_active_time: 0.0,
            fixtures: Vec::new(),
            contact_edges: Vec::new(),
            joint_edges: Vec::new(),
        };
        body.recompute_inverses();
        body
    }
}

impl RigidBody {
    pub fn new(id: EntityId, body_type: BodyType) -> Self {
        Self {
            id,
            body_type,
            ..Self::default()
        }
    }

    pub fn is_static(&self) -> bool {
        self.body_type == BodyType::Static
    }

    pub fn is_dynamic(&self) -> bool {
        self.body_type == BodyType::Dynamic
    }

    pub fn set_velocity(&mut self, linear: Vec2, angular: f32) {
        self.velocity.linear = linear;
        self.velocity.angular = angular;
    }

    pub fn apply_force(&mut self, force: Vec2) {
        if !self.is_dynamic() {
            return;
        }
        self.acceleration += force * self.inverse_mass;
    }

    pub fn apply_impulse(&mut self, impulse: Vec2, point: Vec2) {
        if !self.is_dynamic() {
            return;
        }
        self.velocity.linear += impulse * self.inverse_mass;
        let r = point - self.world_center();
        self.velocity.angular += self.inverse_inertia * cross_vec_vec(r, impulse);
        self.wake(true);
    }

    pub fn wake(&mut self, awake: bool) {
        if awake {
            self.under_active_time = 0.0;
        }
        self.flags.awake = awake;
    }

    pub fn world_center(&self) -> Vec2 {
        self.transform.transform_point(self.sweep.local_center)
    }

    pub fn set_mass_properties(&mut self, props: MassProperties) {
        self.mass_properties = props;
        self.sweep.local_center = props.center;
        self.recompute_inverses();
    }

    pub fn recompute_inverses(&mut self) {
        if !self.is_dynamic() {
            self.inverse_mass = 0.0;
            self.inverse_inertia = 0.0;
            return;
        }
        self.inverse_mass = if self.mass_properties.mass > f32::EPSILON {
            1.0 / self.mass_properties.mass
        } else {
            // A dynamic body with no attached fixtures still needs to move under forces.
            self.mass_properties.mass = 1.0;
            1.0
        };
        self.inverse_inertia = if self.flags.fixed_rotation || self.mass_properties.inertia <= f32::EPSILON {
            0.0
        } else {
            1.0 / self.mass_properties.inertia
        };
    }

    pub fn builder(body_type: BodyType) -> RigidBodyBuilder {
        RigidBodyBuilder::new(body_type)
    }
}

/// Cross product of a 2D vector and a 2D vector, returning the out-of-plane scalar.
pub fn cross_vec_vec(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Cross product of a scalar (out-of-plane) and a 2D vector.
pub fn cross_scalar_vec(s: f32, v: Vec2) -> Vec2 {
    Vec2::new(-s * v.y, s * v.x)
}

pub struct RigidBodyBuilder {
    body: RigidBody,
}

impl RigidBodyBuilder {
    pub fn new(body_type: BodyType) -> Self {
        Self {
            body: RigidBody::new(EntityId::default(), body_type),
        }
    }

    pub fn position(mut self, pos: Vec2) -> Self {
        self.body.transform.position = pos;
        self.body.sweep.pos0 = pos;
        self.body.sweep.pos1 = pos;
        self
    }

    pub fn angle(mut self, angle: f32) -> Self {
        self.body.transform.angle = angle;
        self.body.sweep.angle0 = angle;
        self.body.sweep.angle1 = angle;
        self
    }

    pub fn mass(mut self, mass: f32) -> Self {
        self.body.mass_properties.mass = mass;
        self.body.recompute_inverses();
        self
    }

    pub fn inertia(mut self, inertia: f32) -> Self {
        self.body.mass_properties.inertia = inertia;
        self.body.recompute_inverses();
        self
    }

    pub fn fixed_rotation(mut self, fixed: bool) -> Self {
        self.body.flags.fixed_rotation = fixed;
        self.body.recompute_inverses();
        self
    }

    pub fn bullet(mut self, bullet: bool) -> Self {
        self.body.flags.bullet = bullet;
        self
    }

    pub fn velocity(mut self, linear: Vec2, angular: f32) -> Self {
        self.body.set_velocity(linear, angular);
        self
    }

    pub fn build(self) -> RigidBody {
        self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_body_has_zero_inverse_mass() {
        let body = RigidBody::builder(BodyType::Static).mass(5.0).build();
        assert_eq!(body.inverse_mass, 0.0);
        assert_eq!(body.inverse_inertia, 0.0);
    }

    #[test]
    fn fixed_rotation_zeroes_inverse_inertia() {
        let body = RigidBody::builder(BodyType::Dynamic)
            .mass(2.0)
            .inertia(3.0)
            .fixed_rotation(true)
            .build();
        assert_eq!(body.inverse_inertia, 0.0);
        assert!(body.inverse_mass > 0.0);
    }
}
