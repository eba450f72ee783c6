use serde::{Deserialize, Serialize};

pub use glam::Vec2;

/// 2D position plus a single rotational degree of freedom.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec2,
    pub angle: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            angle: 0.0,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec2) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn from_position_angle(position: Vec2, angle: f32) -> Self {
        Self { position, angle }
    }

    pub fn rotation_matrix(&self) -> glam::Mat2 {
        glam::Mat2::from_angle(self.angle)
    }

    /// Transforms a point from local space into the space this transform represents.
    pub fn transform_point(&self, local: Vec2) -> Vec2 {
        self.position + self.rotation_matrix() * local
    }

    /// Transforms a direction vector (ignores translation).
    pub fn transform_vector(&self, local: Vec2) -> Vec2 {
        self.rotation_matrix() * local
    }

    pub fn inverse_transform_point(&self, world: Vec2) -> Vec2 {
        self.rotation_matrix().transpose() * (world - self.position)
    }

    /// Composes `self` followed by `other` (other is expressed in self's local frame).
    pub fn combine(&self, other: &Transform) -> Transform {
        Transform {
            position: self.transform_point(other.position),
            angle: self.angle + other.angle,
        }
    }
}

/// Linear and angular velocity of a rigid body. Angular velocity is a scalar in 2D (rad/s about
/// the out-of-plane axis).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Velocity {
    pub linear: Vec2,
    pub angular: f32,
}

impl Default for Velocity {
    fn default() -> Self {
        Self {
            linear: Vec2::ZERO,
            angular: 0.0,
        }
    }
}

/// Interpolatable pose used by the continuous-collision pipeline. `alpha0` marks the fraction of
/// the current step at which this sweep's `pos0`/`angle0` were taken as the sub-step origin.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Sweep {
    pub local_center: Vec2,
    pub pos0: Vec2,
    pub pos1: Vec2,
    pub angle0: f32,
    pub angle1: f32,
    pub alpha0: f32,
}

impl Default for Sweep {
    fn default() -> Self {
        Self {
            local_center: Vec2::ZERO,
            pos0: Vec2::ZERO,
            pos1: Vec2::ZERO,
            angle0: 0.0,
            angle1: 0.0,
            alpha0: 0.0,
        }
    }
}

impl Sweep {
    /// Linearly interpolates pose0 -> pose1 across `beta` and returns the resulting transform
    /// of the body's origin (not its center of mass).
    pub fn get_transform(&self, beta: f32) -> Transform {
        let position = self.pos0.lerp(self.pos1, beta);
        let angle = self.angle0 + (self.angle1 - self.angle0) * beta;
        let center_transform = Transform::from_position_angle(position, angle);
        let local_center_world = center_transform.transform_vector(self.local_center);
        Transform {
            position: position - local_center_world,
            angle,
        }
    }

    /// Advances the sweep so that `pos0`/`angle0` become the pose at the given `alpha`,
    /// re-anchoring the CCD sub-step origin.
    pub fn advance(&mut self, alpha: f32) {
        if alpha >= self.alpha0 {
            let beta = (alpha - self.alpha0) / (1.0 - self.alpha0).max(1e-9);
            self.pos0 = self.pos0.lerp(self.pos1, beta);
            self.angle0 += (self.angle1 - self.angle0) * beta;
            self.alpha0 = alpha;
        }
    }

    pub fn normalize(&mut self) {
        let two_pi = std::f32::consts::TAU;
        let d = two_pi * (self.angle0 / two_pi).floor();
        self.angle0 -= d;
        self.angle1 -= d;
    }
}

/// Mass and scalar rotational inertia (about the out-of-plane axis, at the center of mass).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MassProperties {
    pub mass: f32,
    pub center: Vec2,
    pub inertia: f32,
}

impl Default for MassProperties {
    fn default() -> Self {
        Self {
            mass: 1.0,
            center: Vec2::ZERO,
            inertia: 1.0,
        }
    }
}

impl MassProperties {
    pub fn zero() -> Self {
        Self {
            mass: 0.0,
            center: Vec2::ZERO,
            inertia: 0.0,
        }
    }

    /// Combines two mass datas expressed about the same origin (parallel-axis not needed; caller
    /// is responsible for providing data already taken about a shared origin, e.g. a fixture
    /// list on one body).
    pub fn combine(&self, other: &Self) -> Self {
        let mass = self.mass + other.mass;
        if mass <= 0.0 {
            return Self::zero();
        }
        let center = (self.center * self.mass + other.center * other.mass) / mass;
        Self {
            mass,
            center,
            inertia: self.inertia + other.inertia,
        }
    }
}

/// Material coefficients mixed pairwise at contact-creation time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub density: f32,
    pub restitution: f32,
    pub static_friction: f32,
    pub dynamic_friction: f32,
    pub mixing: MaterialMixing,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            density: 1.0,
            restitution: 0.1,
            static_friction: 0.5,
            dynamic_friction: 0.3,
            mixing: MaterialMixing::default(),
        }
    }
}

impl Material {
    pub fn rubber() -> Self {
        Self {
            density: 1.4,
            restitution: 0.8,
            static_friction: 1.2,
            dynamic_friction: 1.0,
            mixing: MaterialMixing::default(),
        }
    }

    pub fn steel() -> Self {
        Self {
            density: 7.8,
            restitution: 0.4,
            static_friction: 0.58,
            dynamic_friction: 0.44,
            mixing: MaterialMixing::default(),
        }
    }

    pub fn ice() -> Self {
        Self {
            density: 0.9,
            restitution: 0.05,
            static_friction: 0.05,
            dynamic_friction: 0.03,
            mixing: MaterialMixing::default(),
        }
    }

    pub fn combine_pair(a: &Self, b: &Self) -> MaterialPairProperties {
        let friction_mode = a.mixing.friction.resolve(b.mixing.friction);
        let restitution_mode = a.mixing.restitution.resolve(b.mixing.restitution);
        MaterialPairProperties {
            static_friction: friction_mode.combine(a.static_friction, b.static_friction),
            dynamic_friction: friction_mode.combine(a.dynamic_friction, b.dynamic_friction),
            restitution: restitution_mode.combine(a.restitution, b.restitution),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MaterialMixing {
    pub friction: MixingMode,
    pub restitution: MixingMode,
}

impl Default for MaterialMixing {
    fn default() -> Self {
        Self {
            friction: MixingMode::GeometricMean,
            restitution: MixingMode::Max,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum MixingMode {
    #[default]
    Average,
    Min,
    Max,
    GeometricMean,
}

impl MixingMode {
    fn combine(self, a: f32, b: f32) -> f32 {
        match self {
            MixingMode::Average => 0.5 * (a + b),
            MixingMode::Min => a.min(b),
            MixingMode::Max => a.max(b),
            MixingMode::GeometricMean => (a.max(0.0) * b.max(0.0)).sqrt(),
        }
    }

    fn resolve(self, other: MixingMode) -> MixingMode {
        if self == MixingMode::Average {
            other
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MaterialPairProperties {
    pub static_friction: f32,
    pub dynamic_friction: f32,
    pub restitution: f32,
}

impl Default for MaterialPairProperties {
    fn default() -> Self {
        MaterialPairProperties::from_materials(&Material::default(), &Material::default())
    }
}

impl MaterialPairProperties {
    pub fn from_materials(a: &Material, b: &Material) -> Self {
        Material::combine_pair(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixing_modes_combine_expected_values() {
        assert!((MixingMode::Average.combine(0.6, 0.2) - 0.4).abs() < 1e-5);
        assert!((MixingMode::Min.combine(0.6, 0.2) - 0.2).abs() < 1e-5);
        assert!((MixingMode::Max.combine(0.6, 0.2) - 0.6).abs() < 1e-5);
        let expected = (0.6_f32 * 0.2_f32).sqrt();
        assert!((MixingMode::GeometricMean.combine(0.6, 0.2) - expected).abs() < 1e-5);
    }

    #[test]
    fn sweep_get_transform_interpolates_linearly() {
        let sweep = Sweep {
            local_center: Vec2::ZERO,
            pos0: Vec2::new(0.0, 0.0),
            pos1: Vec2::new(10.0, 0.0),
            angle0: 0.0,
            angle1: 0.0,
            alpha0: 0.0,
        };
        let xf = sweep.get_transform(0.5);
        assert!((xf.position.x - 5.0).abs() < 1e-5);
    }

    #[test]
    fn transform_combine_round_trip() {
        let a = Transform::from_position_angle(Vec2::new(1.0, 2.0), 0.3);
        let world = a.transform_point(Vec2::new(2.0, 0.0));
        let back = a.inverse_transform_point(world);
        assert!((back - Vec2::new(2.0, 0.0)).length() < 1e-4);
    }
}
