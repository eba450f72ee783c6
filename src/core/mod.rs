//! Core types describing physics entities, components, and shared data.

pub mod constraints;
pub mod fixture;
pub mod rigidbody;
pub mod shapes;
pub mod soa;
pub mod types;

pub use constraints::{DistanceJoint, Joint, JointSolver, RevoluteJoint, WeldJoint};
pub use fixture::{CollisionFilter, ContactMaterial, Fixture, FixtureProxy};
pub use rigidbody::{BodyFlags, BodyType, RigidBody, RigidBodyBuilder};
pub use shapes::{Aabb, DistanceProxy, PolygonData, Shape};
pub use types::{MassProperties, Material, MaterialMixing, MaterialPairProperties, MixingMode, Sweep, Transform, Velocity};
