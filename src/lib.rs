//! rigid2d – a 2D rigid-body physics simulation core.
//!
//! Dynamic AABB tree broad-phase, SAT + Sutherland-Hodgman manifold generation, warm-started
//! sequential-impulse constraint solving with block solve, conservative-advancement CCD, and
//! island-based sleeping, tied together by [`PhysicsWorld::step`].

pub mod collision;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod error;
pub mod utils;
pub mod world;

pub use glam::Vec2;

pub use error::PhysicsError;

pub use core::soa::{BodiesSoA, BodyMut, BodyRef};

pub use collision::{
    broadphase::{BroadPhase, ProxyKey},
    ccd::{time_of_impact, ToiInput, ToiOutput, ToiState},
    contact::{Contact, ContactListener, ContactManager, Manifold, ManifoldPoint},
    queries::{Raycast, RaycastHit, RaycastQuery},
};
pub use core::{
    constraints::{DistanceJoint, Joint, JointSolver, RevoluteJoint, WeldJoint},
    fixture::{CollisionFilter, ContactMaterial, Fixture, FixtureProxy},
    rigidbody::{BodyFlags, BodyType, RigidBody, RigidBodyBuilder},
    shapes::{Aabb, DistanceProxy, PolygonData, Shape},
    types::{MassProperties, Material, Sweep, Transform, Velocity},
};
pub use dynamics::{
    forces::{DragForce, ForceGenerator, ForceRegistry, GravityForce, SpringForce},
    integrator::Integrator,
    island::{Island, IslandManager},
    solver::{solve_joints_position, solve_joints_velocity, solve_position_constraints, ContactSolver, SolverStepMetrics},
};
pub use utils::allocator::{Arena, EntityId, GenerationalId};
pub use world::{FixtureDef, NullContactListener, PhysicsWorld, PhysicsWorldBuilder};

pub use config::{StepConf, WorldConfig};
