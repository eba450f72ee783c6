//! Collision detection modules: dynamic-tree broad-phase, manifold generation, the GJK-style
//! distance engine, conservative-advancement CCD, clip helpers, and world queries.

pub mod broadphase;
pub mod ccd;
pub mod clipping;
pub mod contact;
pub mod distance;
pub mod queries;
pub mod tree;

pub use broadphase::{BroadPhase, ProxyKey};
pub use ccd::{time_of_impact, ToiInput, ToiOutput, ToiState};
pub use contact::{Contact, ContactListener, ContactManager, Manifold, ManifoldPoint};
pub use distance::{distance, DistanceInput, DistanceOutput, SimplexCache};
pub use queries::{Raycast, RaycastHit, RaycastQuery};
pub use tree::{DynamicTree, TreeNodeId};
