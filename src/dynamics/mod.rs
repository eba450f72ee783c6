//! Simulation dynamics: force accumulation, integration, island construction and sleeping, and
//! the sequential-impulse velocity/position solvers.

pub mod forces;
pub mod integrator;
pub mod island;
pub mod solver;

pub use forces::{DragForce, ForceGenerator, ForceRegistry, GravityForce, SpringForce};
pub use integrator::Integrator;
pub use island::{Island, IslandManager};
pub use solver::{
    solve_joints_position, solve_joints_velocity, solve_position_constraints, ContactSolver,
    SolverStepMetrics,
};
