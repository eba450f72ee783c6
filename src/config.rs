//! Global configuration constants and the per-step tunable set.

use glam::Vec2;

/// Default gravity vector applied in the physics world.
pub const DEFAULT_GRAVITY: [f32; 2] = [0.0, -9.81];

/// Default integration timestep (in seconds).
pub const DEFAULT_TIME_STEP: f32 = 1.0 / 60.0;

/// Linear slop: distance tolerance used throughout to avoid oscillation near contact.
pub const DEFAULT_LINEAR_SLOP: f32 = 0.005;

/// Angular slop, the rotational analogue of linear slop.
pub const DEFAULT_ANGULAR_SLOP: f32 = 2.0 / 180.0 * std::f32::consts::PI;

/// Fat-AABB enlargement applied to every proxy's tight AABB.
pub const DEFAULT_AABB_EXTENSION: f32 = 0.1;

/// Multiplier applied to a proxy's displacement when predictively widening its fat-AABB.
pub const DEFAULT_AABB_MULTIPLIER: f32 = 2.0;

pub const DEFAULT_REG_VELOCITY_ITERATIONS: u32 = 8;
pub const DEFAULT_REG_POSITION_ITERATIONS: u32 = 3;
pub const DEFAULT_TOI_VELOCITY_ITERATIONS: u32 = 8;
pub const DEFAULT_TOI_POSITION_ITERATIONS: u32 = 20;

pub const DEFAULT_MAX_TOI_ROOT_ITERS: u32 = 50;
pub const DEFAULT_MAX_TOI_ITERS: u32 = 20;
pub const DEFAULT_MAX_DISTANCE_ITERS: u32 = 20;
pub const DEFAULT_MAX_SUB_STEPS: u32 = 48;

pub const DEFAULT_MAX_LINEAR_CORRECTION: f32 = 0.2;
pub const DEFAULT_MAX_ANGULAR_CORRECTION: f32 = 8.0 / 180.0 * std::f32::consts::PI;

pub const DEFAULT_REG_RESOLUTION_RATE: f32 = 0.2;
pub const DEFAULT_TOI_RESOLUTION_RATE: f32 = 0.75;

pub const DEFAULT_VELOCITY_THRESHOLD: f32 = 1.0;

pub const DEFAULT_MAX_TRANSLATION: f32 = 4.0;
pub const DEFAULT_MAX_ROTATION: f32 = std::f32::consts::FRAC_PI_2;

pub const DEFAULT_LINEAR_SLEEP_TOLERANCE: f32 = 0.01;
pub const DEFAULT_ANGULAR_SLEEP_TOLERANCE: f32 = 2.0 / 180.0 * std::f32::consts::PI;
pub const DEFAULT_MIN_STILL_TIME_TO_SLEEP: f32 = 0.5;

pub const DEFAULT_LINEAR_DAMPING: f32 = 0.0;
pub const DEFAULT_ANGULAR_DAMPING: f32 = 0.0;

/// Target depth the TOI solver aims to leave between two shapes.
pub fn default_toi_target_depth(linear_slop: f32) -> f32 {
    3.0 * linear_slop
}

/// Tolerance band around the TOI target depth.
pub fn default_toi_tolerance(linear_slop: f32) -> f32 {
    0.25 * linear_slop
}

pub fn default_reg_min_separation(linear_slop: f32) -> f32 {
    -3.0 * linear_slop
}

pub fn default_toi_min_separation(linear_slop: f32) -> f32 {
    -1.5 * linear_slop
}

/// Per-step solver and tolerance configuration. Values default to the constants above but can
/// be overridden per world via [`crate::world::PhysicsWorldBuilder`].
#[derive(Debug, Clone, Copy)]
pub struct StepConf {
    pub dt: f32,
    pub inv_dt: f32,
    pub dt_ratio: f32,

    pub reg_velocity_iterations: u32,
    pub reg_position_iterations: u32,
    pub toi_velocity_iterations: u32,
    pub toi_position_iterations: u32,

    pub max_toi_root_iters: u32,
    pub max_toi_iters: u32,
    pub max_distance_iters: u32,
    pub max_sub_steps: u32,

    pub linear_slop: f32,
    pub angular_slop: f32,
    pub max_linear_correction: f32,
    pub max_angular_correction: f32,

    pub reg_resolution_rate: f32,
    pub toi_resolution_rate: f32,
    pub reg_min_separation: f32,
    pub toi_min_separation: f32,

    pub velocity_threshold: f32,
    pub max_translation: f32,
    pub max_rotation: f32,

    pub do_warm_start: bool,
    pub do_toi: bool,
    pub do_block_solve: bool,

    pub linear_sleep_tolerance: f32,
    pub angular_sleep_tolerance: f32,
    pub min_still_time_to_sleep: f32,

    pub aabb_extension: f32,
    pub aabb_multiplier: f32,
}

impl Default for StepConf {
    fn default() -> Self {
        let linear_slop = DEFAULT_LINEAR_SLOP;
        Self {
            dt: DEFAULT_TIME_STEP,
            inv_dt: 1.0 / DEFAULT_TIME_STEP,
            dt_ratio: 1.0,

            reg_velocity_iterations: DEFAULT_REG_VELOCITY_ITERATIONS,
            reg_position_iterations: DEFAULT_REG_POSITION_ITERATIONS,
            toi_velocity_iterations: DEFAULT_TOI_VELOCITY_ITERATIONS,
            toi_position_iterations: DEFAULT_TOI_POSITION_ITERATIONS,

            max_toi_root_iters: DEFAULT_MAX_TOI_ROOT_ITERS,
            max_toi_iters: DEFAULT_MAX_TOI_ITERS,
            max_distance_iters: DEFAULT_MAX_DISTANCE_ITERS,
            max_sub_steps: DEFAULT_MAX_SUB_STEPS,

            linear_slop,
            angular_slop: DEFAULT_ANGULAR_SLOP,
            max_linear_correction: DEFAULT_MAX_LINEAR_CORRECTION,
            max_angular_correction: DEFAULT_MAX_ANGULAR_CORRECTION,

            reg_resolution_rate: DEFAULT_REG_RESOLUTION_RATE,
            toi_resolution_rate: DEFAULT_TOI_RESOLUTION_RATE,
            reg_min_separation: default_reg_min_separation(linear_slop),
            toi_min_separation: default_toi_min_separation(linear_slop),

            velocity_threshold: DEFAULT_VELOCITY_THRESHOLD,
            max_translation: DEFAULT_MAX_TRANSLATION,
            max_rotation: DEFAULT_MAX_ROTATION,

            do_warm_start: true,
            do_toi: true,
            do_block_solve: true,

            linear_sleep_tolerance: DEFAULT_LINEAR_SLEEP_TOLERANCE,
            angular_sleep_tolerance: DEFAULT_ANGULAR_SLEEP_TOLERANCE,
            min_still_time_to_sleep: DEFAULT_MIN_STILL_TIME_TO_SLEEP,

            aabb_extension: DEFAULT_AABB_EXTENSION,
            aabb_multiplier: DEFAULT_AABB_MULTIPLIER,
        }
    }
}

impl StepConf {
    /// Returns a copy with `dt` (and the derived `inv_dt`/`dt_ratio`) set for the current call.
    pub fn with_dt(mut self, dt: f32, previous_dt: f32) -> Self {
        self.dt = dt;
        self.inv_dt = if dt > 0.0 { 1.0 / dt } else { 0.0 };
        self.dt_ratio = if previous_dt > 0.0 { dt / previous_dt } else { 1.0 };
        self
    }

    pub fn toi_target_depth(&self) -> f32 {
        default_toi_target_depth(self.linear_slop)
    }

    pub fn toi_tolerance(&self) -> f32 {
        default_toi_tolerance(self.linear_slop)
    }
}

/// World-level configuration that does not change per-step.
#[derive(Debug, Clone, Copy)]
pub struct WorldConfig {
    pub gravity: Vec2,
    pub step: StepConf,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::from(DEFAULT_GRAVITY),
            step: StepConf::default(),
        }
    }
}
