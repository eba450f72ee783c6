//! Central simulation container: body/fixture/joint lifecycle, the broad+narrow phase pipeline,
//! and the `World::step` orchestrator (regular island solve, then TOI sub-stepping, then sleep).

use std::collections::HashMap;
use std::time::Instant;

use glam::Vec2;
use log::trace;

use crate::collision::broadphase::{BroadPhase, ProxyKey};
use crate::collision::ccd::{time_of_impact, ToiInput, ToiState};
use crate::collision::contact::{ContactListener, ContactManager};
use crate::collision::queries::{Raycast, RaycastHit, RaycastQuery};
use crate::config::{StepConf, WorldConfig};
use crate::core::constraints::Joint;
use crate::core::fixture::{CollisionFilter, Fixture};
use crate::core::rigidbody::RigidBody;
use crate::core::shapes::{Aabb, Shape};
use crate::core::soa::{BodiesSoA, BodyMut, BodyRef};
use crate::core::types::{MassProperties, Transform};
use crate::dynamics::forces::ForceRegistry;
use crate::dynamics::integrator::Integrator;
use crate::dynamics::island::IslandManager;
use crate::dynamics::solver::{solve_joints_position, solve_joints_velocity, solve_position_constraints, ContactSolver, SolverStepMetrics};
use crate::error::{PhysicsError, Result};
use crate::utils::allocator::{Arena, EntityId};
use crate::utils::profiling::PhysicsProfiler;

/// A no-op listener used when a world is built without one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullContactListener;

impl ContactListener for NullContactListener {}

/// Shape+material+filter description handed to `PhysicsWorld::create_fixture`.
#[derive(Debug, Clone)]
pub struct FixtureDef {
    pub shape: Shape,
    pub offset: Transform,
    pub is_sensor: bool,
    pub filter: CollisionFilter,
}

impl FixtureDef {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            offset: Transform::default(),
            is_sensor: false,
            filter: CollisionFilter::default(),
        }
    }

    pub fn offset(mut self, offset: Transform) -> Self {
        self.offset = offset;
        self
    }

    pub fn sensor(mut self, is_sensor: bool) -> Self {
        self.is_sensor = is_sensor;
        self
    }

    pub fn filter(mut self, filter: CollisionFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Central simulation container orchestrating broad-phase, narrow-phase, solving, and CCD.
pub struct PhysicsWorld {
    pub bodies: BodiesSoA,
    pub fixtures: Arena<Fixture>,
    pub joints: Vec<Joint>,
    pub force_registry: ForceRegistry,
    broadphase: BroadPhase,
    contact_manager: ContactManager,
    integrator: Integrator,
    islands: IslandManager,
    config: WorldConfig,
    time_accumulated: f32,
    previous_dt: f32,
    has_new_fixtures: bool,
    listener: Box<dyn ContactListener>,
    body_fixtures: HashMap<EntityId, Vec<EntityId>>,
    frame_index: u64,
    last_solver_metrics: SolverStepMetrics,
    pub profiler: PhysicsProfiler,
}

impl PhysicsWorld {
    pub fn new(time_step: f32) -> Self {
        Self::builder().time_step(time_step).build()
    }

    pub fn builder() -> PhysicsWorldBuilder {
        PhysicsWorldBuilder::new()
    }
}

pub struct PhysicsWorldBuilder {
    config: WorldConfig,
    listener: Option<Box<dyn ContactListener>>,
    parallel: bool,
}

impl Default for PhysicsWorldBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorldBuilder {
    pub fn new() -> Self {
        Self {
            config: WorldConfig::default(),
            listener: None,
            parallel: false,
        }
    }

    pub fn time_step(mut self, dt: f32) -> Self {
        self.config.step = self.config.step.with_dt(if dt > 0.0 { dt } else { self.config.step.dt }, self.config.step.dt);
        self
    }

    pub fn gravity(mut self, gravity: Vec2) -> Self {
        self.config.gravity = gravity;
        self
    }

    pub fn config(mut self, config: WorldConfig) -> Self {
        self.config = config;
        self
    }

    pub fn listener<L: ContactListener + 'static>(mut self, listener: L) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    pub fn build(self) -> PhysicsWorld {
        let mut integrator = Integrator::new();
        integrator.set_parallel(self.parallel);

        let mut force_registry = ForceRegistry::new();
        force_registry.add_force(crate::dynamics::forces::GravityForce::new(self.config.gravity));

        PhysicsWorld {
            bodies: BodiesSoA::new(),
            fixtures: Arena::new(),
            joints: Vec::new(),
            force_registry,
            broadphase: BroadPhase::new(self.config.step.aabb_extension, self.config.step.aabb_multiplier),
            contact_manager: ContactManager::new(),
            integrator,
            islands: IslandManager::new(),
            config: self.config,
            time_accumulated: 0.0,
            previous_dt: self.config.step.dt,
            has_new_fixtures: false,
            listener: self.listener.unwrap_or_else(|| Box::new(NullContactListener)),
            body_fixtures: HashMap::new(),
            frame_index: 0,
            last_solver_metrics: SolverStepMetrics::default(),
            profiler: PhysicsProfiler::default(),
        }
    }
}

impl PhysicsWorld {
    pub fn set_parallel_enabled(&mut self, enabled: bool) {
        self.integrator.set_parallel(enabled);
    }

    pub fn parallel_enabled(&self) -> bool {
        self.integrator.is_parallel()
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn last_solver_metrics(&self) -> &SolverStepMetrics {
        &self.last_solver_metrics
    }

    pub fn body(&self, id: EntityId) -> Option<BodyRef<'_>> {
        self.bodies.get(id)
    }

    pub fn body_mut(&mut self, id: EntityId) -> Option<BodyMut<'_>> {
        self.bodies.get_mut(id)
    }

    pub fn fixture(&self, id: EntityId) -> Option<&Fixture> {
        self.fixtures.get(id)
    }

    pub fn add_joint(&mut self, joint: Joint) -> Result<usize> {
        self.create_joint(joint)
    }

    // ---- Body lifecycle -------------------------------------------------

    pub fn create_body(&mut self, mut body: RigidBody) -> Result<EntityId> {
        let mass = body.mass_properties.mass;
        if !mass.is_finite() || mass < 0.0 {
            return Err(PhysicsError::ConfigOutOfRange(format!("body mass must be finite and non-negative, got {mass}")));
        }
        let inertia = body.mass_properties.inertia;
        if !inertia.is_finite() || inertia < 0.0 {
            return Err(PhysicsError::ConfigOutOfRange(format!("body inertia must be finite and non-negative, got {inertia}")));
        }

        body.recompute_inverses();
        let id = self.bodies.insert(body);
        self.body_fixtures.insert(id, Vec::new());
        Ok(id)
    }

    /// Destroys a body along with every fixture, contact, and joint attached to it.
    pub fn destroy_body(&mut self, id: EntityId) {
        if let Some(fixture_ids) = self.body_fixtures.remove(&id) {
            for fixture_id in fixture_ids {
                self.destroy_fixture_internal(fixture_id, false);
            }
        }

        let stale_contacts: Vec<EntityId> = self
            .contact_manager
            .contacts
            .ids()
            .filter(|&cid| {
                self.contact_manager
                    .contacts
                    .get(cid)
                    .map(|c| c.body_a == id || c.body_b == id)
                    .unwrap_or(false)
            })
            .collect();
        for cid in stale_contacts {
            self.contact_manager.destroy(cid, self.listener.as_mut());
        }

        let mut index = 0;
        while index < self.joints.len() {
            let (a, b) = (self.joints[index].body_a(), self.joints[index].body_b());
            if a == id || b == id {
                self.joints.remove(index);
            } else {
                index += 1;
            }
        }

        let removed = self.bodies.remove(id);
        debug_assert!(removed.is_some(), "destroy_body called on an already-destroyed or unknown body");
    }

    // ---- Fixture lifecycle ------------------------------------------------

    pub fn create_fixture(&mut self, body_id: EntityId, shape: Shape) -> Option<EntityId> {
        self.create_fixture_with(body_id, FixtureDef::new(shape))
    }

    pub fn create_fixture_with(&mut self, body_id: EntityId, def: FixtureDef) -> Option<EntityId> {
        if self.bodies.get(body_id).is_none() {
            return None;
        }

        let mut fixture = Fixture::new(body_id, def.shape);
        fixture.offset = def.offset;
        fixture.is_sensor = def.is_sensor;
        fixture.filter = def.filter;
        let fixture_id = self.fixtures.insert(fixture);

        let (world_xf, child_count) = {
            let fixture = self.fixtures.get_mut(fixture_id).unwrap();
            fixture.id = fixture_id;
            let body_transform = *self.bodies.get(body_id).unwrap().transform();
            (fixture.world_transform(&body_transform), fixture.shape.child_count())
        };

        for child in 0..child_count {
            let aabb = {
                let fixture = self.fixtures.get(fixture_id).unwrap();
                fixture.shape.compute_aabb(child, &world_xf)
            };
            let tree_id = self.broadphase.create_proxy(aabb, ProxyKey { fixture: fixture_id, child_index: child });
            let fixture = self.fixtures.get_mut(fixture_id).unwrap();
            fixture.proxies[child].tree_id = Some(tree_id);
            fixture.proxies[child].child_index = child;
        }

        self.body_fixtures.entry(body_id).or_default().push(fixture_id);
        self.has_new_fixtures = true;
        self.recompute_mass(body_id);
        Some(fixture_id)
    }

    pub fn destroy_fixture(&mut self, fixture_id: EntityId) {
        let body_id = self.fixtures.get(fixture_id).map(|f| f.body_id);
        self.destroy_fixture_internal(fixture_id, true);
        if let Some(body_id) = body_id {
            self.recompute_mass(body_id);
        }
    }

    fn destroy_fixture_internal(&mut self, fixture_id: EntityId, unlink_from_body: bool) {
        let removed = self.fixtures.remove(fixture_id);
        debug_assert!(removed.is_some(), "destroy_fixture called on an already-destroyed or unknown fixture");
        let Some(fixture) = removed else { return };

        for proxy in &fixture.proxies {
            if let Some(tree_id) = proxy.tree_id {
                self.broadphase.destroy_proxy(tree_id);
            }
        }

        let stale_contacts: Vec<EntityId> = self
            .contact_manager
            .contacts
            .ids()
            .filter(|&cid| {
                self.contact_manager
                    .contacts
                    .get(cid)
                    .map(|c| c.fixture_a == fixture_id || c.fixture_b == fixture_id)
                    .unwrap_or(false)
            })
            .collect();
        for cid in stale_contacts {
            self.contact_manager.destroy(cid, self.listener.as_mut());
        }

        if unlink_from_body {
            if let Some(list) = self.body_fixtures.get_mut(&fixture.body_id) {
                list.retain(|&id| id != fixture_id);
            }
        }
    }

    /// Recomputes a body's combined mass/center/inertia from its attached fixtures, following
    /// the usual parallel-axis combination: each fixture's mass data is shifted to the body's
    /// origin, summed, then shifted back to the combined centroid.
    fn recompute_mass(&mut self, body_id: EntityId) {
        let Some(mut body) = self.bodies.get_mut(body_id) else { return };
        if !body.is_dynamic() {
            *body.mass_properties = MassProperties::zero();
            *body.inverse_mass = 0.0;
            *body.inverse_inertia = 0.0;
            return;
        }

        let Some(fixture_ids) = self.body_fixtures.get(&body_id) else { return };
        let mut combined = MassProperties::zero();

        for &fixture_id in fixture_ids {
            let Some(fixture) = self.fixtures.get(fixture_id) else { continue };
            let density = body.material.density;
            let md = fixture.shape.compute_mass_data(density);
            if md.mass <= 0.0 {
                continue;
            }

            let local_center = fixture.offset.transform_point(md.center);
            let inertia_about_origin = md.inertia + md.mass * local_center.length_squared();
            combined = combined.combine(&MassProperties {
                mass: md.mass,
                center: local_center,
                inertia: inertia_about_origin,
            });
        }

        if combined.mass <= 0.0 {
            combined = MassProperties {
                mass: 1.0,
                center: Vec2::ZERO,
                inertia: 0.0,
            };
        } else {
            combined.inertia -= combined.mass * combined.center.length_squared();
        }

        *body.mass_properties = combined;
        body.sweep.local_center = combined.center;
        drop(body);
        if let Some(mut body) = self.bodies.get_mut(body_id) {
            let fixed_rotation = body.flags.fixed_rotation;
            *body.inverse_mass = 1.0 / combined.mass;
            *body.inverse_inertia = if fixed_rotation || combined.inertia <= f32::EPSILON {
                0.0
            } else {
                1.0 / combined.inertia
            };
        }
    }

    // ---- Joint lifecycle --------------------------------------------------

    pub fn create_joint(&mut self, joint: Joint) -> Result<usize> {
        if self.bodies.get(joint.body_a()).is_none() {
            return Err(PhysicsError::InvalidHandle(format!("joint body_a {:?} does not exist", joint.body_a())));
        }
        if self.bodies.get(joint.body_b()).is_none() {
            return Err(PhysicsError::InvalidHandle(format!("joint body_b {:?} does not exist", joint.body_b())));
        }

        let index = self.joints.len();
        self.joints.push(joint);
        Ok(index)
    }

    pub fn destroy_joint(&mut self, index: usize) {
        debug_assert!(index < self.joints.len(), "destroy_joint called with an out-of-range index");
        if index < self.joints.len() {
            self.joints.remove(index);
        }
    }

    // ---- Queries -----------------------------------------------------------

    pub fn query_aabb(&self, aabb: &Aabb) -> Vec<EntityId> {
        Raycast::query_aabb(&self.broadphase, aabb, &self.fixtures)
    }

    pub fn ray_cast(&self, query: &RaycastQuery) -> Vec<RaycastHit> {
        Raycast::cast(query, &self.broadphase, &self.fixtures, &self.bodies)
    }

    pub fn ray_cast_with_filter<F>(&self, query: &RaycastQuery, filter: F) -> Vec<RaycastHit>
    where
        F: FnMut(&Fixture) -> bool,
    {
        Raycast::cast_with_filter(query, &self.broadphase, &self.fixtures, &self.bodies, filter)
    }

    /// Shifts every body's, sweep's, and fixture's coordinates by `-new_origin`, for long-running
    /// simulations that periodically re-center the world to preserve float precision. Joint
    /// anchors are stored in body-local space and need no adjustment.
    pub fn shift_origin(&mut self, new_origin: Vec2) {
        for mut body in self.bodies.iter_mut() {
            body.transform.position -= new_origin;
            body.sweep.pos0 -= new_origin;
            body.sweep.pos1 -= new_origin;
        }
        self.has_new_fixtures = true;
    }

    // ---- Step orchestrator ---------------------------------------------------

    pub fn step(&mut self, dt: f32) {
        self.time_accumulated += dt;
        let fixed_dt = self.config.step.dt;

        while self.time_accumulated >= fixed_dt {
            self.time_accumulated -= fixed_dt;
            self.step_once(fixed_dt);
        }
    }

    fn step_once(&mut self, dt: f32) {
        self.frame_index = self.frame_index.wrapping_add(1);
        self.profiler.reset();
        let frame_start = Instant::now();

        let step = self.config.step.with_dt(dt, self.previous_dt);
        self.previous_dt = dt;

        self.synchronize_fixtures();
        self.find_new_contacts();

        self.force_registry.apply_all(&mut self.bodies, dt);

        {
            let start = Instant::now();
            self.integrator.integrate_velocities(&mut self.bodies, dt);
            self.profiler.integrator_time += start.elapsed();
        }

        {
            let start = Instant::now();
            self.collide();
            self.profiler.narrow_phase_time += start.elapsed();
        }

        {
            let start = Instant::now();
            self.islands.build_islands(&self.bodies, &self.contact_manager.contacts, &self.joints);
            self.profiler.active_island_count = self.islands.islands().len();
            self.profiler.broad_phase_time += start.elapsed();
        }

        {
            let start = Instant::now();
            self.solve_reg_step(&step);
            self.profiler.solver_time += start.elapsed();
        }

        if step.do_toi {
            let start = Instant::now();
            self.solve_toi_step(&step);
            self.profiler.solver_time += start.elapsed();
        }

        self.islands.update_sleeping(&mut self.bodies, dt, &step);

        self.synchronize_fixtures();
        self.find_new_contacts();

        for mut body in self.bodies.iter_mut() {
            *body.acceleration = Vec2::ZERO;
        }

        self.profiler.body_count = self.bodies.len();
        self.profiler.contact_count = self.contact_manager.contacts.len();
        self.profiler.total_frame_time = frame_start.elapsed();
        trace!(
            "step {}: bodies={} contacts={} islands={} dt={:.5}",
            self.frame_index,
            self.profiler.body_count,
            self.profiler.contact_count,
            self.profiler.active_island_count,
            dt
        );
    }

    /// Queues every fixture's proxies into the broad phase's fat-AABB move buffer so the next
    /// `find_new_contacts` sees bodies that moved last step.
    fn synchronize_fixtures(&mut self) {
        for (&body_id, fixture_ids) in &self.body_fixtures {
            let Some(body) = self.bodies.get(body_id) else { continue };
            let displacement = body.sweep().pos1 - body.sweep().pos0;
            let body_transform = *body.transform();

            for &fixture_id in fixture_ids {
                let Some(fixture) = self.fixtures.get(fixture_id) else { continue };
                let world_xf = fixture.world_transform(&body_transform);
                for (child, proxy) in fixture.proxies.iter().enumerate() {
                    let Some(tree_id) = proxy.tree_id else { continue };
                    let aabb = fixture.shape.compute_aabb(child, &world_xf);
                    self.broadphase.move_proxy(tree_id, aabb, displacement);
                }
            }
        }
    }

    /// Pulls newly overlapping proxy pairs out of the broad phase and turns them into contacts.
    fn find_new_contacts(&mut self) {
        let pairs = self.broadphase.find_new_pairs();
        if pairs.is_empty() {
            return;
        }

        let mut existing_keys: std::collections::HashSet<(EntityId, usize, EntityId, usize)> = self
            .contact_manager
            .contacts
            .iter()
            .map(|c| (c.fixture_a, c.child_a, c.fixture_b, c.child_b))
            .collect();

        for (node_a, node_b) in pairs {
            let (Some(key_a), Some(key_b)) = (self.broadphase.proxy_key(node_a), self.broadphase.proxy_key(node_b)) else {
                continue;
            };
            let (Some(fixture_a), Some(fixture_b)) = (self.fixtures.get(key_a.fixture).cloned(), self.fixtures.get(key_b.fixture).cloned()) else {
                continue;
            };

            let existing = |fa: EntityId, ca: usize, fb: EntityId, cb: usize| {
                existing_keys.contains(&(fa, ca, fb, cb)) || existing_keys.contains(&(fb, cb, fa, ca))
            };

            if self
                .contact_manager
                .add_pair(&fixture_a, key_a.child_index, &fixture_b, key_b.child_index, &mut self.bodies, existing)
                .is_some()
            {
                existing_keys.insert((fixture_a.id, key_a.child_index, fixture_b.id, key_b.child_index));
            }
        }
    }

    /// Regenerates manifolds for every existing contact, destroying ones whose fixtures no
    /// longer overlap and dispatching begin/end-contact listener callbacks.
    fn collide(&mut self) {
        let contact_ids: Vec<EntityId> = self.contact_manager.contacts.ids().collect();
        let mut to_destroy = Vec::new();

        for id in contact_ids {
            let Some(contact) = self.contact_manager.contacts.get(id) else { continue };
            let (Some(fixture_a), Some(fixture_b)) = (self.fixtures.get(contact.fixture_a).cloned(), self.fixtures.get(contact.fixture_b).cloned()) else {
                to_destroy.push(id);
                continue;
            };
            let (Some(body_a), Some(body_b)) = (self.bodies.get(fixture_a.body_id), self.bodies.get(fixture_b.body_id)) else {
                to_destroy.push(id);
                continue;
            };

            if !body_a.is_awake() && !body_b.is_awake() {
                continue;
            }

            let xf_a = fixture_a.world_transform(body_a.transform());
            let xf_b = fixture_b.world_transform(body_b.transform());

            let Some(contact) = self.contact_manager.contacts.get_mut(id) else { continue };
            let (began, stopped) = contact.update(&fixture_a, &xf_a, &fixture_b, &xf_b);
            let contact_snapshot = contact.clone();

            if began {
                self.listener.begin_contact(&contact_snapshot);
            }
            if stopped {
                self.listener.end_contact(&contact_snapshot);
            }
        }

        for id in to_destroy {
            self.contact_manager.destroy(id, self.listener.as_mut());
        }
    }

    /// Solves every awake island's velocity and position constraints, warm-starting from the
    /// previous step's accumulated impulses and writing the converged state back to `bodies`.
    fn solve_reg_step(&mut self, step: &StepConf) {
        self.islands.build_islands(&self.bodies, &self.contact_manager.contacts, &self.joints);
        let islands = self.islands.islands().to_vec();
        let mut metrics = SolverStepMetrics::default();

        for island in &islands {
            for &contact_id in &island.contacts {
                if let Some(contact) = self.contact_manager.contacts.get(contact_id) {
                    if contact.touching {
                        let snapshot = contact.clone();
                        self.listener.pre_solve(&snapshot);
                    }
                }
            }

            let mut joint_subset: Vec<Joint> = island.joints.iter().map(|&idx| self.joints[idx].clone()).collect();

            let mut solver = ContactSolver::new(&island.contacts, &self.contact_manager.contacts, &self.bodies);
            solver.init_velocity_constraints(&self.bodies, step);
            solve_joints_velocity(&mut joint_subset, &mut self.bodies, step, true);

            if step.do_warm_start {
                solver.warm_start(&mut self.bodies);
            }

            for _ in 0..step.reg_velocity_iterations {
                solve_joints_velocity(&mut joint_subset, &mut self.bodies, step, false);
                solver.solve_velocity_constraints(&mut self.bodies);
            }

            solver.store_impulses(&mut self.contact_manager.contacts);

            for &idx in &island.joints {
                self.joints[idx] = joint_subset.remove(0);
            }

            for &id in &island.bodies {
                let Some(mut body) = self.bodies.get_mut(id) else { continue };
                if !body.flags.awake {
                    continue;
                }
                self.integrator.integrate_position(&mut body, step.dt, step);
            }

            let mut joint_subset: Vec<Joint> = island.joints.iter().map(|&idx| self.joints[idx].clone()).collect();
            for _ in 0..step.reg_position_iterations {
                let contacts_ok = solve_position_constraints(
                    &island.contacts,
                    &self.contact_manager.contacts,
                    &mut self.bodies,
                    step,
                    step.reg_resolution_rate,
                    step.reg_min_separation,
                ) >= step.reg_min_separation;
                let joints_ok = solve_joints_position(&mut joint_subset, &mut self.bodies, step);
                if contacts_ok && joints_ok {
                    break;
                }
            }
            for &idx in &island.joints {
                self.joints[idx] = joint_subset.remove(0);
            }

            for &contact_id in &island.contacts {
                if let Some(contact) = self.contact_manager.contacts.get(contact_id) {
                    if contact.touching {
                        let snapshot = contact.clone();
                        self.listener.post_solve(&snapshot, solver.normal_impulse_sum(), solver.tangent_impulse_sum());
                    }
                }
            }

            metrics.record_island(island.contacts.len(), island.joints.len(), solver.normal_impulse_sum(), solver.tangent_impulse_sum());
        }

        self.last_solver_metrics = metrics;
    }

    /// Sub-steps any fast-moving dynamic-vs-non-dynamic (or bullet-flagged) contact pair that
    /// would otherwise tunnel through its partner this step, advancing that pair's sweep to its
    /// time of impact and re-solving a tiny sub-island around it.
    fn solve_toi_step(&mut self, step: &StepConf) {
        let contact_ids: Vec<EntityId> = self.contact_manager.contacts.ids().collect();

        for contact_id in contact_ids {
            for _sub_step in 0..step.max_sub_steps {
                let Some(contact) = self.contact_manager.contacts.get(contact_id) else { break };
                if !contact.enabled || contact.is_sensor {
                    break;
                }
                let (body_a, body_b) = (contact.body_a, contact.body_b);

                if !self.is_toi_eligible(body_a, body_b) {
                    break;
                }

                let Some(toi) = self.compute_contact_toi(contact_id, step) else { break };
                if toi.state != ToiState::Touching && toi.state != ToiState::Overlapped {
                    break;
                }

                self.advance_to_toi(body_a, toi.t);
                self.advance_to_toi(body_b, toi.t);
                self.refresh_contact(contact_id);

                let neighbors = self.gather_toi_neighbors(body_a, body_b);
                self.solve_toi_island(&neighbors, step);
            }
        }
    }

    fn is_toi_eligible(&self, body_a: EntityId, body_b: EntityId) -> bool {
        let (Some(a), Some(b)) = (self.bodies.get(body_a), self.bodies.get(body_b)) else { return false };
        if !a.is_awake() && !b.is_awake() {
            return false;
        }
        let dynamic_pair_differs = a.is_dynamic() != b.is_dynamic();
        let bullet = a.to_rigid_body().flags.bullet || b.to_rigid_body().flags.bullet;
        dynamic_pair_differs || bullet
    }

    fn compute_contact_toi(&self, contact_id: EntityId, step: &StepConf) -> Option<crate::collision::ccd::ToiOutput> {
        let contact = self.contact_manager.contacts.get(contact_id)?;
        let fixture_a = self.fixtures.get(contact.fixture_a)?;
        let fixture_b = self.fixtures.get(contact.fixture_b)?;
        let body_a = self.bodies.get(contact.body_a)?;
        let body_b = self.bodies.get(contact.body_b)?;

        let proxy_a = fixture_a.shape.get_child(contact.child_a);
        let proxy_b = fixture_b.shape.get_child(contact.child_b);

        let input = ToiInput {
            proxy_a: &proxy_a,
            sweep_a: *body_a.sweep(),
            proxy_b: &proxy_b,
            sweep_b: *body_b.sweep(),
            t_max: 1.0,
        };

        Some(time_of_impact(&input, step.toi_target_depth(), step.toi_tolerance(), step.max_toi_iters, step.max_toi_root_iters))
    }

    /// Advances `body_id`'s sweep to global fraction `beta` of the current step (re-anchoring
    /// `pos0`/`angle0` there) and resyncs its transform to the new sub-step origin.
    fn advance_to_toi(&mut self, body_id: EntityId, beta: f32) {
        let Some(mut body) = self.bodies.get_mut(body_id) else { return };
        if !body.is_dynamic() {
            return;
        }
        let alpha0 = body.sweep.alpha0;
        let alpha = alpha0 + beta * (1.0 - alpha0);
        body.sweep.advance(alpha);
        *body.transform = body.sweep.get_transform(0.0);
    }

    fn refresh_contact(&mut self, contact_id: EntityId) {
        let Some(contact) = self.contact_manager.contacts.get(contact_id) else { return };
        let (fixture_a, fixture_b) = (contact.fixture_a, contact.fixture_b);
        let (Some(fa), Some(fb)) = (self.fixtures.get(fixture_a).cloned(), self.fixtures.get(fixture_b).cloned()) else { return };
        let (Some(body_a), Some(body_b)) = (self.bodies.get(fa.body_id), self.bodies.get(fb.body_id)) else { return };
        let xf_a = fa.world_transform(body_a.transform());
        let xf_b = fb.world_transform(body_b.transform());

        if let Some(contact) = self.contact_manager.contacts.get_mut(contact_id) {
            contact.update(&fa, &xf_a, &fb, &xf_b);
        }
    }

    /// Gathers every other touching, enabled, non-sensor contact either TOI body participates in,
    /// forming the small sub-island the TOI position solve corrects.
    fn gather_toi_neighbors(&self, body_a: EntityId, body_b: EntityId) -> Vec<EntityId> {
        self.contact_manager
            .contacts
            .ids()
            .filter(|&id| {
                self.contact_manager
                    .contacts
                    .get(id)
                    .map(|c| {
                        c.touching
                            && c.enabled
                            && !c.is_sensor
                            && (c.body_a == body_a || c.body_b == body_a || c.body_a == body_b || c.body_b == body_b)
                    })
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Runs one velocity-solve pass plus bounded position-correction iterations over a small
    /// TOI sub-island, using the TOI resolution tuning rather than the regular one.
    fn solve_toi_island(&mut self, contact_ids: &[EntityId], step: &StepConf) {
        if contact_ids.is_empty() {
            return;
        }

        let mut solver = ContactSolver::new(contact_ids, &self.contact_manager.contacts, &self.bodies);
        if solver.is_empty() {
            return;
        }
        solver.init_velocity_constraints(&self.bodies, step);

        for _ in 0..step.toi_velocity_iterations {
            solver.solve_velocity_constraints(&mut self.bodies);
        }
        solver.store_impulses(&mut self.contact_manager.contacts);

        for _ in 0..step.toi_position_iterations {
            let min_separation = solve_position_constraints(
                contact_ids,
                &self.contact_manager.contacts,
                &mut self.bodies,
                step,
                step.toi_resolution_rate,
                step.toi_min_separation,
            );
            if min_separation >= step.toi_min_separation {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rigidbody::BodyType;
    use crate::core::types::{Material, Transform};

    #[test]
    fn create_body_and_fixture_computes_mass() {
        let mut world = PhysicsWorld::new(1.0 / 60.0);
        let body_id = world.create_body(RigidBody::builder(BodyType::Dynamic).position(Vec2::ZERO).build()).unwrap();
        world.create_fixture(body_id, Shape::Circle { radius: 0.5 });

        let body = world.body(body_id).unwrap();
        assert!(body.to_rigid_body().mass_properties.mass > 0.0);
    }

    #[test]
    fn static_body_has_no_mass_from_fixtures() {
        let mut world = PhysicsWorld::new(1.0 / 60.0);
        let body_id = world.create_body(RigidBody::new(EntityId::default(), BodyType::Static)).unwrap();
        world.create_fixture(body_id, Shape::Circle { radius: 0.5 });

        let body = world.body(body_id).unwrap();
        assert_eq!(body.to_rigid_body().mass_properties.mass, 0.0);
    }

    #[test]
    fn falling_circle_settles_on_ground() {
        let mut world = PhysicsWorld::builder().time_step(1.0 / 60.0).gravity(Vec2::new(0.0, -10.0)).build();

        let ground = world.create_body(RigidBody::new(EntityId::default(), BodyType::Static)).unwrap();
        world.create_fixture_with(
            ground,
            FixtureDef::new(Shape::Polygon(crate::core::shapes::PolygonData::box_half_extents(Vec2::new(5.0, 0.5)))),
        );

        let mut falling = RigidBody::new(EntityId::default(), BodyType::Dynamic);
        falling.transform = Transform::from_position(Vec2::new(0.0, 3.0));
        falling.sweep.pos0 = falling.transform.position;
        falling.sweep.pos1 = falling.transform.position;
        falling.material = Material::default();
        let body_id = world.create_body(falling).unwrap();
        world.create_fixture(body_id, Shape::Circle { radius: 0.5 });

        for _ in 0..240 {
            world.step(1.0 / 60.0);
        }

        let body = world.body(body_id).unwrap();
        assert!(body.transform().position.y > 0.5 - 0.1);
        assert!(body.transform().position.y < 3.0);
    }

    #[test]
    fn destroy_body_removes_its_fixtures_and_contacts() {
        let mut world = PhysicsWorld::new(1.0 / 60.0);
        let a = world.create_body(RigidBody::builder(BodyType::Dynamic).position(Vec2::ZERO).build()).unwrap();
        world.create_fixture(a, Shape::Circle { radius: 0.5 });
        let b = world.create_body(RigidBody::builder(BodyType::Dynamic).position(Vec2::new(0.9, 0.0)).build()).unwrap();
        world.create_fixture(b, Shape::Circle { radius: 0.5 });

        world.step(1.0 / 60.0);
        world.destroy_body(a);

        assert!(world.body(a).is_none());
        for contact in world.contact_manager.contacts.iter() {
            assert_ne!(contact.body_a, a);
            assert_ne!(contact.body_b, a);
        }
    }
}
