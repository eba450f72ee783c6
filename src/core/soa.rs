use glam::Vec2;
use std::collections::VecDeque;

use super::rigidbody::{BodyFlags, BodyType, RigidBody};
use super::types::{MassProperties, Sweep, Transform, Velocity};
use crate::utils::allocator::EntityId;

/// Structure-of-Arrays storage for rigid bodies, replacing an `Arena<RigidBody>` for cache
/// locality in the integrator and solver's hot loops.
#[derive(Default)]
pub struct BodiesSoA {
    pub generations: Vec<u32>,
    pub free_list: VecDeque<usize>,

    pub ids: Vec<EntityId>,
    pub body_types: Vec<BodyType>,
    pub transforms: Vec<Transform>,
    pub sweeps: Vec<Sweep>,
    pub velocities: Vec<Velocity>,
    pub accelerations: Vec<Vec2>,

    pub inverse_masses: Vec<f32>,
    pub inverse_inertias: Vec<f32>,
    pub mass_properties: Vec<MassProperties>,

    pub materials: Vec<super::types::Material>,
    pub flags: Vec<BodyFlags>,
    pub gravity_scales: Vec<f32>,
    pub linear_dampings: Vec<f32>,
    pub angular_dampings: Vec<f32>,
    pub under_active_times: Vec<f32>,
}

impl BodiesSoA {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, body: RigidBody) -> EntityId {
        if let Some(index) = self.free_list.pop_front() {
            let generation = self.generations[index];
            let id = EntityId::new(index, generation);
            self.write_at(index, id, body);
            id
        } else {
            let index = self.generations.len();
            self.generations.push(0);
            let id = EntityId::new(index, 0);
            self.push(id, body);
            id
        }
    }

    pub fn remove(&mut self, id: EntityId) -> bool {
        if !self.is_valid(id) {
            return false;
        }
        let index = id.index();
        self.generations[index] = self.generations[index].wrapping_add(1);
        self.free_list.push_back(index);
        true
    }

    pub fn get(&self, id: EntityId) -> Option<BodyRef<'_>> {
        if self.is_valid(id) {
            Some(BodyRef {
                soa: self,
                index: id.index(),
            })
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<BodyMut<'_>> {
        if !self.is_valid(id) {
            return None;
        }
        let i = id.index();
        Some(BodyMut {
            id,
            body_type: &mut self.body_types[i],
            transform: &mut self.transforms[i],
            sweep: &mut self.sweeps[i],
            velocity: &mut self.velocities[i],
            acceleration: &mut self.accelerations[i],
            inverse_mass: &mut self.inverse_masses[i],
            inverse_inertia: &mut self.inverse_inertias[i],
            mass_properties: &mut self.mass_properties[i],
            material: &mut self.materials[i],
            flags: &mut self.flags[i],
            gravity_scale: &mut self.gravity_scales[i],
            linear_damping: &mut self.linear_dampings[i],
            angular_damping: &mut self.angular_dampings[i],
            under_active_time: &mut self.under_active_times[i],
        })
    }

    /// Disjoint mutable borrows of two distinct bodies, used by the contact solver to apply
    /// impulses to both sides of a contact in one pass.
    ///
    /// # Safety invariant
    /// `id_a != id_b` is checked above; indices therefore never alias the same slot, so handing
    /// out two `&mut` into the same backing `Vec`s via raw pointers is sound.
    pub fn get2_mut(&mut self, id_a: EntityId, id_b: EntityId) -> Option<(BodyMut<'_>, BodyMut<'_>)> {
        if id_a == id_b || !self.is_valid(id_a) || !self.is_valid(id_b) {
            return None;
        }
        let i_a = id_a.index();
        let i_b = id_b.index();

        unsafe {
            macro_rules! ptr {
                ($field:ident) => {
                    self.$field.as_mut_ptr()
                };
            }
            let p_types = ptr!(body_types);
            let p_trans = ptr!(transforms);
            let p_sweeps = ptr!(sweeps);
            let p_vel = ptr!(velocities);
            let p_acc = ptr!(accelerations);
            let p_im = ptr!(inverse_masses);
            let p_ii = ptr!(inverse_inertias);
            let p_mp = ptr!(mass_properties);
            let p_mat = ptr!(materials);
            let p_flags = ptr!(flags);
            let p_grav = ptr!(gravity_scales);
            let p_ld = ptr!(linear_dampings);
            let p_ad = ptr!(angular_dampings);
            let p_uat = ptr!(under_active_times);

            let a = BodyMut {
                id: id_a,
                body_type: &mut *p_types.add(i_a),
                transform: &mut *p_trans.add(i_a),
                sweep: &mut *p_sweeps.add(i_a),
                velocity: &mut *p_vel.add(i_a),
                acceleration: &mut *p_acc.add(i_a),
                inverse_mass: &mut *p_im.add(i_a),
                inverse_inertia: &mut *p_ii.add(i_a),
                mass_properties: &mut *p_mp.add(i_a),
                material: &mut *p_mat.add(i_a),
                flags: &mut *p_flags.add(i_a),
                gravity_scale: &mut *p_grav.add(i_a),
                linear_damping: &mut *p_ld.add(i_a),
                angular_damping: &mut *p_ad.add(i_a),
                under_active_time: &mut *p_uat.add(i_a),
            };
            let b = BodyMut {
                id: id_b,
                body_type: &mut *p_types.add(i_b),
                transform: &mut *p_trans.add(i_b),
                sweep: &mut *p_sweeps.add(i_b),
                velocity: &mut *p_vel.add(i_b),
                acceleration: &mut *p_acc.add(i_b),
                inverse_mass: &mut *p_im.add(i_b),
                inverse_inertia: &mut *p_ii.add(i_b),
                mass_properties: &mut *p_mp.add(i_b),
                material: &mut *p_mat.add(i_b),
                flags: &mut *p_flags.add(i_b),
                gravity_scale: &mut *p_grav.add(i_b),
                linear_damping: &mut *p_ld.add(i_b),
                angular_damping: &mut *p_ad.add(i_b),
                under_active_time: &mut *p_uat.add(i_b),
            };
            Some((a, b))
        }
    }

    pub fn len(&self) -> usize {
        self.generations.len() - self.free_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = BodyRef<'_>> {
        self.generations.iter().enumerate().filter_map(move |(idx, &gen)| {
            if self.ids[idx].generation() == gen {
                Some(BodyRef { soa: self, index: idx })
            } else {
                None
            }
        })
    }

    pub fn iter_mut(&mut self) -> SoAIterMut<'_> {
        SoAIterMut::new(self)
    }

    pub fn is_valid(&self, id: EntityId) -> bool {
        self.generations
            .get(id.index())
            .map(|&gen| gen == id.generation())
            .unwrap_or(false)
    }

    fn write_at(&mut self, index: usize, id: EntityId, body: RigidBody) {
        self.ids[index] = id;
        self.body_types[index] = body.body_type;
        self.transforms[index] = body.transform;
        self.sweeps[index] = body.sweep;
        self.velocities[index] = body.velocity;
        self.accelerations[index] = body.acceleration;
        self.inverse_masses[index] = body.inverse_mass;
        self.inverse_inertias[index] = body.inverse_inertia;
        self.mass_properties[index] = body.mass_properties;
        self.materials[index] = body.material;
        self.flags[index] = body.flags;
        self.gravity_scales[index] = body.gravity_scale;
        self.linear_dampings[index] = body.linear_damping;
        self.angular_dampings[index] = body.angular_damping;
        self.under_active_times[index] = body.under_active_time;
    }

    fn push(&mut self, id: EntityId, body: RigidBody) {
        self.ids.push(id);
        self.body_types.push(body.body_type);
        self.transforms.push(body.transform);
        self.sweeps.push(body.sweep);
        self.velocities.push(body.velocity);
        self.accelerations.push(body.acceleration);
        self.inverse_masses.push(body.inverse_mass);
        self.inverse_inertias.push(body.inverse_inertia);
        self.mass_properties.push(body.mass_properties);
        self.materials.push(body.material);
        self.flags.push(body.flags);
        self.gravity_scales.push(body.gravity_scale);
        self.linear_dampings.push(body.linear_damping);
        self.angular_dampings.push(body.angular_damping);
        self.under_active_times.push(body.under_active_time);
    }
}

/// Mutable proxy over one body's SoA columns.
pub struct BodyMut<'a> {
    pub id: EntityId,
    pub body_type: &'a mut BodyType,
    pub transform: &'a mut Transform,
    pub sweep: &'a mut Sweep,
    pub velocity: &'a mut Velocity,
    pub acceleration: &'a mut Vec2,
    pub inverse_mass: &'a mut f32,
    pub inverse_inertia: &'a mut f32,
    pub mass_properties: &'a mut MassProperties,
    pub material: &'a mut super::types::Material,
    pub flags: &'a mut BodyFlags,
    pub gravity_scale: &'a mut f32,
    pub linear_damping: &'a mut f32,
    pub angular_damping: &'a mut f32,
    pub under_active_time: &'a mut f32,
}

impl<'a> BodyMut<'a> {
    pub fn is_static(&self) -> bool {
        matches!(self.body_type, BodyType::Static)
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.body_type, BodyType::Dynamic)
    }

    pub fn world_center(&self) -> Vec2 {
        self.transform.transform_point(self.sweep.local_center)
    }

    pub fn apply_impulse(&mut self, impulse: Vec2, point: Vec2) {
        if !self.is_dynamic() {
            return;
        }
        self.velocity.linear += impulse * (*self.inverse_mass);
        let r = point - self.world_center();
        self.velocity.angular += (*self.inverse_inertia) * super::rigidbody::cross_vec_vec(r, impulse);
        self.flags.awake = true;
        *self.under_active_time = 0.0;
    }

    /// Applies an impulse at a pre-computed body-relative arm `r` (world center to point),
    /// skipping the `point - world_center()` subtraction `apply_impulse` does. Used by joint and
    /// contact solvers that already cache `r` across iterations.
    pub fn apply_impulse_at(&mut self, impulse: Vec2, r: Vec2) {
        if !self.is_dynamic() {
            return;
        }
        self.velocity.linear += impulse * (*self.inverse_mass);
        self.velocity.angular += (*self.inverse_inertia) * super::rigidbody::cross_vec_vec(r, impulse);
    }

    pub fn apply_force(&mut self, force: Vec2) {
        if !self.is_dynamic() {
            return;
        }
        *self.acceleration += force * (*self.inverse_mass);
    }

    pub fn set_velocity(&mut self, linear: Vec2, angular: f32) {
        self.velocity.linear = linear;
        self.velocity.angular = angular;
    }

    pub fn set_awake(&mut self, awake: bool) {
        self.flags.awake = awake;
        if awake {
            *self.under_active_time = 0.0;
        }
    }

    pub fn to_rigid_body(&self) -> RigidBody {
        RigidBody {
            id: self.id,
            body_type: *self.body_type,
            transform: *self.transform,
            sweep: *self.sweep,
            velocity: *self.velocity,
            acceleration: *self.acceleration,
            inverse_mass: *self.inverse_mass,
            inverse_inertia: *self.inverse_inertia,
            mass_properties: *self.mass_properties,
            material: *self.material,
            gravity_scale: *self.gravity_scale,
            linear_damping: *self.linear_damping,
            angular_damping: *self.angular_damping,
            flags: *self.flags,
            under_active_time: *self.under_active_time,
            fixtures: Vec::new(),
            contact_edges: Vec::new(),
            joint_edges: Vec::new(),
        }
    }
}

pub struct SoAIterMut<'a> {
    len: usize,
    pos: usize,
    generations: &'a [u32],
    ids: &'a [EntityId],

    ptr_types: *mut BodyType,
    ptr_transforms: *mut Transform,
    ptr_sweeps: *mut Sweep,
    ptr_velocities: *mut Velocity,
    ptr_accelerations: *mut Vec2,
    ptr_inv_mass: *mut f32,
    ptr_inv_inertia: *mut f32,
    ptr_mass_props: *mut MassProperties,
    ptr_materials: *mut super::types::Material,
    ptr_flags: *mut BodyFlags,
    ptr_gravity: *mut f32,
    ptr_linear_damping: *mut f32,
    ptr_angular_damping: *mut f32,
    ptr_under_active: *mut f32,

    _marker: std::marker::PhantomData<&'a mut BodiesSoA>,
}

impl<'a> SoAIterMut<'a> {
    fn new(soa: &'a mut BodiesSoA) -> Self {
        Self {
            len: soa.generations.len(),
            pos: 0,
            generations: &soa.generations,
            ids: &soa.ids,

            ptr_types: soa.body_types.as_mut_ptr(),
            ptr_transforms: soa.transforms.as_mut_ptr(),
            ptr_sweeps: soa.sweeps.as_mut_ptr(),
            ptr_velocities: soa.velocities.as_mut_ptr(),
            ptr_accelerations: soa.accelerations.as_mut_ptr(),
            ptr_inv_mass: soa.inverse_masses.as_mut_ptr(),
            ptr_inv_inertia: soa.inverse_inertias.as_mut_ptr(),
            ptr_mass_props: soa.mass_properties.as_mut_ptr(),
            ptr_materials: soa.materials.as_mut_ptr(),
            ptr_flags: soa.flags.as_mut_ptr(),
            ptr_gravity: soa.gravity_scales.as_mut_ptr(),
            ptr_linear_damping: soa.linear_dampings.as_mut_ptr(),
            ptr_angular_damping: soa.angular_dampings.as_mut_ptr(),
            ptr_under_active: soa.under_active_times.as_mut_ptr(),

            _marker: std::marker::PhantomData,
        }
    }
}

impl<'a> Iterator for SoAIterMut<'a> {
    type Item = BodyMut<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.len {
            let i = self.pos;
            self.pos += 1;
            if self.generations[i] != self.ids[i].generation() {
                continue;
            }
            unsafe {
                return Some(BodyMut {
                    id: self.ids[i],
                    body_type: &mut *self.ptr_types.add(i),
                    transform: &mut *self.ptr_transforms.add(i),
                    sweep: &mut *self.ptr_sweeps.add(i),
                    velocity: &mut *self.ptr_velocities.add(i),
                    acceleration: &mut *self.ptr_accelerations.add(i),
                    inverse_mass: &mut *self.ptr_inv_mass.add(i),
                    inverse_inertia: &mut *self.ptr_inv_inertia.add(i),
                    mass_properties: &mut *self.ptr_mass_props.add(i),
                    material: &mut *self.ptr_materials.add(i),
                    flags: &mut *self.ptr_flags.add(i),
                    gravity_scale: &mut *self.ptr_gravity.add(i),
                    linear_damping: &mut *self.ptr_linear_damping.add(i),
                    angular_damping: &mut *self.ptr_angular_damping.add(i),
                    under_active_time: &mut *self.ptr_under_active.add(i),
                });
            }
        }
        None
    }
}

pub struct BodyRef<'a> {
    soa: &'a BodiesSoA,
    index: usize,
}

impl<'a> BodyRef<'a> {
    pub fn id(&self) -> EntityId {
        self.soa.ids[self.index]
    }
    pub fn body_type(&self) -> BodyType {
        self.soa.body_types[self.index]
    }
    pub fn transform(&self) -> &Transform {
        &self.soa.transforms[self.index]
    }
    pub fn sweep(&self) -> &Sweep {
        &self.soa.sweeps[self.index]
    }
    pub fn velocity(&self) -> &Velocity {
        &self.soa.velocities[self.index]
    }
    pub fn inverse_mass(&self) -> f32 {
        self.soa.inverse_masses[self.index]
    }
    pub fn inverse_inertia(&self) -> f32 {
        self.soa.inverse_inertias[self.index]
    }
    pub fn is_static(&self) -> bool {
        matches!(self.body_type(), BodyType::Static)
    }
    pub fn is_dynamic(&self) -> bool {
        matches!(self.body_type(), BodyType::Dynamic)
    }
    pub fn is_awake(&self) -> bool {
        self.soa.flags[self.index].awake
    }
    pub fn allow_sleep(&self) -> bool {
        self.soa.flags[self.index].allow_sleep
    }
    pub fn material(&self) -> &super::types::Material {
        &self.soa.materials[self.index]
    }
    pub fn under_active_time(&self) -> f32 {
        self.soa.under_active_times[self.index]
    }

    pub fn to_rigid_body(&self) -> RigidBody {
        RigidBody {
            id: self.id(),
            body_type: self.body_type(),
            transform: *self.transform(),
            sweep: *self.sweep(),
            velocity: *self.velocity(),
            acceleration: self.soa.accelerations[self.index],
            inverse_mass: self.inverse_mass(),
            inverse_inertia: self.inverse_inertia(),
            mass_properties: self.soa.mass_properties[self.index],
            material: *self.material(),
            gravity_scale: self.soa.gravity_scales[self.index],
            linear_damping: self.soa.linear_dampings[self.index],
            angular_damping: self.soa.angular_dampings[self.index],
            flags: self.soa.flags[self.index],
            under_active_time: self.under_active_time(),
            fixtures: Vec::new(),
            contact_edges: Vec::new(),
            joint_edges: Vec::new(),
        }
    }
}
