//! Physics simulation using `Rapier3D` with deterministic behavior.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use glam::{Quat, Vec3};
use parking_lot::Mutex;
use rapier3d::prelude::*;

use crate::backend::{
    BodyDesc, BodyError, BodyHandle, BodyKind, BodyState, ColliderHandle as TuneColliderHandle,
    ColliderShape, CollisionStarted, PhysicsBackend,
};
use crate::config::GRAVITY_SCALE;

/// Fixed timestep for physics simulation (60Hz).
pub const PHYSICS_DT: f32 = 1.0 / 60.0;

/// Default gravity: earth gravity scaled to wall units, pointing down.
pub fn default_gravity() -> Vec3 {
    Vec3::new(0.0, -9.81 * GRAVITY_SCALE, 0.0)
}

/// Collects rapier collision events raised during a step.
struct CollisionCollector {
    events: Mutex<Vec<CollisionEvent>>,
}

impl CollisionCollector {
    fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    fn drain(&self) -> Vec<CollisionEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl EventHandler for CollisionCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        self.events.lock().push(event);
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

/// Physics world containing all `Rapier3D` components.
pub struct RapierWorld {
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub integration_parameters: IntegrationParameters,
    pub physics_pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,
    pub ccd_solver: CCDSolver,
    pub gravity: Vector,
    pub frame: u64,
    collector: CollisionCollector,
}

impl Default for RapierWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RapierWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RapierWorld")
            .field("frame", &self.frame)
            .field("rigid_body_count", &self.rigid_body_set.len())
            .field("collider_count", &self.collider_set.len())
            .finish_non_exhaustive()
    }
}

impl RapierWorld {
    pub fn new() -> Self {
        <Self as PhysicsBackend>::with_gravity(default_gravity())
    }

    /// Computes a hash of the current physics state, used to check that two
    /// runs fed the same input stayed identical.
    pub fn compute_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.frame.hash(&mut hasher);

        for (handle, body) in self.rigid_body_set.iter() {
            let (index, generation) = handle.into_raw_parts();
            index.hash(&mut hasher);
            generation.hash(&mut hasher);

            let pos = body.translation();
            let rot = body.rotation();
            let linvel = body.linvel();
            let angvel = body.angvel();
            for value in [
                pos.x, pos.y, pos.z, rot.x, rot.y, rot.z, rot.w, linvel.x, linvel.y, linvel.z,
                angvel.x, angvel.y, angvel.z,
            ] {
                hash_f32(value, &mut hasher);
            }
        }

        hasher.finish()
    }

    /// Returns the number of steps taken so far.
    pub fn current_frame(&self) -> u64 {
        self.frame
    }

    fn rigid_body_handle(handle: BodyHandle) -> RigidBodyHandle {
        let (index, generation) = unpack_handle(handle.0);
        RigidBodyHandle::from_raw_parts(index, generation)
    }

    fn build_collider(desc: &BodyDesc) -> Result<Collider, BodyError> {
        let builder = match &desc.shape {
            ColliderShape::Ball { radius } => ColliderBuilder::ball(*radius),
            ColliderShape::Cuboid { half_extents } => {
                ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            }
            ColliderShape::Cylinder {
                half_height,
                radius,
            } => ColliderBuilder::cylinder(*half_height, *radius),
            ColliderShape::TriMesh { vertices, indices } => {
                if indices.is_empty() {
                    return Err(BodyError::MissingIndexBuffer);
                }
                let vertices = vertices.iter().map(|v| to_vector(*v)).collect();
                ColliderBuilder::trimesh(vertices, indices.clone())
                    .map_err(|e| BodyError::InvalidMesh(e.to_string()))?
            }
        };

        Ok(builder
            .restitution(desc.restitution)
            .friction(desc.friction)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build())
    }
}

impl PhysicsBackend for RapierWorld {
    fn with_gravity(gravity: Vec3) -> Self {
        let integration_parameters = IntegrationParameters {
            dt: PHYSICS_DT,
            ..Default::default()
        };

        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            integration_parameters,
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            gravity: to_vector(gravity),
            frame: 0,
            collector: CollisionCollector::new(),
        }
    }

    fn gravity(&self) -> Vec3 {
        Vec3::new(self.gravity.x, self.gravity.y, self.gravity.z)
    }

    fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = to_vector(gravity);
    }

    fn insert_body(&mut self, desc: &BodyDesc) -> Result<BodyHandle, BodyError> {
        // Build the collider first so a bad mesh leaves no orphan body behind.
        let collider = Self::build_collider(desc)?;

        let builder = match desc.kind {
            BodyKind::Dynamic => RigidBodyBuilder::dynamic().ccd_enabled(true),
            BodyKind::Fixed => RigidBodyBuilder::fixed(),
        };
        let body = builder
            .translation(to_vector(desc.position))
            .rotation(to_vector(desc.rotation.to_scaled_axis()))
            .build();

        let handle = self.rigid_body_set.insert(body);
        self.collider_set
            .insert_with_parent(collider, handle, &mut self.rigid_body_set);

        let (index, generation) = handle.into_raw_parts();
        Ok(BodyHandle(pack_handle(index, generation)))
    }

    fn remove_body(&mut self, handle: BodyHandle) -> bool {
        self.rigid_body_set
            .remove(
                Self::rigid_body_handle(handle),
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                true,
            )
            .is_some()
    }

    fn body_state(&self, handle: BodyHandle) -> Option<BodyState> {
        let body = self.rigid_body_set.get(Self::rigid_body_handle(handle))?;
        let pos = body.translation();
        let rot = body.rotation();
        let linvel = body.linvel();
        let angvel = body.angvel();
        Some(BodyState {
            position: Vec3::new(pos.x, pos.y, pos.z),
            rotation: Quat::from_xyzw(rot.x, rot.y, rot.z, rot.w),
            linvel: Vec3::new(linvel.x, linvel.y, linvel.z),
            angvel: Vec3::new(angvel.x, angvel.y, angvel.z),
        })
    }

    fn set_velocity(&mut self, handle: BodyHandle, linvel: Vec3, angvel: Vec3) -> bool {
        let Some(body) = self.rigid_body_set.get_mut(Self::rigid_body_handle(handle)) else {
            return false;
        };
        body.set_linvel(to_vector(linvel), true);
        body.set_angvel(to_vector(angvel), true);
        true
    }

    fn set_rotation(&mut self, handle: BodyHandle, rotation: Quat) -> bool {
        let Some(body) = self.rigid_body_set.get_mut(Self::rigid_body_handle(handle)) else {
            return false;
        };
        body.set_rotation(Rotation::from_scaled_axis(to_vector(rotation.to_scaled_axis())), true);
        true
    }

    fn is_dynamic(&self, handle: BodyHandle) -> bool {
        self.rigid_body_set
            .get(Self::rigid_body_handle(handle))
            .is_some_and(RigidBody::is_dynamic)
    }

    fn collider_parent(&self, collider: TuneColliderHandle) -> Option<BodyHandle> {
        let (index, generation) = unpack_handle(collider.0);
        let parent = self
            .collider_set
            .get(ColliderHandle::from_raw_parts(index, generation))?
            .parent()?;
        let (index, generation) = parent.into_raw_parts();
        Some(BodyHandle(pack_handle(index, generation)))
    }

    fn step(&mut self, dt: f32) -> Vec<CollisionStarted> {
        self.integration_parameters.dt = dt;
        self.physics_pipeline.step(
            self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            &(),
            &self.collector,
        );
        self.frame += 1;

        self.collector
            .drain()
            .into_iter()
            .filter_map(|event| match event {
                CollisionEvent::Started(h1, h2, _flags) => Some(CollisionStarted {
                    collider1: collider_handle(h1),
                    collider2: collider_handle(h2),
                }),
                CollisionEvent::Stopped(..) => None,
            })
            .collect()
    }

    fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }
}

fn to_vector(v: Vec3) -> Vector {
    Vector::new(v.x, v.y, v.z)
}

fn collider_handle(handle: ColliderHandle) -> TuneColliderHandle {
    let (index, generation) = handle.into_raw_parts();
    TuneColliderHandle(pack_handle(index, generation))
}

/// Packs arena index and generation into one integer handle.
fn pack_handle(index: u32, generation: u32) -> u64 {
    (u64::from(generation) << 32) | u64::from(index)
}

#[allow(clippy::cast_possible_truncation)]
fn unpack_handle(raw: u64) -> (u32, u32) {
    (raw as u32, (raw >> 32) as u32)
}

/// Hashes a f32 value by converting to bits.
fn hash_f32(value: f32, hasher: &mut impl Hasher) {
    value.to_bits().hash(hasher);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marble_desc(position: Vec3) -> BodyDesc {
        BodyDesc {
            kind: BodyKind::Dynamic,
            position,
            rotation: Quat::IDENTITY,
            shape: ColliderShape::Ball { radius: 1.0 },
            restitution: 0.0,
            friction: 0.3,
        }
    }

    fn plank_desc(position: Vec3) -> BodyDesc {
        BodyDesc {
            kind: BodyKind::Fixed,
            position,
            rotation: Quat::IDENTITY,
            shape: ColliderShape::Cuboid {
                half_extents: Vec3::new(5.0, 0.5, 5.0),
            },
            restitution: 0.0,
            friction: 0.5,
        }
    }

    #[test]
    fn test_world_creation() {
        let world = RapierWorld::new();
        assert_eq!(world.frame, 0);
        assert_eq!(world.body_count(), 0);
        assert_eq!(world.integration_parameters.dt, PHYSICS_DT);
    }

    #[test]
    fn test_handle_packing() {
        let raw = pack_handle(7, 3);
        assert_eq!(unpack_handle(raw), (7, 3));
    }

    #[test]
    fn test_dynamic_body_falls() {
        let mut world = RapierWorld::new();
        let handle = world.insert_body(&marble_desc(Vec3::new(0.0, 10.0, 0.0))).unwrap();

        for _ in 0..10 {
            world.step(PHYSICS_DT);
        }

        let state = world.body_state(handle).unwrap();
        assert!(state.position.y < 10.0);
        assert!(state.linvel.y < 0.0);
        assert!(world.is_dynamic(handle));
    }

    #[test]
    fn test_fixed_body_stays() {
        let mut world = RapierWorld::new();
        let handle = world.insert_body(&plank_desc(Vec3::new(0.0, 5.0, 0.0))).unwrap();
        world.step(PHYSICS_DT);
        let state = world.body_state(handle).unwrap();
        assert_eq!(state.position, Vec3::new(0.0, 5.0, 0.0));
        assert!(!world.is_dynamic(handle));
    }

    #[test]
    fn test_remove_body() {
        let mut world = RapierWorld::new();
        let handle = world.insert_body(&plank_desc(Vec3::ZERO)).unwrap();
        assert!(world.remove_body(handle));
        assert!(!world.remove_body(handle));
        assert!(world.body_state(handle).is_none());
        assert_eq!(world.collider_set.len(), 0);
    }

    #[test]
    fn test_collision_started_resolves_to_bodies() {
        let mut world = RapierWorld::new();
        let marble = world.insert_body(&marble_desc(Vec3::new(0.0, 3.0, 0.0))).unwrap();
        let plank = world.insert_body(&plank_desc(Vec3::ZERO)).unwrap();

        let mut started = Vec::new();
        for _ in 0..120 {
            started.extend(world.step(PHYSICS_DT));
            if !started.is_empty() {
                break;
            }
        }

        let event = started.first().expect("marble should land on the plank");
        let mut parents = [
            world.collider_parent(event.collider1).unwrap(),
            world.collider_parent(event.collider2).unwrap(),
        ];
        parents.sort();
        let mut expected = [marble, plank];
        expected.sort();
        assert_eq!(parents, expected);
    }

    #[test]
    fn test_set_velocity_overrides() {
        let mut world = RapierWorld::new();
        let handle = world.insert_body(&marble_desc(Vec3::ZERO)).unwrap();
        assert!(world.set_velocity(handle, Vec3::new(3.0, 4.0, 0.0), Vec3::ZERO));
        let state = world.body_state(handle).unwrap();
        assert_eq!(state.linvel, Vec3::new(3.0, 4.0, 0.0));
        assert!(!world.set_velocity(BodyHandle(u64::MAX), Vec3::ZERO, Vec3::ZERO));
    }

    #[test]
    fn test_trimesh_without_indices_is_rejected() {
        let mut world = RapierWorld::new();
        let desc = BodyDesc {
            shape: ColliderShape::TriMesh {
                vertices: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
                indices: Vec::new(),
            },
            ..plank_desc(Vec3::ZERO)
        };
        assert!(matches!(world.insert_body(&desc), Err(BodyError::MissingIndexBuffer)));
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn test_deterministic_simulation() {
        let mut world1 = RapierWorld::new();
        let mut world2 = RapierWorld::new();

        for world in [&mut world1, &mut world2] {
            world.insert_body(&marble_desc(Vec3::new(0.5, 20.0, 0.0))).unwrap();
            world.insert_body(&plank_desc(Vec3::ZERO)).unwrap();
        }

        for _ in 0..100 {
            world1.step(PHYSICS_DT);
            world2.step(PHYSICS_DT);
        }

        assert_eq!(world1.compute_hash(), world2.compute_hash());
        assert_eq!(world1.current_frame(), 100);
    }
}
