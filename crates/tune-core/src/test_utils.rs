//! Shared helpers for unit tests.
//!
//! [`FakeWorld`] is an in-memory [`PhysicsBackend`]: bodies fall ballistically,
//! contacts are detected by overlap but never resolved, so a marble passes
//! through pieces unless the router redirects it. Contacts can also be
//! scripted directly.

use std::collections::{BTreeMap, HashSet};

use glam::{Quat, Vec3};

use crate::assets::AssetLibrary;
use crate::audio::NoteLog;
use crate::backend::{
    BodyDesc, BodyError, BodyHandle, BodyKind, BodyState, ColliderHandle, ColliderShape,
    CollisionStarted, PhysicsBackend,
};
use crate::config::SandboxConfig;
use crate::model::{EntityId, Model, ShapeKind, Transform};
use crate::physics::RapierWorld;
use crate::sandbox::Sandbox;

/// Collider handles live in their own range so they never alias body handles.
const COLLIDER_BIT: u64 = 1 << 40;

struct FakeBody {
    kind: BodyKind,
    position: Vec3,
    rotation: Quat,
    linvel: Vec3,
    angvel: Vec3,
    shape: ColliderShape,
}

pub(crate) struct FakeWorld {
    gravity: Vec3,
    next_id: u64,
    bodies: BTreeMap<u64, FakeBody>,
    touching: HashSet<(u64, u64)>,
    scripted: Vec<CollisionStarted>,
    pub steps: u64,
}

impl FakeWorld {
    pub fn collider_of(handle: BodyHandle) -> ColliderHandle {
        ColliderHandle(handle.0 | COLLIDER_BIT)
    }

    /// Queues a contact between two bodies, reported by the next step.
    pub fn script_contact(&mut self, a: BodyHandle, b: BodyHandle) {
        self.scripted.push(CollisionStarted {
            collider1: Self::collider_of(a),
            collider2: Self::collider_of(b),
        });
    }

    fn overlaps(ball: &FakeBody, other: &FakeBody) -> bool {
        let ColliderShape::Ball { radius } = ball.shape else {
            return false;
        };
        let local = other.rotation.inverse() * (ball.position - other.position);
        let closest = match &other.shape {
            ColliderShape::Ball { radius: other_radius } => {
                return local.length() <= radius + other_radius;
            }
            ColliderShape::Cuboid { half_extents } => local.clamp(-*half_extents, *half_extents),
            ColliderShape::Cylinder {
                half_height,
                radius: cylinder_radius,
            } => {
                let radial = Vec3::new(local.x, 0.0, local.z).clamp_length_max(*cylinder_radius);
                Vec3::new(radial.x, local.y.clamp(-half_height, *half_height), radial.z)
            }
            ColliderShape::TriMesh { vertices, .. } => {
                let min = vertices.iter().copied().fold(Vec3::splat(f32::MAX), Vec3::min);
                let max = vertices.iter().copied().fold(Vec3::splat(f32::MIN), Vec3::max);
                local.clamp(min, max)
            }
        };
        local.distance(closest) <= radius
    }
}

impl PhysicsBackend for FakeWorld {
    fn with_gravity(gravity: Vec3) -> Self {
        Self {
            gravity,
            next_id: 1,
            bodies: BTreeMap::new(),
            touching: HashSet::new(),
            scripted: Vec::new(),
            steps: 0,
        }
    }

    fn gravity(&self) -> Vec3 {
        self.gravity
    }

    fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    fn insert_body(&mut self, desc: &BodyDesc) -> Result<BodyHandle, BodyError> {
        if let ColliderShape::TriMesh { indices, .. } = &desc.shape
            && indices.is_empty()
        {
            return Err(BodyError::MissingIndexBuffer);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.bodies.insert(
            id,
            FakeBody {
                kind: desc.kind,
                position: desc.position,
                rotation: desc.rotation,
                linvel: Vec3::ZERO,
                angvel: Vec3::ZERO,
                shape: desc.shape.clone(),
            },
        );
        Ok(BodyHandle(id))
    }

    fn remove_body(&mut self, handle: BodyHandle) -> bool {
        self.touching.retain(|(a, b)| *a != handle.0 && *b != handle.0);
        self.bodies.remove(&handle.0).is_some()
    }

    fn body_state(&self, handle: BodyHandle) -> Option<BodyState> {
        self.bodies.get(&handle.0).map(|body| BodyState {
            position: body.position,
            rotation: body.rotation,
            linvel: body.linvel,
            angvel: body.angvel,
        })
    }

    fn set_velocity(&mut self, handle: BodyHandle, linvel: Vec3, angvel: Vec3) -> bool {
        match self.bodies.get_mut(&handle.0) {
            Some(body) => {
                body.linvel = linvel;
                body.angvel = angvel;
                true
            }
            None => false,
        }
    }

    fn set_rotation(&mut self, handle: BodyHandle, rotation: Quat) -> bool {
        match self.bodies.get_mut(&handle.0) {
            Some(body) => {
                body.rotation = rotation;
                true
            }
            None => false,
        }
    }

    fn is_dynamic(&self, handle: BodyHandle) -> bool {
        self.bodies
            .get(&handle.0)
            .is_some_and(|body| body.kind == BodyKind::Dynamic)
    }

    fn collider_parent(&self, collider: ColliderHandle) -> Option<BodyHandle> {
        if collider.0 & COLLIDER_BIT == 0 {
            return None;
        }
        let id = collider.0 & !COLLIDER_BIT;
        self.bodies.contains_key(&id).then_some(BodyHandle(id))
    }

    fn step(&mut self, dt: f32) -> Vec<CollisionStarted> {
        for body in self.bodies.values_mut() {
            if body.kind == BodyKind::Dynamic {
                body.linvel += self.gravity * dt;
                body.position += body.linvel * dt;
            }
        }
        self.steps += 1;

        let mut events = std::mem::take(&mut self.scripted);
        let mut now_touching = HashSet::new();
        for (&a, body_a) in &self.bodies {
            if body_a.kind != BodyKind::Dynamic {
                continue;
            }
            for (&b, body_b) in &self.bodies {
                if a == b || !Self::overlaps(body_a, body_b) {
                    continue;
                }
                let pair = (a.min(b), a.max(b));
                if now_touching.insert(pair) && !self.touching.contains(&pair) {
                    events.push(CollisionStarted {
                        collider1: Self::collider_of(BodyHandle(pair.0)),
                        collider2: Self::collider_of(BodyHandle(pair.1)),
                    });
                }
            }
        }
        self.touching = now_touching;
        events
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }
}

/// A model with an explicit scale, not yet simulated.
pub(crate) fn model_at(id: u64, shape: ShapeKind, position: Vec3, scale: Vec3) -> Model {
    Model::new(
        EntityId(id),
        shape,
        Transform {
            position,
            rotation: Quat::IDENTITY,
            scale,
        },
    )
}

/// Sandbox on the fake world with the built-in asset library.
pub(crate) fn fake_sandbox() -> (Sandbox<FakeWorld>, NoteLog) {
    fake_sandbox_with(SandboxConfig::default())
}

pub(crate) fn fake_sandbox_with(config: SandboxConfig) -> (Sandbox<FakeWorld>, NoteLog) {
    let log = NoteLog::new();
    let sandbox = Sandbox::new(
        config,
        Box::new(AssetLibrary::builtin()),
        Box::new(log.clone()),
    );
    (sandbox, log)
}

/// Sandbox on the rapier world.
pub(crate) fn rapier_sandbox() -> (Sandbox<RapierWorld>, NoteLog) {
    let log = NoteLog::new();
    let sandbox = Sandbox::new(
        SandboxConfig::default(),
        Box::new(AssetLibrary::builtin()),
        Box::new(log.clone()),
    );
    (sandbox, log)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ball(position: Vec3) -> BodyDesc {
        BodyDesc {
            kind: BodyKind::Dynamic,
            position,
            rotation: Quat::IDENTITY,
            shape: ColliderShape::Ball { radius: 1.0 },
            restitution: 0.0,
            friction: 0.0,
        }
    }

    fn block(position: Vec3) -> BodyDesc {
        BodyDesc {
            kind: BodyKind::Fixed,
            position,
            rotation: Quat::IDENTITY,
            shape: ColliderShape::Cuboid {
                half_extents: Vec3::new(4.0, 0.5, 4.0),
            },
            restitution: 0.0,
            friction: 0.0,
        }
    }

    #[test]
    fn test_fake_world_reports_contact_once() {
        let mut world = FakeWorld::with_gravity(Vec3::new(0.0, -10.0, 0.0));
        let marble = world.insert_body(&ball(Vec3::new(0.0, 2.0, 0.0))).unwrap();
        let floor = world.insert_body(&block(Vec3::ZERO)).unwrap();

        let mut events = Vec::new();
        for _ in 0..60 {
            events.extend(world.step(1.0 / 60.0));
        }

        assert_eq!(events.len(), 1);
        assert_eq!(world.collider_parent(events[0].collider1), Some(marble));
        assert_eq!(world.collider_parent(events[0].collider2), Some(floor));
    }

    #[test]
    fn test_fake_world_scripted_contact() {
        let mut world = FakeWorld::with_gravity(Vec3::ZERO);
        let a = world.insert_body(&ball(Vec3::new(0.0, 50.0, 0.0))).unwrap();
        let b = world.insert_body(&block(Vec3::ZERO)).unwrap();
        world.script_contact(a, b);
        assert_eq!(world.step(0.1).len(), 1);
        assert!(world.step(0.1).is_empty());
    }
}
