//! Physics capability consumed by the gameplay core.
//!
//! The core never talks to a physics engine directly. Everything it needs
//! (body creation, state queries, velocity overrides, stepping with
//! collision-start events) goes through [`PhysicsBackend`], so the same
//! routing code drives the live world, the shadow world of the trajectory
//! preview and the in-memory fake used by tests.

use glam::{Quat, Vec3};

/// Stable integer handle of a simulated body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub u64);

/// Stable integer handle of a collider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColliderHandle(pub u64);

/// Errors raised while building a body.
#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    #[error("Unknown shape category: '{0}'")]
    UnknownShape(String),

    #[error("Curve mesh has no index buffer")]
    MissingIndexBuffer,

    #[error("Invalid collision mesh: {0}")]
    InvalidMesh(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Moved by the solver; continuous collision detection enabled.
    Dynamic,
    /// Never moves.
    Fixed,
}

/// Collider geometry, in body-local coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum ColliderShape {
    Ball {
        radius: f32,
    },
    Cuboid {
        half_extents: Vec3,
    },
    /// Axis along local Y.
    Cylinder {
        half_height: f32,
        radius: f32,
    },
    TriMesh {
        vertices: Vec<Vec3>,
        indices: Vec<[u32; 3]>,
    },
}

/// Everything needed to create one body with its single collider.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDesc {
    pub kind: BodyKind,
    pub position: Vec3,
    pub rotation: Quat,
    pub shape: ColliderShape,
    pub restitution: f32,
    pub friction: f32,
}

/// Pose and velocities of a body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub position: Vec3,
    pub rotation: Quat,
    pub linvel: Vec3,
    pub angvel: Vec3,
}

/// Two colliders started touching during a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionStarted {
    pub collider1: ColliderHandle,
    pub collider2: ColliderHandle,
}

/// A rigid-body world.
pub trait PhysicsBackend: Sized {
    /// Creates an empty world.
    fn with_gravity(gravity: Vec3) -> Self;

    fn gravity(&self) -> Vec3;

    fn set_gravity(&mut self, gravity: Vec3);

    /// Creates a body and its collider.
    fn insert_body(&mut self, desc: &BodyDesc) -> Result<BodyHandle, BodyError>;

    /// Removes a body and its collider. Returns `false` if it was not present.
    fn remove_body(&mut self, handle: BodyHandle) -> bool;

    fn contains_body(&self, handle: BodyHandle) -> bool {
        self.body_state(handle).is_some()
    }

    fn body_state(&self, handle: BodyHandle) -> Option<BodyState>;

    /// Overwrites both velocities and wakes the body.
    fn set_velocity(&mut self, handle: BodyHandle, linvel: Vec3, angvel: Vec3) -> bool;

    fn set_rotation(&mut self, handle: BodyHandle, rotation: Quat) -> bool;

    fn is_dynamic(&self, handle: BodyHandle) -> bool;

    /// Resolves the body a collider is attached to.
    fn collider_parent(&self, collider: ColliderHandle) -> Option<BodyHandle>;

    /// Advances the world by `dt` and returns the contacts that started during the step.
    fn step(&mut self, dt: f32) -> Vec<CollisionStarted>;

    fn body_count(&self) -> usize;
}
