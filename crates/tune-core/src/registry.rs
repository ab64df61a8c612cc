//! Entity to body bookkeeping.
//!
//! Every simulated entity owns exactly one body with a single collider. The
//! registry builds bodies from the entity's visual transform and keeps the
//! reverse lookup used to resolve collision events back to entities.

use std::collections::HashMap;

use crate::assets::AssetProvider;
use crate::backend::{BodyDesc, BodyError, BodyHandle, BodyKind, ColliderShape, PhysicsBackend};
use crate::model::{EntityId, Model, ShapeKind};

/// Marbles never bounce; every jump is a solved launch.
pub const MARBLE_RESTITUTION: f32 = 0.0;
pub const MARBLE_FRICTION: f32 = 0.3;
pub const PIECE_RESTITUTION: f32 = 0.0;
pub const PIECE_FRICTION: f32 = 0.5;
/// Curves guide the marble along their surface.
pub const CURVE_FRICTION: f32 = 0.1;

/// Builds the body description of an entity.
///
/// Returns `Ok(None)` for shapes that are never simulated.
pub fn body_desc(model: &Model, assets: &dyn AssetProvider) -> Result<Option<BodyDesc>, BodyError> {
    let scale = model.transform.scale;
    let (kind, shape, restitution, friction) = match &model.shape {
        ShapeKind::Decoration(_) => return Ok(None),
        ShapeKind::Other(name) => return Err(BodyError::UnknownShape(name.clone())),
        ShapeKind::Marble => (
            BodyKind::Dynamic,
            ColliderShape::Ball { radius: scale.x },
            MARBLE_RESTITUTION,
            MARBLE_FRICTION,
        ),
        ShapeKind::Plank => (
            BodyKind::Fixed,
            ColliderShape::Cuboid { half_extents: scale },
            PIECE_RESTITUTION,
            PIECE_FRICTION,
        ),
        ShapeKind::Cylinder => (
            BodyKind::Fixed,
            ColliderShape::Cylinder {
                half_height: scale.y,
                radius: scale.x,
            },
            PIECE_RESTITUTION,
            PIECE_FRICTION,
        ),
        ShapeKind::Curve => {
            let mesh = assets
                .prototype(model.shape.name())
                .and_then(|prototype| prototype.mesh.as_ref())
                .ok_or_else(|| BodyError::InvalidMesh("curve prototype has no mesh".to_string()))?;
            let indices = mesh.indices.clone().ok_or(BodyError::MissingIndexBuffer)?;
            let vertices = mesh.vertices.iter().map(|v| *v * scale).collect();
            (
                BodyKind::Fixed,
                ColliderShape::TriMesh { vertices, indices },
                PIECE_RESTITUTION,
                CURVE_FRICTION,
            )
        }
    };

    Ok(Some(BodyDesc {
        kind,
        position: model.transform.position,
        rotation: model.transform.rotation,
        shape,
        restitution,
        friction,
    }))
}

#[derive(Debug, Default)]
pub struct BodyRegistry {
    entities: HashMap<BodyHandle, EntityId>,
}

impl BodyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the body of an entity if it has none.
    ///
    /// Shapes the physics layer cannot build are logged and left without a
    /// body; the entity itself stays in the scene.
    pub fn create_body<B: PhysicsBackend>(
        &mut self,
        world: &mut B,
        model: &mut Model,
        assets: &dyn AssetProvider,
    ) -> Option<BodyHandle> {
        if let Some(handle) = model.body {
            return Some(handle);
        }

        let desc = match body_desc(model, assets) {
            Ok(Some(desc)) => desc,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("[registry] {} ({}) left without body: {}", model.id, model.shape, e);
                return None;
            }
        };

        match world.insert_body(&desc) {
            Ok(handle) => {
                self.entities.insert(handle, model.id);
                model.body = Some(handle);
                tracing::debug!("[registry] {} ({}) -> body {:?}", model.id, model.shape, handle);
                Some(handle)
            }
            Err(e) => {
                tracing::warn!("[registry] {} ({}) left without body: {}", model.id, model.shape, e);
                None
            }
        }
    }

    /// Frees the body of an entity. Returns the removed handle.
    pub fn remove_body<B: PhysicsBackend>(
        &mut self,
        world: &mut B,
        model: &mut Model,
    ) -> Option<BodyHandle> {
        let handle = model.body.take()?;
        self.entities.remove(&handle);
        world.remove_body(handle);
        Some(handle)
    }

    /// Pushes the entity's orientation into its body.
    ///
    /// Only marbles are rotated in place; fixed bodies and curve meshes are
    /// rebuilt. Returns the handle the entity ends up with.
    pub fn update_rotation<B: PhysicsBackend>(
        &mut self,
        world: &mut B,
        model: &mut Model,
        assets: &dyn AssetProvider,
    ) -> Option<BodyHandle> {
        let handle = model.body?;
        if world.is_dynamic(handle) && model.shape != ShapeKind::Curve {
            world.set_rotation(handle, model.transform.rotation);
            return Some(handle);
        }

        self.remove_body(world, model);
        self.create_body(world, model, assets)
    }

    pub fn entity_of(&self, handle: BodyHandle) -> Option<EntityId> {
        self.entities.get(&handle).copied()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
