//! Scene entity storage and selection.

use glam::{Quat, Vec3};

use crate::assets::AssetProvider;
use crate::model::{EntityId, Model, ShapeKind, Transform};

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("No prototype loaded for shape '{0}'")]
    PrototypeMissing(String),

    #[error("Entity {0} not found")]
    NotFound(EntityId),
}

/// Placed entities in placement order.
#[derive(Debug, Default)]
pub struct SceneManager {
    models: Vec<Model>,
    next_id: u64,
    selected: Option<EntityId>,
}

impl SceneManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clones the prototype of `shape` at `position`, at the prototype's scale.
    pub fn spawn(
        &mut self,
        assets: &dyn AssetProvider,
        shape: &str,
        position: Vec3,
    ) -> Result<EntityId, SceneError> {
        self.spawn_with(assets, shape, position, Quat::IDENTITY, None)
    }

    /// Like [`spawn`](Self::spawn) with an explicit orientation and optional
    /// scale override.
    pub fn spawn_with(
        &mut self,
        assets: &dyn AssetProvider,
        shape: &str,
        position: Vec3,
        rotation: Quat,
        scale: Option<Vec3>,
    ) -> Result<EntityId, SceneError> {
        let prototype = assets
            .prototype(shape)
            .ok_or_else(|| SceneError::PrototypeMissing(shape.to_string()))?;

        self.next_id += 1;
        let id = EntityId(self.next_id);
        let transform = Transform {
            position,
            rotation,
            scale: scale.unwrap_or(prototype.scale),
        };
        self.models.push(Model::new(id, ShapeKind::from_name(shape), transform));
        tracing::debug!("[scene] spawned {} {} at {}", shape, id, position);
        Ok(id)
    }

    /// Removes an entity, dropping references to it from selection and
    /// explicit next-target overrides.
    pub fn remove(&mut self, id: EntityId) -> Option<Model> {
        let index = self.models.iter().position(|model| model.id == id)?;
        let model = self.models.remove(index);
        if self.selected == Some(id) {
            self.selected = None;
        }
        for other in &mut self.models {
            if other.next_target == Some(id) {
                other.next_target = None;
            }
        }
        Some(model)
    }

    /// Removes every entity.
    pub fn clear(&mut self) -> Vec<Model> {
        self.selected = None;
        std::mem::take(&mut self.models)
    }

    pub fn get(&self, id: EntityId) -> Option<&Model> {
        self.models.iter().find(|model| model.id == id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Model> {
        self.models.iter_mut().find(|model| model.id == id)
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn models_mut(&mut self) -> &mut [Model] {
        &mut self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// First marble in placement order.
    pub fn first_marble(&self) -> Option<&Model> {
        self.models.iter().find(|model| model.is_marble())
    }

    pub fn select(&mut self, id: EntityId) -> bool {
        if self.get(id).is_some() {
            self.selected = Some(id);
            true
        } else {
            false
        }
    }

    pub fn deselect(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<EntityId> {
        self.selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetLibrary;

    #[test]
    fn test_spawn_uses_prototype_scale() {
        let assets = AssetLibrary::builtin();
        let mut scene = SceneManager::new();
        let id = scene.spawn(&assets, "plank", Vec3::new(1.0, 2.0, 0.0)).unwrap();

        let model = scene.get(id).unwrap();
        assert_eq!(model.shape, ShapeKind::Plank);
        assert_eq!(model.transform.scale, Vec3::new(8.0, 0.5, 3.0));
        assert_eq!(model.position(), Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_spawn_unknown_prototype() {
        let assets = AssetLibrary::builtin();
        let mut scene = SceneManager::new();
        assert!(matches!(
            scene.spawn(&assets, "lamp", Vec3::ZERO),
            Err(SceneError::PrototypeMissing(_))
        ));
        assert!(scene.is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let assets = AssetLibrary::builtin();
        let mut scene = SceneManager::new();
        let a = scene.spawn(&assets, "plank", Vec3::ZERO).unwrap();
        scene.remove(a);
        let b = scene.spawn(&assets, "plank", Vec3::ZERO).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_remove_clears_selection_and_overrides() {
        let assets = AssetLibrary::builtin();
        let mut scene = SceneManager::new();
        let a = scene.spawn(&assets, "plank", Vec3::ZERO).unwrap();
        let b = scene.spawn(&assets, "plank", Vec3::ZERO).unwrap();
        scene.get_mut(a).unwrap().next_target = Some(b);
        assert!(scene.select(b));

        assert!(scene.remove(b).is_some());
        assert_eq!(scene.selected(), None);
        assert_eq!(scene.get(a).unwrap().next_target, None);
        assert!(scene.remove(b).is_none());
    }

    #[test]
    fn test_first_marble() {
        let assets = AssetLibrary::builtin();
        let mut scene = SceneManager::new();
        scene.spawn(&assets, "plank", Vec3::ZERO).unwrap();
        let first = scene.spawn(&assets, "marble", Vec3::Y).unwrap();
        scene.spawn(&assets, "marble", Vec3::X).unwrap();
        assert_eq!(scene.first_marble().map(|m| m.id), Some(first));
    }

    #[test]
    fn test_select_missing_entity() {
        let mut scene = SceneManager::new();
        assert!(!scene.select(EntityId(9)));
    }
}
