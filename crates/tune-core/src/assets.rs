//! Shape prototypes and note buffers.
//!
//! Asset loading itself happens outside the core; what the core needs is a
//! lookup of prototypes by shape name and the set of note buffers that
//! decoded successfully. A failed asset is simply absent.

use std::collections::{HashMap, HashSet};
use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;
use std::thread::JoinHandle;

use glam::Vec3;
use parking_lot::Mutex;

use crate::model::piano_note_names;

/// Errors raised while loading assets.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AssetError {
    #[error("Failed to load asset '{name}': {reason}")]
    Load { name: String, reason: String },

    #[error("Asset loader stopped before producing a result")]
    LoaderStopped,
}

/// Triangle mesh of a prototype, in prototype-local units.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vec3>,
    /// `None` for non-indexed geometry.
    pub indices: Option<Vec<[u32; 3]>>,
}

/// Cloneable template a new entity is created from.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapePrototype {
    pub name: String,
    /// Base scale; also the collider size.
    pub scale: Vec3,
    pub mesh: Option<MeshData>,
}

/// Lookup of loaded assets.
pub trait AssetProvider: Send + Sync {
    fn prototype(&self, shape: &str) -> Option<&ShapePrototype>;

    /// Whether the decoded buffer for a note (`C4`, `Bb3`) is available.
    fn has_note(&self, name: &str) -> bool;
}

#[derive(Debug, Clone, Default)]
pub struct AssetLibrary {
    prototypes: HashMap<String, ShapePrototype>,
    notes: HashSet<String>,
}

impl AssetLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Procedural prototypes for every shape plus the full piano.
    pub fn builtin() -> Self {
        let mut library = Self::new();
        library.insert_prototype(ShapePrototype {
            name: "marble".to_string(),
            scale: Vec3::ONE,
            mesh: None,
        });
        library.insert_prototype(ShapePrototype {
            name: "plank".to_string(),
            scale: Vec3::new(8.0, 0.5, 3.0),
            mesh: None,
        });
        library.insert_prototype(ShapePrototype {
            name: "cylinder".to_string(),
            scale: Vec3::new(2.0, 2.0, 2.0),
            mesh: None,
        });
        library.insert_prototype(ShapePrototype {
            name: "curve".to_string(),
            scale: Vec3::ONE,
            mesh: Some(quarter_pipe(6.0, 3.0, 12)),
        });
        library.insert_prototype(ShapePrototype {
            name: "decoration-star".to_string(),
            scale: Vec3::ONE,
            mesh: None,
        });
        for name in piano_note_names() {
            library.insert_note(name);
        }
        library
    }

    pub fn insert_prototype(&mut self, prototype: ShapePrototype) {
        self.prototypes.insert(prototype.name.clone(), prototype);
    }

    pub fn insert_note(&mut self, name: impl Into<String>) {
        self.notes.insert(name.into());
    }

    /// Adds a loaded prototype, or logs the failure and leaves the shape
    /// absent.
    pub fn insert_loaded(&mut self, loaded: Result<ShapePrototype, AssetError>) {
        match loaded {
            Ok(prototype) => self.insert_prototype(prototype),
            Err(e) => self.record_failure(&e),
        }
    }

    /// Adds a decoded note buffer, or logs the failure and leaves it absent.
    pub fn insert_loaded_note(&mut self, loaded: Result<String, AssetError>) {
        match loaded {
            Ok(name) => self.insert_note(name),
            Err(e) => self.record_failure(&e),
        }
    }

    /// Logs a failed load; the asset stays absent.
    pub fn record_failure(&self, error: &AssetError) {
        tracing::warn!("[assets] {}", error);
    }

    pub fn prototype_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.prototypes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }
}

impl AssetProvider for AssetLibrary {
    fn prototype(&self, shape: &str) -> Option<&ShapePrototype> {
        self.prototypes.get(shape)
    }

    fn has_note(&self, name: &str) -> bool {
        self.notes.contains(name)
    }
}

/// Open quarter-pipe: an arc in the XY plane swept along Z.
fn quarter_pipe(radius: f32, depth: f32, segments: u32) -> MeshData {
    let half_depth = depth / 2.0;
    let mut vertices = Vec::with_capacity(2 * (segments as usize + 1));
    for i in 0..=segments {
        #[allow(clippy::cast_precision_loss)]
        let angle = std::f32::consts::PI + FRAC_PI_2 * (i as f32 / segments as f32);
        let (sin, cos) = angle.sin_cos();
        vertices.push(Vec3::new(radius * cos, radius * sin, -half_depth));
        vertices.push(Vec3::new(radius * cos, radius * sin, half_depth));
    }

    let mut indices = Vec::with_capacity(2 * segments as usize);
    for i in 0..segments {
        let v0 = 2 * i;
        let v1 = v0 + 1;
        let v2 = v0 + 2;
        let v3 = v0 + 3;
        indices.push([v0, v2, v1]);
        indices.push([v1, v2, v3]);
    }

    MeshData {
        vertices,
        indices: Some(indices),
    }
}

type Slot = Arc<Mutex<Option<Result<AssetLibrary, AssetError>>>>;

/// Asset load running on a background thread.
///
/// The frame loop polls; the result is handed over exactly once.
pub struct PendingAssets {
    slot: Slot,
    worker: Option<JoinHandle<()>>,
}

impl PendingAssets {
    pub fn spawn<F>(load: F) -> Self
    where
        F: FnOnce() -> Result<AssetLibrary, AssetError> + Send + 'static,
    {
        let slot: Slot = Arc::new(Mutex::new(None));
        let writer = Arc::clone(&slot);
        let worker = std::thread::spawn(move || {
            let result = load();
            *writer.lock() = Some(result);
        });
        Self {
            slot,
            worker: Some(worker),
        }
    }

    /// Returns the result once the loader finished; `None` while it runs and
    /// after the result was taken.
    pub fn poll(&mut self) -> Option<Result<AssetLibrary, AssetError>> {
        // Checked before the slot: a finished worker has already written it.
        let finished = self.worker.as_ref().is_some_and(JoinHandle::is_finished);
        if let Some(result) = self.slot.lock().take() {
            if let Some(worker) = self.worker.take() {
                let _ = worker.join();
            }
            return Some(result);
        }
        if finished {
            // Finished without writing: the loader panicked.
            self.worker = None;
            return Some(Err(AssetError::LoaderStopped));
        }
        None
    }

    /// Blocks until the loader finishes.
    pub fn wait(mut self) -> Result<AssetLibrary, AssetError> {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.slot.lock().take().unwrap_or(Err(AssetError::LoaderStopped))
    }
}
