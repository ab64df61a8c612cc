//! The marble-run sandbox.
//!
//! [`Sandbox`] owns the physics world and every gameplay component and is
//! driven once per display frame. UI intents are applied between frames,
//! either directly or through an [`IntentQueue`] filled from another thread.

use std::collections::VecDeque;
use std::sync::Arc;

use glam::{Quat, Vec3};
use parking_lot::Mutex;

use crate::assets::AssetProvider;
use crate::audio::AudioSink;
use crate::backend::PhysicsBackend;
use crate::camera::CameraRig;
use crate::config::{ConfigError, SandboxConfig};
use crate::highlight::{HighlightColor, HighlightTracker};
use crate::lifecycle::{MarbleLifecycle, RemovalReason};
use crate::model::{EntityId, Model, NoteAssignment, ShapeKind};
use crate::predictor::{PredictionSettings, Trajectory, predict_trajectory};
use crate::registry::BodyRegistry;
use crate::router::{CollisionRouter, RedirectSettings, RouterEvent, cooldown_steps};
use crate::scene::{SceneError, SceneManager};
use crate::scene_file::{SceneFile, SceneFileError, demo_scene};
use crate::schedule::Scheduler;
use crate::solver::LaunchSettings;
use crate::stepper::{SimState, StepDriver};

/// Dragged entities float just in front of the wall.
const DRAG_WALL_OFFSET: f32 = 1.0;

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    SceneFile(#[from] SceneFileError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Note {0} is not on an 88-key piano")]
    InvalidNote(String),

    #[error("There is no marble to follow")]
    NoMarble,
}

/// A user action.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Spawns a shape at a wall point and simulates it right away.
    Place { shape: String, position: Vec3 },
    Select(EntityId),
    Deselect,
    Delete(EntityId),
    DeleteSelected,
    /// Sets the angle about the wall normal, in degrees.
    Rotate { entity: EntityId, degrees: f32 },
    /// Detaches the entity from the simulation while it is moved.
    BeginDrag(EntityId),
    /// Moves a dragged entity to the wall point under the cursor.
    MoveDrag { entity: EntityId, wall_point: Vec3 },
    EndDrag(EntityId),
    SetNote {
        entity: EntityId,
        note: Option<NoteAssignment>,
    },
    SetNextTarget {
        entity: EntityId,
        target: Option<EntityId>,
    },
    TogglePlay,
    ToggleCameraLock,
    Clear,
    /// Replaces the scene with a scene JSON document.
    Import(String),
    LoadDemo,
    SetGravity(Vec3),
    SetSpeed(f32),
}

/// Thread-safe intent inbox drained by the frame loop.
#[derive(Debug, Clone, Default)]
pub struct IntentQueue(Arc<Mutex<VecDeque<Intent>>>);

impl IntentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, intent: Intent) {
        self.0.lock().push_back(intent);
    }

    pub fn drain(&self) -> Vec<Intent> {
        self.0.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

/// Something the renderer or UI may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum SandboxEvent {
    Spawned { entity: EntityId, shape: ShapeKind },
    Removed { entity: EntityId },
    NotePlayed { piece: EntityId, note: String },
    Highlighted { piece: EntityId, color: HighlightColor },
    HighlightCleared { piece: EntityId },
    Redirected { marble: EntityId, target: EntityId },
    ReachedEnd { marble: EntityId },
    ResetScheduled { marble: EntityId, reason: RemovalReason },
    MarbleRespawned { old: EntityId, new: EntityId },
    StateChanged(SimState),
    CameraUnlocked,
}

/// Outcome of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub substeps: u32,
    pub events: Vec<SandboxEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    ResetMarble(EntityId),
    ClearHighlight(EntityId),
}

pub struct Sandbox<B: PhysicsBackend> {
    config: SandboxConfig,
    world: B,
    registry: BodyRegistry,
    scene: SceneManager,
    router: CollisionRouter,
    driver: StepDriver,
    lifecycle: MarbleLifecycle,
    highlights: HighlightTracker,
    camera: CameraRig,
    scheduler: Scheduler<Task>,
    assets: Box<dyn AssetProvider>,
    audio: Box<dyn AudioSink>,
    sim_time: f64,
    steps: u64,
    preview: Option<Trajectory>,
    events: Vec<SandboxEvent>,
}

impl<B: PhysicsBackend> Sandbox<B> {
    pub fn new(
        config: SandboxConfig,
        assets: Box<dyn AssetProvider>,
        audio: Box<dyn AudioSink>,
    ) -> Self {
        Self {
            world: B::with_gravity(config.gravity),
            registry: BodyRegistry::new(),
            scene: SceneManager::new(),
            router: CollisionRouter::new(cooldown_steps(config.collision_cooldown, config.fixed_dt)),
            driver: StepDriver::from_config(&config),
            lifecycle: MarbleLifecycle::new(),
            highlights: HighlightTracker::new(config.highlight_seed),
            camera: CameraRig::default(),
            scheduler: Scheduler::new(),
            assets,
            audio,
            sim_time: 0.0,
            steps: 0,
            preview: None,
            events: Vec::new(),
            config,
        }
    }

    /// Swaps in a freshly loaded asset set.
    pub fn install_assets(&mut self, assets: Box<dyn AssetProvider>) {
        self.assets = assets;
    }

    /// Starts simulating; called once assets are ready.
    pub fn start(&mut self) {
        if self.driver.state() == SimState::Idle {
            self.driver.start();
            tracing::info!("[sandbox] simulation started");
            self.events.push(SandboxEvent::StateChanged(SimState::Running));
        }
    }

    pub fn state(&self) -> SimState {
        self.driver.state()
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn world(&self) -> &B {
        &self.world
    }

    pub fn models(&self) -> &[Model] {
        self.scene.models()
    }

    pub fn model(&self, id: EntityId) -> Option<&Model> {
        self.scene.get(id)
    }

    pub fn selected(&self) -> Option<EntityId> {
        self.scene.selected()
    }

    pub fn camera(&self) -> &CameraRig {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut CameraRig {
        &mut self.camera
    }

    /// Latest trajectory preview, refreshed every paused frame.
    pub fn preview(&self) -> Option<&Trajectory> {
        self.preview.as_ref()
    }

    /// Simulated seconds since start.
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    /// Fixed steps taken since start.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Origin a marble will be reset to.
    pub fn marble_origin(&self, marble: EntityId) -> Option<Vec3> {
        self.lifecycle.origin(marble)
    }

    /// Events raised since the last frame report.
    pub fn take_events(&mut self) -> Vec<SandboxEvent> {
        std::mem::take(&mut self.events)
    }

    // ---- intents ----

    pub fn apply(&mut self, intent: Intent) -> Result<(), SandboxError> {
        match intent {
            Intent::Place { shape, position } => {
                self.place(&shape, position)?;
            }
            Intent::Select(id) => {
                if !self.scene.select(id) {
                    return Err(SceneError::NotFound(id).into());
                }
            }
            Intent::Deselect => self.scene.deselect(),
            Intent::Delete(id) => self.delete(id)?,
            Intent::DeleteSelected => {
                if let Some(id) = self.scene.selected() {
                    self.delete(id)?;
                }
            }
            Intent::Rotate { entity, degrees } => self.rotate(entity, degrees)?,
            Intent::BeginDrag(id) => self.begin_drag(id)?,
            Intent::MoveDrag { entity, wall_point } => self.move_drag(entity, wall_point)?,
            Intent::EndDrag(id) => self.end_drag(id)?,
            Intent::SetNote { entity, note } => self.set_note(entity, note)?,
            Intent::SetNextTarget { entity, target } => self.set_next_target(entity, target)?,
            Intent::TogglePlay => {
                self.toggle_play();
            }
            Intent::ToggleCameraLock => {
                self.toggle_camera_lock()?;
            }
            Intent::Clear => self.clear(),
            Intent::Import(json) => self.import_json(&json)?,
            Intent::LoadDemo => self.import_scene(&demo_scene()),
            Intent::SetGravity(gravity) => self.set_gravity(gravity),
            Intent::SetSpeed(speed) => self.set_speed(speed)?,
        }
        Ok(())
    }

    /// Applies queued intents; failures are logged and skipped.
    pub fn apply_queued(&mut self, queue: &IntentQueue) -> usize {
        let intents = queue.drain();
        let count = intents.len();
        for intent in intents {
            if let Err(e) = self.apply(intent) {
                tracing::warn!("[sandbox] intent rejected: {}", e);
            }
        }
        count
    }

    pub fn place(&mut self, shape: &str, position: Vec3) -> Result<EntityId, SandboxError> {
        let id = self.scene.spawn(self.assets.as_ref(), shape, position)?;
        self.attach(id);
        self.events.push(SandboxEvent::Spawned {
            entity: id,
            shape: ShapeKind::from_name(shape),
        });
        Ok(id)
    }

    pub fn delete(&mut self, id: EntityId) -> Result<(), SandboxError> {
        self.remove_entity(id)
            .map(|_| ())
            .ok_or_else(|| SceneError::NotFound(id).into())
    }

    pub fn rotate(&mut self, id: EntityId, degrees: f32) -> Result<(), SandboxError> {
        let model = self.scene.get_mut(id).ok_or(SceneError::NotFound(id))?;
        model.transform.rotation = Quat::from_rotation_z(degrees.rem_euclid(360.0).to_radians());
        let old = model.body;
        let new = self
            .registry
            .update_rotation(&mut self.world, model, self.assets.as_ref());
        if let Some(old) = old
            && new != Some(old)
        {
            self.router.forget_body(old);
        }
        Ok(())
    }

    pub fn begin_drag(&mut self, id: EntityId) -> Result<(), SandboxError> {
        let model = self.scene.get_mut(id).ok_or(SceneError::NotFound(id))?;
        if let Some(handle) = self.registry.remove_body(&mut self.world, model) {
            self.router.forget_body(handle);
        }
        if model.is_marble() {
            self.lifecycle.forget(id, &mut self.scheduler);
        }
        Ok(())
    }

    pub fn move_drag(&mut self, id: EntityId, wall_point: Vec3) -> Result<(), SandboxError> {
        let model = self.scene.get_mut(id).ok_or(SceneError::NotFound(id))?;
        model.transform.position = wall_point + Vec3::Z * DRAG_WALL_OFFSET;
        Ok(())
    }

    pub fn end_drag(&mut self, id: EntityId) -> Result<(), SandboxError> {
        if self.scene.get(id).is_none() {
            return Err(SceneError::NotFound(id).into());
        }
        self.attach(id);
        Ok(())
    }

    pub fn set_note(
        &mut self,
        id: EntityId,
        note: Option<NoteAssignment>,
    ) -> Result<(), SandboxError> {
        if let Some(note) = &note
            && !note.is_playable()
        {
            return Err(SandboxError::InvalidNote(note.name()));
        }
        let model = self.scene.get_mut(id).ok_or(SceneError::NotFound(id))?;
        model.set_note(note);
        Ok(())
    }

    pub fn set_next_target(
        &mut self,
        id: EntityId,
        target: Option<EntityId>,
    ) -> Result<(), SandboxError> {
        if let Some(target) = target
            && self.scene.get(target).is_none()
        {
            return Err(SceneError::NotFound(target).into());
        }
        let model = self.scene.get_mut(id).ok_or(SceneError::NotFound(id))?;
        model.next_target = target;
        Ok(())
    }

    /// Flips between running and paused. Returns the new state.
    pub fn toggle_play(&mut self) -> SimState {
        let state = self.driver.toggle();
        match state {
            SimState::Paused => {
                tracing::info!("[sandbox] paused");
                self.refresh_preview();
            }
            SimState::Running => {
                tracing::info!("[sandbox] resumed");
                self.preview = None;
            }
            SimState::Idle => return state,
        }
        self.events.push(SandboxEvent::StateChanged(state));
        state
    }

    /// Follows the first marble, or releases the camera if it is following.
    /// Returns whether the camera is now locked.
    pub fn toggle_camera_lock(&mut self) -> Result<bool, SandboxError> {
        if self.camera.following().is_some() {
            self.camera.unlock();
            return Ok(false);
        }
        let marble = self.scene.first_marble().ok_or(SandboxError::NoMarble)?;
        self.camera.lock(marble.id, marble.position());
        Ok(true)
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.config.gravity = gravity;
        self.world.set_gravity(gravity);
    }

    pub fn set_speed(&mut self, speed: f32) -> Result<(), SandboxError> {
        if !(speed.is_finite() && speed > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "speed",
                reason: format!("{speed} must be positive"),
            }
            .into());
        }
        self.config.speed = speed;
        Ok(())
    }

    /// Removes every entity, timer and cooldown.
    pub fn clear(&mut self) {
        for mut model in self.scene.clear() {
            self.registry.remove_body(&mut self.world, &mut model);
            self.events.push(SandboxEvent::Removed { entity: model.id });
        }
        self.scheduler.clear();
        self.lifecycle.reset();
        self.highlights.reset();
        self.router.clear();
        if self.camera.following().is_some() {
            self.camera.unlock();
            self.events.push(SandboxEvent::CameraUnlocked);
        }
        self.preview = None;
        tracing::info!("[scene] cleared");
    }

    // ---- scene files ----

    pub fn export_scene(&self) -> SceneFile {
        let origin = self
            .scene
            .first_marble()
            .and_then(|marble| self.lifecycle.origin(marble.id));
        SceneFile::capture(self.scene.models(), origin)
    }

    pub fn export_json(&self) -> Result<String, SandboxError> {
        Ok(self.export_scene().to_json()?)
    }

    /// Parses `json` and replaces the scene. An invalid document leaves the
    /// scene untouched.
    pub fn import_json(&mut self, json: &str) -> Result<(), SandboxError> {
        let file = SceneFile::from_json(json)?;
        self.import_scene(&file);
        Ok(())
    }

    pub fn import_scene(&mut self, file: &SceneFile) {
        self.clear();

        for record in &file.models {
            let spawned = self.scene.spawn_with(
                self.assets.as_ref(),
                &record.shape_type,
                record.position.into(),
                record.rotation(),
                record.scale.map(Vec3::from),
            );
            let id = match spawned {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!("[scene] skipped imported {}: {}", record.shape_type, e);
                    continue;
                }
            };
            if let Some(model) = self.scene.get_mut(id) {
                if !record.user_data.is_empty() {
                    model.user_data = record.user_data.clone();
                }
                model.note = record.note();
            }
            self.attach(id);
            self.events.push(SandboxEvent::Spawned {
                entity: id,
                shape: ShapeKind::from_name(&record.shape_type),
            });
        }

        if let Some(origin) = file.marble_initial_position
            && let Err(e) = self.place("marble", origin.into())
        {
            tracing::warn!("[scene] marble not restored: {}", e);
        }

        tracing::info!("[scene] imported {} entities", self.scene.len());
    }

    // ---- frame loop ----

    /// Advances one display frame.
    pub fn frame(&mut self, delta: f32) -> FrameReport {
        let delta = if delta.is_finite() { delta.max(0.0) } else { 0.0 };

        let report = self.driver.advance(delta);
        for _ in 0..report.substeps {
            self.step_once();
        }

        if self.driver.is_running() {
            self.sync_transforms();
            self.poll_fallen();
        }

        for (_, task) in self.scheduler.advance(delta) {
            match task {
                Task::ResetMarble(marble) => self.reset_marble(marble),
                Task::ClearHighlight(piece) => {
                    if let Some(model) = self.scene.get_mut(piece) {
                        self.highlights.clear(model);
                        self.events.push(SandboxEvent::HighlightCleared { piece });
                    }
                }
            }
        }

        if let Some(marble) = self.camera.following() {
            match self.scene.get(marble) {
                Some(model) => self.camera.follow(model.position()),
                None => {
                    self.camera.unlock();
                    self.events.push(SandboxEvent::CameraUnlocked);
                }
            }
        }

        if self.driver.state() == SimState::Paused {
            self.refresh_preview();
        }

        FrameReport {
            substeps: report.substeps,
            events: self.take_events(),
        }
    }

    /// Recomputes the trajectory preview from the current live state.
    pub fn refresh_preview(&mut self) -> Option<&Trajectory> {
        let settings = PredictionSettings::from_config(&self.config);
        self.preview = predict_trajectory(
            &self.world,
            self.scene.models(),
            self.assets.as_ref(),
            &settings,
        );
        self.preview.as_ref()
    }

    fn redirect_settings(&self) -> RedirectSettings {
        RedirectSettings {
            launch: LaunchSettings {
                gravity: self.config.gravity,
                speed: self.config.speed,
                min_flight_time: self.config.min_flight_time,
            },
            tie_epsilon: self.config.tie_epsilon,
            end_upward_damping: self.config.end_upward_damping,
        }
    }

    fn step_once(&mut self) {
        let dt = self.driver.fixed_dt();
        let contacts = self.world.step(dt);
        self.sim_time += f64::from(dt);
        self.steps += 1;

        let settings = self.redirect_settings();
        for contact in contacts {
            let routed = self.router.route(
                &mut self.world,
                &self.registry,
                self.scene.models(),
                contact,
                self.steps,
                &settings,
            );
            for event in routed {
                self.dispatch(event);
            }
        }
    }

    fn dispatch(&mut self, event: RouterEvent) {
        match event {
            RouterEvent::PieceStruck { piece, note, .. } => {
                if self.config.audio_enabled
                    && let Some(note) = note
                {
                    self.play(piece, note);
                }
                if self.config.highlight_enabled {
                    self.highlight(piece);
                }
            }
            RouterEvent::Redirected { marble, target, .. } => {
                self.events.push(SandboxEvent::Redirected { marble, target });
            }
            RouterEvent::ReachedEnd { marble, .. } => {
                self.events.push(SandboxEvent::ReachedEnd { marble });
                self.schedule_reset(marble, RemovalReason::ReachedEnd);
            }
        }
    }

    fn play(&mut self, piece: EntityId, note: String) {
        if !self.assets.has_note(&note) {
            tracing::warn!("[assets] note buffer not found: {}", note);
            return;
        }
        self.audio.play_note(&note);
        self.events.push(SandboxEvent::NotePlayed { piece, note });
    }

    fn highlight(&mut self, piece: EntityId) {
        let Some(model) = self.scene.get_mut(piece) else {
            return;
        };
        let duration = self.config.highlight_duration;
        let scheduler = &mut self.scheduler;
        if let Some(color) = self.highlights.highlight(model, |id| {
            scheduler.schedule(duration, Task::ClearHighlight(id))
        }) {
            self.events.push(SandboxEvent::Highlighted { piece, color });
        }
    }

    fn schedule_reset(&mut self, marble: EntityId, reason: RemovalReason) {
        let delay = self.config.grace_delay;
        let scheduler = &mut self.scheduler;
        if self.lifecycle.arm(marble, reason, |id| {
            scheduler.schedule(delay, Task::ResetMarble(id))
        }) {
            self.events.push(SandboxEvent::ResetScheduled { marble, reason });
        }
    }

    fn poll_fallen(&mut self) {
        for marble in self.lifecycle.fallen(self.scene.models()) {
            self.schedule_reset(marble, RemovalReason::FellOffTrack);
        }
    }

    /// Copies dynamic body poses back onto entity transforms.
    fn sync_transforms(&mut self) {
        for model in self.scene.models_mut() {
            let Some(handle) = model.body else {
                continue;
            };
            if !self.world.is_dynamic(handle) {
                continue;
            }
            if let Some(state) = self.world.body_state(handle) {
                model.transform.position = state.position;
                model.transform.rotation = state.rotation;
            }
        }
    }

    /// Creates the body of a detached entity. A marble's origin is recorded
    /// only when its body is created here; an entity that is already
    /// simulated keeps its origin.
    fn attach(&mut self, id: EntityId) {
        let Some(model) = self.scene.get_mut(id) else {
            return;
        };
        if model.body.is_some() {
            return;
        }
        let created = self
            .registry
            .create_body(&mut self.world, model, self.assets.as_ref())
            .is_some();
        if created && model.is_marble() {
            self.lifecycle.store_origin(id, model.position());
        }
    }

    fn remove_entity(&mut self, id: EntityId) -> Option<Model> {
        let mut model = self.scene.remove(id)?;
        if let Some(handle) = self.registry.remove_body(&mut self.world, &mut model) {
            self.router.forget_body(handle);
        }
        self.lifecycle.forget(id, &mut self.scheduler);
        self.highlights.forget(id, &mut self.scheduler);
        if self.camera.release(id) {
            self.events.push(SandboxEvent::CameraUnlocked);
        }
        self.events.push(SandboxEvent::Removed { entity: id });
        Some(model)
    }

    fn reset_marble(&mut self, marble: EntityId) {
        let origin = self.lifecycle.expire(marble);
        if self.remove_entity(marble).is_none() {
            return;
        }
        let Some(origin) = origin else {
            tracing::info!("[lifecycle] {} removed", marble);
            return;
        };
        match self.place("marble", origin) {
            Ok(new) => {
                tracing::info!("[lifecycle] {} reset to {} as {}", marble, origin, new);
                self.events.push(SandboxEvent::MarbleRespawned { old: marble, new });
            }
            Err(e) => tracing::warn!("[lifecycle] {} could not be respawned: {}", marble, e),
        }
    }
}
