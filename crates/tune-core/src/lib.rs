//! Marble-Tune Core Library
//!
//! Gameplay core of a musical marble-run sandbox: pieces are placed on a
//! vertical wall, marbles fall under gravity, jump from piece to piece and
//! strike notes on every contact.
//!
//! The physics engine is consumed through [`PhysicsBackend`]; [`RapierWorld`]
//! is the `Rapier3D` implementation used at runtime. [`Sandbox`] wires the
//! components together and is driven once per display frame.

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod assets;
pub mod audio;
pub mod backend;
pub mod camera;
pub mod config;
pub mod highlight;
pub mod lifecycle;
pub mod model;
pub mod physics;
pub mod predictor;
pub mod registry;
pub mod router;
pub mod sandbox;
pub mod scene;
pub mod scene_file;
pub mod schedule;
pub mod solver;
pub mod stepper;
pub mod target;

// Bevy integration
#[cfg(feature = "bevy")]
pub mod bevy;

#[cfg(test)]
pub(crate) mod test_utils;

pub use assets::{AssetError, AssetLibrary, AssetProvider, MeshData, PendingAssets, ShapePrototype};
pub use audio::{AudioSink, NoteLog, TracingAudio};
pub use backend::{
    BodyDesc, BodyError, BodyHandle, BodyKind, BodyState, ColliderHandle, ColliderShape,
    CollisionStarted, PhysicsBackend,
};
pub use camera::{CameraPose, CameraRig};
pub use config::{ConfigError, SandboxConfig};
pub use highlight::{HighlightColor, HighlightTracker};
pub use lifecycle::{MarbleLifecycle, RemovalReason};
pub use model::{EntityId, Model, NoteAssignment, ShapeKind, Transform};
pub use physics::{PHYSICS_DT, RapierWorld, default_gravity};
pub use predictor::{PredictionSettings, Trajectory, predict_trajectory};
pub use registry::BodyRegistry;
pub use router::{CollisionRouter, PairKey, Redirect, RouterEvent, cooldown_steps};
pub use sandbox::{FrameReport, Intent, IntentQueue, Sandbox, SandboxError, SandboxEvent};
pub use scene::{SceneError, SceneManager};
pub use scene_file::{SceneFile, SceneFileError, demo_scene};
pub use schedule::{Scheduler, TimerId};
pub use solver::{LaunchSettings, flight_time, velocity_to};
pub use stepper::{SimState, StepDriver, StepReport};
pub use target::{next_target, track_order};
