//! Bevy integration for the marble-tune sandbox.
//!
//! The sandbox lives in a single resource and is advanced once per `Update`.
//! Scene entities are mirrored as proxy entities carrying a [`SceneModelRef`]
//! and a `Transform`, which renderers attach meshes to.

pub mod components;
pub mod plugin;
pub mod systems;

pub use components::*;
pub use plugin::MarbleTunePlugin;
pub use systems::{advance_sandbox, drain_intents, sync_camera, sync_model_proxies};
