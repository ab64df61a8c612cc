//! ECS resources, components and messages wrapping the sandbox.

use bevy::prelude::*;

use crate::model::EntityId;
use crate::physics::RapierWorld;
use crate::sandbox::{IntentQueue, Sandbox, SandboxEvent};

/// The live sandbox.
#[derive(Resource)]
pub struct SandboxRes(pub Sandbox<RapierWorld>);

/// Intent inbox shared with UI code outside the ECS.
#[derive(Resource, Clone, Default)]
pub struct IntentQueueRes(pub IntentQueue);

/// Links a proxy entity to the scene entity it mirrors.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneModelRef(pub EntityId);

/// Prototype name of the mirrored entity, for mesh lookup.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct ModelShape(pub String);

/// Marker for the camera driven by the sandbox camera rig.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct SandboxCamera;

/// Sandbox events re-emitted for other systems.
#[derive(Message, Debug, Clone)]
pub struct SandboxMessage(pub SandboxEvent);
