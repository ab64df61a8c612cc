//! Systems driving the sandbox from the Bevy schedule.

use std::collections::HashSet;

use bevy::prelude::*;

use super::components::{
    IntentQueueRes, ModelShape, SandboxCamera, SandboxMessage, SandboxRes, SceneModelRef,
};
use crate::model::Model;

fn to_bevy_vec(v: glam::Vec3) -> Vec3 {
    Vec3::from_array(v.to_array())
}

fn to_bevy_transform(model: &Model) -> Transform {
    Transform {
        translation: to_bevy_vec(model.transform.position),
        rotation: Quat::from_array(model.transform.rotation.to_array()),
        scale: to_bevy_vec(model.transform.scale),
    }
}

/// Applies intents queued since the last frame.
pub fn drain_intents(mut sandbox: ResMut<SandboxRes>, queue: Res<IntentQueueRes>) {
    sandbox.0.apply_queued(&queue.0);
}

/// Advances the sandbox by the frame delta and forwards its events.
pub fn advance_sandbox(
    time: Res<Time>,
    mut sandbox: ResMut<SandboxRes>,
    mut messages: MessageWriter<SandboxMessage>,
) {
    let report = sandbox.0.frame(time.delta_secs());
    for event in report.events {
        messages.write(SandboxMessage(event));
    }
}

/// Spawns, updates and despawns proxy entities to match the scene.
pub fn sync_model_proxies(
    mut commands: Commands,
    sandbox: Res<SandboxRes>,
    mut proxies: Query<(Entity, &SceneModelRef, &mut Transform)>,
) {
    let mut mirrored = HashSet::new();
    for (entity, model_ref, mut transform) in &mut proxies {
        match sandbox.0.model(model_ref.0) {
            Some(model) => {
                *transform = to_bevy_transform(model);
                mirrored.insert(model_ref.0);
            }
            None => commands.entity(entity).despawn(),
        }
    }

    for model in sandbox.0.models() {
        if !mirrored.contains(&model.id) {
            commands.spawn((
                SceneModelRef(model.id),
                ModelShape(model.shape.name().to_string()),
                to_bevy_transform(model),
            ));
        }
    }
}

/// Points the sandbox camera along the rig's current pose.
pub fn sync_camera(
    sandbox: Res<SandboxRes>,
    mut cameras: Query<&mut Transform, With<SandboxCamera>>,
) {
    let pose = sandbox.0.camera().pose();
    for mut transform in &mut cameras {
        *transform = Transform::from_translation(to_bevy_vec(pose.position))
            .looking_at(to_bevy_vec(pose.look_at), Vec3::Y);
    }
}
