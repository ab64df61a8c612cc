//! Bevy plugin for the marble-tune sandbox.
//!
//! Logic only: no window or render dependencies, so it runs under
//! `MinimalPlugins` in tests.

use bevy::prelude::*;

use super::components::{IntentQueueRes, SandboxMessage, SandboxRes};
use super::systems;
use crate::assets::AssetLibrary;
use crate::audio::TracingAudio;
use crate::config::SandboxConfig;
use crate::sandbox::{IntentQueue, Sandbox};

#[derive(Default)]
pub struct MarbleTunePlugin {
    pub config: SandboxConfig,
    pub intents: Option<IntentQueue>,
}

impl Plugin for MarbleTunePlugin {
    fn build(&self, app: &mut App) {
        // Built-in assets are ready immediately.
        let mut sandbox = Sandbox::new(
            self.config.clone(),
            Box::new(AssetLibrary::builtin()),
            Box::new(TracingAudio),
        );
        sandbox.start();

        app.insert_resource(SandboxRes(sandbox))
            .insert_resource(IntentQueueRes(self.intents.clone().unwrap_or_default()))
            .add_message::<SandboxMessage>();

        app.add_systems(
            Update,
            (
                systems::drain_intents,
                systems::advance_sandbox,
                systems::sync_model_proxies,
                systems::sync_camera,
            )
                .chain(),
        );
    }
}
