//! Marble-Tune headless runner
//!
//! Loads a scene (or the built-in demo), plays it for a fixed number of
//! frames on the Rapier world and logs every note, jump and reset.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tune_core::{
    AssetLibrary, PendingAssets, RapierWorld, Sandbox, SandboxConfig, SandboxEvent, SceneFile,
    SimState, TracingAudio, demo_scene,
};

#[derive(Parser, Debug)]
#[command(name = "marble-tune", about = "Play a marble-tune scene headless")]
struct Args {
    /// Scene JSON to play. The built-in demo is used when omitted.
    scene: Option<PathBuf>,

    /// Settings JSON overriding the defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seconds of play.
    #[arg(long, default_value_t = 10.0)]
    seconds: f32,

    /// Display frames per second.
    #[arg(long, default_value_t = 60.0)]
    fps: f32,

    /// Writes the scene back out after playing.
    #[arg(long)]
    export: Option<PathBuf>,

    /// Pauses at the end and prints the predicted marble path.
    #[arg(long)]
    preview: bool,
}

fn load_scene(path: Option<&PathBuf>) -> Result<SceneFile> {
    let Some(path) = path else {
        return Ok(demo_scene());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scene {}", path.display()))?;
    SceneFile::from_json(&json).with_context(|| format!("failed to parse scene {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    anyhow::ensure!(args.fps > 0.0, "--fps must be positive");

    let config = match &args.config {
        Some(path) => SandboxConfig::load(path)
            .with_context(|| format!("failed to load settings {}", path.display()))?,
        None => SandboxConfig::default(),
    };
    config.validate()?;
    let scene = load_scene(args.scene.as_ref())?;

    let mut sandbox: Sandbox<RapierWorld> =
        Sandbox::new(config, Box::new(AssetLibrary::new()), Box::new(TracingAudio));
    let mut pending = Some(PendingAssets::spawn(|| Ok(AssetLibrary::builtin())));

    let delta = 1.0 / args.fps;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let frames = (args.seconds.max(0.0) * args.fps).ceil() as u64;
    let mut notes = 0usize;
    let mut resets = 0usize;

    for _ in 0..frames {
        if let Some(loading) = pending.as_mut()
            && let Some(result) = loading.poll()
        {
            pending = None;
            let library = result.unwrap_or_else(|e| {
                // Run on without the missing assets.
                let library = AssetLibrary::new();
                library.record_failure(&e);
                library
            });
            tracing::info!("[assets] {} prototypes ready", library.prototype_names().len());
            sandbox.install_assets(Box::new(library));
            sandbox.import_scene(&scene);
            sandbox.start();
        }

        for event in sandbox.frame(delta).events {
            match event {
                SandboxEvent::NotePlayed { .. } => notes += 1,
                SandboxEvent::MarbleRespawned { old, new } => {
                    resets += 1;
                    tracing::info!("[runner] marble {} respawned as {}", old, new);
                }
                SandboxEvent::Redirected { marble, target } => {
                    tracing::debug!("[runner] {} -> {}", marble, target);
                }
                _ => {}
            }
        }
    }

    tracing::info!(
        "[runner] {:.1}s simulated, {} notes, {} resets",
        sandbox.sim_time(),
        notes,
        resets
    );

    if args.preview && sandbox.state() == SimState::Running {
        sandbox.toggle_play();
        match sandbox.preview() {
            Some(trajectory) => {
                println!("predicted path of {}:", trajectory.marble);
                for point in &trajectory.points {
                    println!("  {:>8.2} {:>8.2} {:>8.2}", point.x, point.y, point.z);
                }
            }
            None => println!("no marble to predict"),
        }
    }

    if let Some(path) = &args.export {
        let json = sandbox
            .export_scene()
            .to_json_pretty()
            .context("failed to serialize scene")?;
        std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!("[runner] scene written to {}", path.display());
    }

    Ok(())
}
