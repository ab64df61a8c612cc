//! Trajectory preview.
//!
//! While the simulation is paused the marble's future path is found by
//! replaying the scene in a throwaway shadow world. The shadow world mirrors
//! every simulated piece, starts the marble with its live velocities and
//! applies the same jump rule as the live router. Nothing in the live scene
//! is touched: no notes, no highlights, no registry entries.

use std::collections::HashMap;

use glam::Vec3;

use crate::assets::AssetProvider;
use crate::backend::{BodyHandle, PhysicsBackend};
use crate::config::SandboxConfig;
use crate::model::{EntityId, Model};
use crate::registry::body_desc;
use crate::router::{CollisionRouter, PairKey, RedirectSettings, cooldown_steps, redirect_marble};
use crate::solver::LaunchSettings;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionSettings {
    pub redirect: RedirectSettings,
    pub fixed_dt: f32,
    /// Maximum number of shadow steps.
    pub steps: u32,
    /// The replay stops once the marble drops below this height.
    pub floor: f32,
    /// Pair cooldown, in steps; the live router uses the same count.
    pub cooldown_steps: u64,
}

impl PredictionSettings {
    pub fn from_config(config: &SandboxConfig) -> Self {
        Self {
            redirect: RedirectSettings {
                launch: LaunchSettings {
                    gravity: config.gravity,
                    speed: config.speed,
                    min_flight_time: config.min_flight_time,
                },
                tie_epsilon: config.tie_epsilon,
                end_upward_damping: config.end_upward_damping,
            },
            fixed_dt: config.fixed_dt,
            steps: config.prediction_steps,
            floor: config.prediction_floor,
            cooldown_steps: cooldown_steps(config.collision_cooldown, config.fixed_dt),
        }
    }
}

/// Predicted path of a marble, starting at its current position.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub marble: EntityId,
    pub points: Vec<Vec3>,
}

/// Replays the first simulated marble in a shadow copy of `live`.
///
/// Returns `None` when there is no simulated marble.
pub fn predict_trajectory<B: PhysicsBackend>(
    live: &B,
    models: &[Model],
    assets: &dyn AssetProvider,
    settings: &PredictionSettings,
) -> Option<Trajectory> {
    let marble = models
        .iter()
        .find(|model| model.is_marble() && model.body.is_some())?;
    let live_state = live.body_state(marble.body?)?;

    let mut shadow = B::with_gravity(live.gravity());
    let mut pieces: HashMap<BodyHandle, &Model> = HashMap::new();
    for model in models {
        if model.is_marble() || model.body.is_none() {
            continue;
        }
        match body_desc(model, assets) {
            Ok(Some(desc)) => {
                if let Ok(handle) = shadow.insert_body(&desc) {
                    pieces.insert(handle, model);
                }
            }
            Ok(None) => {}
            Err(e) => tracing::debug!("[preview] {} skipped: {}", model.id, e),
        }
    }

    let mut desc = body_desc(marble, assets).ok()??;
    desc.position = live_state.position;
    desc.rotation = live_state.rotation;
    let shadow_marble = shadow.insert_body(&desc).ok()?;
    shadow.set_velocity(shadow_marble, live_state.linvel, live_state.angvel);

    let mut points = vec![live_state.position];
    let mut cooldowns = CollisionRouter::new(settings.cooldown_steps);

    for step in 0..settings.steps {
        for event in shadow.step(settings.fixed_dt) {
            let (Some(body1), Some(body2)) = (
                shadow.collider_parent(event.collider1),
                shadow.collider_parent(event.collider2),
            ) else {
                continue;
            };
            let other = if body1 == shadow_marble {
                body2
            } else if body2 == shadow_marble {
                body1
            } else {
                continue;
            };
            let Some(piece) = pieces.get(&other) else {
                continue;
            };

            if !cooldowns.accept(PairKey::new(shadow_marble, other), u64::from(step)) {
                continue;
            }
            redirect_marble(&mut shadow, shadow_marble, piece, models, &settings.redirect);
        }

        let Some(state) = shadow.body_state(shadow_marble) else {
            break;
        };
        points.push(state.position);
        if state.position.y < settings.floor {
            break;
        }
    }

    tracing::debug!("[preview] {} -> {} points", marble.id, points.len());
    Some(Trajectory {
        marble: marble.id,
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetLibrary;
    use crate::model::ShapeKind;
    use crate::registry::BodyRegistry;
    use crate::test_utils::{FakeWorld, model_at};

    fn settings() -> PredictionSettings {
        PredictionSettings::from_config(&SandboxConfig::default())
    }

    /// Marble at y = 20 above a plank at y = 10, cylinder off to the side at y = 0.
    fn track() -> (FakeWorld, BodyRegistry, Vec<Model>) {
        let assets = AssetLibrary::builtin();
        let mut world = FakeWorld::with_gravity(SandboxConfig::default().gravity);
        let mut registry = BodyRegistry::new();
        let mut models = vec![
            model_at(1, ShapeKind::Plank, Vec3::new(0.0, 10.0, 0.0), Vec3::new(8.0, 0.5, 3.0)),
            model_at(2, ShapeKind::Cylinder, Vec3::new(20.0, 0.0, 0.0), Vec3::splat(2.0)),
            model_at(3, ShapeKind::Marble, Vec3::new(0.0, 20.0, 0.0), Vec3::ONE),
        ];
        for model in &mut models {
            registry.create_body(&mut world, model, &assets);
        }
        (world, registry, models)
    }

    #[test]
    fn test_no_marble_no_trajectory() {
        let (world, _, mut models) = track();
        models.pop();
        let assets = AssetLibrary::builtin();
        assert!(predict_trajectory(&world, &models, &assets, &settings()).is_none());
    }

    #[test]
    fn test_path_starts_at_marble_and_follows_redirect() {
        let (world, _, models) = track();
        let assets = AssetLibrary::builtin();
        let trajectory = predict_trajectory(&world, &models, &assets, &settings()).unwrap();

        assert_eq!(trajectory.marble, EntityId(3));
        assert_eq!(trajectory.points[0], Vec3::new(0.0, 20.0, 0.0));
        // Redirected by the plank toward the cylinder at x = 20.
        let furthest_x = trajectory.points.iter().map(|p| p.x).fold(f32::MIN, f32::max);
        assert!(furthest_x > 15.0, "path never left the plank: {furthest_x}");
        assert!(trajectory.points.len() <= 201);
    }

    #[test]
    fn test_stops_below_floor() {
        let (world, _, models) = track();
        let assets = AssetLibrary::builtin();
        let trajectory = predict_trajectory(&world, &models, &assets, &settings()).unwrap();
        let last = trajectory.points.last().unwrap();
        let below: Vec<_> = trajectory.points.iter().filter(|p| p.y < -200.0).collect();
        // Only the final point may be below the floor.
        assert!(below.len() <= 1);
        if below.len() == 1 {
            assert_eq!(below[0], last);
        }
    }

    #[test]
    fn test_live_world_untouched() {
        let (world, registry, models) = track();
        let assets = AssetLibrary::builtin();
        let marble = models[2].body.unwrap();
        let before = world.body_state(marble);

        predict_trajectory(&world, &models, &assets, &settings());

        assert_eq!(world.body_state(marble), before);
        assert_eq!(world.body_count(), 3);
        assert_eq!(world.steps, 0);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_prediction_is_repeatable() {
        let (world, _, models) = track();
        let assets = AssetLibrary::builtin();
        let first = predict_trajectory(&world, &models, &assets, &settings());
        let second = predict_trajectory(&world, &models, &assets, &settings());
        assert_eq!(first, second);
    }

    #[test]
    fn test_uses_live_velocity() {
        let (mut world, _, models) = track();
        let assets = AssetLibrary::builtin();
        let marble = models[2].body.unwrap();
        world.set_velocity(marble, Vec3::new(0.0, 0.0, 50.0), Vec3::ZERO);

        let trajectory = predict_trajectory(&world, &models, &assets, &settings()).unwrap();
        // Moving along z, the marble misses the plank entirely.
        assert!(trajectory.points[1].z > 0.0);
    }

    #[test]
    fn test_shadow_cooldown_matches_live_router() {
        let config = SandboxConfig::default();
        let live = CollisionRouter::new(cooldown_steps(config.collision_cooldown, config.fixed_dt));
        assert_eq!(settings().cooldown_steps, live.window_steps());
        assert_eq!(live.window_steps(), 9);
    }
}
