//! Collision routing.
//!
//! Turns raw collision-start events into gameplay: a marble striking a piece
//! plays the piece's note and is launched toward the next piece, or is
//! flagged as having reached the end of the track.

use std::collections::HashMap;

use glam::Vec3;

use crate::backend::{BodyHandle, CollisionStarted, PhysicsBackend};
use crate::model::{EntityId, Model, ShapeKind};
use crate::registry::BodyRegistry;
use crate::solver::LaunchSettings;
use crate::target::next_target;

/// Unordered pair of bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairKey(BodyHandle, BodyHandle);

impl PairKey {
    pub fn new(a: BodyHandle, b: BodyHandle) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }

    pub fn involves(&self, handle: BodyHandle) -> bool {
        self.0 == handle || self.1 == handle
    }
}

/// Settings for redirecting a marble after it strikes a piece.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RedirectSettings {
    pub launch: LaunchSettings,
    pub tie_epsilon: f32,
    pub end_upward_damping: f32,
}

/// What happened to a marble after striking a piece.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Redirect {
    /// Launched toward `target`.
    Launched { target: EntityId, velocity: Vec3 },
    /// The piece was the last one on the track.
    ReachedEnd,
}

/// Applies the jump rule to a marble body that just struck `piece`.
///
/// Used both by the live router and by the trajectory preview, so the preview
/// follows exactly what the live world will do. Curves carry the marble
/// along their surface and never redirect it.
pub fn redirect_marble<B: PhysicsBackend>(
    world: &mut B,
    marble: BodyHandle,
    piece: &Model,
    models: &[Model],
    settings: &RedirectSettings,
) -> Option<Redirect> {
    if piece.shape == ShapeKind::Curve {
        return None;
    }
    let state = world.body_state(marble)?;

    let target = next_target(piece, models, settings.tie_epsilon)
        .and_then(|id| models.iter().find(|model| model.id == id));
    match target {
        Some(target) => {
            let velocity = settings.launch.velocity_to(state.position, target.position());
            world.set_velocity(marble, velocity, Vec3::ZERO);
            Some(Redirect::Launched {
                target: target.id,
                velocity,
            })
        }
        None => {
            if state.linvel.y > 0.0 {
                let damped = Vec3::new(
                    state.linvel.x,
                    state.linvel.y * settings.end_upward_damping,
                    state.linvel.z,
                );
                world.set_velocity(marble, damped, state.angvel);
            }
            Some(Redirect::ReachedEnd)
        }
    }
}

/// Effects produced by one routed collision.
#[derive(Debug, Clone, PartialEq)]
pub enum RouterEvent {
    /// A marble struck a piece; `note` is the sample to play, if any.
    PieceStruck {
        marble: EntityId,
        piece: EntityId,
        note: Option<String>,
    },
    Redirected {
        marble: EntityId,
        piece: EntityId,
        target: EntityId,
        velocity: Vec3,
    },
    ReachedEnd {
        marble: EntityId,
        piece: EntityId,
    },
}

/// Number of fixed steps covered by a cooldown window of `window` seconds.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn cooldown_steps(window: f32, fixed_dt: f32) -> u64 {
    if window > 0.0 && fixed_dt > 0.0 {
        (window / fixed_dt).round() as u64
    } else {
        0
    }
}

/// Routes live collision events, one effect per pair per cooldown window.
///
/// Time is counted in fixed steps, the same clock the trajectory preview
/// replays on.
#[derive(Debug)]
pub struct CollisionRouter {
    cooldowns: HashMap<PairKey, u64>,
    window_steps: u64,
}

impl CollisionRouter {
    pub fn new(window_steps: u64) -> Self {
        Self {
            cooldowns: HashMap::new(),
            window_steps,
        }
    }

    pub fn window_steps(&self) -> u64 {
        self.window_steps
    }

    /// Records the pair at `step` unless it was accepted fewer than
    /// `window_steps` steps ago.
    pub fn accept(&mut self, key: PairKey, step: u64) -> bool {
        if let Some(last) = self.cooldowns.get(&key)
            && step.saturating_sub(*last) < self.window_steps
        {
            return false;
        }
        self.cooldowns.insert(key, step);
        true
    }

    pub fn route<B: PhysicsBackend>(
        &mut self,
        world: &mut B,
        registry: &BodyRegistry,
        models: &[Model],
        event: CollisionStarted,
        step: u64,
        settings: &RedirectSettings,
    ) -> Vec<RouterEvent> {
        let (Some(body1), Some(body2)) = (
            world.collider_parent(event.collider1),
            world.collider_parent(event.collider2),
        ) else {
            return Vec::new();
        };
        let (Some(entity1), Some(entity2)) = (registry.entity_of(body1), registry.entity_of(body2))
        else {
            return Vec::new();
        };
        let (Some(model1), Some(model2)) = (
            models.iter().find(|m| m.id == entity1),
            models.iter().find(|m| m.id == entity2),
        ) else {
            return Vec::new();
        };

        if !self.accept(PairKey::new(body1, body2), step) {
            return Vec::new();
        }

        let (marble, marble_body, piece) = match (model1.is_marble(), model2.is_marble()) {
            (true, false) => (model1, body1, model2),
            (false, true) => (model2, body2, model1),
            _ => return Vec::new(),
        };
        if piece.shape == ShapeKind::Curve {
            return Vec::new();
        }

        tracing::debug!("[router] {} struck {} ({})", marble.id, piece.id, piece.shape);
        let mut events = vec![RouterEvent::PieceStruck {
            marble: marble.id,
            piece: piece.id,
            note: piece.note.as_ref().map(crate::model::NoteAssignment::name),
        }];

        match redirect_marble(world, marble_body, piece, models, settings) {
            Some(Redirect::Launched { target, velocity }) => {
                events.push(RouterEvent::Redirected {
                    marble: marble.id,
                    piece: piece.id,
                    target,
                    velocity,
                });
            }
            Some(Redirect::ReachedEnd) => {
                events.push(RouterEvent::ReachedEnd {
                    marble: marble.id,
                    piece: piece.id,
                });
            }
            None => {}
        }
        events
    }

    /// Drops cooldown records of a removed body.
    pub fn forget_body(&mut self, handle: BodyHandle) {
        self.cooldowns.retain(|key, _| !key.involves(handle));
    }

    pub fn clear(&mut self) {
        self.cooldowns.clear();
    }
}
