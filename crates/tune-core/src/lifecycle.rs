//! Marble reset bookkeeping.
//!
//! A marble that reaches the end of the track or falls below every piece is
//! reset to where it was placed after a short grace period. This module
//! tracks placement origins and the single pending reset of each marble; the
//! sandbox performs the actual remove-and-respawn when the timer fires.

use std::collections::HashMap;

use glam::Vec3;

use crate::model::{EntityId, Model, ShapeKind};
use crate::schedule::{Scheduler, TimerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Struck the last piece of the track.
    ReachedEnd,
    /// Dropped below the lowest piece.
    FellOffTrack,
}

/// Height of the lowest simulated piece, if any.
pub fn lowest_piece_height(models: &[Model]) -> Option<f32> {
    models
        .iter()
        .filter(|model| !model.is_marble() && !matches!(model.shape, ShapeKind::Decoration(_)))
        .map(|model| model.position().y)
        .min_by(f32::total_cmp)
}

#[derive(Debug, Default)]
pub struct MarbleLifecycle {
    origins: HashMap<EntityId, Vec3>,
    pending: HashMap<EntityId, (TimerId, RemovalReason)>,
}

impl MarbleLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remembers where a marble was placed.
    pub fn store_origin(&mut self, marble: EntityId, position: Vec3) {
        self.origins.insert(marble, position);
    }

    pub fn origin(&self, marble: EntityId) -> Option<Vec3> {
        self.origins.get(&marble).copied()
    }

    pub fn pending_reason(&self, marble: EntityId) -> Option<RemovalReason> {
        self.pending.get(&marble).map(|(_, reason)| *reason)
    }

    /// Arms the reset timer of a marble unless one is already running.
    pub fn arm(
        &mut self,
        marble: EntityId,
        reason: RemovalReason,
        schedule: impl FnOnce(EntityId) -> TimerId,
    ) -> bool {
        if self.pending.contains_key(&marble) {
            return false;
        }
        self.pending.insert(marble, (schedule(marble), reason));
        tracing::info!("[lifecycle] {} scheduled for reset ({:?})", marble, reason);
        true
    }

    /// Simulated marbles below the lowest piece that have no reset pending.
    pub fn fallen(&self, models: &[Model]) -> Vec<EntityId> {
        let Some(lowest) = lowest_piece_height(models) else {
            return Vec::new();
        };
        models
            .iter()
            .filter(|model| model.is_marble() && model.body.is_some())
            .filter(|model| model.position().y < lowest)
            .filter(|model| !self.pending.contains_key(&model.id))
            .map(|model| model.id)
            .collect()
    }

    /// Consumes a fired reset and returns the origin to respawn at.
    pub fn expire(&mut self, marble: EntityId) -> Option<Vec3> {
        self.pending.remove(&marble);
        self.origins.remove(&marble)
    }

    /// Forgets a deleted marble and cancels its pending reset.
    pub fn forget<T>(&mut self, marble: EntityId, scheduler: &mut Scheduler<T>) {
        if let Some((timer, _)) = self.pending.remove(&marble) {
            scheduler.cancel(timer);
            tracing::info!("[lifecycle] {} reset cancelled", marble);
        }
        self.origins.remove(&marble);
    }

    /// Drops all state; the caller clears the scheduler.
    pub fn reset(&mut self) {
        self.origins.clear();
        self.pending.clear();
    }
}
