//! Struck-piece highlighting.

use std::collections::HashMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::model::{EntityId, Model};
use crate::schedule::{Scheduler, TimerId};

/// Colour a struck piece lights up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HighlightColor {
    HotPink,
    SkyBlue,
    PastelYellow,
}

impl HighlightColor {
    pub const PALETTE: [Self; 3] = [Self::HotPink, Self::SkyBlue, Self::PastelYellow];

    /// `0xRRGGBB`.
    pub fn rgb(self) -> u32 {
        match self {
            Self::HotPink => 0x00ff_69b4,
            Self::SkyBlue => 0x0087_ceeb,
            Self::PastelYellow => 0x00ff_ffe0,
        }
    }
}

/// Lights struck pieces with a random palette colour and unlights them later.
#[derive(Debug)]
pub struct HighlightTracker {
    rng: ChaCha8Rng,
    pending: HashMap<EntityId, TimerId>,
}

impl HighlightTracker {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            pending: HashMap::new(),
        }
    }

    /// Lights `model` and schedules the clear through `schedule`.
    ///
    /// A piece that is already lit keeps its colour and timer. Returns the
    /// new colour, if one was picked.
    pub fn highlight(
        &mut self,
        model: &mut Model,
        schedule: impl FnOnce(EntityId) -> TimerId,
    ) -> Option<HighlightColor> {
        if model.highlight.is_some() {
            return None;
        }
        let color = HighlightColor::PALETTE[self.rng.random_range(0..HighlightColor::PALETTE.len())];
        model.highlight = Some(color);
        self.pending.insert(model.id, schedule(model.id));
        Some(color)
    }

    /// Unlights a piece whose timer fired.
    pub fn clear(&mut self, model: &mut Model) {
        self.pending.remove(&model.id);
        model.highlight = None;
    }

    /// Cancels the pending clear of a removed entity.
    pub fn forget<T>(&mut self, entity: EntityId, scheduler: &mut Scheduler<T>) {
        if let Some(timer) = self.pending.remove(&entity) {
            scheduler.cancel(timer);
        }
    }

    /// Drops every pending clear; the caller clears the scheduler.
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    pub fn is_pending(&self, entity: EntityId) -> bool {
        self.pending.contains_key(&entity)
    }
}
