//! Next-piece resolution.
//!
//! Pieces form an implicit track ordered from the highest to the lowest.
//! A marble striking a piece is sent to the piece after it, unless the
//! struck piece names an explicit next target.

use crate::model::{EntityId, Model};

/// Jump targets ordered by descending height.
///
/// Pieces whose heights differ by at most `epsilon` from the first piece of
/// their run count as level and keep insertion order among themselves.
pub fn track_order(models: &[Model], epsilon: f32) -> Vec<EntityId> {
    let mut candidates: Vec<(usize, &Model)> = models
        .iter()
        .enumerate()
        .filter(|(_, model)| model.shape.is_jump_target())
        .collect();
    candidates.sort_by(|(_, a), (_, b)| b.position().y.total_cmp(&a.position().y));

    let mut ordered = Vec::with_capacity(candidates.len());
    let mut rest = candidates.as_slice();
    while let Some(((_, leader), _)) = rest.split_first() {
        let level = leader.position().y;
        let run = rest
            .iter()
            .take_while(|(_, model)| (model.position().y - level).abs() <= epsilon)
            .count();
        let (group, tail) = rest.split_at(run);
        let mut group = group.to_vec();
        group.sort_by(|(a, _), (b, _)| a.cmp(b));
        ordered.extend(group.into_iter().map(|(_, model)| model.id));
        rest = tail;
    }
    ordered
}

/// Piece a marble should jump to after striking `current`.
///
/// An explicit override always wins. Otherwise the piece following `current`
/// in [`track_order`]; `None` when `current` is last or not on the track.
pub fn next_target(current: &Model, models: &[Model], epsilon: f32) -> Option<EntityId> {
    if let Some(target) = current.next_target {
        return Some(target);
    }

    let order = track_order(models, epsilon);
    let index = order.iter().position(|id| *id == current.id)?;
    order.get(index + 1).copied()
}
