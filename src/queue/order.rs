//! Helpers to derive the play-order view from the queue.
//!
//! The view is a permutation of the queue's entries. It is never edited in
//! place by callers; the queue rebuilds it whenever it has been invalidated.

use rand::Rng;

use super::model::{EntryId, PlayMode, Track};

pub(super) fn build_play_order<R: Rng + ?Sized>(
    items: &[Track],
    mode: PlayMode,
    rng: &mut R,
) -> Vec<EntryId> {
    let mut order: Vec<EntryId> = items.iter().map(Track::entry).collect();
    match mode {
        PlayMode::Random => fisher_yates(&mut order, rng),
        // Smart has no policy of its own yet and keeps queue order.
        PlayMode::Sequence | PlayMode::Smart | PlayMode::Custom => {}
    }
    order
}

/// Uniform in-place shuffle: for each index from the end down to 1, swap it
/// with a random index in `[0, i]`.
pub(super) fn fisher_yates<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

/// Entry after `index` in `order`, wrapping to the front only when `wrap` is set.
///
/// `index` is `None` when the current entry is missing from the view; it then
/// behaves like position -1, so the first entry comes next.
pub(super) fn step_forward(order: &[EntryId], index: Option<usize>, wrap: bool) -> Option<EntryId> {
    let next = index.map_or(0, |i| i + 1);
    match order.get(next) {
        Some(&e) => Some(e),
        None if wrap => order.first().copied(),
        None => None,
    }
}

/// Entry before `index` in `order`, wrapping to the back only when `wrap` is set.
pub(super) fn step_backward(order: &[EntryId], index: Option<usize>, wrap: bool) -> Option<EntryId> {
    match index {
        Some(i) if i > 0 => order.get(i - 1).copied(),
        _ if wrap => order.last().copied(),
        _ => None,
    }
}
