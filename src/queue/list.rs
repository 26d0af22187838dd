//! The track queue and its cursor.

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::error::{Error, Result};
use crate::events::{EventBus, PlayerEvent};

use super::model::{Cursor, EntryId, PlayMode, RepeatMode, Song, Track, TrackStatus};
use super::order::{build_play_order, step_backward, step_forward};

/// Ordered list of tracks plus the current/previous/next cursor.
///
/// The play-order view is rebuilt lazily: mutations only mark it dirty and
/// the next cursor derivation rebuilds it. Random mode reshuffles on every
/// rebuild.
pub struct QueueModel {
    id: u64,
    name: String,
    items: Vec<Track>,
    play_order: Vec<EntryId>,
    order_dirty: bool,
    cursor: Cursor,
    previous: Option<EntryId>,
    next: Option<EntryId>,
    play_mode: PlayMode,
    repeat_mode: RepeatMode,
    rng: StdRng,
    bus: EventBus,
}

impl QueueModel {
    pub fn new(bus: EventBus) -> Self {
        Self::with_rng(bus, StdRng::from_os_rng())
    }

    /// Build a queue with an explicit RNG (deterministic shuffles in tests).
    pub fn with_rng(bus: EventBus, rng: StdRng) -> Self {
        Self {
            id: 0,
            name: String::new(),
            items: Vec::new(),
            play_order: Vec::new(),
            order_dirty: false,
            cursor: Cursor::Empty,
            previous: None,
            next: None,
            play_mode: PlayMode::default(),
            repeat_mode: RepeatMode::default(),
            rng,
            bus,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn items(&self) -> &[Track] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn play_mode(&self) -> PlayMode {
        self.play_mode
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Replace the whole queue. The cursor goes back to empty.
    pub fn load(&mut self, id: u64, name: impl Into<String>, tracks: Vec<Track>) {
        self.reset_cursor();
        self.id = id;
        self.name = name.into();
        self.items = tracks;
        self.play_order.clear();
        self.order_dirty = true;
        debug!(playlist = self.id, tracks = self.items.len(), "queue loaded");
    }

    /// Wrap songs into tracks numbered 1.. in list order, then [`load`](Self::load) them.
    pub fn load_songs(&mut self, id: u64, name: impl Into<String>, songs: Vec<Song>) {
        let tracks = songs
            .into_iter()
            .enumerate()
            .map(|(i, song)| Track::new(song, id, i as u32 + 1))
            .collect();
        self.load(id, name, tracks);
    }

    /// Insert `tracks` at `insert_index`, keeping their relative order.
    ///
    /// Every track from the insertion point to the end is renumbered. When
    /// nothing is current yet the cursor moves to the head of the play order;
    /// otherwise previous/next are recomputed around the current track.
    pub fn enqueue(&mut self, tracks: Vec<Track>, insert_index: i64) -> Result<()> {
        if insert_index < 0 {
            return Err(Error::InvalidArgument(format!(
                "insert index must not be negative, got {insert_index}"
            )));
        }
        if tracks.is_empty() {
            return Ok(());
        }

        let at = usize::try_from(insert_index)
            .unwrap_or(usize::MAX)
            .min(self.items.len());
        let added = tracks.len();
        self.items.splice(at..at, tracks);
        for (pos, track) in self.items.iter_mut().enumerate().skip(at) {
            track.sequence = pos as u32 + 1;
        }
        self.order_dirty = true;
        debug!(added, at, "tracks enqueued");

        if self.has_track() {
            self.refresh_neighbours();
        } else if let Some(first) = self.first_in_play_order() {
            self.set_playlist_cursor(first);
        }
        Ok(())
    }

    /// Point the cursor at `entry`. Returns whether the current track changed.
    ///
    /// Membership is not checked: an id from outside the queue still becomes
    /// current, and [`current`](Self::current) then reports `None`.
    pub fn set_current(&mut self, entry: EntryId) -> bool {
        if self.cursor == Cursor::Loaded(entry) {
            return false;
        }
        self.set_playlist_cursor(entry)
    }

    /// Move to the next entry of the play order. Returns the new current track.
    pub fn get_next(&mut self) -> Option<Track> {
        let next = self.derive_next()?;
        self.set_playlist_cursor(next);
        self.current().cloned()
    }

    /// Move to the previous entry of the play order. Returns the new current track.
    pub fn get_previous(&mut self) -> Option<Track> {
        let previous = self.derive_previous()?;
        self.set_playlist_cursor(previous);
        self.current().cloned()
    }

    /// The track [`get_next`](Self::get_next) would move to, without moving.
    pub fn peek_next(&mut self) -> Option<&Track> {
        self.refresh_neighbours();
        let next = self.next?;
        self.track(next)
    }

    /// The track [`get_previous`](Self::get_previous) would move to, without moving.
    pub fn peek_previous(&mut self) -> Option<&Track> {
        self.refresh_neighbours();
        let previous = self.previous?;
        self.track(previous)
    }

    pub fn has_track(&self) -> bool {
        self.cursor != Cursor::Empty
    }

    pub fn has_tracks(&self) -> bool {
        !self.items.is_empty()
    }

    pub fn current(&self) -> Option<&Track> {
        self.cursor.entry().and_then(|e| self.track(e))
    }

    /// The current track, or the shared empty track when nothing is loaded.
    pub fn current_or_empty(&self) -> &Track {
        self.current().unwrap_or_else(|| Track::empty())
    }

    pub fn track(&self, entry: EntryId) -> Option<&Track> {
        self.items.iter().find(|t| t.entry() == entry)
    }

    pub fn contains(&self, song: &Song) -> bool {
        self.items.iter().any(|t| t.song_id() == song.song_id)
    }

    /// Entry for `song`. With duplicates the last one wins.
    pub fn get_track(&self, song: &Song) -> Option<&Track> {
        self.get_track_by_id(song.song_id)
    }

    /// Entry for `song_id`. With duplicates the last one wins.
    pub fn get_track_by_id(&self, song_id: u64) -> Option<&Track> {
        self.items.iter().rev().find(|t| t.song_id() == song_id)
    }

    pub fn get_track_by_sequence(&self, sequence: u32) -> Option<&Track> {
        self.items.iter().find(|t| t.sequence == sequence)
    }

    pub fn clear(&mut self) {
        self.reset_cursor();
        self.items.clear();
        self.play_order.clear();
        self.order_dirty = false;
    }

    pub fn set_play_mode(&mut self, mode: PlayMode) {
        if self.play_mode == mode {
            return;
        }
        self.play_mode = mode;
        self.order_dirty = true;
        if self.has_track() {
            self.refresh_neighbours();
        }
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat_mode = mode;
        if self.has_track() {
            self.refresh_neighbours();
        }
    }

    /// Record a new status for `entry`, publishing the change.
    ///
    /// Returns the previous status, or `None` when the entry is not queued.
    pub fn set_track_status(&mut self, entry: EntryId, status: TrackStatus) -> Option<TrackStatus> {
        let track = self.items.iter_mut().find(|t| t.entry() == entry)?;
        let old = track.replace_status(status);
        if old != status {
            let track = track.clone();
            self.bus
                .publish(PlayerEvent::TrackStatusChanged { track, old, new: status });
        }
        Some(old)
    }

    /// The play-order view, rebuilt first if it was invalidated.
    pub fn play_order(&mut self) -> &[EntryId] {
        self.ensure_play_order();
        &self.play_order
    }

    pub fn first_in_play_order(&mut self) -> Option<EntryId> {
        self.play_order().first().copied()
    }

    fn ensure_play_order(&mut self) {
        if self.order_dirty {
            self.play_order = build_play_order(&self.items, self.play_mode, &mut self.rng);
            self.order_dirty = false;
        }
    }

    fn current_index_in_order(&mut self, current: EntryId) -> Option<usize> {
        self.ensure_play_order();
        self.play_order.iter().position(|&e| e == current)
    }

    fn derive_next(&mut self) -> Option<EntryId> {
        let current = self.cursor.entry()?;
        if self.repeat_mode == RepeatMode::One {
            return Some(current);
        }
        let index = self.current_index_in_order(current);
        step_forward(&self.play_order, index, self.repeat_mode == RepeatMode::All)
    }

    fn derive_previous(&mut self) -> Option<EntryId> {
        let current = self.cursor.entry()?;
        if self.repeat_mode == RepeatMode::One {
            return Some(current);
        }
        let index = self.current_index_in_order(current);
        step_backward(&self.play_order, index, self.repeat_mode == RepeatMode::All)
    }

    fn refresh_neighbours(&mut self) {
        self.next = self.derive_next();
        self.previous = self.derive_previous();
    }

    /// Swap the current track, keeping per-track statuses and neighbours in step.
    fn set_playlist_cursor(&mut self, entry: EntryId) -> bool {
        if let (Some(current), Some(incoming)) = (self.current(), self.track(entry)) {
            if current.same_slot(incoming) {
                return false;
            }
        }

        let old = self.current().cloned();
        if let Some(old_track) = &old {
            if old_track.status() != TrackStatus::Empty {
                self.set_track_status(old_track.entry(), TrackStatus::Empty);
            }
        }

        self.cursor = Cursor::Loaded(entry);
        self.refresh_neighbours();

        if self
            .current()
            .is_some_and(|t| t.status() != TrackStatus::Stopped)
        {
            self.set_track_status(entry, TrackStatus::Stopped);
        }

        let new = self.current().cloned();
        self.bus.publish(PlayerEvent::CurrentTrackChanged { old, new });
        true
    }

    fn reset_cursor(&mut self) {
        let old = self.current().cloned();
        let was_loaded = self.has_track();
        self.cursor = Cursor::Empty;
        self.previous = None;
        self.next = None;
        if was_loaded {
            self.bus
                .publish(PlayerEvent::CurrentTrackChanged { old, new: None });
        }
    }
}
