//! Queue entry types: songs, tracks, cursor and traversal modes.

use std::path::PathBuf;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Display name of the "nothing loaded" track.
pub const EMPTY_TRACK_NAME: &str = "[Empty Song]";

/// Identity of one queue entry.
///
/// Every constructed [`Track`] gets a fresh id; clones keep it. Two tracks
/// built from the same song are different entries.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct EntryId(u64);

static NEXT_ENTRY: AtomicU64 = AtomicU64::new(1);

impl EntryId {
    /// Reserved for the empty-track display sentinel; never handed to a queue.
    const EMPTY: EntryId = EntryId(0);

    fn fresh() -> Self {
        Self(NEXT_ENTRY.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// A library record as supplied by the persistence layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Song {
    pub song_id: u64,
    pub name: String,
    pub file_path: PathBuf,
    /// Length in seconds; `0.0` when unknown.
    pub seconds: f64,
    pub primary_artist_name: Option<String>,
    pub primary_album_name: Option<String>,
    pub favorite: bool,
    pub image: Option<PathBuf>,
}

/// Last known playback status of a single queue entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum TrackStatus {
    #[default]
    Empty,
    Playing,
    Paused,
    Stopped,
}

/// A song placed in a playlist at a given sequence number.
#[derive(Debug, Clone)]
pub struct Track {
    entry: EntryId,
    pub song: Song,
    pub playlist_id: u64,
    /// 1-based position in the queue; rewritten when tracks are inserted.
    pub sequence: u32,
    status: TrackStatus,
}

impl Track {
    pub fn new(song: Song, playlist_id: u64, sequence: u32) -> Self {
        Self {
            entry: EntryId::fresh(),
            song,
            playlist_id,
            sequence,
            status: TrackStatus::Empty,
        }
    }

    /// The shared "nothing loaded" track, useful for rendering an empty cursor.
    pub fn empty() -> &'static Track {
        static EMPTY: OnceLock<Track> = OnceLock::new();
        EMPTY.get_or_init(|| Track {
            entry: EntryId::EMPTY,
            song: Song {
                name: EMPTY_TRACK_NAME.to_string(),
                ..Song::default()
            },
            playlist_id: 0,
            sequence: 0,
            status: TrackStatus::Empty,
        })
    }

    pub fn entry(&self) -> EntryId {
        self.entry
    }

    pub fn is_empty_track(&self) -> bool {
        self.entry == EntryId::EMPTY
    }

    pub fn status(&self) -> TrackStatus {
        self.status
    }

    pub(super) fn replace_status(&mut self, status: TrackStatus) -> TrackStatus {
        std::mem::replace(&mut self.status, status)
    }

    pub fn song_id(&self) -> u64 {
        self.song.song_id
    }

    pub fn name(&self) -> &str {
        &self.song.name
    }

    /// Whether both tracks occupy the same playlist slot.
    pub fn same_slot(&self, other: &Track) -> bool {
        self.playlist_id == other.playlist_id && self.sequence == other.sequence
    }
}

/// Which entry the queue currently points at.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Cursor {
    #[default]
    Empty,
    Loaded(EntryId),
}

impl Cursor {
    pub fn entry(self) -> Option<EntryId> {
        match self {
            Cursor::Empty => None,
            Cursor::Loaded(e) => Some(e),
        }
    }
}

/// How the play-order view is derived from the queue.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PlayMode {
    #[default]
    Sequence,
    Random,
    /// Not implemented yet: traverses in queue order.
    Smart,
    /// Follows the queue as arranged by the user.
    Custom,
}

/// Looping behavior at queue boundaries.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RepeatMode {
    #[default]
    Disabled,
    All,
    One,
}

impl RepeatMode {
    /// Cycle `Disabled -> All -> One -> Disabled`.
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::Disabled => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Disabled,
        }
    }
}
