use crate::config;
use crate::player::{AudioResource, PlaybackEngine};
use crate::queue::Song;

pub const LIBRARY_PLAYLIST_ID: u64 = 0;
pub const LIBRARY_PLAYLIST_NAME: &str = "Library";

/// Apply configured traversal modes and queue the scanned library.
pub fn apply_playback_defaults<R: AudioResource>(
    engine: &mut PlaybackEngine<R>,
    settings: &config::Settings,
    songs: Vec<Song>,
) {
    engine.set_play_mode(settings.playback.play_mode.into());
    engine.set_repeat_mode(settings.playback.repeat_mode.into());
    engine.load_songs(LIBRARY_PLAYLIST_ID, LIBRARY_PLAYLIST_NAME, songs);
}
