use std::path::{Path, PathBuf};

use lofty::prelude::{Accessor, AudioFile, TaggedFileExt};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::LibrarySettings;
use crate::queue::Song;

/// File names checked, in order, for album art next to a track.
const COVER_NAMES: &[&str] = &["cover.jpg", "cover.png", "folder.jpg", "folder.png"];

pub(super) fn is_audio_file(path: &Path, settings: &LibrarySettings) -> bool {
    let exts: Vec<String> = settings
        .extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect();

    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            exts.iter().any(|e| e == &ext)
        })
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn non_blank(v: &str) -> Option<String> {
    let v = v.trim();
    (!v.is_empty()).then(|| v.to_string())
}

fn find_cover(path: &Path) -> Option<PathBuf> {
    let dir = path.parent()?;
    COVER_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Read one file into a song. Unreadable tags fall back to the file stem.
fn read_song(path: &Path) -> Song {
    let mut song = Song {
        name: path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("UNKNOWN")
            .to_string(),
        file_path: path.to_path_buf(),
        image: find_cover(path),
        ..Song::default()
    };

    match lofty::read_from_path(path) {
        Ok(tagged) => {
            song.seconds = tagged.properties().duration().as_secs_f64();

            if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
                if let Some(title) = tag.title().as_deref().and_then(non_blank) {
                    song.name = title;
                }
                song.primary_artist_name = tag.artist().as_deref().and_then(non_blank);
                song.primary_album_name = tag.album().as_deref().and_then(non_blank);
            }
        }
        Err(e) => debug!(?path, error = %e, "no readable tags"),
    }
    song
}

/// Scan `dir` for audio files.
///
/// Songs come back sorted by artist, then name (case-insensitive), with
/// `song_id`s numbered from 1 in that order.
pub fn scan(dir: &Path, settings: &LibrarySettings) -> Vec<Song> {
    let mut walker = WalkDir::new(dir).follow_links(settings.follow_links);

    // Non-recursive = only the root directory.
    let depth_cap = if settings.recursive {
        settings.max_depth
    } else {
        Some(1)
    };
    if let Some(d) = depth_cap {
        walker = walker.max_depth(d);
    }

    let mut songs: Vec<Song> = walker
        .into_iter()
        .filter_entry(|e| settings.include_hidden || e.depth() == 0 || !is_hidden(e.path()))
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_file() && is_audio_file(entry.path(), settings))
        .map(|entry| read_song(entry.path()))
        .collect();

    songs.sort_by_cached_key(|s| {
        (
            s.primary_artist_name.as_deref().unwrap_or("").to_lowercase(),
            s.name.to_lowercase(),
        )
    });
    for (i, song) in songs.iter_mut().enumerate() {
        song.song_id = i as u64 + 1;
    }

    info!(dir = ?dir, songs = songs.len(), "library scanned");
    songs
}
