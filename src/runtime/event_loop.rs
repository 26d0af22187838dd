use std::path::Path;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::config::{self, LibrarySettings};
use crate::events::PlayerEvent;
use crate::library::scan;
use crate::mpris::{ControlCmd, MprisHandle};
use crate::player::{AudioResource, Completion, PlaybackEngine, Player, PlayerState, PlayerStatus};
use crate::queue::{QueueModel, Track};

/// Whether the loop should keep running after a command.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

fn mmss(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// One-line summary printed by the `status` command.
pub fn format_status(state: &PlayerState) -> String {
    let mut line = format!("[{:?}]", state.status);
    if state.flags.loading {
        line.push_str(" (loading)");
    }
    if state.flags.stalled {
        line.push_str(" (stalled)");
    }
    if state.flags.error {
        line.push_str(" (error)");
    }

    match &state.current {
        Some(t) => {
            line.push_str(&format!(" {}. ", t.sequence));
            if let Some(artist) = &t.song.primary_artist_name {
                line.push_str(&format!("{artist} - "));
            }
            line.push_str(t.name());
            line.push_str(&format!(
                " {}/{} ({:.0}%)",
                mmss(state.position.elapsed),
                mmss(state.position.duration),
                state.position.percentage
            ));
        }
        None => line.push_str(" nothing selected"),
    }

    line.push_str(&format!(
        " mode={:?} repeat={:?}",
        state.play_mode, state.repeat_mode
    ));
    line
}

/// Numbered queue listing for the `list` command; `*` marks the current track.
pub fn format_queue(queue: &QueueModel) -> String {
    if queue.is_empty() {
        return format!("{}: empty", queue.name());
    }
    let current = queue.current_or_empty().entry();
    let mut out = format!("{} ({} tracks)", queue.name(), queue.len());
    for track in queue.items() {
        let mark = if track.entry() == current { '*' } else { ' ' };
        out.push_str(&format!("\n{mark}{:>4}. {}", track.sequence, track.name()));
    }
    out
}

fn report(what: &str, done: Completion) {
    if done.is_pending() {
        debug!(command = what, "waiting on the audio output");
    } else if done.try_result() == Some(false) {
        info!(command = what, "nothing to do");
    }
}

/// Scan `path` and queue what it finds at `index`, or at the end.
///
/// Files already queued keep their song id so lookups by song see every
/// copy; new files continue the numbering after the highest id.
fn enqueue_path<R: AudioResource>(
    engine: &mut PlaybackEngine<R>,
    path: &Path,
    index: Option<i64>,
    library: &LibrarySettings,
) {
    let songs = scan(path, library);
    if songs.is_empty() {
        warn!(path = ?path, "no audio files to add");
        return;
    }

    let queue = engine.queue();
    let mut last_id = queue.items().iter().map(Track::song_id).max().unwrap_or(0);
    let tracks: Vec<Track> = songs
        .into_iter()
        .map(|mut song| {
            let known = queue
                .items()
                .iter()
                .find(|t| t.song.file_path == song.file_path)
                .map(Track::song_id);
            song.song_id = known.unwrap_or_else(|| {
                last_id += 1;
                last_id
            });
            if let Some(existing) = queue.get_track(&song) {
                debug!(
                    song = song.song_id,
                    sequence = existing.sequence,
                    "already queued; adding another copy"
                );
            }
            Track::new(song, queue.id(), 0)
        })
        .collect();
    let index = index.unwrap_or(queue.len() as i64);

    let added = tracks.len();
    match engine.queue_mut().enqueue(tracks, index) {
        Ok(()) => info!(added, index, "tracks queued"),
        Err(e) => warn!(error = %e, "add failed"),
    }
}

/// Apply one control command to the engine.
pub fn dispatch<R: AudioResource>(
    engine: &mut PlaybackEngine<R>,
    cmd: ControlCmd,
    library: &LibrarySettings,
    mpris: Option<&MprisHandle>,
) -> Flow {
    debug!(?cmd, "control command");
    match cmd {
        ControlCmd::Quit => return Flow::Quit,
        ControlCmd::Play => {
            // From a full stop, "play" means start the selection.
            let done = if engine.status() == PlayerStatus::Stopped {
                engine.toggle_play()
            } else {
                engine.play()
            };
            report("play", done);
        }
        ControlCmd::Pause => engine.pause(),
        ControlCmd::PlayPause => report("toggle", engine.toggle_play()),
        ControlCmd::Stop => report("stop", engine.stop()),
        ControlCmd::Next => report("next", engine.play_next()),
        ControlCmd::Prev => {
            let threshold = engine.settings().previous_restart_threshold;
            let threshold = (!threshold.is_zero()).then_some(threshold);
            report("prev", engine.play_previous(threshold));
        }
        ControlCmd::SeekBy(micros) => {
            let elapsed = engine.position().elapsed;
            let offset = Duration::from_micros(micros.unsigned_abs());
            let target = if micros >= 0 {
                elapsed + offset
            } else {
                elapsed.saturating_sub(offset)
            };
            engine.seek(target);
        }
        ControlCmd::SeekTo(target) => engine.seek(target),
        ControlCmd::Goto(sequence) => report("goto", engine.play_by_sequence(sequence)),
        ControlCmd::PlaySong(song_id) => {
            match engine.queue().get_track_by_id(song_id).map(Track::entry) {
                Some(entry) => report("song", engine.play_by_track(entry)),
                None => info!(song = song_id, "song is not queued"),
            }
        }
        ControlCmd::Enqueue { path, index } => enqueue_path(engine, &path, index, library),
        ControlCmd::Clear => {
            engine.clear_queue();
            info!("queue cleared");
        }
        ControlCmd::SetPlayMode(mode) => {
            engine.set_play_mode(mode);
            info!(?mode, "play mode set");
        }
        ControlCmd::SetRepeatMode(mode) => {
            engine.set_repeat_mode(mode);
            info!(?mode, "repeat mode set");
        }
        ControlCmd::CycleRepeat => {
            let mode = engine.queue().repeat_mode().cycle();
            engine.set_repeat_mode(mode);
            info!(?mode, "repeat mode set");
        }
        ControlCmd::List => println!("{}", format_queue(engine.queue())),
        ControlCmd::Status => println!("{}", format_status(&engine.state())),
    }

    if let Some(mpris) = mpris {
        mpris.set_modes(engine.queue().play_mode(), engine.queue().repeat_mode());
    }
    Flow::Continue
}

fn log_event(event: &PlayerEvent) {
    match event {
        PlayerEvent::CurrentTrackChanged { new: Some(t), .. } => {
            info!(sequence = t.sequence, song = t.song_id(), name = t.name(), "current track");
        }
        PlayerEvent::CurrentTrackChanged { new: None, .. } => info!("nothing selected"),
        PlayerEvent::PlayerStatusChanged { old, new, flags } if old != new => {
            info!(?old, ?new, ?flags, "player status");
        }
        PlayerEvent::PlayerStatusChanged { flags, .. } => debug!(?flags, "player flags"),
        PlayerEvent::PositionChanged { new, .. } => {
            trace!(elapsed = ?new.elapsed, percentage = new.percentage, "position");
        }
        PlayerEvent::TrackPlayCounted {
            track,
            count,
            percentage,
        } => debug!(song = track.song_id(), count, percentage, "play count"),
        PlayerEvent::TrackStatusChanged { track, old, new } => {
            debug!(song = track.song_id(), ?old, ?new, "track status");
        }
    }
}

/// Player loop: wait for a command or the next tick, then let the engine
/// process resource events and timers. Returns when `quit` arrives.
pub fn run<R: AudioResource>(
    engine: &mut PlaybackEngine<R>,
    settings: &config::Settings,
    mpris: &MprisHandle,
    control_rx: &Receiver<ControlCmd>,
    events: &Receiver<PlayerEvent>,
) {
    let tick = Duration::from_millis(settings.player.tick_ms.max(1));

    loop {
        match control_rx.recv_timeout(tick) {
            Ok(cmd) => {
                if dispatch(engine, cmd, &settings.library, Some(mpris)) == Flow::Quit {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        engine.pump(Instant::now());
        for event in events.try_iter() {
            log_event(&event);
        }
    }

    info!("shutting down");
    engine.pause();
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use tempfile::tempdir;

    use super::*;
    use crate::events::EventBus;
    use crate::player::{EngineSettings, ResourceError, ResourceEvent};
    use crate::queue::{PlayMode, QueueModel, RepeatMode, Song};

    /// Output that confirms every request on the next pump.
    #[derive(Default)]
    struct EchoResource {
        position: Duration,
        playing: bool,
        events: Vec<ResourceEvent>,
    }

    impl AudioResource for EchoResource {
        fn load(&mut self, _path: &Path) -> Result<(), ResourceError> {
            self.position = Duration::ZERO;
            self.playing = false;
            Ok(())
        }

        fn play(&mut self) -> Result<(), ResourceError> {
            self.playing = true;
            self.events.push(ResourceEvent::Playing);
            Ok(())
        }

        fn pause(&mut self) {
            if self.playing {
                self.playing = false;
                self.events.push(ResourceEvent::Pause);
            }
        }

        fn set_position(&mut self, position: Duration) {
            self.position = position;
        }

        fn position(&self) -> Duration {
            self.position
        }

        fn duration(&self) -> Option<Duration> {
            None
        }

        fn drain_events(&mut self) -> Vec<ResourceEvent> {
            std::mem::take(&mut self.events)
        }
    }

    fn lib() -> LibrarySettings {
        LibrarySettings::default()
    }

    fn sequences_and_ids(e: &PlaybackEngine<EchoResource>) -> Vec<(u32, u64)> {
        e.queue()
            .items()
            .iter()
            .map(|t| (t.sequence, t.song_id()))
            .collect()
    }

    fn engine() -> PlaybackEngine<EchoResource> {
        let mut engine = PlaybackEngine::new(
            EchoResource::default(),
            QueueModel::new(EventBus::new()),
            EngineSettings::default(),
        );
        let songs = (1..=3)
            .map(|i| Song {
                song_id: i,
                name: format!("Song {i}"),
                file_path: PathBuf::from(format!("/music/{i}.ogg")),
                seconds: 120.0,
                primary_artist_name: Some("Band".to_string()),
                ..Song::default()
            })
            .collect();
        engine.load_songs(0, "Library", songs);
        engine
    }

    #[test]
    fn quit_stops_the_loop() {
        let mut e = engine();
        assert_eq!(dispatch(&mut e, ControlCmd::Quit, &lib(), None), Flow::Quit);
        assert_eq!(dispatch(&mut e, ControlCmd::Status, &lib(), None), Flow::Continue);
    }

    #[test]
    fn play_from_stopped_starts_the_first_track() {
        let mut e = engine();
        dispatch(&mut e, ControlCmd::Play, &lib(), None);
        e.pump(Instant::now());

        assert_eq!(e.status(), PlayerStatus::Playing);
        assert_eq!(e.queue().current().map(|t| t.song_id()), Some(1));
    }

    #[test]
    fn goto_and_next_move_through_the_queue() {
        let mut e = engine();
        dispatch(&mut e, ControlCmd::Goto(2), &lib(), None);
        e.pump(Instant::now());
        dispatch(&mut e, ControlCmd::Next, &lib(), None);
        e.pump(Instant::now());
        e.pump(Instant::now());

        assert_eq!(e.queue().current().map(|t| t.song_id()), Some(3));
        assert_eq!(e.status(), PlayerStatus::Playing);
    }

    #[test]
    fn relative_seek_clamps_at_zero() {
        let mut e = engine();
        dispatch(&mut e, ControlCmd::Goto(1), &lib(), None);
        e.pump(Instant::now());

        dispatch(&mut e, ControlCmd::SeekTo(Duration::from_secs(30)), &lib(), None);
        assert_eq!(e.position().elapsed, Duration::from_secs(30));

        dispatch(&mut e, ControlCmd::SeekBy(5_000_000), &lib(), None);
        assert_eq!(e.position().elapsed, Duration::from_secs(35));

        dispatch(&mut e, ControlCmd::SeekBy(-60_000_000), &lib(), None);
        assert_eq!(e.position().elapsed, Duration::ZERO);
    }

    #[test]
    fn mode_commands_reach_the_queue() {
        let mut e = engine();
        dispatch(&mut e, ControlCmd::SetPlayMode(PlayMode::Random), &lib(), None);
        dispatch(&mut e, ControlCmd::SetRepeatMode(RepeatMode::One), &lib(), None);

        assert_eq!(e.queue().play_mode(), PlayMode::Random);
        assert_eq!(e.queue().repeat_mode(), RepeatMode::One);
    }

    #[test]
    fn status_line_describes_the_current_track() {
        let mut e = engine();
        assert_eq!(
            format_status(&e.state()),
            "[Stopped] nothing selected mode=Sequence repeat=Disabled"
        );

        dispatch(&mut e, ControlCmd::Goto(2), &lib(), None);
        e.pump(Instant::now());
        e.seek(Duration::from_secs(30));

        assert_eq!(
            format_status(&e.state()),
            "[Playing] 2. Band - Song 2 00:30/02:00 (25%) mode=Sequence repeat=Disabled"
        );
    }

    #[test]
    fn add_appends_scanned_files_with_fresh_song_ids() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.ogg"), b"not audio").unwrap();
        fs::write(dir.path().join("b.ogg"), b"not audio").unwrap();

        let mut e = engine();
        let cmd = ControlCmd::Enqueue {
            path: dir.path().to_path_buf(),
            index: None,
        };
        dispatch(&mut e, cmd, &lib(), None);

        assert_eq!(
            sequences_and_ids(&e),
            vec![(1, 1), (2, 2), (3, 3), (4, 4), (5, 5)]
        );
        assert_eq!(e.queue().items()[3].name(), "a");
    }

    #[test]
    fn insert_places_files_and_keeps_known_song_ids() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("x.ogg");
        fs::write(&file, b"not audio").unwrap();

        let mut e = engine();
        let add = |index| ControlCmd::Enqueue {
            path: file.clone(),
            index,
        };
        dispatch(&mut e, add(Some(0)), &lib(), None);
        dispatch(&mut e, add(Some(2)), &lib(), None);

        // The second copy is the same file, so it shares the first copy's id.
        assert_eq!(
            sequences_and_ids(&e),
            vec![(1, 4), (2, 1), (3, 4), (4, 2), (5, 3)]
        );
        assert_eq!(e.queue().get_track_by_id(4).map(|t| t.sequence), Some(3));
    }

    #[test]
    fn negative_insert_index_leaves_the_queue_alone() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("x.ogg"), b"not audio").unwrap();

        let mut e = engine();
        let cmd = ControlCmd::Enqueue {
            path: dir.path().to_path_buf(),
            index: Some(-1),
        };
        dispatch(&mut e, cmd, &lib(), None);
        assert_eq!(e.queue().len(), 3);
    }

    #[test]
    fn song_command_plays_by_song_id() {
        let mut e = engine();
        dispatch(&mut e, ControlCmd::PlaySong(3), &lib(), None);
        e.pump(Instant::now());
        assert_eq!(e.queue().current().map(|t| t.sequence), Some(3));

        dispatch(&mut e, ControlCmd::PlaySong(99), &lib(), None);
        assert_eq!(e.queue().current().map(|t| t.sequence), Some(3));
    }

    #[test]
    fn clear_stops_playback_and_empties_the_queue() {
        let mut e = engine();
        dispatch(&mut e, ControlCmd::Goto(1), &lib(), None);
        e.pump(Instant::now());

        dispatch(&mut e, ControlCmd::Clear, &lib(), None);
        assert_eq!(e.status(), PlayerStatus::Stopped);
        assert!(e.queue().is_empty());
        assert!(!e.queue().has_track());
        assert_eq!(format_queue(e.queue()), "Library: empty");
    }

    #[test]
    fn repeat_without_argument_cycles() {
        let mut e = engine();
        dispatch(&mut e, ControlCmd::CycleRepeat, &lib(), None);
        assert_eq!(e.queue().repeat_mode(), RepeatMode::All);
        dispatch(&mut e, ControlCmd::CycleRepeat, &lib(), None);
        assert_eq!(e.queue().repeat_mode(), RepeatMode::One);
        dispatch(&mut e, ControlCmd::CycleRepeat, &lib(), None);
        assert_eq!(e.queue().repeat_mode(), RepeatMode::Disabled);
    }

    #[test]
    fn queue_listing_marks_the_current_track() {
        let mut e = engine();
        dispatch(&mut e, ControlCmd::Goto(2), &lib(), None);
        e.pump(Instant::now());

        assert_eq!(
            format_queue(e.queue()),
            "Library (3 tracks)\n    1. Song 1\n*   2. Song 2\n    3. Song 3"
        );
    }
}
