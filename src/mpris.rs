//! MPRIS bridge.
//!
//! Exposes `org.mpris.MediaPlayer2` and `org.mpris.MediaPlayer2.Player` on the
//! session bus. Method calls become [`ControlCmd`]s on the runtime channel;
//! the player pushes status and metadata back through [`MprisHandle`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_io::{Timer, block_on};
use tracing::{debug, warn};
use zbus::object_server::InterfaceRef;
use zbus::{Connection, interface};
use zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};

use crate::player::{MediaSession, PlayerStatus};
use crate::queue::{PlayMode, RepeatMode, Track};

const OBJECT_PATH: &str = "/org/mpris/MediaPlayer2";
const BUS_NAME: &str = "org.mpris.MediaPlayer2.encore";

#[derive(Clone, Debug, PartialEq)]
pub enum ControlCmd {
    Quit,
    Play,
    Pause,
    PlayPause,
    Stop,
    Next,
    Prev,
    /// Relative seek in microseconds, as MPRIS `Seek` sends it.
    SeekBy(i64),
    SeekTo(Duration),
    Goto(u32),
    /// Play the queued copy of a song, by song id.
    PlaySong(u64),
    /// Scan a file or directory and queue what it finds; `None` appends.
    Enqueue {
        path: PathBuf,
        index: Option<i64>,
    },
    Clear,
    SetPlayMode(PlayMode),
    SetRepeatMode(RepeatMode),
    CycleRepeat,
    List,
    Status,
}

#[derive(Debug, Default)]
struct SharedState {
    playback: PlayerStatus,
    play_mode: PlayMode,
    repeat_mode: RepeatMode,
    title: Option<String>,
    artist: Vec<String>,
    album: Option<String>,
    url: Option<String>,
    length_micros: Option<i64>,
    track_id: Option<OwnedObjectPath>,
}

/// Cheap handle the player uses to publish state to the bus.
#[derive(Clone)]
pub struct MprisHandle {
    state: Arc<Mutex<SharedState>>,
    notify: Sender<()>,
}

impl MprisHandle {
    pub fn set_playback(&self, playback: PlayerStatus) {
        if let Ok(mut s) = self.state.lock() {
            s.playback = playback;
        }
        let _ = self.notify.send(());
    }

    pub fn set_modes(&self, play_mode: PlayMode, repeat_mode: RepeatMode) {
        if let Ok(mut s) = self.state.lock() {
            s.play_mode = play_mode;
            s.repeat_mode = repeat_mode;
        }
        let _ = self.notify.send(());
    }

    /// Replace the exported metadata. `None` clears it.
    pub fn set_track_metadata(&self, track: Option<&Track>) {
        if let Ok(mut s) = self.state.lock() {
            match track {
                Some(t) => {
                    s.title = Some(t.name().to_string());
                    s.artist = t.song.primary_artist_name.iter().cloned().collect();
                    s.album = t.song.primary_album_name.clone();
                    s.url = Some(format!("file://{}", t.song.file_path.display()));
                    s.length_micros = (t.song.seconds > 0.0)
                        .then(|| (t.song.seconds * 1_000_000.0).round() as i64);
                    s.track_id = ObjectPath::try_from(format!(
                        "{OBJECT_PATH}/track/{}",
                        t.entry().get()
                    ))
                    .ok()
                    .map(OwnedObjectPath::from);
                }
                None => {
                    s.title = None;
                    s.artist.clear();
                    s.album = None;
                    s.url = None;
                    s.length_micros = None;
                    s.track_id = None;
                }
            }
        }
        let _ = self.notify.send(());
    }
}

impl MediaSession for MprisHandle {
    fn now_playing(&self, track: Option<&Track>) {
        self.set_track_metadata(track);
    }

    fn set_status(&self, status: PlayerStatus) {
        self.set_playback(status);
    }
}

struct RootIface {
    tx: Sender<ControlCmd>,
}

#[interface(name = "org.mpris.MediaPlayer2")]
impl RootIface {
    fn raise(&self) {
        // Headless: nothing to raise.
    }

    fn quit(&self) {
        let _ = self.tx.send(ControlCmd::Quit);
    }

    #[zbus(property)]
    fn can_quit(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_raise(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn has_track_list(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn identity(&self) -> &str {
        "encore"
    }

    #[zbus(property)]
    fn supported_uri_schemes(&self) -> Vec<String> {
        vec!["file".to_string()]
    }

    #[zbus(property)]
    fn supported_mime_types(&self) -> Vec<String> {
        vec![]
    }
}

struct PlayerIface {
    tx: Sender<ControlCmd>,
    state: Arc<Mutex<SharedState>>,
}

fn owned(value: Value<'_>) -> Option<OwnedValue> {
    OwnedValue::try_from(value).ok()
}

#[interface(name = "org.mpris.MediaPlayer2.Player")]
impl PlayerIface {
    fn next(&self) {
        let _ = self.tx.send(ControlCmd::Next);
    }

    fn previous(&self) {
        let _ = self.tx.send(ControlCmd::Prev);
    }

    fn play(&self) {
        let _ = self.tx.send(ControlCmd::Play);
    }

    fn pause(&self) {
        let _ = self.tx.send(ControlCmd::Pause);
    }

    fn play_pause(&self) {
        let _ = self.tx.send(ControlCmd::PlayPause);
    }

    fn stop(&self) {
        let _ = self.tx.send(ControlCmd::Stop);
    }

    fn seek(&self, offset: i64) {
        let _ = self.tx.send(ControlCmd::SeekBy(offset));
    }

    #[zbus(property)]
    fn playback_status(&self) -> &str {
        let Ok(s) = self.state.lock() else {
            return "Stopped";
        };
        match s.playback {
            PlayerStatus::Stopped => "Stopped",
            PlayerStatus::Playing => "Playing",
            PlayerStatus::Paused => "Paused",
        }
    }

    #[zbus(property)]
    fn loop_status(&self) -> &str {
        let Ok(s) = self.state.lock() else {
            return "None";
        };
        match s.repeat_mode {
            RepeatMode::Disabled => "None",
            RepeatMode::All => "Playlist",
            RepeatMode::One => "Track",
        }
    }

    #[zbus(property)]
    fn set_loop_status(&mut self, value: String) {
        let mode = match value.as_str() {
            "Playlist" => RepeatMode::All,
            "Track" => RepeatMode::One,
            _ => RepeatMode::Disabled,
        };
        let _ = self.tx.send(ControlCmd::SetRepeatMode(mode));
    }

    #[zbus(property)]
    fn shuffle(&self) -> bool {
        self.state
            .lock()
            .map(|s| s.play_mode == PlayMode::Random)
            .unwrap_or(false)
    }

    #[zbus(property)]
    fn set_shuffle(&mut self, value: bool) {
        let mode = if value {
            PlayMode::Random
        } else {
            PlayMode::Sequence
        };
        let _ = self.tx.send(ControlCmd::SetPlayMode(mode));
    }

    #[zbus(property)]
    fn can_control(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_play(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_pause(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_seek(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_next(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_previous(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn metadata(&self) -> HashMap<String, OwnedValue> {
        let mut map = HashMap::new();
        let Ok(s) = self.state.lock() else {
            return map;
        };

        let track_id = s.track_id.as_ref().map(|id| Value::ObjectPath(id.clone().into_inner()));
        if let Some(v) = track_id.and_then(owned) {
            map.insert("mpris:trackid".to_string(), v);
        }
        if let Some(v) = s.title.as_ref().and_then(|t| owned(Value::from(t.clone()))) {
            map.insert("xesam:title".to_string(), v);
        }
        if !s.artist.is_empty() {
            if let Some(v) = owned(Value::from(s.artist.clone())) {
                map.insert("xesam:artist".to_string(), v);
            }
        }
        if let Some(v) = s.album.as_ref().and_then(|a| owned(Value::from(a.clone()))) {
            map.insert("xesam:album".to_string(), v);
        }
        if let Some(v) = s.url.as_ref().and_then(|u| owned(Value::from(u.clone()))) {
            map.insert("xesam:url".to_string(), v);
        }
        if let Some(v) = s.length_micros.and_then(|l| owned(Value::from(l))) {
            map.insert("mpris:length".to_string(), v);
        }
        map
    }
}

/// Emit `PropertiesChanged` for everything the player may have touched.
async fn announce(iface: &InterfaceRef<PlayerIface>) -> zbus::Result<()> {
    let emitter = iface.signal_emitter();
    let player = iface.get().await;
    player.playback_status_changed(emitter).await?;
    player.metadata_changed(emitter).await?;
    player.loop_status_changed(emitter).await?;
    player.shuffle_changed(emitter).await
}

async fn serve(
    tx: Sender<ControlCmd>,
    state: Arc<Mutex<SharedState>>,
    notify: Receiver<()>,
) -> zbus::Result<()> {
    let connection = Connection::session().await?;
    connection.request_name(BUS_NAME).await?;

    let object_server = connection.object_server();
    object_server
        .at(OBJECT_PATH, RootIface { tx: tx.clone() })
        .await?;
    object_server
        .at(OBJECT_PATH, PlayerIface { tx, state })
        .await?;
    let iface = object_server
        .interface::<_, PlayerIface>(OBJECT_PATH)
        .await?;
    debug!(name = BUS_NAME, "mpris service registered");

    loop {
        Timer::after(Duration::from_millis(200)).await;
        let mut changed = false;
        loop {
            match notify.try_recv() {
                Ok(()) => changed = true,
                Err(mpsc::TryRecvError::Empty) => break,
                // The player is gone; keep the name until the process exits.
                Err(mpsc::TryRecvError::Disconnected) => return Ok(()),
            }
        }
        if changed {
            if let Err(e) = announce(&iface).await {
                debug!(error = %e, "failed to emit mpris property changes");
            }
        }
    }
}

/// Start the MPRIS service on its own thread.
///
/// Bus failures are logged and otherwise ignored; the returned handle keeps
/// working either way.
pub fn spawn_mpris(tx: Sender<ControlCmd>) -> MprisHandle {
    let state = Arc::new(Mutex::new(SharedState::default()));
    let (notify_tx, notify_rx) = mpsc::channel::<()>();

    let state_for_thread = state.clone();
    std::thread::spawn(move || {
        if let Err(e) = block_on(serve(tx, state_for_thread, notify_rx)) {
            warn!(error = %e, "mpris unavailable");
        }
    });

    MprisHandle {
        state,
        notify: notify_tx,
    }
}
