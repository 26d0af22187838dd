use serde::{Deserialize, Serialize};

use crate::queue::{PlayMode, RepeatMode};

/// Top-level application settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/encore/config.toml` or `~/.config/encore/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `ENCORE__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub player: PlayerSettings,
    pub playback: PlaybackSettings,
    pub library: LibrarySettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// Percentage of a track that must play before it counts as listened.
    pub play_percentage: f64,
    /// Start the next track when the current one ends.
    pub play_next_automatically: bool,
    /// "Previous" restarts the current track once this many seconds have played.
    /// Set to 0 to always go back.
    pub previous_restart_threshold_secs: u64,
    /// How often the elapsed position is sampled while playing (milliseconds).
    pub position_poll_ms: u64,
    /// Delay before restarting a stalled track (milliseconds).
    pub stall_retry_ms: u64,
    /// Give up waiting for the output to confirm a stop after this long
    /// (milliseconds). 0 waits indefinitely.
    pub stop_timeout_ms: u64,
    /// Player loop tick (milliseconds).
    pub tick_ms: u64,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            play_percentage: 50.0,
            play_next_automatically: true,
            previous_restart_threshold_secs: 3,
            position_poll_ms: 500,
            stall_retry_ms: 5000,
            stop_timeout_ms: 0,
            tick_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PlaybackSettings {
    pub play_mode: PlayModeSetting,
    pub repeat_mode: RepeatModeSetting,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlayModeSetting {
    #[default]
    #[serde(alias = "sequential", alias = "in-order", alias = "in_order")]
    Sequence,
    #[serde(alias = "shuffle", alias = "shuffled")]
    Random,
    Smart,
    #[serde(alias = "manual")]
    Custom,
}

impl From<PlayModeSetting> for PlayMode {
    fn from(m: PlayModeSetting) -> Self {
        match m {
            PlayModeSetting::Sequence => PlayMode::Sequence,
            PlayModeSetting::Random => PlayMode::Random,
            PlayModeSetting::Smart => PlayMode::Smart,
            PlayModeSetting::Custom => PlayMode::Custom,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepeatModeSetting {
    #[default]
    #[serde(alias = "off", alias = "none", alias = "no-repeat", alias = "no_repeat")]
    Disabled,
    #[serde(
        alias = "repeat-all",
        alias = "repeat_all",
        alias = "loop-all",
        alias = "loop_all"
    )]
    All,
    #[serde(
        alias = "repeat-one",
        alias = "repeat_one",
        alias = "loop-one",
        alias = "loop_one"
    )]
    One,
}

impl From<RepeatModeSetting> for RepeatMode {
    fn from(m: RepeatModeSetting) -> Self {
        match m {
            RepeatModeSetting::Disabled => RepeatMode::Disabled,
            RepeatModeSetting::All => RepeatMode::All,
            RepeatModeSetting::One => RepeatMode::One,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// File extensions to treat as audio (case-insensitive, without dot).
    pub extensions: Vec<String>,
    /// Whether to follow symlinks during scanning.
    pub follow_links: bool,
    /// Whether to include hidden files/directories (dotfiles).
    pub include_hidden: bool,
    /// Whether to recurse into subdirectories.
    pub recursive: bool,
    /// Optional cap on directory recursion depth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            extensions: vec!["mp3".into(), "flac".into(), "wav".into(), "ogg".into()],
            follow_links: true,
            include_hidden: false,
            recursive: true,
            max_depth: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "encore=info".to_string(),
        }
    }
}
