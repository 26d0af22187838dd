use super::load::{default_config_path, resolve_config_path};
use super::schema::*;
use crate::error::Error;
use crate::queue::{PlayMode, RepeatMode};
use std::sync::{Mutex, OnceLock};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap()
}

struct EnvGuard {
    key: &'static str,
    old: Option<std::ffi::OsString>,
}

impl EnvGuard {
    fn set(key: &'static str, val: &str) -> Self {
        let old = std::env::var_os(key);
        unsafe {
            std::env::set_var(key, val);
        }
        Self { key, old }
    }

    fn remove(key: &'static str) -> Self {
        let old = std::env::var_os(key);
        unsafe {
            std::env::remove_var(key);
        }
        Self { key, old }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match self.old.take() {
            Some(v) => unsafe {
                std::env::set_var(self.key, v);
            },
            None => unsafe {
                std::env::remove_var(self.key);
            },
        }
    }
}

#[test]
fn resolve_config_path_prefers_encore_config_path() {
    let _lock = env_lock();
    let _g1 = EnvGuard::set("ENCORE_CONFIG_PATH", "/tmp/encore-test-config.toml");
    assert_eq!(
        resolve_config_path().unwrap(),
        std::path::PathBuf::from("/tmp/encore-test-config.toml")
    );
}

#[test]
fn default_config_path_prefers_xdg_config_home() {
    let _lock = env_lock();
    let _g1 = EnvGuard::set("XDG_CONFIG_HOME", "/tmp/xdg-config-home");
    let _g2 = EnvGuard::set("HOME", "/tmp/home-should-not-win");

    let p = default_config_path().unwrap();
    assert_eq!(
        p,
        std::path::PathBuf::from("/tmp/xdg-config-home")
            .join("encore")
            .join("config.toml")
    );
}

#[test]
fn default_config_path_falls_back_to_home_dot_config() {
    let _lock = env_lock();
    let _g1 = EnvGuard::remove("XDG_CONFIG_HOME");
    let _g2 = EnvGuard::set("HOME", "/tmp/home-dir");

    let p = default_config_path().unwrap();
    assert_eq!(
        p,
        std::path::PathBuf::from("/tmp/home-dir")
            .join(".config")
            .join("encore")
            .join("config.toml")
    );
}

#[test]
fn settings_load_from_config_file_and_parse_mode_aliases() {
    let _lock = env_lock();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("config.toml");
    std::fs::write(
        &cfg_path,
        r#"
[player]
play_percentage = 75.0
play_next_automatically = false
previous_restart_threshold_secs = 0
position_poll_ms = 250
stall_retry_ms = 1000
stop_timeout_ms = 2000
tick_ms = 50

[playback]
play_mode = "shuffle"
repeat_mode = "repeat_one"

[library]
extensions = ["flac"]
recursive = false
include_hidden = true
follow_links = false
max_depth = 2

[logging]
filter = "encore=debug"
"#,
    )
    .unwrap();

    let _g1 = EnvGuard::set("ENCORE_CONFIG_PATH", cfg_path.to_str().unwrap());
    let _g2 = EnvGuard::remove("ENCORE__PLAYER__TICK_MS");

    let s = Settings::load().unwrap();
    assert_eq!(s.player.play_percentage, 75.0);
    assert!(!s.player.play_next_automatically);
    assert_eq!(s.player.previous_restart_threshold_secs, 0);
    assert_eq!(s.player.position_poll_ms, 250);
    assert_eq!(s.player.stall_retry_ms, 1000);
    assert_eq!(s.player.stop_timeout_ms, 2000);
    assert_eq!(s.player.tick_ms, 50);
    assert_eq!(s.playback.play_mode, PlayModeSetting::Random);
    assert_eq!(s.playback.repeat_mode, RepeatModeSetting::One);
    assert_eq!(s.library.extensions, vec!["flac".to_string()]);
    assert!(!s.library.recursive);
    assert!(s.library.include_hidden);
    assert!(!s.library.follow_links);
    assert_eq!(s.library.max_depth, Some(2));
    assert_eq!(s.logging.filter, "encore=debug");
}

#[test]
fn missing_config_file_yields_defaults() {
    let _lock = env_lock();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("absent.toml");
    let _g1 = EnvGuard::set("ENCORE_CONFIG_PATH", cfg_path.to_str().unwrap());
    let _g2 = EnvGuard::remove("ENCORE__PLAYER__TICK_MS");

    let s = Settings::load().unwrap();
    assert_eq!(s.player.play_percentage, 50.0);
    assert!(s.player.play_next_automatically);
    assert_eq!(s.player.stop_timeout_ms, 0);
    assert_eq!(s.playback.play_mode, PlayModeSetting::Sequence);
    assert_eq!(s.playback.repeat_mode, RepeatModeSetting::Disabled);
    assert_eq!(s.logging.filter, "encore=info");
}

#[test]
fn settings_env_overrides_config_file() {
    let _lock = env_lock();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("config.toml");
    std::fs::write(
        &cfg_path,
        r#"
[player]
tick_ms = 100
"#,
    )
    .unwrap();

    let _g1 = EnvGuard::set("ENCORE_CONFIG_PATH", cfg_path.to_str().unwrap());
    let _g2 = EnvGuard::set("ENCORE__PLAYER__TICK_MS", "20");

    let s = Settings::load().unwrap();
    assert_eq!(s.player.tick_ms, 20);
}

#[test]
fn load_rejects_invalid_values() {
    let _lock = env_lock();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("config.toml");
    std::fs::write(
        &cfg_path,
        r#"
[player]
play_percentage = 140.0
"#,
    )
    .unwrap();

    let _g1 = EnvGuard::set("ENCORE_CONFIG_PATH", cfg_path.to_str().unwrap());
    let _g2 = EnvGuard::remove("ENCORE__PLAYER__TICK_MS");

    assert!(matches!(Settings::load(), Err(Error::Config(_))));
}

#[test]
fn validate_rejects_zero_intervals() {
    let mut s = Settings::default();
    assert!(s.validate().is_ok());

    s.player.position_poll_ms = 0;
    assert!(s.validate().is_err());

    s.player.position_poll_ms = 500;
    s.player.tick_ms = 0;
    assert!(s.validate().is_err());
}

#[test]
fn mode_settings_map_onto_queue_modes() {
    assert_eq!(PlayMode::from(PlayModeSetting::Random), PlayMode::Random);
    assert_eq!(PlayMode::from(PlayModeSetting::Custom), PlayMode::Custom);
    assert_eq!(RepeatMode::from(RepeatModeSetting::All), RepeatMode::All);
    assert_eq!(RepeatMode::from(RepeatModeSetting::Disabled), RepeatMode::Disabled);
}

#[test]
fn defaults_render_as_toml_that_loads_back() {
    let _lock = env_lock();

    let rendered = Settings::default().to_toml().unwrap();
    assert!(rendered.contains("[player]"));
    assert!(rendered.contains("play_mode = \"sequence\""));

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("config.toml");
    std::fs::write(&cfg_path, rendered).unwrap();
    let _g1 = EnvGuard::set("ENCORE_CONFIG_PATH", cfg_path.to_str().unwrap());
    let _g2 = EnvGuard::remove("ENCORE__PLAYER__TICK_MS");

    let s = Settings::load().unwrap();
    assert_eq!(s.player.tick_ms, 100);
    assert_eq!(s.library.extensions.len(), 4);
}
