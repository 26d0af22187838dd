use crate::config;
use crate::error::Error;

/// Load settings, falling back to defaults when loading fails.
///
/// Logging is not up yet when this runs, so the failure is handed back for
/// the caller to report.
pub fn load_settings() -> (config::Settings, Option<Error>) {
    match config::Settings::load() {
        Ok(s) => (s, None),
        Err(e) => (config::Settings::default(), Some(e)),
    }
}
