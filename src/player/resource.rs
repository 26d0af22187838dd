//! The audio output seam.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use super::types::ResourceEvent;

#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("failed to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path:?}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("no audio output device: {0}")]
    Output(String),

    #[error("nothing is loaded")]
    NothingLoaded,
}

/// A single playable output, modelled on a media element.
///
/// Calls are fire-and-forget; outcomes arrive later as [`ResourceEvent`]s
/// returned from [`drain_events`](AudioResource::drain_events).
pub trait AudioResource {
    /// Replace the loaded source. Playback does not start.
    fn load(&mut self, path: &Path) -> Result<(), ResourceError>;

    /// Request playback; a `Playing` event follows on success.
    fn play(&mut self) -> Result<(), ResourceError>;

    /// Request a pause; a `Pause` event follows if the output was playing.
    fn pause(&mut self);

    fn set_position(&mut self, position: Duration);

    fn position(&self) -> Duration;

    /// Length of the loaded source, when the decoder knows it.
    fn duration(&self) -> Option<Duration>;

    /// Take every event emitted since the last call, oldest first.
    fn drain_events(&mut self) -> Vec<ResourceEvent>;
}
