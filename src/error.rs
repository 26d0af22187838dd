//! Error types shared by the queue model, the player and the runtime.

use thiserror::Error;

/// Errors surfaced by the player core.
///
/// Resource failures are normally absorbed by the playback engine and turned
/// into state flags; only contract violations such as a negative insertion
/// index are expected to reach callers.
#[derive(Error, Debug)]
pub enum Error {
    /// The caller passed an argument that violates the operation's contract.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The audio resource could not load or start a track.
    #[error("audio resource error: {0}")]
    Resource(#[from] crate::player::ResourceError),

    /// Settings could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<::config::ConfigError> for Error {
    fn from(e: ::config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
