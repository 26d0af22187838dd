//! Playback engine and the audio output it drives.

mod engine;
mod resource;
mod sink;
mod telemetry;
mod types;

pub use engine::{EngineSettings, MediaSession, PlaybackEngine, Player};
pub use resource::{AudioResource, ResourceError};
pub use sink::RodioOutput;
pub use telemetry::{PlayCount, PlayTelemetry};
pub use types::*;
