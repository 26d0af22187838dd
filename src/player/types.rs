//! Player status, snapshots and deferred results.

use std::cell::Cell;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::time::Duration;

use crate::queue::{PlayMode, RepeatMode, Track, TrackStatus};

/// State of the audio output.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PlayerStatus {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl From<PlayerStatus> for TrackStatus {
    fn from(status: PlayerStatus) -> Self {
        match status {
            PlayerStatus::Stopped => TrackStatus::Stopped,
            PlayerStatus::Playing => TrackStatus::Playing,
            PlayerStatus::Paused => TrackStatus::Paused,
        }
    }
}

/// Side flags that travel with every status change.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct PlayerFlags {
    /// A play request has been issued and has not settled yet.
    pub loading: bool,
    /// The resource reported it cannot make progress.
    pub stalled: bool,
    /// The resource reported a playback error.
    pub error: bool,
}

/// Elapsed playback of the current track.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Position {
    pub elapsed: Duration,
    pub duration: Duration,
    /// `elapsed / duration` in percent, clamped to `0..=100`.
    pub percentage: f64,
}

impl Position {
    pub fn new(elapsed: Duration, duration: Duration) -> Self {
        let percentage = if duration.is_zero() {
            0.0
        } else {
            (elapsed.as_secs_f64() / duration.as_secs_f64() * 100.0).clamp(0.0, 100.0)
        };
        Self {
            elapsed,
            duration,
            percentage,
        }
    }
}

/// Snapshot returned by [`Player::state`](super::Player::state).
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub status: PlayerStatus,
    pub flags: PlayerFlags,
    pub current: Option<Track>,
    pub position: Position,
    pub play_mode: PlayMode,
    pub repeat_mode: RepeatMode,
}

/// Lifecycle notifications emitted by an [`AudioResource`](super::AudioResource).
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEvent {
    Playing,
    Pause,
    Ended,
    Stalled,
    Error(String),
    Abort,
}

/// Deferred boolean outcome of a player operation.
///
/// Settles once the engine resolves it. If the engine drops the operation
/// without resolving it, the result reads as `false`.
#[derive(Debug)]
pub struct Completion {
    rx: Receiver<bool>,
    settled: Cell<Option<bool>>,
}

/// Sending half of a [`Completion`], owned by the engine.
#[derive(Debug)]
pub(crate) struct Resolver {
    tx: Sender<bool>,
}

pub(crate) fn completion() -> (Resolver, Completion) {
    let (tx, rx) = mpsc::channel();
    (
        Resolver { tx },
        Completion {
            rx,
            settled: Cell::new(None),
        },
    )
}

impl Resolver {
    pub(crate) fn resolve(self, value: bool) {
        // The caller may have dropped its Completion; that is fine.
        let _ = self.tx.send(value);
    }
}

impl Completion {
    /// A completion that has already settled.
    pub fn ready(value: bool) -> Self {
        let (resolver, completion) = completion();
        resolver.resolve(value);
        completion
    }

    /// The outcome if settled, `None` while still pending.
    pub fn try_result(&self) -> Option<bool> {
        if let Some(v) = self.settled.get() {
            return Some(v);
        }
        let value = match self.rx.try_recv() {
            Ok(v) => v,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => false,
        };
        self.settled.set(Some(value));
        Some(value)
    }

    pub fn is_pending(&self) -> bool {
        self.try_result().is_none()
    }
}
