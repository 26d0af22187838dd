//! In-process notification bus.
//!
//! The queue and the playback engine publish [`PlayerEvent`]s; the runtime,
//! MPRIS glue and tests subscribe with a plain `mpsc` receiver. Delivery is
//! synchronous: `publish` returns once every live subscriber has the event
//! in its channel.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use crate::player::{PlayerFlags, PlayerStatus, Position};
use crate::queue::{Track, TrackStatus};

#[derive(Debug, Clone)]
pub enum PlayerEvent {
    /// The queue cursor moved. `None` stands for the empty track.
    CurrentTrackChanged {
        old: Option<Track>,
        new: Option<Track>,
    },
    /// The player status or one of its flags changed.
    PlayerStatusChanged {
        old: PlayerStatus,
        new: PlayerStatus,
        flags: PlayerFlags,
    },
    PositionChanged {
        old: Position,
        new: Position,
    },
    /// A play session ended (`count == 0`) or crossed the play threshold (`count == 1`).
    TrackPlayCounted {
        track: Track,
        count: u32,
        percentage: f64,
    },
    TrackStatusChanged {
        track: Track,
        old: TrackStatus,
        new: TrackStatus,
    },
}

#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Sender<PlayerEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }
        rx
    }

    /// Send `event` to every subscriber, dropping the ones that hung up.
    pub fn publish(&self, event: PlayerEvent) {
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::Song;

    fn status_event() -> PlayerEvent {
        PlayerEvent::PlayerStatusChanged {
            old: PlayerStatus::Stopped,
            new: PlayerStatus::Playing,
            flags: PlayerFlags::default(),
        }
    }

    #[test]
    fn publish_reaches_every_subscriber() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.clone().subscribe();

        bus.publish(status_event());

        assert!(matches!(
            a.try_recv(),
            Ok(PlayerEvent::PlayerStatusChanged { new: PlayerStatus::Playing, .. })
        ));
        assert!(b.try_recv().is_ok());
    }

    #[test]
    fn dropped_subscribers_are_pruned_on_publish() {
        let bus = EventBus::new();
        let keep = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);

        let track = Track::new(Song::default(), 1, 1);
        bus.publish(PlayerEvent::TrackPlayCounted {
            track,
            count: 0,
            percentage: 12.5,
        });

        assert_eq!(bus.subscriber_count(), 1);
        assert!(matches!(
            keep.try_recv(),
            Ok(PlayerEvent::TrackPlayCounted { count: 0, .. })
        ));
    }
}
