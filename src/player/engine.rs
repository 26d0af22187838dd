//! The playback engine.
//!
//! Drives a single [`AudioResource`] from queue cursor changes and turns the
//! resource's events into player status transitions. Everything runs on one
//! thread: public calls and [`PlaybackEngine::pump`] interleave, nothing runs
//! in parallel.
//!
//! Operations whose outcome depends on a later resource event hand out a
//! [`Completion`]. The matching sender is kept as explicit engine state:
//! `pending_play` until the resource reports `Playing`, and
//! [`PauseIntent::Stop`] until the pause that ends a stop arrives.

use std::mem;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::PlayerSettings;
use crate::events::{EventBus, PlayerEvent};
use crate::queue::{EntryId, PlayMode, QueueModel, RepeatMode, Song, Track};

use super::resource::AudioResource;
use super::telemetry::{PlayCount, PlayTelemetry};
use super::types::{
    Completion, PlayerFlags, PlayerState, PlayerStatus, Position, Resolver, ResourceEvent,
    completion,
};

/// Commands a UI or media-key handler can issue.
pub trait Player {
    fn play(&mut self) -> Completion;
    fn play_next(&mut self) -> Completion;
    /// Go back one track, or restart the current one when more than
    /// `restart_threshold` of it has played.
    fn play_previous(&mut self, restart_threshold: Option<Duration>) -> Completion;
    fn toggle_play(&mut self) -> Completion;
    fn stop(&mut self) -> Completion;
    fn pause(&mut self);
    fn play_by_track(&mut self, entry: EntryId) -> Completion;
    fn play_by_sequence(&mut self, sequence: u32) -> Completion;
    fn state(&self) -> PlayerState;
}

/// OS-level now-playing integration (MPRIS, media keys).
pub trait MediaSession {
    fn now_playing(&self, track: Option<&Track>);
    fn set_status(&self, status: PlayerStatus);
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Percentage of a track that must elapse before it counts as played.
    pub play_percentage: f64,
    pub play_next_automatically: bool,
    pub previous_restart_threshold: Duration,
    pub position_poll_interval: Duration,
    pub stall_retry_delay: Duration,
    /// Force a pending stop to settle after this long. `None` waits forever.
    pub stop_timeout: Option<Duration>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&PlayerSettings::default())
    }
}

impl From<&PlayerSettings> for EngineSettings {
    fn from(s: &PlayerSettings) -> Self {
        Self {
            play_percentage: s.play_percentage,
            play_next_automatically: s.play_next_automatically,
            previous_restart_threshold: Duration::from_secs(s.previous_restart_threshold_secs),
            position_poll_interval: Duration::from_millis(s.position_poll_ms),
            stall_retry_delay: Duration::from_millis(s.stall_retry_ms),
            stop_timeout: (s.stop_timeout_ms > 0).then(|| Duration::from_millis(s.stop_timeout_ms)),
        }
    }
}

#[derive(Debug, Copy, Clone)]
enum Direction {
    Next,
    Previous,
}

/// What to do once a pending stop has settled successfully.
enum Followup {
    None,
    Advance(Direction, Resolver),
    PlayTrack(EntryId, Resolver),
}

impl Followup {
    fn abandon(self) {
        match self {
            Followup::None => {}
            Followup::Advance(_, r) | Followup::PlayTrack(_, r) => r.resolve(false),
        }
    }
}

struct PendingStop {
    waiters: Vec<Resolver>,
    then: Followup,
    /// Stamped by the first `pump` that sees the request.
    requested_at: Option<Instant>,
}

/// Why the engine asked the resource to pause.
enum PauseIntent {
    None,
    Pause,
    Stop(PendingStop),
}

pub struct PlaybackEngine<R: AudioResource> {
    resource: R,
    queue: QueueModel,
    bus: EventBus,
    settings: EngineSettings,
    status: PlayerStatus,
    is_loading: bool,
    is_stalled: bool,
    has_error: bool,
    intent: PauseIntent,
    pending_play: Option<Resolver>,
    position: Position,
    telemetry: PlayTelemetry,
    next_position_poll: Option<Instant>,
    stall_retry_at: Option<Instant>,
    stall_recovery_used: bool,
    media_session: Option<Box<dyn MediaSession>>,
}

impl<R: AudioResource> PlaybackEngine<R> {
    pub fn new(resource: R, queue: QueueModel, settings: EngineSettings) -> Self {
        let bus = queue.bus().clone();
        let telemetry = PlayTelemetry::new(settings.play_percentage);
        Self {
            resource,
            queue,
            bus,
            settings,
            status: PlayerStatus::Stopped,
            is_loading: false,
            is_stalled: false,
            has_error: false,
            intent: PauseIntent::None,
            pending_play: None,
            position: Position::default(),
            telemetry,
            next_position_poll: None,
            stall_retry_at: None,
            stall_recovery_used: false,
            media_session: None,
        }
    }

    pub fn set_media_session(&mut self, session: Box<dyn MediaSession>) {
        self.media_session = Some(session);
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn queue(&self) -> &QueueModel {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut QueueModel {
        &mut self.queue
    }

    #[cfg(test)]
    pub(crate) fn resource(&self) -> &R {
        &self.resource
    }

    #[cfg(test)]
    pub(crate) fn resource_mut(&mut self) -> &mut R {
        &mut self.resource
    }

    pub fn status(&self) -> PlayerStatus {
        self.status
    }

    pub fn flags(&self) -> PlayerFlags {
        PlayerFlags {
            loading: self.is_loading,
            stalled: self.is_stalled,
            error: self.has_error,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Stop whatever is playing and replace the queue with `songs`.
    pub fn load_songs(&mut self, id: u64, name: impl Into<String>, songs: Vec<Song>) {
        self.halt();
        self.queue.load_songs(id, name, songs);
    }

    /// Stop whatever is playing and empty the queue.
    pub fn clear_queue(&mut self) {
        self.halt();
        self.queue.clear();
    }

    pub fn set_play_mode(&mut self, mode: PlayMode) {
        self.queue.set_play_mode(mode);
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.queue.set_repeat_mode(mode);
    }

    pub fn seek(&mut self, position: Duration) {
        if !self.queue.has_track() {
            return;
        }
        self.resource.set_position(position);
        self.update_position();
    }

    /// Deliver pending resource events and run due timers.
    pub fn pump(&mut self, now: Instant) {
        for event in self.resource.drain_events() {
            self.handle_resource_event(event, now);
        }

        if self.next_position_poll.is_some_and(|at| now >= at) {
            self.update_position();
            self.next_position_poll = Some(now + self.settings.position_poll_interval);
        }

        if self.stall_retry_at.is_some_and(|at| now >= at) {
            self.stall_retry_at = None;
            if self.stall_recovery_used {
                if self.is_loading {
                    warn!("restart after stall never started playing");
                    self.is_stalled = true;
                    self.abandon_stalled_load();
                    self.publish_flags();
                }
            } else {
                self.recover_from_stall(now);
            }
        }

        self.check_stop_timeout(now);
    }

    pub fn handle_resource_event(&mut self, event: ResourceEvent, now: Instant) {
        debug!(?event, "resource event");
        match event {
            ResourceEvent::Playing => {
                self.next_position_poll = Some(now + self.settings.position_poll_interval);
                self.stall_retry_at = None;
                self.stall_recovery_used = false;
                self.transition(PlayerStatus::Playing);
                if let Some(r) = self.pending_play.take() {
                    r.resolve(true);
                }
                if let Some(session) = &self.media_session {
                    session.now_playing(self.queue.current());
                }
            }
            ResourceEvent::Pause => self.on_pause_event(),
            ResourceEvent::Ended => {
                if let PauseIntent::Stop(pending) = mem::replace(&mut self.intent, PauseIntent::None)
                {
                    self.finish_stop(pending);
                    return;
                }
                self.on_stopped();
                if self.settings.play_next_automatically {
                    let _ = self.play_next();
                }
            }
            ResourceEvent::Stalled => {
                self.is_stalled = true;
                if self.stall_recovery_used {
                    warn!("playback still stalled after a restart");
                    self.abandon_stalled_load();
                } else {
                    warn!(retry_in = ?self.settings.stall_retry_delay, "playback stalled");
                    self.stall_retry_at = Some(now + self.settings.stall_retry_delay);
                }
                self.publish_flags();
            }
            ResourceEvent::Error(reason) => {
                error!(%reason, "audio resource error");
                self.has_error = true;
                self.is_loading = false;
                if let Some(r) = self.pending_play.take() {
                    r.resolve(false);
                }
                self.publish_flags();
            }
            ResourceEvent::Abort => debug!("audio resource aborted a load"),
        }
    }

    fn start_playback(&mut self, resolver: Resolver) {
        if self.is_loading {
            warn!("play ignored: a track is still loading");
            resolver.resolve(false);
            return;
        }
        if !self.queue.has_track() {
            debug!("play ignored: no current track");
            resolver.resolve(false);
            return;
        }
        if self.status == PlayerStatus::Playing {
            resolver.resolve(true);
            return;
        }

        self.is_loading = true;
        match self.resource.play() {
            Ok(()) => {
                if let Some(stale) = self.pending_play.replace(resolver) {
                    stale.resolve(false);
                }
            }
            Err(e) => {
                warn!(error = %e, "audio resource refused to play");
                self.is_loading = false;
                resolver.resolve(false);
            }
        }
        self.publish_flags();
    }

    /// Make `entry` current and load it into the resource.
    fn setup_new_track(&mut self, entry: EntryId) -> bool {
        let Some(track) = self.queue.track(entry).cloned() else {
            warn!(entry = entry.get(), "cannot set up a track that is not queued");
            return false;
        };
        self.close_play_session();
        self.queue.set_current(entry);

        self.telemetry.begin(track.clone());
        self.stall_recovery_used = false;
        let duration = Duration::try_from_secs_f64(track.song.seconds).unwrap_or_default();
        self.set_position(Position::new(Duration::ZERO, duration));

        match self.resource.load(&track.song.file_path) {
            Ok(()) => {
                debug!(song = track.song_id(), path = ?track.song.file_path, "track loaded");
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to load track");
                false
            }
        }
    }

    fn setup_and_play(&mut self, entry: EntryId, resolver: Resolver) {
        if self.setup_new_track(entry) {
            self.start_playback(resolver);
        } else {
            resolver.resolve(false);
        }
    }

    fn request_stop(&mut self, done: Option<Resolver>, then: Followup) {
        if self.is_loading {
            warn!("stop ignored: a track is still loading");
            if let Some(r) = done {
                r.resolve(false);
            }
            then.abandon();
            return;
        }

        match self.status {
            PlayerStatus::Stopped => {
                if self.is_stalled || self.has_error {
                    self.is_stalled = false;
                    self.has_error = false;
                    self.publish_flags();
                }
                if let Some(r) = done {
                    r.resolve(true);
                }
                self.run_followup(then);
            }
            PlayerStatus::Paused => {
                self.resource.set_position(Duration::ZERO);
                self.on_stopped();
                if let Some(r) = done {
                    r.resolve(true);
                }
                self.run_followup(then);
            }
            PlayerStatus::Playing => {
                if let PauseIntent::Stop(pending) = &mut self.intent {
                    // A pause is already on its way; ride along with it.
                    pending.waiters.extend(done);
                    mem::replace(&mut pending.then, then).abandon();
                    return;
                }
                self.intent = PauseIntent::Stop(PendingStop {
                    waiters: done.into_iter().collect(),
                    then,
                    requested_at: None,
                });
                self.resource.pause();
            }
        }
    }

    fn request_pause(&mut self) -> bool {
        if self.is_loading {
            warn!("pause ignored: a track is still loading");
            return false;
        }
        if self.status != PlayerStatus::Playing {
            return false;
        }
        if matches!(self.intent, PauseIntent::None) {
            self.intent = PauseIntent::Pause;
            self.resource.pause();
        }
        true
    }

    fn run_followup(&mut self, then: Followup) {
        match then {
            Followup::None => {}
            Followup::PlayTrack(entry, r) => self.setup_and_play(entry, r),
            Followup::Advance(direction, r) => {
                let moved = match direction {
                    Direction::Next => self.queue.get_next(),
                    Direction::Previous => self.queue.get_previous(),
                };
                match moved {
                    Some(track) => self.setup_and_play(track.entry(), r),
                    None => {
                        debug!(?direction, "nothing to advance to");
                        r.resolve(false);
                    }
                }
            }
        }
    }

    fn on_pause_event(&mut self) {
        if self.status != PlayerStatus::Playing {
            debug!(status = ?self.status, "pause event ignored");
            return;
        }
        match mem::replace(&mut self.intent, PauseIntent::None) {
            PauseIntent::Stop(pending) => self.finish_stop(pending),
            PauseIntent::Pause => self.on_paused(),
            PauseIntent::None => {
                let elapsed = self.resource.position();
                match self.total_duration() {
                    Some(total) if elapsed >= total => {
                        debug!("pause at end of track; waiting for ended");
                    }
                    _ => {
                        info!("paused from outside the player");
                        self.on_paused();
                    }
                }
            }
        }
    }

    fn finish_stop(&mut self, pending: PendingStop) {
        self.resource.set_position(Duration::ZERO);
        self.on_stopped();
        for waiter in pending.waiters {
            waiter.resolve(true);
        }
        self.run_followup(pending.then);
    }

    fn on_paused(&mut self) {
        self.cancel_position_timer();
        self.transition(PlayerStatus::Paused);
    }

    fn on_stopped(&mut self) {
        self.cancel_position_timer();
        self.transition(PlayerStatus::Stopped);
    }

    /// The only place the player status changes. Flags are always cleared.
    fn transition(&mut self, new: PlayerStatus) {
        let old = self.status;
        self.status = new;
        self.is_loading = false;
        self.is_stalled = false;
        self.has_error = false;

        if let Some(entry) = self.queue.cursor().entry() {
            self.queue.set_track_status(entry, new.into());
        }
        if let Some(session) = &self.media_session {
            session.set_status(new);
        }
        debug!(?old, ?new, "player status changed");
        self.bus.publish(PlayerEvent::PlayerStatusChanged {
            old,
            new,
            flags: self.flags(),
        });
    }

    fn publish_flags(&self) {
        self.bus.publish(PlayerEvent::PlayerStatusChanged {
            old: self.status,
            new: self.status,
            flags: self.flags(),
        });
    }

    fn cancel_position_timer(&mut self) {
        self.next_position_poll = None;
        self.update_position();
    }

    fn total_duration(&self) -> Option<Duration> {
        self.resource
            .duration()
            .or_else(|| (!self.position.duration.is_zero()).then_some(self.position.duration))
    }

    fn update_position(&mut self) {
        let elapsed = self.resource.position();
        let duration = self.total_duration().unwrap_or_default();
        self.set_position(Position::new(elapsed, duration));
        if let Some(count) = self.telemetry.observe(self.position.percentage) {
            self.publish_count(count);
        }
    }

    fn set_position(&mut self, new: Position) {
        let old = mem::replace(&mut self.position, new);
        if old != new {
            self.bus.publish(PlayerEvent::PositionChanged { old, new });
        }
    }

    fn close_play_session(&mut self) {
        if let Some(count) = self.telemetry.abandon() {
            self.publish_count(count);
        }
    }

    fn publish_count(&self, count: PlayCount) {
        info!(
            song = count.track.song_id(),
            count = count.count,
            percentage = count.percentage,
            "play counted"
        );
        self.bus.publish(PlayerEvent::TrackPlayCounted {
            track: count.track,
            count: count.count,
            percentage: count.percentage,
        });
    }

    fn recover_from_stall(&mut self, now: Instant) {
        if !self.is_loading && !self.is_stalled {
            return;
        }
        if let PauseIntent::Stop(pending) = mem::replace(&mut self.intent, PauseIntent::None) {
            self.finish_stop(pending);
            return;
        }
        let Some(path) = self.queue.current().map(|t| t.song.file_path.clone()) else {
            return;
        };

        warn!(path = ?path, "restarting stalled track");
        self.stall_recovery_used = true;
        if let Some(r) = self.pending_play.take() {
            r.resolve(false);
        }
        self.on_stopped();

        if let Err(e) = self.resource.load(&path) {
            warn!(error = %e, "restart after stall failed");
            self.is_stalled = true;
            self.publish_flags();
            return;
        }
        let (resolver, _) = completion();
        self.start_playback(resolver);
        if self.is_loading {
            // Same budget again for the restart to report `Playing`.
            self.stall_retry_at = Some(now + self.settings.stall_retry_delay);
        }
    }

    /// Give up on a restart that never reported back. The stalled flag stays
    /// set so the state is visible; stop and track changes work again.
    fn abandon_stalled_load(&mut self) {
        self.stall_retry_at = None;
        if !self.is_loading {
            return;
        }
        self.is_loading = false;
        if let Some(r) = self.pending_play.take() {
            r.resolve(false);
        }
    }

    fn check_stop_timeout(&mut self, now: Instant) {
        let Some(timeout) = self.settings.stop_timeout else {
            return;
        };
        let PauseIntent::Stop(pending) = &mut self.intent else {
            return;
        };
        let requested_at = *pending.requested_at.get_or_insert(now);
        if now.saturating_duration_since(requested_at) < timeout {
            return;
        }
        if let PauseIntent::Stop(pending) = mem::replace(&mut self.intent, PauseIntent::None) {
            warn!(?timeout, "no pause event after stop request; forcing stop");
            self.finish_stop(pending);
        }
    }

    /// Bring the output to a stop without waiting for resource events.
    fn halt(&mut self) {
        if let Some(r) = self.pending_play.take() {
            r.resolve(false);
        }
        let intent = mem::replace(&mut self.intent, PauseIntent::None);
        if self.status != PlayerStatus::Stopped || self.is_loading {
            self.resource.pause();
            self.resource.set_position(Duration::ZERO);
            self.on_stopped();
        }
        if let PauseIntent::Stop(pending) = intent {
            for waiter in pending.waiters {
                waiter.resolve(true);
            }
            pending.then.abandon();
        }
        self.close_play_session();
    }
}

impl<R: AudioResource> Player for PlaybackEngine<R> {
    fn play(&mut self) -> Completion {
        let (resolver, done) = completion();
        self.start_playback(resolver);
        done
    }

    fn play_next(&mut self) -> Completion {
        if self.queue.peek_next().is_none() {
            debug!("play next ignored: no next track");
            return Completion::ready(false);
        }
        let (resolver, done) = completion();
        self.request_stop(None, Followup::Advance(Direction::Next, resolver));
        done
    }

    fn play_previous(&mut self, restart_threshold: Option<Duration>) -> Completion {
        if let Some(threshold) = restart_threshold {
            if self.status != PlayerStatus::Stopped && self.resource.position() > threshold {
                self.resource.set_position(Duration::ZERO);
                self.update_position();
                return Completion::ready(true);
            }
        }
        if self.queue.peek_previous().is_none() {
            debug!("play previous ignored: no previous track");
            return Completion::ready(false);
        }
        let (resolver, done) = completion();
        self.request_stop(None, Followup::Advance(Direction::Previous, resolver));
        done
    }

    fn toggle_play(&mut self) -> Completion {
        match self.status {
            PlayerStatus::Playing => Completion::ready(self.request_pause()),
            PlayerStatus::Paused => self.play(),
            PlayerStatus::Stopped => {
                let target = match self.queue.cursor().entry() {
                    Some(entry) => Some(entry),
                    None => self.queue.first_in_play_order(),
                };
                match target {
                    Some(entry) => self.play_by_track(entry),
                    None => Completion::ready(false),
                }
            }
        }
    }

    fn stop(&mut self) -> Completion {
        let (resolver, done) = completion();
        self.request_stop(Some(resolver), Followup::None);
        done
    }

    fn pause(&mut self) {
        self.request_pause();
    }

    fn play_by_track(&mut self, entry: EntryId) -> Completion {
        if self.is_loading {
            warn!("play ignored: a track is still loading");
            return Completion::ready(false);
        }
        if self.queue.track(entry).is_none() {
            warn!(entry = entry.get(), "play ignored: track is not queued");
            return Completion::ready(false);
        }
        let (resolver, done) = completion();
        match self.status {
            PlayerStatus::Paused if self.queue.cursor().entry() == Some(entry) => {
                self.start_playback(resolver);
            }
            PlayerStatus::Playing | PlayerStatus::Paused => {
                self.request_stop(None, Followup::PlayTrack(entry, resolver));
            }
            PlayerStatus::Stopped => self.setup_and_play(entry, resolver),
        }
        done
    }

    fn play_by_sequence(&mut self, sequence: u32) -> Completion {
        match self.queue.get_track_by_sequence(sequence).map(Track::entry) {
            Some(entry) => self.play_by_track(entry),
            None => {
                debug!(sequence, "no track with that sequence");
                Completion::ready(false)
            }
        }
    }

    fn state(&self) -> PlayerState {
        PlayerState {
            status: self.status,
            flags: self.flags(),
            current: self.queue.current().cloned(),
            position: self.position,
            play_mode: self.queue.play_mode(),
            repeat_mode: self.queue.repeat_mode(),
        }
    }
}
