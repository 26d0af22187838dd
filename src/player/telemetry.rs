//! Play counting.
//!
//! A play session starts when a track is set up. It is credited once, the
//! first time its elapsed percentage reaches the threshold. A session that is
//! left before that is reported with a zero count so listeners can tell
//! skips from listens.

use crate::queue::Track;

#[derive(Debug, Clone)]
pub struct PlayCount {
    pub track: Track,
    pub count: u32,
    pub percentage: f64,
}

#[derive(Debug)]
pub struct PlayTelemetry {
    threshold_percent: f64,
    session: Option<Track>,
    played: bool,
    reached: f64,
}

impl PlayTelemetry {
    pub fn new(threshold_percent: f64) -> Self {
        Self {
            threshold_percent,
            session: None,
            played: false,
            reached: 0.0,
        }
    }

    #[cfg(test)]
    pub(crate) fn played(&self) -> bool {
        self.played
    }

    /// Start a new session for `track`.
    pub fn begin(&mut self, track: Track) {
        self.session = Some(track);
        self.played = false;
        self.reached = 0.0;
    }

    /// Feed a progress sample. Returns the credit the first time the threshold is met.
    pub fn observe(&mut self, percentage: f64) -> Option<PlayCount> {
        let track = self.session.as_ref()?;
        self.reached = self.reached.max(percentage);
        if self.played || percentage < self.threshold_percent {
            return None;
        }
        self.played = true;
        Some(PlayCount {
            track: track.clone(),
            count: 1,
            percentage,
        })
    }

    /// Close the session. Returns a zero count when it was never credited.
    pub fn abandon(&mut self) -> Option<PlayCount> {
        let track = self.session.take()?;
        if self.played {
            return None;
        }
        Some(PlayCount {
            track,
            count: 0,
            percentage: self.reached,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::Song;

    fn track() -> Track {
        Track::new(
            Song {
                song_id: 3,
                name: "Three".to_string(),
                ..Song::default()
            },
            1,
            3,
        )
    }

    #[test]
    fn credits_exactly_once_when_threshold_is_crossed() {
        let mut t = PlayTelemetry::new(50.0);
        t.begin(track());

        let counts: Vec<(f64, PlayCount)> = [10.0, 30.0, 55.0, 80.0]
            .into_iter()
            .filter_map(|p| t.observe(p).map(|c| (p, c)))
            .collect();

        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].0, 55.0);
        assert_eq!(counts[0].1.count, 1);
        assert!(t.played());
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut t = PlayTelemetry::new(50.0);
        t.begin(track());
        assert!(t.observe(50.0).is_some());
    }

    #[test]
    fn abandoning_before_threshold_reports_zero_with_reached_percentage() {
        let mut t = PlayTelemetry::new(50.0);
        t.begin(track());
        t.observe(20.0);
        t.observe(35.0);
        // Position resets to zero on stop; the furthest point still counts.
        t.observe(0.0);

        let c = t.abandon().unwrap();
        assert_eq!(c.count, 0);
        assert_eq!(c.percentage, 35.0);
        assert_eq!(c.track.song_id(), 3);
        assert!(t.abandon().is_none());
    }

    #[test]
    fn abandoning_after_credit_is_silent_and_begin_resets() {
        let mut t = PlayTelemetry::new(50.0);
        t.begin(track());
        t.observe(90.0);
        assert!(t.abandon().is_none());

        t.begin(track());
        assert!(!t.played());
        assert!(t.observe(60.0).is_some());
    }

    #[test]
    fn observing_without_session_does_nothing() {
        let mut t = PlayTelemetry::new(50.0);
        assert!(t.observe(99.0).is_none());
        assert!(t.abandon().is_none());
    }
}
