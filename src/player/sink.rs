//! `rodio` implementation of [`AudioResource`].
//!
//! Each load decodes the file into a fresh paused `Sink`. Seeking rebuilds
//! the sink and skips into the source. Elapsed time is wall-clock based,
//! accumulated across pauses.

use std::fs::File;
use std::io::BufReader;
use std::mem;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use tracing::debug;

use super::resource::{AudioResource, ResourceError};
use super::types::ResourceEvent;

pub struct RodioOutput {
    stream: OutputStream,
    sink: Option<Sink>,
    path: Option<PathBuf>,
    duration: Option<Duration>,
    playing: bool,
    started_at: Option<Instant>,
    accumulated: Duration,
    events: Vec<ResourceEvent>,
}

impl RodioOutput {
    /// Open the default output device.
    pub fn open() -> Result<Self, ResourceError> {
        let mut stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| ResourceError::Output(e.to_string()))?;
        // rodio prints to stderr when the stream is dropped.
        stream.log_on_drop(false);
        Ok(Self {
            stream,
            sink: None,
            path: None,
            duration: None,
            playing: false,
            started_at: None,
            accumulated: Duration::ZERO,
            events: Vec::new(),
        })
    }

    /// Decode `path` into a paused sink that starts at `start_at`.
    fn create_sink_at(
        &self,
        path: &Path,
        start_at: Duration,
    ) -> Result<(Sink, Option<Duration>), ResourceError> {
        let file = File::open(path).map_err(|source| ResourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let decoder =
            Decoder::new(BufReader::new(file)).map_err(|e| ResourceError::Decode {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let total = decoder.total_duration();

        let sink = Sink::connect_new(self.stream.mixer());
        sink.append(decoder.skip_duration(start_at));
        sink.pause();
        Ok((sink, total))
    }

    fn replace_sink(&mut self, path: &Path, start_at: Duration) -> Result<(), ResourceError> {
        let (sink, total) = self.create_sink_at(path, start_at)?;
        if let Some(old) = self.sink.replace(sink) {
            old.stop();
        }
        self.duration = total;
        self.accumulated = start_at;
        self.started_at = None;
        Ok(())
    }

    fn elapsed(&self) -> Duration {
        self.accumulated + self.started_at.map(|t| t.elapsed()).unwrap_or_default()
    }
}

impl AudioResource for RodioOutput {
    fn load(&mut self, path: &Path) -> Result<(), ResourceError> {
        if self.playing {
            self.events.push(ResourceEvent::Abort);
        }
        self.playing = false;
        self.replace_sink(path, Duration::ZERO)?;
        self.path = Some(path.to_path_buf());
        debug!(?path, duration = ?self.duration, "sink ready");
        Ok(())
    }

    fn play(&mut self) -> Result<(), ResourceError> {
        let path = self.path.clone().ok_or(ResourceError::NothingLoaded)?;
        if self.sink.as_ref().is_none_or(Sink::empty) {
            self.replace_sink(&path, Duration::ZERO)?;
        }
        if let Some(sink) = &self.sink {
            sink.play();
        }
        self.playing = true;
        self.started_at = Some(Instant::now());
        self.events.push(ResourceEvent::Playing);
        Ok(())
    }

    fn pause(&mut self) {
        if !self.playing {
            return;
        }
        if let Some(sink) = &self.sink {
            sink.pause();
        }
        self.accumulated = self.elapsed();
        self.started_at = None;
        self.playing = false;
        self.events.push(ResourceEvent::Pause);
    }

    fn set_position(&mut self, position: Duration) {
        let Some(path) = self.path.clone() else {
            return;
        };
        if let Err(e) = self.replace_sink(&path, position) {
            self.events.push(ResourceEvent::Error(e.to_string()));
            return;
        }
        if self.playing {
            if let Some(sink) = &self.sink {
                sink.play();
            }
            self.started_at = Some(Instant::now());
        }
    }

    fn position(&self) -> Duration {
        let elapsed = self.elapsed();
        match self.duration {
            Some(total) => elapsed.min(total),
            None => elapsed,
        }
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }

    fn drain_events(&mut self) -> Vec<ResourceEvent> {
        if self.playing && self.sink.as_ref().is_some_and(Sink::empty) {
            self.accumulated = self.position();
            self.started_at = None;
            self.playing = false;
            self.events.push(ResourceEvent::Ended);
        }
        mem::take(&mut self.events)
    }
}
