//! Headless music player engine.
//!
//! A track queue with play and repeat modes, a playback state machine over a
//! pluggable audio output, play counting, and an MPRIS bridge. The `encore`
//! binary wires these to a rodio output and a line-oriented stdin control.

pub mod config;
pub mod error;
pub mod events;
pub mod library;
pub mod mpris;
pub mod player;
pub mod queue;
pub mod runtime;

pub use error::{Error, Result};
