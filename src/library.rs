//! Music library scanning.
//!
//! Walks a directory tree and turns audio files into [`Song`](crate::queue::Song)
//! records, reading tags with `lofty` where possible.

mod scan;

pub use scan::scan;
