//! Track queue model.
//!
//! Owns the ordered list of tracks, the play-order view derived from it
//! (sequential, shuffled, ...) and the current/previous/next cursor.

mod list;
mod model;
mod order;

pub use list::QueueModel;
pub use model::*;
