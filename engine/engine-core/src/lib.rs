//! Core contracts consumed by the search engine.
//!
//! The search never implements game rules, time policy or game history itself.
//! It talks to those collaborators through the traits in this crate:
//! - `Position`: rules engine (terminal check, legal moves, move application, hashing)
//! - `TimeManager`: per-move time budget policy
//! - `StateHistory`: played position sequence used for repetition detection

pub mod history;
pub mod position;
pub mod time;

// Re-export main types for convenience
pub use history::{GameHistory, StateHistory};
pub use position::{Position, PositionKey};
pub use time::{InfiniteTime, MoveTimeManager, TimeManager};
