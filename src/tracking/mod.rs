// src/tracking/mod.rs

mod track;
mod tracker;

pub use track::Track;
pub use tracker::{ClassParams, MultiObjectTracker, TrackStatistics, TrackerConfig};
