// src/analysis/mod.rs
//
// Match analytics over the tracker's per-frame output.
//
// Signal flow:
//   Detections → tracking::MultiObjectTracker → possession::PossessionAnalyzer
//                                             → metrics::MetricsAnalyzer

mod metrics;
mod possession;
mod team;

pub use metrics::{MetricsAnalyzer, MetricsConfig, SprintEvent, TeamMetrics};
pub use possession::{
    CurrentPossession, PassEvent, PassStats, PossessionAnalyzer, PossessionConfig, PossessionSpan,
    PossessionStats,
};
pub use team::TeamClassifier;
