// src/types.rs

use crate::analysis::{MetricsConfig, PossessionConfig};
use crate::geometry::BBox;
use crate::tracking::TrackerConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tracker: TrackerConfig,
    pub possession: PossessionConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Detector object classes. Serialized as the detector's class strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectClass {
    #[serde(rename = "person")]
    Player,
    #[serde(rename = "ball")]
    Ball,
}

impl ObjectClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Player => "person",
            Self::Ball => "ball",
        }
    }
}

/// One raw detection from the upstream detector, per frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BBox,
    pub score: f32,
    pub class: ObjectClass,
    /// Detector-provided hint. Identity is assigned internally; this is
    /// informational only and never read by the tracker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<u64>,
}

/// One tracked object reported downstream, per frame.
///
/// `bbox` is the smoothed box, not the raw detection box; `confidence` is
/// the running average over the track's recent detections.
#[derive(Debug, Clone, Serialize)]
pub struct TrackedObject {
    pub track_id: u64,
    pub bbox: BBox,
    pub score: f32,
    pub class: ObjectClass,
    pub confidence: f32,
    pub frame_id: u64,
}

/// Side-of-field team label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    #[serde(rename = "team_a")]
    A,
    #[serde(rename = "team_b")]
    B,
    #[serde(rename = "unknown")]
    Unknown,
}

impl Team {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "team_a",
            Self::B => "team_b",
            Self::Unknown => "unknown",
        }
    }
}
