// src/analysis/metrics.rs
//
// Per-track movement metrics derived from the tracker output: distance
// covered, windowed speeds, sprint events, occupancy heatmaps, and team
// spread. Positions are accumulated in frame pixel space.

use crate::geometry::distance;
use crate::types::TrackedObject;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Video frame rate; converts frame windows to seconds.
    pub fps: f32,
    /// Coordinate extent used to bucket heatmap cells.
    pub pitch_width: f32,
    pub pitch_height: f32,
    /// Speed above which a window counts as a sprint.
    pub sprint_speed_threshold: f32,
    /// Positions per speed window.
    pub speed_window: usize,
    /// Heatmap resolution, (columns, rows).
    pub heatmap_grid: (usize, usize),
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            fps: 30.0,
            pitch_width: 105.0,
            pitch_height: 68.0,
            sprint_speed_threshold: 7.0,
            speed_window: 10,
            heatmap_grid: (20, 15),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SprintEvent {
    pub track_id: u64,
    /// Index into the track's speed series.
    pub window_index: usize,
    pub speed: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamMetrics {
    pub width: f32,
    pub height: f32,
    pub compactness: f32,
    pub centroid: (f32, f32),
}

#[derive(Debug, Default)]
struct TrackHistory {
    positions: Vec<(f32, f32)>,
    frames: Vec<u64>,
}

pub struct MetricsAnalyzer {
    config: MetricsConfig,
    tracks: HashMap<u64, TrackHistory>,
}

impl MetricsAnalyzer {
    pub fn new(config: MetricsConfig) -> Result<Self> {
        if config.fps <= 0.0 {
            bail!("fps must be positive, got {}", config.fps);
        }
        if config.speed_window < 2 {
            bail!("speed_window must be at least 2, got {}", config.speed_window);
        }
        let (gw, gh) = config.heatmap_grid;
        if gw == 0 || gh == 0 {
            bail!("heatmap_grid dimensions must be positive");
        }
        Ok(Self {
            config,
            tracks: HashMap::new(),
        })
    }

    /// Accumulate one frame of tracker output.
    pub fn update_tracks(&mut self, tracked: &[TrackedObject], frame_id: u64) {
        for obj in tracked {
            let entry = self.tracks.entry(obj.track_id).or_default();
            entry.positions.push((obj.bbox.x, obj.bbox.y));
            entry.frames.push(frame_id);
        }
    }

    /// Total distance traveled by a track over its whole history.
    pub fn total_distance(&self, track_id: u64) -> f32 {
        self.tracks
            .get(&track_id)
            .map(|t| path_length(&t.positions))
            .unwrap_or(0.0)
    }

    /// Speed per sliding window, in position units per second.
    pub fn speed_series(&self, track_id: u64) -> Vec<f32> {
        let Some(track) = self.tracks.get(&track_id) else {
            return Vec::new();
        };
        let window = self.config.speed_window;
        if track.positions.len() < window {
            return Vec::new();
        }
        let window_secs = window as f32 / self.config.fps;
        (window..=track.positions.len())
            .map(|end| path_length(&track.positions[end - window..end]) / window_secs)
            .collect()
    }

    /// Sprint events across all tracks.
    pub fn detect_events(&self) -> Vec<SprintEvent> {
        let mut events = Vec::new();
        let mut track_ids: Vec<u64> = self.tracks.keys().copied().collect();
        track_ids.sort_unstable();
        for track_id in track_ids {
            for (window_index, speed) in self.speed_series(track_id).into_iter().enumerate() {
                if speed > self.config.sprint_speed_threshold {
                    events.push(SprintEvent {
                        track_id,
                        window_index,
                        speed,
                    });
                }
            }
        }
        events
    }

    /// Occupancy grid for one track, `heatmap_grid` cells, row-major.
    pub fn heatmap(&self, track_id: u64) -> Vec<Vec<u32>> {
        let (gw, gh) = self.config.heatmap_grid;
        let mut grid = vec![vec![0u32; gw]; gh];
        let Some(track) = self.tracks.get(&track_id) else {
            return grid;
        };
        for &(x, y) in &track.positions {
            let col = ((x * gw as f32 / self.config.pitch_width) as usize).min(gw - 1);
            let row = ((y * gh as f32 / self.config.pitch_height) as usize).min(gh - 1);
            grid[row][col] += 1;
        }
        grid
    }

    /// Spread of a set of tracks (one team) over their full histories.
    pub fn team_metrics(&self, team_track_ids: &[u64]) -> Option<TeamMetrics> {
        let mut positions: Vec<(f32, f32)> = Vec::new();
        for id in team_track_ids {
            if let Some(track) = self.tracks.get(id) {
                positions.extend_from_slice(&track.positions);
            }
        }
        if positions.is_empty() {
            return None;
        }

        let (mut min_x, mut max_x) = (f32::INFINITY, f32::NEG_INFINITY);
        let (mut min_y, mut max_y) = (f32::INFINITY, f32::NEG_INFINITY);
        let (mut sum_x, mut sum_y) = (0.0f32, 0.0f32);
        for &(x, y) in &positions {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
            sum_x += x;
            sum_y += y;
        }

        let width = max_x - min_x;
        let height = max_y - min_y;
        let n = positions.len() as f32;
        Some(TeamMetrics {
            width,
            height,
            compactness: width * height,
            centroid: (sum_x / n, sum_y / n),
        })
    }

    pub fn reset(&mut self) {
        self.tracks.clear();
    }
}

fn path_length(positions: &[(f32, f32)]) -> f32 {
    positions
        .windows(2)
        .map(|pair| distance(pair[0], pair[1]))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BBox;
    use crate::types::ObjectClass;

    fn obj(id: u64, x: f32, y: f32) -> TrackedObject {
        TrackedObject {
            track_id: id,
            bbox: BBox::new(x, y, 2.0, 2.0),
            score: 0.9,
            class: ObjectClass::Player,
            confidence: 0.9,
            frame_id: 0,
        }
    }

    fn analyzer() -> MetricsAnalyzer {
        MetricsAnalyzer::new(MetricsConfig::default()).unwrap()
    }

    #[test]
    fn test_rejects_bad_config() {
        assert!(MetricsAnalyzer::new(MetricsConfig {
            fps: 0.0,
            ..MetricsConfig::default()
        })
        .is_err());
        assert!(MetricsAnalyzer::new(MetricsConfig {
            speed_window: 1,
            ..MetricsConfig::default()
        })
        .is_err());
    }

    #[test]
    fn test_total_distance_straight_line() {
        let mut m = analyzer();
        for frame in 0..10 {
            m.update_tracks(&[obj(1, frame as f32 * 3.0, 0.0)], frame);
        }
        assert!((m.total_distance(1) - 27.0).abs() < 1e-4);
        assert_eq!(m.total_distance(99), 0.0);
    }

    #[test]
    fn test_speed_series_constant_motion() {
        let mut m = analyzer();
        // 2 units per frame at 30fps: 60 units/s over every window.
        for frame in 0..30 {
            m.update_tracks(&[obj(1, frame as f32 * 2.0, 0.0)], frame);
        }
        let speeds = m.speed_series(1);
        assert_eq!(speeds.len(), 21);
        for speed in speeds {
            assert!((speed - 54.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_speed_series_needs_full_window() {
        let mut m = analyzer();
        for frame in 0..5 {
            m.update_tracks(&[obj(1, frame as f32, 0.0)], frame);
        }
        assert!(m.speed_series(1).is_empty());
    }

    #[test]
    fn test_sprint_detection() {
        let mut m = analyzer();
        // Stationary track 1, fast track 2.
        for frame in 0..20 {
            m.update_tracks(&[obj(1, 50.0, 50.0), obj(2, frame as f32 * 1.0, 0.0)], frame);
        }
        let events = m.detect_events();
        assert!(!events.is_empty());
        assert!(events.iter().all(|e| e.track_id == 2));
        assert!(events.iter().all(|e| e.speed > 7.0));
    }

    #[test]
    fn test_heatmap_counts_and_bounds() {
        let mut m = analyzer();
        // All positions in the top-left cell, plus one far outside the
        // pitch extent that must clamp to the last cell.
        for frame in 0..5 {
            m.update_tracks(&[obj(1, 1.0, 1.0)], frame);
        }
        m.update_tracks(&[obj(1, 10_000.0, 10_000.0)], 5);

        let grid = m.heatmap(1);
        assert_eq!(grid.len(), 15);
        assert_eq!(grid[0].len(), 20);
        assert_eq!(grid[0][0], 5);
        assert_eq!(grid[14][19], 1);
    }

    #[test]
    fn test_team_metrics_spread() {
        let mut m = analyzer();
        m.update_tracks(&[obj(1, 0.0, 0.0), obj(2, 10.0, 20.0)], 0);

        let metrics = m.team_metrics(&[1, 2]).unwrap();
        assert_eq!(metrics.width, 10.0);
        assert_eq!(metrics.height, 20.0);
        assert_eq!(metrics.compactness, 200.0);
        assert_eq!(metrics.centroid, (5.0, 10.0));

        assert!(m.team_metrics(&[42]).is_none());
    }

    #[test]
    fn test_reset_clears_histories() {
        let mut m = analyzer();
        m.update_tracks(&[obj(1, 5.0, 5.0)], 0);
        m.reset();
        assert_eq!(m.total_distance(1), 0.0);
    }
}
