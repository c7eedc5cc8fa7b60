// src/analysis/team.rs
//
// Position-based team assignment. No camera calibration: a player's team
// is just which half of the frame their accumulated positions average to,
// so the label can drift as history grows. That drift is accepted.

use crate::types::Team;
use std::collections::HashMap;

/// Classify a set of positions against the field midpoint.
pub fn side_for_positions(positions: &[(f32, f32)], half_line_x: f32) -> Team {
    if positions.is_empty() {
        return Team::Unknown;
    }
    let mean_x = positions.iter().map(|p| p.0).sum::<f32>() / positions.len() as f32;
    if mean_x < half_line_x {
        Team::A
    } else {
        Team::B
    }
}

/// Memoizing wrapper: the heuristic is a pure function of accumulated
/// positions, but recomputing it for every proximity query would be
/// quadratic over a match. One computation per track per frame.
pub struct TeamClassifier {
    half_line_x: f32,
    cache: HashMap<u64, (u64, Team)>,
}

impl TeamClassifier {
    pub fn new(field_width_px: f32) -> Self {
        Self {
            half_line_x: field_width_px / 2.0,
            cache: HashMap::new(),
        }
    }

    pub fn classify(&mut self, track_id: u64, positions: &[(f32, f32)], frame_id: u64) -> Team {
        if let Some(&(cached_frame, team)) = self.cache.get(&track_id) {
            if cached_frame == frame_id {
                return team;
            }
        }
        let team = side_for_positions(positions, self.half_line_x);
        self.cache.insert(track_id, (frame_id, team));
        team
    }

    pub fn reset(&mut self) {
        self.cache.clear();
    }
}
