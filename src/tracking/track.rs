// src/tracking/track.rs
//
// Single-track state: raw detection history, exponentially smoothed
// center/velocity, and confirmation. The smoothed center is what the
// tracker matches against and reports downstream; the raw box only
// contributes its width/height.

use crate::geometry::BBox;
use crate::types::ObjectClass;
use std::collections::VecDeque;
use tracing::debug;

/// Weight applied to each new center/velocity sample.
const SMOOTHING_ALPHA: f32 = 0.7;
/// Position history cap (10s at 30fps).
const MAX_HISTORY: usize = 300;
/// Confidence samples kept for the running average.
const MAX_CONFIDENCE_HISTORY: usize = 10;
/// Frames without a match before prediction-only output stops.
/// Intentionally stricter than the tracker's lost-track horizon.
const ACTIVE_HORIZON: u32 = 10;
/// Matched frames and mean confidence required to confirm a track.
const CONFIRM_MIN_AGE: u32 = 3;
const CONFIRM_MIN_CONFIDENCE: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct Track {
    pub id: u64,
    pub class: ObjectClass,
    /// Latest raw detection box.
    pub bbox: BBox,
    /// Latest raw detection score.
    pub score: f32,
    /// Frame of the latest matched detection.
    pub frame_id: u64,
    /// Frames since creation (counting creation itself).
    pub age: u32,
    /// Frames since the last matched detection. Reset only on a match.
    pub time_since_update: u32,
    /// Set once the track has proven stable; never cleared.
    pub confirmed: bool,
    history: VecDeque<(BBox, f32, u64)>,
    confidence_history: VecDeque<f32>,
    // Exponentially smoothed center and velocity (px, px/frame)
    cx: f32,
    cy: f32,
    vx: f32,
    vy: f32,
}

impl Track {
    pub fn new(id: u64, bbox: BBox, score: f32, frame_id: u64, class: ObjectClass) -> Self {
        let (cx, cy) = bbox.center();
        let mut history = VecDeque::with_capacity(MAX_HISTORY);
        history.push_back((bbox, score, frame_id));
        let mut confidence_history = VecDeque::with_capacity(MAX_CONFIDENCE_HISTORY);
        confidence_history.push_back(score);

        Self {
            id,
            class,
            bbox,
            score,
            frame_id,
            age: 1,
            time_since_update: 0,
            confirmed: false,
            history,
            confidence_history,
            cx,
            cy,
            vx: 0.0,
            vy: 0.0,
        }
    }

    /// Fold a matched detection into the track.
    pub fn update(&mut self, bbox: BBox, score: f32, frame_id: u64) {
        // Velocity against the immediately preceding history entry,
        // guarded against a zero frame delta.
        if let Some(&(prev_bbox, _, prev_frame)) = self.history.back() {
            let dt = frame_id.saturating_sub(prev_frame) as f32;
            if dt > 0.0 {
                let (ncx, ncy) = bbox.center();
                let (pcx, pcy) = prev_bbox.center();
                self.vx = SMOOTHING_ALPHA * ((ncx - pcx) / dt) + (1.0 - SMOOTHING_ALPHA) * self.vx;
                self.vy = SMOOTHING_ALPHA * ((ncy - pcy) / dt) + (1.0 - SMOOTHING_ALPHA) * self.vy;
                self.cx = SMOOTHING_ALPHA * ncx + (1.0 - SMOOTHING_ALPHA) * self.cx;
                self.cy = SMOOTHING_ALPHA * ncy + (1.0 - SMOOTHING_ALPHA) * self.cy;
            }
        }

        self.bbox = bbox;
        self.score = score;
        self.frame_id = frame_id;
        self.age += 1;
        self.time_since_update = 0;

        self.history.push_back((bbox, score, frame_id));
        if self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }
        self.confidence_history.push_back(score);
        if self.confidence_history.len() > MAX_CONFIDENCE_HISTORY {
            self.confidence_history.pop_front();
        }

        if !self.confirmed
            && self.age >= CONFIRM_MIN_AGE
            && self.average_confidence() > CONFIRM_MIN_CONFIDENCE
        {
            self.confirmed = true;
            debug!(
                "track {} ({}) confirmed, avg confidence {:.2}",
                self.id,
                self.class.as_str(),
                self.average_confidence()
            );
        }
    }

    /// Extrapolate the smoothed center to `frame_id`, keeping the last
    /// known width/height. Used on frames where no detection matched.
    pub fn predict(&self, frame_id: u64) -> BBox {
        let dt = frame_id.saturating_sub(self.frame_id) as f32;
        if dt > 0.0 {
            BBox::new(
                self.cx + self.vx * dt - self.bbox.w / 2.0,
                self.cy + self.vy * dt - self.bbox.h / 2.0,
                self.bbox.w,
                self.bbox.h,
            )
        } else {
            self.bbox
        }
    }

    /// Box centered on the smoothed center with the last known size.
    /// This, not the raw detection box, is what goes downstream.
    pub fn smoothed_bbox(&self) -> BBox {
        BBox::new(
            self.cx - self.bbox.w / 2.0,
            self.cy - self.bbox.h / 2.0,
            self.bbox.w,
            self.bbox.h,
        )
    }

    pub fn smoothed_center(&self) -> (f32, f32) {
        (self.cx, self.cy)
    }

    pub fn velocity(&self) -> (f32, f32) {
        (self.vx, self.vy)
    }

    /// Liveness for prediction-only frames.
    pub fn active(&self) -> bool {
        self.time_since_update < ACTIVE_HORIZON
    }

    pub fn average_confidence(&self) -> f32 {
        if self.confidence_history.is_empty() {
            return 0.0;
        }
        self.confidence_history.iter().sum::<f32>() / self.confidence_history.len() as f32
    }
}
