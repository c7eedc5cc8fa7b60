// src/tracking/tracker.rs
//
// Per-class association of detections to tracks plus track lifecycle.
//
// Matching is greedy per track in ascending id order against the smoothed
// boxes, not a global optimum. The iteration order is the tie-break and is
// part of the output contract: the same detection sequence must always
// produce the same assignments.

use super::track::Track;
use crate::types::{Detection, ObjectClass, TrackedObject};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

/// Per-class association tunables.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClassParams {
    /// Minimum IoU between a track's smoothed box and a detection to
    /// accept the match.
    pub match_threshold: f32,
    /// Frames without a matched detection before the track is removed.
    pub max_time_lost: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Minimum detection score to spawn a new track.
    pub creation_threshold: f32,
    /// Match threshold for classes without an override.
    pub match_threshold: f32,
    /// Lost-track horizon for classes without an override.
    pub max_time_lost: u32,
    /// Players tolerate more missed frames and a lower match bar.
    pub player: Option<ClassParams>,
    /// The ball is small and fast; tighter spatial match, shorter horizon.
    pub ball: Option<ClassParams>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            creation_threshold: 0.3,
            match_threshold: 0.7,
            max_time_lost: 15,
            player: Some(ClassParams {
                match_threshold: 0.6,
                max_time_lost: 20,
            }),
            ball: Some(ClassParams {
                match_threshold: 0.8,
                max_time_lost: 10,
            }),
        }
    }
}

impl TrackerConfig {
    fn params_for(&self, class: ObjectClass) -> ClassParams {
        let fallback = ClassParams {
            match_threshold: self.match_threshold,
            max_time_lost: self.max_time_lost,
        };
        match class {
            ObjectClass::Player => self.player.unwrap_or(fallback),
            ObjectClass::Ball => self.ball.unwrap_or(fallback),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackStatistics {
    pub active_tracks: usize,
    pub confirmed_tracks: usize,
    pub total_tracks_created: u64,
}

pub struct MultiObjectTracker {
    config: TrackerConfig,
    frame_id: u64,
    next_track_id: u64,
    /// Live tracks keyed by id; BTreeMap iteration gives the ascending-id
    /// matching order the determinism contract requires.
    tracks: BTreeMap<u64, Track>,
    /// Ids of removed tracks. Never reused.
    removed_ids: HashSet<u64>,
}

impl MultiObjectTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            frame_id: 0,
            next_track_id: 0,
            tracks: BTreeMap::new(),
            removed_ids: HashSet::new(),
        }
    }

    /// Process one frame of detections, exactly once per frame.
    pub fn update(&mut self, detections: &[Detection]) -> Vec<TrackedObject> {
        self.frame_id += 1;

        for track in self.tracks.values_mut() {
            track.time_since_update += 1;
        }

        if detections.is_empty() {
            // Coast: report predicted positions, touch nothing else.
            return self.predict_tracks();
        }

        // Detector-provided ids are informational only; identity is ours.
        if let Some(hint) = detections.iter().find_map(|d| d.track_id) {
            debug!("ignoring detector-provided track id hint {}", hint);
        }

        let mut tracked = Vec::new();
        for class in [ObjectClass::Player, ObjectClass::Ball] {
            let class_dets: Vec<&Detection> =
                detections.iter().filter(|d| d.class == class).collect();
            if class_dets.is_empty() {
                continue;
            }
            self.update_class(&class_dets, class, &mut tracked);
        }

        self.prune_lost_tracks();

        tracked
    }

    fn update_class(
        &mut self,
        detections: &[&Detection],
        class: ObjectClass,
        tracked: &mut Vec<TrackedObject>,
    ) {
        let params = self.config.params_for(class);
        let class_track_ids: Vec<u64> = self
            .tracks
            .iter()
            .filter(|(_, t)| t.class == class)
            .map(|(&id, _)| id)
            .collect();

        if class_track_ids.is_empty() {
            for &det in detections {
                if det.score > self.config.creation_threshold {
                    let id = self.spawn_track(det, class);
                    tracked.push(report(&self.tracks[&id], self.frame_id));
                } else {
                    debug!(
                        "dropping {} detection below creation threshold ({:.2})",
                        class.as_str(),
                        det.score
                    );
                }
            }
            return;
        }

        // Greedy matching: each track, in ascending id order, takes the
        // best remaining detection above the class threshold.
        let mut unmatched: Vec<usize> = (0..detections.len()).collect();
        for &track_id in &class_track_ids {
            let smoothed = self.tracks[&track_id].smoothed_bbox();
            let mut best: Option<(usize, f32)> = None;
            for (slot, &det_idx) in unmatched.iter().enumerate() {
                let iou = smoothed.iou(&detections[det_idx].bbox);
                if iou > params.match_threshold && best.map_or(true, |(_, b)| iou > b) {
                    best = Some((slot, iou));
                }
            }
            if let Some((slot, _)) = best {
                let det_idx = unmatched.remove(slot);
                let det = detections[det_idx];
                if let Some(track) = self.tracks.get_mut(&track_id) {
                    track.update(det.bbox, det.score, self.frame_id);
                    tracked.push(report(track, self.frame_id));
                }
            }
        }

        for det_idx in unmatched {
            let det = detections[det_idx];
            if det.score > self.config.creation_threshold {
                let id = self.spawn_track(det, class);
                tracked.push(report(&self.tracks[&id], self.frame_id));
            }
        }
    }

    fn spawn_track(&mut self, det: &Detection, class: ObjectClass) -> u64 {
        let id = self.next_track_id;
        self.next_track_id += 1;
        debug_assert!(!self.removed_ids.contains(&id), "track id reuse");
        info!(
            "new {} track {} (score {:.2})",
            class.as_str(),
            id,
            det.score
        );
        self.tracks
            .insert(id, Track::new(id, det.bbox, det.score, self.frame_id, class));
        id
    }

    fn predict_tracks(&self) -> Vec<TrackedObject> {
        self.tracks
            .values()
            .filter(|t| t.active())
            .map(|t| TrackedObject {
                track_id: t.id,
                bbox: t.predict(self.frame_id),
                score: t.score,
                class: t.class,
                confidence: t.average_confidence(),
                frame_id: self.frame_id,
            })
            .collect()
    }

    fn prune_lost_tracks(&mut self) {
        let dead: Vec<u64> = self
            .tracks
            .iter()
            .filter(|(_, t)| t.time_since_update > self.config.params_for(t.class).max_time_lost)
            .map(|(&id, _)| id)
            .collect();

        for id in dead {
            if let Some(track) = self.tracks.remove(&id) {
                info!(
                    "track {} ({}) removed after {} unmatched frames",
                    id,
                    track.class.as_str(),
                    track.time_since_update
                );
                self.removed_ids.insert(id);
            }
        }
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    pub fn removed_ids(&self) -> &HashSet<u64> {
        &self.removed_ids
    }

    pub fn track_statistics(&self) -> TrackStatistics {
        TrackStatistics {
            active_tracks: self.tracks.len(),
            confirmed_tracks: self.tracks.values().filter(|t| t.confirmed).count(),
            total_tracks_created: self.next_track_id,
        }
    }
}

fn report(track: &Track, frame_id: u64) -> TrackedObject {
    TrackedObject {
        track_id: track.id,
        bbox: track.smoothed_bbox(),
        score: track.score,
        class: track.class,
        confidence: track.average_confidence(),
        frame_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BBox;

    fn det(x: f32, y: f32, w: f32, h: f32, score: f32, class: ObjectClass) -> Detection {
        Detection {
            bbox: BBox::new(x, y, w, h),
            score,
            class,
            track_id: None,
        }
    }

    fn player(x: f32, y: f32) -> Detection {
        det(x, y, 50.0, 80.0, 0.9, ObjectClass::Player)
    }

    fn ball(x: f32, y: f32) -> Detection {
        det(x, y, 20.0, 20.0, 0.8, ObjectClass::Ball)
    }

    #[test]
    fn test_first_frame_creates_tracks() {
        let mut tracker = MultiObjectTracker::new(TrackerConfig::default());
        let tracked = tracker.update(&[player(100.0, 100.0), player(300.0, 100.0), ball(200.0, 200.0)]);

        assert_eq!(tracked.len(), 3);
        let ids: Vec<u64> = tracked.iter().map(|t| t.track_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        // Smoothed box of a fresh track equals the detection box.
        assert_eq!(tracked[0].bbox, BBox::new(100.0, 100.0, 50.0, 80.0));
    }

    #[test]
    fn test_low_score_detection_is_dropped() {
        let mut tracker = MultiObjectTracker::new(TrackerConfig::default());
        let tracked = tracker.update(&[det(0.0, 0.0, 50.0, 80.0, 0.2, ObjectClass::Player)]);
        assert!(tracked.is_empty());
        assert_eq!(tracker.track_statistics().total_tracks_created, 0);
    }

    #[test]
    fn test_match_keeps_identity_across_frames() {
        let mut tracker = MultiObjectTracker::new(TrackerConfig::default());
        tracker.update(&[player(100.0, 100.0)]);
        for i in 1..10 {
            let tracked = tracker.update(&[player(100.0 + i as f32, 100.0)]);
            assert_eq!(tracked.len(), 1);
            assert_eq!(tracked[0].track_id, 0);
        }
        assert_eq!(tracker.track_statistics().total_tracks_created, 1);
    }

    #[test]
    fn test_ids_strictly_increase_and_never_recycle() {
        let mut tracker = MultiObjectTracker::new(TrackerConfig::default());
        tracker.update(&[ball(100.0, 100.0)]);

        // Starve the ball track past its 10-frame horizon. Pruning runs on
        // detection-bearing frames, so keep a distant player in view.
        for _ in 0..12 {
            tracker.update(&[player(800.0, 600.0)]);
        }
        assert!(tracker.removed_ids().contains(&0));
        assert!(!tracker.tracks().any(|t| t.id == 0));

        // A new ball at the old position must get a fresh id.
        let tracked = tracker.update(&[ball(100.0, 100.0)]);
        let new_ball = tracked
            .iter()
            .find(|t| t.class == ObjectClass::Ball)
            .unwrap();
        assert!(new_ball.track_id > 0);
        assert_ne!(new_ball.track_id, 0);
    }

    #[test]
    fn test_player_survives_longer_than_ball() {
        let mut tracker = MultiObjectTracker::new(TrackerConfig::default());
        tracker.update(&[player(100.0, 100.0), ball(500.0, 400.0)]);

        // 15 unmatched frames: past the ball's 10-frame horizon, inside
        // the player's 20-frame horizon. A distant second player keeps
        // each frame detection-bearing.
        for _ in 0..15 {
            tracker.update(&[player(800.0, 600.0)]);
        }
        assert!(tracker.tracks().any(|t| t.class == ObjectClass::Player && t.id == 0));
        assert!(!tracker.tracks().any(|t| t.class == ObjectClass::Ball));
    }

    #[test]
    fn test_empty_frame_returns_predictions_only() {
        let mut tracker = MultiObjectTracker::new(TrackerConfig::default());
        tracker.update(&[player(100.0, 100.0)]);

        let tracked = tracker.update(&[]);
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].track_id, 0);
        // Stationary track: prediction stays on the detection box.
        assert_eq!(tracked[0].bbox, BBox::new(100.0, 100.0, 50.0, 80.0));
        // No creation, no removal on empty frames.
        assert_eq!(tracker.track_statistics().total_tracks_created, 1);
        assert!(tracker.removed_ids().is_empty());
    }

    #[test]
    fn test_inactive_track_not_predicted() {
        let mut tracker = MultiObjectTracker::new(TrackerConfig::default());
        tracker.update(&[player(100.0, 100.0)]);

        // 10 empty frames exhaust the prediction horizon.
        for _ in 0..10 {
            tracker.update(&[]);
        }
        let tracked = tracker.update(&[]);
        assert!(tracked.is_empty());
        // The track itself is still alive; only prediction output stops.
        assert_eq!(tracker.tracks().count(), 1);
    }

    #[test]
    fn test_time_since_update_persists_across_empty_frames() {
        let mut tracker = MultiObjectTracker::new(TrackerConfig::default());
        tracker.update(&[player(100.0, 100.0)]);
        tracker.update(&[]);
        tracker.update(&[]);

        let track = tracker.tracks().next().unwrap();
        assert_eq!(track.time_since_update, 2);

        // A match resets the counter.
        tracker.update(&[player(100.0, 100.0)]);
        let track = tracker.tracks().next().unwrap();
        assert_eq!(track.time_since_update, 0);
    }

    #[test]
    fn test_classes_never_cross_match() {
        let mut tracker = MultiObjectTracker::new(TrackerConfig::default());
        tracker.update(&[player(100.0, 100.0)]);

        // A ball overlapping the player's box must spawn its own track.
        let tracked = tracker.update(&[det(100.0, 100.0, 50.0, 80.0, 0.8, ObjectClass::Ball)]);
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].class, ObjectClass::Ball);
        assert_eq!(tracked[0].track_id, 1);
        assert_eq!(tracker.tracks().count(), 2);
    }

    #[test]
    fn test_greedy_matching_favors_lowest_track_id() {
        let mut tracker = MultiObjectTracker::new(TrackerConfig::default());
        tracker.update(&[player(0.0, 0.0), player(20.0, 0.0)]);

        // One detection equally overlapping both tracks: track 0 is
        // visited first and takes it; track 1 stays unmatched.
        let tracked = tracker.update(&[player(10.0, 0.0)]);
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].track_id, 0);

        let unmatched = tracker.tracks().find(|t| t.id == 1).unwrap();
        assert_eq!(unmatched.time_since_update, 1);
    }

    #[test]
    fn test_unmatched_detection_spawns_new_track() {
        let mut tracker = MultiObjectTracker::new(TrackerConfig::default());
        tracker.update(&[player(100.0, 100.0)]);

        let tracked = tracker.update(&[player(100.0, 100.0), player(600.0, 300.0)]);
        assert_eq!(tracked.len(), 2);
        assert_eq!(tracked[0].track_id, 0);
        assert_eq!(tracked[1].track_id, 1);
    }

    #[test]
    fn test_degenerate_detection_never_matches() {
        let mut tracker = MultiObjectTracker::new(TrackerConfig::default());
        tracker.update(&[player(100.0, 100.0)]);

        // Zero-area box: IoU is 0 everywhere, so it cannot steal the
        // existing track; it spawns a short-lived track of its own.
        let tracked = tracker.update(&[
            player(100.0, 100.0),
            det(100.0, 100.0, 0.0, 0.0, 0.9, ObjectClass::Player),
        ]);
        assert_eq!(tracked.len(), 2);
        assert_eq!(tracked[0].track_id, 0);
        assert_eq!(tracked[1].track_id, 1);
    }

    #[test]
    fn test_track_statistics() {
        let mut tracker = MultiObjectTracker::new(TrackerConfig::default());
        for _ in 0..3 {
            tracker.update(&[player(100.0, 100.0), ball(400.0, 300.0)]);
        }
        let stats = tracker.track_statistics();
        assert_eq!(stats.active_tracks, 2);
        assert_eq!(stats.confirmed_tracks, 2);
        assert_eq!(stats.total_tracks_created, 2);
    }
}
