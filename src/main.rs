// src/main.rs

mod analysis;
mod config;
mod geometry;
mod tracking;
mod types;

use analysis::{MetricsAnalyzer, PossessionAnalyzer};
use anyhow::Result;
use geometry::BBox;
use tracking::MultiObjectTracker;
use tracing::{debug, info};
use types::{Config, Detection, ObjectClass};

fn detection(bbox: BBox, score: f32, class: ObjectClass) -> Detection {
    Detection {
        bbox,
        score,
        class,
        track_id: None,
    }
}

/// Synthetic detections for one frame of a short two-player rally:
/// player 1 carries the ball, plays a short pass to player 2, and the
/// ball eventually rolls clear.
fn synthetic_frame(frame: u64) -> Vec<Detection> {
    // One detector dropout: the tracker must coast on predictions.
    if frame == 35 {
        return Vec::new();
    }

    let p1_x = 100.0 + 0.5 * frame as f32;
    let mut detections = vec![
        detection(
            BBox::new(p1_x, 100.0, 50.0, 80.0),
            0.92,
            ObjectClass::Player,
        ),
        detection(
            BBox::new(140.0, 100.0, 50.0, 80.0),
            0.88,
            ObjectClass::Player,
        ),
    ];

    let (ball_cx, ball_cy) = match frame {
        // Carried by player 1.
        1..=20 => (p1_x + 27.0, 140.0),
        // In flight between the two players.
        21..=22 => (155.0, 260.0),
        // Received by player 2.
        23..=45 => (167.0, 140.0),
        // Rolls clear.
        _ => (600.0, 400.0),
    };
    detections.push(detection(
        BBox::new(ball_cx - 10.0, ball_cy - 10.0, 20.0, 20.0),
        0.85,
        ObjectClass::Ball,
    ));

    detections
}

fn main() -> Result<()> {
    let config = Config::load("config.yaml")?;

    tracing_subscriber::fmt()
        .with_env_filter(format!("soccer_tracking={}", config.logging.level))
        .init();

    info!("⚽ soccer tracking & match analytics demo");

    let mut tracker = MultiObjectTracker::new(config.tracker.clone());
    let mut possession = PossessionAnalyzer::new(config.possession.clone())?;
    let mut metrics = MetricsAnalyzer::new(config.metrics.clone())?;

    let total_frames = 60u64;
    for frame in 1..=total_frames {
        let detections = synthetic_frame(frame);
        let tracked = tracker.update(&detections);
        possession.update_tracks(&tracked, frame);
        metrics.update_tracks(&tracked, frame);
    }

    let track_stats = tracker.track_statistics();
    info!(
        "processed {} frames: {} live tracks, {} confirmed, {} created, {} retired",
        tracker.frame_id(),
        track_stats.active_tracks,
        track_stats.confirmed_tracks,
        track_stats.total_tracks_created,
        tracker.removed_ids().len()
    );
    for track in tracker.tracks() {
        let (cx, cy) = track.smoothed_center();
        let (vx, vy) = track.velocity();
        info!(
            "track {} ({}) at ({:.0}, {:.0}), velocity ({:.2}, {:.2}), confirmed={}",
            track.id,
            track.class.as_str(),
            cx,
            cy,
            vx,
            vy,
            track.confirmed
        );
    }

    let possession_stats = possession.possession_stats();
    let pass_stats = possession.pass_stats();
    info!(
        "possession: team A {:.1}%, team B {:.1}%, {} spans, {} passes",
        possession_stats.team_a_percentage,
        possession_stats.team_b_percentage,
        possession_stats.possession_events,
        pass_stats.total_passes
    );

    println!("{}", serde_json::to_string(&possession_stats)?);
    println!("{}", serde_json::to_string(&pass_stats)?);
    for span in possession.possession_log() {
        println!("{}", serde_json::to_string(span)?);
    }
    for event in possession.pass_events() {
        println!("{}", serde_json::to_string(event)?);
    }

    info!(
        "player 0 covered {:.0}px, visited {} heatmap cells",
        metrics.total_distance(0),
        metrics
            .heatmap(0)
            .iter()
            .flatten()
            .filter(|&&count| count > 0)
            .count()
    );
    let sprints = metrics.detect_events();
    info!("sprint windows detected: {}", sprints.len());
    if let Some(sprint) = sprints.first() {
        debug!(
            "first sprint: track {} at window {} ({:.1} px/s)",
            sprint.track_id, sprint.window_index, sprint.speed
        );
    }
    if let Some(spread) = metrics.team_metrics(&[0, 1]) {
        info!(
            "player spread: {:.0}x{:.0}px (compactness {:.0}), centroid ({:.0}, {:.0})",
            spread.width,
            spread.height,
            spread.compactness,
            spread.centroid.0,
            spread.centroid.1
        );
    }

    // A new video session reuses the analyzers after a reset; the tracker
    // is simply rebuilt.
    possession.reset();
    metrics.reset();

    Ok(())
}
