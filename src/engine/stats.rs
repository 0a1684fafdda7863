use chrono::Duration;

use crate::engine::models::{TrackPoint, TrackPointKind};

/// Below this |TWA| a step counts as upwind sailing
const UPWIND_LIMIT: f64 = 70.0;
/// Below this |TWA| (and above the upwind limit) a step counts as reaching
const REACHING_LIMIT: f64 = 130.0;

/// Summary of a computed track
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RouteStats {
    pub steps: usize,
    pub total_time: Duration,
    /// Nautical miles sailed
    pub total_distance: f64,
    pub min_tws: f64,
    pub avg_tws: f64,
    pub max_tws: f64,
    pub min_boat_speed: f64,
    pub avg_boat_speed: f64,
    pub max_boat_speed: f64,
    pub upwind_time: Duration,
    pub reaching_time: Duration,
    pub downwind_time: Duration,
    pub tacks_and_gybes: usize,
    pub engine_time: Duration,
}

impl RouteStats {
    /// Aggregates the telemetry recorded on each step of the track
    pub fn from_track(track: &[TrackPoint]) -> Self {
        let mut stats = RouteStats {
            min_tws: f64::MAX,
            max_tws: f64::MIN,
            min_boat_speed: f64::MAX,
            max_boat_speed: f64::MIN,
            ..Default::default()
        };
        let mut previous_twa: Option<f64> = None;

        for pair in track.windows(2) {
            let (from, to) = (&pair[0], &pair[1]);
            if to.kind != TrackPointKind::Step {
                continue;
            }
            let elapsed = to.time - from.time;

            stats.steps += 1;
            stats.total_time += elapsed;
            stats.total_distance += to.distance;

            stats.avg_tws += to.wind.speed;
            stats.min_tws = stats.min_tws.min(to.wind.speed);
            stats.max_tws = stats.max_tws.max(to.wind.speed);

            stats.avg_boat_speed += to.boat_speed;
            stats.min_boat_speed = stats.min_boat_speed.min(to.boat_speed);
            stats.max_boat_speed = stats.max_boat_speed.max(to.boat_speed);

            match to.twa.abs() {
                twa if twa < UPWIND_LIMIT => stats.upwind_time += elapsed,
                twa if twa < REACHING_LIMIT => stats.reaching_time += elapsed,
                _ => stats.downwind_time += elapsed,
            }

            if previous_twa.is_some_and(|twa| twa * to.twa < 0.0) {
                stats.tacks_and_gybes += 1;
            }
            previous_twa = Some(to.twa);

            if to.engine_used {
                stats.engine_time += elapsed;
            }
        }

        if stats.steps == 0 {
            return Self::default();
        }
        stats.avg_tws /= stats.steps as f64;
        stats.avg_boat_speed /= stats.steps as f64;
        stats
    }
}
