use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::engine::angles::a180;
use crate::engine::geodesy::Geodesy;
use crate::engine::heading::{direct_heading, HeadingPolicy};
use crate::engine::mask::CoastDetector;
use crate::engine::models::{Boat, Coordinate, NavMode, TrackPoint, TrackPointKind, Waypoint};
use crate::engine::physics::PhysicsModel;
use crate::engine::polar::PolarModel;
use crate::engine::vbvmg::TwoLegSearch;
use crate::engine::weather::WeatherField;
use crate::error::{RoutingError, RoutingResult};

/// Below this logged distance the boat's last update is considered stale
const MIN_LOCH: f64 = 0.01;

/// Remaining distance under which the boat is standing on the waypoint
const ON_WAYPOINT_NM: f64 = 1e-9;

/// When the route starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StartTime {
    /// Boat's last position report (or the current time for a boat that has not sailed yet)
    #[default]
    Now,
    /// Date currently displayed by the weather field
    WeatherDate,
    Fixed(DateTime<Utc>),
}

/// Where the route starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StartPoint {
    #[default]
    Boat,
    FirstWaypoint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteSettings {
    pub start_time: StartTime,
    /// Length of one integration step
    pub step_seconds: i64,
    pub step_multiplier: i64,
    /// Boat speed factor applied on the step following a tack or gybe
    pub tack_speed_loss: f64,
    pub detect_coasts: bool,
    pub two_leg_search: TwoLegSearch,
    /// Record the last heading sailed towards each reached waypoint
    pub auto_heading: bool,
}

impl Default for RouteSettings {
    fn default() -> Self {
        Self {
            start_time: StartTime::Now,
            step_seconds: 3600,
            step_multiplier: 1,
            tack_speed_loss: 1.0,
            detect_coasts: false,
            two_leg_search: TwoLegSearch::Full,
            auto_heading: false,
        }
    }
}

impl RouteSettings {
    pub fn step(&self) -> Duration {
        Duration::seconds((self.step_seconds * self.step_multiplier.max(1)).max(1))
    }
}

/// Result of the last recalculation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteOutcome {
    /// The final waypoint was reached inside the weather coverage
    pub has_arrival: bool,
    /// Arrival at the final waypoint, or time of the last computed point
    pub eta: DateTime<Utc>,
    /// Nautical miles left to the final waypoint
    pub remaining_distance: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Route {
    pub name: String,
    pub waypoints: Vec<Waypoint>,
    #[serde(default)]
    pub start: StartPoint,
    #[serde(default)]
    pub settings: RouteSettings,
    #[serde(skip)]
    pub outcome: Option<RouteOutcome>,
    /// Replaced wholesale by each recalculation
    #[serde(skip)]
    pub track: Arc<Vec<TrackPoint>>,
    /// Indices `i` of the track segments `i -> i + 1` running over land
    #[serde(skip)]
    pub coast_crossings: Vec<usize>,
}

impl Route {
    pub fn new(name: impl Into<String>, start: StartPoint) -> Self {
        Self {
            name: name.into(),
            start,
            ..Default::default()
        }
    }

    pub fn with_settings(mut self, settings: RouteSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn add_waypoint(&mut self, waypoint: Waypoint) {
        self.waypoints.push(waypoint);
    }

    pub fn has_arrival(&self) -> bool {
        self.outcome.is_some_and(|o| o.has_arrival)
    }

    pub fn eta(&self) -> Option<DateTime<Utc>> {
        self.outcome.map(|o| o.eta)
    }

    pub fn outcome(&self) -> RoutingResult<RouteOutcome> {
        self.outcome.ok_or_else(|| RoutingError::NotCalculated(self.name.clone()))
    }

    /// Temporarily moves one waypoint, runs `probe`, then puts the waypoint
    /// back where it was. Results computed by `probe` stay on the route.
    pub fn with_trial_position<R>(
        &mut self,
        index: usize,
        position: Coordinate,
        probe: impl FnOnce(&mut Route) -> R,
    ) -> RoutingResult<R> {
        let count = self.waypoints.len();
        let original = self
            .waypoints
            .get(index)
            .map(|w| w.position)
            .ok_or(RoutingError::WaypointOutOfRange { index, count })?;

        self.waypoints[index].position = position.normalized();
        let mut guard = TrialGuard { route: self, index, original };
        Ok(probe(&mut *guard.route))
    }

    /// Position along the computed track at `time`, linearly interpolated
    /// between track points. `None` outside the track's time span.
    pub fn position_at(&self, time: DateTime<Utc>) -> Option<Coordinate> {
        let first = self.track.first()?;
        let last = self.track.last()?;
        if time < first.time || time > last.time {
            return None;
        }

        let idx = self.track.partition_point(|p| p.time <= time);
        let Some(after) = self.track.get(idx) else {
            return Some(last.position);
        };
        let before = &self.track[idx - 1];

        let span = (after.time - before.time).num_milliseconds();
        if span <= 0 {
            return Some(before.position);
        }
        let f = (time - before.time).num_milliseconds() as f64 / span as f64;
        let d_lon = a180(after.position.lon - before.position.lon);
        Some(
            Coordinate::new(
                before.position.lat + (after.position.lat - before.position.lat) * f,
                before.position.lon + d_lon * f,
            )
            .normalized(),
        )
    }

    /// Moves the route start to `start`, shifting the computed arrivals and
    /// track by the same offset. The route then starts at a fixed time.
    pub fn shift_start(&mut self, start: DateTime<Utc>) {
        let previous = match self.settings.start_time {
            StartTime::Fixed(t) => Some(t),
            _ => self.track.first().map(|p| p.time),
        };
        self.settings.start_time = StartTime::Fixed(start);

        let Some(previous) = previous else {
            return;
        };
        let offset = start - previous;
        for waypoint in &mut self.waypoints {
            waypoint.arrival = waypoint.arrival.map(|t| t + offset);
        }
        if let Some(outcome) = &mut self.outcome {
            outcome.eta += offset;
        }
        let shifted: Vec<TrackPoint> = self
            .track
            .iter()
            .map(|p| TrackPoint { time: p.time + offset, ..*p })
            .collect();
        self.track = Arc::new(shifted);
    }
}

/// Puts a probed waypoint back on drop, so an unwinding probe restores it too
struct TrialGuard<'r> {
    route: &'r mut Route,
    index: usize,
    original: Coordinate,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if let Some(waypoint) = self.route.waypoints.get_mut(self.index) {
            waypoint.position = self.original;
        }
    }
}

/// Everything a recalculation reads besides the route itself
#[derive(Clone, Copy)]
pub struct RoutingEnvironment<'a> {
    pub weather: &'a dyn WeatherField,
    pub geodesy: &'a dyn Geodesy,
    pub polar: Option<&'a dyn PolarModel>,
    pub boat: Option<&'a Boat>,
    pub coasts: Option<&'a dyn CoastDetector>,
    /// Wall clock, injected so recalculation stays deterministic
    pub now: DateTime<Utc>,
}

impl<'a> RoutingEnvironment<'a> {
    pub fn new(weather: &'a dyn WeatherField, geodesy: &'a dyn Geodesy, now: DateTime<Utc>) -> Self {
        Self {
            weather,
            geodesy,
            polar: None,
            boat: None,
            coasts: None,
            now,
        }
    }

    pub fn with_polar(mut self, polar: &'a dyn PolarModel) -> Self {
        self.polar = Some(polar);
        self
    }

    pub fn with_boat(mut self, boat: &'a Boat) -> Self {
        self.boat = Some(boat);
        self
    }

    pub fn with_coasts(mut self, coasts: &'a dyn CoastDetector) -> Self {
        self.coasts = Some(coasts);
        self
    }
}

/// How the waypoint loop ended
enum LegsEnd {
    Arrived,
    /// Weather missing from this point on
    OutOfWeather,
}

/// Steps a route forward in time through its waypoints
pub struct RouteIntegrator<'a> {
    env: RoutingEnvironment<'a>,
    policy: HeadingPolicy,
}

impl<'a> RouteIntegrator<'a> {
    pub fn new(env: RoutingEnvironment<'a>) -> Self {
        Self {
            env,
            policy: HeadingPolicy::new(TwoLegSearch::default()),
        }
    }

    pub fn environment(&self) -> &RoutingEnvironment<'a> {
        &self.env
    }

    fn start_time(&self, route: &Route) -> DateTime<Utc> {
        match route.settings.start_time {
            StartTime::Now => match self.env.boat {
                Some(boat) if boat.loch >= MIN_LOCH => boat.last_update,
                _ => self.env.now,
            },
            StartTime::WeatherDate => self.env.weather.current_date().unwrap_or(self.env.now),
            StartTime::Fixed(t) => t,
        }
    }

    fn clear(route: &mut Route) {
        route.outcome = None;
        route.track = Arc::new(Vec::new());
        route.coast_crossings.clear();
        for waypoint in &mut route.waypoints {
            waypoint.arrival = None;
            waypoint.approach_heading = None;
        }
    }

    /// Recomputes the route's track, waypoint arrivals and outcome.
    ///
    /// A route without waypoints, boat or polar is left cleared. Running out
    /// of weather marks the remaining waypoints unreachable but keeps the legs
    /// already sailed.
    pub fn recalculate(&mut self, route: &mut Route) {
        let (Some(polar), Some(boat)) = (self.env.polar, self.env.boat) else {
            debug!("Route '{}' has no boat or polar, clearing", route.name);
            Self::clear(route);
            return;
        };
        if route.waypoints.is_empty() {
            Self::clear(route);
            return;
        }
        if self.policy.solver_mut().search() != route.settings.two_leg_search {
            self.policy = HeadingPolicy::new(route.settings.two_leg_search);
        }

        let geodesy = self.env.geodesy;
        let weather = self.env.weather;
        let count = route.waypoints.len();
        let final_target = route.waypoints[count - 1].position;
        let step = route.settings.step();
        let step_hours = step.num_seconds() as f64 / 3600.0;

        let mut eta = self.start_time(route);
        let (mut position, first_leg) = match route.start {
            StartPoint::Boat => (boat.position, 0),
            StartPoint::FirstWaypoint => (route.waypoints[0].position, 1),
        };

        let mut arrivals: Vec<Option<DateTime<Utc>>> = vec![None; count];
        let mut approach: Vec<Option<f64>> = vec![None; count];
        if first_leg == 1 {
            arrivals[0] = Some(eta);
        }

        let first_remaining = route
            .waypoints
            .get(first_leg)
            .map(|w| geodesy.distance(&position, &w.position))
            .unwrap_or(0.0);
        let mut track = vec![TrackPoint::marker(TrackPointKind::Start, position, eta, None, first_remaining)];

        info!(
            "Recalculating route '{}': {} waypoints from {}, step {}s",
            route.name,
            count,
            eta,
            step.num_seconds()
        );

        let Some(max_date) = weather.max_date() else {
            warn!("Route '{}': no weather data loaded", route.name);
            route.outcome = Some(RouteOutcome {
                has_arrival: false,
                eta,
                remaining_distance: geodesy.distance(&position, &final_target),
            });
            Self::publish(route, track, arrivals, approach);
            return;
        };

        let mut previous_twa: Option<f64> = None;
        let mut leg_remaining = 0.0;
        let mut end = LegsEnd::Arrived;

        'legs: for idx in first_leg..count {
            let target = route.waypoints[idx].position;
            let mode = route.waypoints[idx].nav_mode;

            if let Some(fixed) = route.waypoints[idx].fixed_arrival {
                // Imposed time: jump onto the waypoint, never back in time
                eta = eta.max(fixed);
                position = target;
                debug!("Route '{}': waypoint {} imposed at {}", route.name, idx, eta);
                track.push(TrackPoint::marker(TrackPointKind::LegEnd, position, eta, Some(idx), 0.0));
                arrivals[idx] = Some(eta);
                leg_remaining = 0.0;
                continue;
            }
            let (mut bearing, mut remaining) = geodesy.bearing_and_distance(&position, &target);
            let mut last_heading = None;

            while remaining > ON_WAYPOINT_NM {
                let next_eta = eta + step;
                let wind = if next_eta > max_date {
                    None
                } else {
                    weather.interpolated_wind(&position, next_eta)
                };
                let Some(wind) = wind else {
                    debug!("Route '{}': no weather at {} for leg {}", route.name, next_eta, idx);
                    leg_remaining = remaining;
                    end = LegsEnd::OutOfWeather;
                    break 'legs;
                };
                let current = weather.interpolated_current(&position, next_eta);
                let surface = current.map_or(wind, |c| PhysicsModel::surface_wind(&wind, &c));

                let mut decision = self.policy.next_heading(polar, mode, bearing, remaining, &surface);
                let (mut boat_speed, mut engine_used) = polar.speed(surface.speed, decision.twa);
                if engine_used && mode != NavMode::Direct {
                    decision = direct_heading(bearing, &surface);
                    (boat_speed, engine_used) = polar.speed(surface.speed, decision.twa);
                }
                if previous_twa.is_some_and(|twa| twa * decision.twa < 0.0) {
                    boat_speed *= route.settings.tack_speed_loss;
                }

                let (sog, course) = PhysicsModel::ground_vector(decision.heading, boat_speed, current.as_ref());
                let distance = sog * step_hours;
                if distance > remaining {
                    // This step would sail past the waypoint: reached at its start
                    break;
                }

                position = geodesy.destination(&position, distance, course);
                eta = next_eta;
                (bearing, remaining) = geodesy.bearing_and_distance(&position, &target);
                track.push(TrackPoint {
                    kind: TrackPointKind::Step,
                    position,
                    time: eta,
                    waypoint: Some(idx),
                    wind,
                    heading: decision.heading,
                    boat_speed,
                    course,
                    sog,
                    twa: decision.twa,
                    distance,
                    distance_remaining: remaining,
                    engine_used,
                });
                previous_twa = Some(decision.twa);
                last_heading = Some(decision.heading);
            }

            debug!("Route '{}': waypoint {} reached at {}", route.name, idx, eta);
            track.push(TrackPoint::marker(TrackPointKind::LegEnd, position, eta, Some(idx), remaining));
            arrivals[idx] = Some(eta);
            if route.settings.auto_heading {
                approach[idx] = last_heading.map(|h| (h * 100.0).round() / 100.0);
            }
            leg_remaining = remaining;
        }

        let outcome = match end {
            LegsEnd::Arrived => RouteOutcome {
                has_arrival: true,
                eta,
                remaining_distance: leg_remaining,
            },
            LegsEnd::OutOfWeather => {
                warn!(
                    "Route '{}' runs out of weather at {}, {:.1} NM from the current leg target",
                    route.name, eta, leg_remaining
                );
                RouteOutcome {
                    has_arrival: false,
                    eta,
                    remaining_distance: geodesy.distance(&position, &final_target),
                }
            }
        };
        route.outcome = Some(outcome);

        route.coast_crossings = match self.env.coasts {
            Some(coasts) if route.settings.detect_coasts => track
                .windows(2)
                .enumerate()
                .filter(|(_, pair)| pair[0].position != pair[1].position)
                .filter(|(_, pair)| coasts.crosses_land(&pair[0].position, &pair[1].position))
                .map(|(i, _)| i)
                .collect(),
            _ => Vec::new(),
        };
        if !route.coast_crossings.is_empty() {
            warn!("Route '{}' crosses land on {} segments", route.name, route.coast_crossings.len());
        }

        info!(
            "Route '{}': {} points, arrival {} at {}, {:.2} NM remaining",
            route.name,
            track.len(),
            outcome.has_arrival,
            outcome.eta,
            outcome.remaining_distance
        );
        Self::publish(route, track, arrivals, approach);
    }

    fn publish(
        route: &mut Route,
        track: Vec<TrackPoint>,
        arrivals: Vec<Option<DateTime<Utc>>>,
        approach: Vec<Option<f64>>,
    ) {
        for ((waypoint, arrival), heading) in route.waypoints.iter_mut().zip(arrivals).zip(approach) {
            waypoint.arrival = arrival;
            waypoint.approach_heading = heading;
        }
        route.track = Arc::new(track);
    }
}
