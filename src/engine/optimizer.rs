//! Waypoint fine positioning.
//!
//! A 2-D Nelder–Mead simplex moves one waypoint around its current position,
//! recalculating the whole route for every probe, and keeps the position with
//! the best route outcome as ranked by [`compare_candidates`].

use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::engine::models::Coordinate;
use crate::engine::router::{Route, RouteIntegrator, StartPoint};
use crate::error::{RoutingError, RoutingResult};

/// Probed latitudes are kept inside ±85°
const MAX_LATITUDE: f64 = 85.0;

/// One simplex vertex and the route outcome it produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimplexCandidate {
    pub position: Coordinate,
    pub eta: DateTime<Utc>,
    pub remaining: f64,
    /// The route reaches its final waypoint
    pub arrived: bool,
    /// The probed waypoint itself gets an arrival time
    pub reached: bool,
}

impl SimplexCandidate {
    fn rank(&self) -> u8 {
        if self.arrived {
            0
        } else if self.reached {
            1
        } else {
            2
        }
    }
}

/// Total order used by the optimizer, best first.
///
/// Arrived routes beat routes that only reach the probed waypoint, which beat
/// routes reaching neither. Within a class the earlier eta wins, then the
/// smaller remaining distance. Comparing eta and distance even when nothing
/// is reached keeps the search heading for the target rather than for the
/// nearest edge of the weather coverage.
pub fn compare_candidates(a: &SimplexCandidate, b: &SimplexCandidate) -> Ordering {
    a.rank()
        .cmp(&b.rank())
        .then_with(|| a.eta.cmp(&b.eta))
        .then_with(|| a.remaining.total_cmp(&b.remaining))
}

/// What to do with the best position found when the search is aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AbortPolicy {
    #[default]
    KeepBest,
    Revert,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSettings {
    /// Longitude offset of the seed vertices when `auto_range` is off, degrees
    pub search_range_lon: f64,
    /// Latitude offset of the seed vertices when `auto_range` is off, degrees
    pub search_range_lat: f64,
    /// The search stops once the simplex spans less than this in both axes, degrees
    pub search_step: f64,
    /// Seed towards the farther route neighbour instead of fixed offsets
    pub auto_range: bool,
    /// Angle either side of the neighbour bearing for auto seeding, degrees
    pub seed_angle: f64,
    pub max_iterations: usize,
    pub on_abort: AbortPolicy,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            search_range_lon: 1.0,
            search_range_lat: 1.0,
            search_step: 0.01,
            auto_range: true,
            seed_angle: 30.0,
            max_iterations: 500,
            on_abort: AbortPolicy::KeepBest,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizationOutcome {
    /// The waypoint was moved to a strictly better position
    pub improved: bool,
    pub aborted: bool,
    pub iterations: usize,
    /// Route outcome before optimization
    pub initial: SimplexCandidate,
    /// Route outcome with the waypoint where it was left
    pub result: SimplexCandidate,
}

#[derive(Debug, Clone, Default)]
pub struct WaypointOptimizer {
    pub settings: OptimizerSettings,
}

impl WaypointOptimizer {
    pub fn new(settings: OptimizerSettings) -> Self {
        Self { settings }
    }

    /// Moves waypoint `index` of `route` to the best position found around
    /// it. The route is left recalculated.
    ///
    /// The waypoint only moves if the route outcome gets strictly better,
    /// otherwise it is put back exactly where it was. `abort` is polled once
    /// per iteration.
    pub fn optimize(
        &self,
        integrator: &mut RouteIntegrator<'_>,
        route: &mut Route,
        index: usize,
        abort: Option<&AtomicBool>,
    ) -> RoutingResult<OptimizationOutcome> {
        let count = route.waypoints.len();
        if index >= count {
            return Err(RoutingError::WaypointOutOfRange { index, count });
        }
        if index + 1 == count {
            return Err(RoutingError::NotOptimizable {
                index,
                reason: "the last waypoint has no following neighbour",
            });
        }

        let original = route.waypoints[index].position;
        integrator.recalculate(route);
        let initial = Self::candidate(route, index, original)?;

        info!(
            "Optimizing waypoint {} '{}' of route '{}'",
            index, route.waypoints[index].name, route.name
        );

        let (seed1, seed2) = self.seeds(integrator, route, index);
        let mut simplex = [
            initial,
            self.evaluate(integrator, route, index, seed1)?,
            self.evaluate(integrator, route, index, seed2)?,
        ];
        sort_simplex(&mut simplex);

        let step = self.settings.search_step;
        let mut iterations = 0;
        let mut aborted = false;

        while spans_at_least(&simplex, step) {
            if abort.is_some_and(|flag| flag.load(AtomicOrdering::Relaxed)) {
                aborted = true;
                break;
            }
            if iterations >= self.settings.max_iterations {
                warn!(
                    "Waypoint {} optimization stopped after {} iterations",
                    index, iterations
                );
                break;
            }
            iterations += 1;
            self.iterate(integrator, route, index, &mut simplex)?;
            debug!(
                "Iteration {}: best {:?} eta {} remaining {:.3}",
                iterations, simplex[0].position, simplex[0].eta, simplex[0].remaining
            );
        }

        let target = if aborted && self.settings.on_abort == AbortPolicy::Revert {
            original
        } else {
            simplex[0].position
        };

        route.waypoints[index].position = target.normalized();
        integrator.recalculate(route);
        let mut result = Self::candidate(route, index, target)?;
        let improved = compare_candidates(&result, &initial) == Ordering::Less;

        if !improved && route.waypoints[index].position != original {
            warn!("Waypoint {} optimization found no improvement, restoring its position", index);
            route.waypoints[index].position = original;
            integrator.recalculate(route);
            result = Self::candidate(route, index, original)?;
        }

        info!(
            "Waypoint {} optimization done after {} iterations: improved {}, eta {} -> {}",
            index, iterations, improved, initial.eta, result.eta
        );

        Ok(OptimizationOutcome {
            improved,
            aborted,
            iterations,
            initial,
            result,
        })
    }

    /// Reflect, expand, contract or reduce, keeping the simplex sorted
    fn iterate(
        &self,
        integrator: &mut RouteIntegrator<'_>,
        route: &mut Route,
        index: usize,
        simplex: &mut [SimplexCandidate; 3],
    ) -> RoutingResult<()> {
        let [s0, s1, s2] = simplex.map(|c| c.position);
        let better = |a: &SimplexCandidate, b: &SimplexCandidate| compare_candidates(a, b) == Ordering::Less;

        let reflect = self.evaluate(
            integrator,
            route,
            index,
            Coordinate::new(s0.lat + s1.lat - s2.lat, s0.lon + s1.lon - s2.lon),
        )?;
        if !better(&reflect, &simplex[0]) && better(&reflect, &simplex[1]) {
            simplex[2] = simplex[1];
            simplex[1] = reflect;
            return Ok(());
        }

        if better(&reflect, &simplex[0]) {
            let expand = self.evaluate(
                integrator,
                route,
                index,
                Coordinate::new(
                    3.0 * (s0.lat + s1.lat) / 2.0 - 2.0 * s2.lat,
                    3.0 * (s0.lon + s1.lon) / 2.0 - 2.0 * s2.lon,
                ),
            )?;
            simplex[2] = simplex[1];
            simplex[1] = simplex[0];
            simplex[0] = if better(&expand, &reflect) { expand } else { reflect };
            return Ok(());
        }

        let contract = self.evaluate(
            integrator,
            route,
            index,
            Coordinate::new(
                (s0.lat + s1.lat) / 4.0 + s2.lat / 2.0,
                (s0.lon + s1.lon) / 4.0 + s2.lon / 2.0,
            ),
        )?;
        if better(&contract, &simplex[2]) {
            if better(&contract, &simplex[0]) {
                simplex[2] = simplex[1];
                simplex[1] = simplex[0];
                simplex[0] = contract;
            } else if better(&contract, &simplex[1]) {
                simplex[2] = simplex[1];
                simplex[1] = contract;
            } else {
                simplex[2] = contract;
            }
            return Ok(());
        }

        // Shrink towards the best vertex
        simplex[1] = self.evaluate(
            integrator,
            route,
            index,
            Coordinate::new((s0.lat + s1.lat) / 2.0, (s0.lon + s1.lon) / 2.0),
        )?;
        simplex[2] = self.evaluate(
            integrator,
            route,
            index,
            Coordinate::new((s0.lat + s2.lat) / 2.0, (s0.lon + s2.lon) / 2.0),
        )?;
        sort_simplex(simplex);
        Ok(())
    }

    /// The two vertices seeding the simplex besides the current position
    fn seeds(&self, integrator: &RouteIntegrator<'_>, route: &Route, index: usize) -> (Coordinate, Coordinate) {
        let current = route.waypoints[index].position;
        let fixed = (
            Coordinate::new(current.lat, current.lon - self.settings.search_range_lon),
            Coordinate::new(current.lat - self.settings.search_range_lat, current.lon),
        );
        if !self.settings.auto_range {
            return fixed;
        }

        let env = integrator.environment();
        let previous = match (index, route.start, env.boat) {
            (0, StartPoint::Boat, Some(boat)) => Some(boat.position),
            (0, _, _) => None,
            _ => Some(route.waypoints[index - 1].position),
        };
        let next = route.waypoints[index + 1].position;

        let (next_bearing, next_distance) = env.geodesy.bearing_and_distance(&current, &next);
        let (bearing, distance) = match previous.map(|p| env.geodesy.bearing_and_distance(&current, &p)) {
            Some((prev_bearing, prev_distance)) if prev_distance >= next_distance => (prev_bearing, prev_distance),
            _ => (next_bearing, next_distance),
        };
        if distance <= 0.0 {
            return fixed;
        }

        let half = distance / 2.0;
        (
            env.geodesy.destination(&current, half, bearing + self.settings.seed_angle),
            env.geodesy.destination(&current, half, bearing - self.settings.seed_angle),
        )
    }

    /// Recalculates the route with the waypoint moved to `position`, then puts it back
    fn evaluate(
        &self,
        integrator: &mut RouteIntegrator<'_>,
        route: &mut Route,
        index: usize,
        position: Coordinate,
    ) -> RoutingResult<SimplexCandidate> {
        let position = Coordinate::new(position.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE), position.lon);
        route.with_trial_position(index, position, |route| {
            integrator.recalculate(route);
            Self::candidate(route, index, position)
        })?
    }

    fn candidate(route: &Route, index: usize, position: Coordinate) -> RoutingResult<SimplexCandidate> {
        let outcome = route.outcome()?;
        Ok(SimplexCandidate {
            position,
            eta: outcome.eta,
            remaining: outcome.remaining_distance,
            arrived: outcome.has_arrival,
            reached: route.waypoints[index].arrival.is_some(),
        })
    }
}

/// Insertion sort, best vertex first
fn sort_simplex(simplex: &mut [SimplexCandidate; 3]) {
    for i in 1..simplex.len() {
        let mut j = i;
        while j > 0 && compare_candidates(&simplex[j], &simplex[j - 1]) == Ordering::Less {
            simplex.swap(j, j - 1);
            j -= 1;
        }
    }
}

fn spans_at_least(simplex: &[SimplexCandidate; 3], step: f64) -> bool {
    let (best, worst) = (simplex[0].position, simplex[2].position);
    (worst.lat - best.lat).abs() >= step || (worst.lon - best.lon).abs() >= step
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::engine::geodesy::GreatCircle;
    use crate::engine::models::{Boat, NavMode, Waypoint};
    use crate::engine::router::{RouteSettings, RoutingEnvironment, StartTime};
    use crate::engine::testing::{boat_at, constant_polar, steady_wind, t0, ScriptedPolar};
    use crate::engine::weather::UniformWeather;

    fn candidate(arrived: bool, reached: bool, hours: i64, remaining: f64) -> SimplexCandidate {
        SimplexCandidate {
            position: Coordinate::new(0.0, 0.0),
            eta: t0() + Duration::hours(hours),
            remaining,
            arrived,
            reached,
        }
    }

    fn dogleg_route(middle: Coordinate) -> Route {
        let mut route = Route::new("dogleg", StartPoint::Boat).with_settings(RouteSettings {
            start_time: StartTime::Fixed(t0()),
            ..Default::default()
        });
        route.add_waypoint(Waypoint::new("middle", middle, NavMode::Direct));
        route.add_waypoint(Waypoint::new("finish", Coordinate::new(0.0, 1.0), NavMode::Direct));
        route
    }

    fn environment<'a>(
        weather: &'a UniformWeather,
        polar: &'a ScriptedPolar,
        boat: &'a Boat,
    ) -> RoutingEnvironment<'a> {
        RoutingEnvironment::new(weather, &GreatCircle, t0())
            .with_polar(polar)
            .with_boat(boat)
    }

    #[test]
    fn test_comparator_classes() {
        let arrived_late = candidate(true, true, 30, 0.5);
        let reached_early = candidate(false, true, 5, 10.0);
        let nothing_early = candidate(false, false, 1, 1.0);

        assert_eq!(compare_candidates(&arrived_late, &reached_early), Ordering::Less);
        assert_eq!(compare_candidates(&reached_early, &nothing_early), Ordering::Less);
        assert_eq!(compare_candidates(&nothing_early, &arrived_late), Ordering::Greater);
    }

    #[test]
    fn test_comparator_tie_breaks() {
        let early = candidate(true, true, 5, 3.0);
        let late = candidate(true, true, 6, 0.0);
        assert_eq!(compare_candidates(&early, &late), Ordering::Less);

        let closer = candidate(false, false, 5, 2.0);
        let farther = candidate(false, false, 5, 3.0);
        assert_eq!(compare_candidates(&closer, &farther), Ordering::Less);
        assert_eq!(compare_candidates(&closer, &closer), Ordering::Equal);
    }

    #[test]
    fn test_sort_simplex_best_first() {
        let mut simplex = [
            candidate(false, false, 5, 1.0),
            candidate(true, true, 9, 0.0),
            candidate(false, true, 2, 4.0),
        ];
        sort_simplex(&mut simplex);
        assert!(simplex[0].arrived);
        assert!(simplex[1].reached && !simplex[1].arrived);
        assert!(!simplex[2].reached);
    }

    #[test]
    fn test_dogleg_waypoint_moves_towards_the_line() {
        let boat = boat_at(Coordinate::new(0.0, 0.0));
        let polar = constant_polar(6.0);
        let weather = steady_wind(10.0, 0.0, 48);
        let mut integrator = RouteIntegrator::new(environment(&weather, &polar, &boat));
        let mut route = dogleg_route(Coordinate::new(0.5, 0.5));

        let optimizer = WaypointOptimizer::default();
        let outcome = optimizer.optimize(&mut integrator, &mut route, 0, None).unwrap();

        assert!(outcome.improved);
        assert!(!outcome.aborted);
        assert!(outcome.result.eta < outcome.initial.eta);
        assert!(route.waypoints[0].position.lat < 0.5);
        assert!(route.has_arrival());
        assert_eq!(route.eta(), Some(outcome.result.eta));
    }

    #[test]
    fn test_fixed_offsets_seeding() {
        let boat = boat_at(Coordinate::new(0.0, 0.0));
        let polar = constant_polar(6.0);
        let weather = steady_wind(10.0, 0.0, 48);
        let mut integrator = RouteIntegrator::new(environment(&weather, &polar, &boat));
        let mut route = dogleg_route(Coordinate::new(0.5, 0.5));

        let optimizer = WaypointOptimizer::new(OptimizerSettings {
            auto_range: false,
            search_range_lon: 0.2,
            search_range_lat: 0.2,
            ..Default::default()
        });
        let outcome = optimizer.optimize(&mut integrator, &mut route, 0, None).unwrap();
        assert!(outcome.improved);
        assert!(outcome.result.eta < outcome.initial.eta);
    }

    #[test]
    fn test_never_regresses() {
        let boat = boat_at(Coordinate::new(0.0, 0.0));
        let polar = constant_polar(6.0);
        let weather = steady_wind(10.0, 0.0, 48);
        let mut integrator = RouteIntegrator::new(environment(&weather, &polar, &boat));
        let middle = Coordinate::new(0.0, 0.5);
        let mut route = dogleg_route(middle);

        let outcome = WaypointOptimizer::default()
            .optimize(&mut integrator, &mut route, 0, None)
            .unwrap();

        assert_ne!(compare_candidates(&outcome.result, &outcome.initial), Ordering::Greater);
        if !outcome.improved {
            assert_eq!(route.waypoints[0].position, middle);
            assert_eq!(outcome.result, outcome.initial);
        }
    }

    #[test]
    fn test_abort_with_revert_restores_position() {
        let boat = boat_at(Coordinate::new(0.0, 0.0));
        let polar = constant_polar(6.0);
        let weather = steady_wind(10.0, 0.0, 48);
        let mut integrator = RouteIntegrator::new(environment(&weather, &polar, &boat));
        let middle = Coordinate::new(0.5, 0.5);
        let mut route = dogleg_route(middle);

        let abort = AtomicBool::new(true);
        let optimizer = WaypointOptimizer::new(OptimizerSettings {
            on_abort: AbortPolicy::Revert,
            ..Default::default()
        });
        let outcome = optimizer.optimize(&mut integrator, &mut route, 0, Some(&abort)).unwrap();

        assert!(outcome.aborted);
        assert!(!outcome.improved);
        assert_eq!(outcome.iterations, 0);
        assert_eq!(route.waypoints[0].position, middle);
    }

    #[test]
    fn test_abort_keeping_best_seed() {
        let boat = boat_at(Coordinate::new(0.0, 0.0));
        let polar = constant_polar(6.0);
        let weather = steady_wind(10.0, 0.0, 48);
        let mut integrator = RouteIntegrator::new(environment(&weather, &polar, &boat));
        let mut route = dogleg_route(Coordinate::new(0.5, 0.5));

        let abort = AtomicBool::new(true);
        let outcome = WaypointOptimizer::default()
            .optimize(&mut integrator, &mut route, 0, Some(&abort))
            .unwrap();
        assert!(outcome.aborted);
        assert_ne!(compare_candidates(&outcome.result, &outcome.initial), Ordering::Greater);
    }

    #[test]
    fn test_invalid_indices() {
        let boat = boat_at(Coordinate::new(0.0, 0.0));
        let polar = constant_polar(6.0);
        let weather = steady_wind(10.0, 0.0, 48);
        let mut integrator = RouteIntegrator::new(environment(&weather, &polar, &boat));
        let mut route = dogleg_route(Coordinate::new(0.5, 0.5));
        let optimizer = WaypointOptimizer::default();

        let err = optimizer.optimize(&mut integrator, &mut route, 1, None).unwrap_err();
        assert!(matches!(err, RoutingError::NotOptimizable { index: 1, .. }));

        let err = optimizer.optimize(&mut integrator, &mut route, 5, None).unwrap_err();
        assert!(matches!(err, RoutingError::WaypointOutOfRange { index: 5, count: 2 }));
    }

    #[test]
    fn test_uncalculable_route_is_an_error() {
        let weather = steady_wind(10.0, 0.0, 48);
        let env = RoutingEnvironment::new(&weather, &GreatCircle, t0());
        let mut integrator = RouteIntegrator::new(env);
        let mut route = dogleg_route(Coordinate::new(0.5, 0.5));

        let err = WaypointOptimizer::default()
            .optimize(&mut integrator, &mut route, 0, None)
            .unwrap_err();
        assert!(matches!(err, RoutingError::NotCalculated(_)));
    }

    #[test]
    fn test_probes_clamp_latitude() {
        let boat = boat_at(Coordinate::new(80.0, 0.0));
        let polar = constant_polar(6.0);
        let weather = steady_wind(10.0, 0.0, 48);
        let mut integrator = RouteIntegrator::new(environment(&weather, &polar, &boat));
        let mut route = dogleg_route(Coordinate::new(84.0, 0.0));

        let probe = WaypointOptimizer::default()
            .evaluate(&mut integrator, &mut route, 0, Coordinate::new(89.0, 0.0))
            .unwrap();
        assert_eq!(probe.position.lat, 85.0);
        assert_eq!(route.waypoints[0].position, Coordinate::new(84.0, 0.0));
    }
}
