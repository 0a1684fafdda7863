use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::engine::angles::a360;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Longitude wrapped to [-180, 180], latitude clamped to [-90, 90]
    pub fn normalized(&self) -> Self {
        let mut lon = self.lon % 360.0;
        if lon > 180.0 {
            lon -= 360.0;
        } else if lon < -180.0 {
            lon += 360.0;
        }
        Self {
            lat: self.lat.clamp(-90.0, 90.0),
            lon,
        }
    }
}

/// Deserializes a coordinate and wraps it into the normalized ranges
fn normalized_coordinate<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Coordinate, D::Error> {
    Coordinate::deserialize(deserializer).map(|c| c.normalized())
}

/// True wind at a point: speed in knots, direction the wind blows FROM in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindData {
    pub speed: f64,
    pub direction: f64,
}

impl WindData {
    pub fn new(speed: f64, direction: f64) -> Self {
        Self { speed, direction: a360(direction) }
    }

    /// Builds a wind from its U (eastward) and V (northward) components in knots
    pub fn from_components(u: f64, v: f64) -> Self {
        let angle = v.atan2(u).to_degrees();
        Self {
            speed: u.hypot(v),
            direction: a360(270.0 - angle),
        }
    }

    /// U (eastward) and V (northward) components of the air movement
    pub fn components(&self) -> (f64, f64) {
        let toward = (self.direction + 180.0).to_radians();
        (self.speed * toward.sin(), self.speed * toward.cos())
    }
}

/// Surface current: speed in knots, direction the water flows TOWARD in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrentData {
    pub speed: f64,
    pub direction: f64,
}

impl CurrentData {
    pub fn new(speed: f64, direction: f64) -> Self {
        Self { speed, direction: a360(direction) }
    }

    pub fn components(&self) -> (f64, f64) {
        let toward = self.direction.to_radians();
        (self.speed * toward.sin(), self.speed * toward.cos())
    }
}

/// How the boat sails the leg leading to a waypoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NavMode {
    /// Two-leg VMG decomposition, re-optimized every step
    #[default]
    TwoLegVmg,
    /// Direct bearing, clamped to the best VMG angles
    BestVmg,
    /// Great-circle bearing, whatever the wind
    Direct,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub name: String,
    #[serde(deserialize_with = "normalized_coordinate")]
    pub position: Coordinate,
    #[serde(default)]
    pub nav_mode: NavMode,
    /// Imposed arrival time: the leg is not sailed, the boat is put on the
    /// waypoint at this time
    #[serde(default)]
    pub fixed_arrival: Option<DateTime<Utc>>,
    /// Computed arrival time, `None` when unreachable within the weather horizon
    #[serde(skip)]
    pub arrival: Option<DateTime<Utc>>,
    /// Last heading sailed towards this waypoint, when auto heading is enabled
    #[serde(skip)]
    pub approach_heading: Option<f64>,
}

impl Waypoint {
    pub fn new(name: impl Into<String>, position: Coordinate, nav_mode: NavMode) -> Self {
        Self {
            name: name.into(),
            position: position.normalized(),
            nav_mode,
            fixed_arrival: None,
            arrival: None,
            approach_heading: None,
        }
    }

    pub fn with_fixed_arrival(mut self, time: DateTime<Utc>) -> Self {
        self.fixed_arrival = Some(time);
        self
    }
}

/// The boat the route is computed for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Boat {
    pub name: String,
    #[serde(deserialize_with = "normalized_coordinate")]
    pub position: Coordinate,
    /// Time of the last position report
    pub last_update: DateTime<Utc>,
    /// Distance logged since the race start, in nautical miles
    #[serde(default)]
    pub loch: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackPointKind {
    /// Route departure
    Start,
    /// Position at the end of one integration step
    Step,
    /// Marker recorded when the next step would overshoot the leg target
    LegEnd,
}

/// One timestamped point of a computed track with the telemetry of the step
/// that led to it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub kind: TrackPointKind,
    pub position: Coordinate,
    pub time: DateTime<Utc>,
    /// Index of the waypoint this leg sails to
    pub waypoint: Option<usize>,
    pub wind: WindData,
    pub heading: f64,
    /// Speed through water, knots
    pub boat_speed: f64,
    /// Course over ground
    pub course: f64,
    /// Speed over ground, knots
    pub sog: f64,
    pub twa: f64,
    /// Distance sailed during the step, nautical miles
    pub distance: f64,
    /// Distance left to the leg target, nautical miles
    pub distance_remaining: f64,
    pub engine_used: bool,
}

impl TrackPoint {
    /// A point without step telemetry
    pub fn marker(
        kind: TrackPointKind,
        position: Coordinate,
        time: DateTime<Utc>,
        waypoint: Option<usize>,
        distance_remaining: f64,
    ) -> Self {
        Self {
            kind,
            position,
            time,
            waypoint,
            wind: WindData { speed: 0.0, direction: 0.0 },
            heading: 0.0,
            boat_speed: 0.0,
            course: 0.0,
            sog: 0.0,
            twa: 0.0,
            distance: 0.0,
            distance_remaining,
            engine_used: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wind_direction_conventions() {
        // Navigational: direction is where the wind comes FROM, 0=North, 90=East
        // u > 0 is Eastward air movement, v > 0 is Northward.

        // From North: air moves south
        let north_wind = WindData::from_components(0.0, -5.0);
        assert!((north_wind.direction - 0.0).abs() < 1e-9);
        assert!((north_wind.speed - 5.0).abs() < 1e-9);

        let east_wind = WindData::from_components(-5.0, 0.0);
        assert!((east_wind.direction - 90.0).abs() < 1e-9);

        let south_wind = WindData::from_components(0.0, 5.0);
        assert!((south_wind.direction - 180.0).abs() < 1e-9);

        let west_wind = WindData::from_components(5.0, 0.0);
        assert!((west_wind.direction - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_wind_components_round_trip_direction() {
        let wind = WindData::new(12.0, 45.0);
        let (u, v) = wind.components();
        // From north-east: air moves south-west
        assert!(u < 0.0 && v < 0.0);
        let back = WindData::from_components(u, v);
        assert!((back.direction - 45.0).abs() < 1e-9);
        assert!((back.speed - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_current_components_point_toward() {
        let current = CurrentData::new(2.0, 90.0);
        let (u, v) = current.components();
        assert!((u - 2.0).abs() < 1e-9);
        assert!(v.abs() < 1e-9);
    }

    #[test]
    fn test_coordinate_normalization() {
        let c = Coordinate::new(95.0, 190.0).normalized();
        assert_eq!(c.lat, 90.0);
        assert!((c.lon + 170.0).abs() < 1e-9);

        let c = Coordinate::new(-10.0, -200.0).normalized();
        assert!((c.lon - 160.0).abs() < 1e-9);
    }

    #[test]
    fn test_deserialized_positions_are_normalized() {
        let waypoint: Waypoint =
            serde_json::from_str(r#"{"name": "Dateline", "position": {"lat": 10.0, "lon": 190.0}}"#).unwrap();
        assert!((waypoint.position.lon + 170.0).abs() < 1e-9);
        assert_eq!(waypoint.position.lat, 10.0);
        assert_eq!(waypoint.fixed_arrival, None);

        let boat: Boat = serde_json::from_str(
            r#"{"name": "Boat", "position": {"lat": -91.0, "lon": -370.0}, "last_update": "2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(boat.position.lat, -90.0);
        assert!((boat.position.lon + 10.0).abs() < 1e-9);
    }
}
