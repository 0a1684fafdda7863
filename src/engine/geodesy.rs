use crate::engine::angles::a360;
use crate::engine::models::Coordinate;

/// Mean Earth radius in nautical miles (6 371 km / 1.852)
pub const EARTH_RADIUS_NM: f64 = 6_371.0 / 1.852;

/// Great-circle navigation primitives used by the integrator and optimizer
pub trait Geodesy {
    /// Initial bearing in degrees [0, 360) and distance in nautical miles
    fn bearing_and_distance(&self, from: &Coordinate, to: &Coordinate) -> (f64, f64);

    /// Point reached after sailing `distance_nm` along `bearing_deg`
    fn destination(&self, from: &Coordinate, distance_nm: f64, bearing_deg: f64) -> Coordinate;

    fn distance(&self, from: &Coordinate, to: &Coordinate) -> f64 {
        self.bearing_and_distance(from, to).1
    }
}

/// Spherical earth model (haversine distance, forward azimuth)
#[derive(Debug, Clone, Copy, Default)]
pub struct GreatCircle;

impl GreatCircle {
    pub fn calculate_bearing(start: &Coordinate, end: &Coordinate) -> f64 {
        let start_lat = start.lat.to_radians();
        let end_lat = end.lat.to_radians();
        let d_lon = (end.lon - start.lon).to_radians();

        let y = d_lon.sin() * end_lat.cos();
        let x = start_lat.cos() * end_lat.sin() - start_lat.sin() * end_lat.cos() * d_lon.cos();
        a360(y.atan2(x).to_degrees())
    }

    pub fn calculate_distance(start: &Coordinate, end: &Coordinate) -> f64 {
        let start_lat = start.lat.to_radians();
        let end_lat = end.lat.to_radians();
        let d_lat = (end.lat - start.lat).to_radians();
        let d_lon = (end.lon - start.lon).to_radians();

        let a = (d_lat / 2.0).sin().powi(2)
            + start_lat.cos() * end_lat.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_NM * c
    }

    pub fn calculate_destination(start: &Coordinate, distance_nm: f64, bearing_deg: f64) -> Coordinate {
        let angular_dist = distance_nm / EARTH_RADIUS_NM;
        let bearing_rad = bearing_deg.to_radians();

        let start_lat = start.lat.to_radians();
        let start_lon = start.lon.to_radians();

        let end_lat = (start_lat.sin() * angular_dist.cos()
            + start_lat.cos() * angular_dist.sin() * bearing_rad.cos())
        .asin();

        let end_lon = start_lon
            + (bearing_rad.sin() * angular_dist.sin() * start_lat.cos())
                .atan2(angular_dist.cos() - start_lat.sin() * end_lat.sin());

        Coordinate::new(end_lat.to_degrees(), end_lon.to_degrees()).normalized()
    }
}

impl Geodesy for GreatCircle {
    fn bearing_and_distance(&self, from: &Coordinate, to: &Coordinate) -> (f64, f64) {
        (Self::calculate_bearing(from, to), Self::calculate_distance(from, to))
    }

    fn destination(&self, from: &Coordinate, distance_nm: f64, bearing_deg: f64) -> Coordinate {
        Self::calculate_destination(from, distance_nm, bearing_deg)
    }
}
