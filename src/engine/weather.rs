use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::models::{Coordinate, CurrentData, WindData};

/// Time-varying wind and current lookups, backed by already-loaded data
pub trait WeatherField {
    /// Wind at a position and time, `None` outside the covered area or period
    fn interpolated_wind(&self, position: &Coordinate, time: DateTime<Utc>) -> Option<WindData>;

    /// Surface current at a position and time, `None` when no current data is loaded
    fn interpolated_current(&self, _position: &Coordinate, _time: DateTime<Utc>) -> Option<CurrentData> {
        None
    }

    /// Last covered instant, `None` when nothing is loaded
    fn max_date(&self) -> Option<DateTime<Utc>>;

    /// Instant the user is currently looking at
    fn current_date(&self) -> Option<DateTime<Utc>>;
}

/// Same wind (and optional current) everywhere between two instants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniformWeather {
    pub wind: WindData,
    #[serde(default)]
    pub current: Option<CurrentData>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl UniformWeather {
    pub fn new(wind: WindData, valid_from: DateTime<Utc>, valid_until: DateTime<Utc>) -> Self {
        Self { wind, current: None, valid_from, valid_until }
    }

    pub fn with_current(mut self, current: CurrentData) -> Self {
        self.current = Some(current);
        self
    }

    fn covers(&self, time: DateTime<Utc>) -> bool {
        time >= self.valid_from && time <= self.valid_until
    }
}

impl WeatherField for UniformWeather {
    fn interpolated_wind(&self, _position: &Coordinate, time: DateTime<Utc>) -> Option<WindData> {
        self.covers(time).then_some(self.wind)
    }

    fn interpolated_current(&self, _position: &Coordinate, time: DateTime<Utc>) -> Option<CurrentData> {
        self.current.filter(|_| self.covers(time))
    }

    fn max_date(&self) -> Option<DateTime<Utc>> {
        Some(self.valid_until)
    }

    fn current_date(&self) -> Option<DateTime<Utc>> {
        Some(self.valid_from)
    }
}

/// Wind observations for one forecast time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindFrame {
    /// 1x1 degree spatial chunks storing data points.
    /// Key: (lon.floor(), lat.floor())
    pub chunks: HashMap<(i32, i32), Vec<(Coordinate, WindData)>>,
}

impl WindFrame {
    pub fn insert_point(&mut self, coord: Coordinate, wind: WindData) {
        let chunk_x = coord.lon.floor() as i32;
        let chunk_y = coord.lat.floor() as i32;
        self.chunks.entry((chunk_x, chunk_y)).or_default().push((coord, wind));
    }

    /// Finds the nearest wind data point in the chunk holding the coordinate
    pub fn get_wind_at(&self, coord: &Coordinate) -> Option<WindData> {
        let chunk_x = coord.lon.floor() as i32;
        let chunk_y = coord.lat.floor() as i32;

        let chunk = self.chunks.get(&(chunk_x, chunk_y))?;
        let mut best_dist = f64::MAX;
        let mut best_wind = None;

        for (p_coord, wind) in chunk {
            let d_lat = p_coord.lat - coord.lat;
            let d_lon = p_coord.lon - coord.lon;
            let dist_sq = d_lat * d_lat + d_lon * d_lon;

            if dist_sq < best_dist {
                best_dist = dist_sq;
                best_wind = Some(*wind);
            }
        }
        best_wind
    }
}

/// Gridded wind forecast: frames sorted by time, nearest neighbour in space,
/// linear (vector) interpolation in time
#[derive(Debug, Clone, Default)]
pub struct WindField {
    frames: Vec<(DateTime<Utc>, WindFrame)>,
    current_date: Option<DateTime<Utc>>,
}

impl WindField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_frame(&mut self, time: DateTime<Utc>, frame: WindFrame) {
        let idx = self.frames.partition_point(|(t, _)| *t < time);
        if self.frames.get(idx).is_some_and(|(t, _)| *t == time) {
            self.frames[idx].1 = frame;
        } else {
            self.frames.insert(idx, (time, frame));
        }
    }

    pub fn set_current_date(&mut self, time: DateTime<Utc>) {
        self.current_date = Some(time);
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn get_bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut points = self
            .frames
            .iter()
            .flat_map(|(_, frame)| frame.chunks.values().flatten())
            .peekable();
        points.peek()?;

        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lon = f64::MAX;
        let mut max_lon = f64::MIN;
        for (coord, _) in points {
            min_lat = min_lat.min(coord.lat);
            max_lat = max_lat.max(coord.lat);
            min_lon = min_lon.min(coord.lon);
            max_lon = max_lon.max(coord.lon);
        }
        Some((min_lat, max_lat, min_lon, max_lon))
    }
}

impl WeatherField for WindField {
    fn interpolated_wind(&self, position: &Coordinate, time: DateTime<Utc>) -> Option<WindData> {
        let idx = self.frames.partition_point(|(t, _)| *t < time);
        let (t1, after) = self.frames.get(idx)?;
        if *t1 == time || idx == 0 {
            return (*t1 == time).then(|| after.get_wind_at(position)).flatten();
        }

        let (t0, before) = &self.frames[idx - 1];
        let w0 = before.get_wind_at(position)?;
        let w1 = after.get_wind_at(position)?;

        let span = (*t1 - *t0).num_seconds() as f64;
        let frac = (time - *t0).num_seconds() as f64 / span;
        let (u0, v0) = w0.components();
        let (u1, v1) = w1.components();
        Some(WindData::from_components(
            u0 + (u1 - u0) * frac,
            v0 + (v1 - v0) * frac,
        ))
    }

    fn max_date(&self) -> Option<DateTime<Utc>> {
        self.frames.last().map(|(t, _)| *t)
    }

    fn current_date(&self) -> Option<DateTime<Utc>> {
        self.current_date.or_else(|| self.frames.first().map(|(t, _)| *t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn frame(wind: WindData) -> WindFrame {
        let mut frame = WindFrame::default();
        frame.insert_point(Coordinate::new(45.25, -3.25), wind);
        frame.insert_point(Coordinate::new(45.75, -3.75), WindData::new(30.0, 270.0));
        frame
    }

    #[test]
    fn test_uniform_weather_window() {
        let weather = UniformWeather::new(WindData::new(10.0, 0.0), t0(), t0() + Duration::hours(12));
        let p = Coordinate::new(0.0, 0.0);
        assert!(weather.interpolated_wind(&p, t0() + Duration::hours(6)).is_some());
        assert!(weather.interpolated_wind(&p, t0() + Duration::hours(13)).is_none());
        assert!(weather.interpolated_current(&p, t0()).is_none());
        assert_eq!(weather.max_date(), Some(t0() + Duration::hours(12)));
    }

    #[test]
    fn test_nearest_neighbour_in_chunk() {
        let f = frame(WindData::new(10.0, 0.0));
        let wind = f.get_wind_at(&Coordinate::new(45.3, -3.3)).unwrap();
        assert_eq!(wind.speed, 10.0);
        let wind = f.get_wind_at(&Coordinate::new(45.7, -3.7)).unwrap();
        assert_eq!(wind.speed, 30.0);
        // Different chunk, no data
        assert!(f.get_wind_at(&Coordinate::new(40.0, -3.3)).is_none());
    }

    #[test]
    fn test_time_interpolation_between_frames() {
        let mut field = WindField::new();
        field.insert_frame(t0() + Duration::hours(6), frame(WindData::new(20.0, 0.0)));
        field.insert_frame(t0(), frame(WindData::new(10.0, 0.0)));
        assert_eq!(field.frame_count(), 2);

        let p = Coordinate::new(45.3, -3.3);
        let mid = field.interpolated_wind(&p, t0() + Duration::hours(3)).unwrap();
        assert!((mid.speed - 15.0).abs() < 1e-9);
        assert!(mid.direction.abs() < 1e-9 || (mid.direction - 360.0).abs() < 1e-9);

        let exact = field.interpolated_wind(&p, t0()).unwrap();
        assert_eq!(exact.speed, 10.0);

        // Outside the forecast period
        assert!(field.interpolated_wind(&p, t0() - Duration::hours(1)).is_none());
        assert!(field.interpolated_wind(&p, t0() + Duration::hours(7)).is_none());
        assert_eq!(field.max_date(), Some(t0() + Duration::hours(6)));
        assert_eq!(field.current_date(), Some(t0()));
    }

    #[test]
    fn test_bounds() {
        let mut field = WindField::new();
        assert!(field.get_bounds().is_none());
        field.insert_frame(t0(), frame(WindData::new(10.0, 0.0)));
        assert_eq!(field.get_bounds(), Some((45.25, 45.75, -3.75, -3.25)));
    }
}
