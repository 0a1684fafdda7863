//! Fixtures shared by the engine tests

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::engine::models::{Boat, Coordinate, WindData};
use crate::engine::polar::{scan_best_vmg_angle, PolarModel};
use crate::engine::weather::UniformWeather;

/// Polar defined by a speed-per-|TWA| function, optionally with fixed best VMG angles
pub struct ScriptedPolar {
    speed_at: Box<dyn Fn(f64) -> f64>,
    upwind: Option<f64>,
    downwind: Option<f64>,
    engine_below: Option<f64>,
}

impl ScriptedPolar {
    pub fn new(speed_at: impl Fn(f64) -> f64 + 'static) -> Self {
        Self {
            speed_at: Box::new(speed_at),
            upwind: None,
            downwind: None,
            engine_below: None,
        }
    }

    pub fn with_vmg_angles(mut self, upwind: f64, downwind: f64) -> Self {
        self.upwind = Some(upwind);
        self.downwind = Some(downwind);
        self
    }

    pub fn with_engine(mut self, min_speed: f64) -> Self {
        self.engine_below = Some(min_speed);
        self
    }
}

impl PolarModel for ScriptedPolar {
    fn speed(&self, _wind_speed: f64, twa: f64) -> (f64, bool) {
        let speed = (self.speed_at)(twa.abs());
        match self.engine_below {
            Some(min) if speed < min => (min, true),
            _ => (speed, false),
        }
    }

    fn best_vmg_angle(&self, _wind_speed: f64, upwind: bool) -> f64 {
        let fixed = if upwind { self.upwind } else { self.downwind };
        fixed.unwrap_or_else(|| scan_best_vmg_angle(|twa| (self.speed_at)(twa), upwind))
    }
}

/// Same speed at every angle
pub fn constant_polar(speed: f64) -> ScriptedPolar {
    ScriptedPolar::new(move |_| speed)
}

/// No-go zone below 40 degrees, 6 kt close-hauled, 8 kt on a beam reach, 6 kt dead downwind
pub fn sailing_polar() -> ScriptedPolar {
    ScriptedPolar::new(|twa| {
        if twa < 40.0 {
            0.0
        } else if twa <= 100.0 {
            6.0 + 2.0 * (twa - 40.0) / 60.0
        } else {
            8.0 - 2.0 * (twa - 100.0) / 80.0
        }
    })
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

pub fn steady_wind(speed: f64, direction: f64, hours: i64) -> UniformWeather {
    UniformWeather::new(WindData::new(speed, direction), t0(), t0() + Duration::hours(hours))
}

pub fn boat_at(position: Coordinate) -> Boat {
    Boat {
        name: "test".to_string(),
        position,
        last_update: t0(),
        loch: 120.0,
    }
}
