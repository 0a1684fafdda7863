use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::engine::polar::{scan_best_vmg_angle, PolarModel};
use crate::error::{RoutingError, RoutingResult};

/// Motor sailing: below `min_speed` knots the engine pushes the boat at that speed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub min_speed: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolarData {
    /// True Wind Speeds (knots)
    pub tws: Vec<f64>,
    /// True Wind Angles (degrees)
    pub twa: Vec<f64>,
    /// Boat speeds in knots: speeds[twa_idx][tws_idx]
    pub speeds: Vec<Vec<f64>>,
    #[serde(default)]
    pub engine: Option<EngineSettings>,
}

impl PolarData {
    pub fn load_from_csv<P: AsRef<Path>>(path: P) -> RoutingResult<Self> {
        let path = path.as_ref();
        info!("Loading polar data from CSV: {:?}", path);

        let file = File::open(path).map_err(|source| RoutingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }

    /// Parses a polar table.
    ///
    /// First line is the header: `twa/tws,5,10,...`; every following line is a
    /// TWA followed by one boat speed per TWS. Fields may be separated by
    /// commas, semicolons or tabs.
    pub fn from_reader<R: Read>(reader: R) -> RoutingResult<Self> {
        let reader = BufReader::new(reader);
        let mut lines = reader.lines().enumerate();

        let io_error = |line: usize, e: std::io::Error| RoutingError::InvalidPolar {
            line,
            reason: e.to_string(),
        };

        let (_, header) = lines.next().ok_or(RoutingError::InvalidPolar {
            line: 1,
            reason: "empty polar file".to_string(),
        })?;
        let header = header.map_err(|e| io_error(1, e))?;

        let tws = split_fields(&header)
            .skip(1)
            .map(|field| parse_field(field, 1))
            .collect::<RoutingResult<Vec<f64>>>()?;
        if tws.is_empty() {
            return Err(RoutingError::InvalidPolar {
                line: 1,
                reason: "no wind speed columns".to_string(),
            });
        }

        let mut twa_list = Vec::new();
        let mut speeds = Vec::new();

        for (idx, line_result) in lines {
            let line_no = idx + 1;
            let line = line_result.map_err(|e| io_error(line_no, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = split_fields(&line);
            let twa_val = match fields.next() {
                Some(field) => parse_field(field, line_no)?,
                None => continue,
            };
            let row_speeds = fields
                .map(|field| parse_field(field, line_no))
                .collect::<RoutingResult<Vec<f64>>>()?;
            if row_speeds.len() != tws.len() {
                return Err(RoutingError::InvalidPolar {
                    line: line_no,
                    reason: format!("expected {} speeds, got {}", tws.len(), row_speeds.len()),
                });
            }
            twa_list.push(twa_val);
            speeds.push(row_speeds);
        }

        info!("Polar loaded: {} TWA x {} TWS", twa_list.len(), tws.len());

        Ok(Self {
            tws,
            twa: twa_list,
            speeds,
            engine: None,
        })
    }

    pub fn with_engine(mut self, min_speed: f64) -> Self {
        self.engine = Some(EngineSettings { min_speed });
        self
    }

    /// Bilinear interpolation to find the boat speed (in knots) for a given TWS and TWA.
    pub fn get_speed(&self, target_tws: f64, target_twa: f64) -> f64 {
        let (Some(&tws_last), Some(&twa_last)) = (self.tws.last(), self.twa.last()) else {
            return 0.0;
        };

        // 1. Clamp bounds (polars are symmetric)
        let tws_clamped = target_tws.clamp(self.tws[0], tws_last);
        let twa_clamped = target_twa.abs().clamp(self.twa[0], twa_last);

        // 2. Bounding indices
        let (tws_idx0, tws_idx1) = bracket(&self.tws, tws_clamped);
        let (twa_idx0, twa_idx1) = bracket(&self.twa, twa_clamped);

        let tws0 = self.tws[tws_idx0];
        let tws1 = self.tws[tws_idx1];
        let twa0 = self.twa[twa_idx0];
        let twa1 = self.twa[twa_idx1];

        let val00 = self.speeds[twa_idx0][tws_idx0];
        let val01 = self.speeds[twa_idx0][tws_idx1];
        let val10 = self.speeds[twa_idx1][tws_idx0];
        let val11 = self.speeds[twa_idx1][tws_idx1];

        let tws_frac = if tws0 == tws1 { 0.0 } else { (tws_clamped - tws0) / (tws1 - tws0) };
        let twa_frac = if twa0 == twa1 { 0.0 } else { (twa_clamped - twa0) / (twa1 - twa0) };

        let val0 = val00 * (1.0 - tws_frac) + val01 * tws_frac;
        let val1 = val10 * (1.0 - tws_frac) + val11 * tws_frac;

        val0 * (1.0 - twa_frac) + val1 * twa_frac
    }
}

impl PolarModel for PolarData {
    fn speed(&self, wind_speed: f64, twa: f64) -> (f64, bool) {
        let speed = self.get_speed(wind_speed, twa);
        match self.engine {
            Some(engine) if speed < engine.min_speed => (engine.min_speed, true),
            _ => (speed, false),
        }
    }

    fn best_vmg_angle(&self, wind_speed: f64, upwind: bool) -> f64 {
        scan_best_vmg_angle(|twa| self.get_speed(wind_speed, twa), upwind)
    }
}

fn split_fields(line: &str) -> impl Iterator<Item = &str> {
    line.split([',', ';', '\t'])
        .map(str::trim)
        .filter(|field| !field.is_empty())
}

fn parse_field(field: &str, line: usize) -> RoutingResult<f64> {
    field.parse().map_err(|_| RoutingError::InvalidPolar {
        line,
        reason: format!("'{}' is not a number", field),
    })
}

/// Indices of the two axis values surrounding `value` (axis sorted ascending)
fn bracket(axis: &[f64], value: f64) -> (usize, usize) {
    if axis.len() == 1 {
        return (0, 0);
    }
    for i in 0..axis.len() - 1 {
        if value >= axis[i] && value <= axis[i + 1] {
            return (i, i + 1);
        }
    }
    (axis.len() - 1, axis.len() - 1)
}
