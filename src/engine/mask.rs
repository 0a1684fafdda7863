use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::info;
use roaring::RoaringTreemap;

use crate::engine::angles::a180;
use crate::engine::models::Coordinate;
use crate::error::{RoutingError, RoutingResult};

pub const NX: u64 = 86400;
pub const NY: u64 = 43200;

/// Cells per degree of the mask grid
const CELLS_PER_DEGREE: f64 = 240.0;

/// Tells whether a straight track segment runs over land
pub trait CoastDetector {
    fn crosses_land(&self, from: &Coordinate, to: &Coordinate) -> bool;
}

/// Land/sea bitmap at 1/240 degree resolution
#[derive(Debug, Clone, Default)]
pub struct LandMask {
    pub mask: RoaringTreemap,
}

impl LandMask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a GSHHG mask serialized as an xz-compressed roaring treemap
    pub fn load<P: AsRef<Path>>(path: P) -> RoutingResult<Self> {
        let path = path.as_ref();
        info!("Loading land mask from {}", path.display());

        let file = File::open(path).map_err(|source| RoutingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mask = Self::from_reader(xz2::read::XzDecoder::new(BufReader::new(file)))?;

        info!("Land mask loaded: {} land cells", mask.mask.len());
        Ok(mask)
    }

    /// Decodes an uncompressed serialized treemap
    pub fn from_reader<R: Read>(reader: R) -> RoutingResult<Self> {
        let mask = RoaringTreemap::deserialize_from(reader).map_err(|e| RoutingError::InvalidMask(e.to_string()))?;
        Ok(Self { mask })
    }

    fn coords_to_indices(&self, lon: f64, lat: f64) -> (u64, u64) {
        // Affine transform: sa = 240, sc = 43200, se = 240, sf = 21600
        let x = (lon * CELLS_PER_DEGREE + 43200.0).max(0.0) as u64;
        let y = (lat * CELLS_PER_DEGREE + 21600.0).max(0.0) as u64;
        (x.clamp(0, NX - 1), y.clamp(0, NY - 1))
    }

    /// Adds a rectangular bounding box of coordinates to the bitmap as land
    pub fn add_land_box(&mut self, min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) {
        let (min_x, min_y) = self.coords_to_indices(min_lon, min_lat);
        let (max_x, max_y) = self.coords_to_indices(max_lon, max_lat);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                self.mask.insert(y * NX + x);
            }
        }
    }

    /// Checks if a coordinate is over land
    pub fn is_land(&self, coord: &Coordinate) -> bool {
        let (x, y) = self.coords_to_indices(coord.lon, coord.lat);
        self.mask.contains(y * NX + x)
    }
}

impl CoastDetector for LandMask {
    /// Samples the segment once per grid cell, interpolating linearly in
    /// latitude and longitude (shortest way round the antimeridian)
    fn crosses_land(&self, from: &Coordinate, to: &Coordinate) -> bool {
        if self.mask.is_empty() {
            return false;
        }

        let d_lat = to.lat - from.lat;
        let d_lon = a180(to.lon - from.lon);
        let samples = (d_lat.abs().max(d_lon.abs()) * CELLS_PER_DEGREE).ceil().max(1.0) as usize;

        (0..=samples).any(|k| {
            let f = k as f64 / samples as f64;
            let point = Coordinate::new(from.lat + d_lat * f, from.lon + d_lon * f).normalized();
            self.is_land(&point)
        })
    }
}
