//! Error types for the routing engine

use std::path::PathBuf;
use thiserror::Error;

/// Result type for fallible routing operations
pub type RoutingResult<T> = Result<T, RoutingError>;

/// Errors surfaced to callers of the routing engine.
///
/// Weather coverage gaps and unsailable angles are not errors: they end up
/// in the route's arrival state instead.
#[derive(Error, Debug)]
pub enum RoutingError {
    /// A data file could not be opened or read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Polar table is malformed
    #[error("Invalid polar data at line {line}: {reason}")]
    InvalidPolar { line: usize, reason: String },

    /// Land mask bitmap could not be decoded
    #[error("Invalid land mask: {0}")]
    InvalidMask(String),

    /// Waypoint index does not exist in the route
    #[error("Waypoint index {index} out of range (route has {count} waypoints)")]
    WaypointOutOfRange { index: usize, count: usize },

    /// Waypoint exists but cannot be moved by the optimizer
    #[error("Waypoint {index} cannot be optimized: {reason}")]
    NotOptimizable { index: usize, reason: &'static str },

    /// Route could not be calculated (no boat, no polar or no waypoints)
    #[error("Route '{0}' has no calculated result")]
    NotCalculated(String),
}
