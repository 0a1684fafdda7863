pub mod engine;
pub mod error;
pub mod parsers;

pub use error::{RoutingError, RoutingResult};
