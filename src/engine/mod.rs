pub mod angles;
pub mod geodesy;
pub mod heading;
pub mod mask;
pub mod models;
pub mod optimizer;
pub mod physics;
pub mod polar;
pub mod router;
pub mod stats;
pub mod vbvmg;
pub mod weather;

#[cfg(test)]
pub(crate) mod testing;
