use crate::engine::angles::{a180, a360, angle_diff};
use crate::engine::models::{NavMode, WindData};
use crate::engine::physics::PhysicsModel;
use crate::engine::polar::PolarModel;
use crate::engine::vbvmg::{TwoLegSearch, TwoLegVmgSolver};

/// Heading to steer for one step and the resulting signed true wind angle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingDecision {
    pub heading: f64,
    pub twa: f64,
}

/// Great-circle bearing, whatever the wind
pub fn direct_heading(bearing: f64, wind: &WindData) -> HeadingDecision {
    HeadingDecision {
        heading: a360(bearing),
        twa: PhysicsModel::calculate_twa(wind.direction, bearing),
    }
}

/// Direct bearing unless it is closer to the wind than the best upwind VMG
/// angle (or further than the best downwind one), in which case the heading
/// is clamped to that angle on the side nearest to the bearing.
pub fn best_vmg_heading(polar: &dyn PolarModel, bearing: f64, wind: &WindData) -> HeadingDecision {
    let angle = a180(bearing - wind.direction);
    let upwind = polar.best_vmg_angle(wind.speed, true);
    let downwind = polar.best_vmg_angle(wind.speed, false);

    let clamp = if angle.abs() < upwind {
        upwind
    } else if angle.abs() > downwind {
        downwind
    } else {
        return direct_heading(bearing, wind);
    };

    let cap1 = a360(wind.direction + clamp);
    let cap2 = a360(wind.direction - clamp);
    let heading = if angle_diff(bearing, cap1) < angle_diff(bearing, cap2) { cap1 } else { cap2 };

    HeadingDecision {
        heading,
        twa: PhysicsModel::calculate_twa(wind.direction, heading),
    }
}

/// Resolves the heading of each step according to the leg's navigation mode
#[derive(Debug, Clone)]
pub struct HeadingPolicy {
    solver: TwoLegVmgSolver,
}

impl HeadingPolicy {
    pub fn new(search: TwoLegSearch) -> Self {
        Self { solver: TwoLegVmgSolver::new(search) }
    }

    pub fn solver_mut(&mut self) -> &mut TwoLegVmgSolver {
        &mut self.solver
    }

    /// `bearing` and `remaining_distance` describe the leg from the current
    /// position to its target. The two-leg mode re-solves the whole remaining
    /// leg and steers the first tack.
    pub fn next_heading(
        &mut self,
        polar: &dyn PolarModel,
        mode: NavMode,
        bearing: f64,
        remaining_distance: f64,
        wind: &WindData,
    ) -> HeadingDecision {
        match mode {
            NavMode::Direct => direct_heading(bearing, wind),
            NavMode::BestVmg => best_vmg_heading(polar, bearing, wind),
            NavMode::TwoLegVmg => {
                let solution = self.solver.solve(polar, remaining_distance, bearing, wind.speed, wind.direction);
                HeadingDecision {
                    heading: solution.heading1,
                    twa: solution.twa1,
                }
            }
        }
    }
}
