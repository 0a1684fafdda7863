/// Boat performance model consumed by the heading policies and the integrator
pub trait PolarModel {
    /// Boat speed in knots for a true wind speed (knots) and signed true wind
    /// angle (degrees), plus whether the engine had to be used to reach it
    fn speed(&self, wind_speed: f64, twa: f64) -> (f64, bool);

    /// Absolute true wind angle giving the best upwind (or downwind) VMG
    fn best_vmg_angle(&self, wind_speed: f64, upwind: bool) -> f64;
}

/// Scans whole-degree TWAs for the best upwind or downwind VMG angle.
///
/// Upwind maximises `speed * cos(twa)`, downwind minimises it. Ties keep the
/// first angle found.
pub fn scan_best_vmg_angle(speed_at: impl Fn(f64) -> f64, upwind: bool) -> f64 {
    let mut best_angle = if upwind { 0.0 } else { 180.0 };
    let mut best_vmg = 0.0_f64;

    for deg in 0..=180 {
        let twa = deg as f64;
        let vmg = speed_at(twa) * twa.to_radians().cos();
        let better = if upwind { vmg > best_vmg } else { vmg < best_vmg };
        if better {
            best_vmg = vmg;
            best_angle = twa;
        }
    }
    best_angle
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_constant_speed() {
        // Constant speed: straight into / away from the wind is best
        assert_eq!(scan_best_vmg_angle(|_| 5.0, true), 0.0);
        assert_eq!(scan_best_vmg_angle(|_| 5.0, false), 180.0);
    }

    #[test]
    fn test_scan_no_go_zone() {
        // Boat cannot sail within 40 degrees of the wind, and is slow dead downwind
        let speed = |twa: f64| {
            if twa < 40.0 {
                0.0
            } else if twa > 160.0 {
                4.0
            } else {
                7.0
            }
        };
        assert_eq!(scan_best_vmg_angle(speed, true), 40.0);
        assert_eq!(scan_best_vmg_angle(speed, false), 160.0);
    }
}
