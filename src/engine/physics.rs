use crate::engine::angles::{a180, a360};
use crate::engine::models::{CurrentData, WindData};

pub struct PhysicsModel;

impl PhysicsModel {
    /// Signed True Wind Angle from True Wind Direction (TWD) and Boat Heading.
    /// Positive when the wind comes over the port side.
    pub fn calculate_twa(twd: f64, heading: f64) -> f64 {
        a180(heading - twd)
    }

    /// Wind felt over moving water: true wind minus the current's velocity
    pub fn surface_wind(wind: &WindData, current: &CurrentData) -> WindData {
        let (wu, wv) = wind.components();
        let (cu, cv) = current.components();
        WindData::from_components(wu - cu, wv - cv)
    }

    /// Speed and course over ground (SOG, COG) from the boat's water velocity
    /// and the current
    pub fn ground_vector(heading: f64, boat_speed: f64, current: Option<&CurrentData>) -> (f64, f64) {
        let Some(current) = current else {
            return (boat_speed, a360(heading));
        };

        let heading_rad = heading.to_radians();
        let boat_vx = boat_speed * heading_rad.sin(); // East component
        let boat_vy = boat_speed * heading_rad.cos(); // North component

        let (cu, cv) = current.components();
        let sog_x = boat_vx + cu;
        let sog_y = boat_vy + cv;

        let sog = sog_x.hypot(sog_y);
        let cog = a360(sog_x.atan2(sog_y).to_degrees());
        (sog, cog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_twa() {
        assert_eq!(PhysicsModel::calculate_twa(0.0, 0.0), 0.0);
        assert_eq!(PhysicsModel::calculate_twa(0.0, 90.0), 90.0);
        assert_eq!(PhysicsModel::calculate_twa(0.0, 180.0), 180.0);
        // Other tack
        assert_eq!(PhysicsModel::calculate_twa(0.0, 270.0), -90.0);
        assert_eq!(PhysicsModel::calculate_twa(180.0, 150.0), -30.0);
        assert_eq!(PhysicsModel::calculate_twa(45.0, 10.0), -35.0);
    }

    #[test]
    fn test_ground_vector_no_current() {
        let (sog, cog) = PhysicsModel::ground_vector(90.0, 10.0, None);
        assert_eq!(sog, 10.0);
        assert_eq!(cog, 90.0);
    }

    #[test]
    fn test_ground_vector_with_current() {
        // No boat speed: drift with a 2 kt current setting East
        let current = CurrentData::new(2.0, 90.0);
        let (sog, cog) = PhysicsModel::ground_vector(0.0, 0.0, Some(&current));
        assert!((sog - 2.0).abs() < 1e-9);
        assert!((cog - 90.0).abs() < 1e-9);

        // Heading North at 2 kt with the same current: 45 degrees over ground
        let (sog, cog) = PhysicsModel::ground_vector(0.0, 2.0, Some(&current));
        assert!((sog - 8.0_f64.sqrt()).abs() < 1e-9);
        assert!((cog - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_surface_wind_with_following_current() {
        // 10 kt northerly over water flowing South at 2 kt: 8 kt felt
        let wind = WindData::new(10.0, 0.0);
        let current = CurrentData::new(2.0, 180.0);
        let felt = PhysicsModel::surface_wind(&wind, &current);
        assert!((felt.speed - 8.0).abs() < 1e-9);
        assert!(felt.direction.abs() < 1e-6 || (felt.direction - 360.0).abs() < 1e-6);
    }
}
