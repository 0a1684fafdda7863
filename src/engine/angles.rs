/// Wraps an angle in degrees to [-180, 180]
pub fn a180(angle: f64) -> f64 {
    let mut a = angle % 360.0;
    if a > 180.0 {
        a -= 360.0;
    } else if a < -180.0 {
        a += 360.0;
    }
    a
}

/// Wraps an angle in degrees to [0, 360)
pub fn a360(angle: f64) -> f64 {
    let a = angle % 360.0;
    if a >= 0.0 {
        return a;
    }
    // Tiny negative angles would round up to 360
    let wrapped = a + 360.0;
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Absolute angular difference between two directions, in [0, 180]
pub fn angle_diff(a: f64, b: f64) -> f64 {
    a180(a - b).abs()
}
