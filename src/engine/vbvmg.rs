//! Two-leg VMG decomposition.
//!
//! A direct leg of length `d` towards `wanted_heading` is replaced by two
//! straight legs at angles α and β from that heading, on opposite sides, so
//! that their cross-track offsets cancel:
//!
//! ```text
//! d1 = d * tan(-β) / (tan α + tan(-β)),  d2 = d - d1
//! l  = d_n * hypot(1, tan θ),           t = l / speed(θ)
//! ```
//!
//! Every whole-degree pair is tried and the pair minimising `t1 + t2` wins,
//! provided it beats sailing the direct heading.

use serde::{Deserialize, Serialize};

use crate::engine::angles::{a180, a360};
use crate::engine::polar::PolarModel;

/// Time given to a leg the boat cannot sail at all: one year, in hours
pub const UNSAILABLE_HOURS: f64 = 365.0 * 24.0;

/// Half-width in degrees of the narrow β windows
const NARROW_WINDOW: i32 = 15;

const TABLE_SIZE: usize = 179;

/// Which β angles are tried for each α
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TwoLegSearch {
    /// Every degree on the opposite side of the wind: global optimum on the grid
    #[default]
    Full,
    /// Only ±15° around a guess derived from the wind angle and around -α.
    /// Faster, but misses optima outside the windows.
    Narrow,
}

/// tan and hypot(1, tan) for every whole degree in -89..=89
#[derive(Debug, Clone)]
pub struct TrigTables {
    tan: [f64; TABLE_SIZE],
    hypot: [f64; TABLE_SIZE],
}

impl TrigTables {
    pub fn new() -> Self {
        let mut tan = [0.0; TABLE_SIZE];
        let mut hypot = [0.0; TABLE_SIZE];
        for deg in -89..=89_i32 {
            let idx = (deg + 89) as usize;
            tan[idx] = (deg as f64).to_radians().tan();
            hypot[idx] = 1.0_f64.hypot(tan[idx]);
        }
        Self { tan, hypot }
    }

    #[inline]
    pub fn tan(&self, deg: i32) -> f64 {
        self.tan[(deg + 89) as usize]
    }

    #[inline]
    pub fn hypot(&self, deg: i32) -> f64 {
        self.hypot[(deg + 89) as usize]
    }
}

impl Default for TrigTables {
    fn default() -> Self {
        Self::new()
    }
}

/// Best two-leg decomposition, leg 1 being the leg to sail first
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoLegSolution {
    pub heading1: f64,
    pub heading2: f64,
    pub twa1: f64,
    pub twa2: f64,
    /// Hours
    pub time1: f64,
    pub time2: f64,
    /// Progress along the direct line, nautical miles
    pub dist1: f64,
    pub dist2: f64,
    /// Distance actually sailed on each leg, nautical miles
    pub length1: f64,
    pub length2: f64,
}

#[derive(Debug, Clone, Copy)]
struct PairTrial {
    alpha: i32,
    beta: i32,
    d1: f64,
    d2: f64,
    l1: f64,
    l2: f64,
    t1: f64,
    t2: f64,
    speed1: f64,
    speed2: f64,
}

#[derive(Debug, Clone)]
pub struct TwoLegVmgSolver {
    tables: TrigTables,
    search: TwoLegSearch,
    /// Boat speed per β degree, valid for a single `solve` call
    speed_cache: [Option<f64>; TABLE_SIZE],
}

impl TwoLegVmgSolver {
    pub fn new(search: TwoLegSearch) -> Self {
        Self {
            tables: TrigTables::new(),
            search,
            speed_cache: [None; TABLE_SIZE],
        }
    }

    pub fn search(&self) -> TwoLegSearch {
        self.search
    }

    /// Decomposes `distance` nautical miles towards `wanted_heading` into two
    /// legs given the wind (speed in knots, direction it blows from in degrees).
    pub fn solve(
        &mut self,
        polar: &dyn PolarModel,
        distance: f64,
        wanted_heading: f64,
        wind_speed: f64,
        wind_angle: f64,
    ) -> TwoLegSolution {
        self.speed_cache = [None; TABLE_SIZE];

        let angle = a180(wind_angle - wanted_heading);
        let direct_speed = polar.speed(wind_speed, angle).0;
        let direct_time = if direct_speed > 0.0 { distance / direct_speed } else { UNSAILABLE_HOURS };

        // α and β on opposite sides of the direct heading
        let (min_i, max_i, min_j, max_j) = if angle < 0.0 { (1, 90, -89, 0) } else { (-89, 0, 1, 90) };

        let search = self.search;
        let mut t_min = direct_time;
        let mut best: Option<PairTrial> = None;
        let tables = &self.tables;
        let cache = &mut self.speed_cache;

        for i in min_i..max_i {
            let tan_alpha = tables.tan(i);
            let hypot_alpha = tables.hypot(i);
            let speed_t1 = polar.speed(wind_speed, a180(angle - i as f64)).0;
            if speed_t1 <= 0.0 {
                continue;
            }

            let mut try_beta = |j: i32, t_min: &mut f64, best: &mut Option<PairTrial>| {
                let tan_beta = tables.tan(-j);
                let d1 = distance * tan_beta / (tan_alpha + tan_beta);
                let l1 = d1 * hypot_alpha;
                let t1 = l1 / speed_t1;
                if t1 < 0.0 || t1 > *t_min {
                    return;
                }
                let d2 = distance - d1;
                let speed_t2 = *cache[(j + 89) as usize]
                    .get_or_insert_with(|| polar.speed(wind_speed, a180(angle - j as f64)).0);
                if speed_t2 <= 0.0 {
                    return;
                }
                let l2 = d2 * tables.hypot(-j);
                let t2 = l2 / speed_t2;
                if t2 < 0.0 {
                    return;
                }
                let t = t1 + t2;
                if t < *t_min {
                    *t_min = t;
                    *best = Some(PairTrial {
                        alpha: i,
                        beta: j,
                        d1,
                        d2,
                        l1,
                        l2,
                        t1,
                        t2,
                        speed1: speed_t1,
                        speed2: speed_t2,
                    });
                }
            };

            match search {
                TwoLegSearch::Full => {
                    for j in min_j..max_j {
                        try_beta(j, &mut t_min, &mut best);
                    }
                }
                TwoLegSearch::Narrow => {
                    let guess = (angle + a180(angle - i as f64)).round() as i32;
                    let around_guess = (guess - NARROW_WINDOW).max(min_j)..(guess + NARROW_WINDOW).min(max_j);
                    let around_mirror = (-i - NARROW_WINDOW).max(min_j)..(-i + NARROW_WINDOW).min(max_j);
                    for j in around_guess.chain(around_mirror) {
                        try_beta(j, &mut t_min, &mut best);
                    }
                }
            }
        }

        let Some(best) = best else {
            let twa = a180(wanted_heading - wind_angle);
            return TwoLegSolution {
                heading1: a360(wanted_heading),
                heading2: a360(wanted_heading),
                twa1: twa,
                twa2: twa,
                time1: direct_time,
                time2: 0.0,
                dist1: distance,
                dist2: 0.0,
                length1: distance,
                length2: 0.0,
            };
        };

        let vmg_alpha = best.speed1 * (best.alpha as f64).to_radians().cos();
        let vmg_beta = best.speed2 * (best.beta as f64).to_radians().cos();

        let heading_alpha = a360(wanted_heading + best.alpha as f64);
        let heading_beta = a360(wanted_heading + best.beta as f64);

        let (heading1, heading2, time1, time2, dist1, dist2, length1, length2) = if vmg_alpha > vmg_beta {
            (heading_alpha, heading_beta, best.t1, best.t2, best.d1, best.d2, best.l1, best.l2)
        } else {
            (heading_beta, heading_alpha, best.t2, best.t1, best.d2, best.d1, best.l2, best.l1)
        };

        TwoLegSolution {
            heading1,
            heading2,
            twa1: a180(heading1 - wind_angle),
            twa2: a180(heading2 - wind_angle),
            time1,
            time2,
            dist1,
            dist2,
            length1,
            length2,
        }
    }
}
