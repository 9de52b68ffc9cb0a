//! Position estimation from beacon observations
//!
//! Three tiers, tried in order:
//! 1. Linearized least-squares trilateration (three or more beacons)
//! 2. Position of the beacon with the strongest signal
//! 3. No estimate (no observations)
//!
//! Which tier fired is reported through [`Estimate`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::distance::PathLossModel;

/// Normal-matrix determinants below this magnitude are treated as singular
pub const SINGULAR_DETERMINANT_EPSILON: f64 = 1e-10;

/// Minimum number of beacons for a geometric solve
pub const MIN_TRILATERATION_BEACONS: usize = 3;

/// Integer 2-D coordinate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Latest reading of one device by one beacon
///
/// Also the entry type of a device's per-beacon RSSI table, and serialized
/// as-is into the persisted `rssi_values` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub beacon_id: String,
    pub x: i64,
    pub y: i64,
    pub rssi: f64,
}

impl Observation {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Beacon position with an estimated distance to the device
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub x: f64,
    pub y: f64,
    pub distance: f64,
}

impl Range {
    /// Convert an observation using a path-loss model
    pub fn from_observation(observation: &Observation, model: &PathLossModel) -> Self {
        Self {
            x: observation.x as f64,
            y: observation.y as f64,
            distance: model.distance(observation.rssi),
        }
    }
}

/// Geometric solve failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolveError {
    #[error("trilateration needs at least 3 beacons, got {0}")]
    InsufficientObservations(usize),

    #[error("normal matrix is singular (determinant {determinant:e})")]
    Singular { determinant: f64 },

    #[error("solution is not finite")]
    NonFinite,
}

/// Outcome of position estimation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Estimate {
    /// Least-squares solution from three or more beacons
    Trilaterated(Point),
    /// Position of the strongest-signal beacon (fewer than three beacons, or
    /// the geometric solve failed)
    StrongestSignal(Point),
    /// No observations
    NoData,
}

impl Estimate {
    pub fn point(&self) -> Option<Point> {
        match self {
            Estimate::Trilaterated(p) | Estimate::StrongestSignal(p) => Some(*p),
            Estimate::NoData => None,
        }
    }
}

/// Estimate a device position from its current observations
///
/// A failed geometric solve is never an error: it degrades to the
/// strongest-signal position.
pub fn estimate(observations: &[Observation], model: &PathLossModel) -> Estimate {
    if observations.len() >= MIN_TRILATERATION_BEACONS {
        let ranges: Vec<Range> = observations
            .iter()
            .map(|o| Range::from_observation(o, model))
            .collect();

        match trilaterate(&ranges) {
            Ok(point) => return Estimate::Trilaterated(point),
            Err(e) => tracing::debug!("Trilateration failed, using strongest signal: {}", e),
        }
    }

    match strongest_signal(observations) {
        Some(strongest) => Estimate::StrongestSignal(strongest.position()),
        None => Estimate::NoData,
    }
}

/// Observation with the highest RSSI
///
/// Scans with strict greater-than, so the first of several equal readings
/// wins.
pub fn strongest_signal(observations: &[Observation]) -> Option<&Observation> {
    let mut iter = observations.iter();
    let mut best = iter.next()?;
    for candidate in iter {
        if candidate.rssi > best.rssi {
            best = candidate;
        }
    }
    Some(best)
}

/// Linearized least-squares trilateration
///
/// The first range is the reference. Each other range `i` contributes
/// `2(xi-x0)x + 2(yi-y0)y = xi²-x0² + yi²-y0² + d0²-di²`; the stacked system
/// `A·p = b` is solved via the normal equations with a closed-form 2×2
/// inverse. Coordinates are rounded to the nearest integer.
pub fn trilaterate(ranges: &[Range]) -> Result<Point, SolveError> {
    if ranges.len() < MIN_TRILATERATION_BEACONS {
        return Err(SolveError::InsufficientObservations(ranges.len()));
    }

    let r0 = ranges[0];

    // Accumulate AᵀA (symmetric) and Aᵀb row by row
    let (mut ata_xx, mut ata_xy, mut ata_yy) = (0.0, 0.0, 0.0);
    let (mut atb_x, mut atb_y) = (0.0, 0.0);

    for ri in &ranges[1..] {
        let a_x = 2.0 * (ri.x - r0.x);
        let a_y = 2.0 * (ri.y - r0.y);
        let b = ri.x.powi(2) - r0.x.powi(2) + ri.y.powi(2) - r0.y.powi(2)
            + r0.distance.powi(2)
            - ri.distance.powi(2);

        ata_xx += a_x * a_x;
        ata_xy += a_x * a_y;
        ata_yy += a_y * a_y;
        atb_x += a_x * b;
        atb_y += a_y * b;
    }

    let determinant = ata_xx * ata_yy - ata_xy * ata_xy;
    if determinant.abs() < SINGULAR_DETERMINANT_EPSILON {
        return Err(SolveError::Singular { determinant });
    }

    let x = (ata_yy * atb_x - ata_xy * atb_y) / determinant;
    let y = (ata_xx * atb_y - ata_xy * atb_x) / determinant;

    if !x.is_finite() || !y.is_finite() {
        return Err(SolveError::NonFinite);
    }

    Ok(Point::new(round_half_up(x), round_half_up(y)))
}

/// Round to nearest integer, halves toward positive infinity
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}
