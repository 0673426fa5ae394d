//! Offline evaluation of the profiling engine
//!
//! - Scaling-factor sweep over random start vectors
//! - Template-based synthetic task generation (no network)
//! - Monte Carlo runs of full sessions against synthetic students

pub mod diagnostics;
pub mod simulation;
pub mod synthetic;

use crate::types::{AxisVector, AXIS_COUNT};
use crate::vector::normalize_l2;
use rand::Rng;

/// Random point on the positive orthant of the unit sphere
pub fn random_unit_vector<R: Rng + ?Sized>(rng: &mut R) -> AxisVector {
    let mut v = [0.0; AXIS_COUNT];
    for x in v.iter_mut() {
        *x = rng.gen::<f64>();
    }
    // Avoid the (practically impossible) zero draw
    if v.iter().all(|x| *x == 0.0) {
        v = [1.0; AXIS_COUNT];
    }
    normalize_l2(&v)
}
