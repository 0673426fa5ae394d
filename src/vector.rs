//! Numeric primitives over RIASEC vectors
//!
//! Analysis always works on the L1-normalized form (a probability
//! distribution over the six axes); storage keeps the L2-normalized form.

use crate::types::{Axis, AxisVector, AXIS_COUNT};

/// Floor applied to probabilities before taking the log
const LOG_FLOOR: f64 = 1e-12;

/// Upper bound of the entropy of a six-way distribution
pub const MAX_ENTROPY: f64 = 1.791_759_469_228_055; // ln(6)

/// Divide by the sum; a non-positive sum yields the uniform distribution
pub fn normalize_l1(v: &AxisVector) -> AxisVector {
    let sum: f64 = v.iter().sum();
    if sum > 0.0 {
        v.map(|x| x / sum)
    } else {
        [1.0 / AXIS_COUNT as f64; AXIS_COUNT]
    }
}

/// Scale to unit Euclidean length; the zero vector is returned unchanged
pub fn normalize_l2(v: &AxisVector) -> AxisVector {
    let norm = l2_norm(v);
    if norm > 0.0 {
        v.map(|x| x / norm)
    } else {
        *v
    }
}

pub fn l2_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Shannon entropy (natural log) of the L1-normalized vector, in `[0, ln 6]`
pub fn entropy(v: &AxisVector) -> f64 {
    let p = normalize_l1(v);
    -p.iter()
        .map(|&pi| pi * pi.clamp(LOG_FLOOR, 1.0).ln())
        .sum::<f64>()
}

/// Top-1 minus top-2 component of the L1-normalized vector, in `[0, 1]`
pub fn top2_gap(v: &AxisVector) -> f64 {
    let p = normalize_l1(v);
    let (top, second) = top_two_axes(&p);
    p[top.index()] - p[second.index()]
}

/// The two largest components; ties go to the lower axis index
pub fn top_two_axes(v: &AxisVector) -> (Axis, Axis) {
    let top = argmax(v, None);
    let second = argmax(v, Some(top));
    (Axis::ALL[top], Axis::ALL[second])
}

/// Axis with the largest component; ties go to the lower axis index
pub fn dominant_axis(v: &AxisVector) -> Axis {
    Axis::ALL[argmax(v, None)]
}

fn argmax(v: &AxisVector, skip: Option<usize>) -> usize {
    let mut best: Option<usize> = None;
    for i in 0..AXIS_COUNT {
        if Some(i) == skip {
            continue;
        }
        match best {
            Some(b) if v[i] <= v[b] => {}
            _ => best = Some(i),
        }
    }
    best.unwrap_or(0)
}
