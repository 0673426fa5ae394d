//! Nearest-program recommendation at session end

use crate::catalog::ProgramCatalog;
use crate::profile::StudentProfile;
use crate::types::{Axis, Recommendation, AXIS_COUNT};
use crate::vector::l2_norm;

/// Ranks catalog programs by Euclidean distance to the student vector
#[derive(Debug, Clone, Copy)]
pub struct RecommendationEngine {
    k: usize,
}

impl Default for RecommendationEngine {
    fn default() -> Self {
        Self { k: 3 }
    }
}

impl RecommendationEngine {
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    /// Top `k` programs by ascending distance; equal distances keep catalog order
    pub fn recommend(&self, profile: &StudentProfile, catalog: &ProgramCatalog) -> Vec<Recommendation> {
        let student = profile.vector();

        let mut scored: Vec<(f64, &str, Axis)> = catalog
            .iter()
            .map(|record| {
                let mut diff = [0.0; AXIS_COUNT];
                for j in 0..AXIS_COUNT {
                    diff[j] = record.vector[j] - student[j];
                }
                (l2_norm(&diff), record.name.as_str(), closest_axis(&diff))
            })
            .collect();

        // sort_by is stable
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        scored
            .into_iter()
            .take(self.k)
            .enumerate()
            .map(|(i, (distance, program, axis))| Recommendation {
                rank: i + 1,
                program: program.to_string(),
                distance: round4(distance),
                closest_axis: axis,
            })
            .collect()
    }
}

/// Axis with the smallest absolute difference; ties to the lower index
fn closest_axis(diff: &[f64; AXIS_COUNT]) -> Axis {
    let mut best = 0;
    for j in 1..AXIS_COUNT {
        if diff[j].abs() < diff[best].abs() {
            best = j;
        }
    }
    Axis::ALL[best]
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}
