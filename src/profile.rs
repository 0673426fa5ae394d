//! The student's evolving interest vector

use crate::types::{Axis, AxisVector, AXIS_COUNT};
use crate::vector;
use serde::{Deserialize, Serialize};

/// Six-dimensional interest vector plus its update history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentProfile {
    vector: AxisVector,
    start_vector: AxisVector,
    /// Snapshots after each completed update, oldest first
    history: Vec<AxisVector>,
}

impl Default for StudentProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl StudentProfile {
    /// Uniform unit vector: every axis equal
    pub fn new() -> Self {
        let uniform = [1.0 / (AXIS_COUNT as f64).sqrt(); AXIS_COUNT];
        Self::from_vector(uniform)
    }

    /// Start from an arbitrary vector (stored L2-normalized)
    pub fn from_vector(start: AxisVector) -> Self {
        let vector = vector::normalize_l2(&start);
        Self {
            vector,
            start_vector: vector,
            history: Vec::new(),
        }
    }

    pub fn vector(&self) -> &AxisVector {
        &self.vector
    }

    pub fn start_vector(&self) -> &AxisVector {
        &self.start_vector
    }

    pub fn history(&self) -> &[AxisVector] {
        &self.history
    }

    /// Probability view used by the entropy/gap analysis
    pub fn distribution(&self) -> AxisVector {
        vector::normalize_l1(&self.vector)
    }

    pub fn entropy(&self) -> f64 {
        vector::entropy(&self.vector)
    }

    pub fn top2_gap(&self) -> f64 {
        vector::top2_gap(&self.vector)
    }

    pub fn dominant_axis(&self) -> Axis {
        vector::dominant_axis(&self.vector)
    }

    /// Add `delta` to one component, renormalize, record the snapshot.
    /// Only the update engine calls this.
    pub(crate) fn nudge(&mut self, axis: Axis, delta: f64) -> AxisVector {
        self.vector[axis.index()] += delta;
        self.vector = vector::normalize_l2(&self.vector);
        self.history.push(self.vector);
        self.vector
    }
}
