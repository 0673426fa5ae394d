//! Answer-driven updates of the student vector
//!
//! Each answer reinforces one axis by
//! `scaling_factor * magnitude / (||gradient column|| + epsilon)`
//! and the vector is then L2-renormalized.

use crate::catalog::ProgramCatalog;
use crate::config::ProfilerConfig;
use crate::error::{ProfilerError, Result};
use crate::profile::StudentProfile;
use crate::types::{Axis, AxisRanking, AxisVector, AXIS_COUNT};
use tracing::debug;

/// Where the update magnitude comes from
#[derive(Debug, Clone, Copy)]
pub enum UpdateSource<'a> {
    /// The selected program's own component on the reinforced axis
    Program(&'a str),
    /// Flat unit magnitude (forced-choice RIASEC ranking)
    Flat,
}

/// Applies answer-driven nudges to a profile
#[derive(Debug, Clone)]
pub struct UpdateEngine {
    scaling_factor: f64,
    epsilon: f64,
}

impl UpdateEngine {
    pub fn new(scaling_factor: f64, epsilon: f64) -> Result<Self> {
        if !(scaling_factor > 0.0) {
            return Err(ProfilerError::InvalidConfig(format!(
                "scaling_factor must be > 0, got {}",
                scaling_factor
            )));
        }
        Ok(Self { scaling_factor, epsilon })
    }

    pub fn from_config(config: &ProfilerConfig) -> Result<Self> {
        Self::new(config.scaling_factor, config.epsilon)
    }

    pub fn scaling_factor(&self) -> f64 {
        self.scaling_factor
    }

    /// Reinforce `axis_index` and renormalize; returns the new vector.
    ///
    /// Fails with `InvalidAxis` outside `0..6` and `EmptyCatalog` when no
    /// gradient column exists. The profile is untouched on error.
    pub fn apply_update(
        &self,
        profile: &mut StudentProfile,
        catalog: &ProgramCatalog,
        axis_index: usize,
        source: UpdateSource<'_>,
    ) -> Result<AxisVector> {
        if axis_index >= AXIS_COUNT {
            return Err(ProfilerError::InvalidAxis(axis_index));
        }
        let column_norm = catalog.gradient_column_norm(axis_index)?;

        let magnitude = match source {
            UpdateSource::Program(name) => {
                let record = catalog
                    .get(name)
                    .ok_or_else(|| ProfilerError::UnknownProgram(name.to_string()))?;
                record.vector[axis_index]
            }
            UpdateSource::Flat => 1.0,
        };

        let axis = Axis::from_index(axis_index)?;
        let delta = self.scaling_factor * magnitude / (column_norm + self.epsilon);
        let updated = profile.nudge(axis, delta);

        debug!(axis = %axis, delta, "Applied profile update");
        Ok(updated)
    }

    /// Session entry point: assign catalog priorities from the forced-choice
    /// ranking, then reinforce the student's rank-1 axis
    pub fn seed_from_ranking(
        &self,
        profile: &mut StudentProfile,
        catalog: &mut ProgramCatalog,
        ranking: &AxisRanking,
    ) -> Result<AxisVector> {
        catalog.assign_priorities(ranking)?;
        self.apply_update(profile, catalog, ranking.first().index(), UpdateSource::Flat)
    }
}
