//! Scaling-factor diagnostics
//!
//! For a set of random start vectors and a grid of scaling factors, apply
//! the seeding update and one program-linked update, then report how far
//! the vector moved. Large per-axis jumps mean the factor is too aggressive.

use super::random_unit_vector;
use crate::catalog::ProgramCatalog;
use crate::config::ProfilerConfig;
use crate::error::{ProfilerError, Result};
use crate::profile::StudentProfile;
use crate::types::{Axis, AxisRanking, AxisVector};
use crate::update::{UpdateEngine, UpdateSource};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct DiagnosticsConfig {
    /// Number of random start vectors
    pub num_vectors: usize,
    /// Scaling factors tried per vector: `1/steps, 2/steps, ..., 1`
    pub steps: usize,
    pub ranking: AxisRanking,
    /// Program used for the task update; first catalog program when None
    pub program: Option<String>,
    pub answer: Axis,
    pub epsilon: f64,
    pub seed: Option<u64>,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            num_vectors: 30,
            steps: 20,
            // S, I, A, E, R, C
            ranking: AxisRanking::by_score(&[0.2, 0.5, 0.4, 0.6, 0.3, 0.1]),
            program: None,
            answer: Axis::Artistic,
            epsilon: ProfilerConfig::default().epsilon,
            seed: None,
        }
    }
}

/// One (start vector, scaling factor) trial
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticRow {
    pub start_vector: AxisVector,
    pub scaling_factor: f64,
    pub seeded_vector: AxisVector,
    pub updated_vector: AxisVector,
    /// Largest absolute component change from start to updated vector
    pub max_delta: f64,
}

/// Mean and worst movement for one scaling factor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingSummary {
    pub scaling_factor: f64,
    pub mean_max_delta: f64,
    pub worst_max_delta: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsReport {
    pub program: String,
    pub answer: Axis,
    pub rows: Vec<DiagnosticRow>,
    pub summary: Vec<ScalingSummary>,
}

pub fn run_scaling_sweep(catalog: &ProgramCatalog, config: &DiagnosticsConfig) -> Result<DiagnosticsReport> {
    if config.steps == 0 {
        return Err(ProfilerError::InvalidConfig("steps must be at least 1".to_string()));
    }

    let program = match &config.program {
        Some(name) => catalog
            .get(name)
            .map(|r| r.name.clone())
            .ok_or_else(|| ProfilerError::UnknownProgram(name.clone()))?,
        None => catalog
            .iter()
            .next()
            .map(|r| r.name.clone())
            .ok_or(ProfilerError::EmptyCatalog)?,
    };

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let starts: Vec<AxisVector> = (0..config.num_vectors)
        .map(|_| random_unit_vector(&mut rng))
        .collect();

    let mut rows = Vec::with_capacity(config.num_vectors * config.steps);
    let mut summary = Vec::with_capacity(config.steps);

    for step in 1..=config.steps {
        let scaling_factor = step as f64 / config.steps as f64;
        let engine = UpdateEngine::new(scaling_factor, config.epsilon)?;
        let mut deltas = Vec::with_capacity(starts.len());

        for start in &starts {
            let mut catalog = catalog.clone();
            catalog.reset_session();
            let mut profile = StudentProfile::from_vector(*start);

            let seeded_vector = engine.seed_from_ranking(&mut profile, &mut catalog, &config.ranking)?;
            let updated_vector = engine.apply_update(
                &mut profile,
                &catalog,
                config.answer.index(),
                UpdateSource::Program(&program),
            )?;

            let start_vector = *profile.start_vector();
            let max_delta = start_vector
                .iter()
                .zip(updated_vector.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);

            deltas.push(max_delta);
            rows.push(DiagnosticRow {
                start_vector,
                scaling_factor,
                seeded_vector,
                updated_vector,
                max_delta,
            });
        }

        let n = deltas.len().max(1) as f64;
        summary.push(ScalingSummary {
            scaling_factor,
            mean_max_delta: deltas.iter().sum::<f64>() / n,
            worst_max_delta: deltas.iter().copied().fold(0.0, f64::max),
        });
    }

    Ok(DiagnosticsReport {
        program,
        answer: config.answer,
        rows,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ProgramRow;

    fn catalog() -> ProgramCatalog {
        ProgramCatalog::from_rows(vec![
            ProgramRow { program: "Mathematics".to_string(), vector: vec![0.1, 0.8, 0.2, 0.1, 0.0, 0.3] },
            ProgramRow { program: "Design".to_string(), vector: vec![0.3, 0.1, 0.9, 0.0, 0.1, 0.0] },
        ])
        .unwrap()
    }

    #[test]
    fn test_sweep_shape_and_monotone_summary() {
        let config = DiagnosticsConfig { num_vectors: 5, steps: 4, seed: Some(1), ..Default::default() };
        let report = run_scaling_sweep(&catalog(), &config).unwrap();

        assert_eq!(report.program, "Mathematics");
        assert_eq!(report.rows.len(), 20);
        assert_eq!(report.summary.len(), 4);
        assert_eq!(report.summary[3].scaling_factor, 1.0);
        // Bigger steps move the vector further
        assert!(report.summary[0].mean_max_delta < report.summary[3].mean_max_delta);
        for row in &report.rows {
            assert!(row.max_delta >= 0.0 && row.max_delta <= 2.0);
        }
    }

    #[test]
    fn test_unknown_program() {
        let config = DiagnosticsConfig { program: Some("Law".to_string()), num_vectors: 1, ..Default::default() };
        assert!(matches!(
            run_scaling_sweep(&catalog(), &config),
            Err(ProfilerError::UnknownProgram(_))
        ));
    }

    #[test]
    fn test_zero_steps_rejected() {
        let config = DiagnosticsConfig { steps: 0, ..Default::default() };
        assert!(matches!(run_scaling_sweep(&catalog(), &config), Err(ProfilerError::InvalidConfig(_))));
    }
}
