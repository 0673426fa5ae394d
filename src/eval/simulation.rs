//! Monte Carlo simulation of full profiling sessions
//!
//! Each synthetic student has a hidden interest vector. They rank the axes
//! by it for seeding, then answer every task by picking the option whose
//! axis scores highest under uniform noise. A run is a hit when the
//! session's top recommendation matches the program nearest to the hidden
//! vector.

use super::random_unit_vector;
use super::synthetic::SyntheticTaskGenerator;
use crate::bank::MemoryTaskBank;
use crate::catalog::ProgramCatalog;
use crate::config::ProfilerConfig;
use crate::error::{ProfilerError, Result};
use crate::profile::StudentProfile;
use crate::recommend::RecommendationEngine;
use crate::session::Session;
use crate::types::{AxisRanking, AxisVector, Microtask, NextStep};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub num_students: u32,
    /// Half-width of the uniform noise added to axis scores per answer
    pub answer_noise: f64,
    pub profiler: ProfilerConfig,
    /// Random seed for reproducibility (None = random)
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_students: 500,
            answer_noise: 0.1,
            profiler: ProfilerConfig::default(),
            seed: None,
        }
    }
}

/// A simulated student with a hidden interest vector
#[derive(Debug, Clone)]
pub struct SyntheticStudent {
    pub true_vector: AxisVector,
}

impl SyntheticStudent {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self { true_vector: random_unit_vector(rng) }
    }

    pub fn ranking(&self) -> AxisRanking {
        AxisRanking::by_score(&self.true_vector)
    }

    /// Option key whose axis scores highest after noise
    pub fn choose<R: Rng + ?Sized>(&self, task: &Microtask, noise: f64, rng: &mut R) -> Option<String> {
        task.options
            .iter()
            .map(|(key, option)| {
                let jitter = if noise > 0.0 { rng.gen_range(-noise..noise) } else { 0.0 };
                (key, self.true_vector[option.riasec.index()] + jitter)
            })
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(key, _)| key.clone())
    }
}

/// Aggregate results of a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResults {
    pub num_students: u32,
    pub completed: u32,
    pub aborted: u32,
    pub mean_tasks: f64,
    pub max_tasks: usize,
    /// Stop reason -> count
    pub stop_reasons: HashMap<String, u32>,
    /// Top recommendation equals the program nearest the hidden vector
    pub top1_hit_rate: f64,
    /// Nearest program appears anywhere in the recommendations
    pub topk_hit_rate: f64,
}

pub fn run_simulation(catalog: &ProgramCatalog, config: &SimulationConfig) -> Result<SimulationResults> {
    if catalog.is_empty() {
        return Err(ProfilerError::EmptyCatalog);
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let oracle = RecommendationEngine::new(1);

    let mut completed = 0u32;
    let mut aborted = 0u32;
    let mut task_counts: Vec<usize> = Vec::new();
    let mut stop_reasons: HashMap<String, u32> = HashMap::new();
    let mut top1_hits = 0u32;
    let mut topk_hits = 0u32;

    for _ in 0..config.num_students {
        let student = SyntheticStudent::random(&mut rng);
        let nearest = oracle
            .recommend(&StudentProfile::from_vector(student.true_vector), catalog)
            .into_iter()
            .next()
            .map(|r| r.program);

        let profiler = ProfilerConfig { seed: Some(rng.gen()), ..config.profiler.clone() };
        let outcome = simulate_student(catalog, &student, profiler, config.answer_noise, &mut rng);

        let (answered, reason, recommendations) = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(error = %e, "Simulated session failed");
                aborted += 1;
                continue;
            }
        };

        completed += 1;
        task_counts.push(answered);
        *stop_reasons.entry(reason).or_insert(0) += 1;

        if let Some(nearest) = &nearest {
            if recommendations.first() == Some(nearest) {
                top1_hits += 1;
            }
            if recommendations.contains(nearest) {
                topk_hits += 1;
            }
        }
    }

    let n = completed.max(1) as f64;
    Ok(SimulationResults {
        num_students: config.num_students,
        completed,
        aborted,
        mean_tasks: task_counts.iter().sum::<usize>() as f64 / n,
        max_tasks: task_counts.iter().copied().max().unwrap_or(0),
        stop_reasons,
        top1_hit_rate: top1_hits as f64 / n,
        topk_hit_rate: topk_hits as f64 / n,
    })
}

/// Drive one session to completion; returns (tasks answered, stop reason, programs)
fn simulate_student<R: Rng + ?Sized>(
    catalog: &ProgramCatalog,
    student: &SyntheticStudent,
    profiler: ProfilerConfig,
    noise: f64,
    rng: &mut R,
) -> Result<(usize, String, Vec<String>)> {
    let mut session = Session::start(
        catalog.clone(),
        student.ranking(),
        MemoryTaskBank::new(),
        SyntheticTaskGenerator,
        profiler,
    )?;

    loop {
        match session.next_step()? {
            NextStep::Task(presented) => {
                let key = student
                    .choose(&presented.task, noise, rng)
                    .ok_or_else(|| ProfilerError::InvalidState("task without options".to_string()))?;
                session.answer(&key, None)?;
            }
            NextStep::Recommendations(recs) => {
                let reason = session
                    .stop_decision()
                    .reason
                    .map(|r| r.as_str().to_string())
                    .unwrap_or_default();
                let programs = recs.into_iter().map(|r| r.program).collect();
                return Ok((session.answers().len(), reason, programs));
            }
        }
    }
}
