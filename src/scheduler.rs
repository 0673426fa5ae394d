//! Chooses which program to probe next and which kind of task to ask
//!
//! Program choice walks the catalog by priority, preferring programs not yet
//! asked this session; ties on priority are broken uniformly at random.

use crate::catalog::ProgramCatalog;
use crate::config::ProfilerConfig;
use crate::error::{ProfilerError, Result};
use crate::profile::StudentProfile;
use crate::types::TaskPolicy;
use crate::vector;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Result of one scheduling decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub program: String,
    pub policy: TaskPolicy,
    pub gap: f64,
    pub entropy: f64,
    /// True when every program had been asked and repeats were allowed
    pub exhausted: bool,
}

/// Next-program / next-policy selector
#[derive(Debug, Clone)]
pub struct SchedulingPolicy {
    disambiguation_threshold: f64,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self { disambiguation_threshold: 0.12 }
    }
}

impl SchedulingPolicy {
    pub fn new(disambiguation_threshold: f64) -> Self {
        Self { disambiguation_threshold }
    }

    pub fn from_config(config: &ProfilerConfig) -> Self {
        Self::new(config.disambiguation_threshold)
    }

    /// Broad while the top-2 gap is small, otherwise disambiguate the leaders
    pub fn task_policy(&self, profile: &StudentProfile) -> TaskPolicy {
        let distribution = profile.distribution();
        let gap = vector::top2_gap(&distribution);
        if gap < self.disambiguation_threshold {
            TaskPolicy::Broad
        } else {
            let (top, second) = vector::top_two_axes(&distribution);
            TaskPolicy::DisambiguateTop2 { top, second }
        }
    }

    /// Pick the next program and task policy, marking the program asked
    pub fn select_next<R: Rng + ?Sized>(
        &self,
        profile: &StudentProfile,
        catalog: &mut ProgramCatalog,
        rng: &mut R,
    ) -> Result<Selection> {
        if catalog.is_empty() {
            return Err(ProfilerError::EmptyCatalog);
        }

        let policy = self.task_policy(profile);

        let unasked = catalog.iter().any(|r| !r.asked);
        let min_priority = catalog
            .iter()
            .filter(|r| !unasked || !r.asked)
            .map(|r| r.priority_order)
            .min()
            .ok_or(ProfilerError::EmptyCatalog)?;

        let tied: Vec<&str> = catalog
            .iter()
            .filter(|r| (!unasked || !r.asked) && r.priority_order == min_priority)
            .map(|r| r.name.as_str())
            .collect();

        let candidates = tied.len();
        let program = tied
            .choose(rng)
            .map(|name| name.to_string())
            .ok_or(ProfilerError::EmptyCatalog)?;

        catalog.mark_asked(&program)?;

        debug!(
            program = %program,
            policy = policy.name(),
            priority = min_priority,
            candidates,
            exhausted = !unasked,
            "Selected next program"
        );

        Ok(Selection {
            program,
            policy,
            gap: profile.top2_gap(),
            entropy: profile.entropy(),
            exhausted: !unasked,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ProgramRow;
    use crate::types::{Axis, AxisRanking};
    use std::collections::HashSet;

    fn seeded_catalog() -> ProgramCatalog {
        let mut catalog = ProgramCatalog::from_rows(vec![
            ProgramRow { program: "Engineering".to_string(), vector: vec![0.9, 0.3, 0.0, 0.0, 0.1, 0.1] },
            ProgramRow { program: "Mechanics".to_string(), vector: vec![0.8, 0.1, 0.1, 0.0, 0.0, 0.2] },
            ProgramRow { program: "Physics".to_string(), vector: vec![0.2, 0.9, 0.0, 0.0, 0.0, 0.1] },
            ProgramRow { program: "Business".to_string(), vector: vec![0.0, 0.1, 0.0, 0.2, 0.9, 0.3] },
        ])
        .unwrap();
        catalog.assign_priorities(&AxisRanking::parse("RIASEC").unwrap()).unwrap();
        catalog
    }

    #[test]
    fn test_uniform_profile_gets_broad_policy() {
        let policy = SchedulingPolicy::default().task_policy(&StudentProfile::new());
        assert_eq!(policy, TaskPolicy::Broad);
    }

    #[test]
    fn test_sharp_profile_disambiguates_top_two() {
        let profile = StudentProfile::from_vector([0.1, 0.2, 0.9, 0.5, 0.1, 0.1]);
        let policy = SchedulingPolicy::default().task_policy(&profile);
        assert_eq!(
            policy,
            TaskPolicy::DisambiguateTop2 { top: Axis::Artistic, second: Axis::Social }
        );
    }

    #[test]
    fn test_visits_every_program_before_repeating() {
        let mut catalog = seeded_catalog();
        let scheduler = SchedulingPolicy::default();
        let profile = StudentProfile::new();
        let mut rng = StdRng::seed_from_u64(7);

        let mut order = Vec::new();
        for _ in 0..4 {
            let selection = scheduler.select_next(&profile, &mut catalog, &mut rng).unwrap();
            assert!(!selection.exhausted);
            order.push(selection.program);
        }

        // Priority 1 (Realistic) programs first, then I, then E
        let first_two: HashSet<&str> = order[..2].iter().map(|s| s.as_str()).collect();
        assert_eq!(first_two, HashSet::from(["Engineering", "Mechanics"]));
        assert_eq!(order[2], "Physics");
        assert_eq!(order[3], "Business");
        assert!(catalog.iter().all(|r| r.asked));
    }

    #[test]
    fn test_exhausted_catalog_falls_back_to_full_set() {
        let mut catalog = seeded_catalog();
        let scheduler = SchedulingPolicy::default();
        let profile = StudentProfile::new();
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..4 {
            scheduler.select_next(&profile, &mut catalog, &mut rng).unwrap();
        }

        for _ in 0..10 {
            let selection = scheduler.select_next(&profile, &mut catalog, &mut rng).unwrap();
            assert!(selection.exhausted);
            assert!(selection.program == "Engineering" || selection.program == "Mechanics");
        }
    }

    #[test]
    fn test_random_tie_break_reaches_both_programs() {
        let scheduler = SchedulingPolicy::default();
        let profile = StudentProfile::new();
        let mut seen = HashSet::new();

        for seed in 0..32 {
            let mut catalog = seeded_catalog();
            let mut rng = StdRng::seed_from_u64(seed);
            let selection = scheduler.select_next(&profile, &mut catalog, &mut rng).unwrap();
            seen.insert(selection.program);
        }

        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_empty_catalog() {
        let mut catalog = ProgramCatalog::from_rows(Vec::new()).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let result = SchedulingPolicy::default().select_next(&StudentProfile::new(), &mut catalog, &mut rng);
        assert!(matches!(result, Err(ProfilerError::EmptyCatalog)));
    }
}
