//! Entropy/gap based stopping rule

use crate::config::ProfilerConfig;
use crate::types::AxisVector;
use crate::vector::{self, MAX_ENTROPY};
use serde::{Deserialize, Serialize};

/// Why a profile was judged sharp enough
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    LowEntropy,
    WideGap,
    TaskLimit,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::LowEntropy => "low_entropy",
            StopReason::WideGap => "wide_gap",
            StopReason::TaskLimit => "task_limit",
        }
    }
}

/// Outcome of one stopping check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopDecision {
    pub entropy: f64,
    pub gap: f64,
    pub reason: Option<StopReason>,
}

impl StopDecision {
    pub fn should_stop(&self) -> bool {
        self.reason.is_some()
    }
}

/// Stops when entropy is low OR the top-2 gap is wide
#[derive(Debug, Clone, Copy)]
pub struct StoppingCriterion {
    pub entropy_threshold: f64,
    pub gap_threshold: f64,
}

impl Default for StoppingCriterion {
    fn default() -> Self {
        Self {
            entropy_threshold: 1.20,
            gap_threshold: 0.15,
        }
    }
}

impl StoppingCriterion {
    pub fn new(entropy_threshold: f64, gap_threshold: f64) -> Self {
        Self { entropy_threshold, gap_threshold }
    }

    pub fn from_config(config: &ProfilerConfig) -> Self {
        Self::new(config.entropy_threshold, config.gap_threshold)
    }

    pub fn evaluate(&self, v: &AxisVector) -> StopDecision {
        let entropy = vector::entropy(v);
        let gap = vector::top2_gap(v);

        // Thresholds at the ceiling/floor of the range stop unconditionally,
        // independent of rounding in the computed entropy and gap.
        let reason = if self.entropy_threshold >= MAX_ENTROPY || entropy < self.entropy_threshold {
            Some(StopReason::LowEntropy)
        } else if self.gap_threshold <= 0.0 || gap > self.gap_threshold {
            Some(StopReason::WideGap)
        } else {
            None
        };

        StopDecision { entropy, gap, reason }
    }

    pub fn should_stop(&self, v: &AxisVector) -> bool {
        self.evaluate(v).should_stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_does_not_stop_at_defaults() {
        let criterion = StoppingCriterion::default();
        let decision = criterion.evaluate(&[1.0; 6]);
        assert!(!decision.should_stop());
        assert!((decision.entropy - 6f64.ln()).abs() < 1e-12);
        assert_eq!(decision.gap, 0.0);
    }

    #[test]
    fn test_point_mass_stops_regardless_of_gap_threshold() {
        for gap_threshold in [0.15, 0.99, 5.0] {
            let criterion = StoppingCriterion::new(1.20, gap_threshold);
            let decision = criterion.evaluate(&[0.0, 0.0, 10.0, 0.0, 0.0, 0.0]);
            assert_eq!(decision.reason, Some(StopReason::LowEntropy));
        }
    }

    #[test]
    fn test_trivial_thresholds_always_stop() {
        let uniform = [1.0; 6];
        assert!(StoppingCriterion::new(MAX_ENTROPY, 0.15).should_stop(&uniform));
        assert!(StoppingCriterion::new(10.0, 0.15).should_stop(&uniform));
        assert!(StoppingCriterion::new(0.0, 0.0).should_stop(&uniform));
        assert!(StoppingCriterion::new(0.0, -1.0).should_stop(&uniform));
    }

    #[test]
    fn test_gap_alone_is_sufficient() {
        // High entropy but one clear leader
        let v = [0.4, 0.15, 0.15, 0.1, 0.1, 0.1];
        let criterion = StoppingCriterion::new(0.5, 0.15);
        let decision = criterion.evaluate(&v);
        assert!(decision.entropy > 0.5);
        assert_eq!(decision.reason, Some(StopReason::WideGap));
    }
}
