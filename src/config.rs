//! Tunable parameters for a profiling session

use crate::error::{ProfilerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration shared by the update, scheduling, stopping and
/// recommendation steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    /// Step size of a single answer-driven nudge (must be > 0)
    pub scaling_factor: f64,
    /// Added to the gradient column norm to keep the update finite
    pub epsilon: f64,
    /// Below this top-2 gap the scheduler asks broad tasks
    pub disambiguation_threshold: f64,
    /// Stop once entropy drops under this
    pub entropy_threshold: f64,
    /// Stop once the top-2 gap exceeds this
    pub gap_threshold: f64,
    /// Number of programs returned at termination
    pub recommendation_count: usize,
    /// Hard cap on answered tasks (None = no cap)
    pub max_tasks: Option<usize>,
    /// Generator attempts per task before giving up
    pub max_generation_attempts: u32,
    /// RNG seed for reproducible program/task choice (None = entropy)
    pub seed: Option<u64>,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            scaling_factor: 0.15,
            epsilon: 1e-5,
            disambiguation_threshold: 0.12,
            entropy_threshold: 1.20,
            gap_threshold: 0.15,
            recommendation_count: 3,
            max_tasks: Some(12),
            max_generation_attempts: 3,
            seed: None,
        }
    }
}

impl ProfilerConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ProfilerConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.scaling_factor > 0.0) {
            return Err(ProfilerError::InvalidConfig(format!(
                "scaling_factor must be > 0, got {}",
                self.scaling_factor
            )));
        }
        if !(self.epsilon > 0.0) {
            return Err(ProfilerError::InvalidConfig(format!(
                "epsilon must be > 0, got {}",
                self.epsilon
            )));
        }
        if self.recommendation_count == 0 {
            return Err(ProfilerError::InvalidConfig(
                "recommendation_count must be at least 1".to_string(),
            ));
        }
        if self.max_generation_attempts == 0 {
            return Err(ProfilerError::InvalidConfig(
                "max_generation_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default data directory for task banks and interaction logs
pub fn get_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("riasec-profiler")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = ProfilerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scaling_factor, 0.15);
        assert_eq!(config.recommendation_count, 3);
    }

    #[test]
    fn test_rejects_non_positive_scaling() {
        let config = ProfilerConfig { scaling_factor: 0.0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ProfilerError::InvalidConfig(_))));

        let config = ProfilerConfig { scaling_factor: f64::NAN, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"scaling_factor": 0.3, "seed": 7}}"#).unwrap();

        let config = ProfilerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.scaling_factor, 0.3);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.gap_threshold, 0.15);
    }
}
