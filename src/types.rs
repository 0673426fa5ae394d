//! Core types for RIASEC profiling
//!
//! Axes are a closed enum indexed into fixed-size arrays; nothing in the
//! engine dispatches on axis strings once input has been parsed.

use crate::error::{ProfilerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Number of RIASEC axes
pub const AXIS_COUNT: usize = 6;

/// Six-dimensional vector in fixed R, I, A, S, E, C order
pub type AxisVector = [f64; AXIS_COUNT];

/// One RIASEC dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Axis {
    #[serde(rename = "R")]
    Realistic,
    #[serde(rename = "I")]
    Investigative,
    #[serde(rename = "A")]
    Artistic,
    #[serde(rename = "S")]
    Social,
    #[serde(rename = "E")]
    Enterprising,
    #[serde(rename = "C")]
    Conventional,
}

impl Axis {
    /// All axes in canonical order
    pub const ALL: [Axis; AXIS_COUNT] = [
        Axis::Realistic,
        Axis::Investigative,
        Axis::Artistic,
        Axis::Social,
        Axis::Enterprising,
        Axis::Conventional,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Result<Self> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(ProfilerError::InvalidAxis(index))
    }

    pub fn code(self) -> char {
        match self {
            Axis::Realistic => 'R',
            Axis::Investigative => 'I',
            Axis::Artistic => 'A',
            Axis::Social => 'S',
            Axis::Enterprising => 'E',
            Axis::Conventional => 'C',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|axis| axis.code() == code.to_ascii_uppercase())
    }

    pub fn name(self) -> &'static str {
        match self {
            Axis::Realistic => "Realistic",
            Axis::Investigative => "Investigative",
            Axis::Artistic => "Artistic",
            Axis::Social => "Social",
            Axis::Enterprising => "Enterprising",
            Axis::Conventional => "Conventional",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Axis {
    type Err = ProfilerError;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Axis::from_code(c)
                .ok_or_else(|| ProfilerError::InvalidRanking(format!("unknown axis code '{}'", s))),
            _ => Self::ALL
                .into_iter()
                .find(|axis| axis.name().eq_ignore_ascii_case(s.trim()))
                .ok_or_else(|| ProfilerError::InvalidRanking(format!("unknown axis '{}'", s))),
        }
    }
}

/// A student's forced-choice ordering of the six axes, most preferred first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Axis>", into = "Vec<Axis>")]
pub struct AxisRanking([Axis; AXIS_COUNT]);

impl AxisRanking {
    /// Validate that `order` is a permutation of the six axes
    pub fn new(order: Vec<Axis>) -> Result<Self> {
        if order.len() != AXIS_COUNT {
            return Err(ProfilerError::InvalidRanking(format!(
                "expected {} axes, got {}",
                AXIS_COUNT,
                order.len()
            )));
        }

        let mut seen = [false; AXIS_COUNT];
        let mut ranked = [Axis::Realistic; AXIS_COUNT];
        for (position, axis) in order.into_iter().enumerate() {
            if seen[axis.index()] {
                return Err(ProfilerError::InvalidRanking(format!(
                    "axis {} appears more than once",
                    axis
                )));
            }
            seen[axis.index()] = true;
            ranked[position] = axis;
        }

        Ok(Self(ranked))
    }

    /// Parse a compact code string such as `"SIAERC"` (commas and spaces ignored)
    pub fn parse(codes: &str) -> Result<Self> {
        let axes = codes
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ',')
            .map(|c| {
                Axis::from_code(c)
                    .ok_or_else(|| ProfilerError::InvalidRanking(format!("unknown axis code '{}'", c)))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(axes)
    }

    /// Order axes by descending score; equal scores keep canonical order
    pub fn by_score(scores: &AxisVector) -> Self {
        let mut order = Axis::ALL;
        order.sort_by(|a, b| scores[b.index()].total_cmp(&scores[a.index()]));
        Self(order)
    }

    /// Rank (1 = most preferred) the student gave to `axis`
    pub fn rank_of(&self, axis: Axis) -> u8 {
        self.0
            .iter()
            .position(|a| *a == axis)
            .map(|p| p as u8 + 1)
            .unwrap_or(AXIS_COUNT as u8)
    }

    pub fn first(&self) -> Axis {
        self.0[0]
    }

    pub fn axes(&self) -> &[Axis; AXIS_COUNT] {
        &self.0
    }
}

impl TryFrom<Vec<Axis>> for AxisRanking {
    type Error = ProfilerError;

    fn try_from(order: Vec<Axis>) -> Result<Self> {
        Self::new(order)
    }
}

impl From<AxisRanking> for Vec<Axis> {
    fn from(ranking: AxisRanking) -> Self {
        ranking.0.to_vec()
    }
}

impl fmt::Display for AxisRanking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for axis in self.0 {
            write!(f, "{}", axis)?;
        }
        Ok(())
    }
}

/// How the student felt about the task they just answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPreference {
    Positive,
    Negative,
}

impl TaskPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPreference::Positive => "positive",
            TaskPreference::Negative => "negative",
        }
    }
}

impl FromStr for TaskPreference {
    type Err = ProfilerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "positive" | "+" | "like" => Ok(TaskPreference::Positive),
            "negative" | "-" | "dislike" => Ok(TaskPreference::Negative),
            other => Err(ProfilerError::InvalidAnswer(format!("unknown preference '{}'", other))),
        }
    }
}

/// Task-selection policy chosen by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum TaskPolicy {
    /// Six-option task spanning every axis
    Broad,
    /// Task concentrated on the two leading axes
    DisambiguateTop2 { top: Axis, second: Axis },
}

impl TaskPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            TaskPolicy::Broad => "broad_exploration",
            TaskPolicy::DisambiguateTop2 { .. } => "disambiguate_top2",
        }
    }

    /// Axes a task under this policy must cover
    pub fn target_axes(&self) -> Vec<Axis> {
        match self {
            TaskPolicy::Broad => Axis::ALL.to_vec(),
            TaskPolicy::DisambiguateTop2 { top, second } => vec![*top, *second],
        }
    }

    /// Bank keys consulted for candidates, in order
    pub fn bank_keys(&self) -> Vec<PolicyKey> {
        match self {
            TaskPolicy::Broad => vec![PolicyKey::Broad],
            TaskPolicy::DisambiguateTop2 { top, second } => {
                vec![PolicyKey::Axis(*top), PolicyKey::Axis(*second)]
            }
        }
    }

    /// Bank key that generated tasks are filed under
    pub fn refill_key(&self) -> PolicyKey {
        match self {
            TaskPolicy::Broad => PolicyKey::Broad,
            TaskPolicy::DisambiguateTop2 { top, .. } => PolicyKey::Axis(*top),
        }
    }
}

/// Key of a task bank bucket: `broad` or a single axis code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKey {
    Broad,
    Axis(Axis),
}

impl fmt::Display for PolicyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKey::Broad => write!(f, "broad"),
            PolicyKey::Axis(axis) => write!(f, "{}", axis),
        }
    }
}

impl FromStr for PolicyKey {
    type Err = ProfilerError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("broad") {
            Ok(PolicyKey::Broad)
        } else {
            s.parse::<Axis>()
                .map(PolicyKey::Axis)
                .map_err(|_| ProfilerError::InvalidState(format!("unknown bank policy '{}'", s)))
        }
    }
}

/// Single option in a microtask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOption {
    pub text: String,
    pub riasec: Axis,
}

/// Diagnostic information attached to a served task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMeta {
    pub policy: String,
    pub target_axes: Vec<Axis>,
    pub top2_gap: f64,
    pub entropy: f64,
    #[serde(default)]
    pub generated: bool,
}

/// A preference microtask: a question with axis-tagged options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Microtask {
    #[serde(default)]
    pub question_code: String,
    pub question: String,
    /// Option key ("A".."F") to option
    pub options: BTreeMap<String, TaskOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<TaskMeta>,
}

impl Microtask {
    /// Axis tags of the options, in option-key order
    pub fn axes(&self) -> Vec<Axis> {
        self.options.values().map(|o| o.riasec).collect()
    }

    pub fn option_axis(&self, key: &str) -> Option<Axis> {
        self.options
            .get(key.trim())
            .or_else(|| self.options.get(&key.trim().to_uppercase()))
            .map(|o| o.riasec)
    }
}

/// A task handed to the student, with the program it probes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresentedTask {
    pub program: String,
    pub policy: TaskPolicy,
    pub task: Microtask,
    /// 1-based position of this task in the session
    pub step: usize,
}

/// One ranked program at termination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub rank: usize,
    pub program: String,
    /// Euclidean distance to the student vector, rounded to 4 places
    pub distance: f64,
    /// Axis with the smallest absolute per-axis difference
    pub closest_axis: Axis,
}

/// Outward session contract: either a task to present or the final ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum NextStep {
    Task(PresentedTask),
    Recommendations(Vec<Recommendation>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_codes_round_trip() {
        for (i, axis) in Axis::ALL.iter().enumerate() {
            assert_eq!(axis.index(), i);
            assert_eq!(Axis::from_code(axis.code()), Some(*axis));
        }
        assert_eq!("investigative".parse::<Axis>().unwrap(), Axis::Investigative);
        assert!(matches!(Axis::from_index(6), Err(ProfilerError::InvalidAxis(6))));
    }

    #[test]
    fn test_ranking_requires_permutation() {
        let ranking = AxisRanking::parse("SIAERC").unwrap();
        assert_eq!(ranking.first(), Axis::Social);
        assert_eq!(ranking.rank_of(Axis::Social), 1);
        assert_eq!(ranking.rank_of(Axis::Conventional), 6);

        assert!(matches!(AxisRanking::parse("SIAER"), Err(ProfilerError::InvalidRanking(_))));
        assert!(matches!(AxisRanking::parse("SSAERC"), Err(ProfilerError::InvalidRanking(_))));
        assert!(matches!(AxisRanking::parse("SIAERX"), Err(ProfilerError::InvalidRanking(_))));
    }

    #[test]
    fn test_ranking_by_score() {
        let ranking = AxisRanking::by_score(&[0.2, 0.5, 0.4, 0.6, 0.3, 0.1]);
        assert_eq!(ranking.to_string(), "SIAERC");
        assert_eq!(AxisRanking::by_score(&[0.0; AXIS_COUNT]).to_string(), "RIASEC");
    }

    #[test]
    fn test_ranking_serde_validates() {
        let ranking: AxisRanking = serde_json::from_str(r#"["R","I","A","S","E","C"]"#).unwrap();
        assert_eq!(ranking.to_string(), "RIASEC");
        assert!(serde_json::from_str::<AxisRanking>(r#"["R","R","A","S","E","C"]"#).is_err());
    }

    #[test]
    fn test_microtask_from_bank_json() {
        let json = r#"{
            "question": "Which part of a group project appeals to you most?",
            "options": {
                "A": {"text": "Building the physical prototype", "riasec": "R"},
                "B": {"text": "Researching how it should work", "riasec": "I"},
                "C": {"text": "Presenting the result to the class", "riasec": "E"}
            },
            "signalType": "personality"
        }"#;
        let task: Microtask = serde_json::from_str(json).unwrap();
        assert!(task.question_code.is_empty());
        assert_eq!(task.axes(), vec![Axis::Realistic, Axis::Investigative, Axis::Enterprising]);
        assert_eq!(task.option_axis("b"), Some(Axis::Investigative));
        assert_eq!(task.option_axis("F"), None);
    }

    #[test]
    fn test_policy_keys() {
        let policy = TaskPolicy::DisambiguateTop2 { top: Axis::Social, second: Axis::Artistic };
        assert_eq!(policy.name(), "disambiguate_top2");
        assert_eq!(policy.refill_key(), PolicyKey::Axis(Axis::Social));
        assert_eq!(policy.bank_keys().len(), 2);
        assert_eq!(TaskPolicy::Broad.refill_key().to_string(), "broad");
        assert_eq!("E".parse::<PolicyKey>().unwrap(), PolicyKey::Axis(Axis::Enterprising));
    }
}
