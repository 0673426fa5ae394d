//! Template-based task generation for offline runs
//!
//! Produces well-formed tasks for any program without network access, so
//! simulations can exercise the bank refill path end to end.

use crate::error::Result;
use crate::generator::TaskGenerator;
use crate::types::{Axis, Microtask, TaskOption, TaskPolicy};
use std::collections::BTreeMap;

const OPTION_KEYS: [&str; 6] = ["A", "B", "C", "D", "E", "F"];

/// Fills fixed per-axis templates with the program name
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticTaskGenerator;

impl SyntheticTaskGenerator {
    fn option_text(axis: Axis, program: &str) -> String {
        match axis {
            Axis::Realistic => format!("Build or fix the equipment for a {} project", program),
            Axis::Investigative => format!("Find out why a {} experiment gave odd results", program),
            Axis::Artistic => format!("Design the poster for the {} showcase", program),
            Axis::Social => format!("Help a classmate who is stuck on {} homework", program),
            Axis::Enterprising => format!("Pitch a {} idea to the student council", program),
            Axis::Conventional => format!("Keep the {} project files and schedule in order", program),
        }
    }

    /// Axes offered under `policy`, in option order
    pub fn axes_for(policy: &TaskPolicy) -> Vec<Axis> {
        match policy {
            TaskPolicy::Broad => Axis::ALL.to_vec(),
            TaskPolicy::DisambiguateTop2 { top, second } => {
                let contrast = [opposite(*top), opposite(*second)]
                    .into_iter()
                    .chain(Axis::ALL)
                    .find(|a| a != top && a != second)
                    .unwrap_or(Axis::Conventional);
                vec![*top, *second, contrast]
            }
        }
    }
}

/// Axis across the RIASEC hexagon (R-S, I-E, A-C)
fn opposite(axis: Axis) -> Axis {
    Axis::ALL[(axis.index() + 3) % Axis::ALL.len()]
}

impl TaskGenerator for SyntheticTaskGenerator {
    fn generate(&self, program: &str, policy: &TaskPolicy) -> Result<Microtask> {
        let options: BTreeMap<String, TaskOption> = Self::axes_for(policy)
            .into_iter()
            .zip(OPTION_KEYS)
            .map(|(axis, key)| {
                (
                    key.to_string(),
                    TaskOption {
                        text: Self::option_text(axis, program),
                        riasec: axis,
                    },
                )
            })
            .collect();

        Ok(Microtask {
            question_code: String::new(),
            question: format!("Your class starts a {} project. Which part would you pick?", program),
            options,
            meta: None,
        })
    }
}
