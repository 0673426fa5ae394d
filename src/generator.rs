//! Task generation and validation
//!
//! A generator is asked for a fresh task when the bank has nothing left for
//! a `(program, policy)` key. Whatever it returns is validated before the
//! session accepts it: option count, distinct axis tags, coverage of the
//! requested target axes, and a guard against knowledge-style questions.

use crate::error::{ProfilerError, Result};
use crate::types::{Axis, Microtask, TaskPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Phrases that mark a question as testing knowledge rather than preference
pub const KNOWLEDGE_KEYWORDS: [&str; 4] = ["what is", "define", "calculate", "solve"];

/// Produces one task for a program under a policy
pub trait TaskGenerator {
    fn generate(&self, program: &str, policy: &TaskPolicy) -> Result<Microtask>;
}

impl<T: TaskGenerator + ?Sized> TaskGenerator for &T {
    fn generate(&self, program: &str, policy: &TaskPolicy) -> Result<Microtask> {
        (**self).generate(program, policy)
    }
}

impl<T: TaskGenerator + ?Sized> TaskGenerator for Box<T> {
    fn generate(&self, program: &str, policy: &TaskPolicy) -> Result<Microtask> {
        (**self).generate(program, policy)
    }
}

/// Generator for bank-only sessions; reports an upstream failure for every
/// request once the bank has run dry
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopGenerator;

impl TaskGenerator for NoopGenerator {
    fn generate(&self, program: &str, policy: &TaskPolicy) -> Result<Microtask> {
        Err(ProfilerError::Upstream(format!(
            "no generator configured for '{}' ({})",
            program,
            policy.name()
        )))
    }
}

/// Why a task was rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskDefect {
    #[error("expected 3 or 6 options, got {0}")]
    OptionCount(usize),

    #[error("axis {0} appears on more than one option")]
    DuplicateAxis(Axis),

    #[error("missing target axis {0}")]
    MissingAxis(Axis),

    #[error("question tests knowledge ('{0}')")]
    KnowledgeQuestion(&'static str),

    #[error("question is empty")]
    EmptyQuestion,
}

/// Structural checks every served task must pass
pub fn validate_structure(task: &Microtask) -> std::result::Result<(), TaskDefect> {
    if task.question.trim().is_empty() {
        return Err(TaskDefect::EmptyQuestion);
    }

    let count = task.options.len();
    if count != 3 && count != 6 {
        return Err(TaskDefect::OptionCount(count));
    }

    let mut seen = HashSet::new();
    for axis in task.axes() {
        if !seen.insert(axis) {
            return Err(TaskDefect::DuplicateAxis(axis));
        }
    }

    Ok(())
}

/// Full check for generated tasks: structure, coverage and question style
pub fn validate_generated(task: &Microtask, policy: &TaskPolicy) -> std::result::Result<(), TaskDefect> {
    validate_structure(task)?;

    let axes = task.axes();
    if let Some(missing) = policy.target_axes().into_iter().find(|axis| !axes.contains(axis)) {
        return Err(TaskDefect::MissingAxis(missing));
    }

    let question = task.question.to_lowercase();
    if let Some(keyword) = KNOWLEDGE_KEYWORDS.iter().find(|kw| question.contains(*kw)) {
        return Err(TaskDefect::KnowledgeQuestion(*keyword));
    }

    Ok(())
}

/// Configuration for the LLM-backed generator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Messages API endpoint
    pub api_url: String,

    /// API key (from environment, never serialized)
    #[serde(skip)]
    pub api_key: String,

    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.anthropic.com/v1/messages".to_string(),
            api_key: std::env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            model: "claude-3-haiku-20240307".to_string(),
            max_tokens: 1024,
            timeout_secs: 30,
        }
    }
}

/// Generator that asks a hosted model for a task in bank JSON format
pub struct LlmTaskGenerator {
    config: GeneratorConfig,
    client: reqwest::blocking::Client,
}

impl LlmTaskGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(ProfilerError::InvalidConfig(
                "ANTHROPIC_API_KEY not set; the task generator requires API access".to_string(),
            ));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProfilerError::Upstream(e.to_string()))?;

        Ok(Self { config, client })
    }
}

impl TaskGenerator for LlmTaskGenerator {
    fn generate(&self, program: &str, policy: &TaskPolicy) -> Result<Microtask> {
        let request_body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "system": SYSTEM_PROMPT,
            "messages": [
                {
                    "role": "user",
                    "content": build_prompt(program, policy)
                }
            ]
        });

        let response = self
            .client
            .post(&self.config.api_url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .map_err(|e| ProfilerError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(ProfilerError::Upstream(format!("API error {}: {}", status, error_text)));
        }

        let response_json: serde_json::Value = response
            .json()
            .map_err(|e| ProfilerError::Upstream(e.to_string()))?;
        let content = response_json["content"][0]["text"].as_str().unwrap_or("");

        debug!(program, policy = policy.name(), "Received generated task");
        parse_task(content)
    }
}

const SYSTEM_PROMPT: &str = r#"You write RIASEC preference microtasks for high school students (ages 16-17) choosing a university program.

RIASEC axes:
- R (Realistic): hands-on work, tools, building things
- I (Investigative): research, analysis, understanding how things work
- A (Artistic): creative expression, design, unconventional approaches
- S (Social): helping, teaching, working with classmates
- E (Enterprising): leading, persuading, organising people
- C (Conventional): procedures, structure, keeping details in order

Rules:
1. The question asks what appeals to the student, never what they know.
2. Every option is tagged with a different axis.
3. Use school-level scenarios: projects, classmates, study groups, courses.
4. Reply with a single JSON object and nothing else:
   {"question": "...", "options": {"A": {"text": "...", "riasec": "R"}, ...}}"#;

fn build_prompt(program: &str, policy: &TaskPolicy) -> String {
    match policy {
        TaskPolicy::Broad => format!(
            "Write a broad microtask for the {program} program.\n\
             Give exactly 6 options (A-F), one for each of R, I, A, S, E, C.\n\
             The question and every option must be specific to {program}."
        ),
        TaskPolicy::DisambiguateTop2 { top, second } => format!(
            "Write a microtask for the {program} program that separates {top} ({}) from {second} ({}).\n\
             Give exactly 3 options (A-C): one with riasec \"{top}\", one with riasec \"{second}\", \
             and one with a different axis for contrast.",
            top.name(),
            second.name()
        ),
    }
}

/// Pull the first JSON object out of a model reply and parse it as a task
pub fn parse_task(content: &str) -> Result<Microtask> {
    let start = content.find('{');
    let end = content.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if e > s => &content[s..=e],
        _ => {
            return Err(ProfilerError::Upstream(
                "generator reply contains no JSON object".to_string(),
            ))
        }
    };

    serde_json::from_str(json)
        .map_err(|e| ProfilerError::Upstream(format!("unparsable generated task: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskOption;
    use std::collections::BTreeMap;

    fn task(question: &str, axes: &[Axis]) -> Microtask {
        let options: BTreeMap<String, TaskOption> = axes
            .iter()
            .enumerate()
            .map(|(i, axis)| {
                (
                    ((b'A' + i as u8) as char).to_string(),
                    TaskOption { text: format!("Something {}", axis.name()), riasec: *axis },
                )
            })
            .collect();
        Microtask {
            question_code: String::new(),
            question: question.to_string(),
            options,
            meta: None,
        }
    }

    #[test]
    fn test_structure_accepts_three_or_six() {
        let q = "Which project would you enjoy most?";
        assert!(validate_structure(&task(q, &Axis::ALL)).is_ok());
        assert!(validate_structure(&task(q, &[Axis::Social, Axis::Artistic, Axis::Realistic])).is_ok());
        assert_eq!(
            validate_structure(&task(q, &[Axis::Social, Axis::Artistic])),
            Err(TaskDefect::OptionCount(2))
        );
        assert_eq!(
            validate_structure(&task(q, &[Axis::Social, Axis::Social, Axis::Realistic])),
            Err(TaskDefect::DuplicateAxis(Axis::Social))
        );
        assert_eq!(validate_structure(&task("  ", &Axis::ALL)), Err(TaskDefect::EmptyQuestion));
    }

    #[test]
    fn test_generated_must_cover_targets() {
        let policy = TaskPolicy::DisambiguateTop2 { top: Axis::Investigative, second: Axis::Social };
        let q = "Which study group role sounds most fun?";

        assert!(validate_generated(&task(q, &[Axis::Investigative, Axis::Social, Axis::Artistic]), &policy).is_ok());
        assert_eq!(
            validate_generated(&task(q, &[Axis::Investigative, Axis::Realistic, Axis::Artistic]), &policy),
            Err(TaskDefect::MissingAxis(Axis::Social))
        );
        // Broad tasks need all six axes
        assert_eq!(
            validate_generated(&task(q, &[Axis::Investigative, Axis::Social, Axis::Artistic]), &TaskPolicy::Broad),
            Err(TaskDefect::MissingAxis(Axis::Realistic))
        );
    }

    #[test]
    fn test_generated_rejects_knowledge_questions() {
        let t = task("What is the derivative of x squared?", &Axis::ALL);
        assert_eq!(
            validate_generated(&t, &TaskPolicy::Broad),
            Err(TaskDefect::KnowledgeQuestion("what is"))
        );
        // Bank tasks only get the structural check
        assert!(validate_structure(&t).is_ok());
    }

    #[test]
    fn test_parse_task_from_reply() {
        let reply = r#"Here is your task:
        {"question": "Which lab activity appeals to you?",
         "options": {
            "A": {"text": "Set up the equipment", "riasec": "R"},
            "B": {"text": "Interpret the results", "riasec": "I"},
            "C": {"text": "Explain it to the class", "riasec": "S"}
         }}
        Hope that helps."#;
        let task = parse_task(reply).unwrap();
        assert_eq!(task.axes(), vec![Axis::Realistic, Axis::Investigative, Axis::Social]);

        assert!(matches!(parse_task("no json here"), Err(ProfilerError::Upstream(_))));
        assert!(matches!(parse_task("{\"question\": 3}"), Err(ProfilerError::Upstream(_))));
    }

    #[test]
    fn test_prompt_names_target_axes() {
        let policy = TaskPolicy::DisambiguateTop2 { top: Axis::Artistic, second: Axis::Enterprising };
        let prompt = build_prompt("Architecture", &policy);
        assert!(prompt.contains("riasec \"A\""));
        assert!(prompt.contains("riasec \"E\""));
        assert!(build_prompt("Architecture", &TaskPolicy::Broad).contains("exactly 6 options"));
    }

    #[test]
    fn test_llm_generator_requires_key() {
        let config = GeneratorConfig { api_key: String::new(), ..Default::default() };
        assert!(matches!(LlmTaskGenerator::new(config), Err(ProfilerError::InvalidConfig(_))));
    }

    #[test]
    fn test_noop_generator_is_upstream_failure() {
        assert!(matches!(
            NoopGenerator.generate("Law", &TaskPolicy::Broad),
            Err(ProfilerError::Upstream(_))
        ));
    }
}
