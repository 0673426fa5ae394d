//! One student's profiling session
//!
//! A session owns its profile, catalog and RNG; nothing is shared between
//! sessions. The forced-choice ranking seeds it, then the caller alternates
//! `next_step` (get a task or the final ranking) and `answer`.
//!
//! ```text
//! Seeded --next_step--> Probing --answer--> Probing ... --> Stopped
//!    \________________________________________________/
//!                    terminal error --> Aborted
//! ```

use crate::bank::TaskBank;
use crate::catalog::ProgramCatalog;
use crate::config::ProfilerConfig;
use crate::error::{ProfilerError, Result};
use crate::generator::{validate_generated, validate_structure, TaskGenerator};
use crate::profile::StudentProfile;
use crate::recommend::RecommendationEngine;
use crate::scheduler::SchedulingPolicy;
use crate::stopping::{StopDecision, StopReason, StoppingCriterion};
use crate::types::{
    Axis, AxisRanking, AxisVector, Microtask, NextStep, PresentedTask, Recommendation, TaskMeta,
    TaskPolicy, TaskPreference,
};
use crate::update::{UpdateEngine, UpdateSource};
use chrono::{DateTime, Utc};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Ranking applied, no task presented yet
    Seeded,
    Probing,
    Stopped,
    /// A terminal error occurred; the session accepts no further calls
    Aborted,
}

/// What happened when the student answered one task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub step: usize,
    pub program: String,
    pub question_code: String,
    pub option_key: String,
    pub axis: Axis,
    pub preference: Option<TaskPreference>,
    /// Program priority after the preference was applied
    pub priority_order: Option<u8>,
    pub vector: AxisVector,
    pub entropy: f64,
    pub gap: f64,
    pub stopped: bool,
}

pub struct Session<B: TaskBank, G: TaskGenerator> {
    id: Uuid,
    started_at: DateTime<Utc>,
    config: ProfilerConfig,
    ranking: AxisRanking,
    profile: StudentProfile,
    catalog: ProgramCatalog,
    updater: UpdateEngine,
    scheduler: SchedulingPolicy,
    stopping: StoppingCriterion,
    recommender: RecommendationEngine,
    bank: B,
    generator: G,
    rng: StdRng,
    state: SessionState,
    pending: Option<PresentedTask>,
    /// `(program, question_code)` of every task presented this session
    served: HashSet<(String, String)>,
    answers: Vec<AnswerRecord>,
    decision: StopDecision,
    recommendations: Option<Vec<Recommendation>>,
}

impl<B: TaskBank, G: TaskGenerator> Session<B, G> {
    /// Seed a new session from the student's forced-choice ranking.
    ///
    /// The catalog is reset first, so one loaded catalog can be cloned into
    /// any number of sessions.
    pub fn start(
        mut catalog: ProgramCatalog,
        ranking: AxisRanking,
        bank: B,
        generator: G,
        config: ProfilerConfig,
    ) -> Result<Self> {
        config.validate()?;

        let updater = UpdateEngine::from_config(&config)?;
        let scheduler = SchedulingPolicy::from_config(&config);
        let stopping = StoppingCriterion::from_config(&config);
        let recommender = RecommendationEngine::new(config.recommendation_count);
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        catalog.reset_session();
        let mut profile = StudentProfile::new();
        updater.seed_from_ranking(&mut profile, &mut catalog, &ranking)?;

        let decision = stopping.evaluate(profile.vector());
        let state = if decision.should_stop() {
            SessionState::Stopped
        } else {
            SessionState::Seeded
        };

        let id = Uuid::new_v4();
        info!(
            session = %id,
            ranking = %ranking,
            programs = catalog.len(),
            entropy = decision.entropy,
            gap = decision.gap,
            stopped = decision.should_stop(),
            "Session seeded"
        );

        Ok(Self {
            id,
            started_at: Utc::now(),
            config,
            ranking,
            profile,
            catalog,
            updater,
            scheduler,
            stopping,
            recommender,
            bank,
            generator,
            rng,
            state,
            pending: None,
            served: HashSet::new(),
            answers: Vec::new(),
            decision,
            recommendations: None,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn ranking(&self) -> &AxisRanking {
        &self.ranking
    }

    pub fn profile(&self) -> &StudentProfile {
        &self.profile
    }

    pub fn catalog(&self) -> &ProgramCatalog {
        &self.catalog
    }

    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    pub fn pending(&self) -> Option<&PresentedTask> {
        self.pending.as_ref()
    }

    /// Latest stopping check
    pub fn stop_decision(&self) -> &StopDecision {
        &self.decision
    }

    /// Either the task to present or, once stopped, the final ranking.
    ///
    /// Calling again before answering returns the same pending task.
    pub fn next_step(&mut self) -> Result<NextStep> {
        match self.state {
            SessionState::Aborted => {
                return Err(ProfilerError::InvalidState("session was aborted".to_string()))
            }
            SessionState::Stopped => return Ok(NextStep::Recommendations(self.recommendations())),
            SessionState::Seeded | SessionState::Probing => {}
        }

        if let Some(pending) = &self.pending {
            return Ok(NextStep::Task(pending.clone()));
        }

        if self.task_limit_reached() {
            self.stop(StopReason::TaskLimit);
            return Ok(NextStep::Recommendations(self.recommendations()));
        }

        let presented = self.present_next();
        let presented = self.guard(presented)?;
        Ok(NextStep::Task(presented))
    }

    /// Record the student's choice for the pending task
    pub fn answer(&mut self, option_key: &str, preference: Option<TaskPreference>) -> Result<AnswerRecord> {
        match self.state {
            SessionState::Aborted => {
                return Err(ProfilerError::InvalidState("session was aborted".to_string()))
            }
            SessionState::Stopped => {
                return Err(ProfilerError::InvalidState("session already stopped".to_string()))
            }
            SessionState::Seeded | SessionState::Probing => {}
        }

        let pending = self
            .pending
            .take()
            .ok_or_else(|| ProfilerError::InvalidState("no task is awaiting an answer".to_string()))?;

        let axis = match pending.task.option_axis(option_key) {
            Some(axis) => axis,
            None => {
                let keys: Vec<&str> = pending.task.options.keys().map(|k| k.as_str()).collect();
                let message = format!("option '{}' not in [{}]", option_key, keys.join(", "));
                self.pending = Some(pending);
                return Err(ProfilerError::InvalidAnswer(message));
            }
        };

        let updated = self.updater.apply_update(
            &mut self.profile,
            &self.catalog,
            axis.index(),
            UpdateSource::Program(&pending.program),
        );
        let vector = self.guard(updated)?;

        let priority_order = match preference {
            Some(pref) => {
                let applied = self.catalog.apply_preference(&pending.program, pref);
                Some(self.guard(applied)?)
            }
            None => None,
        };

        self.decision = self.stopping.evaluate(&vector);
        if self.decision.should_stop() {
            self.state = SessionState::Stopped;
        } else if self.task_limit_reached_after(self.answers.len() + 1) {
            self.decision.reason = Some(StopReason::TaskLimit);
            self.state = SessionState::Stopped;
        }

        let record = AnswerRecord {
            step: pending.step,
            program: pending.program,
            question_code: pending.task.question_code,
            option_key: option_key.trim().to_uppercase(),
            axis,
            preference,
            priority_order,
            vector,
            entropy: self.decision.entropy,
            gap: self.decision.gap,
            stopped: self.state == SessionState::Stopped,
        };

        info!(
            session = %self.id,
            step = record.step,
            program = %record.program,
            axis = %axis,
            entropy = record.entropy,
            gap = record.gap,
            stopped = record.stopped,
            "Answer recorded"
        );
        if let Some(reason) = self.decision.reason {
            info!(session = %self.id, ?reason, answered = self.answers.len() + 1, "Profiling stopped");
        }

        self.answers.push(record.clone());
        Ok(record)
    }

    /// Final ranking for the current profile (cached once stopped)
    pub fn recommendations(&mut self) -> Vec<Recommendation> {
        if let Some(cached) = &self.recommendations {
            return cached.clone();
        }
        let recommendations = self.recommender.recommend(&self.profile, &self.catalog);
        if self.state == SessionState::Stopped {
            self.recommendations = Some(recommendations.clone());
        }
        recommendations
    }

    /// End the session early, e.g. when the caller runs out of time
    pub fn finish(&mut self) -> Vec<Recommendation> {
        if matches!(self.state, SessionState::Seeded | SessionState::Probing) {
            self.pending = None;
            self.stop(StopReason::TaskLimit);
        }
        self.recommendations()
    }

    fn stop(&mut self, reason: StopReason) {
        self.decision.reason = Some(reason);
        self.state = SessionState::Stopped;
        info!(session = %self.id, ?reason, answered = self.answers.len(), "Profiling stopped");
    }

    fn task_limit_reached(&self) -> bool {
        self.task_limit_reached_after(self.answers.len())
    }

    fn task_limit_reached_after(&self, answered: usize) -> bool {
        self.config.max_tasks.is_some_and(|max| answered >= max)
    }

    /// Abort on terminal errors, pass everything else through
    fn guard<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_terminal() {
                warn!(session = %self.id, error = %e, "Session aborted");
                self.state = SessionState::Aborted;
                self.pending = None;
            }
        }
        result
    }

    fn present_next(&mut self) -> Result<PresentedTask> {
        let selection = self
            .scheduler
            .select_next(&self.profile, &mut self.catalog, &mut self.rng)?;

        let (mut task, generated) = self.fetch_task(&selection.program, &selection.policy)?;
        task.meta = Some(TaskMeta {
            policy: selection.policy.name().to_string(),
            target_axes: selection.policy.target_axes(),
            top2_gap: selection.gap,
            entropy: selection.entropy,
            generated,
        });

        self.served
            .insert((selection.program.clone(), task.question_code.clone()));
        let presented = PresentedTask {
            program: selection.program,
            policy: selection.policy,
            task,
            step: self.answers.len() + 1,
        };

        self.state = SessionState::Probing;
        self.pending = Some(presented.clone());
        Ok(presented)
    }

    fn was_served(&self, program: &str, question_code: &str) -> bool {
        self.served
            .contains(&(program.to_string(), question_code.to_string()))
    }

    /// An unserved bank task, or a freshly generated one (filed back into the bank)
    fn fetch_task(&mut self, program: &str, policy: &TaskPolicy) -> Result<(Microtask, bool)> {
        let mut candidates = Vec::new();
        for key in policy.bank_keys() {
            for task in self.bank.lookup(program, key)? {
                if self.was_served(program, &task.question_code) {
                    continue;
                }
                if let Err(defect) = validate_structure(&task) {
                    warn!(program, code = %task.question_code, %defect, "Skipping malformed bank task");
                    continue;
                }
                candidates.push(task);
            }
        }

        if !candidates.is_empty() {
            let index = self.rng.gen_range(0..candidates.len());
            debug!(program, policy = policy.name(), candidates = candidates.len(), "Serving bank task");
            return Ok((candidates.swap_remove(index), false));
        }

        for attempt in 1..=self.config.max_generation_attempts {
            let mut task = self.generator.generate(program, policy)?;
            match validate_generated(&task, policy) {
                Ok(()) => {
                    if task.question_code.is_empty() || self.was_served(program, &task.question_code) {
                        task.question_code = format!("gen-{}", Uuid::new_v4().simple());
                    }
                    self.bank.append(program, policy.refill_key(), task.clone())?;
                    info!(program, policy = policy.name(), attempt, code = %task.question_code, "Generated task accepted");
                    return Ok((task, true));
                }
                Err(defect) => {
                    warn!(program, policy = policy.name(), attempt, %defect, "Generated task rejected");
                }
            }
        }

        Err(ProfilerError::NoCandidateTasks {
            program: program.to_string(),
            policy: policy.name().to_string(),
        })
    }
}
