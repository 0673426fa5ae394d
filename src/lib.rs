//! riasec-profiler - adaptive RIASEC interest profiling
//!
//! Profiles a student's interest orientation over the six RIASEC axes
//! (Realistic, Investigative, Artistic, Social, Enterprising, Conventional)
//! through a short sequence of preference tasks, then recommends the
//! closest programs from a catalog of program vectors.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use riasec_profiler::{AxisRanking, MemoryTaskBank, NextStep, ProfilerConfig, ProgramCatalog, Session};
//! use riasec_profiler::generator::NoopGenerator;
//!
//! let catalog = ProgramCatalog::from_file(&programs_path)?;
//! let bank = MemoryTaskBank::from_file(&tasks_path)?;
//! let ranking = AxisRanking::parse("SIAERC")?;
//!
//! let mut session = Session::start(catalog, ranking, bank, NoopGenerator, ProfilerConfig::default())?;
//! loop {
//!     match session.next_step()? {
//!         NextStep::Task(task) => { session.answer(&ask_student(&task), None)?; }
//!         NextStep::Recommendations(recs) => break recs,
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ranking ──► UpdateEngine::seed_from_ranking ──► StudentProfile
//!                                                     │
//!        ┌────────────────────────────────────────────┤
//!        ▼                                            │
//! SchedulingPolicy ──► TaskBank / TaskGenerator ──► answer ──► UpdateEngine
//!        ▲                                                        │
//!        └──────────── StoppingCriterion (continue) ◄─────────────┘
//!                               │ stop
//!                               ▼
//!                      RecommendationEngine
//! ```

pub mod bank;
pub mod catalog;
pub mod config;
pub mod error;
pub mod eval;
pub mod generator;
pub mod profile;
pub mod recommend;
pub mod scheduler;
pub mod session;
pub mod stopping;
pub mod store;
pub mod types;
pub mod update;
pub mod vector;

pub use bank::{MemoryTaskBank, SqliteTaskBank, TaskBank};
pub use catalog::{ProgramCatalog, ProgramRecord};
pub use config::{get_data_dir, ProfilerConfig};
pub use error::{ProfilerError, Result};
pub use generator::{LlmTaskGenerator, TaskGenerator};
pub use profile::StudentProfile;
pub use recommend::RecommendationEngine;
pub use scheduler::SchedulingPolicy;
pub use session::{AnswerRecord, Session, SessionState};
pub use stopping::{StopReason, StoppingCriterion};
pub use types::*;
pub use update::{UpdateEngine, UpdateSource};
