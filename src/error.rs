//! Error types for the profiling engine

use thiserror::Error;

/// Main error type for profiling sessions
#[derive(Error, Debug)]
pub enum ProfilerError {
    /// Axis index outside `0..6`
    #[error("Invalid axis index: {0} (expected 0..=5)")]
    InvalidAxis(usize),

    /// Catalog has no programs, so no gradient column exists
    #[error("Program catalog is empty")]
    EmptyCatalog,

    /// Program vector row with the wrong arity or unparsable components
    #[error("Malformed vector for program '{program}': {found}")]
    MalformedProgramVector { program: String, found: String },

    #[error("Duplicate program in catalog: {0}")]
    DuplicateProgram(String),

    #[error("Unknown program: {0}")]
    UnknownProgram(String),

    /// Bank and generator both failed to produce a coverage-valid task
    #[error("No candidate tasks for program '{program}' under policy '{policy}'")]
    NoCandidateTasks { program: String, policy: String },

    /// Seeding ranking is not a permutation of the six axes
    #[error("Invalid ranking: {0}")]
    InvalidRanking(String),

    #[error("Invalid answer: {0}")]
    InvalidAnswer(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Opaque failure reported by an external collaborator (network, generation)
    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProfilerError {
    /// Whether this error ends the session it occurred in.
    ///
    /// Data-integrity errors and exhausted task supply are terminal; upstream
    /// hiccups and caller mistakes are surfaced so the caller can retry.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProfilerError::InvalidAxis(_)
                | ProfilerError::EmptyCatalog
                | ProfilerError::MalformedProgramVector { .. }
                | ProfilerError::DuplicateProgram(_)
                | ProfilerError::InvalidRanking(_)
                | ProfilerError::NoCandidateTasks { .. }
        )
    }
}

/// Result type alias for profiling operations
pub type Result<T> = std::result::Result<T, ProfilerError>;
