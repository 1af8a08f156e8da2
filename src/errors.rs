//! Typed error hierarchy for the Drydock engine.
//!
//! `EngineError` is the taxonomy the core propagates; callers match on it to
//! decide between retry, rerouting, and halting. CLI-level glue composes
//! these with `anyhow` context instead of adding variants here.

use thiserror::Error;

use crate::phase::Phase;

/// Errors from the engine core: discovery, registry, checkpointing, and the
/// state machine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The task source could not be reached or returned garbage.
    /// Recoverable: retry, or switch to a different source.
    #[error("Task source unavailable: {0}")]
    SourceUnavailable(String),

    /// Another instance already holds the claim for this task.
    /// The caller must pick a different task.
    // Field is `source_name`, not `source`: thiserror reserves a field named
    // `source` for the error's cause and requires it to implement Error.
    #[error("Task {id} from {source_name} is already claimed by instance at {worktree}")]
    AlreadyClaimed {
        id: String,
        source_name: String,
        worktree: std::path::PathBuf,
    },

    /// A registry or checkpoint document failed structural validation.
    /// Fatal: never auto-repaired, never treated as a fresh start.
    #[error("Corrupt state in {path}: {reason}")]
    CorruptState {
        path: std::path::PathBuf,
        reason: String,
    },

    /// More than one live instance matched a resume request.
    /// Fatal until the caller disambiguates with an explicit id.
    #[error("Ambiguous resume: {candidates:?} all match; pass an explicit task id")]
    AmbiguousResume { candidates: Vec<String> },

    /// Delivery validation rejected the work. Recoverable: the machine
    /// routes back to implementation with the fix list, a bounded number
    /// of times.
    #[error("Delivery validation failed with {} finding(s)", fixes.len())]
    ValidationFailed { fixes: Vec<String> },

    /// The review loop (or validation rerouting) exhausted its budget.
    /// Fatal: requires human intervention; the claim is retained.
    #[error("Iteration limit exceeded in {phase} after {iterations} iteration(s)")]
    IterationLimitExceeded { phase: Phase, iterations: u32 },

    /// A worker reported failure for a phase where failure is fatal.
    #[error("Worker failed during {phase}: {message}")]
    WorkerFailed { phase: Phase, message: String },

    /// The human gate rejected the plan.
    #[error("Plan rejected at the approval gate")]
    PlanRejected,

    #[error("I/O error at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    /// Whether the caller may retry or reroute, as opposed to halting.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::SourceUnavailable(_)
                | EngineError::AlreadyClaimed { .. }
                | EngineError::ValidationFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_claimed_carries_identity() {
        let err = EngineError::AlreadyClaimed {
            id: "42".into(),
            source_name: "github:acme/app".into(),
            worktree: "/tmp/wt".into(),
        };
        match &err {
            EngineError::AlreadyClaimed {
                id, source_name, ..
            } => {
                assert_eq!(id, "42");
                assert_eq!(source_name, "github:acme/app");
            }
            _ => panic!("Expected AlreadyClaimed"),
        }
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn validation_failed_counts_fixes_in_message() {
        let err = EngineError::ValidationFailed {
            fixes: vec!["missing test".into(), "lint error".into()],
        };
        assert!(err.to_string().contains("2 finding(s)"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn iteration_limit_is_fatal() {
        let err = EngineError::IterationLimitExceeded {
            phase: Phase::ReviewLoop,
            iterations: 3,
        };
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("review-loop"));
    }

    #[test]
    fn corrupt_state_is_fatal() {
        let err = EngineError::CorruptState {
            path: "/tmp/checkpoint.json".into(),
            reason: "completed steps out of order".into(),
        };
        assert!(!err.is_recoverable());
    }

    #[test]
    fn engine_error_implements_std_error() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&EngineError::PlanRejected);
        assert_std_error(&EngineError::SourceUnavailable("down".into()));
    }
}
