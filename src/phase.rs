//! Canonical phase sequence for a workflow instance.
//!
//! Every phase is entered and exited through a checkpoint entry, and the
//! checkpoint step names are exactly the slugs produced by `Phase::as_str`.
//! Resume works off a fixed, total step→next-phase table: an unknown step
//! name in a persisted log is a hard error, never a default.

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

/// One phase of the canonical sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    PolicySelection,
    TaskDiscovery,
    WorktreeSetup,
    Exploration,
    Planning,
    /// The human gate between planning and implementation. Unbounded
    /// suspension, ended only by an explicit approval signal.
    AwaitApproval,
    Implementation,
    PreReviewGates,
    ReviewLoop,
    DeliveryValidation,
    DocsUpdate,
    Ship,
}

/// Terminal disposition of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Shipped,
    Aborted,
}

/// The canonical order. A phase may only begin once every phase before it
/// has a completed checkpoint, with the single exception of the bounded
/// backward route from delivery-validation to implementation.
pub const CANONICAL_ORDER: [Phase; 12] = [
    Phase::PolicySelection,
    Phase::TaskDiscovery,
    Phase::WorktreeSetup,
    Phase::Exploration,
    Phase::Planning,
    Phase::AwaitApproval,
    Phase::Implementation,
    Phase::PreReviewGates,
    Phase::ReviewLoop,
    Phase::DeliveryValidation,
    Phase::DocsUpdate,
    Phase::Ship,
];

impl Phase {
    /// Stable slug used as the checkpoint step name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::PolicySelection => "policy-selection",
            Phase::TaskDiscovery => "task-discovery",
            Phase::WorktreeSetup => "worktree-setup",
            Phase::Exploration => "exploration",
            Phase::Planning => "planning",
            Phase::AwaitApproval => "await-approval",
            Phase::Implementation => "implementation",
            Phase::PreReviewGates => "pre-review-gates",
            Phase::ReviewLoop => "review-loop",
            Phase::DeliveryValidation => "delivery-validation",
            Phase::DocsUpdate => "docs-update",
            Phase::Ship => "ship",
        }
    }

    /// Parse a persisted step name. Total over the canonical slugs and
    /// nothing else.
    pub fn parse_step(step: &str) -> Result<Phase, EngineError> {
        CANONICAL_ORDER
            .iter()
            .copied()
            .find(|p| p.as_str() == step)
            .ok_or_else(|| EngineError::CorruptState {
                path: std::path::PathBuf::new(),
                reason: format!("unknown checkpoint step name: {step:?}"),
            })
    }

    /// Position in the canonical order.
    pub fn index(&self) -> usize {
        CANONICAL_ORDER
            .iter()
            .position(|p| p == self)
            .unwrap_or_else(|| unreachable!("phase missing from canonical order"))
    }

    /// The phase after this one, or `None` for the final phase.
    pub fn next(&self) -> Option<Phase> {
        CANONICAL_ORDER.get(self.index() + 1).copied()
    }

    /// Whether a worker is invoked for this phase (as opposed to the
    /// machine acting on its own: selection, discovery, worktree setup,
    /// the gate, and shipping).
    pub fn is_worker_phase(&self) -> bool {
        matches!(
            self,
            Phase::Exploration
                | Phase::Planning
                | Phase::Implementation
                | Phase::PreReviewGates
                | Phase::ReviewLoop
                | Phase::DeliveryValidation
                | Phase::DocsUpdate
        )
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map the last checkpointed step to the phase the machine should run next.
///
/// A completed step resumes at its successor; a started or failed step
/// resumes at itself. Unknown step names error out — there is deliberately
/// no default arm.
pub fn resume_phase(last_step: &str, completed: bool) -> Result<Option<Phase>, EngineError> {
    let phase = Phase::parse_step(last_step)?;
    if completed {
        Ok(phase.next())
    } else {
        Ok(Some(phase))
    }
}
